use super::{
    json_pretty, load_node, lock_node, print_status, save_node, spin_done, spinner,
    EndpointArgs, EXIT_SUCCESS,
};
use nodepower_client::Context;
use nodepower_core::{CoreError, NodeReconciler, PassReport};
use nodepower_schema::Node;
use std::path::Path;
use tracing::debug;

/// Outcome of one locked read-reconcile-write cycle.
pub struct PassResult {
    pub node: Node,
    pub outcome: Result<PassReport, CoreError>,
}

/// Lock the resource, reload it, run one pass and persist the new status.
///
/// The status is written back whether or not the pass succeeded.
pub fn run_pass(
    reconciler: &NodeReconciler,
    ctx: &Context,
    path: &Path,
) -> Result<PassResult, String> {
    let _lock = lock_node(path)?;
    let mut node = load_node(path)?;
    let outcome = reconciler.reconcile(ctx, &mut node);
    save_node(path, &node)?;
    debug!("status of {} written to {}", node.name(), path.display());
    Ok(PassResult { node, outcome })
}

pub fn print_pass(result: &PassResult, json: bool) -> Result<(), String> {
    if json {
        let payload = serde_json::json!({
            "node": result.node.name(),
            "xname": result.node.spec.xname,
            "report": result.outcome.as_ref().ok(),
            "error": result.outcome.as_ref().err().map(ToString::to_string),
            "status": result.node.status,
        });
        println!("{}", json_pretty(&payload)?);
    } else {
        print_status(&result.node);
    }
    Ok(())
}

pub fn run(
    endpoints: &EndpointArgs,
    path: &Path,
    ctx: &Context,
    json: bool,
) -> Result<u8, String> {
    let config = endpoints.resolve()?;
    let reconciler = NodeReconciler::from_config(&config);

    let pb = (!json).then(|| spinner("reconciling…"));
    let result = run_pass(&reconciler, ctx, path);
    if let Some(pb) = &pb {
        spin_done(pb);
    }
    let result = result?;

    print_pass(&result, json)?;
    match result.outcome {
        Ok(_) => Ok(EXIT_SUCCESS),
        Err(e) => Err(format!("reconcile failed: {e}")),
    }
}
