use super::reconcile::{run_pass, PassResult};
use super::{EndpointArgs, EXIT_FAILURE, EXIT_SUCCESS};
use nodepower_client::Context;
use nodepower_core::{sleep_unless_cancelled, NodeReconciler, PassReport};
use nodepower_schema::Phase;
use std::path::Path;
use std::time::Duration;
use tracing::{info, warn};

const INITIAL_BACKOFF: Duration = Duration::from_secs(1);

#[derive(Debug, Clone)]
pub struct WatchOptions {
    pub interval: Duration,
    pub requeue: Duration,
    pub max_backoff: Duration,
    pub max_passes: Option<u64>,
}

/// Delay before the next pass. `failures` counts consecutive failed passes
/// and is reset by any completed pass.
fn next_delay<E>(
    outcome: &Result<PassReport, E>,
    failures: &mut u32,
    opts: &WatchOptions,
) -> Duration {
    match outcome {
        Ok(report) => {
            *failures = 0;
            if report.phase == Phase::Ready {
                opts.interval
            } else {
                opts.requeue
            }
        }
        Err(_) => {
            *failures = failures.saturating_add(1);
            let exp = (*failures - 1).min(16);
            INITIAL_BACKOFF
                .saturating_mul(1 << exp)
                .min(opts.max_backoff)
        }
    }
}

fn print_line(pass: u64, result: &PassResult, delay: Duration, json: bool) -> Result<(), String> {
    let status = &result.node.status;
    if json {
        let payload = serde_json::json!({
            "pass": pass,
            "report": result.outcome.as_ref().ok(),
            "error": result.outcome.as_ref().err().map(ToString::to_string),
            "status": status,
            "nextPassSecs": delay.as_secs(),
        });
        let line = serde_json::to_string(&payload)
            .map_err(|e| format!("JSON serialization failed: {e}"))?;
        println!("{line}");
    } else {
        let phase = status.phase.map_or_else(|| "-".to_owned(), |p| p.to_string());
        println!(
            "pass {pass}: {phase} (actual={}, ready={}) {}",
            status.actual_power_state, status.ready, status.message
        );
    }
    Ok(())
}

pub fn run(
    endpoints: &EndpointArgs,
    path: &Path,
    ctx: &Context,
    opts: &WatchOptions,
    json: bool,
) -> Result<u8, String> {
    let config = endpoints.resolve()?;
    let reconciler = NodeReconciler::from_config(&config);
    info!("watching {}", path.display());

    let mut failures = 0u32;
    let mut pass = 0u64;
    let mut last_ok;

    loop {
        pass += 1;
        let result = run_pass(&reconciler, ctx, path)?;
        let delay = next_delay(&result.outcome, &mut failures, opts);
        if let Err(e) = &result.outcome {
            warn!(
                "pass {pass} failed ({failures} in a row), retrying in {}s: {e}",
                delay.as_secs()
            );
        }
        last_ok = result.outcome.is_ok();
        print_line(pass, &result, delay, json)?;

        if ctx.is_cancelled() || opts.max_passes.is_some_and(|max| pass >= max) {
            break;
        }
        if !sleep_unless_cancelled(ctx, delay) {
            break;
        }
    }

    if ctx.is_cancelled() {
        info!("watch of {} stopped after {pass} pass(es)", path.display());
        return Ok(EXIT_SUCCESS);
    }
    Ok(if last_ok { EXIT_SUCCESS } else { EXIT_FAILURE })
}
