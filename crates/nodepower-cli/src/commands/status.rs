use super::{json_pretty, load_node, print_status, EXIT_SUCCESS};
use std::path::Path;

/// Reads without taking the node lock: status is only ever replaced by an
/// atomic rename, so a concurrent pass cannot expose a partial file.
pub fn run(path: &Path, json: bool) -> Result<u8, String> {
    let node = load_node(path)?;
    if json {
        let payload = serde_json::json!({
            "node": node.name(),
            "xname": node.spec.xname,
            "desired": node.spec.power_state,
            "status": node.status,
        });
        println!("{}", json_pretty(&payload)?);
    } else {
        print_status(&node);
    }
    Ok(EXIT_SUCCESS)
}
