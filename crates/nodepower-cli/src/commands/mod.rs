pub mod reconcile;
pub mod status;
pub mod watch;

use indicatif::{ProgressBar, ProgressStyle};
use nodepower_client::{ConfigError, EndpointConfig, InventorySchema};
use nodepower_core::NodeLock;
use nodepower_schema::{Node, Phase};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tempfile::NamedTempFile;

pub const EXIT_SUCCESS: u8 = 0;
pub const EXIT_FAILURE: u8 = 1;
pub const EXIT_RESOURCE_ERROR: u8 = 2;
pub const EXIT_CONFIG_ERROR: u8 = 3;

/// Endpoint-related global flags, applied on top of the config file.
#[derive(Debug, Default)]
pub struct EndpointArgs {
    pub config: Option<PathBuf>,
    pub smd_url: Option<String>,
    pub pcs_url: Option<String>,
    pub inventory_schema: Option<InventorySchema>,
    pub timeout_secs: Option<u64>,
}

impl EndpointArgs {
    /// An explicit `--config` must exist; the default location may be absent,
    /// and is skipped entirely when `HOME` is unset.
    pub fn resolve(&self) -> Result<EndpointConfig, String> {
        let mut config = match &self.config {
            Some(path) => EndpointConfig::load(path)
                .map_err(|e| format!("config error: {}: {e}", path.display()))?,
            None => match EndpointConfig::load_default() {
                Ok(config) => config,
                Err(ConfigError::NoHome) => EndpointConfig::default(),
                Err(e) => return Err(format!("config error: {e}")),
            },
        };

        if let Some(url) = &self.smd_url {
            config.inventory.url.clone_from(url);
        }
        if let Some(url) = &self.pcs_url {
            config.power.url.clone_from(url);
        }
        if let Some(schema) = self.inventory_schema {
            config.inventory.schema = schema;
        }
        if let Some(secs) = self.timeout_secs {
            config.timeout_secs = secs;
        }

        let config = config.normalized();
        config.validate().map_err(|e| format!("config error: {e}"))?;
        Ok(config)
    }
}

pub fn json_pretty(value: &impl serde::Serialize) -> Result<String, String> {
    serde_json::to_string_pretty(value).map_err(|e| format!("JSON serialization failed: {e}"))
}

pub fn load_node(path: &Path) -> Result<Node, String> {
    Node::load(path).map_err(|e| format!("resource error: {}: {e}", path.display()))
}

pub fn lock_node(path: &Path) -> Result<NodeLock, String> {
    NodeLock::acquire(path).map_err(|e| e.to_string())
}

/// Replace the resource file in one rename so readers never see a partial write.
pub fn save_node(path: &Path, node: &Node) -> Result<(), String> {
    let content = json_pretty(node)?;
    let dir = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .map_or_else(|| PathBuf::from("."), Path::to_path_buf);
    let mut tmp = NamedTempFile::new_in(&dir).map_err(|e| format!("write temp file: {e}"))?;
    use std::io::Write;
    tmp.write_all(content.as_bytes())
        .map_err(|e| format!("write temp file: {e}"))?;
    tmp.write_all(b"\n")
        .map_err(|e| format!("write temp file: {e}"))?;
    tmp.as_file()
        .sync_all()
        .map_err(|e| format!("fsync temp file: {e}"))?;
    tmp.persist(path)
        .map_err(|e| format!("resource error: persist {}: {}", path.display(), e.error))?;
    Ok(())
}

pub fn spinner(msg: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    if let Ok(style) = ProgressStyle::with_template("{spinner:.cyan} {msg}") {
        pb.set_style(style.tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"]));
    }
    pb.set_message(msg.to_owned());
    pb.enable_steady_tick(Duration::from_millis(80));
    pb
}

pub fn spin_done(pb: &ProgressBar) {
    pb.finish_and_clear();
}

pub fn colorize_phase(phase: Option<Phase>) -> String {
    use console::Style;
    match phase {
        Some(Phase::Ready) => Style::new().green().apply_to("Ready").to_string(),
        Some(Phase::Syncing) => Style::new().yellow().apply_to("Syncing").to_string(),
        Some(Phase::PowerStatusError) => Style::new()
            .red()
            .bold()
            .apply_to("PowerStatusError")
            .to_string(),
        None => Style::new().dim().apply_to("(never reconciled)").to_string(),
    }
}

/// Human-readable summary shared by `reconcile`, `watch` and `status`.
pub fn print_status(node: &Node) {
    let status = &node.status;
    println!("node:        {}", node.name());
    println!("xname:       {}", node.spec.xname);
    println!("desired:     {}", node.spec.power_state);
    println!(
        "actual:      {}",
        if status.actual_power_state.is_empty() {
            "-"
        } else {
            &status.actual_power_state
        }
    );
    println!("phase:       {}", colorize_phase(status.phase));
    println!("ready:       {}", status.ready);
    if !status.message.is_empty() {
        println!("message:     {}", status.message);
    }
    println!("ip_address:  {}", status.ip_address.as_deref().unwrap_or("-"));
    println!("mac_address: {}", status.mac_address.as_deref().unwrap_or("-"));
    match status.last_sync {
        Some(ts) => println!("last_sync:   {}", ts.to_rfc3339()),
        None => println!("last_sync:   -"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nodepower_schema::PowerState;

    #[test]
    fn json_pretty_serializes_object() {
        let val = serde_json::json!({"key": "value"});
        let result = json_pretty(&val).unwrap();
        assert!(result.contains("\"key\""));
        assert!(result.contains("\"value\""));
    }

    #[test]
    fn colorize_phase_keeps_name() {
        assert!(colorize_phase(Some(Phase::Ready)).contains("Ready"));
        assert!(colorize_phase(Some(Phase::Syncing)).contains("Syncing"));
        assert!(colorize_phase(Some(Phase::PowerStatusError)).contains("PowerStatusError"));
        assert!(colorize_phase(None).contains("never reconciled"));
    }

    #[test]
    fn flags_override_config_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            "timeout_secs = 9\n[inventory]\nurl = \"http://smd.local/hsm/v2\"\n[power]\nurl = \"http://pcs.local\"\n",
        )
        .unwrap();

        let args = EndpointArgs {
            config: Some(path),
            pcs_url: Some("http://other-pcs:28007/".to_owned()),
            inventory_schema: Some(InventorySchema::RedfishEndpoint),
            ..EndpointArgs::default()
        };
        let config = args.resolve().unwrap();

        assert_eq!(config.inventory.url, "http://smd.local/hsm/v2");
        assert_eq!(config.power.url, "http://other-pcs:28007");
        assert_eq!(config.inventory.schema, InventorySchema::RedfishEndpoint);
        assert_eq!(config.timeout_secs, 9);
    }

    #[test]
    fn missing_explicit_config_is_config_error() {
        let args = EndpointArgs {
            config: Some(PathBuf::from("/nonexistent/nodepower.toml")),
            ..EndpointArgs::default()
        };
        assert!(args.resolve().unwrap_err().starts_with("config error:"));
    }

    #[test]
    fn zero_timeout_flag_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "").unwrap();
        let args = EndpointArgs {
            config: Some(path),
            timeout_secs: Some(0),
            ..EndpointArgs::default()
        };
        assert!(args.resolve().unwrap_err().contains("timeout_secs"));
    }

    #[test]
    fn save_node_round_trips_through_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("node.json");
        let mut node = Node::new("compute-1", "x1000c0s0b0n0", PowerState::On);
        node.status.actual_power_state = "on".to_owned();

        save_node(&path, &node).unwrap();
        let loaded = load_node(&path).unwrap();

        assert_eq!(loaded, node);
    }

    #[test]
    fn load_node_errors_are_resource_errors() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("node.json");
        std::fs::write(&path, "{").unwrap();
        assert!(load_node(&path).unwrap_err().starts_with("resource error:"));
    }
}
