//! CLI subprocess integration tests.
//!
//! These tests invoke the `nodepower` binary as a subprocess against an
//! in-process mock SMD/PCS and verify exit codes, persisted status, and JSON
//! output.

use nodepower_mock::{MockNode, TestServer};
use std::path::{Path, PathBuf};
use std::process::{Command, Output};
use std::time::Duration;

const XNAME: &str = "x1000c0s2b0n0";

fn nodepower_bin(dir: &Path) -> Command {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_nodepower"));
    // Keep a developer's real config out of the tests.
    cmd.env("HOME", dir);
    cmd.env_remove("NODEPOWER_LOG");
    cmd
}

fn with_endpoints(cmd: &mut Command, server: &TestServer) {
    cmd.arg("--smd-url")
        .arg(server.smd_url())
        .arg("--pcs-url")
        .arg(server.pcs_url());
}

fn start(power_state: &str) -> TestServer {
    let server = TestServer::start();
    server.fleet().add_node(
        XNAME,
        MockNode::new(power_state)
            .with_fqdn("10.254.2.1")
            .with_mac("ec:0d:9a:00:00:01"),
    );
    server
}

fn write_node(dir: &Path, desired: &str) -> PathBuf {
    let path = dir.join("compute-2.json");
    std::fs::write(
        &path,
        format!(
            r#"{{
  "apiVersion": "v1",
  "kind": "Node",
  "metadata": {{ "name": "compute-2" }},
  "spec": {{ "xname": "{XNAME}", "powerState": "{desired}" }}
}}"#
        ),
    )
    .unwrap();
    path
}

fn read_status(path: &Path) -> serde_json::Value {
    let content = std::fs::read_to_string(path).unwrap();
    let node: serde_json::Value = serde_json::from_str(&content).unwrap();
    node["status"].clone()
}

fn reconcile(server: &TestServer, dir: &Path, node: &Path, extra: &[&str]) -> Output {
    let mut cmd = nodepower_bin(dir);
    with_endpoints(&mut cmd, server);
    cmd.args(extra).arg("reconcile").arg(node).output().unwrap()
}

#[test]
fn cli_version_exits_zero() {
    let dir = tempfile::tempdir().unwrap();
    let output = nodepower_bin(dir.path()).arg("--version").output().unwrap();
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("nodepower"), "{stdout}");
}

#[test]
fn cli_help_lists_commands() {
    let dir = tempfile::tempdir().unwrap();
    let output = nodepower_bin(dir.path()).arg("--help").output().unwrap();
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    for cmd in ["reconcile", "watch", "status"] {
        assert!(stdout.contains(cmd), "help must list '{cmd}': {stdout}");
    }
}

#[test]
fn reconcile_consistent_node_persists_ready_status() {
    let server = start("on");
    let dir = tempfile::tempdir().unwrap();
    let node = write_node(dir.path(), "on");

    let output = reconcile(&server, dir.path(), &node, &[]);

    assert!(
        output.status.success(),
        "stderr: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    let status = read_status(&node);
    assert_eq!(status["phase"], "Ready");
    assert_eq!(status["ready"], true);
    assert_eq!(status["actualPowerState"], "on");
    assert_eq!(status["message"], "Node is consistent");
    assert_eq!(status["ipAddress"], "10.254.2.1");
    assert_eq!(status["macAddress"], "ec:0d:9a:00:00:01");
    assert!(status["lastSync"].is_string());
}

#[test]
fn reconcile_drift_sends_transition() {
    let server = start("on");
    let dir = tempfile::tempdir().unwrap();
    let node = write_node(dir.path(), "off");

    let output = reconcile(&server, dir.path(), &node, &["--json"]);

    assert!(output.status.success());
    let stdout: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(stdout["report"]["phase"], "Syncing");
    assert_eq!(stdout["report"]["dispatch"]["result"], "started");
    assert_eq!(stdout["report"]["dispatch"]["operation"], "Off");
    assert!(stdout["error"].is_null());

    let transitions = server.fleet().transitions();
    assert_eq!(transitions.len(), 1);
    assert_eq!(transitions[0].operation, "Off");
    assert_eq!(transitions[0].xnames, vec![XNAME.to_owned()]);
    assert_eq!(read_status(&node)["message"], "Transition to off started");
}

#[test]
fn reconcile_pcs_failure_exits_one_and_records_error() {
    let server = start("on");
    server.fleet().update_faults(|f| f.pcs_status = Some(500));
    let dir = tempfile::tempdir().unwrap();
    let node = write_node(dir.path(), "on");

    let output = reconcile(&server, dir.path(), &node, &[]);

    assert_eq!(output.status.code(), Some(1));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("reconcile failed"), "{stderr}");
    let status = read_status(&node);
    assert_eq!(status["phase"], "PowerStatusError");
    assert_eq!(status["ready"], false);
    assert!(status["message"]
        .as_str()
        .unwrap()
        .starts_with("PCS Error: PCS returned status: 500"));
    assert!(status.get("lastSync").is_none());
}

#[test]
fn reconcile_missing_resource_exits_two() {
    let server = start("on");
    let dir = tempfile::tempdir().unwrap();
    let missing = dir.path().join("absent.json");

    let output = reconcile(&server, dir.path(), &missing, &[]);

    assert_eq!(output.status.code(), Some(2));
}

#[test]
fn reconcile_in_missing_directory_creates_nothing() {
    let server = start("on");
    let dir = tempfile::tempdir().unwrap();
    let typo = dir.path().join("nodse");

    let output = reconcile(&server, dir.path(), &typo.join("compute-2.json"), &[]);

    assert_eq!(output.status.code(), Some(2));
    assert!(!typo.exists());
}

#[test]
fn reconcile_invalid_power_state_exits_two() {
    let server = start("on");
    let dir = tempfile::tempdir().unwrap();
    let node = write_node(dir.path(), "standby");

    let output = reconcile(&server, dir.path(), &node, &[]);

    assert_eq!(output.status.code(), Some(2));
    assert!(server.fleet().transitions().is_empty());
}

#[test]
fn bad_config_exits_three() {
    let server = start("on");
    let dir = tempfile::tempdir().unwrap();
    let node = write_node(dir.path(), "on");
    let config = dir.path().join("config.toml");
    std::fs::write(&config, "timeout_secs = 0\n").unwrap();

    let output = reconcile(
        &server,
        dir.path(),
        &node,
        &["--config", config.to_str().unwrap()],
    );

    assert_eq!(output.status.code(), Some(3));
}

#[test]
fn config_file_supplies_endpoints() {
    let server = start("off");
    let dir = tempfile::tempdir().unwrap();
    let node = write_node(dir.path(), "off");
    let config = dir.path().join("config.toml");
    std::fs::write(
        &config,
        format!(
            "[inventory]\nurl = \"{}\"\nschema = \"redfish-endpoint\"\n[power]\nurl = \"{}\"\n",
            server.smd_url(),
            server.pcs_url()
        ),
    )
    .unwrap();

    let output = nodepower_bin(dir.path())
        .arg("--config")
        .arg(&config)
        .arg("reconcile")
        .arg(&node)
        .output()
        .unwrap();

    assert!(output.status.success());
    let status = read_status(&node);
    assert_eq!(status["phase"], "Ready");
    assert_eq!(status["ipAddress"], "10.254.2.1");
    assert!(status.get("macAddress").is_none());
}

#[test]
fn home_config_is_used_without_flags() {
    let server = start("on");
    let dir = tempfile::tempdir().unwrap();
    let node = write_node(dir.path(), "on");
    let config_dir = dir.path().join(".config/nodepower");
    std::fs::create_dir_all(&config_dir).unwrap();
    std::fs::write(
        config_dir.join("config.toml"),
        format!(
            "[inventory]\nurl = \"{}\"\n[power]\nurl = \"{}\"\n",
            server.smd_url(),
            server.pcs_url()
        ),
    )
    .unwrap();

    let output = nodepower_bin(dir.path())
        .arg("reconcile")
        .arg(&node)
        .output()
        .unwrap();

    assert!(
        output.status.success(),
        "stderr: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    assert_eq!(read_status(&node)["phase"], "Ready");
}

#[test]
fn broken_home_config_exits_three() {
    let server = start("on");
    let dir = tempfile::tempdir().unwrap();
    let node = write_node(dir.path(), "on");
    let config_dir = dir.path().join(".config/nodepower");
    std::fs::create_dir_all(&config_dir).unwrap();
    std::fs::write(config_dir.join("config.toml"), "timeout_secs = \"soon\"\n").unwrap();

    let output = reconcile(&server, dir.path(), &node, &[]);

    assert_eq!(output.status.code(), Some(3));
    assert!(server.fleet().transitions().is_empty());
}

#[test]
fn status_reports_persisted_state() {
    let server = start("on");
    let dir = tempfile::tempdir().unwrap();
    let node = write_node(dir.path(), "on");
    assert!(reconcile(&server, dir.path(), &node, &[]).status.success());

    let output = nodepower_bin(dir.path())
        .arg("--json")
        .arg("status")
        .arg(&node)
        .output()
        .unwrap();

    assert!(output.status.success());
    let stdout: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(stdout["node"], "compute-2");
    assert_eq!(stdout["desired"], "on");
    assert_eq!(stdout["status"]["phase"], "Ready");
}

#[test]
fn watch_converges_within_bounded_passes() {
    let server = start("on");
    let dir = tempfile::tempdir().unwrap();
    let node = write_node(dir.path(), "off");

    let mut cmd = nodepower_bin(dir.path());
    with_endpoints(&mut cmd, &server);
    let output = cmd
        .args(["--json", "watch"])
        .arg(&node)
        .args(["--requeue", "0", "--interval", "0", "--max-passes", "2"])
        .output()
        .unwrap();

    assert!(
        output.status.success(),
        "stderr: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    let lines: Vec<serde_json::Value> = String::from_utf8_lossy(&output.stdout)
        .lines()
        .map(|l| serde_json::from_str(l).unwrap())
        .collect();
    assert_eq!(lines.len(), 2);
    assert_eq!(lines[0]["report"]["phase"], "Syncing");
    assert_eq!(lines[1]["report"]["phase"], "Ready");
    assert_eq!(server.fleet().transitions().len(), 1);
    assert_eq!(read_status(&node)["phase"], "Ready");
}

#[test]
fn watch_backs_off_after_failures() {
    let server = start("on");
    server.fleet().update_faults(|f| f.pcs_status = Some(503));
    let dir = tempfile::tempdir().unwrap();
    let node = write_node(dir.path(), "on");

    let mut cmd = nodepower_bin(dir.path());
    with_endpoints(&mut cmd, &server);
    let started = std::time::Instant::now();
    let output = cmd
        .args(["--json", "watch"])
        .arg(&node)
        .args(["--max-backoff", "1", "--max-passes", "2"])
        .output()
        .unwrap();

    assert_eq!(output.status.code(), Some(1));
    assert!(started.elapsed() >= Duration::from_secs(1));
    let lines: Vec<serde_json::Value> = String::from_utf8_lossy(&output.stdout)
        .lines()
        .map(|l| serde_json::from_str(l).unwrap())
        .collect();
    assert_eq!(lines.len(), 2);
    assert_eq!(lines[0]["nextPassSecs"], 1);
    assert!(lines[1]["error"].as_str().unwrap().contains("503"));
}

#[test]
fn watch_rejects_zero_max_passes() {
    let server = start("on");
    let dir = tempfile::tempdir().unwrap();
    let node = write_node(dir.path(), "off");

    let mut cmd = nodepower_bin(dir.path());
    with_endpoints(&mut cmd, &server);
    let output = cmd
        .arg("watch")
        .arg(&node)
        .args(["--max-passes", "0"])
        .output()
        .unwrap();

    assert_eq!(output.status.code(), Some(2));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("--max-passes"), "{stderr}");
    assert!(server.fleet().transitions().is_empty());
    assert!(read_status(&node).is_null());
}

#[test]
fn lock_file_is_created_next_to_resource() {
    let server = start("on");
    let dir = tempfile::tempdir().unwrap();
    let node = write_node(dir.path(), "on");

    assert!(reconcile(&server, dir.path(), &node, &[]).status.success());

    assert!(dir.path().join("compute-2.json.lock").exists());
}
