//! Stand-in for the SMD and PCS services.
//!
//! One HTTP server answers both APIs: SMD routes live under `/hsm/v2`, PCS
//! routes under `/v1`. Node state is held in a [`Fleet`] that tests seed and
//! inspect directly, and [`Faults`] lets a test make either service fail,
//! stall, or return garbage.
//!
//! The [`TestServer`] helper starts a server on a random port for integration testing.

use nodepower_schema::Xname;
use serde::Deserialize;
use serde_json::json;
use std::collections::BTreeMap;
use std::io::Read;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tiny_http::{Header, Method, Response, Server, StatusCode};
use tracing::{debug, info, warn};

pub const SMD_PREFIX: &str = "/hsm/v2";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MockNode {
    pub power_state: String,
    pub fqdn: String,
    pub macs: Vec<String>,
}

impl MockNode {
    pub fn new(power_state: &str) -> Self {
        Self {
            power_state: power_state.to_owned(),
            fqdn: String::new(),
            macs: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_fqdn(mut self, fqdn: &str) -> Self {
        self.fqdn = fqdn.to_owned();
        self
    }

    #[must_use]
    pub fn with_mac(mut self, mac: &str) -> Self {
        self.macs.push(mac.to_owned());
        self
    }
}

/// Failure injection knobs. `None` means behave normally.
#[derive(Debug, Clone, Default)]
pub struct Faults {
    pub smd_status: Option<u16>,
    pub smd_malformed: bool,
    pub smd_delay: Option<Duration>,
    pub pcs_status: Option<u16>,
    pub pcs_malformed: bool,
    pub pcs_delay: Option<Duration>,
    /// Status returned by `POST /v1/transitions` instead of accepting it.
    pub transition_status: Option<u16>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedTransition {
    pub operation: String,
    pub xnames: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct TransitionBody {
    operation: String,
    #[serde(default)]
    location: Vec<TransitionTarget>,
}

#[derive(Debug, Deserialize)]
struct TransitionTarget {
    xname: String,
}

/// Shared state behind the mock services.
#[derive(Debug, Default)]
pub struct Fleet {
    nodes: Mutex<BTreeMap<String, MockNode>>,
    faults: Mutex<Faults>,
    transitions: Mutex<Vec<RecordedTransition>>,
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(std::sync::PoisonError::into_inner)
}

impl Fleet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_node(&self, xname: &str, node: MockNode) {
        lock(&self.nodes).insert(xname.to_owned(), node);
    }

    pub fn remove_node(&self, xname: &str) {
        lock(&self.nodes).remove(xname);
    }

    pub fn node(&self, xname: &str) -> Option<MockNode> {
        lock(&self.nodes).get(xname).cloned()
    }

    pub fn power_state(&self, xname: &str) -> Option<String> {
        self.node(xname).map(|n| n.power_state)
    }

    pub fn set_power_state(&self, xname: &str, state: &str) {
        if let Some(node) = lock(&self.nodes).get_mut(xname) {
            state.clone_into(&mut node.power_state);
        }
    }

    pub fn set_faults(&self, faults: Faults) {
        *lock(&self.faults) = faults;
    }

    pub fn update_faults(&self, f: impl FnOnce(&mut Faults)) {
        f(&mut lock(&self.faults));
    }

    pub fn clear_faults(&self) {
        self.set_faults(Faults::default());
    }

    fn faults(&self) -> Faults {
        lock(&self.faults).clone()
    }

    pub fn transitions(&self) -> Vec<RecordedTransition> {
        lock(&self.transitions).clone()
    }

    fn component_endpoint(&self, id: &str) -> Option<serde_json::Value> {
        let nodes = lock(&self.nodes);
        let node = nodes.get(id)?;
        let nics: Vec<_> = node
            .macs
            .iter()
            .map(|mac| json!({ "MACAddress": mac }))
            .collect();
        Some(json!({
            "ID": id,
            "Type": "Node",
            "RedfishEndpointFQDN": node.fqdn,
            "RedfishSystemInfo": { "EthernetNICInfo": nics },
        }))
    }

    fn redfish_endpoint(&self, bmc: &str) -> Option<serde_json::Value> {
        let nodes = lock(&self.nodes);
        let (_, node) = nodes
            .iter()
            .find(|(xname, _)| Xname::new(xname.as_str()).bmc() == bmc)?;
        Some(json!({
            "ID": bmc,
            "Type": "NodeBMC",
            "FQDN": node.fqdn,
        }))
    }

    fn power_status(&self, xname: Option<&str>) -> serde_json::Value {
        let nodes = lock(&self.nodes);
        let status: Vec<_> = nodes
            .iter()
            .filter(|(id, _)| xname.map_or(true, |x| x == id.as_str()))
            .map(|(id, node)| json!({ "xname": id, "powerState": node.power_state }))
            .collect();
        json!({ "status": status })
    }

    fn apply_transition(&self, body: &TransitionBody) {
        let target = match body.operation.to_ascii_lowercase().as_str() {
            "on" | "soft-restart" | "hard-restart" | "init" => "on",
            _ => "off",
        };
        {
            let mut nodes = lock(&self.nodes);
            for loc in &body.location {
                if let Some(node) = nodes.get_mut(&loc.xname) {
                    target.clone_into(&mut node.power_state);
                }
            }
        }
        lock(&self.transitions).push(RecordedTransition {
            operation: body.operation.clone(),
            xnames: body.location.iter().map(|l| l.xname.clone()).collect(),
        });
    }
}

/// A parsed request path.
#[derive(Debug, PartialEq, Eq)]
pub enum Route<'a> {
    Health,
    ComponentEndpoint(&'a str),
    RedfishEndpoint(&'a str),
    PowerStatus(Option<&'a str>),
    Transitions,
}

pub fn parse_route(url: &str) -> Option<Route<'_>> {
    let (path, query) = url.split_once('?').unwrap_or((url, ""));
    if path == "/health" {
        return Some(Route::Health);
    }
    if path == "/v1/power-status" {
        let xname = query
            .split('&')
            .find_map(|pair| pair.strip_prefix("xname="))
            .filter(|x| !x.is_empty());
        return Some(Route::PowerStatus(xname));
    }
    if path == "/v1/transitions" {
        return Some(Route::Transitions);
    }
    let inventory = path.strip_prefix(SMD_PREFIX)?.strip_prefix("/Inventory/")?;
    let (collection, id) = inventory.split_once('/')?;
    if id.is_empty() || id.contains('/') {
        return None;
    }
    match collection {
        "ComponentEndpoints" => Some(Route::ComponentEndpoint(id)),
        "RedfishEndpoints" => Some(Route::RedfishEndpoint(id)),
        _ => None,
    }
}

fn respond_text(req: tiny_http::Request, code: u16, msg: &str) {
    let _ = req.respond(Response::from_string(msg).with_status_code(StatusCode(code)));
}

fn respond_json(req: tiny_http::Request, code: u16, value: &serde_json::Value) {
    let mut resp = Response::from_string(value.to_string()).with_status_code(StatusCode(code));
    if let Ok(header) = Header::from_bytes("Content-Type", "application/json") {
        resp = resp.with_header(header);
    }
    let _ = req.respond(resp);
}

fn stall(delay: Option<Duration>) {
    if let Some(d) = delay {
        std::thread::sleep(d);
    }
}

fn handle_inventory(fleet: &Fleet, req: tiny_http::Request, record: Option<serde_json::Value>) {
    let faults = fleet.faults();
    stall(faults.smd_delay);
    if let Some(code) = faults.smd_status {
        respond_text(req, code, "injected SMD failure");
    } else if faults.smd_malformed {
        respond_text(req, 200, "{\"ID\":");
    } else {
        match record {
            Some(value) => respond_json(req, 200, &value),
            None => respond_text(req, 404, "not found"),
        }
    }
}

fn handle_power_status(fleet: &Fleet, req: tiny_http::Request, xname: Option<&str>) {
    let faults = fleet.faults();
    stall(faults.pcs_delay);
    if let Some(code) = faults.pcs_status {
        respond_text(req, code, "injected PCS failure");
    } else if faults.pcs_malformed {
        respond_text(req, 200, "not json");
    } else {
        respond_json(req, 200, &fleet.power_status(xname));
    }
}

fn handle_transition(fleet: &Fleet, mut req: tiny_http::Request) {
    let mut body = String::new();
    if req.as_reader().read_to_string(&mut body).is_err() {
        respond_text(req, 500, "read error");
        return;
    }
    let faults = fleet.faults();
    stall(faults.pcs_delay);
    if let Some(code) = faults.transition_status {
        respond_text(req, code, "transition refused");
        return;
    }
    match serde_json::from_str::<TransitionBody>(&body) {
        Ok(parsed) if !parsed.location.is_empty() => {
            info!("transition {} for {} node(s)", parsed.operation, parsed.location.len());
            fleet.apply_transition(&parsed);
            let id = fleet.transitions().len();
            respond_json(
                req,
                200,
                &json!({ "transitionID": format!("t-{id:04}"), "operation": parsed.operation }),
            );
        }
        Ok(_) => respond_text(req, 400, "location must not be empty"),
        Err(e) => {
            warn!("bad transition body: {e}");
            respond_text(req, 400, &format!("invalid body: {e}"));
        }
    }
}

/// Handle a single HTTP request, dispatching to the appropriate route handler.
pub fn handle_request(fleet: &Fleet, req: tiny_http::Request) {
    let method = req.method().clone();
    let url = req.url().to_owned();
    debug!("{method} {url}");

    match (parse_route(&url), &method) {
        (Some(Route::Health), Method::Get) => respond_json(req, 200, &json!({ "status": "ok" })),
        (Some(Route::ComponentEndpoint(id)), Method::Get) => {
            let record = fleet.component_endpoint(id);
            handle_inventory(fleet, req, record);
        }
        (Some(Route::RedfishEndpoint(id)), Method::Get) => {
            let record = fleet.redfish_endpoint(id);
            handle_inventory(fleet, req, record);
        }
        (Some(Route::PowerStatus(xname)), Method::Get) => {
            handle_power_status(fleet, req, xname);
        }
        (Some(Route::Transitions), Method::Post) => handle_transition(fleet, req),
        (Some(_), _) => respond_text(req, 405, "method not allowed"),
        (None, _) => respond_text(req, 404, "not found"),
    }
}

/// Serve until the process exits. Each request runs on its own thread so an
/// injected delay does not hold up other requests.
pub fn run_server(fleet: &Arc<Fleet>, addr: &str) -> Result<(), String> {
    let server = Server::http(addr).map_err(|e| format!("failed to bind {addr}: {e}"))?;
    serve(&server, fleet);
    Ok(())
}

fn serve(server: &Server, fleet: &Arc<Fleet>) {
    for request in server.incoming_requests() {
        let fleet = Arc::clone(fleet);
        std::thread::spawn(move || handle_request(&fleet, request));
    }
}

/// A mock SMD + PCS on a random port in a background thread.
///
/// Dropping the `TestServer` stops accepting requests.
pub struct TestServer {
    pub url: String,
    pub port: u16,
    fleet: Arc<Fleet>,
    server: Arc<Server>,
    _handle: std::thread::JoinHandle<()>,
}

impl TestServer {
    /// Binds to `127.0.0.1:0`.
    pub fn start() -> Self {
        let server =
            Arc::new(Server::http("127.0.0.1:0").expect("failed to bind test HTTP server"));
        let port = server
            .server_addr()
            .to_ip()
            .expect("not an IP addr")
            .port();
        let url = format!("http://127.0.0.1:{port}");

        let fleet = Arc::new(Fleet::new());
        let srv = Arc::clone(&server);
        let shared = Arc::clone(&fleet);
        let handle = std::thread::spawn(move || serve(&srv, &shared));

        Self {
            url,
            port,
            fleet,
            server,
            _handle: handle,
        }
    }

    pub fn smd_url(&self) -> String {
        format!("{}{SMD_PREFIX}", self.url)
    }

    pub fn pcs_url(&self) -> String {
        self.url.clone()
    }

    pub fn fleet(&self) -> &Fleet {
        &self.fleet
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.server.unblock();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_inventory_routes() {
        assert_eq!(
            parse_route("/hsm/v2/Inventory/ComponentEndpoints/x1000c0s0b0n0"),
            Some(Route::ComponentEndpoint("x1000c0s0b0n0"))
        );
        assert_eq!(
            parse_route("/hsm/v2/Inventory/RedfishEndpoints/x1000c0s0b0"),
            Some(Route::RedfishEndpoint("x1000c0s0b0"))
        );
        assert_eq!(parse_route("/hsm/v2/Inventory/Hardware/x1"), None);
        assert_eq!(parse_route("/hsm/v2/Inventory/ComponentEndpoints/"), None);
    }

    #[test]
    fn parse_power_routes() {
        assert_eq!(
            parse_route("/v1/power-status?xname=x1000c0s0b0n0"),
            Some(Route::PowerStatus(Some("x1000c0s0b0n0")))
        );
        assert_eq!(
            parse_route("/v1/power-status"),
            Some(Route::PowerStatus(None))
        );
        assert_eq!(parse_route("/v1/transitions"), Some(Route::Transitions));
        assert_eq!(parse_route("/v2/transitions"), None);
    }

    #[test]
    fn power_status_filters_by_xname() {
        let fleet = Fleet::new();
        fleet.add_node("x1000c0s0b0n0", MockNode::new("on"));
        fleet.add_node("x1000c0s1b0n0", MockNode::new("off"));
        let v = fleet.power_status(Some("x1000c0s1b0n0"));
        assert_eq!(v["status"].as_array().unwrap().len(), 1);
        assert_eq!(v["status"][0]["powerState"], "off");
        let v = fleet.power_status(Some("x9"));
        assert!(v["status"].as_array().unwrap().is_empty());
    }

    #[test]
    fn redfish_endpoint_found_through_bmc() {
        let fleet = Fleet::new();
        fleet.add_node("x1000c0s0b0n0", MockNode::new("on").with_fqdn("10.254.1.4"));
        let v = fleet.redfish_endpoint("x1000c0s0b0").unwrap();
        assert_eq!(v["FQDN"], "10.254.1.4");
        assert!(fleet.redfish_endpoint("x1000c0s9b0").is_none());
    }

    #[test]
    fn transition_updates_power_and_is_recorded() {
        let fleet = Fleet::new();
        fleet.add_node("x1", MockNode::new("on"));
        fleet.apply_transition(&TransitionBody {
            operation: "Off".to_owned(),
            location: vec![TransitionTarget {
                xname: "x1".to_owned(),
            }],
        });
        assert_eq!(fleet.power_state("x1").as_deref(), Some("off"));
        assert_eq!(
            fleet.transitions(),
            vec![RecordedTransition {
                operation: "Off".to_owned(),
                xnames: vec!["x1".to_owned()],
            }]
        );
    }

    #[test]
    fn test_server_answers_health_and_injected_faults() {
        let server = TestServer::start();
        let body = ureq::get(&format!("{}/health", server.url))
            .call()
            .unwrap()
            .into_body()
            .read_to_string()
            .unwrap();
        assert!(body.contains("ok"));

        server.fleet().add_node("x1", MockNode::new("on"));
        server.fleet().update_faults(|f| f.pcs_status = Some(503));
        let result = ureq::get(&format!("{}/v1/power-status?xname=x1", server.url)).call();
        assert!(matches!(result, Err(ureq::Error::StatusCode(503))));
    }
}
