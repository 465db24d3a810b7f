use nodepower_client::InventoryRecord;
use nodepower_schema::NodeStatus;

/// Network identity extracted from an SMD record.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Enrichment {
    pub ip_address: Option<String>,
    pub mac_address: Option<String>,
}

fn non_empty(s: &str) -> Option<String> {
    let s = s.trim();
    (!s.is_empty()).then(|| s.to_owned())
}

/// Map any known SMD record shape to the fields the status tracks.
pub fn enrichment(record: &InventoryRecord) -> Enrichment {
    match record {
        InventoryRecord::ComponentEndpoint(ce) => Enrichment {
            ip_address: non_empty(&ce.redfish_endpoint_fqdn),
            mac_address: ce.nics().first().and_then(|nic| non_empty(&nic.mac_address)),
        },
        InventoryRecord::RedfishEndpoint(re) => Enrichment {
            ip_address: non_empty(&re.fqdn).or_else(|| non_empty(&re.ip_address)),
            mac_address: None,
        },
    }
}

/// Overwrite status fields the enrichment carries. Fields it lacks keep
/// their last known value.
pub fn apply_enrichment(status: &mut NodeStatus, enrichment: &Enrichment) {
    if let Some(ip) = &enrichment.ip_address {
        status.ip_address = Some(ip.clone());
    }
    if let Some(mac) = &enrichment.mac_address {
        status.mac_address = Some(mac.clone());
    }
}

/// Translate a desired power state into the PCS operation token.
///
/// `off` is spelled out; anything else is title-cased. Desired values are
/// limited to `on`/`off` by resource validation, so this is not re-checked.
pub fn operation_token(desired: &str) -> String {
    if desired == "off" {
        return "Off".to_owned();
    }
    let lower = desired.to_lowercase();
    let mut chars = lower.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}
