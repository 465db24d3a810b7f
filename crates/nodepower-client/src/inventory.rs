//! SMD record shapes.
//!
//! SMD has exposed node identity through more than one record type across
//! releases. Each known shape is a variant of [`InventoryRecord`]; supporting a
//! new shape means adding a variant and a schema, not changing the callers.

use nodepower_schema::Xname;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Which SMD collection to read node identity from.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum InventorySchema {
    /// `Inventory/ComponentEndpoints/{node}`: carries NIC MAC addresses.
    #[default]
    ComponentEndpoint,
    /// `Inventory/RedfishEndpoints/{bmc}`: keyed by BMC, no MAC.
    RedfishEndpoint,
}

impl InventorySchema {
    pub fn collection(self) -> &'static str {
        match self {
            InventorySchema::ComponentEndpoint => "ComponentEndpoints",
            InventorySchema::RedfishEndpoint => "RedfishEndpoints",
        }
    }

    /// Identifier the collection is keyed by for the given node.
    pub fn lookup_id(self, xname: &Xname) -> Xname {
        match self {
            InventorySchema::ComponentEndpoint => xname.clone(),
            InventorySchema::RedfishEndpoint => xname.bmc(),
        }
    }
}

impl fmt::Display for InventorySchema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InventorySchema::ComponentEndpoint => write!(f, "component-endpoint"),
            InventorySchema::RedfishEndpoint => write!(f, "redfish-endpoint"),
        }
    }
}

impl std::str::FromStr for InventorySchema {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "component-endpoint" => Ok(InventorySchema::ComponentEndpoint),
            "redfish-endpoint" => Ok(InventorySchema::RedfishEndpoint),
            other => Err(format!(
                "unknown inventory schema '{other}', expected 'component-endpoint' or 'redfish-endpoint'"
            )),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComponentEndpoint {
    #[serde(rename = "ID", default)]
    pub id: String,
    /// Management address of the node's Redfish endpoint.
    #[serde(rename = "RedfishEndpointFQDN", default)]
    pub redfish_endpoint_fqdn: String,
    #[serde(
        rename = "RedfishSystemInfo",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub redfish_system_info: Option<RedfishSystemInfo>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RedfishSystemInfo {
    #[serde(rename = "EthernetNICInfo", default)]
    pub ethernet_nic_info: Option<Vec<EthernetNic>>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EthernetNic {
    #[serde(rename = "MACAddress", default)]
    pub mac_address: String,
}

impl ComponentEndpoint {
    pub fn nics(&self) -> &[EthernetNic] {
        self.redfish_system_info
            .as_ref()
            .and_then(|info| info.ethernet_nic_info.as_deref())
            .unwrap_or_default()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RedfishEndpoint {
    #[serde(rename = "ID", default)]
    pub id: String,
    #[serde(rename = "FQDN", default)]
    pub fqdn: String,
    #[serde(rename = "IPAddress", default, skip_serializing_if = "String::is_empty")]
    pub ip_address: String,
}

/// One SMD record in whichever shape the configured schema returns.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InventoryRecord {
    ComponentEndpoint(ComponentEndpoint),
    RedfishEndpoint(RedfishEndpoint),
}

impl InventoryRecord {
    pub fn decode(schema: InventorySchema, body: &str) -> Result<Self, serde_json::Error> {
        Ok(match schema {
            InventorySchema::ComponentEndpoint => {
                InventoryRecord::ComponentEndpoint(serde_json::from_str(body)?)
            }
            InventorySchema::RedfishEndpoint => {
                InventoryRecord::RedfishEndpoint(serde_json::from_str(body)?)
            }
        })
    }

    pub fn id(&self) -> &str {
        match self {
            InventoryRecord::ComponentEndpoint(ce) => &ce.id,
            InventoryRecord::RedfishEndpoint(re) => &re.id,
        }
    }
}
