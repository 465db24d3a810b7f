use crate::types::{NodeUid, Xname};
use crate::SchemaError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;
use std::str::FromStr;

pub const API_VERSION: &str = "v1";
pub const NODE_KIND: &str = "Node";

/// Sentinel reported as the actual power state when PCS has no record of a node.
pub const UNKNOWN_POWER_STATE: &str = "unknown";

/// Characters that would change the meaning of an upstream URL if they
/// appeared inside an xname.
const XNAME_FORBIDDEN: &[char] = &['/', '?', '#', '&', '%'];

/// Desired power state of a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", try_from = "String")]
pub enum PowerState {
    On,
    Off,
}

impl PowerState {
    pub fn as_str(self) -> &'static str {
        match self {
            PowerState::On => "on",
            PowerState::Off => "off",
        }
    }
}

impl fmt::Display for PowerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PowerState {
    type Err = SchemaError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "on" => Ok(PowerState::On),
            "off" => Ok(PowerState::Off),
            _ => Err(SchemaError::InvalidPowerState(s.to_owned())),
        }
    }
}

impl TryFrom<String> for PowerState {
    type Error = SchemaError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

/// Reconciliation phase recorded in `status.phase`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Phase {
    /// Desired and observed power state agree.
    Ready,
    /// Drift detected; further passes are needed.
    Syncing,
    /// PCS could not be read; the pass failed.
    PowerStatusError,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Phase::Ready => write!(f, "Ready"),
            Phase::Syncing => write!(f, "Syncing"),
            Phase::PowerStatusError => write!(f, "PowerStatusError"),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ResourceMetadata {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uid: Option<NodeUid>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub labels: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

/// Desired state of a node, owned by the operator.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct NodeSpec {
    pub xname: Xname,
    /// Changing this field makes the next pass issue a PCS transition.
    pub power_state: PowerState,
}

/// Observed state of a node, rewritten by every reconciliation pass.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct NodeStatus {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phase: Option<Phase>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub message: String,
    #[serde(default)]
    pub ready: bool,
    /// Power state as reported by PCS, or `unknown`.
    #[serde(default)]
    pub actual_power_state: String,
    /// Management address from SMD. Kept across failed lookups.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ip_address: Option<String>,
    /// Primary MAC from SMD. Kept across failed lookups.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mac_address: Option<String>,
    /// Time of the last successful PCS observation.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_sync: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Node {
    #[serde(default = "default_api_version")]
    pub api_version: String,
    #[serde(default = "default_kind")]
    pub kind: String,
    pub metadata: ResourceMetadata,
    pub spec: NodeSpec,
    #[serde(default)]
    pub status: NodeStatus,
}

fn default_api_version() -> String {
    API_VERSION.to_owned()
}

fn default_kind() -> String {
    NODE_KIND.to_owned()
}

impl Node {
    pub fn new(name: &str, xname: impl Into<Xname>, power_state: PowerState) -> Self {
        Self {
            api_version: default_api_version(),
            kind: default_kind(),
            metadata: ResourceMetadata {
                name: name.to_owned(),
                ..ResourceMetadata::default()
            },
            spec: NodeSpec {
                xname: xname.into(),
                power_state,
            },
            status: NodeStatus::default(),
        }
    }

    pub fn name(&self) -> &str {
        &self.metadata.name
    }

    pub fn uid(&self) -> Option<&NodeUid> {
        self.metadata.uid.as_ref()
    }

    /// Check the invariants the API layer enforces before a node reaches the reconciler.
    pub fn validate(&self) -> Result<(), SchemaError> {
        if self.kind != NODE_KIND {
            return Err(SchemaError::UnsupportedKind(self.kind.clone()));
        }
        validate_xname(&self.spec.xname)
    }

    pub fn from_json_str(content: &str) -> Result<Self, SchemaError> {
        let node: Node = serde_json::from_str(content)?;
        node.validate()?;
        Ok(node)
    }

    pub fn load(path: &Path) -> Result<Self, SchemaError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_json_str(&content)
    }
}

pub fn validate_xname(xname: &Xname) -> Result<(), SchemaError> {
    if xname.is_empty() {
        return Err(SchemaError::EmptyXname);
    }
    if let Some(ch) = xname
        .chars()
        .find(|c| c.is_whitespace() || XNAME_FORBIDDEN.contains(c))
    {
        return Err(SchemaError::InvalidXname {
            xname: xname.to_string(),
            ch,
        });
    }
    Ok(())
}
