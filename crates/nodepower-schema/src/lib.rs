//! Resource model for nodepower.
//!
//! This crate defines the `Node` resource the reconciler operates on: the
//! operator-declared `NodeSpec`, the observed `NodeStatus`, the `Xname`
//! identifier newtype with its BMC derivation rule, and resource validation.

pub mod node;
pub mod types;

pub use node::{
    validate_xname, Node, NodeSpec, NodeStatus, Phase, PowerState, ResourceMetadata, API_VERSION,
    NODE_KIND, UNKNOWN_POWER_STATE,
};
pub use types::{NodeUid, Xname};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum SchemaError {
    #[error("failed to read resource file: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse resource: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("unsupported kind: {0}, expected Node")]
    UnsupportedKind(String),
    #[error("spec.xname must not be empty")]
    EmptyXname,
    #[error("spec.xname contains invalid character {ch:?}: '{xname}'")]
    InvalidXname { xname: String, ch: char },
    #[error("invalid power state '{0}', expected 'on' or 'off'")]
    InvalidPowerState(String),
}
