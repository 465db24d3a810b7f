//! Clients for the two authorities a node reconciliation depends on.
//!
//! SMD (the inventory service) is read for network identity; PCS (the power
//! control service) is read for the current power state and written to start
//! power transitions. Both are reached through traits so the reconciler can be
//! driven by the HTTP implementations in [`smd`] and [`pcs`] or by in-memory
//! fakes. Every call takes a [`Context`] and is bounded by a per-call timeout.

pub mod config;
pub mod context;
mod http;
pub mod inventory;
pub mod pcs;
pub mod smd;

pub use config::{ConfigError, EndpointConfig, InventoryConfig, PowerConfig};
pub use context::Context;
pub use inventory::{ComponentEndpoint, InventoryRecord, InventorySchema, RedfishEndpoint};
pub use pcs::PcsClient;
pub use smd::SmdClient;

use nodepower_schema::Xname;
use std::fmt;
use std::time::Duration;
use thiserror::Error;

/// Upper bound on a single request to either authority.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

/// The external service a request was addressed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Authority {
    Smd,
    Pcs,
}

impl fmt::Display for Authority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Authority::Smd => write!(f, "SMD"),
            Authority::Pcs => write!(f, "PCS"),
        }
    }
}

#[derive(Debug, Clone, Error)]
pub enum ClientError {
    #[error("{authority} unavailable: {reason}")]
    UpstreamUnavailable { authority: Authority, reason: String },
    #[error("{authority} returned status: {status} {reason}")]
    UpstreamStatus {
        authority: Authority,
        status: u16,
        reason: String,
    },
    #[error("failed to decode {authority} response: {reason}")]
    Decode { authority: Authority, reason: String },
    #[error("PCS error {status}: {body}")]
    TransitionRejected { status: u16, body: String },
}

impl ClientError {
    pub(crate) fn unavailable(authority: Authority, reason: impl Into<String>) -> Self {
        ClientError::UpstreamUnavailable {
            authority,
            reason: reason.into(),
        }
    }

    pub fn authority(&self) -> Authority {
        match self {
            ClientError::UpstreamUnavailable { authority, .. }
            | ClientError::UpstreamStatus { authority, .. }
            | ClientError::Decode { authority, .. } => *authority,
            ClientError::TransitionRejected { .. } => Authority::Pcs,
        }
    }
}

/// Read access to the inventory authority.
pub trait InventorySource: Send + Sync {
    /// Fetch the inventory record that describes `xname`.
    fn fetch_inventory(&self, ctx: &Context, xname: &Xname)
        -> Result<InventoryRecord, ClientError>;
}

/// Read/write access to the power authority.
pub trait PowerAuthority: Send + Sync {
    /// Current power state of `xname`, or `unknown` when PCS holds no record for it.
    fn fetch_power_status(&self, ctx: &Context, xname: &Xname) -> Result<String, ClientError>;

    /// Ask PCS to start a transition. `operation` is already in PCS vocabulary (`On`, `Off`).
    fn send_transition(
        &self,
        ctx: &Context,
        xname: &Xname,
        operation: &str,
    ) -> Result<(), ClientError>;
}
