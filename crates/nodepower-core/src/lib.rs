//! Reconciliation of a node's power state against SMD and PCS.
//!
//! A pass observes the node through the inventory and power authorities,
//! normalizes what they report into the node's status, decides whether the
//! observed power state has drifted from the desired one, and when it has,
//! asks PCS for a transition. Scheduling passes, backing off after failures,
//! and persisting the resulting status are left to the caller.

pub mod concurrency;
pub mod dispatch;
pub mod drift;
pub mod normalize;
pub mod reconciler;

pub use concurrency::{install_signal_handler, lock_path_for, sleep_unless_cancelled, NodeLock};
pub use dispatch::{dispatch_transition, DispatchOutcome};
pub use drift::{decide, Decision};
pub use normalize::{apply_enrichment, enrichment, operation_token, Enrichment};
pub use reconciler::{NodeReconciler, PassReport};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CoreError {
    /// PCS could not be read, so no decision was made. Retry with backoff.
    #[error("power status unavailable: {0}")]
    PowerStatus(#[from] nodepower_client::ClientError),
    #[error("node lock: {0}")]
    Lock(#[from] std::io::Error),
}
