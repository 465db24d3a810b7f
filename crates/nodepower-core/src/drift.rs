use nodepower_schema::{NodeStatus, Phase};
use serde::Serialize;

/// Outcome of comparing desired and observed power state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Decision {
    pub phase: Phase,
    pub ready: bool,
    pub message: String,
}

impl Decision {
    pub fn has_drift(&self) -> bool {
        !self.ready
    }

    pub fn apply(&self, status: &mut NodeStatus) {
        status.phase = Some(self.phase);
        status.ready = self.ready;
        status.message.clone_from(&self.message);
    }
}

/// Compare desired and observed power state, ignoring case.
///
/// Stateless: the same inputs always produce the same decision.
pub fn decide(desired: &str, actual: &str) -> Decision {
    if desired.to_lowercase() == actual.to_lowercase() {
        Decision {
            phase: Phase::Ready,
            ready: true,
            message: "Node is consistent".to_owned(),
        }
    } else {
        Decision {
            phase: Phase::Syncing,
            ready: false,
            message: format!("Drift detected: Want {desired}, Have {actual}"),
        }
    }
}
