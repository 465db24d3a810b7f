use crate::normalize::operation_token;
use nodepower_client::{Context, PowerAuthority};
use nodepower_schema::{NodeStatus, PowerState, Xname, UNKNOWN_POWER_STATE};
use serde::Serialize;
use tracing::{error, info};

/// What the dispatcher did during a pass.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum DispatchOutcome {
    /// No drift; nothing to send.
    NotNeeded,
    /// Drift against an unknown baseline; nothing was sent.
    SkippedUnknownBaseline,
    /// PCS accepted the transition. Completion is not tracked.
    Started { operation: String },
    /// PCS refused or could not be reached. The next pass retries if drift persists.
    Failed { reason: String },
}

impl DispatchOutcome {
    pub fn was_sent(&self) -> bool {
        matches!(self, DispatchOutcome::Started { .. })
    }
}

/// Request a transition toward `desired`, unless the observed state is unknown.
///
/// Updates `status.message` with the result. Failure is reported in the
/// outcome and never aborts the pass.
pub fn dispatch_transition(
    power: &dyn PowerAuthority,
    ctx: &Context,
    xname: &Xname,
    desired: PowerState,
    actual: &str,
    status: &mut NodeStatus,
) -> DispatchOutcome {
    if actual.eq_ignore_ascii_case(UNKNOWN_POWER_STATE) {
        info!("not sending transition for {xname}: current power state is unknown");
        return DispatchOutcome::SkippedUnknownBaseline;
    }

    let operation = operation_token(desired.as_str());
    match power.send_transition(ctx, xname, &operation) {
        Ok(()) => {
            info!("transition {operation} started for {xname}");
            status.message = format!("Transition to {desired} started");
            DispatchOutcome::Started { operation }
        }
        Err(e) => {
            error!("failed to trigger transition: {e}");
            status.message = format!("Transition failed: {e}");
            DispatchOutcome::Failed {
                reason: e.to_string(),
            }
        }
    }
}
