use crate::dispatch::{dispatch_transition, DispatchOutcome};
use crate::drift::decide;
use crate::normalize::{apply_enrichment, enrichment};
use crate::CoreError;
use chrono::{DateTime, Utc};
use nodepower_client::{
    Context, EndpointConfig, InventorySource, PcsClient, PowerAuthority, SmdClient,
};
use nodepower_schema::{Node, Phase};
use serde::Serialize;
use tracing::{debug, error, info_span, warn};

type Clock = Box<dyn Fn() -> DateTime<Utc> + Send + Sync>;

/// Summary of one completed pass.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PassReport {
    pub phase: Phase,
    pub ready: bool,
    pub actual_power_state: String,
    pub dispatch: DispatchOutcome,
}

impl PassReport {
    /// `Syncing` means the caller should schedule another pass.
    pub fn needs_requeue(&self) -> bool {
        self.phase == Phase::Syncing
    }
}

/// Drives one node through observe, decide, act.
///
/// Holds no per-node state, so a single reconciler may serve passes over
/// different nodes from several threads at once. Passes over the same node
/// must be serialized by the caller (see [`crate::NodeLock`]).
pub struct NodeReconciler {
    inventory: Box<dyn InventorySource>,
    power: Box<dyn PowerAuthority>,
    clock: Clock,
}

impl NodeReconciler {
    pub fn new(inventory: Box<dyn InventorySource>, power: Box<dyn PowerAuthority>) -> Self {
        Self {
            inventory,
            power,
            clock: Box::new(Utc::now),
        }
    }

    /// Reconciler backed by the HTTP clients for the configured endpoints.
    pub fn from_config(config: &EndpointConfig) -> Self {
        Self::new(
            Box::new(SmdClient::new(config)),
            Box::new(PcsClient::new(config)),
        )
    }

    #[must_use]
    pub fn with_clock(mut self, clock: impl Fn() -> DateTime<Utc> + Send + Sync + 'static) -> Self {
        self.clock = Box::new(clock);
        self
    }

    /// Run one pass over `node`, rewriting `node.status` in place.
    ///
    /// `Err` is returned only when PCS could not be read; the status then
    /// carries `PowerStatusError` and the caller should retry with backoff.
    /// `Ok` means the pass completed, not that the desired state was reached.
    pub fn reconcile(&self, ctx: &Context, node: &mut Node) -> Result<PassReport, CoreError> {
        let span = info_span!("reconcile", node = %node.name(), xname = %node.spec.xname);
        let _enter = span.enter();

        let xname = node.spec.xname.clone();
        let desired = node.spec.power_state;

        match self.inventory.fetch_inventory(ctx, &xname) {
            Ok(record) => {
                let found = enrichment(&record);
                debug!(
                    "inventory record {}: ip={:?} mac={:?}",
                    record.id(),
                    found.ip_address,
                    found.mac_address
                );
                apply_enrichment(&mut node.status, &found);
            }
            Err(e) => {
                error!("failed to fetch SMD data: {e}");
                node.status.message = format!("SMD Error: {e}");
            }
        }

        let actual = match self.power.fetch_power_status(ctx, &xname) {
            Ok(state) => state,
            Err(e) => {
                error!("failed to fetch power status: {e}");
                node.status.phase = Some(Phase::PowerStatusError);
                node.status.ready = false;
                node.status.message = format!("PCS Error: {e}");
                return Err(CoreError::PowerStatus(e));
            }
        };

        let now = (self.clock)();
        node.status.actual_power_state.clone_from(&actual);
        node.status.last_sync = Some(match node.status.last_sync {
            Some(prev) if prev > now => prev,
            _ => now,
        });

        let decision = decide(desired.as_str(), &actual);
        decision.apply(&mut node.status);

        let dispatch = if decision.has_drift() {
            warn!("drift detected: want {desired}, have {actual}");
            dispatch_transition(
                self.power.as_ref(),
                ctx,
                &xname,
                desired,
                &actual,
                &mut node.status,
            )
        } else {
            DispatchOutcome::NotNeeded
        };

        Ok(PassReport {
            phase: decision.phase,
            ready: decision.ready,
            actual_power_state: actual,
            dispatch,
        })
    }
}
