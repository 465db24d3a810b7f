use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Cancellation and deadline scope for one reconciliation pass.
///
/// Clones share the cancellation flag, so cancelling any clone aborts calls
/// made through every other clone.
#[derive(Debug, Clone, Default)]
pub struct Context {
    cancelled: Arc<AtomicBool>,
    deadline: Option<Instant>,
}

impl Context {
    /// A context that is never cancelled and has no deadline.
    pub fn background() -> Self {
        Self::default()
    }

    pub fn with_timeout(timeout: Duration) -> Self {
        Self::background().child_with_timeout(timeout)
    }

    /// Derive a context that shares this one's cancellation and expires no
    /// later than `timeout` from now.
    #[must_use]
    pub fn child_with_timeout(&self, timeout: Duration) -> Self {
        let candidate = Instant::now() + timeout;
        let deadline = match self.deadline {
            Some(existing) if existing < candidate => existing,
            _ => candidate,
        };
        Self {
            cancelled: Arc::clone(&self.cancelled),
            deadline: Some(deadline),
        }
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Time left before the deadline; `None` when there is no deadline.
    pub fn remaining(&self) -> Option<Duration> {
        self.deadline
            .map(|d| d.saturating_duration_since(Instant::now()))
    }

    /// Why this context can no longer be used, if it can't.
    pub fn done_reason(&self) -> Option<&'static str> {
        if self.is_cancelled() {
            Some("context cancelled")
        } else if self.remaining().is_some_and(|r| r.is_zero()) {
            Some("context deadline exceeded")
        } else {
            None
        }
    }

    /// Effective bound for one call: the per-call timeout, shortened by the deadline.
    pub(crate) fn budget(&self, per_call: Duration) -> Duration {
        match self.remaining() {
            Some(left) => left.min(per_call),
            None => per_call,
        }
    }
}
