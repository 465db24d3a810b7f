use crate::{Authority, ClientError, Context};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::time::{Duration, Instant};

/// How often a waiting caller re-checks its context for cancellation.
const CANCEL_POLL: Duration = Duration::from_millis(20);

/// Status line and body of a completed HTTP exchange.
pub(crate) struct RawResponse {
    pub status: u16,
    pub reason: String,
    pub body: String,
}

/// Slack given to the agent beyond the call budget, so that `bounded` is the
/// one that reports a timeout and the message does not depend on scheduling.
const AGENT_GRACE: Duration = Duration::from_millis(500);

/// The agent's own timeout only reaps abandoned workers; callers are bounded
/// by [`bounded`].
pub(crate) fn build_agent(timeout: Duration) -> ureq::Agent {
    let config = ureq::Agent::config_builder()
        .timeout_global(Some(timeout.saturating_add(AGENT_GRACE)))
        .http_status_as_error(false)
        .build();
    ureq::Agent::new_with_config(config)
}

pub(crate) fn into_raw(
    authority: Authority,
    resp: ureq::http::Response<ureq::Body>,
) -> Result<RawResponse, ClientError> {
    let status = resp.status();
    let body = resp
        .into_body()
        .read_to_string()
        .map_err(|e| ClientError::unavailable(authority, format!("reading body: {e}")))?;
    Ok(RawResponse {
        status: status.as_u16(),
        reason: status.canonical_reason().unwrap_or_default().to_owned(),
        body,
    })
}

pub(crate) fn get(
    agent: &ureq::Agent,
    authority: Authority,
    url: &str,
) -> Result<RawResponse, ClientError> {
    let resp = agent
        .get(url)
        .header("Accept", "application/json")
        .call()
        .map_err(|e| ClientError::unavailable(authority, e.to_string()))?;
    into_raw(authority, resp)
}

pub(crate) fn post_json(
    agent: &ureq::Agent,
    authority: Authority,
    url: &str,
    payload: &[u8],
) -> Result<RawResponse, ClientError> {
    let resp = agent
        .post(url)
        .header("Content-Type", "application/json")
        .header("Accept", "application/json")
        .send(payload)
        .map_err(|e| ClientError::unavailable(authority, e.to_string()))?;
    into_raw(authority, resp)
}

/// Run a blocking request on a worker thread and wait for it under `ctx`.
///
/// The caller returns as soon as the context is cancelled or the budget is
/// spent, even if the request is still in flight. The abandoned worker is
/// bounded by the agent's own timeout and its result is dropped.
pub(crate) fn bounded<T, F>(
    ctx: &Context,
    authority: Authority,
    per_call: Duration,
    call: F,
) -> Result<T, ClientError>
where
    T: Send + 'static,
    F: FnOnce() -> Result<T, ClientError> + Send + 'static,
{
    if let Some(reason) = ctx.done_reason() {
        return Err(ClientError::unavailable(authority, reason));
    }
    let budget = ctx.budget(per_call);

    let (tx, rx) = mpsc::channel();
    std::thread::Builder::new()
        .name(format!("{authority}-request").to_lowercase())
        .spawn(move || {
            let _ = tx.send(call());
        })
        .map_err(|e| ClientError::unavailable(authority, format!("spawning request: {e}")))?;

    let started = Instant::now();
    loop {
        match rx.recv_timeout(CANCEL_POLL) {
            Ok(result) => return result,
            Err(RecvTimeoutError::Timeout) => {
                if ctx.is_cancelled() {
                    return Err(ClientError::unavailable(authority, "context cancelled"));
                }
                if started.elapsed() >= budget {
                    return Err(ClientError::unavailable(
                        authority,
                        format!("timed out after {}ms", budget.as_millis()),
                    ));
                }
            }
            Err(RecvTimeoutError::Disconnected) => {
                return Err(ClientError::unavailable(
                    authority,
                    "request worker exited without a result",
                ));
            }
        }
    }
}
