use crate::http::{self, RawResponse};
use crate::{Authority, ClientError, Context, EndpointConfig, PowerAuthority};
use nodepower_schema::{Xname, UNKNOWN_POWER_STATE};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Body of `GET /v1/power-status`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PowerStatusResponse {
    #[serde(default)]
    pub status: Vec<PowerStatusEntry>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PowerStatusEntry {
    #[serde(default)]
    pub xname: String,
    #[serde(default)]
    pub power_state: String,
}

/// Body of `POST /v1/transitions`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransitionRequest {
    pub operation: String,
    pub location: Vec<TransitionLocation>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransitionLocation {
    pub xname: String,
}

impl TransitionRequest {
    pub fn single(operation: &str, xname: &Xname) -> Self {
        Self {
            operation: operation.to_owned(),
            location: vec![TransitionLocation {
                xname: xname.to_string(),
            }],
        }
    }

    /// Serialized request body. A failure here never reached PCS, so it is
    /// reported as the request not being sent rather than as a bad reply.
    pub fn to_body(&self) -> Result<Vec<u8>, ClientError> {
        serde_json::to_vec(self).map_err(encode_error)
    }
}

fn encode_error(e: serde_json::Error) -> ClientError {
    ClientError::unavailable(Authority::Pcs, format!("encoding transition request: {e}"))
}

impl PowerStatusResponse {
    /// Power state reported for `xname`, or the `unknown` sentinel when PCS
    /// has no usable record for it.
    ///
    /// Entries without an xname are taken to answer the filtered query.
    pub fn power_state_of(&self, xname: &Xname) -> String {
        self.status
            .iter()
            .find(|entry| entry.xname.is_empty() || entry.xname.eq_ignore_ascii_case(xname))
            .map(|entry| entry.power_state.trim())
            .filter(|state| !state.is_empty())
            .unwrap_or(UNKNOWN_POWER_STATE)
            .to_owned()
    }
}

/// HTTP client for the PCS power-control service.
#[derive(Clone)]
pub struct PcsClient {
    base_url: String,
    timeout: Duration,
    agent: ureq::Agent,
}

impl PcsClient {
    pub fn new(config: &EndpointConfig) -> Self {
        let timeout = config.timeout();
        Self {
            base_url: config.power.url.trim_end_matches('/').to_owned(),
            timeout,
            agent: http::build_agent(timeout),
        }
    }

    /// Override the per-call timeout from the config.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self.agent = http::build_agent(timeout);
        self
    }

    pub fn status_url(&self, xname: &Xname) -> String {
        format!("{}/v1/power-status?xname={xname}", self.base_url)
    }

    pub fn transitions_url(&self) -> String {
        format!("{}/v1/transitions", self.base_url)
    }
}

fn decode_status(xname: &Xname, raw: &RawResponse) -> Result<String, ClientError> {
    if raw.status != 200 {
        return Err(ClientError::UpstreamStatus {
            authority: Authority::Pcs,
            status: raw.status,
            reason: raw.reason.clone(),
        });
    }
    let parsed: PowerStatusResponse =
        serde_json::from_str(&raw.body).map_err(|e| ClientError::Decode {
            authority: Authority::Pcs,
            reason: e.to_string(),
        })?;
    Ok(parsed.power_state_of(xname))
}

fn check_transition(raw: RawResponse) -> Result<(), ClientError> {
    match raw.status {
        200 | 202 => Ok(()),
        status => Err(ClientError::TransitionRejected {
            status,
            body: raw.body,
        }),
    }
}

impl PowerAuthority for PcsClient {
    fn fetch_power_status(&self, ctx: &Context, xname: &Xname) -> Result<String, ClientError> {
        let url = self.status_url(xname);
        tracing::debug!("GET {url}");
        let agent = self.agent.clone();
        let raw = http::bounded(ctx, Authority::Pcs, self.timeout, move || {
            http::get(&agent, Authority::Pcs, &url)
        })?;
        decode_status(xname, &raw)
    }

    fn send_transition(
        &self,
        ctx: &Context,
        xname: &Xname,
        operation: &str,
    ) -> Result<(), ClientError> {
        let url = self.transitions_url();
        let payload = TransitionRequest::single(operation, xname).to_body()?;
        tracing::debug!("POST {url} ({operation} {xname})");
        let agent = self.agent.clone();
        let raw = http::bounded(ctx, Authority::Pcs, self.timeout, move || {
            http::post_json(&agent, Authority::Pcs, &url, &payload)
        })?;
        check_transition(raw)
    }
}
