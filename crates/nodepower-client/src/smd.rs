use crate::http::{self, RawResponse};
use crate::{
    Authority, ClientError, Context, EndpointConfig, InventoryRecord, InventorySchema,
    InventorySource,
};
use nodepower_schema::Xname;
use std::time::Duration;

/// HTTP client for the SMD inventory service.
///
/// Reads a single record from `{url}/Inventory/{collection}/{id}`, where the
/// collection and the id derivation depend on the configured [`InventorySchema`].
#[derive(Clone)]
pub struct SmdClient {
    base_url: String,
    schema: InventorySchema,
    timeout: Duration,
    agent: ureq::Agent,
}

impl SmdClient {
    pub fn new(config: &EndpointConfig) -> Self {
        let timeout = config.timeout();
        Self {
            base_url: config.inventory.url.trim_end_matches('/').to_owned(),
            schema: config.inventory.schema,
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

    pub fn record_url(&self, xname: &Xname) -> String {
        format!(
            "{}/Inventory/{}/{}",
            self.base_url,
            self.schema.collection(),
            self.schema.lookup_id(xname)
        )
    }
}

fn decode(schema: InventorySchema, raw: &RawResponse) -> Result<InventoryRecord, ClientError> {
    if raw.status != 200 {
        return Err(ClientError::UpstreamStatus {
            authority: Authority::Smd,
            status: raw.status,
            reason: raw.reason.clone(),
        });
    }
    InventoryRecord::decode(schema, &raw.body).map_err(|e| ClientError::Decode {
        authority: Authority::Smd,
        reason: e.to_string(),
    })
}

impl InventorySource for SmdClient {
    fn fetch_inventory(
        &self,
        ctx: &Context,
        xname: &Xname,
    ) -> Result<InventoryRecord, ClientError> {
        let url = self.record_url(xname);
        tracing::debug!("GET {url}");
        let agent = self.agent.clone();
        let raw = http::bounded(ctx, Authority::Smd, self.timeout, move || {
            http::get(&agent, Authority::Smd, &url)
        })?;
        decode(self.schema, &raw)
    }
}
