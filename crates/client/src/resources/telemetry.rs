use common::api::LogEntry;
use reqwest::Method;
use serde_json::Value;

use super::Listed;
use crate::error::Result;
use crate::transport::{RequestOptions, Transport};

pub struct TelemetryResource<'a> {
    transport: &'a Transport,
}

impl<'a> TelemetryResource<'a> {
    pub(crate) fn new(transport: &'a Transport) -> Self {
        Self { transport }
    }

    pub async fn overview(&self) -> Result<Value> {
        self.transport.get("/v1/telemetry/overview").await
    }

    pub async fn metrics(&self) -> Result<Value> {
        self.transport.get("/v1/telemetry/metrics").await
    }

    pub async fn logs(&self, level: Option<&str>, limit: Option<u32>) -> Result<Vec<LogEntry>> {
        let opts = RequestOptions::new()
            .query_opt("level", level)
            .query_opt("limit", limit);
        let listed: Listed<LogEntry> = self
            .transport
            .request(Method::GET, "/v1/telemetry/logs", opts)
            .await?;
        Ok(listed.into_items())
    }

    /// Prometheus text exposition.
    pub async fn prometheus(&self) -> Result<String> {
        self.transport
            .request_text(Method::GET, "/v1/telemetry/prometheus", RequestOptions::new())
            .await
    }
}
