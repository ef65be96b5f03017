use common::api::{RuntimeControlResponse, SystemHealth};
use reqwest::Method;
use serde::Serialize;
use serde_json::Value;

use crate::error::Result;
use crate::transport::{RequestOptions, Transport};

#[derive(Serialize)]
struct RuntimeControlBody<'r> {
    reason: Option<&'r str>,
}

pub struct SystemResource<'a> {
    transport: &'a Transport,
}

impl<'a> SystemResource<'a> {
    pub(crate) fn new(transport: &'a Transport) -> Self {
        Self { transport }
    }

    /// Unauthenticated liveness check.
    pub async fn health(&self) -> Result<SystemHealth> {
        self.transport
            .request(Method::GET, "/v1/system/health", RequestOptions::new().skip_auth())
            .await
    }

    pub async fn resources(&self) -> Result<Value> {
        self.transport.get("/v1/system/resources").await
    }

    pub async fn services(&self) -> Result<Value> {
        self.transport.get("/v1/system/services").await
    }

    pub async fn pause(&self, reason: Option<&str>) -> Result<RuntimeControlResponse> {
        self.runtime_control("pause", reason).await
    }

    pub async fn resume(&self) -> Result<RuntimeControlResponse> {
        self.runtime_control("resume", None).await
    }

    async fn runtime_control(&self, action: &str, reason: Option<&str>) -> Result<RuntimeControlResponse> {
        let opts = RequestOptions::new().json(&RuntimeControlBody { reason })?;
        self.transport
            .request(Method::POST, &format!("/v1/system/runtime/{action}"), opts)
            .await
    }
}
