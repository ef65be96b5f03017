use common::api::{AuditEntry, AuditQuery};
use reqwest::Method;

use super::Listed;
use crate::error::Result;
use crate::transport::{RequestOptions, Transport};

pub struct AuditResource<'a> {
    transport: &'a Transport,
}

fn query_options(query: &AuditQuery) -> RequestOptions {
    RequestOptions::new()
        .query_opt("actor", query.actor.as_deref())
        .query_opt("action", query.action.as_deref())
        .query_opt("start_time", query.start_time.map(|t| t.to_rfc3339()))
        .query_opt("end_time", query.end_time.map(|t| t.to_rfc3339()))
        .query_opt("limit", query.limit)
}

impl<'a> AuditResource<'a> {
    pub(crate) fn new(transport: &'a Transport) -> Self {
        Self { transport }
    }

    pub async fn entries(&self, query: &AuditQuery) -> Result<Vec<AuditEntry>> {
        let listed: Listed<AuditEntry> = self
            .transport
            .request(Method::GET, "/v1/audit/entries", query_options(query))
            .await?;
        Ok(listed.into_items())
    }

    /// Raw export in `format` (`json`, `jsonl` or `csv`).
    pub async fn export(&self, query: &AuditQuery, format: &str) -> Result<Vec<u8>> {
        let opts = query_options(query).query("format", format);
        self.transport
            .request_blob(Method::GET, "/v1/audit/export", opts)
            .await
    }
}
