use common::api::{GraphNode, MemoryOpResult, MemoryQuery};
use reqwest::Method;
use serde::Serialize;

use super::{Listed, encode_segment};
use crate::error::Result;
use crate::transport::{RequestOptions, Transport};

#[derive(Serialize)]
struct StoreBody<'n> {
    node: &'n GraphNode,
}

pub struct MemoryResource<'a> {
    transport: &'a Transport,
}

impl<'a> MemoryResource<'a> {
    pub(crate) fn new(transport: &'a Transport) -> Self {
        Self { transport }
    }

    pub async fn query(&self, query: &MemoryQuery) -> Result<Vec<GraphNode>> {
        let listed: Listed<GraphNode> = self.transport.post_json("/v1/memory/query", query).await?;
        Ok(listed.into_items())
    }

    pub async fn store(&self, node: &GraphNode) -> Result<MemoryOpResult> {
        self.transport
            .post_json("/v1/memory/store", &StoreBody { node })
            .await
    }

    pub async fn recall(&self, node_id: &str) -> Result<GraphNode> {
        self.transport
            .get(&format!("/v1/memory/{}", encode_segment(node_id)))
            .await
    }

    /// Nodes updated within the last `hours`, optionally limited to one scope.
    pub async fn timeline(&self, hours: Option<u32>, scope: Option<&str>) -> Result<Vec<GraphNode>> {
        let opts = RequestOptions::new()
            .query_opt("hours", hours)
            .query_opt("scope", scope);
        let listed: Listed<GraphNode> = self
            .transport
            .request(Method::GET, "/v1/memory/timeline", opts)
            .await?;
        Ok(listed.into_items())
    }

    pub async fn forget(&self, node_id: &str) -> Result<MemoryOpResult> {
        self.transport
            .delete(&format!("/v1/memory/{}", encode_segment(node_id)))
            .await
    }
}
