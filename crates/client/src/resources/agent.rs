use common::api::{
    AgentIdentity, AgentStatus, ChannelInfo, ChannelList, ConversationMessage, InteractRequest,
    InteractResponse,
};
use reqwest::Method;

use super::Listed;
use crate::error::Result;
use crate::transport::{RequestOptions, Transport};

pub struct AgentResource<'a> {
    transport: &'a Transport,
}

impl<'a> AgentResource<'a> {
    pub(crate) fn new(transport: &'a Transport) -> Self {
        Self { transport }
    }

    pub async fn interact(&self, message: &str, channel_id: Option<&str>) -> Result<InteractResponse> {
        let body = InteractRequest {
            message: message.to_string(),
            channel_id: channel_id.map(str::to_string),
        };
        self.transport.post_json("/v1/agent/interact", &body).await
    }

    pub async fn history(&self, limit: Option<u32>) -> Result<Vec<ConversationMessage>> {
        let listed: Listed<ConversationMessage> = self
            .transport
            .request(
                Method::GET,
                "/v1/agent/history",
                RequestOptions::new().query_opt("limit", limit),
            )
            .await?;
        Ok(listed.into_items())
    }

    pub async fn status(&self) -> Result<AgentStatus> {
        self.transport.get("/v1/agent/status").await
    }

    pub async fn identity(&self) -> Result<AgentIdentity> {
        self.transport.get("/v1/agent/identity").await
    }

    pub async fn channels(&self) -> Result<Vec<ChannelInfo>> {
        let list: ChannelList = self.transport.get("/v1/agent/channels").await?;
        Ok(list.channels)
    }
}
