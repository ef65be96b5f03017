use common::api::{ConfigItem, ConfigList, ConfigUpdate};
use serde_json::Value;

use super::encode_segment;
use crate::error::Result;
use crate::transport::Transport;

pub struct ConfigResource<'a> {
    transport: &'a Transport,
}

impl<'a> ConfigResource<'a> {
    pub(crate) fn new(transport: &'a Transport) -> Self {
        Self { transport }
    }

    pub async fn list(&self) -> Result<Vec<ConfigItem>> {
        let list: ConfigList = self.transport.get("/v1/config").await?;
        Ok(list.configs)
    }

    pub async fn get(&self, key: &str) -> Result<ConfigItem> {
        self.transport
            .get(&format!("/v1/config/{}", encode_segment(key)))
            .await
    }

    /// Set `key` to a plain JSON value; the server wraps it by type.
    pub async fn set(&self, key: &str, value: Value, reason: Option<&str>) -> Result<ConfigItem> {
        let body = ConfigUpdate {
            value,
            reason: reason.map(str::to_string),
        };
        self.transport
            .put_json(&format!("/v1/config/{}", encode_segment(key)), &body)
            .await
    }

    pub async fn delete(&self, key: &str) -> Result<()> {
        let _: Value = self
            .transport
            .delete(&format!("/v1/config/{}", encode_segment(key)))
            .await?;
        Ok(())
    }
}
