use anyhow::Context;
use ciris_client::{CirisClient, Deployment};

pub mod agents;
pub mod config;
pub mod oauth;
pub mod session;
pub mod status;

pub struct CommandContext {
    pub client: CirisClient,
    pub json: bool,
}

impl CommandContext {
    pub fn new(client: CirisClient, json: bool) -> Self {
        Self { client, json }
    }

    /// Point the transport at the selected agent. A fixed `--api-base-url`
    /// skips discovery entirely.
    pub async fn prepare(&self) -> anyhow::Result<Option<Deployment>> {
        if self.client.transport().has_base_override() {
            return Ok(None);
        }
        self.deployment().await.map(Some)
    }

    /// Persisted agent selection, or a fresh probe when there is none.
    pub async fn deployment(&self) -> anyhow::Result<Deployment> {
        self.client
            .restore_or_resolve()
            .await
            .context("failed to resolve CIRIS deployment")
    }

    pub fn require_session(&self) -> anyhow::Result<()> {
        if self.client.auth_store().is_authenticated() {
            Ok(())
        } else {
            anyhow::bail!("not signed in; run `ciris login`")
        }
    }
}
