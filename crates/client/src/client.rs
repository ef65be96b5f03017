use std::sync::Arc;

use common::api::User;
use tracing::debug;

use crate::build_http_client;
use crate::clock::{ClockRef, SystemClock};
use crate::config::ClientConfig;
use crate::deployment::{Deployment, DeploymentResolver};
use crate::error::Result;
use crate::rate_limit::RateLimiter;
use crate::resources::{
    AgentResource, AuditResource, AuthResource, ConfigResource, MemoryResource, SystemResource,
    TelemetryResource, UsersResource, WiseAuthorityResource,
};
use crate::session::AuthStore;
use crate::storage::{FileStorage, StorageRef};
use crate::transport::Transport;

/// Wires session, limiter, transport and resolver together.
pub struct CirisClient {
    config: ClientConfig,
    auth: Arc<AuthStore>,
    limiter: Option<Arc<RateLimiter>>,
    transport: Transport,
    resolver: DeploymentResolver,
}

impl CirisClient {
    /// Client persisting state under the configured state directory.
    pub fn new(config: ClientConfig) -> Result<Self> {
        let storage: StorageRef = Arc::new(FileStorage::new(config.state_dir()?));
        Self::with_parts(config, storage, Arc::new(SystemClock))
    }

    pub fn with_parts(config: ClientConfig, storage: StorageRef, clock: ClockRef) -> Result<Self> {
        config.validate()?;
        let http = build_http_client(&config)?;

        let limiter = config
            .rate_limit_config()
            .map(|limit| RateLimiter::new(limit, clock.clone()))
            .transpose()?
            .map(Arc::new);
        let auth = Arc::new(AuthStore::new(storage.clone(), clock));

        let mut builder = Transport::builder(http.clone(), config.origin(), auth.clone())
            .base_override(config.api_base_url.clone())
            .timeout(config.request_timeout());
        if let Some(limiter) = &limiter {
            builder = builder.rate_limiter(limiter.clone());
        }
        let transport = builder.build();
        let resolver = DeploymentResolver::new(&config, http, transport.clone(), storage);

        debug!(
            origin = %config.origin(),
            base_override = ?config.api_base_url,
            throttled = limiter.is_some(),
            "client initialized"
        );
        Ok(Self {
            config,
            auth,
            limiter,
            transport,
            resolver,
        })
    }

    pub fn client_config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn auth_store(&self) -> &Arc<AuthStore> {
        &self.auth
    }

    pub fn rate_limiter(&self) -> Option<&Arc<RateLimiter>> {
        self.limiter.as_ref()
    }

    pub fn transport(&self) -> &Transport {
        &self.transport
    }

    pub fn resolver(&self) -> &DeploymentResolver {
        &self.resolver
    }

    pub async fn resolve(&self) -> Result<Deployment> {
        self.resolver.resolve().await
    }

    /// Reuse the persisted agent selection, probing only when there is none.
    pub async fn restore_or_resolve(&self) -> Result<Deployment> {
        match self.resolver.restore()? {
            Some(deployment) => Ok(deployment),
            None => self.resolver.resolve().await,
        }
    }

    /// Sign in and re-derive the cached user from `/v1/auth/me`.
    pub async fn login(&self, username: &str, password: &str) -> Result<User> {
        self.auth().login(username, password).await?;
        self.auth().get_me().await
    }

    pub async fn logout(&self) -> Result<()> {
        self.auth().logout().await
    }

    pub fn auth(&self) -> AuthResource<'_> {
        AuthResource::new(&self.transport)
    }

    pub fn agent(&self) -> AgentResource<'_> {
        AgentResource::new(&self.transport)
    }

    pub fn memory(&self) -> MemoryResource<'_> {
        MemoryResource::new(&self.transport)
    }

    pub fn system(&self) -> SystemResource<'_> {
        SystemResource::new(&self.transport)
    }

    pub fn config(&self) -> ConfigResource<'_> {
        ConfigResource::new(&self.transport)
    }

    pub fn telemetry(&self) -> TelemetryResource<'_> {
        TelemetryResource::new(&self.transport)
    }

    pub fn audit(&self) -> AuditResource<'_> {
        AuditResource::new(&self.transport)
    }

    pub fn users(&self) -> UsersResource<'_> {
        UsersResource::new(&self.transport)
    }

    pub fn wise_authority(&self) -> WiseAuthorityResource<'_> {
        WiseAuthorityResource::new(&self.transport)
    }
}
