//! Works out which agent API to talk to.
//!
//! A deployment either sits behind a fleet manager (agents are routed under
//! `<origin>/api/<agent_id>`) or is a single agent served from the origin.
//! [`DeploymentResolver::resolve`] probes the manager once per cycle and falls
//! back to standalone on any probe failure.

use std::fmt;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use common::api::{AgentDescriptor, AgentIdentity, AgentListing};
use reqwest::{Client, Method, StatusCode, Url};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::config::ClientConfig;
use crate::error::{CirisError, Result};
use crate::resources::encode_segment;
use crate::storage::{SELECTED_AGENT_KEY, StorageRef, load_json, save_json};
use crate::telemetry;
use crate::transport::{RequestOptions, Transport, unwrap_envelope};

pub const IDENTITY_PATH: &str = "/v1/agent/identity";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeploymentMode {
    Managed,
    Standalone,
}

impl fmt::Display for DeploymentMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeploymentMode::Managed => f.write_str("managed"),
            DeploymentMode::Standalone => f.write_str("standalone"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolverState {
    Unresolved,
    Probing,
    Managed,
    Standalone,
}

impl From<DeploymentMode> for ResolverState {
    fn from(mode: DeploymentMode) -> Self {
        match mode {
            DeploymentMode::Managed => ResolverState::Managed,
            DeploymentMode::Standalone => ResolverState::Standalone,
        }
    }
}

/// Persisted agent choice, restored on the next start without probing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SelectedAgent {
    pub agent_id: String,
    pub agent_name: String,
    pub mode: DeploymentMode,
}

/// Outcome of one resolve cycle (or of a restore).
#[derive(Debug, Clone, PartialEq)]
pub struct Deployment {
    pub mode: DeploymentMode,
    pub origin: String,
    pub agents: Vec<AgentDescriptor>,
    pub selected: Option<AgentDescriptor>,
    /// Base URL computed for the selected agent.
    pub base_url: String,
}

#[derive(Debug)]
struct ResolverInner {
    state: ResolverState,
    deployment: Option<Deployment>,
}

pub struct DeploymentResolver {
    origin: String,
    manager_path: String,
    probe_timeout: Duration,
    probe_client: Client,
    transport: Transport,
    storage: StorageRef,
    inner: Mutex<ResolverInner>,
}

impl DeploymentResolver {
    pub fn new(cfg: &ClientConfig, probe_client: Client, transport: Transport, storage: StorageRef) -> Self {
        Self {
            origin: cfg.origin().to_string(),
            manager_path: cfg.manager_path.clone(),
            probe_timeout: cfg.probe_timeout(),
            probe_client,
            transport,
            storage,
            inner: Mutex::new(ResolverInner {
                state: ResolverState::Unresolved,
                deployment: None,
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, ResolverInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn origin(&self) -> &str {
        &self.origin
    }

    pub fn state(&self) -> ResolverState {
        self.lock().state
    }

    pub fn deployment(&self) -> Option<Deployment> {
        self.lock().deployment.clone()
    }

    pub fn mode(&self) -> Option<DeploymentMode> {
        self.lock().deployment.as_ref().map(|d| d.mode)
    }

    /// The persisted selection, if any.
    pub fn persisted_selection(&self) -> Result<Option<SelectedAgent>> {
        load_json(self.storage.as_ref(), SELECTED_AGENT_KEY)
    }

    pub fn base_url_for(&self, mode: DeploymentMode, agent_id: Option<&str>) -> String {
        match (mode, agent_id) {
            (DeploymentMode::Managed, Some(id)) => {
                format!("{}/api/{}", self.origin, encode_segment(id))
            }
            _ => self.origin.clone(),
        }
    }

    /// Probe the manager and configure the transport for the chosen agent.
    pub async fn resolve(&self) -> Result<Deployment> {
        self.lock().state = ResolverState::Probing;

        let outcome = match self.probe_manager().await {
            Some(agents) if !agents.is_empty() => self.resolve_managed(agents),
            Some(_) => {
                info!(origin = %self.origin, "manager lists no agents; using standalone");
                self.resolve_standalone().await
            }
            None => self.resolve_standalone().await,
        };

        let mut inner = self.lock();
        match outcome {
            Ok(deployment) => {
                inner.state = deployment.mode.into();
                inner.deployment = Some(deployment.clone());
                Ok(deployment)
            }
            Err(err) => {
                inner.state = ResolverState::Unresolved;
                inner.deployment = None;
                Err(err)
            }
        }
    }

    async fn probe_manager(&self) -> Option<Vec<AgentDescriptor>> {
        let url = format!("{}{}", self.origin, self.manager_path);
        let res = match self
            .probe_client
            .get(&url)
            .timeout(self.probe_timeout)
            .send()
            .await
        {
            Ok(res) => res,
            Err(err) => {
                debug!(%url, %err, timed_out = err.is_timeout(), "manager probe failed");
                telemetry::record_probe("unreachable");
                return None;
            }
        };

        if !res.status().is_success() {
            debug!(%url, status = %res.status(), "manager probe rejected");
            telemetry::record_probe("rejected");
            return None;
        }

        let listing = res
            .json::<Value>()
            .await
            .map_err(|err| err.to_string())
            .and_then(|value| {
                serde_json::from_value::<AgentListing>(unwrap_envelope(value)).map_err(|err| err.to_string())
            });
        match listing {
            Ok(listing) => {
                telemetry::record_probe("listed");
                Some(listing.into_agents())
            }
            Err(err) => {
                debug!(%url, %err, "manager probe returned an unrecognized body");
                telemetry::record_probe("invalid");
                None
            }
        }
    }

    fn resolve_managed(&self, agents: Vec<AgentDescriptor>) -> Result<Deployment> {
        let persisted = match self.persisted_selection() {
            Ok(selection) => selection,
            Err(err) => {
                warn!(%err, "ignoring unreadable agent selection");
                None
            }
        };
        let selected = persisted
            .as_ref()
            .and_then(|sel| agents.iter().find(|a| a.agent_id == sel.agent_id))
            .or_else(|| agents.first())
            .cloned();
        let Some(selected) = selected else {
            return Err(CirisError::deployment("manager listed no agents"));
        };

        let base_url = self.base_url_for(DeploymentMode::Managed, Some(&selected.agent_id));
        self.transport.set_base_url(base_url.clone());
        self.persist(&selected, DeploymentMode::Managed)?;
        info!(
            agent_id = %selected.agent_id,
            agents = agents.len(),
            %base_url,
            "resolved managed deployment"
        );
        Ok(Deployment {
            mode: DeploymentMode::Managed,
            origin: self.origin.clone(),
            agents,
            selected: Some(selected),
            base_url,
        })
    }

    async fn resolve_standalone(&self) -> Result<Deployment> {
        let base_url = self.base_url_for(DeploymentMode::Standalone, None);
        // The identity lives under the origin; undo the switch if it fails.
        let previous_base = self.transport.set_base_url(base_url.clone());

        let opts = RequestOptions::new().refresh_on_unauthorized(false);
        let selected = match self
            .transport
            .request::<AgentIdentity>(Method::GET, IDENTITY_PATH, opts)
            .await
        {
            Ok(identity) => Some(AgentDescriptor {
                agent_id: identity.agent_id,
                agent_name: identity.name,
                status: "running".into(),
                health: None,
                api_endpoint: Some(base_url.clone()),
                api_port: None,
                container_name: None,
            }),
            Err(err)
                if matches!(
                    err.status(),
                    Some(StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN)
                ) =>
            {
                debug!(%err, "agent identity requires a session; continuing unidentified");
                None
            }
            Err(err) => {
                self.transport.set_base_url(previous_base);
                warn!(origin = %self.origin, %err, "no manager and no agent identity");
                return Err(CirisError::deployment(format!(
                    "no agents available at {}: {err}",
                    self.origin
                )));
            }
        };

        if let Some(agent) = &selected
            && let Err(err) = self.persist(agent, DeploymentMode::Standalone)
        {
            self.transport.set_base_url(previous_base);
            return Err(err);
        }
        info!(%base_url, agent_id = ?selected.as_ref().map(|a| &a.agent_id), "resolved standalone deployment");
        Ok(Deployment {
            mode: DeploymentMode::Standalone,
            origin: self.origin.clone(),
            agents: selected.iter().cloned().collect(),
            selected,
            base_url,
        })
    }

    fn persist(&self, agent: &AgentDescriptor, mode: DeploymentMode) -> Result<()> {
        let selection = SelectedAgent {
            agent_id: agent.agent_id.clone(),
            agent_name: agent.agent_name.clone(),
            mode,
        };
        save_json(self.storage.as_ref(), SELECTED_AGENT_KEY, &selection)
    }

    /// Switch to another listed agent. Only valid for managed deployments.
    pub fn select_agent(&self, agent_id: &str) -> Result<Deployment> {
        let mut inner = self.lock();
        let Some(current) = inner.deployment.as_ref() else {
            return Err(CirisError::deployment("deployment has not been resolved"));
        };
        if current.mode != DeploymentMode::Managed {
            return Err(CirisError::deployment(
                "agent selection requires a fleet manager",
            ));
        }
        let Some(agent) = current.agents.iter().find(|a| a.agent_id == agent_id).cloned() else {
            return Err(CirisError::deployment(format!(
                "agent '{agent_id}' is not listed by the manager"
            )));
        };

        let base_url = self.base_url_for(DeploymentMode::Managed, Some(&agent.agent_id));
        self.persist(&agent, DeploymentMode::Managed)?;
        self.transport.set_base_url(base_url.clone());
        info!(agent_id = %agent.agent_id, %base_url, "selected agent");

        let deployment = Deployment {
            selected: Some(agent),
            base_url,
            ..current.clone()
        };
        inner.deployment = Some(deployment.clone());
        inner.state = ResolverState::Managed;
        Ok(deployment)
    }

    /// Reapply the persisted selection without probing.
    /// An unreadable record counts as no selection.
    pub fn restore(&self) -> Result<Option<Deployment>> {
        let selection = match self.persisted_selection() {
            Ok(Some(selection)) => selection,
            Ok(None) => return Ok(None),
            Err(err) => {
                warn!(%err, "ignoring unreadable agent selection");
                return Ok(None);
            }
        };
        let agent_id = match selection.mode {
            DeploymentMode::Managed => Some(selection.agent_id.as_str()),
            DeploymentMode::Standalone => None,
        };
        let base_url = self.base_url_for(selection.mode, agent_id);
        self.transport.set_base_url(base_url.clone());

        let deployment = Deployment {
            mode: selection.mode,
            origin: self.origin.clone(),
            agents: Vec::new(),
            selected: Some(AgentDescriptor {
                agent_id: selection.agent_id,
                agent_name: selection.agent_name,
                status: String::new(),
                health: None,
                api_endpoint: None,
                api_port: None,
                container_name: None,
            }),
            base_url,
        };
        debug!(mode = %deployment.mode, base_url = %deployment.base_url, "restored agent selection");
        let mut inner = self.lock();
        inner.state = deployment.mode.into();
        inner.deployment = Some(deployment.clone());
        Ok(Some(deployment))
    }

    fn resolved(&self) -> Result<Deployment> {
        self.deployment()
            .ok_or_else(|| CirisError::deployment("deployment has not been resolved"))
    }

    /// Where the browser is sent to start an OAuth login with `provider`.
    pub fn oauth_login_url(&self, provider: &str) -> Result<String> {
        validate_provider(provider)?;
        let deployment = self.resolved()?;
        Ok(match managed_agent(&deployment) {
            Some(agent_id) => format!(
                "{}/api/{}/auth/oauth/{}/login",
                self.origin,
                encode_segment(agent_id),
                provider
            ),
            None => format!("{}/v1/auth/oauth/{}/login", self.origin, provider),
        })
    }

    /// Callback the OAuth provider redirects back to.
    pub fn oauth_redirect_uri(&self) -> Result<String> {
        let deployment = self.resolved()?;
        Ok(match managed_agent(&deployment) {
            Some(agent_id) => format!(
                "{}/oauth/{}/callback",
                self.origin,
                encode_segment(agent_id)
            ),
            None => format!("{}/oauth/callback", self.origin),
        })
    }

    /// Login URL with the matching `redirect_uri` query parameter attached.
    pub fn oauth_authorize_url(&self, provider: &str) -> Result<String> {
        let login = self.oauth_login_url(provider)?;
        let redirect = self.oauth_redirect_uri()?;
        let mut url = Url::parse(&login)
            .map_err(|err| CirisError::deployment(format!("invalid OAuth login URL {login}: {err}")))?;
        url.query_pairs_mut().append_pair("redirect_uri", &redirect);
        Ok(url.into())
    }
}

fn managed_agent(deployment: &Deployment) -> Option<&str> {
    match deployment.mode {
        DeploymentMode::Managed => deployment.selected.as_ref().map(|a| a.agent_id.as_str()),
        DeploymentMode::Standalone => None,
    }
}

fn validate_provider(provider: &str) -> Result<()> {
    let valid = !provider.is_empty()
        && provider
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
    if valid {
        Ok(())
    } else {
        Err(CirisError::config(format!("invalid OAuth provider '{provider}'")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{MemoryStorage, StateStorage};
    use crate::test_support::{memory_auth, transport_for};
    use httpmock::prelude::*;
    use serde_json::json;
    use std::sync::Arc;

    struct Fixture {
        server: MockServer,
        storage: Arc<MemoryStorage>,
        transport: Transport,
        resolver: DeploymentResolver,
    }

    fn config_for(origin: &str) -> ClientConfig {
        ClientConfig {
            origin: origin.to_string(),
            probe_timeout_ms: 200,
            ..ClientConfig::default()
        }
    }

    async fn fixture() -> Fixture {
        let server = MockServer::start_async().await;
        let storage = Arc::new(MemoryStorage::new());
        let (auth, _) = memory_auth();
        let transport = transport_for(&server, auth);
        let resolver = DeploymentResolver::new(
            &config_for(&server.base_url()),
            Client::new(),
            transport.clone(),
            storage.clone(),
        );
        Fixture {
            server,
            storage,
            transport,
            resolver,
        }
    }

    fn agents_body() -> Value {
        json!({"agents": [
            {"agent_id": "a1", "agent_name": "Datum", "status": "running"},
            {"agent_id": "a2", "agent_name": "Sage", "status": "running", "api_port": 8081}
        ]})
    }

    #[tokio::test]
    async fn managed_listing_routes_to_selected_agent() {
        let fx = fixture().await;
        let probe = fx
            .server
            .mock_async(|when, then| {
                when.method(GET).path("/manager/v1/agents");
                then.status(200).json_body(agents_body());
            })
            .await;
        let origin = fx.server.base_url();

        let deployment = fx.resolver.resolve().await.expect("resolve");
        assert_eq!(deployment.mode, DeploymentMode::Managed);
        assert_eq!(deployment.agents.len(), 2);
        assert_eq!(deployment.base_url, format!("{origin}/api/a1"));
        assert_eq!(fx.resolver.state(), ResolverState::Managed);

        let switched = fx.resolver.select_agent("a2").expect("select");
        assert_eq!(switched.base_url, format!("{origin}/api/a2"));
        assert_eq!(fx.transport.base_url(), format!("{origin}/api/a2"));

        let persisted = fx.resolver.persisted_selection().expect("load").expect("saved");
        assert_eq!(
            persisted,
            SelectedAgent {
                agent_id: "a2".into(),
                agent_name: "Sage".into(),
                mode: DeploymentMode::Managed,
            }
        );
        probe.assert_hits_async(1).await;
    }

    #[tokio::test]
    async fn bare_array_listing_is_accepted_and_persisted_choice_wins() {
        let fx = fixture().await;
        save_json(
            fx.storage.as_ref(),
            SELECTED_AGENT_KEY,
            &SelectedAgent {
                agent_id: "a2".into(),
                agent_name: "Sage".into(),
                mode: DeploymentMode::Managed,
            },
        )
        .expect("seed");
        fx.server
            .mock_async(|when, then| {
                when.method(GET).path("/manager/v1/agents");
                then.status(200).json_body(json!([
                    {"agent_id": "a1", "name": "Datum"},
                    {"agent_id": "a2", "name": "Sage"}
                ]));
            })
            .await;

        let deployment = fx.resolver.resolve().await.expect("resolve");
        let selected = deployment.selected.expect("selected");
        assert_eq!(selected.agent_id, "a2");
        assert_eq!(selected.agent_name, "Sage");
    }

    #[tokio::test]
    async fn probe_failure_falls_back_to_standalone_origin() {
        let fx = fixture().await;
        let identity = fx
            .server
            .mock_async(|when, then| {
                when.method(GET).path(IDENTITY_PATH);
                then.status(200).json_body(json!({
                    "data": {"agent_id": "datum", "name": "Datum", "purpose": "moderation"},
                    "metadata": {"request_id": "r1"}
                }));
            })
            .await;

        let deployment = fx.resolver.resolve().await.expect("resolve");
        assert_eq!(deployment.mode, DeploymentMode::Standalone);
        assert_eq!(deployment.base_url, fx.server.base_url());
        assert_eq!(fx.transport.base_url(), fx.server.base_url());
        assert_eq!(deployment.selected.map(|a| a.agent_id).as_deref(), Some("datum"));
        identity.assert_hits_async(1).await;
    }

    #[tokio::test]
    async fn slow_manager_and_empty_listing_both_mean_standalone() {
        let fx = fixture().await;
        let mut probe = fx
            .server
            .mock_async(|when, then| {
                when.method(GET).path("/manager/v1/agents");
                then.status(200)
                    .delay(Duration::from_secs(2))
                    .json_body(agents_body());
            })
            .await;
        fx.server
            .mock_async(|when, then| {
                when.method(GET).path(IDENTITY_PATH);
                then.status(200).json_body(json!({"agent_id": "datum", "name": "Datum"}));
            })
            .await;

        let slow = fx.resolver.resolve().await.expect("resolve");
        assert_eq!(slow.mode, DeploymentMode::Standalone);

        probe.delete_async().await;
        fx.server
            .mock_async(|when, then| {
                when.method(GET).path("/manager/v1/agents");
                then.status(200).json_body(json!({"agents": []}));
            })
            .await;
        let empty = fx.resolver.resolve().await.expect("resolve");
        assert_eq!(empty.mode, DeploymentMode::Standalone);
    }

    #[tokio::test]
    async fn identity_requiring_login_still_resolves_standalone() {
        let fx = fixture().await;
        fx.server
            .mock_async(|when, then| {
                when.method(GET).path(IDENTITY_PATH);
                then.status(401).json_body(json!({"detail": "not authenticated"}));
            })
            .await;

        let deployment = fx.resolver.resolve().await.expect("resolve");
        assert_eq!(deployment.mode, DeploymentMode::Standalone);
        assert!(deployment.selected.is_none());
        assert!(fx.storage.get(SELECTED_AGENT_KEY).expect("get").is_none());
    }

    #[tokio::test]
    async fn unreachable_origin_is_terminal() {
        let storage = Arc::new(MemoryStorage::new());
        let (auth, _) = memory_auth();
        let origin = "http://127.0.0.1:9";
        let transport = Transport::builder(Client::new(), origin, auth).build();
        let resolver = DeploymentResolver::new(&config_for(origin), Client::new(), transport, storage);

        let err = resolver.resolve().await.expect_err("no agents");
        assert!(matches!(err, CirisError::Deployment(_)), "unexpected error: {err:?}");
        assert_eq!(resolver.state(), ResolverState::Unresolved);
    }

    #[tokio::test]
    async fn each_resolve_probes_exactly_once() {
        let fx = fixture().await;
        let probe = fx
            .server
            .mock_async(|when, then| {
                when.method(GET).path("/manager/v1/agents");
                then.status(200).json_body(agents_body());
            })
            .await;

        fx.resolver.resolve().await.expect("first");
        probe.assert_hits_async(1).await;
        fx.resolver.resolve().await.expect("second");
        probe.assert_hits_async(2).await;
    }

    #[tokio::test]
    async fn restore_reapplies_selection_without_probing() {
        let fx = fixture().await;
        let probe = fx
            .server
            .mock_async(|when, then| {
                when.method(GET).path("/manager/v1/agents");
                then.status(200).json_body(agents_body());
            })
            .await;
        fx.resolver.resolve().await.expect("resolve");
        fx.resolver.select_agent("a2").expect("select");

        let (auth, _) = memory_auth();
        let transport = transport_for(&fx.server, auth);
        let reloaded = DeploymentResolver::new(
            &config_for(&fx.server.base_url()),
            Client::new(),
            transport.clone(),
            fx.storage.clone(),
        );
        let restored = reloaded.restore().expect("restore").expect("selection");
        assert_eq!(restored.mode, DeploymentMode::Managed);
        assert_eq!(transport.base_url(), format!("{}/api/a2", fx.server.base_url()));
        assert_eq!(reloaded.state(), ResolverState::Managed);
        probe.assert_hits_async(1).await;
    }

    #[tokio::test]
    async fn selection_errors() {
        let fx = fixture().await;
        assert!(fx.resolver.select_agent("a1").is_err(), "unresolved");

        fx.server
            .mock_async(|when, then| {
                when.method(GET).path("/manager/v1/agents");
                then.status(200).json_body(agents_body());
            })
            .await;
        fx.resolver.resolve().await.expect("resolve");
        let err = fx.resolver.select_agent("a9").expect_err("unknown agent");
        assert!(err.to_string().contains("a9"));
    }

    #[tokio::test]
    async fn oauth_urls_follow_deployment_mode() {
        let fx = fixture().await;
        let origin = fx.server.base_url();
        assert!(fx.resolver.oauth_login_url("google").is_err(), "unresolved");

        let mut probe = fx
            .server
            .mock_async(|when, then| {
                when.method(GET).path("/manager/v1/agents");
                then.status(200).json_body(agents_body());
            })
            .await;
        fx.resolver.resolve().await.expect("resolve");
        fx.resolver.select_agent("a2").expect("select");
        assert_eq!(
            fx.resolver.oauth_login_url("google").expect("login"),
            format!("{origin}/api/a2/auth/oauth/google/login")
        );
        assert_eq!(
            fx.resolver.oauth_redirect_uri().expect("redirect"),
            format!("{origin}/oauth/a2/callback")
        );
        let authorize = fx.resolver.oauth_authorize_url("google").expect("authorize");
        let parsed = Url::parse(&authorize).expect("url");
        let redirect = parsed
            .query_pairs()
            .find(|(k, _)| k == "redirect_uri")
            .map(|(_, v)| v.into_owned());
        assert_eq!(redirect, Some(format!("{origin}/oauth/a2/callback")));

        probe.delete_async().await;
        fx.server
            .mock_async(|when, then| {
                when.method(GET).path(IDENTITY_PATH);
                then.status(200).json_body(json!({"agent_id": "datum", "name": "Datum"}));
            })
            .await;
        fx.resolver.resolve().await.expect("standalone");
        assert_eq!(
            fx.resolver.oauth_login_url("github").expect("login"),
            format!("{origin}/v1/auth/oauth/github/login")
        );
        assert_eq!(
            fx.resolver.oauth_redirect_uri().expect("redirect"),
            format!("{origin}/oauth/callback")
        );
        assert!(fx.resolver.oauth_login_url("../evil").is_err());
    }

    #[tokio::test]
    async fn unreadable_selection_is_treated_as_absent() {
        let fx = fixture().await;
        fx.storage.set(SELECTED_AGENT_KEY, "{not json").expect("seed");

        assert!(fx.resolver.restore().expect("restore").is_none());
        assert_eq!(fx.resolver.state(), ResolverState::Unresolved);

        fx.server
            .mock_async(|when, then| {
                when.method(GET).path("/manager/v1/agents");
                then.status(200).json_body(agents_body());
            })
            .await;
        let deployment = fx.resolver.resolve().await.expect("resolve");
        assert_eq!(deployment.selected.map(|a| a.agent_id).as_deref(), Some("a1"));
        let persisted = fx.resolver.persisted_selection().expect("readable again");
        assert_eq!(persisted.map(|s| s.agent_id).as_deref(), Some("a1"));
    }

    #[tokio::test]
    async fn agent_ids_are_encoded_into_paths() {
        let fx = fixture().await;
        fx.server
            .mock_async(|when, then| {
                when.method(GET).path("/manager/v1/agents");
                then.status(200)
                    .json_body(json!([{"agent_id": "team/a b", "agent_name": "Odd"}]));
            })
            .await;
        let origin = fx.server.base_url();

        let deployment = fx.resolver.resolve().await.expect("resolve");
        assert_eq!(deployment.base_url, format!("{origin}/api/team%2Fa%20b"));
        assert_eq!(fx.transport.base_url(), deployment.base_url);
        assert_eq!(
            fx.resolver.oauth_login_url("google").expect("login"),
            format!("{origin}/api/team%2Fa%20b/auth/oauth/google/login")
        );
        assert_eq!(
            fx.resolver.oauth_redirect_uri().expect("redirect"),
            format!("{origin}/oauth/team%2Fa%20b/callback")
        );
        fx.resolver.select_agent("team/a b").expect("select by raw id");
    }

    #[tokio::test]
    async fn failed_standalone_fallback_keeps_previous_base() {
        let fx = fixture().await;
        let origin = fx.server.base_url();
        let mut probe = fx
            .server
            .mock_async(|when, then| {
                when.method(GET).path("/manager/v1/agents");
                then.status(200).json_body(agents_body());
            })
            .await;
        fx.resolver.resolve().await.expect("managed");
        assert_eq!(fx.transport.base_url(), format!("{origin}/api/a1"));

        probe.delete_async().await;
        fx.server
            .mock_async(|when, then| {
                when.method(GET).path(IDENTITY_PATH);
                then.status(500).json_body(json!({"detail": "boom"}));
            })
            .await;
        let err = fx.resolver.resolve().await.expect_err("terminal");
        assert!(matches!(err, CirisError::Deployment(_)), "unexpected error: {err:?}");
        assert_eq!(fx.resolver.state(), ResolverState::Unresolved);
        assert_eq!(fx.transport.base_url(), format!("{origin}/api/a1"));
    }
}
