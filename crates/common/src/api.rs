//! Request and response DTOs for the CIRIS agent and manager APIs.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::config_value::ConfigValueWrapper;

/// Credentials posted to `/v1/auth/login`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginRequest {
    /// Account username.
    pub username: String,
    /// Account password.
    pub password: String,
}

/// Token grant returned by `/v1/auth/login` and `/v1/auth/refresh`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TokenGrant {
    /// Bearer token value.
    pub access_token: String,
    /// Token scheme, normally `bearer`.
    #[serde(default = "default_token_type")]
    pub token_type: String,
    /// Lifetime in seconds from the moment the grant is stored.
    pub expires_in: u64,
    /// Authenticated user id.
    #[serde(default)]
    pub user_id: String,
    /// Role granted to the session.
    #[serde(default)]
    pub role: String,
}

fn default_token_type() -> String {
    "bearer".to_string()
}

/// Body posted to `/v1/auth/refresh`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RefreshRequest {
    /// Token being exchanged.
    pub refresh_token: String,
}

/// Profile returned by `/v1/auth/me`, cached next to the session token.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    /// Stable user id.
    #[serde(alias = "id")]
    pub user_id: String,
    /// Display/login name.
    #[serde(default)]
    pub username: String,
    /// Role name (OBSERVER, ADMIN, AUTHORITY, SYSTEM_ADMIN).
    #[serde(default)]
    pub role: String,
    /// Effective permission strings.
    #[serde(default)]
    pub permissions: Vec<String>,
    /// Session creation time reported by the server.
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    /// Last login time reported by the server.
    #[serde(default)]
    pub last_login: Option<DateTime<Utc>>,
}

/// OAuth provider advertised by `/v1/auth/oauth/providers`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OAuthProvider {
    /// Provider key used in login URLs (`google`, `github`, ...).
    pub provider: String,
    /// Client id registered with the provider.
    #[serde(default)]
    pub client_id: Option<String>,
    /// Provider creation time.
    #[serde(default)]
    pub created: Option<String>,
}

/// Envelope for the OAuth provider listing.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OAuthProviderList {
    /// Configured providers.
    #[serde(default)]
    pub providers: Vec<OAuthProvider>,
}

/// Agent entry reported by the fleet manager or synthesized in standalone mode.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentDescriptor {
    /// Agent id used in managed routing (`/api/<agent_id>`).
    pub agent_id: String,
    /// Human readable name.
    #[serde(default, alias = "name")]
    pub agent_name: String,
    /// Container/process status (`running`, `stopped`, ...).
    #[serde(default)]
    pub status: String,
    /// Health summary when the manager reports one.
    #[serde(default)]
    pub health: Option<String>,
    /// Direct API endpoint, when exposed.
    #[serde(default)]
    pub api_endpoint: Option<String>,
    /// Host port the agent API listens on, when exposed.
    #[serde(default)]
    pub api_port: Option<u16>,
    /// Backing container name.
    #[serde(default)]
    pub container_name: Option<String>,
}

/// Manager listing payload. Managers answer either `{agents: [...]}` or a bare array.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum AgentListing {
    /// `{ "agents": [...] }`
    Wrapped {
        /// Listed agents.
        agents: Vec<AgentDescriptor>,
    },
    /// `[...]`
    Bare(Vec<AgentDescriptor>),
}

impl AgentListing {
    /// Flatten either shape into the agent list.
    pub fn into_agents(self) -> Vec<AgentDescriptor> {
        match self {
            AgentListing::Wrapped { agents } => agents,
            AgentListing::Bare(agents) => agents,
        }
    }
}

/// Identity served by a standalone agent at `/v1/agent/identity`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentIdentity {
    /// Agent id.
    pub agent_id: String,
    /// Agent name.
    #[serde(default)]
    pub name: String,
    /// Stated purpose.
    #[serde(default)]
    pub purpose: Option<String>,
    /// Creation time.
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    /// Lineage/tooling details kept opaque.
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

/// List envelopes come back as `{items|entries|messages|users|deferrals|memories: [...], total}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListEnvelope<T> {
    /// Listed records.
    #[serde(
        alias = "entries",
        alias = "messages",
        alias = "users",
        alias = "deferrals",
        alias = "nodes",
        alias = "memories"
    )]
    pub items: Vec<T>,
    /// Total matching records when the server reports it.
    #[serde(default)]
    pub total: Option<u64>,
}

/// Message posted to `/v1/agent/interact`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InteractRequest {
    /// Message text.
    pub message: String,
    /// Optional channel override.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub channel_id: Option<String>,
}

/// Agent reply to an interaction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InteractResponse {
    /// Id of the submitted message.
    pub message_id: String,
    /// Agent response text.
    #[serde(default)]
    pub response: String,
    /// Cognitive state at response time.
    #[serde(default)]
    pub state: Option<String>,
    /// Processing time in milliseconds.
    #[serde(default)]
    pub processing_time_ms: Option<u64>,
}

/// Conversation history entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationMessage {
    /// Message id.
    pub id: String,
    /// Author id.
    #[serde(default)]
    pub author: String,
    /// Message body.
    #[serde(default)]
    pub content: String,
    /// Message time.
    #[serde(default)]
    pub timestamp: Option<DateTime<Utc>>,
    /// True for agent-authored messages.
    #[serde(default)]
    pub is_agent: bool,
}

/// Agent runtime status from `/v1/agent/status`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentStatus {
    /// Agent id.
    pub agent_id: String,
    /// Agent name.
    #[serde(default)]
    pub name: String,
    /// Current cognitive state (WORK, DREAM, ...).
    #[serde(default)]
    pub cognitive_state: String,
    /// Uptime in seconds.
    #[serde(default)]
    pub uptime_seconds: f64,
    /// Messages processed since start.
    #[serde(default)]
    pub messages_processed: u64,
}

/// Communication channel known to the agent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChannelInfo {
    /// Channel id.
    pub channel_id: String,
    /// Adapter type (api, discord, cli).
    #[serde(default)]
    pub channel_type: String,
    /// Display name.
    #[serde(default)]
    pub display_name: Option<String>,
    /// Whether the channel is live.
    #[serde(default)]
    pub is_active: bool,
}

/// Channel listing envelope.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ChannelList {
    /// Channels.
    #[serde(default)]
    pub channels: Vec<ChannelInfo>,
}

/// Graph memory node. Attributes are kept opaque.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphNode {
    /// Node id.
    pub id: String,
    /// Node type (concept, observation, ...).
    #[serde(default, rename = "type")]
    pub node_type: String,
    /// Graph scope (local, identity, environment, community).
    #[serde(default)]
    pub scope: String,
    /// Free-form attributes.
    #[serde(default)]
    pub attributes: Value,
    /// Last update time.
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

/// Body posted to `/v1/memory/query`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MemoryQuery {
    /// Text search.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub query: Option<String>,
    /// Restrict to one node type.
    #[serde(default, skip_serializing_if = "Option::is_none", rename = "type")]
    pub node_type: Option<String>,
    /// Restrict to one scope.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,
    /// Maximum nodes to return.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limit: Option<u32>,
}

/// Result of storing a memory node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemoryOpResult {
    /// Whether the operation succeeded.
    #[serde(default)]
    pub success: bool,
    /// Affected node id.
    #[serde(default)]
    pub node_id: Option<String>,
    /// Server message.
    #[serde(default)]
    pub message: Option<String>,
}

/// Health summary from `/v1/system/health`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SystemHealth {
    /// Overall status (`healthy`, `degraded`, `critical`).
    pub status: String,
    /// Agent version.
    #[serde(default)]
    pub version: String,
    /// Uptime in seconds.
    #[serde(default)]
    pub uptime_seconds: f64,
    /// Service health counts.
    #[serde(default)]
    pub services: BTreeMap<String, Value>,
    /// Whether initialization has completed.
    #[serde(default)]
    pub initialization_complete: bool,
}

/// Result of a runtime control action.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuntimeControlResponse {
    /// Whether the action was applied.
    #[serde(default)]
    pub success: bool,
    /// Server message.
    #[serde(default)]
    pub message: String,
    /// Processor state after the action.
    #[serde(default)]
    pub processor_state: Option<String>,
}

/// Configuration entry from `/v1/config`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfigItem {
    /// Config key.
    pub key: String,
    /// Wrapped value.
    #[serde(default)]
    pub value: ConfigValueWrapper,
    /// Last update time.
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
    /// Last updater.
    #[serde(default)]
    pub updated_by: Option<String>,
    /// Whether the value was redacted by the server.
    #[serde(default)]
    pub is_sensitive: bool,
}

/// Config listing envelope.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConfigList {
    /// Entries.
    #[serde(default)]
    pub configs: Vec<ConfigItem>,
    /// Total entries.
    #[serde(default)]
    pub total: Option<u64>,
}

/// Body sent to `PUT /v1/config/{key}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigUpdate {
    /// Plain value; the server stores it in its typed wrapper.
    pub value: Value,
    /// Optional change reason for audit.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

/// Log line from `/v1/telemetry/logs`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogEntry {
    /// Log time.
    pub timestamp: DateTime<Utc>,
    /// Level name.
    #[serde(default)]
    pub level: String,
    /// Emitting service.
    #[serde(default)]
    pub service: String,
    /// Message.
    #[serde(default)]
    pub message: String,
}

/// Audit entry from `/v1/audit/entries`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditEntry {
    /// Entry id.
    pub id: String,
    /// Action name.
    #[serde(default)]
    pub action: String,
    /// Actor id.
    #[serde(default)]
    pub actor: String,
    /// Entry time.
    #[serde(default)]
    pub timestamp: Option<DateTime<Utc>>,
    /// Additional context.
    #[serde(default)]
    pub context: Value,
}

/// Filters for audit listing and export.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AuditQuery {
    /// Restrict to an actor.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub actor: Option<String>,
    /// Restrict to an action.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub action: Option<String>,
    /// Inclusive start.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_time: Option<DateTime<Utc>>,
    /// Exclusive end.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_time: Option<DateTime<Utc>>,
    /// Page size.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limit: Option<u32>,
}

/// User record from `/v1/users`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserDetail {
    /// User id.
    pub user_id: String,
    /// Username.
    #[serde(default)]
    pub username: String,
    /// API role.
    #[serde(default, alias = "api_role")]
    pub role: String,
    /// Authentication type (password, oauth).
    #[serde(default)]
    pub auth_type: Option<String>,
    /// Whether the account is active.
    #[serde(default = "default_true")]
    pub is_active: bool,
}

fn default_true() -> bool {
    true
}

/// Body posted to `/v1/users`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateUserRequest {
    /// Username.
    pub username: String,
    /// Initial password.
    pub password: String,
    /// API role.
    pub api_role: String,
}

/// Body sent to `PUT /v1/users/{id}/role`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateRoleRequest {
    /// New API role.
    pub api_role: String,
}

/// Deferred decision waiting for a Wise Authority.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Deferral {
    /// Deferral id.
    pub deferral_id: String,
    /// Deferred question.
    #[serde(default)]
    pub question: String,
    /// Deferral reason.
    #[serde(default)]
    pub reason: String,
    /// Current status.
    #[serde(default)]
    pub status: String,
    /// Creation time.
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

/// Body posted to `/v1/wa/deferrals/{id}/resolve`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResolveDeferralRequest {
    /// `approve`, `reject`, or `modify`.
    pub resolution: String,
    /// Guidance for the agent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub guidance: Option<String>,
}

/// Result of resolving a deferral.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResolveDeferralResponse {
    /// Whether the resolution was recorded.
    #[serde(default)]
    pub success: bool,
    /// Deferral id.
    #[serde(default)]
    pub deferral_id: String,
    /// Resolution time.
    #[serde(default)]
    pub resolved_at: Option<DateTime<Utc>>,
}

/// Wise Authority permission grant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WaPermission {
    /// Permission id.
    #[serde(default)]
    pub permission_id: String,
    /// Permission type.
    #[serde(default)]
    pub permission_type: String,
    /// Target resource.
    #[serde(default)]
    pub resource: Option<String>,
    /// Grant time.
    #[serde(default)]
    pub granted_at: Option<DateTime<Utc>>,
}

/// Permission listing envelope.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WaPermissionList {
    /// Grants.
    #[serde(default)]
    pub permissions: Vec<WaPermission>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn agent_listing_accepts_wrapped_and_bare_shapes() {
        let wrapped: AgentListing = serde_json::from_value(json!({
            "agents": [{"agent_id": "a1", "agent_name": "Datum", "status": "running"}]
        }))
        .expect("wrapped");
        let bare: AgentListing = serde_json::from_value(json!([
            {"agent_id": "a1", "name": "Datum", "api_port": 8081}
        ]))
        .expect("bare");

        let wrapped = wrapped.into_agents();
        let bare = bare.into_agents();
        assert_eq!(wrapped[0].agent_name, "Datum");
        assert_eq!(bare[0].agent_name, "Datum");
        assert_eq!(bare[0].api_port, Some(8081));
    }

    #[test]
    fn list_envelope_normalizes_field_names() {
        let entries: ListEnvelope<Value> =
            serde_json::from_value(json!({"entries": [1, 2], "total": 2})).expect("entries");
        let messages: ListEnvelope<Value> =
            serde_json::from_value(json!({"messages": [1]})).expect("messages");
        assert_eq!(entries.items.len(), 2);
        assert_eq!(entries.total, Some(2));
        assert_eq!(messages.items.len(), 1);
        assert_eq!(messages.total, None);
    }

    #[test]
    fn token_grant_defaults_token_type() {
        let grant: TokenGrant = serde_json::from_value(json!({
            "access_token": "tok",
            "expires_in": 3600,
            "user_id": "u1",
            "role": "ADMIN"
        }))
        .expect("grant");
        assert_eq!(grant.token_type, "bearer");
    }

    #[test]
    fn user_accepts_id_alias() {
        let user: User = serde_json::from_value(json!({
            "id": "u1",
            "username": "admin",
            "role": "ADMIN",
            "permissions": ["view_messages"]
        }))
        .expect("user");
        assert_eq!(user.user_id, "u1");
        assert_eq!(user.permissions, vec!["view_messages".to_string()]);
    }
}
