//! Per-domain method sets. Each method issues exactly one transport request;
//! auth, retries and throttling stay in [`Transport`](crate::transport::Transport).

use common::api::ListEnvelope;
use serde::Deserialize;

mod agent;
mod audit;
mod auth;
mod config;
mod memory;
mod system;
mod telemetry;
mod users;
mod wise_authority;

pub use agent::AgentResource;
pub use audit::AuditResource;
pub use auth::AuthResource;
pub use config::ConfigResource;
pub use memory::MemoryResource;
pub use system::SystemResource;
pub use telemetry::TelemetryResource;
pub use users::UsersResource;
pub use wise_authority::WiseAuthorityResource;

/// List endpoints answer with either a bare array or a `{items, total}` envelope.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum Listed<T> {
    Bare(Vec<T>),
    Envelope(ListEnvelope<T>),
}

impl<T> Listed<T> {
    fn into_items(self) -> Vec<T> {
        match self {
            Listed::Bare(items) => items,
            Listed::Envelope(envelope) => envelope.items,
        }
    }
}

/// Percent-encode one path segment (ids may contain `/` or `:`).
pub(crate) fn encode_segment(raw: &str) -> String {
    urlencoding::encode(raw).into_owned()
}
