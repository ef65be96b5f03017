use std::sync::{Arc, Mutex};

use common::api::{TokenGrant, User};
use httpmock::MockServer;
use httpmock::prelude::HttpMockRequest;
use reqwest::Client;

use crate::clock::ManualClock;
use crate::session::AuthStore;
use crate::storage::MemoryStorage;
use crate::transport::Transport;

/// Serializes tests that mutate process environment variables.
pub(crate) static ENV_LOCK: Mutex<()> = Mutex::new(());

pub(crate) fn grant(token: &str, expires_in: u64) -> TokenGrant {
    TokenGrant {
        access_token: token.into(),
        token_type: "bearer".into(),
        expires_in,
        user_id: "u1".into(),
        role: "ADMIN".into(),
    }
}

pub(crate) fn user(id: &str, username: &str) -> User {
    User {
        user_id: id.into(),
        username: username.into(),
        role: "ADMIN".into(),
        permissions: vec!["view_config".into()],
        created_at: None,
        last_login: None,
    }
}

pub(crate) fn memory_auth() -> (Arc<AuthStore>, ManualClock) {
    let clock = ManualClock::default();
    let auth = AuthStore::new(Arc::new(MemoryStorage::new()), Arc::new(clock.clone()));
    (Arc::new(auth), clock)
}

pub(crate) fn transport_for(server: &MockServer, auth: Arc<AuthStore>) -> Transport {
    Transport::builder(Client::new(), server.base_url(), auth).build()
}

/// Matches requests that carry no `Authorization` header.
pub(crate) fn without_authorization(req: &HttpMockRequest) -> bool {
    req.headers
        .as_ref()
        .is_none_or(|headers| !headers.iter().any(|(name, _)| name.eq_ignore_ascii_case("authorization")))
}
