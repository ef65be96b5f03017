use common::api::{LoginRequest, OAuthProvider, OAuthProviderList, TokenGrant, User};
use reqwest::Method;
use serde_json::Value;
use tracing::{info, warn};

use crate::error::Result;
use crate::session::AuthToken;
use crate::transport::{LOGIN_PATH, ME_PATH, RequestOptions, Transport};

pub const LOGOUT_PATH: &str = "/v1/auth/logout";
pub const OAUTH_PROVIDERS_PATH: &str = "/v1/auth/oauth/providers";

pub struct AuthResource<'a> {
    transport: &'a Transport,
}

impl<'a> AuthResource<'a> {
    pub(crate) fn new(transport: &'a Transport) -> Self {
        Self { transport }
    }

    /// Exchange credentials for a session token and store it.
    pub async fn login(&self, username: &str, password: &str) -> Result<AuthToken> {
        let body = LoginRequest {
            username: username.to_string(),
            password: password.to_string(),
        };
        let grant: TokenGrant = self
            .transport
            .request(Method::POST, LOGIN_PATH, RequestOptions::new().skip_auth().json(&body)?)
            .await?;
        let token = self.transport.auth().save_token(grant)?;
        info!(user_id = %token.user_id, role = %token.role, "signed in");
        Ok(token)
    }

    /// End the session. Local state is cleared even if the server call fails.
    pub async fn logout(&self) -> Result<()> {
        if self.transport.auth().is_authenticated() {
            let opts = RequestOptions::new().refresh_on_unauthorized(false);
            if let Err(err) = self
                .transport
                .request::<Value>(Method::POST, LOGOUT_PATH, opts)
                .await
            {
                warn!(%err, "server-side logout failed; clearing local session anyway");
            }
        }
        self.transport.auth().clear()
    }

    /// Fetch the current user and cache it next to the token.
    pub async fn get_me(&self) -> Result<User> {
        let user: User = self.transport.get(ME_PATH).await?;
        self.transport.auth().save_user(user.clone())?;
        Ok(user)
    }

    pub async fn oauth_providers(&self) -> Result<Vec<OAuthProvider>> {
        let list: OAuthProviderList = self
            .transport
            .request(Method::GET, OAUTH_PROVIDERS_PATH, RequestOptions::new().skip_auth())
            .await?;
        Ok(list.providers)
    }
}
