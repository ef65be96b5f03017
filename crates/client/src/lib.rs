//! Transport and session layer for talking to CIRIS agents, either directly
//! or through a fleet manager.

use reqwest::header::{HeaderMap, HeaderValue, USER_AGENT};
use tracing::warn;

pub mod client;
pub mod clock;
pub mod config;
pub mod deployment;
pub mod error;
pub mod rate_limit;
pub mod resources;
pub mod session;
pub mod storage;
pub mod telemetry;
pub mod transport;

#[cfg(test)]
pub(crate) mod test_support;

pub use client::CirisClient;
pub use config::ClientConfig;
pub use deployment::{Deployment, DeploymentMode, DeploymentResolver, ResolverState};
pub use error::{CirisError, Result};
pub use session::{AuthStore, AuthToken};
pub use transport::{RequestOptions, ResponseType, Transport};

pub const REQUEST_ID_HEADER: &str = "x-request-id";
pub const CLIENT_USER_AGENT: &str = concat!("ciris-client/", env!("CARGO_PKG_VERSION"));

pub fn build_http_client(cfg: &ClientConfig) -> Result<reqwest::Client> {
    let mut builder = reqwest::Client::builder();

    let mut headers = HeaderMap::new();
    headers.insert(USER_AGENT, HeaderValue::from_static(CLIENT_USER_AGENT));
    builder = builder.default_headers(headers);

    if let Some(ca_path) = cfg.ca_cert_path.as_ref() {
        let pem = std::fs::read(ca_path).map_err(|err| {
            CirisError::config(format!("failed to read ca_cert_path {ca_path}: {err}"))
        })?;
        let cert = reqwest::Certificate::from_pem(&pem).map_err(|err| {
            CirisError::config(format!("invalid certificate in {ca_path}: {err}"))
        })?;
        builder = builder.add_root_certificate(cert);
    }

    if cfg.tls_insecure_skip_verify {
        warn!("TLS certificate verification is disabled; use only for development");
        builder = builder.danger_accept_invalid_certs(true);
    }

    builder
        .build()
        .map_err(|err| CirisError::config(format!("failed to build HTTP client: {err}")))
}
