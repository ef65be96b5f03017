use std::env;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use tracing::warn;

use crate::error::{CirisError, Result};
use crate::rate_limit::RateLimitConfig;
use crate::storage::FileStorage;

pub const DEFAULT_ORIGIN: &str = "http://localhost:8080";
pub const DEFAULT_MANAGER_PATH: &str = "/manager/v1/agents";

#[derive(Debug, Clone, Deserialize)]
pub struct ClientConfig {
    /// Origin the deployment is served from, e.g. `https://agents.example.com`.
    pub origin: String,
    /// Fixed API base URL; bypasses deployment resolution when set.
    #[serde(default)]
    pub api_base_url: Option<String>,
    pub manager_path: String,
    pub probe_timeout_ms: u64,
    pub request_timeout_secs: u64,
    #[serde(default)]
    pub rate_limit: RateLimitSettings,
    #[serde(default)]
    pub state_dir: Option<String>,
    #[serde(default)]
    pub ca_cert_path: Option<String>,
    pub tls_insecure_skip_verify: bool,
    pub allow_insecure_http: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RateLimitSettings {
    pub enabled: bool,
    pub max_requests: u32,
    pub window_ms: u64,
}

impl Default for RateLimitSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            max_requests: 10,
            window_ms: 1_000,
        }
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            origin: DEFAULT_ORIGIN.into(),
            api_base_url: None,
            manager_path: DEFAULT_MANAGER_PATH.into(),
            probe_timeout_ms: 3_000,
            request_timeout_secs: 30,
            rate_limit: RateLimitSettings::default(),
            state_dir: None,
            ca_cert_path: None,
            tls_insecure_skip_verify: false,
            allow_insecure_http: false,
        }
    }
}

impl ClientConfig {
    pub fn probe_timeout(&self) -> Duration {
        Duration::from_millis(self.probe_timeout_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Limiter settings, or `None` when client-side throttling is disabled.
    pub fn rate_limit_config(&self) -> Option<RateLimitConfig> {
        self.rate_limit.enabled.then(|| {
            RateLimitConfig::new(
                self.rate_limit.max_requests,
                Duration::from_millis(self.rate_limit.window_ms),
            )
        })
    }

    pub fn state_dir(&self) -> Result<PathBuf> {
        match self.state_dir.as_deref().map(str::trim) {
            Some(dir) if !dir.is_empty() => Ok(PathBuf::from(dir)),
            _ => FileStorage::default_dir(),
        }
    }

    pub fn origin(&self) -> &str {
        self.origin.trim_end_matches('/')
    }

    pub fn validate(&self) -> Result<()> {
        validate_http_url("origin", &self.origin, self.allow_insecure_http)?;
        if let Some(base) = &self.api_base_url {
            validate_http_url("api_base_url", base, self.allow_insecure_http)?;
        }
        if !self.manager_path.starts_with('/') {
            return Err(CirisError::config("manager_path must start with '/'"));
        }
        if self.probe_timeout_ms == 0 {
            return Err(CirisError::config("probe_timeout_ms must be > 0"));
        }
        if self.request_timeout_secs == 0 {
            return Err(CirisError::config("request_timeout_secs must be > 0"));
        }
        if let Some(limit) = self.rate_limit_config() {
            limit.validate()?;
        }
        Ok(())
    }
}

fn validate_http_url(field: &str, raw: &str, allow_insecure_http: bool) -> Result<()> {
    let url = reqwest::Url::parse(raw)
        .map_err(|err| CirisError::config(format!("invalid {field} '{raw}': {err}")))?;
    match url.scheme() {
        "https" => Ok(()),
        "http" if allow_insecure_http => {
            warn!(%field, url = %raw, "insecure HTTP in use; traffic will be unencrypted");
            Ok(())
        }
        "http" if is_loopback_host(url.host_str()) => Ok(()),
        "http" => Err(CirisError::config(format!(
            "insecure {field} not allowed: {raw}; set allow_insecure_http=true to override"
        ))),
        other => Err(CirisError::config(format!(
            "unsupported {field} scheme: {other}"
        ))),
    }
}

fn is_loopback_host(host: Option<&str>) -> bool {
    matches!(
        host,
        Some("localhost") | Some("127.0.0.1") | Some("[::1]") | Some("::1")
    )
}

// (ENV_NAME, config_key)
const ENV_OVERRIDES: &[(&str, &str)] = &[
    ("CIRIS_ORIGIN", "origin"),
    ("CIRIS_API_BASE_URL", "api_base_url"),
    ("CIRIS_MANAGER_PATH", "manager_path"),
    ("CIRIS_PROBE_TIMEOUT_MS", "probe_timeout_ms"),
    ("CIRIS_REQUEST_TIMEOUT_SECS", "request_timeout_secs"),
    ("CIRIS_RATE_LIMIT_ENABLED", "rate_limit.enabled"),
    ("CIRIS_RATE_LIMIT_MAX_REQUESTS", "rate_limit.max_requests"),
    ("CIRIS_RATE_LIMIT_WINDOW_MS", "rate_limit.window_ms"),
    ("CIRIS_STATE_DIR", "state_dir"),
    ("CIRIS_CA_CERT_PATH", "ca_cert_path"),
    ("CIRIS_TLS_INSECURE_SKIP_VERIFY", "tls_insecure_skip_verify"),
    ("CIRIS_ALLOW_INSECURE_HTTP", "allow_insecure_http"),
];

fn config_error(err: config::ConfigError) -> CirisError {
    CirisError::config(err.to_string())
}

/// Load from `ciris.toml` in the working directory (optional) plus env.
pub fn load() -> Result<ClientConfig> {
    load_from(None)
}

/// Load defaults, then `file` (or an optional `ciris.toml`), then `CIRIS_*` env.
pub fn load_from(file: Option<&Path>) -> Result<ClientConfig> {
    let defaults = ClientConfig::default();
    let source = match file {
        Some(path) => config::File::from(path).required(true),
        None => config::File::with_name("ciris").required(false),
    };

    let mut builder = config::Config::builder()
        .set_default("origin", defaults.origin)
        .and_then(|b| b.set_default("api_base_url", Option::<String>::None))
        .and_then(|b| b.set_default("manager_path", defaults.manager_path))
        .and_then(|b| b.set_default("probe_timeout_ms", defaults.probe_timeout_ms as i64))
        .and_then(|b| b.set_default("request_timeout_secs", defaults.request_timeout_secs as i64))
        .and_then(|b| b.set_default("rate_limit.enabled", defaults.rate_limit.enabled))
        .and_then(|b| b.set_default("rate_limit.max_requests", i64::from(defaults.rate_limit.max_requests)))
        .and_then(|b| b.set_default("rate_limit.window_ms", defaults.rate_limit.window_ms as i64))
        .and_then(|b| b.set_default("state_dir", Option::<String>::None))
        .and_then(|b| b.set_default("ca_cert_path", Option::<String>::None))
        .and_then(|b| b.set_default("tls_insecure_skip_verify", false))
        .and_then(|b| b.set_default("allow_insecure_http", false))
        .map_err(config_error)?
        .add_source(source);

    for (env_key, cfg_key) in ENV_OVERRIDES {
        if let Ok(value) = env::var(env_key) {
            builder = builder.set_override(cfg_key, value).map_err(config_error)?;
        }
    }

    let mut cfg: ClientConfig = builder
        .build()
        .and_then(|c| c.try_deserialize())
        .map_err(config_error)?;
    cfg.origin = cfg.origin.trim().trim_end_matches('/').to_string();
    cfg.api_base_url = cfg
        .api_base_url
        .map(|b| b.trim().trim_end_matches('/').to_string())
        .filter(|b| !b.is_empty());
    cfg.validate()?;
    Ok(cfg)
}
