use metrics::counter;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Install a global tracing subscriber honoring `RUST_LOG` (default `info`).
pub fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let registry = tracing_subscriber::registry().with(filter);
    let result = if json {
        registry
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .try_init()
    } else {
        registry
            .with(fmt::layer().with_writer(std::io::stderr))
            .try_init()
    };
    // A subscriber installed by an embedding application wins.
    let _ = result;
}

pub(crate) fn record_request(method: &str, outcome: &'static str) {
    counter!(
        "ciris_client_requests_total",
        "method" => method.to_string(),
        "outcome" => outcome
    )
    .increment(1);
}

pub(crate) fn record_refresh(outcome: &'static str) {
    counter!("ciris_client_token_refresh_total", "outcome" => outcome).increment(1);
}

pub(crate) fn record_rate_limit_wait(key: &str) {
    counter!("ciris_client_rate_limit_waits_total", "key" => key.to_string()).increment(1);
}

pub(crate) fn record_probe(mode: &'static str) {
    counter!("ciris_client_probe_total", "mode" => mode).increment(1);
}

/// Outcome label for a finished request.
pub(crate) fn outcome_label(status: Option<reqwest::StatusCode>) -> &'static str {
    match status {
        None => "network_error",
        Some(s) if s.is_success() => "success",
        Some(s) if s.is_client_error() => "client_error",
        Some(s) if s.is_server_error() => "server_error",
        Some(_) => "other",
    }
}
