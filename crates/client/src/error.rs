use std::fmt;
use std::time::Duration;

use reqwest::StatusCode;
use reqwest::header::{HeaderMap, RETRY_AFTER};
use serde_json::Value;

use crate::REQUEST_ID_HEADER;
use crate::transport::ResponseType;

/// Result alias used throughout the client.
pub type Result<T, E = CirisError> = std::result::Result<T, E>;

/// Details of a non-2xx response.
#[derive(Debug, Clone, PartialEq)]
pub struct HttpFailure {
    pub status: StatusCode,
    pub message: String,
    pub body: String,
    pub request_id: Option<String>,
}

impl fmt::Display for HttpFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "status {}: {}", self.status, self.message)?;
        if let Some(id) = &self.request_id {
            write!(f, " [request_id={id}]")?;
        }
        Ok(())
    }
}

/// Metadata attached to 403 responses so callers can offer a "request permission" flow.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PermissionInfo {
    pub message: String,
    pub discord_invite: Option<String>,
    pub can_request_permissions: bool,
    pub permission_requested: bool,
    pub requested_at: Option<String>,
}

/// Field-level validation problem reported by 400/422 responses.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldError {
    pub field: String,
    pub message: String,
    pub kind: Option<String>,
}

#[derive(Debug, Clone, thiserror::Error)]
pub enum CirisError {
    #[error("authentication required: {message}")]
    Auth {
        message: String,
        response: Option<HttpFailure>,
    },
    #[error("permission denied ({failure})")]
    PermissionDenied {
        failure: HttpFailure,
        permission: PermissionInfo,
    },
    #[error("not found ({0})")]
    NotFound(HttpFailure),
    #[error("validation failed ({failure})")]
    Validation {
        failure: HttpFailure,
        fields: Vec<FieldError>,
    },
    #[error("rate limited by server ({failure})")]
    RateLimited {
        failure: HttpFailure,
        retry_after: Option<Duration>,
    },
    #[error("server error ({0})")]
    Server(HttpFailure),
    #[error("request failed ({0})")]
    Http(HttpFailure),
    #[error("network error: {message}")]
    Network { message: String, timed_out: bool },
    #[error("could not decode {response_type} response: {message}")]
    Decode {
        response_type: ResponseType,
        message: String,
    },
    #[error("could not encode request body: {0}")]
    Encode(String),
    #[error("invalid configuration: {0}")]
    Config(String),
    #[error("storage error: {0}")]
    Storage(String),
    #[error("deployment resolution failed: {0}")]
    Deployment(String),
}

impl CirisError {
    pub fn auth(message: impl Into<String>) -> Self {
        Self::Auth {
            message: message.into(),
            response: None,
        }
    }

    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    pub fn storage(message: impl Into<String>) -> Self {
        Self::Storage(message.into())
    }

    pub fn deployment(message: impl Into<String>) -> Self {
        Self::Deployment(message.into())
    }

    /// HTTP status for errors produced from a response.
    pub fn status(&self) -> Option<StatusCode> {
        self.failure().map(|failure| failure.status)
    }

    /// Raw response details, when the error came from a response.
    pub fn failure(&self) -> Option<&HttpFailure> {
        match self {
            CirisError::Auth { response, .. } => response.as_ref(),
            CirisError::PermissionDenied { failure, .. }
            | CirisError::Validation { failure, .. }
            | CirisError::RateLimited { failure, .. } => Some(failure),
            CirisError::NotFound(failure)
            | CirisError::Server(failure)
            | CirisError::Http(failure) => Some(failure),
            _ => None,
        }
    }

    pub fn is_auth(&self) -> bool {
        matches!(self, CirisError::Auth { .. })
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, CirisError::Network { timed_out: true, .. })
    }

    pub(crate) fn from_transport(err: reqwest::Error) -> Self {
        let timed_out = err.is_timeout();
        let message = if timed_out {
            format!("request timed out: {err}")
        } else {
            err.to_string()
        };
        Self::Network { message, timed_out }
    }

    pub(crate) fn decode(response_type: ResponseType, message: impl Into<String>) -> Self {
        Self::Decode {
            response_type,
            message: message.into(),
        }
    }
}

impl From<reqwest::Error> for CirisError {
    fn from(err: reqwest::Error) -> Self {
        Self::from_transport(err)
    }
}

/// Classify a non-2xx response into the error taxonomy.
pub(crate) fn classify_response(status: StatusCode, headers: &HeaderMap, body: String) -> CirisError {
    classify_failure(status, headers, body, None)
}

/// Non-2xx response whose body could not be read; the read error becomes the message.
pub(crate) fn classify_unreadable(status: StatusCode, headers: &HeaderMap, read_error: &str) -> CirisError {
    let message = format!("request failed with status {status}; response body unreadable: {read_error}");
    classify_failure(status, headers, String::new(), Some(message))
}

fn classify_failure(status: StatusCode, headers: &HeaderMap, body: String, message: Option<String>) -> CirisError {
    let parsed = serde_json::from_str::<Value>(&body).ok();
    let message = message
        .or_else(|| parsed.as_ref().and_then(extract_error_message))
        .unwrap_or_else(|| fallback_message(status, &body));
    let request_id = headers
        .get(REQUEST_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);
    let failure = HttpFailure {
        status,
        message,
        body,
        request_id,
    };

    match status {
        StatusCode::UNAUTHORIZED => CirisError::Auth {
            message: failure.message.clone(),
            response: Some(failure),
        },
        StatusCode::FORBIDDEN => {
            let permission = parsed
                .as_ref()
                .map(|value| permission_info(value, &failure.message))
                .unwrap_or_else(|| PermissionInfo {
                    message: failure.message.clone(),
                    ..PermissionInfo::default()
                });
            CirisError::PermissionDenied {
                failure,
                permission,
            }
        }
        StatusCode::NOT_FOUND => CirisError::NotFound(failure),
        StatusCode::BAD_REQUEST | StatusCode::UNPROCESSABLE_ENTITY => {
            let fields = parsed.as_ref().map(field_errors).unwrap_or_default();
            CirisError::Validation { failure, fields }
        }
        StatusCode::TOO_MANY_REQUESTS => CirisError::RateLimited {
            retry_after: retry_after_from_headers(headers),
            failure,
        },
        s if s.is_server_error() => CirisError::Server(failure),
        _ => CirisError::Http(failure),
    }
}

fn fallback_message(status: StatusCode, body: &str) -> String {
    let trimmed = body.trim();
    if trimmed.is_empty() {
        format!("request failed with status {status}")
    } else {
        trimmed.to_string()
    }
}

/// Pull a human readable message out of the server's error shapes:
/// `{"detail": "..."}`, `{"detail": {"message": ...}}`, `{"detail": [{"msg": ...}]}`,
/// `{"error": "..."}`, `{"message": "..."}`.
pub(crate) fn extract_error_message(value: &Value) -> Option<String> {
    if let Some(detail) = value.get("detail") {
        match detail {
            Value::String(s) => return Some(s.clone()),
            Value::Object(obj) => {
                if let Some(msg) = obj.get("message").and_then(Value::as_str) {
                    return Some(msg.to_string());
                }
                if let Some(err) = obj.get("error").and_then(Value::as_str) {
                    return Some(err.to_string());
                }
            }
            Value::Array(items) => {
                let joined: Vec<String> = items
                    .iter()
                    .filter_map(|item| item.get("msg").and_then(Value::as_str))
                    .map(str::to_string)
                    .collect();
                if !joined.is_empty() {
                    return Some(joined.join("; "));
                }
            }
            _ => {}
        }
    }
    if let Some(err) = value.get("error") {
        if let Some(s) = err.as_str() {
            return Some(s.to_string());
        }
        if let Some(s) = err.get("message").and_then(Value::as_str) {
            return Some(s.to_string());
        }
    }
    value
        .get("message")
        .and_then(Value::as_str)
        .map(str::to_string)
}

fn permission_info(value: &Value, message: &str) -> PermissionInfo {
    let detail = match value.get("detail") {
        Some(detail @ Value::Object(_)) => detail,
        _ => value,
    };
    let str_field = |name: &str| detail.get(name).and_then(Value::as_str).map(str::to_string);
    let bool_field = |name: &str| detail.get(name).and_then(Value::as_bool).unwrap_or(false);

    PermissionInfo {
        message: message.to_string(),
        discord_invite: str_field("discord_invite"),
        can_request_permissions: bool_field("can_request_permissions"),
        permission_requested: bool_field("permission_requested"),
        requested_at: str_field("requested_at"),
    }
}

fn field_errors(value: &Value) -> Vec<FieldError> {
    let Some(Value::Array(items)) = value.get("detail") else {
        return Vec::new();
    };
    items
        .iter()
        .filter_map(|item| {
            let message = item.get("msg").and_then(Value::as_str)?.to_string();
            let field = item
                .get("loc")
                .and_then(Value::as_array)
                .map(|loc| {
                    loc.iter()
                        .filter(|part| part.as_str() != Some("body"))
                        .map(|part| match part {
                            Value::String(s) => s.clone(),
                            other => other.to_string(),
                        })
                        .collect::<Vec<_>>()
                        .join(".")
                })
                .unwrap_or_default();
            let kind = item.get("type").and_then(Value::as_str).map(str::to_string);
            Some(FieldError {
                field,
                message,
                kind,
            })
        })
        .collect()
}

pub(crate) fn retry_after_from_headers(headers: &HeaderMap) -> Option<Duration> {
    for name in [RETRY_AFTER.as_str(), "x-ratelimit-reset"] {
        if let Some(value) = headers.get(name)
            && let Ok(raw) = value.to_str()
            && let Ok(seconds) = raw.trim().parse::<u64>()
        {
            return Some(Duration::from_secs(seconds.max(1)));
        }
    }
    None
}
