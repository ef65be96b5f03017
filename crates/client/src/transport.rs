//! Authenticated HTTP execution against the selected CIRIS agent.
//!
//! Every call goes through the rate limiter, carries the session bearer token
//! unless told otherwise, and recovers from a single 401 by refreshing the
//! session once. Concurrent 401s share one refresh.

use std::fmt;
use std::sync::{Arc, Mutex, PoisonError, RwLock};
use std::time::Duration;

use common::api::{RefreshRequest, TokenGrant, User};
use futures_util::future::{BoxFuture, FutureExt, Shared};
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::{Client, Method, Response, StatusCode};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::error::{CirisError, Result, classify_response, classify_unreadable};
use crate::rate_limit::RateLimiter;
use crate::session::AuthStore;
use crate::telemetry;

pub const LOGIN_PATH: &str = "/v1/auth/login";
pub const REFRESH_PATH: &str = "/v1/auth/refresh";
pub const ME_PATH: &str = "/v1/auth/me";

/// How a successful response body is interpreted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ResponseType {
    #[default]
    Json,
    Text,
    Blob,
}

impl fmt::Display for ResponseType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ResponseType::Json => "json",
            ResponseType::Text => "text",
            ResponseType::Blob => "blob",
        };
        f.write_str(name)
    }
}

/// A fully read response body in its declared shape.
#[derive(Debug, Clone, PartialEq)]
pub enum ResponseBody {
    Json(Value),
    Text(String),
    Blob(Vec<u8>),
}

impl ResponseBody {
    pub fn into_json<T: DeserializeOwned>(self) -> Result<T> {
        match self {
            ResponseBody::Json(value) => serde_json::from_value(value)
                .map_err(|err| CirisError::decode(ResponseType::Json, err.to_string())),
            other => Err(CirisError::decode(
                ResponseType::Json,
                format!("expected json body, got {}", other.response_type()),
            )),
        }
    }

    pub fn into_text(self) -> Result<String> {
        match self {
            ResponseBody::Text(text) => Ok(text),
            other => Err(CirisError::decode(
                ResponseType::Text,
                format!("expected text body, got {}", other.response_type()),
            )),
        }
    }

    pub fn into_blob(self) -> Result<Vec<u8>> {
        match self {
            ResponseBody::Blob(bytes) => Ok(bytes),
            other => Err(CirisError::decode(
                ResponseType::Blob,
                format!("expected blob body, got {}", other.response_type()),
            )),
        }
    }

    fn response_type(&self) -> ResponseType {
        match self {
            ResponseBody::Json(_) => ResponseType::Json,
            ResponseBody::Text(_) => ResponseType::Text,
            ResponseBody::Blob(_) => ResponseType::Blob,
        }
    }
}

/// Per-request knobs.
#[derive(Debug, Clone)]
pub struct RequestOptions {
    pub body: Option<Value>,
    pub params: Vec<(String, String)>,
    pub headers: HeaderMap,
    pub skip_auth: bool,
    pub response_type: ResponseType,
    pub timeout: Option<Duration>,
    pub refresh_on_unauthorized: bool,
}

impl Default for RequestOptions {
    fn default() -> Self {
        Self {
            body: None,
            params: Vec::new(),
            headers: HeaderMap::new(),
            skip_auth: false,
            response_type: ResponseType::Json,
            timeout: None,
            refresh_on_unauthorized: true,
        }
    }
}

impl RequestOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Serialize `body` as the JSON request body.
    pub fn json<B: Serialize + ?Sized>(mut self, body: &B) -> Result<Self> {
        let value = serde_json::to_value(body).map_err(|err| CirisError::Encode(err.to_string()))?;
        self.body = Some(value);
        Ok(self)
    }

    pub fn query(mut self, key: impl Into<String>, value: impl ToString) -> Self {
        self.params.push((key.into(), value.to_string()));
        self
    }

    /// Add a query parameter only when a value is present.
    pub fn query_opt<V: ToString>(self, key: impl Into<String>, value: Option<V>) -> Self {
        match value {
            Some(value) => self.query(key, value),
            None => self,
        }
    }

    pub fn header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.insert(name, value);
        self
    }

    pub fn skip_auth(mut self) -> Self {
        self.skip_auth = true;
        self
    }

    pub fn response_type(mut self, response_type: ResponseType) -> Self {
        self.response_type = response_type;
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Surface a 401 directly instead of refreshing the session.
    pub fn refresh_on_unauthorized(mut self, enabled: bool) -> Self {
        self.refresh_on_unauthorized = enabled;
        self
    }
}

type RefreshFlight = Shared<BoxFuture<'static, Result<()>>>;

struct InFlightRefresh {
    generation: u64,
    flight: RefreshFlight,
}

#[derive(Default)]
struct RefreshSlot {
    generation: u64,
    current: Option<InFlightRefresh>,
}

struct TransportInner {
    client: Client,
    base_url: RwLock<String>,
    base_override: Option<String>,
    auth: Arc<AuthStore>,
    limiter: Option<Arc<RateLimiter>>,
    timeout: Option<Duration>,
    refresh: Mutex<RefreshSlot>,
}

/// Cheaply cloneable handle; clones share auth, limiter and base URL.
#[derive(Clone)]
pub struct Transport {
    inner: Arc<TransportInner>,
}

pub struct TransportBuilder {
    client: Client,
    base_url: String,
    base_override: Option<String>,
    auth: Arc<AuthStore>,
    limiter: Option<Arc<RateLimiter>>,
    timeout: Option<Duration>,
}

impl TransportBuilder {
    pub fn rate_limiter(mut self, limiter: Arc<RateLimiter>) -> Self {
        self.limiter = Some(limiter);
        self
    }

    /// Fixed base URL that wins over anything the resolver computes.
    pub fn base_override(mut self, base: Option<String>) -> Self {
        self.base_override = base.filter(|b| !b.trim().is_empty());
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn build(self) -> Transport {
        Transport {
            inner: Arc::new(TransportInner {
                client: self.client,
                base_url: RwLock::new(self.base_url),
                base_override: self.base_override,
                auth: self.auth,
                limiter: self.limiter,
                timeout: self.timeout,
                refresh: Mutex::new(RefreshSlot::default()),
            }),
        }
    }
}

impl Transport {
    pub fn builder(client: Client, base_url: impl Into<String>, auth: Arc<AuthStore>) -> TransportBuilder {
        TransportBuilder {
            client,
            base_url: base_url.into(),
            base_override: None,
            auth,
            limiter: None,
            timeout: None,
        }
    }

    pub fn auth(&self) -> &Arc<AuthStore> {
        &self.inner.auth
    }

    pub fn http_client(&self) -> &Client {
        &self.inner.client
    }

    /// Effective base URL: the override when set, otherwise the resolved one.
    pub fn base_url(&self) -> String {
        if let Some(base) = &self.inner.base_override {
            return base.clone();
        }
        self.inner
            .base_url
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn has_base_override(&self) -> bool {
        self.inner.base_override.is_some()
    }

    /// Point the transport at a new agent, returning the previous base.
    /// Ignored for routing while an override is set.
    pub fn set_base_url(&self, base: impl Into<String>) -> String {
        let base = base.into();
        if self.inner.base_override.is_some() {
            debug!(%base, "base URL override in effect; keeping override");
        }
        let mut current = self
            .inner
            .base_url
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        std::mem::replace(&mut *current, base)
    }

    pub fn url(&self, path: &str) -> String {
        let trimmed = path.trim_start_matches('/');
        format!("{}/{}", self.base_url().trim_end_matches('/'), trimmed)
    }

    pub async fn request<T: DeserializeOwned>(&self, method: Method, path: &str, opts: RequestOptions) -> Result<T> {
        self.execute(method, path, opts.response_type(ResponseType::Json))
            .await?
            .into_json()
    }

    pub async fn request_text(&self, method: Method, path: &str, opts: RequestOptions) -> Result<String> {
        self.execute(method, path, opts.response_type(ResponseType::Text))
            .await?
            .into_text()
    }

    pub async fn request_blob(&self, method: Method, path: &str, opts: RequestOptions) -> Result<Vec<u8>> {
        self.execute(method, path, opts.response_type(ResponseType::Blob))
            .await?
            .into_blob()
    }

    pub async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        self.request(Method::GET, path, RequestOptions::new()).await
    }

    pub async fn post_json<B, T>(&self, path: &str, body: &B) -> Result<T>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        self.request(Method::POST, path, RequestOptions::new().json(body)?)
            .await
    }

    pub async fn put_json<B, T>(&self, path: &str, body: &B) -> Result<T>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        self.request(Method::PUT, path, RequestOptions::new().json(body)?)
            .await
    }

    pub async fn delete<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        self.request(Method::DELETE, path, RequestOptions::new()).await
    }

    /// Run one request, including the single 401 → refresh → retry cycle.
    pub async fn execute(&self, method: Method, path: &str, opts: RequestOptions) -> Result<ResponseBody> {
        let sent_token = if opts.skip_auth {
            None
        } else {
            self.inner.auth.access_token()
        };
        let res = self
            .send_once(&method, path, &opts, sent_token.as_deref())
            .await?;

        if res.status() != StatusCode::UNAUTHORIZED || opts.skip_auth || !opts.refresh_on_unauthorized {
            return read_response(res, opts.response_type).await;
        }

        debug!(%method, path, "unauthorized; recovering session");
        self.recover_unauthorized(sent_token.as_deref()).await?;
        let token = self.inner.auth.access_token();
        let res = self
            .send_once(&method, path, &opts, token.as_deref())
            .await?;
        read_response(res, opts.response_type).await
    }

    async fn recover_unauthorized(&self, sent_token: Option<&str>) -> Result<()> {
        if let Some(current) = self.inner.auth.access_token()
            && sent_token != Some(current.as_str())
        {
            debug!("session token changed since the request was sent; retrying");
            return Ok(());
        }
        self.refresh_session().await
    }

    /// Refresh the session token. Callers arriving while a refresh is running
    /// wait for that refresh instead of starting another.
    pub async fn refresh_session(&self) -> Result<()> {
        let (generation, flight) = {
            let mut slot = self.inner.refresh.lock().unwrap_or_else(PoisonError::into_inner);
            match &slot.current {
                Some(running) => (running.generation, running.flight.clone()),
                None => {
                    slot.generation += 1;
                    let generation = slot.generation;
                    let transport = self.clone();
                    let flight: RefreshFlight = async move { transport.perform_refresh().await }
                        .boxed()
                        .shared();
                    slot.current = Some(InFlightRefresh {
                        generation,
                        flight: flight.clone(),
                    });
                    (generation, flight)
                }
            }
        };

        let outcome = flight.await;

        let mut slot = self.inner.refresh.lock().unwrap_or_else(PoisonError::into_inner);
        if slot
            .current
            .as_ref()
            .is_some_and(|running| running.generation == generation)
        {
            slot.current = None;
        }
        outcome
    }

    async fn perform_refresh(self) -> Result<()> {
        let auth = self.inner.auth.clone();
        let Some(current) = auth.stored_token() else {
            telemetry::record_refresh("no_session");
            return Err(CirisError::auth("not signed in"));
        };

        let body = RefreshRequest {
            refresh_token: current.access_token.clone(),
        };
        let opts = RequestOptions::new().skip_auth().json(&body)?;
        let outcome = async {
            let res = self
                .send_once(&Method::POST, REFRESH_PATH, &opts, Some(&current.access_token))
                .await?;
            read_response(res, ResponseType::Json)
                .await?
                .into_json::<TokenGrant>()
        }
        .await;

        match outcome {
            Ok(grant) => {
                auth.save_token(grant)?;
                telemetry::record_refresh("success");
                info!("session token refreshed");
                self.refetch_user().await;
                Ok(())
            }
            Err(err) => {
                telemetry::record_refresh("failure");
                warn!(%err, "session refresh failed; clearing stored credentials");
                if let Err(clear_err) = auth.clear() {
                    warn!(err = %clear_err, "failed to clear session after refresh failure");
                }
                Err(CirisError::Auth {
                    message: format!("session refresh failed: {err}"),
                    response: err.failure().cloned(),
                })
            }
        }
    }

    async fn refetch_user(&self) {
        let Some(token) = self.inner.auth.access_token() else {
            return;
        };
        let fetched = async {
            let res = self
                .send_once(&Method::GET, ME_PATH, &RequestOptions::new(), Some(&token))
                .await?;
            read_response(res, ResponseType::Json)
                .await?
                .into_json::<User>()
        }
        .await;
        match fetched {
            Ok(user) => {
                if let Err(err) = self.inner.auth.save_user_for(&token, user) {
                    warn!(%err, "could not cache refreshed user");
                }
            }
            Err(err) => warn!(%err, "could not re-fetch user after refresh"),
        }
    }

    async fn send_once(
        &self,
        method: &Method,
        path: &str,
        opts: &RequestOptions,
        token: Option<&str>,
    ) -> Result<Response> {
        if let Some(limiter) = &self.inner.limiter {
            limiter.acquire(&limiter_key(method, path)).await;
        }

        let url = self.url(path);
        let mut req = self
            .inner
            .client
            .request(method.clone(), &url)
            .headers(opts.headers.clone());
        if !opts.params.is_empty() {
            req = req.query(&opts.params);
        }
        if let Some(body) = &opts.body {
            req = req.json(body);
        }
        if let Some(token) = token {
            req = req.bearer_auth(token);
        }
        if let Some(timeout) = opts.timeout.or(self.inner.timeout) {
            req = req.timeout(timeout);
        }

        match req.send().await {
            Ok(res) => {
                telemetry::record_request(method.as_str(), telemetry::outcome_label(Some(res.status())));
                Ok(res)
            }
            Err(err) => {
                telemetry::record_request(method.as_str(), telemetry::outcome_label(None));
                warn!(%method, %url, %err, "request failed");
                Err(CirisError::from_transport(err))
            }
        }
    }
}

async fn read_response(res: Response, response_type: ResponseType) -> Result<ResponseBody> {
    let status = res.status();
    if !status.is_success() {
        let headers = res.headers().clone();
        return Err(match res.text().await {
            Ok(body) => classify_response(status, &headers, body),
            Err(err) => {
                warn!(%status, %err, "could not read error response body");
                classify_unreadable(status, &headers, &err.to_string())
            }
        });
    }

    let bytes = res.bytes().await.map_err(CirisError::from_transport)?;
    match response_type {
        ResponseType::Json => {
            if bytes.iter().all(u8::is_ascii_whitespace) {
                return Ok(ResponseBody::Json(Value::Null));
            }
            serde_json::from_slice::<Value>(&bytes)
                .map(|value| ResponseBody::Json(unwrap_envelope(value)))
                .map_err(|err| CirisError::decode(ResponseType::Json, err.to_string()))
        }
        ResponseType::Text => String::from_utf8(bytes.to_vec())
            .map(ResponseBody::Text)
            .map_err(|err| CirisError::decode(ResponseType::Text, err.to_string())),
        ResponseType::Blob => Ok(ResponseBody::Blob(bytes.to_vec())),
    }
}

/// `{"data": ..., "metadata": {...}}` → `data`.
pub(crate) fn unwrap_envelope(value: Value) -> Value {
    match value {
        Value::Object(mut obj)
            if obj.contains_key("data")
                && obj.keys().all(|k| k == "data" || k == "metadata") =>
        {
            obj.remove("data").unwrap_or(Value::Null)
        }
        other => other,
    }
}

/// Limiter category: method plus the first two path segments.
pub(crate) fn limiter_key(method: &Method, path: &str) -> String {
    let path = path.split(['?', '#']).next().unwrap_or_default();
    let segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).take(2).collect();
    format!("{} /{}", method, segments.join("/"))
}
