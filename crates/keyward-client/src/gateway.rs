//! Authenticated request gateway.
//!
//! Every protected call goes through [`AuthGateway`]. It attaches the stored
//! access token as a bearer credential and, when the server answers 401,
//! refreshes the token once and replays the original request once. Callers
//! only ever see the final outcome.

use std::sync::Arc;
use std::time::Duration;

use keyward_common::config::KeywardConfig;
use keyward_common::models::{RefreshRequest, RefreshResponse, TokenPair};
use reqwest::header::{AUTHORIZATION, HeaderMap, HeaderName, HeaderValue};
use reqwest::{Client, ClientBuilder, Method, Response, StatusCode};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::error::{ClientError, Result};
use crate::store::TokenStore;

pub const REFRESH_PATH: &str = "/auth/token/refresh/";

/// Replays allowed per logical request.
const MAX_RETRIES: u8 = 1;

/// A captured outbound call that can be issued again verbatim.
#[derive(Debug, Clone)]
pub struct PendingRequest {
    pub method: Method,
    pub path: String,
    pub body: Option<Value>,
    pub headers: HeaderMap,
}

impl PendingRequest {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            body: None,
            headers: HeaderMap::new(),
        }
    }

    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::GET, path)
    }

    pub fn post(path: impl Into<String>) -> Self {
        Self::new(Method::POST, path)
    }

    /// Attach a JSON body.
    pub fn json<B: Serialize + ?Sized>(mut self, body: &B) -> Result<Self> {
        self.body = Some(serde_json::to_value(body)?);
        Ok(self)
    }

    /// Attach an extra header. `Authorization` is managed by the gateway and
    /// is replaced (or dropped when no token is stored) on send.
    pub fn header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.insert(name, value);
        self
    }
}

/// Retry bookkeeping for one logical request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Attempt {
    retries: u8,
}

impl Attempt {
    fn first() -> Self {
        Self { retries: 0 }
    }

    fn can_retry(self) -> bool {
        self.retries < MAX_RETRIES
    }

    fn retried(self) -> Self {
        Self {
            retries: self.retries + 1,
        }
    }
}

/// HTTP client that authenticates every request through a [`TokenStore`].
///
/// Cheap to clone; clones share the HTTP connection pool, the store, and the
/// refresh lock.
#[derive(Clone)]
pub struct AuthGateway {
    client: Client,
    base_url: String,
    store: Arc<dyn TokenStore>,
    refresh_lock: Arc<Mutex<()>>,
    clear_on_refresh_failure: bool,
}

impl AuthGateway {
    pub fn builder() -> AuthGatewayBuilder {
        AuthGatewayBuilder::default()
    }

    /// Gateway configured from the `api` and `auth` sections.
    pub fn from_config(config: &KeywardConfig, store: Arc<dyn TokenStore>) -> Result<Self> {
        let mut builder = Self::builder()
            .base_url(&config.api.base_url)
            .store(store)
            .clear_on_refresh_failure(config.auth.clear_on_refresh_failure);
        if let Some(secs) = config.api.timeout_secs {
            builder = builder.timeout(Duration::from_secs(secs));
        }
        builder.build()
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn store(&self) -> &Arc<dyn TokenStore> {
        &self.store
    }

    // ── Sending ───────────────────────────────────────────────────────────────

    /// Issue `request` with the current access token, refreshing and
    /// replaying once on a 401. Returns the successful response.
    pub async fn send(&self, request: &PendingRequest) -> Result<Response> {
        let mut attempt = Attempt::first();
        let mut refreshed: Option<String> = None;
        loop {
            let token = match refreshed.take() {
                Some(token) => Some(token),
                None => self.store.access_token().await?,
            };
            let response = self.dispatch(request, token.as_deref()).await?;
            let status = response.status();
            if status.is_success() {
                return Ok(response);
            }

            let error = ClientError::from_response(response).await;
            if status != StatusCode::UNAUTHORIZED || !attempt.can_retry() {
                return Err(error);
            }
            attempt = attempt.retried();

            match self.refresh_if_stale(token.as_deref()).await {
                Ok(access) => {
                    refreshed = Some(access);
                    debug!(method = %request.method, path = %request.path, "replaying after refresh");
                }
                Err(refresh_error) => {
                    warn!(path = %request.path, error = %refresh_error, "refresh failed, giving up");
                    return Err(error);
                }
            }
        }
    }

    /// Issue `request` without credentials and without 401 handling.
    /// Used for the token endpoints themselves.
    pub async fn send_anonymous(&self, request: &PendingRequest) -> Result<Response> {
        let response = self.dispatch(request, None).await?;
        if response.status().is_success() {
            Ok(response)
        } else {
            Err(ClientError::from_response(response).await)
        }
    }

    async fn dispatch(&self, request: &PendingRequest, token: Option<&str>) -> Result<Response> {
        let url = format!("{}{}", self.base_url, request.path);

        // `RequestBuilder::header` appends, so the credential is settled on the
        // map itself to keep exactly one `Authorization` per attempt.
        let mut headers = request.headers.clone();
        match token {
            Some(token) => {
                let mut bearer = HeaderValue::from_str(&format!("Bearer {token}"))
                    .map_err(|e| ClientError::MalformedToken(e.to_string()))?;
                bearer.set_sensitive(true);
                headers.insert(AUTHORIZATION, bearer);
            }
            None => {
                headers.remove(AUTHORIZATION);
            }
        }

        let mut builder = self
            .client
            .request(request.method.clone(), &url)
            .headers(headers);
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }

        Ok(builder.send().await?)
    }

    // ── Typed helpers ─────────────────────────────────────────────────────────

    pub async fn execute<T: DeserializeOwned>(&self, request: &PendingRequest) -> Result<T> {
        let response = self.send(request).await?;
        decode_body(response).await
    }

    pub async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        self.execute(&PendingRequest::get(path)).await
    }

    pub async fn post<T: DeserializeOwned, B: Serialize + ?Sized>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T> {
        self.execute(&PendingRequest::post(path).json(body)?).await
    }

    pub async fn put<T: DeserializeOwned, B: Serialize + ?Sized>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T> {
        self.execute(&PendingRequest::new(Method::PUT, path).json(body)?)
            .await
    }

    pub async fn patch<T: DeserializeOwned, B: Serialize + ?Sized>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T> {
        self.execute(&PendingRequest::new(Method::PATCH, path).json(body)?)
            .await
    }

    pub async fn delete(&self, path: &str) -> Result<()> {
        self.send(&PendingRequest::new(Method::DELETE, path))
            .await?;
        Ok(())
    }

    // ── Refresh ───────────────────────────────────────────────────────────────

    /// Exchange the stored refresh token for a new access token.
    pub async fn refresh(&self) -> Result<String> {
        let _guard = self.refresh_lock.lock().await;
        self.refresh_locked().await
    }

    /// Refresh unless another task already replaced `stale` while this one
    /// waited for the lock, in which case the newer token is returned as-is.
    pub async fn refresh_if_stale(&self, stale: Option<&str>) -> Result<String> {
        let _guard = self.refresh_lock.lock().await;
        if let Some(current) = self.store.access_token().await? {
            if stale != Some(current.as_str()) {
                debug!("access token already refreshed by a concurrent request");
                return Ok(current);
            }
        }
        self.refresh_locked().await
    }

    async fn refresh_locked(&self) -> Result<String> {
        match self.exchange_refresh_token().await {
            Ok(access) => Ok(access),
            Err(e) => {
                if self.clear_on_refresh_failure {
                    info!("clearing session after rejected refresh");
                    self.store.clear().await?;
                }
                Err(e)
            }
        }
    }

    async fn exchange_refresh_token(&self) -> Result<String> {
        let refresh = self
            .store
            .refresh_token()
            .await?
            .ok_or(ClientError::MissingRefreshToken)?;

        let request = PendingRequest::post(REFRESH_PATH).json(&RefreshRequest { refresh: &refresh })?;
        let response = self.send_anonymous(&request).await?;
        let body: RefreshResponse = response.json().await?;

        match body.refresh {
            Some(rotated) => {
                self.store
                    .set_tokens(&TokenPair::new(body.access.clone(), rotated))
                    .await?
            }
            None => self.store.set_access_token(&body.access).await?,
        }
        info!("access token refreshed");
        Ok(body.access)
    }
}

async fn decode_body<T: DeserializeOwned>(response: Response) -> Result<T> {
    if response.status() == StatusCode::NO_CONTENT {
        return serde_json::from_value(Value::Null).map_err(ClientError::Json);
    }
    let bytes = response.bytes().await?;
    if bytes.is_empty() {
        return serde_json::from_value(Value::Null).map_err(ClientError::Json);
    }
    Ok(serde_json::from_slice(&bytes)?)
}

/// Builder for [`AuthGateway`].
#[derive(Default)]
pub struct AuthGatewayBuilder {
    base_url: Option<String>,
    store: Option<Arc<dyn TokenStore>>,
    timeout: Option<Duration>,
    user_agent: Option<String>,
    clear_on_refresh_failure: bool,
}

impl AuthGatewayBuilder {
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = Some(url.into());
        self
    }

    pub fn store(mut self, store: Arc<dyn TokenStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn user_agent(mut self, agent: impl Into<String>) -> Self {
        self.user_agent = Some(agent.into());
        self
    }

    /// Wipe the store when the refresh endpoint rejects the refresh token.
    pub fn clear_on_refresh_failure(mut self, clear: bool) -> Self {
        self.clear_on_refresh_failure = clear;
        self
    }

    pub fn build(self) -> Result<AuthGateway> {
        let base_url = self
            .base_url
            .ok_or_else(|| ClientError::Configuration("base_url is required".into()))?;
        let store = self
            .store
            .ok_or_else(|| ClientError::Configuration("token store is required".into()))?;

        let mut client_builder = ClientBuilder::new().user_agent(
            self.user_agent
                .unwrap_or_else(|| concat!("keyward/", env!("CARGO_PKG_VERSION")).to_owned()),
        );
        if let Some(timeout) = self.timeout {
            client_builder = client_builder.timeout(timeout);
        }

        Ok(AuthGateway {
            client: client_builder.build()?,
            base_url: base_url.trim_end_matches('/').to_owned(),
            store,
            refresh_lock: Arc::new(Mutex::new(())),
            clear_on_refresh_failure: self.clear_on_refresh_failure,
        })
    }
}
