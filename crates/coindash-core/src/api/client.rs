//! Token gateway for the coindash backend.
//!
//! `ApiClient` is the only HTTP egress in the application. It owns the
//! credential pair, attaches it as a bearer header, and recovers from an
//! expired access token with a single refresh followed by a single replay.

use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::Duration;

use anyhow::{Context, Result};
use reqwest::{Client, Method, StatusCode};
use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;
use tokio::sync::{broadcast, Mutex};
use tracing::{debug, info, warn};

use crate::auth::{CredentialPair, CredentialStore};
use crate::models::{AuthTokens, RefreshRequest};

use super::{ApiError, ApiResult, CancellationReceiver};

// ============================================================================
// Constants
// ============================================================================

pub const REFRESH_PATH: &str = "/auth/refresh";

/// Capacity of the gateway event channel
const EVENT_CHANNEL_CAPACITY: usize = 16;

/// Notifications published by the gateway.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GatewayEvent {
    /// Credentials were rejected and could not be refreshed. They have
    /// already been cleared.
    SessionExpired,
}

/// Authenticated HTTP client.
/// Clone is cheap; clones share credentials, the refresh lock and the
/// event channel.
#[derive(Clone)]
pub struct ApiClient {
    client: Client,
    base_url: Arc<str>,
    credentials: Arc<RwLock<Option<CredentialPair>>>,
    store: CredentialStore,
    refresh_lock: Arc<Mutex<()>>,
    events: broadcast::Sender<GatewayEvent>,
}

impl ApiClient {
    /// Create a client for `base_url` with no credentials loaded.
    pub fn new(base_url: &str, timeout: Duration, store: CredentialStore) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to build HTTP client")?;
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);

        Ok(Self {
            client,
            base_url: Arc::from(base_url.trim_end_matches('/')),
            credentials: Arc::new(RwLock::new(None)),
            store,
            refresh_lock: Arc::new(Mutex::new(())),
            events,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn subscribe(&self) -> broadcast::Receiver<GatewayEvent> {
        self.events.subscribe()
    }

    // ===== Credentials =====

    fn read_credentials(&self) -> RwLockReadGuard<'_, Option<CredentialPair>> {
        self.credentials.read().unwrap_or_else(|p| p.into_inner())
    }

    fn write_credentials(&self) -> RwLockWriteGuard<'_, Option<CredentialPair>> {
        self.credentials.write().unwrap_or_else(|p| p.into_inner())
    }

    /// Current credential pair, if any
    pub fn credentials(&self) -> Option<CredentialPair> {
        self.read_credentials().clone()
    }

    pub fn has_credentials(&self) -> bool {
        self.read_credentials().is_some()
    }

    fn access_token(&self) -> Option<String> {
        self.read_credentials().as_ref().map(|c| c.access.clone())
    }

    /// Replace both tokens and persist them.
    pub fn set_credentials(&self, access: impl Into<String>, refresh: impl Into<String>) {
        let pair = CredentialPair::new(access, refresh);
        let mut guard = self.write_credentials();
        if let Err(e) = self.store.save(&pair) {
            warn!(error = %e, "Failed to persist credentials");
        }
        *guard = Some(pair);
    }

    /// Remove both tokens from memory and storage.
    pub fn clear_credentials(&self) {
        let mut guard = self.write_credentials();
        if let Err(e) = self.store.clear() {
            warn!(error = %e, "Failed to remove stored credentials");
        }
        *guard = None;
    }

    /// Load stored credentials into memory, replacing what is held.
    pub fn hydrate(&self) -> Option<CredentialPair> {
        let stored = match self.store.load() {
            Ok(stored) => stored,
            Err(e) => {
                warn!(error = %e, "Failed to load stored credentials");
                None
            }
        };
        *self.write_credentials() = stored.clone();
        stored
    }

    fn expire_session(&self) {
        self.clear_credentials();
        // No receivers is fine; nobody is listening yet
        let _ = self.events.send(GatewayEvent::SessionExpired);
    }

    // ===== Requests =====

    fn url(&self, path: &str) -> String {
        if path.starts_with('/') {
            format!("{}{}", self.base_url, path)
        } else {
            format!("{}/{}", self.base_url, path)
        }
    }

    async fn send(
        &self,
        method: &Method,
        path: &str,
        body: Option<&Value>,
        token: Option<&str>,
    ) -> ApiResult<reqwest::Response> {
        let mut request = self.client.request(method.clone(), self.url(path));
        if let Some(token) = token {
            request = request.bearer_auth(token);
        }
        if let Some(body) = body {
            request = request.json(body);
        }

        request.send().await.map_err(|e| {
            debug!(method = %method, path = path, error = %e, "Request failed before a response");
            ApiError::from_transport(e)
        })
    }

    /// Turn a response into its JSON body, or a classified error.
    /// An empty success body reads as `null`.
    async fn parse_response(response: reqwest::Response) -> ApiResult<Value> {
        let status = response.status();
        let text = response.text().await.map_err(ApiError::from_transport)?;

        if !status.is_success() {
            return Err(ApiError::from_status(status, &text));
        }
        if text.trim().is_empty() {
            return Ok(Value::Null);
        }
        serde_json::from_str(&text).map_err(ApiError::decode)
    }

    async fn execute(&self, method: &Method, path: &str, body: Option<&Value>) -> ApiResult<Value> {
        let sent_with = self.access_token();
        debug!(method = %method, path = path, "Sending request");

        let response = self.send(method, path, body, sent_with.as_deref()).await?;
        if response.status() != StatusCode::UNAUTHORIZED {
            return Self::parse_response(response).await;
        }

        let rejected = Self::parse_response(response)
            .await
            .err()
            .unwrap_or_else(|| ApiError::from_status(StatusCode::UNAUTHORIZED, ""));
        debug!(path = path, "Access token rejected, refreshing");

        let token = self
            .refresh_after_unauthorized(sent_with.as_deref(), rejected)
            .await?;

        let replayed = match self.send(method, path, body, Some(&token)).await {
            Ok(response) => Self::parse_response(response).await,
            Err(e) => Err(e),
        };
        if let Err(ref e) = replayed {
            warn!(path = path, error = %e, "Replay after refresh failed, ending session");
            self.expire_session();
        }
        replayed
    }

    /// Obtain a fresh access token after `stale` was rejected.
    ///
    /// Refreshes are serialised. If another task already replaced the
    /// token while this one waited, its result is reused.
    async fn refresh_after_unauthorized(
        &self,
        stale: Option<&str>,
        rejected: ApiError,
    ) -> ApiResult<String> {
        let _guard = self.refresh_lock.lock().await;

        let Some(current) = self.credentials() else {
            debug!("No refresh token available");
            self.expire_session();
            return Err(rejected);
        };

        if stale != Some(current.access.as_str()) {
            debug!("Token already refreshed by another request");
            return Ok(current.access);
        }

        match self.refresh_tokens(&current.refresh).await {
            Ok(tokens) => {
                info!("Access token refreshed");
                let access = tokens.access.clone();
                self.set_credentials(tokens.access, tokens.refresh);
                Ok(access)
            }
            Err(e) => {
                warn!(error = %e, "Token refresh failed, ending session");
                self.expire_session();
                Err(e)
            }
        }
    }

    /// POST the refresh token. Never goes through the retry path.
    async fn refresh_tokens(&self, refresh: &str) -> ApiResult<AuthTokens> {
        let body = serde_json::to_value(RefreshRequest { refresh }).map_err(ApiError::decode)?;
        let response = self.send(&Method::POST, REFRESH_PATH, Some(&body), None).await?;
        let value = Self::parse_response(response).await?;
        serde_json::from_value(value).map_err(ApiError::decode)
    }

    /// Issue a request and decode the JSON body into `T`.
    pub async fn request<T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        body: Option<Value>,
    ) -> ApiResult<T> {
        let value = self.execute(&method, path, body.as_ref()).await?;
        serde_json::from_value(value).map_err(ApiError::decode)
    }

    /// Like `request`, abandoned with a `Cancelled` error once `cancel` fires.
    pub async fn request_with_cancel<T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        body: Option<Value>,
        cancel: &mut CancellationReceiver,
    ) -> ApiResult<T> {
        cancel
            .run_until_cancelled(self.request(method, path, body))
            .await
    }

    fn to_body<B: Serialize + ?Sized>(body: &B) -> ApiResult<Value> {
        serde_json::to_value(body).map_err(ApiError::decode)
    }

    pub async fn get<T: DeserializeOwned>(&self, path: &str) -> ApiResult<T> {
        self.request(Method::GET, path, None).await
    }

    pub async fn post<T: DeserializeOwned, B: Serialize + ?Sized>(
        &self,
        path: &str,
        body: &B,
    ) -> ApiResult<T> {
        self.request(Method::POST, path, Some(Self::to_body(body)?))
            .await
    }

    pub async fn put<T: DeserializeOwned, B: Serialize + ?Sized>(
        &self,
        path: &str,
        body: &B,
    ) -> ApiResult<T> {
        self.request(Method::PUT, path, Some(Self::to_body(body)?))
            .await
    }

    pub async fn patch<T: DeserializeOwned, B: Serialize + ?Sized>(
        &self,
        path: &str,
        body: &B,
    ) -> ApiResult<T> {
        self.request(Method::PATCH, path, Some(Self::to_body(body)?))
            .await
    }

    pub async fn delete<T: DeserializeOwned>(&self, path: &str) -> ApiResult<T> {
        self.request(Method::DELETE, path, None).await
    }
}
