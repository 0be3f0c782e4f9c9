//! Session state machine.
//!
//! `SessionStore` is owned by the application and handed to whatever needs
//! it. It moves between four states:
//!
//! - `Uninitialized` until `initialize` runs
//! - `Loading` while credentials are being hydrated or submitted
//! - `Authenticated` once a user profile has been fetched
//! - `Unauthenticated` after logout, failed login, or an expired session

use std::sync::{Arc, RwLock, RwLockWriteGuard};

use serde::Serialize;
use serde_json::{json, Value};
use tracing::{debug, info, warn};

use crate::api::{ApiClient, ApiResult, GatewayEvent};
use crate::models::{
    AuthTokens, ChangePasswordRequest, LoginRequest, ProfileUpdate, RefreshRequest,
    RegisterRequest, ResetPasswordRequest, User,
};

use super::CredentialPair;

pub const LOGIN_PATH: &str = "/auth/login";
pub const REGISTER_PATH: &str = "/auth/register";
pub const LOGOUT_PATH: &str = "/auth/logout";
pub const ME_PATH: &str = "/auth/me";
const PROFILE_PATH: &str = "/auth/profile";
const CHANGE_PASSWORD_PATH: &str = "/auth/change-password";
const FORGOT_PASSWORD_PATH: &str = "/auth/forgot-password";
const RESET_PASSWORD_PATH: &str = "/auth/reset-password";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SessionStatus {
    #[default]
    Uninitialized,
    Loading,
    Authenticated,
    Unauthenticated,
}

/// Point-in-time view of the session.
#[derive(Debug, Clone, Default)]
pub struct SessionSnapshot {
    pub user: Option<User>,
    pub credentials: Option<CredentialPair>,
    pub status: SessionStatus,
}

impl SessionSnapshot {
    pub fn is_authenticated(&self) -> bool {
        self.status == SessionStatus::Authenticated
    }

    pub fn is_loading(&self) -> bool {
        self.status == SessionStatus::Loading
    }
}

#[derive(Debug, Default)]
struct SessionState {
    user: Option<User>,
    status: SessionStatus,
}

/// Current user and authentication status, backed by the gateway's
/// credentials. Clones share state.
#[derive(Clone)]
pub struct SessionStore {
    gateway: ApiClient,
    state: Arc<RwLock<SessionState>>,
}

impl SessionStore {
    pub fn new(gateway: ApiClient) -> Self {
        Self {
            gateway,
            state: Arc::new(RwLock::new(SessionState::default())),
        }
    }

    pub fn gateway(&self) -> &ApiClient {
        &self.gateway
    }

    fn state(&self) -> RwLockWriteGuard<'_, SessionState> {
        self.state.write().unwrap_or_else(|p| p.into_inner())
    }

    fn set_status(&self, status: SessionStatus) {
        debug!(?status, "Session status changed");
        self.state().status = status;
    }

    fn commit(&self, user: User) {
        info!(username = %user.username, "Session authenticated");
        let mut state = self.state();
        state.user = Some(user);
        state.status = SessionStatus::Authenticated;
    }

    fn reset(&self) {
        let mut state = self.state();
        state.user = None;
        state.status = SessionStatus::Unauthenticated;
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        let state = self.state.read().unwrap_or_else(|p| p.into_inner());
        SessionSnapshot {
            user: state.user.clone(),
            credentials: self.gateway.credentials(),
            status: state.status,
        }
    }

    pub fn status(&self) -> SessionStatus {
        self.state.read().unwrap_or_else(|p| p.into_inner()).status
    }

    pub fn is_authenticated(&self) -> bool {
        self.status() == SessionStatus::Authenticated
    }

    pub fn is_loading(&self) -> bool {
        self.status() == SessionStatus::Loading
    }

    pub fn user(&self) -> Option<User> {
        self.state.read().unwrap_or_else(|p| p.into_inner()).user.clone()
    }

    // ===== Lifecycle =====

    /// Restore a session from stored credentials.
    pub async fn initialize(&self) -> SessionStatus {
        self.set_status(SessionStatus::Loading);

        if self.gateway.hydrate().is_none() {
            debug!("No stored credentials");
            self.reset();
            return SessionStatus::Unauthenticated;
        }

        match self.gateway.get::<User>(ME_PATH).await {
            Ok(user) => {
                self.commit(user);
                SessionStatus::Authenticated
            }
            Err(e) => {
                warn!(error = %e, "Failed to restore session");
                self.gateway.clear_credentials();
                self.reset();
                SessionStatus::Unauthenticated
            }
        }
    }

    pub async fn login(&self, username: &str, password: &str) -> ApiResult<User> {
        let body = LoginRequest { username, password };
        self.authenticate(LOGIN_PATH, &body).await
    }

    pub async fn register(&self, username: &str, email: &str, password: &str) -> ApiResult<User> {
        let body = RegisterRequest {
            username,
            email,
            password,
        };
        self.authenticate(REGISTER_PATH, &body).await
    }

    /// Submit credentials, store the returned pair, then fetch the profile.
    /// Any failure leaves the session unauthenticated with no credentials.
    async fn authenticate<B: Serialize>(&self, path: &str, body: &B) -> ApiResult<User> {
        self.set_status(SessionStatus::Loading);

        let result = async {
            let tokens: AuthTokens = self.gateway.post(path, body).await?;
            self.gateway.set_credentials(tokens.access, tokens.refresh);
            self.gateway.get::<User>(ME_PATH).await
        }
        .await;

        match result {
            Ok(user) => {
                self.commit(user.clone());
                Ok(user)
            }
            Err(e) => {
                debug!(path = path, error = %e, "Authentication failed");
                self.gateway.clear_credentials();
                self.reset();
                Err(e)
            }
        }
    }

    /// End the session. The server is told on a best-effort basis; local
    /// state is always cleared.
    pub async fn logout(&self) {
        if let Some(pair) = self.gateway.credentials() {
            let body = RefreshRequest {
                refresh: &pair.refresh,
            };
            if let Err(e) = self.gateway.post::<Value, _>(LOGOUT_PATH, &body).await {
                warn!(error = %e, "Logout notification failed");
            }
        } else {
            debug!("No refresh token, skipping logout notification");
        }

        self.gateway.clear_credentials();
        self.reset();
        info!("Logged out");
    }

    /// Drop the session locally without telling the server.
    pub fn teardown(&self) {
        self.gateway.clear_credentials();
        self.reset();
    }

    /// Apply a gateway notification. Returns true if the session changed.
    pub fn handle_gateway_event(&self, event: GatewayEvent) -> bool {
        match event {
            GatewayEvent::SessionExpired => {
                if self.status() == SessionStatus::Authenticated {
                    warn!("Session expired");
                    self.reset();
                    true
                } else {
                    false
                }
            }
        }
    }

    // ===== Profile =====

    pub async fn update_user(&self, profile: &ProfileUpdate) -> ApiResult<User> {
        let user: User = self.gateway.put(PROFILE_PATH, profile).await?;
        self.state().user = Some(user.clone());
        Ok(user)
    }

    pub async fn change_password(&self, current_password: &str, new_password: &str) -> ApiResult<()> {
        let body = ChangePasswordRequest {
            current_password,
            new_password,
        };
        self.gateway
            .post::<Value, _>(CHANGE_PASSWORD_PATH, &body)
            .await
            .map(|_| ())
    }

    pub async fn forgot_password(&self, email: &str) -> ApiResult<()> {
        self.gateway
            .post::<Value, _>(FORGOT_PASSWORD_PATH, &json!({ "email": email }))
            .await
            .map(|_| ())
    }

    pub async fn reset_password(&self, token: &str, new_password: &str) -> ApiResult<()> {
        let body = ResetPasswordRequest {
            token,
            new_password,
        };
        self.gateway
            .post::<Value, _>(RESET_PASSWORD_PATH, &body)
            .await
            .map(|_| ())
    }
}
