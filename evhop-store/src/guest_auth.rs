use std::sync::Arc;

use chrono::Utc;
use evhop_core::backend::{AuthApi, BackendError, GuestLogin, IssuedToken};
use evhop_core::session::{SessionStore, StoredToken, TokenKind};
use evhop_shared::models::UserProfile;
use tokio::sync::Mutex;
use tracing::info;
use uuid::Uuid;

/// Local lifetime, cut short when the backend expires the token sooner
fn stored(kind: TokenKind, issued: IssuedToken) -> StoredToken {
    let mut token = StoredToken::issue(kind, issued.token, Utc::now());
    if let Some(expires_at) = issued.expires_at {
        token.expires_at = token.expires_at.min(expires_at);
    }
    token
}

/// Hands out the bearer token for backend calls, creating an anonymous
/// account the first time one is needed.
pub struct GuestTokenProvider {
    auth: Arc<dyn AuthApi>,
    store: Arc<dyn SessionStore>,
    device_id: String,
    in_flight: Mutex<()>,
}

impl GuestTokenProvider {
    pub fn new(auth: Arc<dyn AuthApi>, store: Arc<dyn SessionStore>) -> Self {
        Self::with_device_id(auth, store, Uuid::new_v4().to_string())
    }

    pub fn with_device_id(auth: Arc<dyn AuthApi>, store: Arc<dyn SessionStore>, device_id: impl Into<String>) -> Self {
        Self {
            auth,
            store,
            device_id: device_id.into(),
            in_flight: Mutex::new(()),
        }
    }

    pub fn store(&self) -> &Arc<dyn SessionStore> {
        &self.store
    }

    /// A logged-in guest token wins over the anonymous one
    async fn cached(&self) -> Result<Option<(TokenKind, String)>, BackendError> {
        for kind in [TokenKind::Guest, TokenKind::Anonymous] {
            if let Some(token) = self.store.get_token(kind).await? {
                return Ok(Some((kind, token.value)));
            }
        }
        Ok(None)
    }

    /// Current token, creating the anonymous account at most once even under
    /// concurrent first calls.
    pub async fn token(&self) -> Result<(TokenKind, String), BackendError> {
        if let Some(found) = self.cached().await? {
            return Ok(found);
        }

        let _guard = self.in_flight.lock().await;
        if let Some(found) = self.cached().await? {
            return Ok(found);
        }

        let issued = self.auth.create_anonymous_user(&self.device_id).await?;
        let token = stored(TokenKind::Anonymous, issued);

        self.store.set_token(TokenKind::Anonymous, token.clone()).await?;
        info!(device_id = %self.device_id, "Anonymous account created");
        Ok((TokenKind::Anonymous, token.value))
    }

    /// Sign in as a named guest. The guest token is used ahead of the
    /// anonymous one until it expires or the backend rejects it.
    pub async fn login_guest(&self, login: &GuestLogin) -> Result<UserProfile, BackendError> {
        let issued = self.auth.login_guest(login).await?;
        let profile = issued.user.clone().unwrap_or_else(|| login.profile());

        self.store.set_token(TokenKind::Guest, stored(TokenKind::Guest, issued)).await?;
        self.store.set_profile(profile.clone()).await?;
        info!(whatsapp = %login.whatsapp, "Guest signed in");
        Ok(profile)
    }

    pub async fn invalidate(&self, kind: TokenKind) -> Result<(), BackendError> {
        self.store.clear_token(kind).await?;
        Ok(())
    }

    /// Forget tokens, profile and hotel; the next call starts a new anonymous account
    pub async fn logout(&self) -> Result<(), BackendError> {
        self.store.clear().await?;
        info!(device_id = %self.device_id, "Session cleared");
        Ok(())
    }
}
