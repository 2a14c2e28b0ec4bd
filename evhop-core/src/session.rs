use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use evhop_shared::models::UserProfile;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenKind {
    /// Token from an explicit guest login
    Guest,
    /// Token of the auto-created anonymous account
    Anonymous,
}

impl TokenKind {
    pub fn lifetime(self) -> Duration {
        match self {
            TokenKind::Guest => Duration::hours(24),
            TokenKind::Anonymous => Duration::days(30),
        }
    }

    /// Storage key for this token.
    ///
    /// Anonymous tokens are scoped to the backend they were issued by, so pointing
    /// the app at a different environment never reuses a foreign account.
    pub fn storage_key(self, backend_base_url: &str) -> String {
        match self {
            TokenKind::Guest => "guest_token".to_string(),
            TokenKind::Anonymous => {
                let digest = Sha256::digest(backend_base_url.as_bytes());
                let hex: String = digest.iter().take(8).map(|b| format!("{:02x}", b)).collect();
                format!("anon_token:{}", hex)
            }
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct StoredToken {
    pub value: String,
    pub expires_at: DateTime<Utc>,
}

impl StoredToken {
    pub fn issue(kind: TokenKind, value: String, now: DateTime<Utc>) -> Self {
        Self {
            value,
            expires_at: now + kind.lifetime(),
        }
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }
}

/// Hotel the admin pages were last opened for
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct HotelRef {
    pub slug: String,
    pub name: String,
}

#[derive(Debug, Clone, thiserror::Error)]
pub enum SessionError {
    #[error("Session storage unavailable: {0}")]
    Storage(String),
    #[error("Corrupt session entry {key}: {reason}")]
    Corrupt { key: String, reason: String },
}

/// Token, profile and hotel cache with an explicit lifecycle.
///
/// Created once at bootstrap and cleared on logout. Expired tokens read as absent.
#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn get_token(&self, kind: TokenKind) -> Result<Option<StoredToken>, SessionError>;

    async fn set_token(&self, kind: TokenKind, token: StoredToken) -> Result<(), SessionError>;

    async fn clear_token(&self, kind: TokenKind) -> Result<(), SessionError>;

    async fn get_profile(&self) -> Result<Option<UserProfile>, SessionError>;

    async fn set_profile(&self, profile: UserProfile) -> Result<(), SessionError>;

    async fn get_hotel(&self) -> Result<Option<HotelRef>, SessionError>;

    async fn set_hotel(&self, hotel: HotelRef) -> Result<(), SessionError>;

    /// Drop every token and both caches
    async fn clear(&self) -> Result<(), SessionError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_anonymous_key_depends_on_backend() {
        let prod = TokenKind::Anonymous.storage_key("https://api.evhop.id");
        let staging = TokenKind::Anonymous.storage_key("https://staging.evhop.id");

        assert!(prod.starts_with("anon_token:"));
        assert_eq!(prod.len(), "anon_token:".len() + 16);
        assert_ne!(prod, staging);
        assert_eq!(prod, TokenKind::Anonymous.storage_key("https://api.evhop.id"));
    }

    #[test]
    fn test_token_lifetimes() {
        let now = Utc::now();
        let guest = StoredToken::issue(TokenKind::Guest, "g".into(), now);
        let anon = StoredToken::issue(TokenKind::Anonymous, "a".into(), now);

        assert!(!guest.is_expired(now + Duration::hours(23)));
        assert!(guest.is_expired(now + Duration::hours(24)));
        assert!(!anon.is_expired(now + Duration::days(29)));
        assert!(anon.is_expired(now + Duration::days(30)));
    }
}
