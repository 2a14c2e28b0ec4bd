use std::collections::HashMap;

use async_trait::async_trait;
use chrono::Utc;
use evhop_core::session::{HotelRef, SessionError, SessionStore, StoredToken, TokenKind};
use evhop_shared::models::UserProfile;
use redis::AsyncCommands;
use tokio::sync::RwLock;
use tracing::info;

const PROFILE_KEY: &str = "user_profile";
const HOTEL_KEY: &str = "admin_hotel";

/// In-process session, lost on restart
pub struct MemorySessionStore {
    backend_base_url: String,
    tokens: RwLock<HashMap<String, StoredToken>>,
    profile: RwLock<Option<UserProfile>>,
    hotel: RwLock<Option<HotelRef>>,
}

impl MemorySessionStore {
    pub fn new(backend_base_url: impl Into<String>) -> Self {
        Self {
            backend_base_url: backend_base_url.into(),
            tokens: RwLock::new(HashMap::new()),
            profile: RwLock::new(None),
            hotel: RwLock::new(None),
        }
    }
}

#[async_trait]
impl SessionStore for MemorySessionStore {
    async fn get_token(&self, kind: TokenKind) -> Result<Option<StoredToken>, SessionError> {
        let key = kind.storage_key(&self.backend_base_url);
        let token = self.tokens.read().await.get(&key).cloned();

        match token {
            Some(t) if t.is_expired(Utc::now()) => {
                self.tokens.write().await.remove(&key);
                Ok(None)
            }
            other => Ok(other),
        }
    }

    async fn set_token(&self, kind: TokenKind, token: StoredToken) -> Result<(), SessionError> {
        let key = kind.storage_key(&self.backend_base_url);
        self.tokens.write().await.insert(key, token);
        Ok(())
    }

    async fn clear_token(&self, kind: TokenKind) -> Result<(), SessionError> {
        let key = kind.storage_key(&self.backend_base_url);
        self.tokens.write().await.remove(&key);
        Ok(())
    }

    async fn get_profile(&self) -> Result<Option<UserProfile>, SessionError> {
        Ok(self.profile.read().await.clone())
    }

    async fn set_profile(&self, profile: UserProfile) -> Result<(), SessionError> {
        *self.profile.write().await = Some(profile);
        Ok(())
    }

    async fn get_hotel(&self) -> Result<Option<HotelRef>, SessionError> {
        Ok(self.hotel.read().await.clone())
    }

    async fn set_hotel(&self, hotel: HotelRef) -> Result<(), SessionError> {
        *self.hotel.write().await = Some(hotel);
        Ok(())
    }

    async fn clear(&self) -> Result<(), SessionError> {
        self.tokens.write().await.clear();
        *self.profile.write().await = None;
        *self.hotel.write().await = None;
        Ok(())
    }
}

fn storage(e: redis::RedisError) -> SessionError {
    SessionError::Storage(e.to_string())
}

/// Session kept in Redis; tokens expire with the key's TTL
#[derive(Clone)]
pub struct RedisSessionStore {
    client: redis::Client,
    backend_base_url: String,
    prefix: String,
}

impl RedisSessionStore {
    pub fn new(connection_string: &str, backend_base_url: impl Into<String>) -> Result<Self, SessionError> {
        let client = redis::Client::open(connection_string).map_err(storage)?;
        Ok(Self {
            client,
            backend_base_url: backend_base_url.into(),
            prefix: "evhop:session".to_string(),
        })
    }

    /// Namespace for every key this store writes
    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = prefix.into();
        self
    }

    fn key(&self, name: &str) -> String {
        format!("{}:{}", self.prefix, name)
    }

    fn token_key(&self, kind: TokenKind) -> String {
        self.key(&kind.storage_key(&self.backend_base_url))
    }

    async fn connection(&self) -> Result<redis::aio::MultiplexedConnection, SessionError> {
        self.client.get_multiplexed_async_connection().await.map_err(storage)
    }

    async fn read_json<T: serde::de::DeserializeOwned>(&self, key: &str) -> Result<Option<T>, SessionError> {
        let mut conn = self.connection().await?;
        let raw: Option<String> = conn.get(key).await.map_err(storage)?;

        raw.map(|raw| {
            serde_json::from_str(&raw).map_err(|e| SessionError::Corrupt {
                key: key.to_string(),
                reason: e.to_string(),
            })
        })
        .transpose()
    }

    async fn write_json<T: serde::Serialize>(&self, key: &str, value: &T) -> Result<(), SessionError> {
        let raw = serde_json::to_string(value).map_err(|e| SessionError::Storage(e.to_string()))?;
        let mut conn = self.connection().await?;
        conn.set::<_, _, ()>(key, raw).await.map_err(storage)
    }
}

#[async_trait]
impl SessionStore for RedisSessionStore {
    async fn get_token(&self, kind: TokenKind) -> Result<Option<StoredToken>, SessionError> {
        let token: Option<StoredToken> = self.read_json(&self.token_key(kind)).await?;
        Ok(token.filter(|t| !t.is_expired(Utc::now())))
    }

    async fn set_token(&self, kind: TokenKind, token: StoredToken) -> Result<(), SessionError> {
        let ttl = (token.expires_at - Utc::now()).num_seconds();
        if ttl <= 0 {
            return self.clear_token(kind).await;
        }

        let raw = serde_json::to_string(&token).map_err(|e| SessionError::Storage(e.to_string()))?;
        let mut conn = self.connection().await?;
        conn.set_ex::<_, _, ()>(self.token_key(kind), raw, ttl as u64)
            .await
            .map_err(storage)?;
        info!(?kind, "Session token stored");
        Ok(())
    }

    async fn clear_token(&self, kind: TokenKind) -> Result<(), SessionError> {
        let mut conn = self.connection().await?;
        conn.del::<_, ()>(self.token_key(kind)).await.map_err(storage)
    }

    async fn get_profile(&self) -> Result<Option<UserProfile>, SessionError> {
        self.read_json(&self.key(PROFILE_KEY)).await
    }

    async fn set_profile(&self, profile: UserProfile) -> Result<(), SessionError> {
        self.write_json(&self.key(PROFILE_KEY), &profile).await
    }

    async fn get_hotel(&self) -> Result<Option<HotelRef>, SessionError> {
        self.read_json(&self.key(HOTEL_KEY)).await
    }

    async fn set_hotel(&self, hotel: HotelRef) -> Result<(), SessionError> {
        self.write_json(&self.key(HOTEL_KEY), &hotel).await
    }

    async fn clear(&self) -> Result<(), SessionError> {
        let keys = [
            self.token_key(TokenKind::Guest),
            self.token_key(TokenKind::Anonymous),
            self.key(PROFILE_KEY),
            self.key(HOTEL_KEY),
        ];
        let mut conn = self.connection().await?;
        for key in keys {
            conn.del::<_, ()>(key).await.map_err(storage)?;
        }
        info!("Session cleared");
        Ok(())
    }
}
