pub mod app_config;
pub mod backend_client;
pub mod guest_auth;
pub mod session_backend;
pub mod session_repo;

pub use backend_client::BackendClient;
pub use guest_auth::GuestTokenProvider;
pub use session_backend::SessionBackend;
pub use session_repo::{MemorySessionStore, RedisSessionStore};

use std::sync::Arc;

use evhop_core::session::{SessionError, SessionStore};

/// Redis-backed when configured, in-memory otherwise
pub fn open_session_store(config: &app_config::Config) -> Result<Arc<dyn SessionStore>, SessionError> {
    let base_url = config.backend.base_url.trim_end_matches('/');
    match config.session.redis_url.as_deref() {
        Some(url) => Ok(Arc::new(RedisSessionStore::new(url, base_url)?)),
        None => Ok(Arc::new(MemorySessionStore::new(base_url))),
    }
}
