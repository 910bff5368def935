//! Session payloads stored under the `session:` namespace.

use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::cache::{Cache, KeySpace, SESSION_PREFIX};

/// Session lifetime used when the caller does not pick one.
pub const DEFAULT_SESSION_TTL_SECS: u64 = 3600;

/// Typed session store.
///
/// `T` is the session payload; every session in one store shares its serde
/// representation.
pub struct SessionStore<T> {
    sessions: KeySpace<T>,
}

impl<T> Clone for SessionStore<T> {
    fn clone(&self) -> Self {
        Self {
            sessions: self.sessions.clone(),
        }
    }
}

impl<T: Serialize + DeserializeOwned> SessionStore<T> {
    pub fn new(cache: &Cache) -> Self {
        Self {
            sessions: cache.reserved_keyspace(SESSION_PREFIX),
        }
    }

    /// Create or refresh a session.
    pub async fn set_session(&self, session_id: &str, data: &T, ttl_secs: u64) -> bool {
        self.sessions.set(session_id, data, Some(ttl_secs)).await
    }

    /// Create or refresh a session with [`DEFAULT_SESSION_TTL_SECS`].
    pub async fn set_session_default(&self, session_id: &str, data: &T) -> bool {
        self.set_session(session_id, data, DEFAULT_SESSION_TTL_SECS).await
    }

    pub async fn get_session(&self, session_id: &str) -> Option<T> {
        self.sessions.get(session_id).await
    }

    pub async fn delete_session(&self, session_id: &str) -> bool {
        self.sessions.del(session_id).await
    }

    /// Extend a live session by rewriting it with a fresh TTL.
    ///
    /// Returns `false` if the session does not exist (or the store is
    /// unavailable).
    pub async fn touch_session(&self, session_id: &str, ttl_secs: u64) -> bool {
        match self.get_session(session_id).await {
            Some(data) => self.set_session(session_id, &data, ttl_secs).await,
            None => false,
        }
    }

    /// Store key for a session id.
    pub fn key(&self, session_id: &str) -> String {
        self.sessions.key(session_id)
    }
}
