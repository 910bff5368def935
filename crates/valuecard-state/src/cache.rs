//! Generic JSON cache on top of the store handle.
//!
//! Every public operation is fail-safe: store failures, timeouts,
//! serialization errors and disabled mode all collapse into the same answer
//! as a cold cache (`None` / `false`).

use std::borrow::Cow;
use std::marker::PhantomData;
use std::sync::Arc;

use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::connection::StoreConnection;
use crate::error::{StateError, StateResult, fallback};
use crate::telemetry;

/// Namespace owned by [`crate::SessionStore`].
pub const SESSION_PREFIX: &str = "session:";
/// Namespace owned by [`crate::TokenRevocationList`].
pub const BLACKLIST_PREFIX: &str = "blacklist:";

/// Prefixes callers may not write to directly.
pub const RESERVED_PREFIXES: &[&str] = &[SESSION_PREFIX, BLACKLIST_PREFIX];

pub(crate) fn check_caller_key(key: &str) -> StateResult<()> {
    if RESERVED_PREFIXES.iter().any(|prefix| key.starts_with(prefix)) {
        return Err(StateError::ReservedKey(key.to_string()));
    }
    Ok(())
}

fn check_ttl(ttl_secs: Option<u64>) -> StateResult<()> {
    match ttl_secs {
        Some(0) => Err(StateError::InvalidArgument("ttl must be > 0 seconds".into())),
        _ => Ok(()),
    }
}

#[derive(Clone)]
pub struct Cache {
    connection: Arc<StoreConnection>,
}

impl Cache {
    pub fn new(connection: Arc<StoreConnection>) -> Self {
        Self { connection }
    }

    pub fn connection(&self) -> &Arc<StoreConnection> {
        &self.connection
    }

    /// Serialize `value` and store it under `key`, optionally expiring after
    /// `ttl_secs`. Returns `false` on any failure.
    pub async fn set<T: Serialize + ?Sized>(&self, key: &str, value: &T, ttl_secs: Option<u64>) -> bool {
        let result = match check_caller_key(key) {
            Ok(()) => self.try_set(key, value, ttl_secs).await.map(|()| true),
            Err(e) => Err(e),
        };
        fallback("cache_set", key, result, false)
    }

    /// Read and deserialize the value under `key`.
    pub async fn get<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let result = match check_caller_key(key) {
            Ok(()) => self.try_get(key).await,
            Err(e) => Err(e),
        };
        fallback("cache_get", key, result, None)
    }

    /// Remove `key`. Deleting a missing key still counts as success.
    pub async fn del(&self, key: &str) -> bool {
        let result = match check_caller_key(key) {
            Ok(()) => self.try_del(key).await.map(|()| true),
            Err(e) => Err(e),
        };
        fallback("cache_del", key, result, false)
    }

    /// A typed view over all keys beginning with `prefix`.
    ///
    /// Keys produced by the view are still checked against the reserved
    /// namespaces.
    pub fn keyspace<T>(&self, prefix: impl Into<Cow<'static, str>>) -> KeySpace<T> {
        KeySpace {
            cache: self.clone(),
            prefix: prefix.into(),
            reserved: false,
            _payload: PhantomData,
        }
    }

    /// A typed view over one of the layer's own namespaces.
    pub(crate) fn reserved_keyspace<T>(&self, prefix: &'static str) -> KeySpace<T> {
        KeySpace {
            cache: self.clone(),
            prefix: Cow::Borrowed(prefix),
            reserved: true,
            _payload: PhantomData,
        }
    }

    pub(crate) async fn try_set<T: Serialize + ?Sized>(
        &self,
        key: &str,
        value: &T,
        ttl_secs: Option<u64>,
    ) -> StateResult<()> {
        check_ttl(ttl_secs)?;
        let handle = self.connection.handle()?;
        let payload = serde_json::to_string(value)?;

        let cmd = match ttl_secs {
            Some(ttl) => redis::Cmd::set_ex(key, payload, ttl),
            None => redis::Cmd::set(key, payload),
        };
        handle.query::<()>(&cmd).await?;
        tracing::debug!(key = %key, ttl_secs = ?ttl_secs, "cache set");
        Ok(())
    }

    pub(crate) async fn try_get<T: DeserializeOwned>(&self, key: &str) -> StateResult<Option<T>> {
        let handle = self.connection.handle()?;

        match handle.query::<Option<String>>(&redis::Cmd::get(key)).await? {
            Some(raw) => {
                let value = serde_json::from_str(&raw)?;
                tracing::debug!(key = %key, "cache hit");
                telemetry::record_cache_hit();
                Ok(Some(value))
            }
            None => {
                tracing::debug!(key = %key, "cache miss");
                telemetry::record_cache_miss();
                Ok(None)
            }
        }
    }

    pub(crate) async fn try_del(&self, key: &str) -> StateResult<()> {
        let handle = self.connection.handle()?;
        let removed: i64 = handle.query(&redis::Cmd::del(key)).await?;
        tracing::debug!(key = %key, removed, "cache delete");
        Ok(())
    }
}

/// A prefix bound to a payload type.
///
/// All values under one keyspace share a single serde contract, so a reader
/// cannot accidentally decode another component's entries.
pub struct KeySpace<T> {
    cache: Cache,
    prefix: Cow<'static, str>,
    reserved: bool,
    _payload: PhantomData<fn() -> T>,
}

impl<T> Clone for KeySpace<T> {
    fn clone(&self) -> Self {
        Self {
            cache: self.cache.clone(),
            prefix: self.prefix.clone(),
            reserved: self.reserved,
            _payload: PhantomData,
        }
    }
}

impl<T> KeySpace<T> {
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Full store key for a logical id.
    pub fn key(&self, id: &str) -> String {
        format!("{}{}", self.prefix, id)
    }

    fn checked_key(&self, id: &str) -> StateResult<String> {
        let key = self.key(id);
        if !self.reserved {
            check_caller_key(&key)?;
        }
        Ok(key)
    }
}

impl<T: Serialize + DeserializeOwned> KeySpace<T> {
    pub async fn set(&self, id: &str, value: &T, ttl_secs: Option<u64>) -> bool {
        let key = self.key(id);
        let result = match self.checked_key(id) {
            Ok(key) => self.cache.try_set(&key, value, ttl_secs).await.map(|()| true),
            Err(e) => Err(e),
        };
        fallback("keyspace_set", &key, result, false)
    }

    pub async fn get(&self, id: &str) -> Option<T> {
        let key = self.key(id);
        let result = match self.checked_key(id) {
            Ok(key) => self.cache.try_get(&key).await,
            Err(e) => Err(e),
        };
        fallback("keyspace_get", &key, result, None)
    }

    pub async fn del(&self, id: &str) -> bool {
        let key = self.key(id);
        let result = match self.checked_key(id) {
            Ok(key) => self.cache.try_del(&key).await.map(|()| true),
            Err(e) => Err(e),
        };
        fallback("keyspace_del", &key, result, false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn disabled_cache() -> Cache {
        Cache::new(Arc::new(StoreConnection::disabled()))
    }

    #[test]
    fn test_reserved_prefixes_rejected() {
        assert!(matches!(
            check_caller_key("session:abc"),
            Err(StateError::ReservedKey(_))
        ));
        assert!(matches!(
            check_caller_key("blacklist:tok"),
            Err(StateError::ReservedKey(_))
        ));
        assert!(check_caller_key("card:123").is_ok());
        assert!(check_caller_key("my-session:abc").is_ok());
    }

    #[test]
    fn test_zero_ttl_rejected() {
        assert!(check_ttl(Some(0)).is_err());
        assert!(check_ttl(Some(1)).is_ok());
        assert!(check_ttl(None).is_ok());
    }

    #[test]
    fn test_keyspace_key_format() {
        let cache = disabled_cache();
        let cards = cache.keyspace::<u64>("card:");
        assert_eq!(cards.prefix(), "card:");
        assert_eq!(cards.key("42"), "card:42");
        assert!(cards.checked_key("42").is_ok());

        let sneaky = cache.keyspace::<u64>("session:");
        assert!(matches!(
            sneaky.checked_key("x"),
            Err(StateError::ReservedKey(_))
        ));

        let owned = cache.reserved_keyspace::<u64>(SESSION_PREFIX);
        assert_eq!(owned.checked_key("x").unwrap(), "session:x");
    }

    #[tokio::test]
    async fn test_disabled_cache_is_cold() {
        let cache = disabled_cache();
        assert!(!cache.set("k", &"v", Some(60)).await);
        assert!(!cache.set("k", &"v", None).await);
        assert_eq!(cache.get::<String>("k").await, None);
        assert!(!cache.del("k").await);

        let ks = cache.keyspace::<String>("card:");
        assert!(!ks.set("1", &"v".to_string(), None).await);
        assert_eq!(ks.get("1").await, None);
        assert!(!ks.del("1").await);
    }
}
