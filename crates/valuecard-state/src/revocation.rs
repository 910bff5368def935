//! Bearer-token revocation list stored under the `blacklist:` namespace.
//!
//! The layer never inspects token contents. Callers pass a TTL matching the
//! token's remaining lifetime so the entry outlives the token it guards
//! against, but not by much.

use serde_json::Value;
use time::OffsetDateTime;

use crate::cache::{BLACKLIST_PREFIX, Cache, KeySpace};

#[derive(Clone)]
pub struct TokenRevocationList {
    revoked: KeySpace<Value>,
}

impl TokenRevocationList {
    pub fn new(cache: &Cache) -> Self {
        Self {
            revoked: cache.reserved_keyspace(BLACKLIST_PREFIX),
        }
    }

    /// Revoke `token` for `ttl_secs` seconds.
    pub async fn blacklist_token(&self, token: &str, ttl_secs: u64) -> bool {
        self.revoked.set(token, &Value::Bool(true), Some(ttl_secs)).await
    }

    /// Revoke `token` until its own expiry.
    ///
    /// A token that has already expired needs no entry; this returns `true`
    /// without touching the store. Sub-second remainders round up.
    pub async fn blacklist_until(&self, token: &str, expires_at: OffsetDateTime) -> bool {
        match remaining_ttl_secs(expires_at, OffsetDateTime::now_utc()) {
            Some(ttl) => self.blacklist_token(token, ttl).await,
            None => {
                tracing::debug!("token already expired, skipping revocation entry");
                true
            }
        }
    }

    /// `true` only when the stored marker is exactly JSON `true`.
    pub async fn is_token_blacklisted(&self, token: &str) -> bool {
        matches!(self.revoked.get(token).await, Some(Value::Bool(true)))
    }
}

fn remaining_ttl_secs(expires_at: OffsetDateTime, now: OffsetDateTime) -> Option<u64> {
    let remaining = expires_at - now;
    if !remaining.is_positive() {
        return None;
    }
    let mut secs = remaining.whole_seconds();
    if remaining.subsec_nanoseconds() > 0 {
        secs += 1;
    }
    u64::try_from(secs).ok().filter(|s| *s > 0)
}
