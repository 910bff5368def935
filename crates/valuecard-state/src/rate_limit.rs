//! Sliding-window rate limiting.
//!
//! Each key owns a sorted set of event timestamps (milliseconds). A check
//! runs as one MULTI/EXEC block so concurrent callers on the same key cannot
//! interleave:
//!
//! ```text
//! ZREMRANGEBYSCORE key -inf (now-window   drop events older than the window
//! ZCARD key                               count before this request
//! ZADD key now "now-<random>"             record this attempt, allowed or not
//! EXPIRE key window                       reclaim abandoned keys
//! ```
//!
//! Attempts are counted, not just admitted requests. If the store is
//! unavailable the check fails open.

use std::sync::Arc;

use serde::Serialize;

use crate::cache::check_caller_key;
use crate::connection::StoreConnection;
use crate::error::{StateError, StateResult, fallback};
use crate::telemetry;

/// Outcome of a rate-limit check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RateLimitDecision {
    pub allowed: bool,
    pub remaining: u32,
}

impl RateLimitDecision {
    /// Decision given the number of events already inside the window.
    pub fn from_count(count: u64, limit: u32) -> Self {
        let limit = u64::from(limit);
        let remaining = limit.saturating_sub(count).saturating_sub(1);
        Self {
            allowed: count < limit,
            remaining: u32::try_from(remaining).unwrap_or(u32::MAX),
        }
    }

    /// The fail-open answer: admit and report the full budget.
    pub fn fail_open(limit: u32) -> Self {
        Self {
            allowed: true,
            remaining: limit,
        }
    }
}

#[derive(Clone)]
pub struct RateLimiter {
    connection: Arc<StoreConnection>,
}

impl RateLimiter {
    pub fn new(connection: Arc<StoreConnection>) -> Self {
        Self { connection }
    }

    /// Record an attempt against `key` and decide whether it fits within
    /// `limit` events per `window_secs`.
    pub async fn check_rate_limit(&self, key: &str, limit: u32, window_secs: u64) -> RateLimitDecision {
        let result = self.try_check(key, limit, window_secs).await;
        let decision = fallback("rate_limit", key, result, RateLimitDecision::fail_open(limit));
        telemetry::record_rate_limit(decision.allowed);
        if !decision.allowed {
            tracing::debug!(key = %key, limit, window_secs, "rate limit exceeded");
        }
        decision
    }

    async fn try_check(&self, key: &str, limit: u32, window_secs: u64) -> StateResult<RateLimitDecision> {
        check_caller_key(key)?;
        if limit == 0 {
            return Err(StateError::InvalidArgument("limit must be > 0".into()));
        }
        if window_secs == 0 {
            return Err(StateError::InvalidArgument("window must be > 0 seconds".into()));
        }
        let window_ttl = i64::try_from(window_secs)
            .map_err(|_| StateError::InvalidArgument("window too large".into()))?;

        let handle = self.connection.handle()?;

        let now_ms = now_millis();
        let window_start = now_ms.saturating_sub(window_ttl.saturating_mul(1000));
        let member = format!("{now_ms}-{:08x}", rand::random::<u32>());

        let mut pipe = redis::pipe();
        pipe.atomic()
            .zrembyscore(key, "-inf", format!("({window_start}"))
            .ignore()
            .zcard(key)
            .zadd(key, member, now_ms)
            .ignore()
            .expire(key, window_ttl)
            .ignore();

        let (count,): (u64,) = handle.query_pipeline(&pipe).await?;
        Ok(RateLimitDecision::from_count(count, limit))
    }
}

fn now_millis() -> i64 {
    (time::OffsetDateTime::now_utc().unix_timestamp_nanos() / 1_000_000) as i64
}
