//! Distributed state layer for the valuecard services.
//!
//! ## Architecture
//!
//! ```text
//!                 StateLayer
//!   ┌──────────┬──────┴─────┬──────────────┬──────────────┐
//! Cache   RateLimiter  SessionStore  TokenRevocationList  MetricsCounter / HealthProbe
//!   │          │            │              │              │
//!   └──────────┴─── Arc<StoreConnection> ──┴──────────────┘
//!                           │
//!                     Redis (optional)
//! ```
//!
//! ## Graceful Degradation
//!
//! Without a configured store, or while it is unreachable, nothing here
//! returns an error: reads come back empty, writes report `false`, counters
//! read zero and rate limiting fails open.

pub mod cache;
pub mod config;
pub mod connection;
pub mod counters;
pub mod error;
pub mod health;
pub mod observability;
pub mod rate_limit;
pub mod revocation;
pub mod session;
pub mod telemetry;

use std::sync::Arc;

use serde::Serialize;
use serde::de::DeserializeOwned;

pub use cache::{BLACKLIST_PREFIX, Cache, KeySpace, RESERVED_PREFIXES, SESSION_PREFIX};
pub use config::{AppConfig, LoggingConfig, StoreConfig};
pub use connection::{ConnectionState, StoreConnection, StoreHandle};
pub use counters::MetricsCounter;
pub use error::{StateError, StateResult};
pub use health::{HealthProbe, HealthReport, HealthStatus};
pub use observability::{apply_logging_level, init_tracing, init_tracing_with_level};
pub use rate_limit::{RateLimitDecision, RateLimiter};
pub use revocation::TokenRevocationList;
pub use session::{DEFAULT_SESSION_TTL_SECS, SessionStore};

/// Every facade wired to one shared connection.
#[derive(Clone)]
pub struct StateLayer {
    connection: Arc<StoreConnection>,
    pub cache: Cache,
    pub rate_limiter: RateLimiter,
    pub revocation: TokenRevocationList,
    pub counters: MetricsCounter,
    pub health: HealthProbe,
}

impl StateLayer {
    /// Build the facades around `connection` without connecting.
    pub fn new(connection: Arc<StoreConnection>) -> Self {
        let cache = Cache::new(Arc::clone(&connection));
        Self {
            rate_limiter: RateLimiter::new(Arc::clone(&connection)),
            revocation: TokenRevocationList::new(&cache),
            counters: MetricsCounter::new(Arc::clone(&connection)),
            health: HealthProbe::new(Arc::clone(&connection)),
            cache,
            connection,
        }
    }

    /// Connect according to `config` and build the facades.
    ///
    /// Always succeeds: a missing or unreachable store leaves the layer in
    /// disabled mode.
    pub async fn initialize(config: StoreConfig) -> Self {
        let connection = Arc::new(StoreConnection::new(config));
        connection.initialize().await;
        Self::new(connection)
    }

    /// A layer that never touches a store.
    pub fn disabled() -> Self {
        Self::new(Arc::new(StoreConnection::disabled()))
    }

    pub fn connection(&self) -> &Arc<StoreConnection> {
        &self.connection
    }

    /// Session store for payload type `T`.
    pub fn sessions<T: Serialize + DeserializeOwned>(&self) -> SessionStore<T> {
        SessionStore::new(&self.cache)
    }

    pub fn is_connected(&self) -> bool {
        self.connection.is_connected()
    }

    pub async fn close(&self) {
        self.connection.close().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_disabled_layer_falls_back_everywhere() {
        let layer = StateLayer::initialize(StoreConfig::default()).await;
        assert!(!layer.is_connected());

        let decision = layer.rate_limiter.check_rate_limit("ip:1.2.3.4", 5, 10).await;
        assert_eq!(decision, RateLimitDecision::fail_open(5));
        assert_eq!(layer.cache.get::<String>("k").await, None);
        assert!(!layer.cache.set("k", &1, Some(10)).await);
        assert!(!layer.cache.del("k").await);
        assert_eq!(layer.health.health_check().await.status, HealthStatus::Disconnected);
        assert!(!layer.revocation.is_token_blacklisted("t1").await);
        assert_eq!(layer.counters.get_metric("m1").await, 0);
        assert_eq!(layer.sessions::<String>().get_session("s").await, None);

        layer.close().await;
        assert_eq!(layer.connection().state(), ConnectionState::Closed);
    }
}
