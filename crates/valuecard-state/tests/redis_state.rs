//! Integration tests for the state layer against a real Redis.
//!
//! Tests use testcontainers to spin up a single Redis instance shared by the
//! whole test binary. Each test uses its own key names.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use testcontainers::{ContainerAsync, runners::AsyncRunner};
use testcontainers_modules::redis::Redis;
use tokio::sync::OnceCell;
use tokio::task::JoinSet;
use valuecard_state::{
    ConnectionState, HealthStatus, RateLimitDecision, StateLayer, StoreConfig,
};

// Shared Redis container for all tests
static SHARED_REDIS: OnceCell<(ContainerAsync<Redis>, String)> = OnceCell::const_new();

/// Get or create the shared Redis container
async fn get_redis_url() -> String {
    let (_, url) = SHARED_REDIS
        .get_or_init(|| async {
            let container = Redis::default()
                .start()
                .await
                .expect("start redis container");

            let host_port = container.get_host_port_ipv4(6379).await.expect("get port");
            let url = format!("redis://127.0.0.1:{}", host_port);

            (container, url)
        })
        .await;

    url.clone()
}

async fn connected_layer() -> StateLayer {
    let layer = StateLayer::initialize(StoreConfig::with_url(get_redis_url().await)).await;
    assert!(layer.is_connected(), "expected a live Redis connection");
    layer
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct CardBalance {
    card_id: String,
    balance_cents: i64,
    currency: String,
}

#[tokio::test]
async fn test_connection_lifecycle() {
    let layer = connected_layer().await;
    let connection = layer.connection();

    assert_eq!(connection.state(), ConnectionState::Connected);
    assert!(connection.get_instance().is_some());

    // Initializing again reuses the live handle
    assert!(connection.initialize().await.is_some());
    assert!(connection.is_connected());

    connection.close().await;
    assert_eq!(connection.state(), ConnectionState::Closed);
    assert!(connection.get_instance().is_none());
    assert!(!connection.is_connected());

    // Facades fall back once closed
    assert!(!layer.cache.set("lifecycle:k", &1, Some(60)).await);
    assert_eq!(
        layer.health.health_check().await.status,
        HealthStatus::Disconnected
    );
}

#[tokio::test]
async fn test_cache_round_trip() {
    let layer = connected_layer().await;
    let value = CardBalance {
        card_id: "card-001".into(),
        balance_cents: 2_500,
        currency: "EUR".into(),
    };

    assert!(layer.cache.set("balance:card-001", &value, Some(60)).await);
    assert_eq!(
        layer.cache.get::<CardBalance>("balance:card-001").await,
        Some(value.clone())
    );

    // No TTL
    assert!(layer.cache.set("balance:card-001:persistent", &value, None).await);
    assert_eq!(
        layer.cache.get::<CardBalance>("balance:card-001:persistent").await,
        Some(value)
    );

    assert!(layer.cache.del("balance:card-001").await);
    assert_eq!(layer.cache.get::<CardBalance>("balance:card-001").await, None);

    // Deleting a missing key is still a successful command
    assert!(layer.cache.del("balance:card-001").await);
}

#[tokio::test]
async fn test_cache_expiry() {
    let layer = connected_layer().await;

    assert!(layer.cache.set("expiring:k", &"value", Some(1)).await);
    assert_eq!(
        layer.cache.get::<String>("expiring:k").await.as_deref(),
        Some("value")
    );

    tokio::time::sleep(Duration::from_millis(1_500)).await;

    assert_eq!(layer.cache.get::<String>("expiring:k").await, None);
}

#[tokio::test]
async fn test_cache_decode_failure_reads_as_miss() {
    let layer = connected_layer().await;

    assert!(layer.cache.set("decode:k", &"not a number", Some(60)).await);
    assert_eq!(layer.cache.get::<u64>("decode:k").await, None);
}

#[tokio::test]
async fn test_cache_rejects_reserved_keys() {
    let layer = connected_layer().await;

    assert!(!layer.cache.set("session:forged", &"x", Some(60)).await);
    assert!(!layer.cache.set("blacklist:forged", &true, Some(60)).await);
    assert!(!layer.revocation.is_token_blacklisted("forged").await);
}

#[tokio::test]
async fn test_keyspace_round_trip() {
    let layer = connected_layer().await;
    let balances = layer.cache.keyspace::<CardBalance>("ks-balance:");
    let value = CardBalance {
        card_id: "card-002".into(),
        balance_cents: 100,
        currency: "USD".into(),
    };

    assert!(balances.set("card-002", &value, Some(60)).await);
    assert_eq!(balances.get("card-002").await, Some(value.clone()));
    assert_eq!(
        layer.cache.get::<CardBalance>("ks-balance:card-002").await,
        Some(value)
    );
    assert!(balances.del("card-002").await);
    assert_eq!(balances.get("card-002").await, None);
}

#[tokio::test]
async fn test_rate_limit_exactness() {
    let layer = connected_layer().await;

    let mut decisions = Vec::new();
    for _ in 0..6 {
        decisions.push(layer.rate_limiter.check_rate_limit("ip:1.2.3.4", 5, 10).await);
    }

    let allowed: Vec<bool> = decisions.iter().map(|d| d.allowed).collect();
    let remaining: Vec<u32> = decisions.iter().map(|d| d.remaining).collect();
    assert_eq!(allowed, vec![true, true, true, true, true, false]);
    assert_eq!(remaining, vec![4, 3, 2, 1, 0, 0]);

    // Attempts keep counting while limited
    let decision = layer.rate_limiter.check_rate_limit("ip:1.2.3.4", 5, 10).await;
    assert_eq!(
        decision,
        RateLimitDecision {
            allowed: false,
            remaining: 0
        }
    );
}

#[tokio::test]
async fn test_rate_limit_window_reset() {
    let layer = connected_layer().await;
    let key = "ip:10.0.0.7";

    for _ in 0..6 {
        layer.rate_limiter.check_rate_limit(key, 5, 2).await;
    }
    assert!(!layer.rate_limiter.check_rate_limit(key, 5, 2).await.allowed);

    tokio::time::sleep(Duration::from_millis(2_300)).await;

    let decision = layer.rate_limiter.check_rate_limit(key, 5, 2).await;
    assert!(decision.allowed);
    assert_eq!(decision.remaining, 4);
}

#[tokio::test]
async fn test_rate_limit_key_expires_with_window() {
    let layer = connected_layer().await;
    let key = "ip:10.0.0.8";

    layer.rate_limiter.check_rate_limit(key, 5, 30).await;

    let handle = layer.connection().get_instance().expect("handle");
    let ttl: i64 = handle.query(&redis::Cmd::ttl(key)).await.expect("ttl");
    assert!(ttl > 0 && ttl <= 30, "unexpected ttl {ttl}");
}

#[tokio::test]
async fn test_rate_limit_concurrent_callers() {
    let layer = connected_layer().await;
    let key = "ip:concurrent";

    let mut tasks = JoinSet::new();
    for _ in 0..20 {
        let layer = layer.clone();
        tasks.spawn(async move { layer.rate_limiter.check_rate_limit(key, 5, 10).await });
    }

    let mut allowed = 0;
    while let Some(decision) = tasks.join_next().await {
        if decision.expect("task panicked").allowed {
            allowed += 1;
        }
    }
    assert_eq!(allowed, 5);
}

#[tokio::test]
async fn test_session_store() {
    let layer = connected_layer().await;
    let sessions = layer.sessions::<CardBalance>();
    let data = CardBalance {
        card_id: "card-003".into(),
        balance_cents: 7_000,
        currency: "GBP".into(),
    };

    assert!(sessions.set_session_default("sess-1", &data).await);
    assert_eq!(sessions.get_session("sess-1").await, Some(data.clone()));

    let handle = layer.connection().get_instance().expect("handle");
    let ttl: i64 = handle.query(&redis::Cmd::ttl("session:sess-1")).await.expect("ttl");
    assert!(ttl > 3_500 && ttl <= 3_600, "unexpected ttl {ttl}");

    assert!(sessions.touch_session("sess-1", 120).await);
    let ttl: i64 = handle.query(&redis::Cmd::ttl("session:sess-1")).await.expect("ttl");
    assert!(ttl > 0 && ttl <= 120, "unexpected ttl {ttl}");

    assert!(sessions.delete_session("sess-1").await);
    assert_eq!(sessions.get_session("sess-1").await, None);
    assert!(!sessions.touch_session("sess-1", 120).await);
}

#[tokio::test]
async fn test_token_blacklist() {
    let layer = connected_layer().await;

    assert!(layer.revocation.blacklist_token("t1", 60).await);
    assert!(layer.revocation.is_token_blacklisted("t1").await);
    assert!(!layer.revocation.is_token_blacklisted("unknown-token").await);

    let expires_at = time::OffsetDateTime::now_utc() + time::Duration::minutes(5);
    assert!(layer.revocation.blacklist_until("t2", expires_at).await);
    assert!(layer.revocation.is_token_blacklisted("t2").await);
}

#[tokio::test]
async fn test_blacklist_requires_exact_true_marker() {
    let layer = connected_layer().await;
    let handle = layer.connection().get_instance().expect("handle");

    let _: () = handle
        .query(&redis::Cmd::set_ex("blacklist:t3", "\"true\"", 60))
        .await
        .expect("set");
    assert!(!layer.revocation.is_token_blacklisted("t3").await);

    let _: () = handle
        .query(&redis::Cmd::set_ex("blacklist:t4", "1", 60))
        .await
        .expect("set");
    assert!(!layer.revocation.is_token_blacklisted("t4").await);
}

#[tokio::test]
async fn test_metrics_monotonic() {
    let layer = connected_layer().await;

    for i in 1..=10 {
        assert_eq!(layer.counters.increment("m1").await, i);
    }
    assert_eq!(layer.counters.get_metric("m1").await, 10);

    assert_eq!(layer.counters.increment_metric("m1", 5).await, 15);
    assert_eq!(layer.counters.get_metric("never-incremented").await, 0);
}

#[tokio::test]
async fn test_health_check_connected() {
    let layer = connected_layer().await;

    let report = layer.health.health_check().await;
    assert_eq!(report.status, HealthStatus::Connected);
    assert!(report.latency_ms.is_some());
    assert!(report.error.is_none());
}
