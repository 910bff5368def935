//! Fallback behaviour without a usable store. No Docker required.

use std::time::{Duration, Instant};

use valuecard_state::{
    ConnectionState, HealthStatus, RateLimitDecision, StateLayer, StoreConfig,
};

async fn assert_fully_degraded(layer: &StateLayer) {
    for limit in [1, 5, 100] {
        assert_eq!(
            layer.rate_limiter.check_rate_limit("ip:1.2.3.4", limit, 10).await,
            RateLimitDecision::fail_open(limit)
        );
    }

    assert_eq!(layer.cache.get::<String>("k").await, None);
    assert!(!layer.cache.set("k", &"v", Some(60)).await);
    assert!(!layer.cache.set("k", &"v", None).await);
    assert!(!layer.cache.del("k").await);

    let sessions = layer.sessions::<serde_json::Value>();
    assert!(!sessions.set_session("s1", &serde_json::json!({"user": "u1"}), 60).await);
    assert_eq!(sessions.get_session("s1").await, None);
    assert!(!sessions.delete_session("s1").await);

    assert!(!layer.revocation.blacklist_token("t1", 60).await);
    assert!(!layer.revocation.is_token_blacklisted("t1").await);

    assert_eq!(layer.counters.increment("m1").await, 0);
    assert_eq!(layer.counters.get_metric("m1").await, 0);

    let report = layer.health.health_check().await;
    assert_eq!(report.status, HealthStatus::Disconnected);
    assert!(report.latency_ms.is_none());
}

#[tokio::test]
async fn test_no_store_configured() {
    let layer = StateLayer::initialize(StoreConfig::default()).await;

    assert!(!layer.is_connected());
    assert!(layer.connection().get_instance().is_none());
    assert_eq!(layer.connection().state(), ConnectionState::Uninitialized);

    assert_fully_degraded(&layer).await;
}

#[tokio::test]
async fn test_unreachable_store() {
    let config = StoreConfig {
        connect_timeout_ms: 1_000,
        command_timeout_ms: 500,
        max_retries_per_request: 0,
        ..StoreConfig::with_url("redis://127.0.0.1:1")
    };

    let started = Instant::now();
    let layer = StateLayer::initialize(config).await;
    assert!(started.elapsed() < Duration::from_secs(5));

    assert!(!layer.is_connected());
    assert_eq!(layer.connection().state(), ConnectionState::Error);

    assert_fully_degraded(&layer).await;
}

#[tokio::test]
async fn test_invalid_url_runs_disabled() {
    let layer = StateLayer::initialize(StoreConfig::with_url("definitely not a url")).await;

    assert!(!layer.is_connected());
    assert_fully_degraded(&layer).await;
}
