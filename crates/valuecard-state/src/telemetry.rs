//! In-process instrumentation of the state layer.
//!
//! Recorded through the `metrics` facade; without an installed recorder
//! every call here is a no-op. These are process-local and unrelated to the
//! store-backed counters in [`crate::counters`].

use std::time::Duration;

use metrics::{counter, gauge, histogram};

/// Metric names as constants for consistency.
pub mod names {
    pub const CACHE_HITS_TOTAL: &str = "state_cache_hits_total";
    pub const CACHE_MISSES_TOTAL: &str = "state_cache_misses_total";
    pub const FALLBACKS_TOTAL: &str = "state_fallbacks_total";
    pub const RATE_LIMIT_CHECKS_TOTAL: &str = "state_rate_limit_checks_total";
    pub const STORE_CONNECTED: &str = "state_store_connected";
    pub const HEALTH_LATENCY_SECONDS: &str = "state_health_latency_seconds";
}

/// Record a cache hit.
pub fn record_cache_hit() {
    counter!(names::CACHE_HITS_TOTAL).increment(1);
}

/// Record a cache miss.
pub fn record_cache_miss() {
    counter!(names::CACHE_MISSES_TOTAL).increment(1);
}

/// Record an operation that returned its fallback value.
pub fn record_fallback(operation: &'static str, reason: &'static str) {
    counter!(
        names::FALLBACKS_TOTAL,
        "operation" => operation,
        "reason" => reason
    )
    .increment(1);
}

/// Record the outcome of a rate-limit check.
pub fn record_rate_limit(allowed: bool) {
    let outcome = if allowed { "allowed" } else { "limited" };
    counter!(names::RATE_LIMIT_CHECKS_TOTAL, "outcome" => outcome).increment(1);
}

/// Publish the current connectivity of the store handle.
pub fn set_store_connected(connected: bool) {
    gauge!(names::STORE_CONNECTED).set(if connected { 1.0 } else { 0.0 });
}

/// Record a health probe round-trip.
pub fn record_health_latency(latency: Duration) {
    histogram!(names::HEALTH_LATENCY_SECONDS).record(latency.as_secs_f64());
}
