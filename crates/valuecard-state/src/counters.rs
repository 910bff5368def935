//! Named integer counters kept in the store.
//!
//! Counters are shared across every process using the same store and have no
//! TTL. Failures read as zero.

use std::sync::Arc;

use crate::cache::check_caller_key;
use crate::connection::StoreConnection;
use crate::error::{StateResult, fallback};

#[derive(Clone)]
pub struct MetricsCounter {
    connection: Arc<StoreConnection>,
}

impl MetricsCounter {
    pub fn new(connection: Arc<StoreConnection>) -> Self {
        Self { connection }
    }

    /// Add one to `name`.
    pub async fn increment(&self, name: &str) -> i64 {
        self.increment_metric(name, 1).await
    }

    /// Atomically add `amount` to `name`, returning the new value or 0 on failure.
    pub async fn increment_metric(&self, name: &str, amount: i64) -> i64 {
        let result = self.try_increment(name, amount).await;
        fallback("metric_increment", name, result, 0)
    }

    /// Current value of `name`, or 0 when unset or unreadable.
    pub async fn get_metric(&self, name: &str) -> i64 {
        let result = self.try_get(name).await;
        fallback("metric_get", name, result, 0)
    }

    async fn try_increment(&self, name: &str, amount: i64) -> StateResult<i64> {
        check_caller_key(name)?;
        let handle = self.connection.handle()?;
        let value = handle.query(&redis::Cmd::incr(name, amount)).await?;
        Ok(value)
    }

    async fn try_get(&self, name: &str) -> StateResult<i64> {
        check_caller_key(name)?;
        let handle = self.connection.handle()?;
        let raw: Option<String> = handle.query(&redis::Cmd::get(name)).await?;
        Ok(parse_counter(raw.as_deref()))
    }
}

fn parse_counter(raw: Option<&str>) -> i64 {
    match raw {
        Some(value) => value.trim().parse().unwrap_or_else(|_| {
            tracing::warn!(value = %value, "metric value is not an integer, reading as 0");
            0
        }),
        None => 0,
    }
}
