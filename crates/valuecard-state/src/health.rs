//! Store health probe.

use std::sync::Arc;

use serde::Serialize;

use crate::connection::StoreConnection;
use crate::telemetry;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Disconnected,
    Connected,
    Error,
}

impl std::fmt::Display for HealthStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            HealthStatus::Disconnected => write!(f, "disconnected"),
            HealthStatus::Connected => write!(f, "connected"),
            HealthStatus::Error => write!(f, "error"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthReport {
    pub status: HealthStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub latency_ms: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl HealthReport {
    pub fn disconnected() -> Self {
        Self {
            status: HealthStatus::Disconnected,
            latency_ms: None,
            error: None,
        }
    }

    pub fn is_healthy(&self) -> bool {
        self.status == HealthStatus::Connected
    }
}

#[derive(Clone)]
pub struct HealthProbe {
    connection: Arc<StoreConnection>,
}

impl HealthProbe {
    pub fn new(connection: Arc<StoreConnection>) -> Self {
        Self { connection }
    }

    /// PING the store and report the round-trip.
    pub async fn health_check(&self) -> HealthReport {
        let Some(handle) = self.connection.get_instance() else {
            return HealthReport::disconnected();
        };

        match handle.ping().await {
            Ok(latency) => {
                telemetry::record_health_latency(latency);
                HealthReport {
                    status: HealthStatus::Connected,
                    latency_ms: Some(u64::try_from(latency.as_millis()).unwrap_or(u64::MAX)),
                    error: None,
                }
            }
            Err(e) => {
                tracing::warn!(error = %e, "State store health check failed");
                HealthReport {
                    status: HealthStatus::Error,
                    latency_ms: None,
                    error: Some(e.to_string()),
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_disabled_reports_disconnected() {
        let probe = HealthProbe::new(Arc::new(StoreConnection::disabled()));
        let report = probe.health_check().await;
        assert_eq!(report, HealthReport::disconnected());
        assert!(!report.is_healthy());
    }

    #[test]
    fn test_report_serialization_omits_empty_fields() {
        let json = serde_json::to_value(HealthReport::disconnected()).unwrap();
        assert_eq!(json, serde_json::json!({ "status": "disconnected" }));

        let json = serde_json::to_value(HealthReport {
            status: HealthStatus::Connected,
            latency_ms: Some(3),
            error: None,
        })
        .unwrap();
        assert_eq!(json, serde_json::json!({ "status": "connected", "latencyMs": 3 }));
    }
}
