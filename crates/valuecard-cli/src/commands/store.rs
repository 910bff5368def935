use anyhow::{Result, bail};
use colored::Colorize;
use serde_json::Value;
use valuecard_state::{HealthStatus, StateLayer};

use crate::output::{parse_json_arg, print_success, print_value};

pub async fn health(layer: &StateLayer) -> Result<()> {
    let report = layer.health.health_check().await;
    match report.status {
        HealthStatus::Connected => {
            println!(
                "{} store is {} ({} ms)",
                "✓".green(),
                "connected".green(),
                report.latency_ms.unwrap_or_default()
            );
            Ok(())
        }
        HealthStatus::Disconnected => {
            bail!("store is disconnected (no URL configured or connection failed)")
        }
        HealthStatus::Error => bail!(
            "store health check failed: {}",
            report.error.as_deref().unwrap_or("unknown error")
        ),
    }
}

pub async fn get(layer: &StateLayer, key: &str) -> Result<()> {
    match layer.cache.get::<Value>(key).await {
        Some(value) => {
            print_value(&value);
            Ok(())
        }
        None => bail!("{} not found", key.cyan()),
    }
}

pub async fn set(layer: &StateLayer, key: &str, raw: &str, ttl: Option<u64>) -> Result<()> {
    let value = parse_json_arg(raw);
    if !layer.cache.set(key, &value, ttl).await {
        bail!("failed to write {key}");
    }
    match ttl {
        Some(ttl) => print_success(&format!("Set {key} (ttl {ttl}s)")),
        None => print_success(&format!("Set {key}")),
    }
    Ok(())
}

pub async fn del(layer: &StateLayer, key: &str) -> Result<()> {
    if !layer.cache.del(key).await {
        bail!("failed to delete {key}");
    }
    print_success(&format!("Deleted {key}"));
    Ok(())
}
