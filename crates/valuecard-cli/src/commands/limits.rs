use anyhow::{Result, bail};
use colored::Colorize;
use valuecard_state::StateLayer;

use crate::cli::MetricCommands;
use crate::output::{print_failure, print_success};

pub async fn rate_check(layer: &StateLayer, key: &str, limit: u32, window: u64) -> Result<()> {
    if !layer.is_connected() {
        tracing::warn!("store unavailable, rate limiter is failing open");
    }
    let decision = layer.rate_limiter.check_rate_limit(key, limit, window).await;
    let summary = format!(
        "{} ({} remaining of {limit} per {window}s)",
        key.cyan(),
        decision.remaining
    );
    if decision.allowed {
        print_success(&format!("allowed {summary}"));
    } else {
        print_failure(&format!("limited {summary}"));
    }
    Ok(())
}

pub async fn metric(layer: &StateLayer, command: &MetricCommands) -> Result<()> {
    match command {
        MetricCommands::Incr { name, by } => {
            if !layer.is_connected() {
                bail!("store unavailable, counter {name} not incremented");
            }
            let value = layer.counters.increment_metric(name, *by).await;
            println!("{}: {}", name.cyan(), value);
        }
        MetricCommands::Get { name } => {
            let value = layer.counters.get_metric(name).await;
            println!("{}: {}", name.cyan(), value);
        }
    }
    Ok(())
}
