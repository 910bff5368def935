mod cli;
mod commands;
mod output;

use anyhow::{Result, anyhow};
use clap::Parser;
use valuecard_state::config::loader;
use valuecard_state::{StateLayer, apply_logging_level, init_tracing_with_level};

use cli::{Cli, Commands};
use output::print_error;

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    if let Err(e) = run().await {
        print_error(&format!("{e:#}"));
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    let cli = Cli::parse();
    init_tracing_with_level(cli.log_level.as_deref().unwrap_or("warn"));

    let mut config = loader::load_config(cli.config.as_deref()).map_err(|e| anyhow!(e))?;
    if cli.log_level.is_none() && std::env::var_os("RUST_LOG").is_none() {
        apply_logging_level(&config.logging.level);
    }
    if let Some(url) = &cli.url {
        config.store.url = Some(url.clone());
    }
    config.store.validate().map_err(|e| anyhow!(e))?;

    let layer = StateLayer::initialize(config.store).await;

    let result = match &cli.command {
        Commands::Health => commands::store::health(&layer).await,
        Commands::Get(args) => commands::store::get(&layer, &args.key).await,
        Commands::Set(args) => commands::store::set(&layer, &args.key, &args.value, args.ttl).await,
        Commands::Del(args) => commands::store::del(&layer, &args.key).await,
        Commands::RateCheck(args) => {
            commands::limits::rate_check(&layer, &args.key, args.limit, args.window).await
        }
        Commands::Metric(args) => commands::limits::metric(&layer, &args.command).await,
        Commands::Revoke(args) => commands::tokens::revoke(&layer, &args.token, args.ttl).await,
        Commands::Revoked(args) => commands::tokens::revoked(&layer, &args.token).await,
    };

    layer.close().await;
    result
}
