use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "valuecard")]
#[command(about = "valuecard state CLI — inspect and operate the shared state store")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Path to a TOML config file (defaults to ./valuecard.toml if present)
    #[arg(short, long, global = true, env = "VALUECARD_CONFIG")]
    pub config: Option<String>,

    /// Store URL (overrides the config file and VALUECARD__STORE__URL)
    #[arg(short, long, global = true, env = "VALUECARD_REDIS_URL")]
    pub url: Option<String>,

    /// Log level (overrides logging.level from the config)
    #[arg(long, global = true)]
    pub log_level: Option<String>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Check store connectivity and latency
    Health,
    /// Read a cached JSON value
    Get(KeyArgs),
    /// Write a JSON value
    Set(SetArgs),
    /// Delete a cached value
    Del(KeyArgs),
    /// Record an attempt against a sliding-window rate limit
    RateCheck(RateCheckArgs),
    /// Work with store-backed counters
    Metric(MetricArgs),
    /// Revoke a bearer token
    Revoke(RevokeArgs),
    /// Check whether a bearer token is revoked
    Revoked(TokenArgs),
}

#[derive(clap::Args)]
pub struct KeyArgs {
    /// Cache key
    pub key: String,
}

#[derive(clap::Args)]
pub struct SetArgs {
    /// Cache key
    pub key: String,
    /// JSON value (plain strings are stored as JSON strings)
    pub value: String,
    /// Time-to-live in seconds
    #[arg(long)]
    pub ttl: Option<u64>,
}

#[derive(clap::Args)]
pub struct RateCheckArgs {
    /// Rate-limit key (e.g. ip:1.2.3.4)
    pub key: String,
    /// Maximum attempts per window
    #[arg(long, default_value_t = 60)]
    pub limit: u32,
    /// Window length in seconds
    #[arg(long, default_value_t = 60)]
    pub window: u64,
}

#[derive(clap::Args)]
pub struct MetricArgs {
    #[command(subcommand)]
    pub command: MetricCommands,
}

#[derive(Subcommand)]
pub enum MetricCommands {
    /// Increment a counter
    Incr {
        name: String,
        /// Amount to add
        #[arg(long, default_value_t = 1)]
        by: i64,
    },
    /// Read a counter
    Get { name: String },
}

#[derive(clap::Args)]
pub struct RevokeArgs {
    /// Bearer token
    pub token: String,
    /// Seconds until the token itself expires
    #[arg(long)]
    pub ttl: u64,
}

#[derive(clap::Args)]
pub struct TokenArgs {
    /// Bearer token
    pub token: String,
}
