use std::time::Duration;

use redis::{ConnectionAddr, ConnectionInfo, IntoConnectionInfo};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AppConfig {
    /// Backing store configuration
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl AppConfig {
    pub fn validate(&self) -> Result<(), String> {
        self.store.validate()?;
        if self.logging.level.trim().is_empty() {
            return Err("logging.level must not be empty".into());
        }
        Ok(())
    }
}

/// Connection settings for the backing key-value store.
///
/// Leaving `url` unset runs the layer in disabled mode: every operation
/// answers with its fallback value and nothing is ever dialed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Store connection URL (e.g., "redis://localhost:6379/0")
    #[serde(default)]
    pub url: Option<String>,

    /// Overrides the host part of `url`
    #[serde(default)]
    pub host: Option<String>,

    /// Overrides the port part of `url`
    #[serde(default)]
    pub port: Option<u16>,

    /// Overrides the password part of `url`
    #[serde(default)]
    pub password: Option<String>,

    /// Overrides the database index of `url`
    #[serde(default)]
    pub database: Option<u32>,

    /// Connection establishment timeout in milliseconds
    #[serde(default = "default_connect_timeout_ms")]
    pub connect_timeout_ms: u64,

    /// Per-command timeout in milliseconds
    #[serde(default = "default_command_timeout_ms")]
    pub command_timeout_ms: u64,

    /// Reconnect attempts the client makes before giving up on a request
    #[serde(default = "default_max_retries_per_request")]
    pub max_retries_per_request: usize,

    /// Interval between background liveness probes in milliseconds
    #[serde(default = "default_liveness_interval_ms")]
    pub liveness_interval_ms: u64,
}

fn default_connect_timeout_ms() -> u64 {
    10_000
}

fn default_command_timeout_ms() -> u64 {
    5_000
}

fn default_max_retries_per_request() -> usize {
    3
}

fn default_liveness_interval_ms() -> u64 {
    15_000
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            url: None,
            host: None,
            port: None,
            password: None,
            database: None,
            connect_timeout_ms: default_connect_timeout_ms(),
            command_timeout_ms: default_command_timeout_ms(),
            max_retries_per_request: default_max_retries_per_request(),
            liveness_interval_ms: default_liveness_interval_ms(),
        }
    }
}

impl StoreConfig {
    /// Configuration pointing at `url` with every other option defaulted.
    pub fn with_url(url: impl Into<String>) -> Self {
        Self {
            url: Some(url.into()),
            ..Self::default()
        }
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.connect_timeout_ms == 0 || self.command_timeout_ms == 0 {
            return Err("store timeouts must be > 0".into());
        }
        if self.liveness_interval_ms == 0 {
            return Err("store.liveness_interval_ms must be > 0".into());
        }
        if let Some(0) = self.port {
            return Err("store.port must be > 0".into());
        }
        self.connection_info().map(|_| ())
    }

    /// Whether a store address is configured at all.
    pub fn is_enabled(&self) -> bool {
        self.url.as_deref().is_some_and(|u| !u.trim().is_empty())
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    pub fn command_timeout(&self) -> Duration {
        Duration::from_millis(self.command_timeout_ms)
    }

    pub fn liveness_interval(&self) -> Duration {
        Duration::from_millis(self.liveness_interval_ms)
    }

    /// Resolve `url` plus the explicit overrides into client connection info.
    ///
    /// Returns `Ok(None)` in disabled mode.
    pub fn connection_info(&self) -> Result<Option<ConnectionInfo>, String> {
        let Some(url) = self.url.as_deref().filter(|u| !u.trim().is_empty()) else {
            return Ok(None);
        };

        let mut info = url
            .trim()
            .into_connection_info()
            .map_err(|e| format!("invalid store url: {e}"))?;

        if self.host.is_some() || self.port.is_some() {
            let (current_host, current_port) = match &info.addr {
                ConnectionAddr::Tcp(host, port) => (Some(host.clone()), Some(*port)),
                _ => (None, None),
            };
            let host = self
                .host
                .clone()
                .or(current_host)
                .unwrap_or_else(|| "127.0.0.1".to_string());
            let port = self.port.or(current_port).unwrap_or(6379);
            info.addr = ConnectionAddr::Tcp(host, port);
        }
        if let Some(password) = &self.password {
            info.redis.password = Some(password.clone());
        }
        if let Some(db) = self.database {
            info.redis.db = i64::from(db);
        }

        Ok(Some(info))
    }

    /// The configured URL with any password removed, for logging.
    pub fn redacted_url(&self) -> Option<String> {
        let raw = self.url.as_deref()?;
        match url::Url::parse(raw) {
            Ok(mut parsed) => {
                if parsed.password().is_some() {
                    let _ = parsed.set_password(Some("***"));
                }
                Some(parsed.to_string())
            }
            Err(_) => Some("<unparseable>".to_string()),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Default tracing filter when `RUST_LOG` is not set
    #[serde(default = "default_log_level")]
    pub level: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

pub mod loader {
    use super::AppConfig;
    use config::{Config, Environment, File};
    use std::path::{Path, PathBuf};

    pub fn load_config(path: Option<&str>) -> Result<AppConfig, String> {
        let mut builder = Config::builder();
        match path {
            Some(p) => {
                let pathbuf = PathBuf::from(p);
                if pathbuf.exists() {
                    builder = builder.add_source(File::from(pathbuf));
                } else {
                    return Err(format!("config file not found: {p}"));
                }
            }
            None => {
                let default_path = PathBuf::from("valuecard.toml");
                if default_path.exists() {
                    builder = builder.add_source(File::from(default_path));
                }
            }
        }
        // Environment variable overrides, e.g., VALUECARD__STORE__URL=redis://cache:6379
        builder = builder.add_source(
            Environment::with_prefix("VALUECARD")
                .try_parsing(true)
                .separator("__"),
        );
        let cfg = builder
            .build()
            .map_err(|e| format!("config build error: {e}"))?;
        let merged: AppConfig = cfg
            .try_deserialize()
            .map_err(|e| format!("config deserialize error: {e}"))?;
        merged.validate()?;
        Ok(merged)
    }

    pub fn load_config_with_default_path<P: AsRef<Path>>(
        path: Option<P>,
    ) -> Result<AppConfig, String> {
        let p = path
            .as_ref()
            .map(|p| p.as_ref().to_string_lossy().to_string());
        load_config(p.as_deref())
    }
}
