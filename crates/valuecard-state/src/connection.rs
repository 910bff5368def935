//! Lifecycle of the single store handle.
//!
//! ## State Machine
//!
//! ```text
//! Uninitialized → Connecting → Connected ⇄ Error → Reconnecting → Connected
//!                      ↓                                ↓
//!                    Error                            Error
//! (any) ──close()──→ Closed
//! ```
//!
//! The underlying client reconnects on its own; the background liveness
//! watcher and every command outcome feed the observed state, so
//! `is_connected()` flips back without a new `initialize()` call.
//!
//! ## Graceful Degradation
//!
//! A missing URL, an invalid configuration or a failed connect all leave the
//! handle absent. Facades treat an absent handle as disabled mode and answer
//! with their fallback values.

use std::sync::Arc;
use std::sync::atomic::{AtomicU8, Ordering};
use std::time::{Duration, Instant};

use arc_swap::ArcSwapOption;
use redis::aio::{ConnectionManager, ConnectionManagerConfig};
use redis::{ConnectionInfo, FromRedisValue};
use serde::Serialize;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;

use crate::config::StoreConfig;
use crate::error::{StateError, StateResult};
use crate::telemetry;

/// Observed lifecycle state of the store connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
#[repr(u8)]
pub enum ConnectionState {
    Uninitialized = 0,
    Connecting = 1,
    Connected = 2,
    Error = 3,
    Reconnecting = 4,
    Closed = 5,
}

impl ConnectionState {
    fn from_u8(raw: u8) -> Self {
        match raw {
            1 => ConnectionState::Connecting,
            2 => ConnectionState::Connected,
            3 => ConnectionState::Error,
            4 => ConnectionState::Reconnecting,
            5 => ConnectionState::Closed,
            _ => ConnectionState::Uninitialized,
        }
    }
}

impl std::fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConnectionState::Uninitialized => write!(f, "uninitialized"),
            ConnectionState::Connecting => write!(f, "connecting"),
            ConnectionState::Connected => write!(f, "connected"),
            ConnectionState::Error => write!(f, "error"),
            ConnectionState::Reconnecting => write!(f, "reconnecting"),
            ConnectionState::Closed => write!(f, "closed"),
        }
    }
}

/// Shared lifecycle observer, written by the connection and by command outcomes.
#[derive(Debug, Default)]
pub(crate) struct Lifecycle {
    state: AtomicU8,
}

impl Lifecycle {
    pub(crate) fn get(&self) -> ConnectionState {
        ConnectionState::from_u8(self.state.load(Ordering::Acquire))
    }

    /// Unconditional transition, used by `initialize()` and `close()`.
    fn set(&self, next: ConnectionState) {
        let prev = ConnectionState::from_u8(self.state.swap(next as u8, Ordering::AcqRel));
        Self::log_transition(prev, next);
    }

    /// Move to `next` if the current state is one of `from`.
    fn transition_from(&self, from: &[ConnectionState], next: ConnectionState) -> bool {
        let result = self
            .state
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |raw| {
                let current = ConnectionState::from_u8(raw);
                (current != next && from.contains(&current)).then_some(next as u8)
            });
        match result {
            Ok(prev) => {
                Self::log_transition(ConnectionState::from_u8(prev), next);
                true
            }
            Err(_) => false,
        }
    }

    pub(crate) fn report_success(&self) {
        self.transition_from(
            &[ConnectionState::Error, ConnectionState::Reconnecting],
            ConnectionState::Connected,
        );
    }

    pub(crate) fn report_failure(&self, error: &StateError) {
        if error.is_connection_failure() {
            self.transition_from(
                &[ConnectionState::Connected, ConnectionState::Reconnecting],
                ConnectionState::Error,
            );
        }
    }

    fn begin_reconnect(&self) -> bool {
        self.transition_from(&[ConnectionState::Error], ConnectionState::Reconnecting)
    }

    fn log_transition(prev: ConnectionState, next: ConnectionState) {
        if prev == next {
            return;
        }
        match (prev, next) {
            (ConnectionState::Connecting, ConnectionState::Connected) => {
                tracing::info!("Connected to state store");
            }
            (_, ConnectionState::Connected) => {
                tracing::info!(from = %prev, "State store connection restored");
            }
            (_, ConnectionState::Error) => {
                tracing::warn!(from = %prev, "State store connection error");
            }
            (_, ConnectionState::Reconnecting) => {
                tracing::info!("Reconnecting to state store");
            }
            (_, ConnectionState::Closed) => {
                tracing::info!(from = %prev, "State store connection closed");
            }
            _ => {
                tracing::debug!(from = %prev, to = %next, "State store lifecycle transition");
            }
        }
        telemetry::set_store_connected(next == ConnectionState::Connected);
    }
}

/// Cheap, cloneable handle to the backing store.
///
/// Every command issued through it is bounded by the configured command
/// timeout and its outcome is reported to the lifecycle observer.
#[derive(Clone)]
pub struct StoreHandle {
    conn: ConnectionManager,
    command_timeout: Duration,
    lifecycle: Arc<Lifecycle>,
}

impl std::fmt::Debug for StoreHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StoreHandle")
            .field("command_timeout", &self.command_timeout)
            .finish_non_exhaustive()
    }
}

impl StoreHandle {
    pub fn command_timeout(&self) -> Duration {
        self.command_timeout
    }

    /// Run a single command.
    pub async fn query<T: FromRedisValue>(&self, cmd: &redis::Cmd) -> StateResult<T> {
        let mut conn = self.conn.clone();
        let result = match tokio::time::timeout(self.command_timeout, cmd.query_async(&mut conn)).await {
            Ok(result) => result.map_err(StateError::from),
            Err(_) => Err(StateError::Timeout(self.command_timeout)),
        };
        self.observe(result)
    }

    /// Run a pipeline. Atomic pipelines execute as one MULTI/EXEC block.
    pub async fn query_pipeline<T: FromRedisValue>(&self, pipe: &redis::Pipeline) -> StateResult<T> {
        let mut conn = self.conn.clone();
        let result = match tokio::time::timeout(self.command_timeout, pipe.query_async(&mut conn)).await {
            Ok(result) => result.map_err(StateError::from),
            Err(_) => Err(StateError::Timeout(self.command_timeout)),
        };
        self.observe(result)
    }

    /// PING round-trip, returning the elapsed time.
    pub async fn ping(&self) -> StateResult<Duration> {
        let started = Instant::now();
        let reply: String = self.query(&redis::cmd("PING")).await?;
        if reply != "PONG" {
            return Err(StateError::Connection(format!("unexpected PING reply: {reply}")));
        }
        Ok(started.elapsed())
    }

    fn observe<T>(&self, result: StateResult<T>) -> StateResult<T> {
        match &result {
            Ok(_) => self.lifecycle.report_success(),
            Err(e) => self.lifecycle.report_failure(e),
        }
        result
    }
}

/// Owner of the store handle and its connectivity state.
///
/// Constructed once at startup and shared as `Arc<StoreConnection>` with
/// every facade.
pub struct StoreConnection {
    config: StoreConfig,
    handle: ArcSwapOption<StoreHandle>,
    lifecycle: Arc<Lifecycle>,
    shutdown: CancellationToken,
    init_lock: Mutex<()>,
}

impl StoreConnection {
    pub fn new(config: StoreConfig) -> Self {
        Self {
            config,
            handle: ArcSwapOption::empty(),
            lifecycle: Arc::new(Lifecycle::default()),
            shutdown: CancellationToken::new(),
            init_lock: Mutex::new(()),
        }
    }

    /// A connection that never dials out.
    pub fn disabled() -> Self {
        Self::new(StoreConfig::default())
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    /// Connect to the store.
    ///
    /// Returns `None` in disabled mode and on any failure; the cause is
    /// logged. Calling this while connected returns the existing handle.
    pub async fn initialize(&self) -> Option<StoreHandle> {
        let _guard = self.init_lock.lock().await;

        if let Some(handle) = self.get_instance() {
            return Some(handle);
        }
        if self.lifecycle.get() == ConnectionState::Closed {
            tracing::warn!("State store connection already closed, not reconnecting");
            return None;
        }

        let info = match self.config.connection_info() {
            Ok(Some(info)) => info,
            Ok(None) => {
                tracing::info!("No state store configured, running in disabled mode");
                return None;
            }
            Err(e) => {
                tracing::warn!(error = %e, "Invalid state store configuration, running in disabled mode");
                return None;
            }
        };

        tracing::info!(url = ?self.config.redacted_url(), "Connecting to state store");
        self.lifecycle.set(ConnectionState::Connecting);

        match self.connect(info).await {
            Ok(handle) => {
                self.handle.store(Some(Arc::new(handle.clone())));
                self.lifecycle.set(ConnectionState::Connected);
                self.spawn_liveness_watcher(handle.clone());
                Some(handle)
            }
            Err(e) => {
                tracing::warn!(
                    error = %e,
                    "Failed to connect to state store. Running in disabled mode."
                );
                self.lifecycle.set(ConnectionState::Error);
                None
            }
        }
    }

    async fn connect(&self, info: ConnectionInfo) -> StateResult<StoreHandle> {
        let client =
            redis::Client::open(info).map_err(|e| StateError::Connection(e.to_string()))?;

        let connect_timeout = self.config.connect_timeout();
        let manager_config = ConnectionManagerConfig::new()
            .set_connection_timeout(connect_timeout)
            .set_response_timeout(self.config.command_timeout())
            .set_number_of_retries(self.config.max_retries_per_request);

        let conn = match tokio::time::timeout(
            connect_timeout,
            ConnectionManager::new_with_config(client, manager_config),
        )
        .await
        {
            Ok(Ok(conn)) => conn,
            Ok(Err(e)) => return Err(StateError::Connection(e.to_string())),
            Err(_) => {
                return Err(StateError::Connection(format!(
                    "connect timed out after {connect_timeout:?}"
                )));
            }
        };

        let handle = StoreHandle {
            conn,
            command_timeout: self.config.command_timeout(),
            lifecycle: Arc::clone(&self.lifecycle),
        };
        let latency = handle.ping().await?;
        tracing::debug!(latency_ms = latency.as_millis() as u64, "State store liveness probe succeeded");
        Ok(handle)
    }

    /// Periodically PING the store so connectivity changes are observed even
    /// when no traffic flows.
    fn spawn_liveness_watcher(&self, handle: StoreHandle) {
        let lifecycle = Arc::clone(&self.lifecycle);
        let shutdown = self.shutdown.clone();
        let interval = self.config.liveness_interval();

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            // First tick completes immediately; the connect probe already covered it.
            ticker.tick().await;

            loop {
                tokio::select! {
                    _ = shutdown.cancelled() => break,
                    _ = ticker.tick() => {
                        lifecycle.begin_reconnect();
                        if let Err(e) = handle.ping().await {
                            tracing::debug!(error = %e, "State store liveness probe failed");
                        }
                    }
                }
            }
            tracing::debug!("State store liveness watcher stopped");
        });
    }

    /// Current handle, if any. No side effects.
    pub fn get_instance(&self) -> Option<StoreHandle> {
        self.handle.load_full().map(|handle| (*handle).clone())
    }

    /// Current handle or [`StateError::Disabled`].
    pub(crate) fn handle(&self) -> StateResult<StoreHandle> {
        self.get_instance().ok_or(StateError::Disabled)
    }

    pub fn state(&self) -> ConnectionState {
        self.lifecycle.get()
    }

    pub fn is_connected(&self) -> bool {
        self.handle.load().is_some() && self.lifecycle.get() == ConnectionState::Connected
    }

    /// Stop the liveness watcher and drop the handle. Terminal.
    ///
    /// In-flight commands keep their own clone of the client and finish
    /// normally; the socket closes when the last clone is dropped.
    pub async fn close(&self) {
        let _guard = self.init_lock.lock().await;
        self.shutdown.cancel();
        self.handle.store(None);
        self.lifecycle.set(ConnectionState::Closed);
    }
}

impl Drop for StoreConnection {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}
