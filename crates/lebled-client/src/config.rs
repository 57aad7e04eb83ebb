//! Session configuration loaded from environment variables.
//!
//! All settings have defaults so a session can start with zero
//! configuration.

use std::path::PathBuf;
use std::time::Duration;

/// Messaging session configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessengerConfig {
    /// Database file to open.
    /// Env: `LEBLED_DB_PATH`
    /// Default: platform data directory (see `Database::new`).
    pub db_path: Option<PathBuf>,

    /// Period of the background reconciliation refresh, which catches pushes
    /// the realtime channel dropped.
    /// Env: `LEBLED_RECONCILE_SECS` (`0` disables)
    /// Default: disabled.
    pub reconcile_interval: Option<Duration>,

    /// Capacity of the session command queue.
    /// Env: `LEBLED_COMMAND_BUFFER`
    /// Default: `64`
    pub command_buffer: usize,

    /// Capacity of the UI event broadcast channel.
    /// Env: `LEBLED_EVENT_CAPACITY`
    /// Default: `256`
    pub event_capacity: usize,
}

impl Default for MessengerConfig {
    fn default() -> Self {
        Self {
            db_path: None,
            reconcile_interval: None,
            command_buffer: 64,
            event_capacity: 256,
        }
    }
}

impl MessengerConfig {
    /// Load configuration from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();

        if let Some(path) = lookup("LEBLED_DB_PATH").filter(|p| !p.is_empty()) {
            config.db_path = Some(PathBuf::from(path));
        }

        if let Some(val) = lookup("LEBLED_RECONCILE_SECS") {
            match val.parse::<u64>() {
                Ok(0) => config.reconcile_interval = None,
                Ok(secs) => config.reconcile_interval = Some(Duration::from_secs(secs)),
                Err(_) => {
                    tracing::warn!(value = %val, "Invalid LEBLED_RECONCILE_SECS, reconciliation stays off");
                }
            }
        }

        if let Some(val) = lookup("LEBLED_COMMAND_BUFFER") {
            match parse_capacity(&val) {
                Some(n) => config.command_buffer = n,
                None => tracing::warn!(value = %val, "Invalid LEBLED_COMMAND_BUFFER, using default"),
            }
        }

        if let Some(val) = lookup("LEBLED_EVENT_CAPACITY") {
            match parse_capacity(&val) {
                Some(n) => config.event_capacity = n,
                None => tracing::warn!(value = %val, "Invalid LEBLED_EVENT_CAPACITY, using default"),
            }
        }

        // RUST_LOG is handled directly by tracing-subscriber's EnvFilter.

        config
    }
}

// Both channels panic on a zero capacity.
fn parse_capacity(val: &str) -> Option<usize> {
    val.trim().parse::<usize>().ok().filter(|n| *n > 0)
}
