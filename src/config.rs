//! Relay configuration loaded from environment variables.
//!
//! Follows 12-factor style: all settings come from environment variables
//! (or a `.env` file via `dotenvy`). Unset or unparsable numeric values
//! fall back to their defaults; an unparsable listen address is an error.

use std::net::SocketAddr;
use std::time::Duration;

use crate::domain::{DEFAULT_OUTBOUND_CAPACITY, OutboundLimits};
use crate::error::RelayError;

/// Default bind address of the reference server.
pub const DEFAULT_LISTEN_ADDR: &str = "127.0.0.1:12345";

/// Default upper bound on one inbound record (1 MiB).
pub const DEFAULT_MAX_RECORD_BYTES: usize = 1 << 20;

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    /// Human-readable text lines.
    #[default]
    Text,
    /// One JSON object per line.
    Json,
}

/// Top-level relay configuration.
///
/// Loaded once at startup via [`RelayConfig::from_env`].
#[derive(Debug, Clone)]
pub struct RelayConfig {
    /// Socket address to bind the TCP listener to.
    pub listen_addr: SocketAddr,

    /// Largest inbound record accepted before the connection is dropped.
    pub max_record_bytes: usize,

    /// Bound on a single write to a single connection.
    pub write_timeout: Duration,

    /// Records that may wait for one slow connection before it is dropped.
    pub outbound_capacity: usize,

    /// How long shutdown waits for connection tasks to finish teardown.
    pub shutdown_timeout: Duration,

    /// Whether a newly identified session is told who is already present.
    pub roster_replay: bool,

    /// Log output format.
    pub log_format: LogFormat,
}

impl RelayConfig {
    /// Loads configuration from environment variables.
    ///
    /// Falls back to defaults when a variable is not set.
    /// Calls `dotenvy::dotenv().ok()` to optionally load a `.env` file.
    ///
    /// # Errors
    ///
    /// Returns [`RelayError::Config`] if `LISTEN_ADDR` is set but cannot be
    /// parsed as a [`SocketAddr`].
    pub fn from_env() -> Result<Self, RelayError> {
        dotenvy::dotenv().ok();

        let raw_addr =
            std::env::var("LISTEN_ADDR").unwrap_or_else(|_| DEFAULT_LISTEN_ADDR.to_string());
        let listen_addr: SocketAddr = raw_addr
            .parse()
            .map_err(|e| RelayError::Config(format!("LISTEN_ADDR {raw_addr:?}: {e}")))?;

        let max_record_bytes = parse_env("MAX_RECORD_BYTES", DEFAULT_MAX_RECORD_BYTES).max(1);
        let write_timeout = Duration::from_millis(parse_env("WRITE_TIMEOUT_MS", 5_000));
        let outbound_capacity =
            parse_env("OUTBOUND_QUEUE_CAPACITY", DEFAULT_OUTBOUND_CAPACITY).max(1);
        let shutdown_timeout = Duration::from_secs(parse_env("SHUTDOWN_TIMEOUT_SECS", 5));
        let roster_replay = parse_env_bool("ROSTER_REPLAY", true);
        let log_format = match std::env::var("LOG_FORMAT").ok().as_deref() {
            Some("json") | Some("JSON") => LogFormat::Json,
            _ => LogFormat::Text,
        };

        Ok(Self {
            listen_addr,
            max_record_bytes,
            write_timeout,
            outbound_capacity,
            shutdown_timeout,
            roster_replay,
            log_format,
        })
    }
}

impl RelayConfig {
    /// Returns the per-session outbound bounds.
    #[must_use]
    pub const fn outbound_limits(&self) -> OutboundLimits {
        OutboundLimits {
            capacity: self.outbound_capacity,
            write_timeout: self.write_timeout,
        }
    }
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            listen_addr: SocketAddr::from(([127, 0, 0, 1], 12345)),
            max_record_bytes: DEFAULT_MAX_RECORD_BYTES,
            write_timeout: Duration::from_secs(5),
            outbound_capacity: DEFAULT_OUTBOUND_CAPACITY,
            shutdown_timeout: Duration::from_secs(5),
            roster_replay: true,
            log_format: LogFormat::Text,
        }
    }
}

/// Parses an environment variable as `T`, returning `default` on missing
/// or invalid values.
fn parse_env<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

/// Parses an environment variable as a boolean. Accepts `"true"`, `"1"`,
/// `"false"`, `"0"` (case-insensitive). Returns `default` otherwise.
fn parse_env_bool(key: &str, default: bool) -> bool {
    match std::env::var(key).ok().as_deref() {
        Some("true") | Some("TRUE") | Some("1") => true,
        Some("false") | Some("FALSE") | Some("0") => false,
        _ => default,
    }
}
