//! Relay error types.
//!
//! [`RelayError`] is the central error type for the relay. None of its
//! variants is fatal to the process: each one is contained either to a
//! single record, a single delivery, or a single connection.

use crate::domain::SessionId;

/// Server-side error enum.
///
/// # Containment
///
/// | Variant                          | Scope                           |
/// |----------------------------------|---------------------------------|
/// | `Malformed`, `NotAnObject`       | one inbound record (skipped)    |
/// | `WriteTimeout`, `Io` on write    | one session's outbound path     |
/// | `OutboundFull`, `SessionClosed`  | one session's outbound path     |
/// | `Io` on read, `RecordTooLong`    | one connection (teardown)       |
/// | `DuplicateSession`               | one connection (never accepted) |
/// | `Config`                         | startup                         |
#[derive(Debug, thiserror::Error)]
pub enum RelayError {
    /// A session with the given ID is already registered.
    #[error("session already registered: {0}")]
    DuplicateSession(SessionId),

    /// Underlying transport failure.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// An inbound record exceeded the configured size limit.
    #[error("record exceeds {limit} bytes")]
    RecordTooLong {
        /// Configured maximum record length in bytes.
        limit: usize,
    },

    /// An inbound record was not valid JSON (or not valid UTF-8).
    #[error("malformed record: {0}")]
    Malformed(#[from] serde_json::Error),

    /// An inbound record was valid JSON but not an object.
    #[error("record is not a JSON object")]
    NotAnObject,

    /// A write to a connection did not complete in time.
    #[error("write timed out after {timeout_ms} ms")]
    WriteTimeout {
        /// Timeout that elapsed, in milliseconds.
        timeout_ms: u64,
    },

    /// A session's outbound queue was full; the peer is not draining.
    #[error("outbound queue full ({capacity} records)")]
    OutboundFull {
        /// Configured queue capacity.
        capacity: usize,
    },

    /// The session's outbound path is closed or broken.
    #[error("session closed")]
    SessionClosed,

    /// Invalid configuration value.
    #[error("invalid configuration: {0}")]
    Config(String),
}

impl RelayError {
    /// Returns `true` if the error only affects the record that caused it,
    /// leaving the connection usable.
    #[must_use]
    pub const fn is_record_local(&self) -> bool {
        matches!(self, Self::Malformed(_) | Self::NotAnObject)
    }
}
