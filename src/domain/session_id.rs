//! Type-safe session identifier.
//!
//! [`SessionId`] is an opaque integer handle for one accepted connection.
//! Handles are allocated from a process-wide counter and never reused, so
//! a stale handle can never address a newer session.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

static NEXT_SESSION_ID: AtomicU64 = AtomicU64::new(1);

/// Unique identifier for a connected session.
///
/// Generated once at accept time and immutable thereafter. Used as the key
/// in [`super::SessionRegistry`] and as the `session` field in log lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct SessionId(u64);

impl SessionId {
    /// Allocates the next unused `SessionId`.
    #[must_use]
    pub fn next() -> Self {
        Self(NEXT_SESSION_ID.fetch_add(1, Ordering::Relaxed))
    }

    /// Wraps a raw handle value.
    #[must_use]
    pub const fn from_raw(raw: u64) -> Self {
        Self(raw)
    }

    /// Returns the raw handle value.
    #[must_use]
    pub const fn as_u64(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<SessionId> for u64 {
    fn from(id: SessionId) -> Self {
        id.0
    }
}
