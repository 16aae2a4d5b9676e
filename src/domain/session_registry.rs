//! Live set of connected sessions.
//!
//! [`SessionRegistry`] stores every connected [`Session`] in a `HashMap`
//! behind a [`tokio::sync::RwLock`]. Broadcasts never iterate the map
//! directly: they take a [`snapshot`](SessionRegistry::snapshot), an owned
//! list of `Arc<Session>` that later inserts and removals cannot touch.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::RwLock;

use super::{Session, SessionId};
use crate::error::RelayError;

/// Registry of all live sessions, keyed by [`SessionId`].
///
/// # Concurrency
///
/// - Inserts and removals take the write lock, so a snapshot never sees a
///   half-applied mutation.
/// - Snapshots take the read lock only long enough to clone the `Arc`s.
#[derive(Debug, Default)]
pub struct SessionRegistry {
    sessions: RwLock<HashMap<SessionId, Arc<Session>>>,
}

impl SessionRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a session to the registry.
    ///
    /// # Errors
    ///
    /// Returns [`RelayError::DuplicateSession`] if a session with the same
    /// ID is already registered (IDs are never reused, so this indicates a
    /// double registration).
    pub async fn register(&self, session: Arc<Session>) -> Result<(), RelayError> {
        let id = session.id();
        let mut map = self.sessions.write().await;
        if map.contains_key(&id) {
            return Err(RelayError::DuplicateSession(id));
        }
        map.insert(id, session);
        Ok(())
    }

    /// Removes a session, returning it if it was present.
    ///
    /// Removing an absent session is a no-op.
    pub async fn unregister(&self, id: SessionId) -> Option<Arc<Session>> {
        self.sessions.write().await.remove(&id)
    }

    /// Returns a point-in-time copy of all registered sessions.
    pub async fn snapshot(&self) -> Vec<Arc<Session>> {
        self.sessions.read().await.values().map(Arc::clone).collect()
    }

    /// Returns `true` if a session with the given ID is registered.
    pub async fn contains(&self, id: SessionId) -> bool {
        self.sessions.read().await.contains_key(&id)
    }

    /// Returns the number of registered sessions.
    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    /// Returns `true` if no sessions are registered.
    pub async fn is_empty(&self) -> bool {
        self.sessions.read().await.is_empty()
    }
}
