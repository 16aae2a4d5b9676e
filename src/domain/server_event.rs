//! Server-originated broadcast events.
//!
//! Every broadcast is a [`ServerEvent`] wrapped in a [`StampedEvent`],
//! which adds the `protocol` version and, for ordering-sensitive kinds,
//! the `seq` number. The stamped value is serialized exactly once per
//! broadcast.

use serde::Serialize;

use crate::error::RelayError;

/// Wire-schema generation attached to every broadcast.
pub const PROTOCOL_VERSION: u32 = 1;

/// Payload of a `zone_sync` event.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ZoneData {
    /// Display name of the session that performed the action.
    pub actor: String,
    /// Client-supplied action, relayed without interpretation.
    pub action: serde_json::Value,
}

/// Event fanned out to every registered session.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerEvent {
    /// A session identified itself.
    PlayerJoin {
        /// Display name.
        username: String,
    },

    /// An identified session disconnected.
    PlayerLeave {
        /// Display name.
        username: String,
    },

    /// Chat line relayed from a session.
    Chat {
        /// Display name of the sender (or `"anonymous"`).
        sender: String,
        /// Message text.
        message: String,
    },

    /// Authoritative zone change. Ordering-sensitive.
    ZoneSync {
        /// Actor and action.
        data: ZoneData,
    },
}

impl ServerEvent {
    /// Returns the wire `type` tag.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::PlayerJoin { .. } => "player_join",
            Self::PlayerLeave { .. } => "player_leave",
            Self::Chat { .. } => "chat",
            Self::ZoneSync { .. } => "zone_sync",
        }
    }

    /// Returns `true` if this kind carries a global sequence number.
    #[must_use]
    pub const fn is_ordered(&self) -> bool {
        matches!(self, Self::ZoneSync { .. })
    }
}

/// A [`ServerEvent`] with protocol metadata attached.
#[derive(Debug, Clone, Serialize)]
pub struct StampedEvent {
    /// The event itself; its fields are flattened into the record.
    #[serde(flatten)]
    pub event: ServerEvent,
    /// Always [`PROTOCOL_VERSION`].
    pub protocol: u32,
    /// Global sequence number, present only for ordered kinds.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub seq: Option<u64>,
}

impl StampedEvent {
    /// Stamps `event` with the current protocol version and `seq`.
    #[must_use]
    pub const fn new(event: ServerEvent, seq: Option<u64>) -> Self {
        Self {
            event,
            protocol: PROTOCOL_VERSION,
            seq,
        }
    }

    /// Serializes to a compact JSON record terminated by `\n`.
    ///
    /// # Errors
    ///
    /// Returns [`RelayError::Malformed`] if serialization fails.
    pub fn to_record(&self) -> Result<Vec<u8>, RelayError> {
        let mut record = serde_json::to_vec(self)?;
        record.push(b'\n');
        Ok(record)
    }
}
