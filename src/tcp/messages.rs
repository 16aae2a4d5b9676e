//! Client-to-server messages and direct (non-broadcast) replies.
//!
//! Inbound records are decoded in two steps: the record must be a JSON
//! object, then its `type` field selects the variant. Fields are taken out
//! of the object as-is, so opaque values (`ts`, `action`) keep their exact
//! JSON shape.

use serde::Serialize;
use serde_json::{Map, Value};

use crate::domain::ANONYMOUS;
use crate::error::RelayError;

/// A decoded client message.
#[derive(Debug, Clone, PartialEq)]
pub enum ClientMessage {
    /// Keepalive; answered with a direct `pong`.
    Ping {
        /// Opaque timestamp echoed back; `None` when the field was absent.
        ts: Option<Value>,
    },
    /// Sets the session's display name.
    Identify {
        /// Requested name, already defaulted to `"anonymous"` when missing,
        /// empty, or not a string.
        username: String,
    },
    /// Chat line to relay.
    Chat {
        /// Message text; empty when missing or not a string.
        message: String,
    },
    /// State change to relay as a `zone_sync`.
    Action {
        /// Opaque payload; `null` when absent.
        action: Value,
    },
    /// Any other `type`, or none at all.
    Unknown {
        /// The `type` field if it was a string.
        kind: Option<String>,
    },
}

impl ClientMessage {
    /// Decodes one inbound record.
    ///
    /// # Errors
    ///
    /// Returns [`RelayError::Malformed`] if the record is not valid UTF-8
    /// JSON, and [`RelayError::NotAnObject`] if it is JSON but not an
    /// object.
    pub fn parse(record: &[u8]) -> Result<Self, RelayError> {
        let Value::Object(mut fields) = serde_json::from_slice::<Value>(record)? else {
            return Err(RelayError::NotAnObject);
        };

        let kind = match fields.remove("type") {
            Some(Value::String(kind)) => Some(kind),
            _ => None,
        };

        let message = match kind.as_deref() {
            Some("ping") => Self::Ping {
                ts: fields.remove("ts"),
            },
            Some("identify") => Self::Identify {
                username: take_string(&mut fields, "username")
                    .filter(|name| !name.is_empty())
                    .unwrap_or_else(|| ANONYMOUS.to_string()),
            },
            Some("chat") => Self::Chat {
                message: take_string(&mut fields, "message").unwrap_or_default(),
            },
            Some("action") => Self::Action {
                action: fields.remove("action").unwrap_or(Value::Null),
            },
            _ => Self::Unknown { kind },
        };
        Ok(message)
    }
}

fn take_string(fields: &mut Map<String, Value>, key: &str) -> Option<String> {
    match fields.remove(key) {
        Some(Value::String(s)) => Some(s),
        _ => None,
    }
}

/// Reply written to one connection only. Carries no `protocol` or `seq`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DirectReply {
    /// Answer to `ping`.
    Pong {
        /// Echo of the ping's `ts`, omitted if the ping had none.
        #[serde(skip_serializing_if = "Option::is_none")]
        ts: Option<Value>,
    },
    /// Roster entry for a player already present when this session
    /// identified.
    PlayerJoin {
        /// Display name.
        username: String,
    },
}

impl DirectReply {
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
