//! Domain layer: sessions, the session registry, and sequencing.
//!
//! This module contains the server-side domain model: session identity
//! and per-connection state, the registry of live sessions, the global
//! sequencer for ordering-sensitive broadcasts, and the broadcast event
//! types.

pub mod sequencer;
pub mod server_event;
pub mod session;
pub mod session_id;
pub mod session_registry;

pub use sequencer::Sequencer;
pub use server_event::{PROTOCOL_VERSION, ServerEvent, StampedEvent, ZoneData};
pub use session::{ANONYMOUS, DEFAULT_OUTBOUND_CAPACITY, OutboundLimits, Session};
pub use session_id::SessionId;
pub use session_registry::SessionRegistry;
