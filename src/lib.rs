//! # zone-relay
//!
//! Session manager and broadcast relay for the city multiplayer server.
//!
//! Clients connect over TCP and exchange newline-delimited JSON records.
//! The relay answers pings directly and fans out presence (`player_join`,
//! `player_leave`), chat, and state-sync (`zone_sync`) events to every
//! connected client. `zone_sync` events carry a process-wide, strictly
//! increasing `seq` so clients can order them.
//!
//! ## Architecture
//!
//! ```text
//! Clients (TCP, JSON lines)
//!     │
//!     ├── Listener + per-connection tasks (tcp/)
//!     │
//!     ├── Dispatcher (service/)
//!     │
//!     ├── SessionRegistry + Sequencer (domain/)
//!     │
//!     └── Per-session outbound queues + writer tasks
//! ```

pub mod app_state;
pub mod config;
pub mod domain;
pub mod error;
pub mod service;
pub mod tcp;
