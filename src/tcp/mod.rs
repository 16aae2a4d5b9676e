//! TCP layer: record framing, client messages, connection handling, and
//! the accept loop.
//!
//! Each accepted connection exchanges newline-delimited JSON records and
//! runs in its own task until EOF, a transport error, or shutdown.

pub mod codec;
pub mod connection;
pub mod listener;
pub mod messages;

pub use connection::{Disconnect, run_connection};
pub use listener::serve;
