//! Service layer: broadcast orchestration.
//!
//! The [`Dispatcher`] is the only component that writes to sessions other
//! than the one a connection task owns.

pub mod dispatcher;

pub use dispatcher::Dispatcher;
