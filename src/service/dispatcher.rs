//! Broadcast dispatcher: stamps, serializes, and fans out server events.

use std::sync::Arc;

use bytes::Bytes;
use tokio::sync::Mutex;

use crate::domain::{Sequencer, ServerEvent, SessionRegistry, StampedEvent};

/// Fan-out coordinator for all broadcasts.
///
/// Owns references to the [`SessionRegistry`] for recipients and the
/// [`Sequencer`] for ordering-sensitive kinds. Every broadcast follows the
/// pattern: stamp → (sequence) → serialize once → snapshot → queue on each
/// recipient.
///
/// Delivery is best-effort and at-most-once. A failed recipient is logged
/// and skipped; it is never unregistered here, since removal belongs to
/// the session's own connection task.
#[derive(Debug)]
pub struct Dispatcher {
    registry: Arc<SessionRegistry>,
    sequencer: Arc<Sequencer>,
    fanout: Mutex<()>,
}

impl Dispatcher {
    /// Creates a new `Dispatcher`.
    #[must_use]
    pub fn new(registry: Arc<SessionRegistry>, sequencer: Arc<Sequencer>) -> Self {
        Self {
            registry,
            sequencer,
            fanout: Mutex::new(()),
        }
    }

    /// Returns a reference to the inner [`SessionRegistry`].
    #[must_use]
    pub const fn registry(&self) -> &Arc<SessionRegistry> {
        &self.registry
    }

    /// Returns a reference to the inner [`Sequencer`].
    #[must_use]
    pub const fn sequencer(&self) -> &Arc<Sequencer> {
        &self.sequencer
    }

    /// Delivers `event` to every session registered at the time of the
    /// call.
    ///
    /// Ordering-sensitive events take their sequence number before
    /// serialization. Sequencing and queueing happen under one fan-out
    /// lock, so every session receives `zone_sync` records in `seq` order;
    /// a session may still miss some if it is dropped, and clients should
    /// treat `seq` as the ordering authority.
    ///
    /// Recipients are only queued on, never awaited: a slow or broken
    /// recipient does not delay this call or delivery to the others.
    pub async fn broadcast(&self, event: ServerEvent) {
        let kind = event.kind();
        let _fanout = self.fanout.lock().await;

        let seq = event.is_ordered().then(|| self.sequencer.next());
        let record = match StampedEvent::new(event, seq).to_record() {
            Ok(record) => Bytes::from(record),
            Err(e) => {
                tracing::error!(kind, error = %e, "failed to serialize broadcast");
                return;
            }
        };

        let recipients = self.registry.snapshot().await;
        let mut failed = 0_usize;
        for session in &recipients {
            if let Err(e) = session.deliver(record.clone()) {
                failed = failed.saturating_add(1);
                tracing::debug!(session = %session.id(), kind, error = %e, "skipping recipient");
            }
        }
        tracing::debug!(kind, ?seq, recipients = recipients.len(), failed, "broadcast");
    }
}
