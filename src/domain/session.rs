//! Per-connection session state.

use std::fmt;
use std::net::SocketAddr;
use std::time::Duration;

use bytes::Bytes;
use chrono::{DateTime, Utc};
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::sync::{Mutex, RwLock, mpsc};
use tokio::task::JoinHandle;
use tokio_util::sync::{CancellationToken, WaitForCancellationFuture};

use super::SessionId;
use crate::error::RelayError;

/// Display name used for sessions that never identified.
pub const ANONYMOUS: &str = "anonymous";

/// Default number of records that may wait in one session's outbound queue.
pub const DEFAULT_OUTBOUND_CAPACITY: usize = 256;

/// Bounds on a session's outbound path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OutboundLimits {
    /// Records that may be queued before the session counts as stalled.
    pub capacity: usize,
    /// Bound on writing and flushing one record.
    pub write_timeout: Duration,
}

impl Default for OutboundLimits {
    fn default() -> Self {
        Self {
            capacity: DEFAULT_OUTBOUND_CAPACITY,
            write_timeout: Duration::from_secs(5),
        }
    }
}

enum Outbound {
    Record(Bytes),
    Close,
}

/// Server-side state tied to one live connection.
///
/// The read half of the connection stays with the connection task. The
/// write half is owned by a writer task fed through a bounded queue, so
/// [`deliver`](Self::deliver) never waits on the peer and records reach
/// the socket whole and in queue order.
///
/// A session whose peer stops draining (write timeout, write error, or a
/// full queue) is marked broken: its writer shuts the stream down and all
/// later deliveries fail. Nothing is ever written after a partial record.
/// The owning connection task waits on [`broken`](Self::broken) and tears
/// the session down.
pub struct Session {
    id: SessionId,
    peer: Option<SocketAddr>,
    connected_at: DateTime<Utc>,
    display_name: RwLock<Option<String>>,
    limits: OutboundLimits,
    outbound: mpsc::Sender<Outbound>,
    broken: CancellationToken,
    writer_task: Mutex<Option<JoinHandle<()>>>,
}

impl Session {
    /// Creates a session with a freshly allocated [`SessionId`] and spawns
    /// its writer task.
    ///
    /// Must be called from within a Tokio runtime.
    #[must_use]
    pub fn new<W>(peer: Option<SocketAddr>, writer: W, limits: OutboundLimits) -> Self
    where
        W: AsyncWrite + Send + Unpin + 'static,
    {
        Self::with_id(SessionId::next(), peer, writer, limits)
    }

    /// Creates a session with an explicit ID.
    ///
    /// Must be called from within a Tokio runtime.
    #[must_use]
    pub fn with_id<W>(
        id: SessionId,
        peer: Option<SocketAddr>,
        writer: W,
        limits: OutboundLimits,
    ) -> Self
    where
        W: AsyncWrite + Send + Unpin + 'static,
    {
        let (outbound, queue) = mpsc::channel(limits.capacity.max(1));
        let broken = CancellationToken::new();
        let writer_task = tokio::spawn(write_loop(
            id,
            writer,
            queue,
            limits.write_timeout,
            broken.clone(),
        ));
        Self {
            id,
            peer,
            connected_at: Utc::now(),
            display_name: RwLock::new(None),
            limits,
            outbound,
            broken,
            writer_task: Mutex::new(Some(writer_task)),
        }
    }

    /// Returns the session ID.
    #[must_use]
    pub const fn id(&self) -> SessionId {
        self.id
    }

    /// Returns the remote address, if the transport has one.
    #[must_use]
    pub const fn peer(&self) -> Option<SocketAddr> {
        self.peer
    }

    /// Returns when the connection was accepted.
    #[must_use]
    pub const fn connected_at(&self) -> DateTime<Utc> {
        self.connected_at
    }

    /// Returns the outbound limits this session was created with.
    #[must_use]
    pub const fn limits(&self) -> OutboundLimits {
        self.limits
    }

    /// Returns the display name, if the session has identified.
    pub async fn display_name(&self) -> Option<String> {
        self.display_name.read().await.clone()
    }

    /// Returns the display name, or [`ANONYMOUS`] if never identified.
    pub async fn sender_name(&self) -> String {
        self.display_name()
            .await
            .unwrap_or_else(|| ANONYMOUS.to_string())
    }

    /// Sets (or overwrites) the display name.
    pub async fn set_display_name(&self, name: String) {
        *self.display_name.write().await = Some(name);
    }

    /// Returns `true` once the outbound path has failed.
    #[must_use]
    pub fn is_broken(&self) -> bool {
        self.broken.is_cancelled()
    }

    /// Completes when the outbound path fails.
    pub fn broken(&self) -> WaitForCancellationFuture<'_> {
        self.broken.cancelled()
    }

    /// Queues one already-framed record for the connection. Never waits.
    ///
    /// # Errors
    ///
    /// Returns [`RelayError::SessionClosed`] if the session is broken or
    /// closed, and [`RelayError::OutboundFull`] if the queue is full. A full
    /// queue also marks the session broken, since dropping one record would
    /// leave a gap in what the peer sees.
    pub fn deliver(&self, record: Bytes) -> Result<(), RelayError> {
        if self.is_broken() {
            return Err(RelayError::SessionClosed);
        }
        match self.outbound.try_send(Outbound::Record(record)) {
            Ok(()) => Ok(()),
            Err(mpsc::error::TrySendError::Full(_)) => {
                self.broken.cancel();
                Err(RelayError::OutboundFull {
                    capacity: self.limits.capacity,
                })
            }
            Err(mpsc::error::TrySendError::Closed(_)) => Err(RelayError::SessionClosed),
        }
    }

    /// Flushes queued records, then shuts down the write half.
    ///
    /// Each step is bounded by the write timeout; a writer that does not
    /// finish in time is aborted. Shutdown errors are ignored: the peer may
    /// already be gone.
    pub async fn close(&self) {
        let Some(mut writer_task) = self.writer_task.lock().await.take() else {
            return;
        };
        let timeout = self.limits.write_timeout;
        if !self.is_broken() {
            let _ = tokio::time::timeout(timeout, self.outbound.send(Outbound::Close)).await;
        }
        if tokio::time::timeout(timeout, &mut writer_task).await.is_err() {
            tracing::debug!(session = %self.id, "writer did not finish; aborting");
            writer_task.abort();
        }
    }
}

/// Drains the outbound queue into `writer` until closed or a write fails.
async fn write_loop<W>(
    id: SessionId,
    mut writer: W,
    mut queue: mpsc::Receiver<Outbound>,
    write_timeout: Duration,
    broken: CancellationToken,
) where
    W: AsyncWrite + Send + Unpin,
{
    while let Some(item) = queue.recv().await {
        let Outbound::Record(record) = item else {
            break;
        };
        let write = async {
            writer.write_all(&record).await?;
            writer.flush().await
        };
        let result = match tokio::time::timeout(write_timeout, write).await {
            Ok(result) => result.map_err(RelayError::from),
            Err(_) => Err(RelayError::WriteTimeout {
                timeout_ms: u64::try_from(write_timeout.as_millis()).unwrap_or(u64::MAX),
            }),
        };
        if let Err(e) = result {
            tracing::debug!(session = %id, error = %e, "outbound write failed");
            broken.cancel();
            break;
        }
    }
    queue.close();

    match tokio::time::timeout(write_timeout, writer.shutdown()).await {
        Ok(Err(e)) => tracing::trace!(session = %id, error = %e, "shutdown after peer closed"),
        Err(_) => tracing::trace!(session = %id, "shutdown timed out"),
        Ok(Ok(())) => {}
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("id", &self.id)
            .field("peer", &self.peer)
            .field("connected_at", &self.connected_at)
            .field("broken", &self.is_broken())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use tokio::io::AsyncReadExt;

    use super::*;

    const WAIT: Duration = Duration::from_secs(2);

    fn limits(capacity: usize, write_timeout_ms: u64) -> OutboundLimits {
        OutboundLimits {
            capacity,
            write_timeout: Duration::from_millis(write_timeout_ms),
        }
    }

    #[tokio::test]
    async fn unidentified_session_is_anonymous() {
        let (writer, _reader) = tokio::io::duplex(64);
        let session = Session::new(None, writer, OutboundLimits::default());
        assert_eq!(session.display_name().await, None);
        assert_eq!(session.sender_name().await, ANONYMOUS);
    }

    #[tokio::test]
    async fn later_identify_overwrites_name() {
        let (writer, _reader) = tokio::io::duplex(64);
        let session = Session::new(None, writer, OutboundLimits::default());
        session.set_display_name("alice".to_string()).await;
        session.set_display_name("bob".to_string()).await;
        assert_eq!(session.sender_name().await, "bob");
    }

    #[tokio::test]
    async fn deliver_writes_records_in_order() {
        let (writer, mut reader) = tokio::io::duplex(64);
        let session = Session::new(None, writer, OutboundLimits::default());

        assert!(session.deliver(Bytes::from_static(b"{\"a\":1}\n")).is_ok());
        assert!(session.deliver(Bytes::from_static(b"{\"a\":2}\n")).is_ok());

        let mut buf = [0u8; 16];
        let Ok(_) = reader.read_exact(&mut buf).await else {
            panic!("read failed");
        };
        assert_eq!(&buf, b"{\"a\":1}\n{\"a\":2}\n");
    }

    #[tokio::test]
    async fn write_error_breaks_session() {
        let (writer, reader) = tokio::io::duplex(64);
        drop(reader);
        let session = Session::new(None, writer, OutboundLimits::default());

        assert!(session.deliver(Bytes::from_static(b"x\n")).is_ok());
        let Ok(()) = tokio::time::timeout(WAIT, session.broken()).await else {
            panic!("session never marked broken");
        };
        assert!(matches!(
            session.deliver(Bytes::from_static(b"y\n")),
            Err(RelayError::SessionClosed)
        ));
    }

    #[tokio::test]
    async fn timed_out_write_never_leaves_a_torn_line() {
        // The pipe holds 8 bytes, so a 33-byte record stalls partway.
        let (writer, mut reader) = tokio::io::duplex(8);
        let session = Session::new(None, writer, limits(4, 50));

        let first = Bytes::from_static(b"{\"type\":\"chat\",\"message\":\"one\"}\n");
        assert!(session.deliver(first).is_ok());
        let Ok(()) = tokio::time::timeout(WAIT, session.broken()).await else {
            panic!("stalled write never timed out");
        };

        // The peer catches up, but nothing more is written after the fragment.
        let second = Bytes::from_static(b"{\"type\":\"chat\",\"message\":\"two\"}\n");
        assert!(matches!(
            session.deliver(second),
            Err(RelayError::SessionClosed)
        ));
        session.close().await;

        let mut seen = Vec::new();
        let Ok(Ok(_)) = tokio::time::timeout(WAIT, reader.read_to_end(&mut seen)).await else {
            panic!("stream was not shut down");
        };
        assert_eq!(seen.len(), 8);
        assert!(!seen.contains(&b'\n'), "torn record completed a line");
    }

    #[tokio::test]
    async fn full_queue_breaks_session() {
        let (writer, _reader) = tokio::io::duplex(1);
        let session = Session::new(None, writer, limits(2, 1_000));

        // No await between deliveries: the writer task cannot drain yet.
        let mut results = Vec::new();
        for _ in 0..4 {
            results.push(session.deliver(Bytes::from_static(b"record\n")));
        }
        assert!(results.iter().any(|r| matches!(
            r,
            Err(RelayError::OutboundFull { capacity: 2 })
        )));
        assert!(session.is_broken());
    }

    #[tokio::test]
    async fn close_flushes_queue_then_signals_eof() {
        let (writer, mut reader) = tokio::io::duplex(64);
        let session = Session::new(None, writer, OutboundLimits::default());
        assert!(session.deliver(Bytes::from_static(b"last\n")).is_ok());
        session.close().await;

        let mut buf = Vec::new();
        let Ok(_) = reader.read_to_end(&mut buf).await else {
            panic!("read failed");
        };
        assert_eq!(buf, b"last\n");
        assert!(matches!(
            session.deliver(Bytes::from_static(b"late\n")),
            Err(RelayError::SessionClosed)
        ));
    }
}
