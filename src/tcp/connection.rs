//! Per-connection protocol loop.
//!
//! Handles the read loop for a single client connection: registers the
//! session, dispatches each inbound record, and runs the teardown path
//! exactly once however the loop ends.

use std::net::SocketAddr;
use std::sync::Arc;

use bytes::Bytes;
use chrono::Utc;
use futures_util::StreamExt;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio_util::codec::FramedRead;
use tokio_util::sync::CancellationToken;

use super::codec::RecordCodec;
use super::messages::{ClientMessage, DirectReply};
use crate::app_state::AppState;
use crate::domain::{ServerEvent, Session, ZoneData};
use crate::error::RelayError;

/// Why a connection loop ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disconnect {
    /// The peer closed its side of the stream.
    Eof,
    /// Reading or framing failed.
    ReadError,
    /// The outbound path to this connection failed or stalled.
    WriteError,
    /// The server is shutting down.
    Shutdown,
    /// The session could not be registered.
    Rejected,
}

impl Disconnect {
    /// Returns a short label for log lines.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Eof => "eof",
            Self::ReadError => "read_error",
            Self::WriteError => "write_error",
            Self::Shutdown => "shutdown",
            Self::Rejected => "rejected",
        }
    }
}

/// Runs the protocol loop for a single connection until it ends.
///
/// - Registers a new [`Session`] whose writer is the stream's write half.
/// - Reads one record at a time and dispatches it.
/// - On EOF, read error, a broken outbound path, or cancellation of
///   `shutdown`: broadcasts `player_leave` if the session identified,
///   unregisters it, and shuts down the write half.
///
/// Returns the reason the loop ended.
pub async fn run_connection<S>(
    stream: S,
    peer: Option<SocketAddr>,
    state: AppState,
    shutdown: CancellationToken,
) -> Disconnect
where
    S: AsyncRead + AsyncWrite + Send + 'static,
{
    let (read_half, write_half) = tokio::io::split(stream);
    let session = Arc::new(Session::new(
        peer,
        write_half,
        state.config.outbound_limits(),
    ));
    let id = session.id();

    if let Err(e) = state.registry().register(Arc::clone(&session)).await {
        tracing::error!(session = %id, error = %e, "refusing connection");
        session.close().await;
        return Disconnect::Rejected;
    }
    tracing::info!(session = %id, ?peer, "client connected");

    let mut records = FramedRead::new(read_half, RecordCodec::new(state.config.max_record_bytes));

    let reason = loop {
        tokio::select! {
            biased;
            () = shutdown.cancelled() => break Disconnect::Shutdown,
            () = session.broken() => {
                tracing::debug!(session = %id, "outbound path broken");
                break Disconnect::WriteError;
            }
            frame = records.next() => match frame {
                Some(Ok(record)) => {
                    if let Err(e) = handle_record(&record, &session, &state).await {
                        tracing::debug!(session = %id, error = %e, "direct reply failed");
                        break Disconnect::WriteError;
                    }
                }
                Some(Err(e)) => {
                    tracing::warn!(session = %id, error = %e, "read failed");
                    break Disconnect::ReadError;
                }
                None => break Disconnect::Eof,
            }
        }
    };

    teardown(&session, &state, reason).await;
    reason
}

/// Dispatches one record. Only a failed direct reply is an error; decode
/// failures and unknown kinds are logged and skipped.
async fn handle_record(
    record: &[u8],
    session: &Session,
    state: &AppState,
) -> Result<(), RelayError> {
    if record.iter().all(u8::is_ascii_whitespace) {
        return Ok(());
    }

    let message = match ClientMessage::parse(record) {
        Ok(message) => message,
        Err(e) => {
            tracing::warn!(session = %session.id(), error = %e, "invalid record from client");
            return Ok(());
        }
    };

    let dispatcher = &state.dispatcher;
    match message {
        ClientMessage::Ping { ts } => {
            send_direct(session, &DirectReply::Pong { ts })?;
        }
        ClientMessage::Identify { username } => {
            session.set_display_name(username.clone()).await;
            tracing::info!(session = %session.id(), %username, "player identified");
            if state.config.roster_replay {
                replay_roster(session, state).await?;
            }
            dispatcher.broadcast(ServerEvent::PlayerJoin { username }).await;
        }
        ClientMessage::Chat { message } => {
            let sender = session.sender_name().await;
            dispatcher
                .broadcast(ServerEvent::Chat { sender, message })
                .await;
        }
        ClientMessage::Action { action } => {
            let actor = session.sender_name().await;
            dispatcher
                .broadcast(ServerEvent::ZoneSync {
                    data: ZoneData { actor, action },
                })
                .await;
        }
        ClientMessage::Unknown { kind } => {
            tracing::debug!(session = %session.id(), ?kind, "ignoring unknown message type");
        }
    }
    Ok(())
}

/// Tells a newly identified session about every other identified session.
async fn replay_roster(session: &Session, state: &AppState) -> Result<(), RelayError> {
    for other in state.registry().snapshot().await {
        if other.id() == session.id() {
            continue;
        }
        if let Some(username) = other.display_name().await {
            send_direct(session, &DirectReply::PlayerJoin { username })?;
        }
    }
    Ok(())
}

fn send_direct(session: &Session, reply: &DirectReply) -> Result<(), RelayError> {
    let record = reply.to_record()?;
    session.deliver(Bytes::from(record))
}

async fn teardown(session: &Session, state: &AppState, reason: Disconnect) {
    let id = session.id();
    let username = session.display_name().await;
    if let Some(username) = username.clone() {
        state
            .dispatcher
            .broadcast(ServerEvent::PlayerLeave { username })
            .await;
    }
    let _ = state.registry().unregister(id).await;
    session.close().await;

    let connected_secs = (Utc::now() - session.connected_at()).num_seconds();
    tracing::info!(
        session = %id,
        ?username,
        reason = reason.as_str(),
        connected_secs,
        "client disconnected"
    );
}
