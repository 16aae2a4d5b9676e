//! TCP accept loop with graceful shutdown.

use std::time::Duration;

use tokio::net::TcpListener;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

use super::connection::{Disconnect, run_connection};
use crate::app_state::AppState;

/// Pause after a failed `accept` (e.g. file descriptor exhaustion).
const ACCEPT_BACKOFF: Duration = Duration::from_millis(100);

/// Accepts connections until `shutdown` is cancelled, then waits for every
/// connection task to finish its teardown.
///
/// Each accepted connection runs [`run_connection`] in its own task with a
/// child of `shutdown`, so cancelling it unwinds every connection through
/// the normal leave/unregister/close path. Tasks still running after
/// `config.shutdown_timeout` are aborted.
pub async fn serve(listener: TcpListener, state: AppState, shutdown: CancellationToken) {
    let mut tasks: JoinSet<Disconnect> = JoinSet::new();

    loop {
        tokio::select! {
            () = shutdown.cancelled() => break,
            accepted = listener.accept() => match accepted {
                Ok((stream, peer)) => {
                    if let Err(e) = stream.set_nodelay(true) {
                        tracing::debug!(%peer, error = %e, "failed to set TCP_NODELAY");
                    }
                    tasks.spawn(run_connection(
                        stream,
                        Some(peer),
                        state.clone(),
                        shutdown.child_token(),
                    ));
                }
                Err(e) => {
                    tracing::warn!(error = %e, "accept failed");
                    tokio::time::sleep(ACCEPT_BACKOFF).await;
                }
            },
            Some(joined) = tasks.join_next(), if !tasks.is_empty() => {
                if let Err(e) = joined {
                    tracing::error!(error = %e, "connection task failed");
                }
            }
        }
    }

    drop(listener);
    drain(&mut tasks, state.config.shutdown_timeout).await;
}

async fn drain(tasks: &mut JoinSet<Disconnect>, timeout: Duration) {
    tracing::info!(
        task_count = tasks.len(),
        timeout_secs = timeout.as_secs(),
        "waiting for connections to close"
    );

    let all_done = async {
        while let Some(joined) = tasks.join_next().await {
            if let Err(e) = joined {
                tracing::error!(error = %e, "connection task failed");
            }
        }
    };
    if tokio::time::timeout(timeout, all_done).await.is_err() {
        tracing::warn!(
            remaining = tasks.len(),
            "shutdown timed out, aborting remaining connections"
        );
        tasks.abort_all();
    }
}
