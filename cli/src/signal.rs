//! SIGINT / SIGTERM → shutdown request.

use flowindex_core::ShutdownToken;

/// Spawn a task that triggers `shutdown` on the first SIGINT or SIGTERM.
///
/// The indexer finishes the block in flight, closes its store and exits.
pub fn spawn_signal_listener(shutdown: ShutdownToken) {
    tokio::spawn(async move {
        wait_for_signal().await;
        tracing::info!("Signal received; requesting shutdown");
        shutdown.trigger();
    });
}

#[cfg(unix)]
async fn wait_for_signal() {
    use tokio::signal::unix::{signal, SignalKind};

    let mut sigterm = match signal(SignalKind::terminate()) {
        Ok(signal) => signal,
        Err(err) => {
            tracing::warn!(error = %err, "failed to install SIGTERM handler");
            let _ = tokio::signal::ctrl_c().await;
            return;
        }
    };
    tokio::select! {
        _ = tokio::signal::ctrl_c() => {},
        _ = sigterm.recv() => {},
    }
}

#[cfg(not(unix))]
async fn wait_for_signal() {
    let _ = tokio::signal::ctrl_c().await;
}
