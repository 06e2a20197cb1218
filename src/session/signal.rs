//! OS signal wiring for session shutdown.

use tokio_util::sync::CancellationToken;
use tracing::info;

/// Completes when the process receives Ctrl-C, or SIGTERM on unix.
#[cfg(unix)]
pub async fn shutdown_signal() {
    use tokio::signal::unix::{signal, SignalKind};

    let ctrl_c = tokio::signal::ctrl_c();
    match signal(SignalKind::terminate()) {
        Ok(mut term) => {
            tokio::select! {
                _ = ctrl_c => info!("received ctrl-c"),
                _ = term.recv() => info!("received SIGTERM"),
            }
        }
        // No SIGTERM handler available; ctrl-c still works.
        Err(_) => {
            let _ = ctrl_c.await;
            info!("received ctrl-c");
        }
    }
}

/// Completes when the process receives Ctrl-C.
#[cfg(not(unix))]
pub async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
    info!("received ctrl-c");
}

/// Cancels the token once a shutdown signal arrives. The watcher task ends
/// with the process; it holds nothing but the token.
pub(crate) fn cancel_on_shutdown(cancel: &CancellationToken) {
    let cancel = cancel.clone();
    tokio::spawn(async move {
        shutdown_signal().await;
        cancel.cancel();
    });
}
