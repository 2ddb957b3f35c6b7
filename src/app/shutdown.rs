//! Graceful shutdown handling.

use log::{info, warn};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Cancels `cancel` when the process receives Ctrl-C.
///
/// The returned task ends on its own once `cancel` fires for any reason.
pub fn cancel_on_ctrl_c(cancel: CancellationToken) -> JoinHandle<()> {
    tokio::spawn(async move {
        tokio::select! {
            signal = tokio::signal::ctrl_c() => {
                match signal {
                    Ok(()) => info!("Received Ctrl-C, shutting down"),
                    Err(e) => warn!("Failed to listen for Ctrl-C: {e}"),
                }
                cancel.cancel();
            }
            _ = cancel.cancelled() => {}
        }
    })
}

/// Stops background tasks after the bridge has returned.
pub async fn shutdown_gracefully(cancel: CancellationToken, signal_task: Option<JoinHandle<()>>) {
    cancel.cancel();
    if let Some(task) = signal_task {
        let _ = task.await;
    }
}
