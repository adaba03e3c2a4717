use tokio::signal;
use tracing::{error, warn};

/// Resolve once the process receives Ctrl+C or SIGTERM.
///
/// # Panics
///
/// Panics if a signal handler cannot be installed; the server could not be
/// stopped cleanly otherwise.
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {e}");
            panic!("Critical: cannot install Ctrl+C signal handler");
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {e}");
                panic!("Critical: cannot install SIGTERM signal handler");
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => warn!("Received Ctrl+C, draining in-flight gateway requests"),
        _ = terminate => warn!("Received SIGTERM, draining in-flight gateway requests"),
    }
}
