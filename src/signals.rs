//! Termination signal handling.
//!
//! The first SIGINT/SIGTERM cancels the returned token so every long-running
//! component can wind down. A second signal terminates the process
//! immediately with exit code 1.

use std::sync::atomic::{AtomicBool, Ordering};

use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::error::{Error, Result};

static INSTALLED: AtomicBool = AtomicBool::new(false);

/// Install the process signal handler and return the shutdown token.
///
/// Must be called from within a Tokio runtime, and at most once per process.
pub fn setup_signal_handler() -> Result<CancellationToken> {
    if INSTALLED.swap(true, Ordering::SeqCst) {
        return Err(Error::SignalHandler(
            "signal handler already installed".to_string(),
        ));
    }

    let handle = tokio::runtime::Handle::try_current()
        .map_err(|e| Error::SignalHandler(format!("no async runtime: {}", e)))?;

    let token = CancellationToken::new();
    let stop = token.clone();
    handle.spawn(async move {
        if let Err(e) = shutdown_signal().await {
            warn!(error = %e, "Failed to listen for termination signals");
            return;
        }
        info!("Received shutdown signal, initiating graceful shutdown...");
        stop.cancel();

        if shutdown_signal().await.is_ok() {
            warn!("Received second shutdown signal, exiting immediately");
            #[allow(clippy::exit)]
            std::process::exit(1);
        }
    });

    Ok(token)
}

/// Wait for SIGTERM or SIGINT
async fn shutdown_signal() -> std::io::Result<()> {
    #[cfg(unix)]
    {
        let mut terminate = signal::unix::signal(signal::unix::SignalKind::terminate())?;
        tokio::select! {
            result = signal::ctrl_c() => result,
            _ = terminate.recv() => Ok(()),
        }
    }

    #[cfg(not(unix))]
    {
        signal::ctrl_c().await
    }
}
