//! Cancellation on process termination signals

use std::future::Future;
use std::io;

use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Token cancelled on Ctrl+C, or SIGTERM on unix
pub fn cancel_on_signal() -> CancellationToken {
    let token = CancellationToken::new();
    tokio::spawn(cancel_when(token.clone(), termination_signal()));
    token
}

async fn cancel_when<F>(token: CancellationToken, signal: F)
where
    F: Future<Output = io::Result<&'static str>>,
{
    match signal.await {
        Ok(signal) => {
            info!(signal, "Shutdown signal received, draining requests");
            token.cancel();
        }
        Err(e) => warn!(error = %e, "No signal handler; the server only stops on cancellation"),
    }
}

async fn termination_signal() -> io::Result<&'static str> {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        let mut terminate = signal(SignalKind::terminate())?;
        tokio::select! {
            res = tokio::signal::ctrl_c() => res.map(|()| "ctrl-c"),
            _ = terminate.recv() => Ok("SIGTERM"),
        }
    }

    #[cfg(not(unix))]
    {
        tokio::signal::ctrl_c().await.map(|()| "ctrl-c")
    }
}
