use std::io;

#[cfg(not(unix))]
use tokio::signal;
#[cfg(unix)]
use tokio::signal::unix::{signal, SignalKind};
use tracing::info;

/// Signal types that can interrupt a run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownSignal {
    /// SIGTERM, e.g. the login node's session ending
    Terminate,
    /// SIGINT - Ctrl+C interactive shutdown
    Interrupt,
    /// SIGHUP - the controlling terminal went away
    Hangup,
}

impl std::fmt::Display for ShutdownSignal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ShutdownSignal::Terminate => write!(f, "SIGTERM"),
            ShutdownSignal::Interrupt => write!(f, "SIGINT"),
            ShutdownSignal::Hangup => write!(f, "SIGHUP"),
        }
    }
}

/// Waits for any shutdown signal and returns which one was received.
///
/// Jobs already handed to the scheduler keep running; the manifest records them, so
/// the next run over the same iteration picks them up.
#[cfg(unix)]
pub async fn wait_for_shutdown_signal() -> io::Result<ShutdownSignal> {
    let mut sigterm = signal(SignalKind::terminate())?;
    let mut sigint = signal(SignalKind::interrupt())?;
    let mut sighup = signal(SignalKind::hangup())?;

    let received = tokio::select! {
        _ = sigterm.recv() => ShutdownSignal::Terminate,
        _ = sigint.recv() => ShutdownSignal::Interrupt,
        _ = sighup.recv() => {
            tracing::warn!("Controlling terminal closed, consider running the orchestrator under nohup or tmux");
            ShutdownSignal::Hangup
        }
    };
    info!("Received shutdown signal: {}", received);
    Ok(received)
}

#[cfg(not(unix))]
pub async fn wait_for_shutdown_signal() -> io::Result<ShutdownSignal> {
    signal::ctrl_c().await?;
    info!("Received shutdown signal: {}", ShutdownSignal::Interrupt);
    Ok(ShutdownSignal::Interrupt)
}
