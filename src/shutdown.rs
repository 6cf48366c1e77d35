//! OS signal handling.

use std::fmt;

/// Signal that ended the process.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Signal {
    /// SIGINT / Ctrl-C.
    Interrupt,
    /// SIGTERM.
    Terminate,
}

impl fmt::Display for Signal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Interrupt => f.write_str("interrupt"),
            Self::Terminate => f.write_str("terminated"),
        }
    }
}

/// Waits for SIGINT or SIGTERM and returns which one arrived.
///
/// # Errors
///
/// Returns the I/O error if a signal handler cannot be installed.
#[cfg(unix)]
pub async fn wait_for_signal() -> std::io::Result<Signal> {
    use tokio::signal::unix::{SignalKind, signal};

    let mut terminate = signal(SignalKind::terminate())?;
    tokio::select! {
        result = tokio::signal::ctrl_c() => result.map(|()| Signal::Interrupt),
        _ = terminate.recv() => Ok(Signal::Terminate),
    }
}

/// Waits for Ctrl-C.
///
/// # Errors
///
/// Returns the I/O error if the handler cannot be installed.
#[cfg(not(unix))]
pub async fn wait_for_signal() -> std::io::Result<Signal> {
    tokio::signal::ctrl_c().await.map(|()| Signal::Interrupt)
}
