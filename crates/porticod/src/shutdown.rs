//! Shutdown signal handling for the daemon.

use std::io;

use signal_hook::consts::signal::{SIGINT, SIGQUIT, SIGTERM};
use signal_hook::iterator::Signals;
use thiserror::Error;
use tracing::info;

/// Tracing target for daemon lifecycle records.
const DAEMON_TARGET: &str = "porticod::shutdown";

/// Abstraction over shutdown notification mechanisms.
///
/// The production implementation parks on POSIX termination signals; test
/// implementations can return immediately to drive the daemon through a
/// full lifecycle synchronously.
pub trait ShutdownSignal {
    /// Blocks until shutdown should proceed.
    ///
    /// # Errors
    ///
    /// Returns a [`ShutdownError`] when the notification mechanism cannot
    /// be installed.
    fn wait(&self) -> Result<(), ShutdownError>;
}

/// Errors reported by shutdown signal listeners.
#[derive(Debug, Error)]
pub enum ShutdownError {
    /// Installing signal handlers failed.
    #[error("failed to install signal handlers: {source}")]
    Install {
        /// Underlying IO error.
        #[source]
        source: io::Error,
    },
}

/// Shutdown listener that waits for termination signals.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemShutdownSignal;

impl SystemShutdownSignal {
    /// Creates the listener; handlers are installed on [`Self::wait`].
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

impl ShutdownSignal for SystemShutdownSignal {
    fn wait(&self) -> Result<(), ShutdownError> {
        let mut signals = Signals::new([SIGTERM, SIGINT, SIGQUIT])
            .map_err(|source| ShutdownError::Install { source })?;
        if let Some(signal) = signals.forever().next() {
            info!(target: DAEMON_TARGET, signal, "shutdown signal received");
        }
        Ok(())
    }
}
