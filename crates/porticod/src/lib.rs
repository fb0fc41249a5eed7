//! Bootstrap logic for the Portico gateway daemon.
//!
//! The daemon wires the plugin-server machinery together: it loads
//! configuration, initialises structured telemetry, runs the blocking
//! discovery phase so every declared server's plugins are known before
//! traffic is served, and — on the worker holding the leadership gate —
//! starts the process supervisor. It then parks on the shutdown signal and
//! winds the supervisor down when one arrives.
//!
//! A missing configuration source, a failed discovery, or an unusable
//! supervisor never abort the daemon; the affected feature degrades and the
//! rest keeps running. Only configuration and telemetry failures during
//! bootstrap are fatal, since nothing useful can run without them.

mod bootstrap;
mod cli;
mod shutdown;
mod telemetry;

use std::ffi::OsString;

use clap::Parser;
use thiserror::Error;

pub use bootstrap::{
    BootstrapError, ConfigLoader, Daemon, StaticConfigLoader, SystemConfigLoader, bootstrap_with,
    worker_identity_from_env,
};
pub use cli::DaemonArgs;
pub use shutdown::{ShutdownError, ShutdownSignal, SystemShutdownSignal};
pub use telemetry::{TelemetryError, TelemetryHandle};

/// Errors that abort the daemon.
#[derive(Debug, Error)]
pub enum DaemonError {
    /// The bootstrap sequence failed.
    #[error("failed to bootstrap daemon: {0}")]
    Bootstrap(#[from] BootstrapError),
    /// Waiting for the shutdown signal failed.
    #[error("failed to wait for shutdown: {0}")]
    Shutdown(#[from] ShutdownError),
}

/// Parses arguments, bootstraps the daemon, and runs it to completion.
///
/// # Errors
///
/// Returns a [`DaemonError`] when bootstrap fails or the shutdown signal
/// listener cannot be installed.
pub fn run<I, T>(args: I) -> Result<(), DaemonError>
where
    I: IntoIterator<Item = T>,
    T: Into<OsString> + Clone,
{
    let arguments = DaemonArgs::parse_from(args);
    let loader = SystemConfigLoader::new(arguments.config_path);
    let daemon = bootstrap_with(&loader)?;
    let identity = worker_identity_from_env();
    let signal = SystemShutdownSignal::new();
    daemon.run(identity, &signal)?;
    Ok(())
}
