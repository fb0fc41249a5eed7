//! Domain errors raised by discovery and supervision.
//!
//! All errors use `thiserror`-derived enums with structured context so
//! callers can inspect the failure programmatically. None of them abort the
//! gateway: discovery failures are logged and the affected server's plugins
//! are skipped, while supervisor failures disable the plugin-server feature
//! for this process and nothing else. I/O errors are wrapped in `Arc` to
//! keep the enums small.

use std::sync::Arc;

use thiserror::Error;

use portico_config::ConfigError;

/// Errors arising while discovering a server's plugins.
#[derive(Debug, Error)]
pub enum DiscoveryError {
    /// The info command could not be started.
    #[error("info command for server '{server}' failed to start: {source}")]
    Spawn {
        /// Owning server name.
        server: String,
        /// Underlying I/O error.
        #[source]
        source: Arc<std::io::Error>,
    },

    /// The info command's output stream could not be read.
    #[error("failed to read info command output for server '{server}': {source}")]
    Io {
        /// Owning server name.
        server: String,
        /// Underlying I/O error.
        #[source]
        source: Arc<std::io::Error>,
    },

    /// The captured output did not decode as a list of plugin records.
    #[error("info command output for server '{server}' is invalid: {message}")]
    InvalidOutput {
        /// Owning server name.
        server: String,
        /// Description of the decode failure.
        message: String,
        /// Optional underlying JSON error.
        #[source]
        source: Option<serde_json::Error>,
    },

    /// A plugin record omitted the required `name` field.
    #[error("plugin record {index} from server '{server}' is missing required field 'name'")]
    MissingName {
        /// Owning server name.
        server: String,
        /// Zero-based position of the offending record.
        index: usize,
    },
}

/// Errors arising while starting the process supervisor.
#[derive(Debug, Error)]
pub enum SupervisorError {
    /// A supervisor is already running in this process.
    #[error("plugin server supervisor already started in this process")]
    AlreadyStarted,

    /// The declared server definitions are invalid.
    #[error("invalid plugin server configuration: {0}")]
    Config(#[from] ConfigError),
}

#[cfg(test)]
mod tests;
