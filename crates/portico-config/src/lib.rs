//! Configuration types shared by the Portico gateway binaries.
//!
//! The gateway reads a single TOML document describing its logging surface
//! and the external plugin servers it should discover and supervise. This
//! crate owns the document's shape, the loader, and the
//! [`DefinitionStore`] exposing declared plugin servers to the rest of the
//! workspace.
//!
//! The absence of a configuration source is not an error: the gateway then
//! runs with an empty definition list and the plugin-server feature becomes
//! a no-op.

mod definition;
mod logging;

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use self::definition::{DefinitionStore, ServerDefinition};
pub use self::logging::{LogFormat, LogFormatParseError};

/// Default log filter expression used by the binaries.
pub const DEFAULT_LOG_FILTER: &str = "info";

/// Owned log filter value used where allocation is required (e.g. serde).
#[must_use]
pub fn default_log_filter_string() -> String {
    DEFAULT_LOG_FILTER.to_owned()
}

/// Errors raised while loading or validating gateway configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The configuration file could not be read.
    #[error("failed to read configuration at {path}: {source}")]
    Io {
        /// Path that was being read.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The configuration document did not decode.
    #[error("failed to parse configuration at {path}: {source}")]
    Parse {
        /// Path that was being parsed.
        path: PathBuf,
        /// Underlying TOML decode error.
        #[source]
        source: Box<toml::de::Error>,
    },

    /// Two plugin server definitions share a name after synthesis.
    #[error("duplicate plugin server name '{name}'")]
    DuplicateServerName {
        /// The colliding server name.
        name: String,
    },
}

/// Resolved gateway configuration.
///
/// Fields carry serde defaults so a partial document, or no document at
/// all, yields a usable configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Filter expression handed to the tracing subscriber.
    #[serde(default = "default_log_filter_string")]
    pub log_filter: String,
    /// Output format for structured logs.
    #[serde(default)]
    pub log_format: LogFormat,
    /// Declared external plugin servers, in document order.
    #[serde(default)]
    pub plugin_servers: Vec<ServerDefinition>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            log_filter: default_log_filter_string(),
            log_format: LogFormat::default(),
            plugin_servers: Vec::new(),
        }
    }
}

impl Config {
    /// Loads configuration from an optional source path.
    ///
    /// `None` means no configuration source is configured, which yields the
    /// defaults (and an empty plugin server list) rather than an error.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Io`] when the file cannot be read and
    /// [`ConfigError::Parse`] when it does not decode as a configuration
    /// document.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        path.map_or_else(|| Ok(Self::default()), Self::load_file)
    }

    /// Loads configuration from a TOML file on disk.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Io`] when the file cannot be read and
    /// [`ConfigError::Parse`] when it does not decode.
    pub fn load_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&contents).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source: Box::new(source),
        })
    }

    /// Builds the definition store for the declared plugin servers.
    ///
    /// Name synthesis is applied here; the returned store is the ordered
    /// list the discovery and supervision layers consume.
    #[must_use]
    pub fn definition_store(&self) -> DefinitionStore {
        DefinitionStore::new(self.plugin_servers.clone())
    }
}
