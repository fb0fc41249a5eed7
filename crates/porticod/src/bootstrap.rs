//! Daemon bootstrap orchestration.
//!
//! Bootstrap is strictly ordered: configuration first, telemetry second
//! (so every later failure is visible in the structured log), then the
//! plugin registry. The blocking discovery phase and the supervisor are
//! deferred to [`Daemon::run`], which is also where the leadership gate is
//! applied.

use std::env;
use std::ffi::OsStr;
use std::path::PathBuf;

use thiserror::Error;
use tracing::{error, info, warn};

use portico_config::{Config, ConfigError};
use portico_plugin_servers::{PluginRegistry, ShellDiscovery, Supervisor, WorkerIdentity};

use crate::shutdown::{ShutdownError, ShutdownSignal};
use crate::telemetry::{self, TelemetryError, TelemetryHandle};

/// Tracing target for bootstrap and runtime wiring records.
const BOOTSTRAP_TARGET: &str = "porticod::bootstrap";

/// Environment variable naming the configuration document.
const CONFIG_ENV_VAR: &str = "PORTICO_CONFIG";

/// Environment variable carrying this worker's pool ordinal.
const WORKER_ORDINAL_ENV_VAR: &str = "PORTICO_WORKER_ORDINAL";

/// Trait abstracting configuration loading for testability.
pub trait ConfigLoader: Send + Sync {
    /// Loads the daemon configuration.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] when a configured source exists but
    /// cannot be read or decoded.
    fn load(&self) -> Result<Config, ConfigError>;
}

/// Loader resolving the configuration path from the CLI or environment.
#[derive(Debug, Default, Clone)]
pub struct SystemConfigLoader {
    path: Option<PathBuf>,
}

impl SystemConfigLoader {
    /// Creates a loader preferring the given path over `PORTICO_CONFIG`.
    #[must_use]
    pub const fn new(path: Option<PathBuf>) -> Self {
        Self { path }
    }

    fn resolved_path(&self) -> Option<PathBuf> {
        self.path
            .clone()
            .or_else(|| env::var_os(CONFIG_ENV_VAR).map(PathBuf::from))
    }
}

impl ConfigLoader for SystemConfigLoader {
    fn load(&self) -> Result<Config, ConfigError> {
        Config::load(self.resolved_path().as_deref())
    }
}

/// Loader returning a pre-built configuration, for tests and embedding.
#[derive(Debug, Clone)]
pub struct StaticConfigLoader {
    config: Config,
}

impl StaticConfigLoader {
    /// Wraps the given configuration.
    #[must_use]
    pub const fn new(config: Config) -> Self {
        Self { config }
    }
}

impl ConfigLoader for StaticConfigLoader {
    fn load(&self) -> Result<Config, ConfigError> {
        Ok(self.config.clone())
    }
}

/// Errors surfaced during bootstrap.
#[derive(Debug, Error)]
pub enum BootstrapError {
    /// Configuration failed to load.
    #[error("failed to load configuration: {source}")]
    Configuration {
        /// Underlying loader error.
        #[source]
        source: ConfigError,
    },
    /// Telemetry initialisation failed.
    #[error("failed to initialise telemetry: {source}")]
    Telemetry {
        /// Underlying telemetry error.
        #[source]
        source: TelemetryError,
    },
}

/// Result of a successful bootstrap invocation.
pub struct Daemon {
    config: Config,
    registry: PluginRegistry<ShellDiscovery>,
    telemetry: TelemetryHandle,
}

impl Daemon {
    /// Accessor for the resolved configuration.
    #[must_use]
    pub const fn config(&self) -> &Config {
        &self.config
    }

    /// Accessor for the plugin registry.
    #[must_use]
    pub const fn registry(&self) -> &PluginRegistry<ShellDiscovery> {
        &self.registry
    }

    /// Accessor for the telemetry handle, primarily useful for testing.
    #[must_use]
    pub const fn telemetry(&self) -> TelemetryHandle {
        self.telemetry
    }

    /// Runs the daemon until the shutdown signal fires.
    ///
    /// The discovery phase runs first: every declared server's info
    /// command executes to completion here, before any request serving
    /// would begin, because discovery is the one part of this machinery
    /// allowed to block. Supervision then starts on the worker holding
    /// the leadership gate; every other worker records that it skipped.
    ///
    /// # Errors
    ///
    /// Returns a [`ShutdownError`] when the shutdown listener cannot be
    /// installed; the supervisor is wound down first regardless.
    pub fn run(
        self,
        identity: WorkerIdentity,
        signal: &dyn ShutdownSignal,
    ) -> Result<(), ShutdownError> {
        let plugins = self.registry.build();
        info!(
            target: BOOTSTRAP_TARGET,
            plugins,
            "plugin discovery phase complete"
        );

        let supervisor = if identity.is_supervisor_eligible() {
            match Supervisor::new(self.config.definition_store()).start() {
                Ok(handle) => Some(handle),
                Err(supervisor_error) => {
                    error!(
                        target: BOOTSTRAP_TARGET,
                        error = %supervisor_error,
                        "plugin server supervision unavailable"
                    );
                    None
                }
            }
        } else {
            warn!(
                target: BOOTSTRAP_TARGET,
                ordinal = identity.ordinal(),
                "not the supervising worker; plugin server supervision skipped"
            );
            None
        };

        let outcome = signal.wait();
        if let Some(handle) = supervisor {
            handle.stop();
        }
        outcome
    }
}

/// Bootstraps the daemon using the supplied configuration loader.
///
/// # Errors
///
/// Returns a [`BootstrapError`] when configuration loading or telemetry
/// initialisation fails; both are prerequisites for everything else the
/// daemon does.
pub fn bootstrap_with(loader: &dyn ConfigLoader) -> Result<Daemon, BootstrapError> {
    let config = loader
        .load()
        .map_err(|source| BootstrapError::Configuration { source })?;
    let telemetry = telemetry::initialise(&config)
        .map_err(|source| BootstrapError::Telemetry { source })?;
    let registry = PluginRegistry::new(config.definition_store(), ShellDiscovery);
    info!(
        target: BOOTSTRAP_TARGET,
        plugin_servers = config.plugin_servers.len(),
        "daemon bootstrap complete"
    );
    Ok(Daemon {
        config,
        registry,
        telemetry,
    })
}

/// Derives this worker's identity from the environment.
///
/// An absent ordinal means a single-worker deployment, which supervises by
/// definition; an unparseable one is logged and treated the same way.
#[must_use]
pub fn worker_identity_from_env() -> WorkerIdentity {
    let raw = env::var_os(WORKER_ORDINAL_ENV_VAR);
    let Some(value) = raw.as_deref() else {
        return WorkerIdentity::new(0);
    };
    parse_worker_ordinal(value).map_or_else(
        || {
            warn!(
                target: BOOTSTRAP_TARGET,
                value = ?value,
                "unparseable worker ordinal; assuming 0"
            );
            WorkerIdentity::new(0)
        },
        WorkerIdentity::new,
    )
}

fn parse_worker_ordinal(raw: &OsStr) -> Option<u32> {
    raw.to_str()?.trim().parse().ok()
}

#[cfg(test)]
mod tests {
    use std::ffi::OsStr;
    use std::fs;

    use rstest::rstest;
    use tempfile::TempDir;

    use portico_config::Config;

    use super::{
        ConfigLoader, StaticConfigLoader, SystemConfigLoader, bootstrap_with, parse_worker_ordinal,
    };

    #[test]
    fn static_loader_returns_its_config() {
        let config = Config {
            log_filter: String::from("debug"),
            ..Config::default()
        };
        let loaded = StaticConfigLoader::new(config.clone())
            .load()
            .expect("load");
        assert_eq!(loaded, config);
    }

    #[test]
    fn system_loader_reads_the_given_path() {
        let dir = TempDir::new().expect("tempdir");
        let path = dir.path().join("portico.toml");
        fs::write(&path, "log_filter = \"warn\"\n").expect("write config");
        let loaded = SystemConfigLoader::new(Some(path)).load().expect("load");
        assert_eq!(loaded.log_filter, "warn");
    }

    #[test]
    fn bootstrap_builds_a_daemon_with_an_unbuilt_registry() {
        let loader = StaticConfigLoader::new(Config::default());
        let daemon = bootstrap_with(&loader).expect("bootstrap");
        assert!(daemon.config().plugin_servers.is_empty());
        assert!(daemon.registry().is_empty());
    }

    #[rstest]
    #[case::plain("3", Some(3))]
    #[case::zero("0", Some(0))]
    #[case::padded(" 7 ", Some(7))]
    #[case::negative("-1", None)]
    #[case::word("leader", None)]
    fn worker_ordinals_parse_strictly(#[case] raw: &str, #[case] expected: Option<u32>) {
        assert_eq!(parse_worker_ordinal(OsStr::new(raw)), expected);
    }
}
