//! External plugin server supervision and discovery for the Portico gateway.
//!
//! Plugin servers are out-of-process executables declared in the gateway
//! configuration. Each one exposes a set of plugins over an RPC socket and
//! answers a one-shot *info command* describing those plugins. This crate
//! owns the side of that arrangement that runs inside the gateway:
//!
//! - the **discovery client** runs a definition's info command and parses
//!   the plugin metadata it prints;
//! - the **plugin registry** merges discovery results across all declared
//!   servers into a name-keyed, deduplicated table, built once per worker
//!   and cached for the process's life;
//! - the **process supervisor** spawns each managed server, forwards its
//!   merged output to the log, and respawns it whenever it exits, until the
//!   gateway shuts down;
//! - the **leadership gate** restricts supervision to a single worker in a
//!   pool so the shared executables are not spawned once per worker.
//!
//! The RPC protocol spoken over a server's socket once a plugin is selected
//! is out of scope here; this crate stops at knowing which plugins exist and
//! keeping their servers alive.
//!
//! # Example
//!
//! ```
//! use portico_config::{DefinitionStore, ServerDefinition};
//! use portico_plugin_servers::{PluginRegistry, ShellDiscovery};
//!
//! let store = DefinitionStore::new(vec![
//!     ServerDefinition::new("auth").with_socket("/run/portico/auth.sock"),
//! ]);
//! let registry = PluginRegistry::new(store, ShellDiscovery);
//! // No info command declared, so discovery yields an empty registry.
//! assert!(registry.load_plugin("key-auth").is_none());
//! ```

pub mod discovery;
pub mod error;
pub mod forwarder;
pub mod info;
pub mod registry;
pub mod supervisor;
pub mod worker;

#[cfg(test)]
mod tests;

pub use self::discovery::{DiscoveryClient, ShellDiscovery};
pub use self::error::{DiscoveryError, SupervisorError};
pub use self::forwarder::LogForwarder;
pub use self::info::PluginInfo;
pub use self::registry::{PluginRegistry, RegistryEntry};
pub use self::supervisor::{
    ExitReason, ManagedProcess, ProcessState, ShutdownFlag, Supervisor, SupervisorHandle,
};
pub use self::worker::WorkerIdentity;
