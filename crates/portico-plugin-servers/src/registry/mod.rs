//! Merged, deduplicated registry of discovered plugins.
//!
//! The [`PluginRegistry`] aggregates discovery results across every declared
//! server definition into a name-keyed table. The table is built on first
//! access and cached for the remainder of the process's life; re-discovery
//! requires a process restart. Duplicate plugin names are resolved
//! first-writer-wins, with ties broken by definition order.

use std::collections::HashMap;
use std::collections::hash_map::Entry;

use once_cell::sync::OnceCell;
use tracing::{error, info};

use portico_config::{DefinitionStore, ServerDefinition};

use crate::discovery::DiscoveryClient;
use crate::info::PluginInfo;

/// Tracing target for registry construction.
const REGISTRY_TARGET: &str = "portico_plugin_servers::registry";

/// A discovered plugin together with the definition of its owning server.
#[derive(Debug, Clone, PartialEq)]
pub struct RegistryEntry {
    info: PluginInfo,
    server: ServerDefinition,
}

impl RegistryEntry {
    /// Returns the plugin metadata.
    #[must_use]
    pub const fn info(&self) -> &PluginInfo {
        &self.info
    }

    /// Returns the definition of the server that offers this plugin.
    #[must_use]
    pub const fn server(&self) -> &ServerDefinition {
        &self.server
    }
}

/// Name-keyed table of all plugins discovered across all server definitions.
///
/// The registry is cheap to construct; the expensive discovery pass runs
/// once, on the first lookup (or an explicit [`PluginRegistry::build`]),
/// and its result is immutable afterwards. Workers may each build their own
/// copy: construction is idempotent and has no side effects beyond logging.
///
/// # Example
///
/// ```
/// use portico_config::{DefinitionStore, ServerDefinition};
/// use portico_plugin_servers::{DiscoveryClient, DiscoveryError, PluginInfo, PluginRegistry};
///
/// struct FixedDiscovery;
/// impl DiscoveryClient for FixedDiscovery {
///     fn discover(
///         &self,
///         _definition: &ServerDefinition,
///     ) -> Result<Vec<PluginInfo>, DiscoveryError> {
///         Ok(vec![PluginInfo::new("echo", 1000, "1.0")])
///     }
/// }
///
/// let store = DefinitionStore::new(vec![ServerDefinition::new("auth")]);
/// let registry = PluginRegistry::new(store, FixedDiscovery);
/// let entry = registry.load_plugin("echo").expect("registered");
/// assert_eq!(entry.server().name(), "auth");
/// ```
#[derive(Debug)]
pub struct PluginRegistry<D> {
    store: DefinitionStore,
    client: D,
    table: OnceCell<HashMap<String, RegistryEntry>>,
}

impl<D: DiscoveryClient> PluginRegistry<D> {
    /// Creates a registry over the given definitions and discovery client.
    #[must_use]
    pub fn new(store: DefinitionStore, client: D) -> Self {
        Self {
            store,
            client,
            table: OnceCell::new(),
        }
    }

    /// Forces the discovery pass, returning the number of registered
    /// plugins.
    ///
    /// The daemon calls this during its boot phase so every blocking info
    /// command has run before request serving begins.
    pub fn build(&self) -> usize {
        self.table().len()
    }

    /// Looks up a plugin by name, building the registry on first call.
    #[must_use]
    pub fn load_plugin(&self, name: &str) -> Option<&RegistryEntry> {
        self.table().get(name)
    }

    /// Looks up a plugin's declared configuration schema.
    #[must_use]
    pub fn load_schema(&self, name: &str) -> Option<&serde_json::Value> {
        self.load_plugin(name).map(|entry| entry.info().schema())
    }

    /// Returns the registered plugin names in sorted order.
    #[must_use]
    pub fn plugin_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.table().keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Returns the number of registered plugins.
    #[must_use]
    pub fn len(&self) -> usize {
        self.table().len()
    }

    /// Returns `true` when no plugins were discovered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.table().is_empty()
    }

    fn table(&self) -> &HashMap<String, RegistryEntry> {
        self.table
            .get_or_init(|| build_table(&self.store, &self.client))
    }
}

/// Runs discovery over every definition and merges the results.
///
/// A failing definition is logged and skipped; it never aborts discovery of
/// the others. Duplicate names keep the first registration and log both
/// owners.
fn build_table<D: DiscoveryClient>(
    store: &DefinitionStore,
    client: &D,
) -> HashMap<String, RegistryEntry> {
    let mut table: HashMap<String, RegistryEntry> = HashMap::new();
    for definition in store {
        let plugins = match client.discover(definition) {
            Ok(plugins) => plugins,
            Err(discovery_error) => {
                error!(
                    target: REGISTRY_TARGET,
                    server = definition.name(),
                    error = %discovery_error,
                    "plugin discovery failed; skipping server"
                );
                continue;
            }
        };
        for plugin in plugins {
            match table.entry(plugin.name().to_owned()) {
                Entry::Occupied(existing) => {
                    error!(
                        target: REGISTRY_TARGET,
                        plugin = plugin.name(),
                        registered_server = existing.get().server().name(),
                        rejected_server = definition.name(),
                        "duplicate plugin name; keeping first registration"
                    );
                }
                Entry::Vacant(slot) => {
                    info!(
                        target: REGISTRY_TARGET,
                        plugin = plugin.name(),
                        server = definition.name(),
                        priority = plugin.priority(),
                        version = plugin.version(),
                        "registered plugin"
                    );
                    slot.insert(RegistryEntry {
                        info: plugin,
                        server: definition.clone(),
                    });
                }
            }
        }
    }
    table
}

#[cfg(test)]
mod tests;
