//! Declared external plugin servers and the ordered store exposing them.
//!
//! A [`ServerDefinition`] is one entry from the gateway configuration: how
//! to reach a plugin server (its socket), how to run it (executable,
//! arguments, environment), and how to ask it which plugins it offers (its
//! info command). The [`DefinitionStore`] holds the definitions exactly as
//! declared, with name synthesis applied to entries that omit one.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use camino::{Utf8Path, Utf8PathBuf};
use serde::{Deserialize, Serialize};

use crate::ConfigError;

/// One declared external plugin server.
///
/// Every field except the name is optional: a definition with no socket is
/// ignored by the supervisor, a definition with no executable describes an
/// externally managed server, and a definition with no info command simply
/// offers no plugins to discovery.
///
/// # Example
///
/// ```
/// use portico_config::ServerDefinition;
///
/// let def = ServerDefinition::new("rate-limiter")
///     .with_socket("/run/portico/rate-limiter.sock")
///     .with_executable("/usr/local/bin/rate-limiter")
///     .with_info_command("/usr/local/bin/rate-limiter --dump-info");
/// assert_eq!(def.name(), "rate-limiter");
/// assert!(def.is_managed());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerDefinition {
    /// Declared name; an empty value is replaced during synthesis.
    #[serde(default)]
    name: String,
    #[serde(default)]
    socket: Option<Utf8PathBuf>,
    #[serde(default)]
    executable: Option<PathBuf>,
    #[serde(default)]
    args: Vec<String>,
    #[serde(default)]
    environment: BTreeMap<String, String>,
    #[serde(default)]
    inherit_environment: bool,
    #[serde(default)]
    info_command: Option<String>,
}

impl ServerDefinition {
    /// Creates a definition with the given name and no other settings.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            socket: None,
            executable: None,
            args: Vec::new(),
            environment: BTreeMap::new(),
            inherit_environment: false,
            info_command: None,
        }
    }

    /// Sets the domain socket path used for the RPC channel.
    #[must_use]
    pub fn with_socket(mut self, socket: impl Into<Utf8PathBuf>) -> Self {
        self.socket = Some(socket.into());
        self
    }

    /// Sets the executable the supervisor spawns for this server.
    #[must_use]
    pub fn with_executable(mut self, executable: impl Into<PathBuf>) -> Self {
        self.executable = Some(executable.into());
        self
    }

    /// Sets the argument vector passed to the executable.
    #[must_use]
    pub fn with_args(mut self, args: Vec<String>) -> Self {
        self.args = args;
        self
    }

    /// Sets the environment mapping for the spawned process.
    #[must_use]
    pub fn with_environment(mut self, environment: BTreeMap<String, String>) -> Self {
        self.environment = environment;
        self
    }

    /// Lets the spawned process inherit the ambient environment instead of
    /// replacing it with the declared mapping.
    #[must_use]
    pub const fn with_inherited_environment(mut self) -> Self {
        self.inherit_environment = true;
        self
    }

    /// Sets the shell command used to discover this server's plugins.
    #[must_use]
    pub fn with_info_command(mut self, command: impl Into<String>) -> Self {
        self.info_command = Some(command.into());
        self
    }

    /// Returns the server name.
    #[must_use]
    pub const fn name(&self) -> &str {
        self.name.as_str()
    }

    /// Returns the configured socket path, if any.
    #[must_use]
    pub fn socket(&self) -> Option<&Utf8Path> {
        self.socket.as_deref()
    }

    /// Returns the configured executable, if any.
    #[must_use]
    pub fn executable(&self) -> Option<&Path> {
        self.executable.as_deref()
    }

    /// Returns the argument vector for the spawned process.
    #[must_use]
    pub fn args(&self) -> &[String] {
        &self.args
    }

    /// Returns the environment mapping for the spawned process.
    #[must_use]
    pub const fn environment(&self) -> &BTreeMap<String, String> {
        &self.environment
    }

    /// Whether the spawned process inherits the ambient environment.
    #[must_use]
    pub const fn inherit_environment(&self) -> bool {
        self.inherit_environment
    }

    /// Returns the discovery command, if any.
    #[must_use]
    pub fn info_command(&self) -> Option<&str> {
        self.info_command.as_deref()
    }

    /// Whether this definition describes a process the gateway spawns and
    /// supervises (both a socket and an executable are declared).
    #[must_use]
    pub const fn is_managed(&self) -> bool {
        self.socket.is_some() && self.executable.is_some()
    }

    /// Replaces an absent name with the positional placeholder.
    fn synthesise_name(&mut self, index: usize) {
        if self.name.trim().is_empty() {
            self.name = format!("plugin server #{index}");
        }
    }
}

/// Ordered list of plugin server definitions with synthesised names.
///
/// The store preserves configuration order, which breaks duplicate-plugin
/// ties during registry construction.
///
/// # Example
///
/// ```
/// use portico_config::{DefinitionStore, ServerDefinition};
///
/// let store = DefinitionStore::new(vec![
///     ServerDefinition::new("auth"),
///     ServerDefinition::new(""),
/// ]);
/// let names: Vec<&str> = store.iter().map(|def| def.name()).collect();
/// assert_eq!(names, ["auth", "plugin server #2"]);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DefinitionStore {
    definitions: Vec<ServerDefinition>,
}

impl DefinitionStore {
    /// Builds a store from declared definitions, synthesising missing names
    /// from each definition's 1-based position.
    #[must_use]
    pub fn new(mut definitions: Vec<ServerDefinition>) -> Self {
        for (position, definition) in definitions.iter_mut().enumerate() {
            definition.synthesise_name(position + 1);
        }
        Self { definitions }
    }

    /// Returns the definitions in declaration order.
    #[must_use]
    pub fn definitions(&self) -> &[ServerDefinition] {
        &self.definitions
    }

    /// Iterates over the definitions in declaration order.
    pub fn iter(&self) -> std::slice::Iter<'_, ServerDefinition> {
        self.definitions.iter()
    }

    /// Returns the number of declared definitions.
    #[must_use]
    pub fn len(&self) -> usize {
        self.definitions.len()
    }

    /// Returns `true` when no plugin servers are declared.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.definitions.is_empty()
    }

    /// Verifies that server names are unique after synthesis.
    ///
    /// The supervisor calls this at start, where a collision is fatal to
    /// the plugin-server feature; registry construction does not.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::DuplicateServerName`] naming the first
    /// colliding definition.
    pub fn ensure_unique_names(&self) -> Result<(), ConfigError> {
        let mut seen = std::collections::HashSet::new();
        for definition in &self.definitions {
            if !seen.insert(definition.name()) {
                return Err(ConfigError::DuplicateServerName {
                    name: definition.name().to_owned(),
                });
            }
        }
        Ok(())
    }
}

impl<'a> IntoIterator for &'a DefinitionStore {
    type Item = &'a ServerDefinition;
    type IntoIter = std::slice::Iter<'a, ServerDefinition>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store_of(names: &[&str]) -> DefinitionStore {
        let definitions = names.iter().map(|name| ServerDefinition::new(*name));
        DefinitionStore::new(definitions.collect())
    }

    #[test]
    fn synthesises_names_for_absent_entries() {
        let store = store_of(&["auth", "", "  "]);
        let names: Vec<&str> = store.iter().map(ServerDefinition::name).collect();
        assert_eq!(names, ["auth", "plugin server #2", "plugin server #3"]);
    }

    #[test]
    fn preserves_declaration_order() {
        let store = store_of(&["b", "a", "c"]);
        let names: Vec<&str> = store.iter().map(ServerDefinition::name).collect();
        assert_eq!(names, ["b", "a", "c"]);
    }

    #[test]
    fn unique_names_pass_validation() {
        let store = store_of(&["auth", "rate-limit"]);
        store.ensure_unique_names().expect("unique names");
    }

    #[test]
    fn duplicate_names_fail_validation() {
        let store = store_of(&["auth", "auth"]);
        let error = store
            .ensure_unique_names()
            .expect_err("duplicate should fail");
        assert!(matches!(
            error,
            crate::ConfigError::DuplicateServerName { name } if name == "auth"
        ));
    }

    #[test]
    fn duplicate_synthesised_names_fail_validation() {
        // A literal "plugin server #2" colliding with a synthesised one.
        let store = DefinitionStore::new(vec![
            ServerDefinition::new("plugin server #2"),
            ServerDefinition::new(""),
        ]);
        store
            .ensure_unique_names()
            .expect_err("synthesised collision should fail");
    }

    #[test]
    fn managed_requires_socket_and_executable() {
        let bare = ServerDefinition::new("bare");
        let socket_only = ServerDefinition::new("socket").with_socket("/run/p.sock");
        let managed = ServerDefinition::new("managed")
            .with_socket("/run/p.sock")
            .with_executable("/usr/bin/p");
        assert!(!bare.is_managed());
        assert!(!socket_only.is_managed());
        assert!(managed.is_managed());
    }

    #[test]
    fn deserialises_with_defaults() {
        let def: ServerDefinition = toml::from_str("name = \"auth\"").expect("decode");
        assert_eq!(def.name(), "auth");
        assert!(def.socket().is_none());
        assert!(def.args().is_empty());
        assert!(!def.inherit_environment());
    }
}
