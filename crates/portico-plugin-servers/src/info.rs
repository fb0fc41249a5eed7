//! Plugin metadata returned by a server's info command.

use serde::{Deserialize, Serialize};

/// One plugin record from a discovery document.
///
/// The `schema` value is an opaque structure describing the plugin's
/// configuration surface; it is carried through the registry verbatim and
/// interpreted elsewhere.
///
/// # Example
///
/// ```
/// use portico_plugin_servers::PluginInfo;
///
/// let info: PluginInfo = serde_json::from_str(
///     r#"{"name":"echo","priority":1000,"version":"1.0","schema":{"fields":[]}}"#,
/// ).expect("decode");
/// assert_eq!(info.name(), "echo");
/// assert_eq!(info.priority(), 1000);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PluginInfo {
    name: String,
    #[serde(default)]
    priority: i64,
    #[serde(default)]
    version: String,
    #[serde(default)]
    schema: serde_json::Value,
}

impl PluginInfo {
    /// Creates a record with an empty schema.
    #[must_use]
    pub fn new(name: impl Into<String>, priority: i64, version: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            priority,
            version: version.into(),
            schema: serde_json::Value::Null,
        }
    }

    /// Attaches the declared configuration schema.
    #[must_use]
    pub fn with_schema(mut self, schema: serde_json::Value) -> Self {
        self.schema = schema;
        self
    }

    /// Returns the plugin name, unique across the whole registry.
    #[must_use]
    pub const fn name(&self) -> &str {
        self.name.as_str()
    }

    /// Returns the phase-ordering priority (opaque to this crate).
    #[must_use]
    pub const fn priority(&self) -> i64 {
        self.priority
    }

    /// Returns the plugin version string.
    #[must_use]
    pub const fn version(&self) -> &str {
        self.version.as_str()
    }

    /// Returns the declared configuration schema, verbatim.
    #[must_use]
    pub const fn schema(&self) -> &serde_json::Value {
        &self.schema
    }
}
