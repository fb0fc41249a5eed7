//! Plugin discovery via a server definition's info command.
//!
//! Discovery is a one-shot query: the declared shell command is run to
//! completion, its standard output captured, and the output decoded as a
//! JSON array of plugin records. It is synchronous by design and runs only
//! during the gateway's boot phase, before request serving begins.

use std::process::{Command, Stdio};
use std::sync::Arc;

use tracing::{debug, info, warn};

use portico_config::ServerDefinition;

use crate::error::DiscoveryError;
use crate::info::PluginInfo;

/// Tracing target for discovery operations.
const DISCOVERY_TARGET: &str = "portico_plugin_servers::discovery";

/// Trait abstracting discovery for testability.
///
/// The production implementation is [`ShellDiscovery`]; test code can
/// implement this trait to return scripted plugin sets without running real
/// commands.
///
/// # Example
///
/// ```
/// use portico_config::ServerDefinition;
/// use portico_plugin_servers::{DiscoveryClient, DiscoveryError, PluginInfo};
///
/// struct FixedDiscovery;
///
/// impl DiscoveryClient for FixedDiscovery {
///     fn discover(
///         &self,
///         _definition: &ServerDefinition,
///     ) -> Result<Vec<PluginInfo>, DiscoveryError> {
///         Ok(vec![PluginInfo::new("echo", 1000, "1.0")])
///     }
/// }
/// ```
pub trait DiscoveryClient {
    /// Runs discovery for one server definition.
    ///
    /// A definition without an info command yields an empty sequence, not
    /// an error.
    ///
    /// # Errors
    ///
    /// Returns a [`DiscoveryError`] when the command cannot be started or
    /// its output does not decode as a list of plugin records.
    fn discover(&self, definition: &ServerDefinition) -> Result<Vec<PluginInfo>, DiscoveryError>;
}

/// Discovery client that executes info commands through `sh -c`.
#[derive(Debug, Default, Clone, Copy)]
pub struct ShellDiscovery;

impl DiscoveryClient for ShellDiscovery {
    fn discover(&self, definition: &ServerDefinition) -> Result<Vec<PluginInfo>, DiscoveryError> {
        let server = definition.name();
        let Some(command) = definition.info_command() else {
            info!(
                target: DISCOVERY_TARGET,
                server,
                "no info command declared; server offers no plugins"
            );
            return Ok(Vec::new());
        };

        debug!(target: DISCOVERY_TARGET, server, command, "running info command");
        let output = Command::new("sh")
            .arg("-c")
            .arg(command)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .map_err(|source| DiscoveryError::Spawn {
                server: server.to_owned(),
                source: Arc::new(source),
            })?;

        let stderr = String::from_utf8_lossy(&output.stderr);
        if !stderr.trim().is_empty() {
            debug!(
                target: DISCOVERY_TARGET,
                server,
                stderr = %stderr.trim(),
                "info command stderr output"
            );
        }
        if !output.status.success() {
            // The contract is the stdout document; a failing status is
            // reported but the document still gets a chance to decode.
            warn!(
                target: DISCOVERY_TARGET,
                server,
                status = ?output.status.code(),
                "info command exited with non-zero status"
            );
        }

        let document = String::from_utf8_lossy(&output.stdout);
        parse_info_document(server, &document)
    }
}

/// Decodes a discovery document into plugin records.
///
/// The document must be a JSON array; each element must be a record with at
/// least a string `name`. The `schema` value of each record is carried
/// through untouched.
fn parse_info_document(server: &str, document: &str) -> Result<Vec<PluginInfo>, DiscoveryError> {
    let value: serde_json::Value =
        serde_json::from_str(document).map_err(|source| DiscoveryError::InvalidOutput {
            server: server.to_owned(),
            message: String::from("output is not valid JSON"),
            source: Some(source),
        })?;

    let serde_json::Value::Array(records) = value else {
        return Err(DiscoveryError::InvalidOutput {
            server: server.to_owned(),
            message: String::from("output is not a list of plugin records"),
            source: None,
        });
    };

    let mut plugins = Vec::with_capacity(records.len());
    for (index, record) in records.into_iter().enumerate() {
        if !record.is_object() {
            return Err(DiscoveryError::InvalidOutput {
                server: server.to_owned(),
                message: format!("element {index} is not a plugin record"),
                source: None,
            });
        }
        if record.get("name").and_then(serde_json::Value::as_str).is_none() {
            return Err(DiscoveryError::MissingName {
                server: server.to_owned(),
                index,
            });
        }
        let info: PluginInfo =
            serde_json::from_value(record).map_err(|source| DiscoveryError::InvalidOutput {
                server: server.to_owned(),
                message: format!("plugin record {index} does not decode"),
                source: Some(source),
            })?;
        plugins.push(info);
    }
    Ok(plugins)
}
