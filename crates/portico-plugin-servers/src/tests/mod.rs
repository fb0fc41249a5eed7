//! Shared test doubles for the crate's unit tests.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use portico_config::ServerDefinition;

use crate::discovery::DiscoveryClient;
use crate::error::DiscoveryError;
use crate::info::PluginInfo;

/// Discovery client returning scripted plugin sets per server name.
#[derive(Debug, Default)]
pub(crate) struct ScriptedDiscovery {
    plugins: HashMap<String, Vec<PluginInfo>>,
    failing: HashSet<String>,
    calls: Arc<AtomicUsize>,
}

impl ScriptedDiscovery {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn with_plugins(
        mut self,
        server: impl Into<String>,
        plugins: Vec<PluginInfo>,
    ) -> Self {
        self.plugins.insert(server.into(), plugins);
        self
    }

    pub(crate) fn with_failure(mut self, server: impl Into<String>) -> Self {
        self.failing.insert(server.into());
        self
    }

    /// Shared invocation counter, usable after the client is moved into a
    /// registry.
    pub(crate) fn call_counter(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.calls)
    }
}

impl DiscoveryClient for ScriptedDiscovery {
    fn discover(&self, definition: &ServerDefinition) -> Result<Vec<PluginInfo>, DiscoveryError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let server = definition.name();
        if self.failing.contains(server) {
            return Err(DiscoveryError::Spawn {
                server: server.to_owned(),
                source: Arc::new(std::io::Error::new(
                    std::io::ErrorKind::NotFound,
                    "scripted failure",
                )),
            });
        }
        Ok(self.plugins.get(server).cloned().unwrap_or_default())
    }
}
