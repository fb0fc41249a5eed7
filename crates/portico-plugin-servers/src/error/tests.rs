//! Unit tests for error display formatting.

use std::sync::Arc;

use portico_config::ConfigError;

use super::{DiscoveryError, SupervisorError};

#[test]
fn spawn_error_names_the_server() {
    let source = Arc::new(std::io::Error::new(std::io::ErrorKind::NotFound, "no sh"));
    let error = DiscoveryError::Spawn {
        server: "auth".into(),
        source,
    };
    let text = error.to_string();
    assert!(text.contains("auth"), "unexpected message: {text}");
    assert!(text.contains("failed to start"), "unexpected message: {text}");
}

#[test]
fn missing_name_reports_record_position() {
    let error = DiscoveryError::MissingName {
        server: "auth".into(),
        index: 3,
    };
    let text = error.to_string();
    assert!(text.contains("record 3"), "unexpected message: {text}");
    assert!(text.contains("'name'"), "unexpected message: {text}");
}

#[test]
fn config_error_converts_into_supervisor_error() {
    let error = SupervisorError::from(ConfigError::DuplicateServerName {
        name: "auth".into(),
    });
    assert!(matches!(error, SupervisorError::Config(_)));
    assert!(error.to_string().contains("duplicate plugin server name"));
}
