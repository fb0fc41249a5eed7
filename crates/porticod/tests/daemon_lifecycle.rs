//! Full daemon lifecycle driven synchronously through test collaborators.

#![cfg(unix)]

use std::fs;
use std::os::unix::fs::PermissionsExt;

use tempfile::TempDir;

use portico_config::{Config, ServerDefinition};
use portico_plugin_servers::WorkerIdentity;
use porticod::{ShutdownError, ShutdownSignal, StaticConfigLoader, bootstrap_with};

/// Signal double that lets the daemon fall straight through to shutdown.
struct ImmediateShutdown;

impl ShutdownSignal for ImmediateShutdown {
    fn wait(&self) -> Result<(), ShutdownError> {
        Ok(())
    }
}

fn script(dir: &TempDir, name: &str, body: &str) -> std::path::PathBuf {
    let path = dir.path().join(name);
    fs::write(&path, format!("#!/bin/sh\n{body}\n")).expect("write script");
    let mut permissions = fs::metadata(&path).expect("stat script").permissions();
    permissions.set_mode(0o755);
    fs::set_permissions(&path, permissions).expect("chmod script");
    path
}

#[test]
fn supervising_worker_completes_a_full_lifecycle() {
    let dir = TempDir::new().expect("tempdir");
    let server = script(&dir, "echo-server", "exit 0");
    let config = Config {
        plugin_servers: vec![
            ServerDefinition::new("echo-server")
                .with_socket("/tmp/porticod-test-echo.sock")
                .with_executable(server)
                .with_info_command(
                    r#"echo '[{"name":"echo","priority":1000,"version":"1.0"}]'"#,
                ),
        ],
        ..Config::default()
    };

    let daemon = bootstrap_with(&StaticConfigLoader::new(config)).expect("bootstrap");
    assert_eq!(daemon.registry().build(), 1);
    assert!(daemon.registry().load_plugin("echo").is_some());

    daemon
        .run(WorkerIdentity::new(0), &ImmediateShutdown)
        .expect("run to completion");
}

#[test]
fn non_supervising_worker_still_builds_the_registry() {
    let config = Config {
        plugin_servers: vec![
            ServerDefinition::new("quiet")
                .with_info_command(r#"echo '[{"name":"cors","priority":2000,"version":"1.0"}]'"#),
        ],
        ..Config::default()
    };

    let daemon = bootstrap_with(&StaticConfigLoader::new(config)).expect("bootstrap");
    assert!(daemon.registry().load_plugin("cors").is_some());

    // Ordinal 1 is behind the leadership gate: no supervisor is started,
    // so this runs to completion even if a sibling test holds the
    // process-wide supervision slot.
    daemon
        .run(WorkerIdentity::new(1), &ImmediateShutdown)
        .expect("run to completion");
}
