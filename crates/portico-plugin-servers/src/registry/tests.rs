//! Unit tests for registry construction and lookup.

use rstest::{fixture, rstest};

use portico_config::{DefinitionStore, ServerDefinition};

use super::PluginRegistry;
use crate::info::PluginInfo;
use crate::tests::ScriptedDiscovery;

fn store_of(names: &[&str]) -> DefinitionStore {
    let definitions = names.iter().map(|name| ServerDefinition::new(*name));
    DefinitionStore::new(definitions.collect())
}

#[fixture]
fn two_server_registry() -> PluginRegistry<ScriptedDiscovery> {
    let client = ScriptedDiscovery::new()
        .with_plugins(
            "auth",
            vec![
                PluginInfo::new("key-auth", 1250, "0.3"),
                PluginInfo::new("jwt", 1400, "1.1"),
            ],
        )
        .with_plugins(
            "traffic",
            vec![
                PluginInfo::new("rate-limit", 900, "2.0"),
                PluginInfo::new("proxy-cache", 100, "0.9"),
            ],
        );
    PluginRegistry::new(store_of(&["auth", "traffic"]), client)
}

// ---------------------------------------------------------------------------
// Union and lookup
// ---------------------------------------------------------------------------

#[rstest]
fn registry_is_the_union_of_all_discoveries(two_server_registry: PluginRegistry<ScriptedDiscovery>) {
    assert_eq!(
        two_server_registry.plugin_names(),
        ["jwt", "key-auth", "proxy-cache", "rate-limit"]
    );
    for name in ["key-auth", "jwt", "rate-limit", "proxy-cache"] {
        assert!(
            two_server_registry.load_plugin(name).is_some(),
            "missing {name}"
        );
    }
}

#[rstest]
fn entries_reference_their_owning_server(two_server_registry: PluginRegistry<ScriptedDiscovery>) {
    let entry = two_server_registry
        .load_plugin("rate-limit")
        .expect("registered");
    assert_eq!(entry.server().name(), "traffic");
    assert_eq!(entry.info().priority(), 900);
}

#[rstest]
fn unknown_plugin_is_absent(two_server_registry: PluginRegistry<ScriptedDiscovery>) {
    assert!(two_server_registry.load_plugin("nonexistent").is_none());
    assert!(two_server_registry.load_schema("nonexistent").is_none());
}

#[test]
fn load_schema_projects_the_entry() {
    let schema = serde_json::json!({"fields": [{"window": {"type": "integer"}}]});
    let client = ScriptedDiscovery::new().with_plugins(
        "auth",
        vec![PluginInfo::new("echo", 1000, "1.0").with_schema(schema.clone())],
    );
    let registry = PluginRegistry::new(store_of(&["auth"]), client);
    assert_eq!(registry.load_schema("echo"), Some(&schema));
}

// ---------------------------------------------------------------------------
// Duplicate policy
// ---------------------------------------------------------------------------

#[test]
fn first_registration_wins_on_duplicate_names() {
    let client = ScriptedDiscovery::new()
        .with_plugins("first", vec![PluginInfo::new("rate-limit", 900, "2.0")])
        .with_plugins("second", vec![PluginInfo::new("rate-limit", 901, "3.0")]);
    let registry = PluginRegistry::new(store_of(&["first", "second"]), client);

    assert_eq!(registry.len(), 1);
    let entry = registry.load_plugin("rate-limit").expect("registered");
    assert_eq!(entry.server().name(), "first");
    assert_eq!(entry.info().version(), "2.0");
}

// ---------------------------------------------------------------------------
// Partial failure
// ---------------------------------------------------------------------------

#[test]
fn failed_discovery_skips_only_that_server() {
    let client = ScriptedDiscovery::new()
        .with_failure("broken")
        .with_plugins("healthy", vec![PluginInfo::new("cors", 2000, "1.0")]);
    let registry = PluginRegistry::new(store_of(&["broken", "healthy"]), client);

    assert_eq!(registry.plugin_names(), ["cors"]);
}

#[test]
fn empty_store_builds_an_empty_registry() {
    let registry = PluginRegistry::new(DefinitionStore::default(), ScriptedDiscovery::new());
    assert_eq!(registry.build(), 0);
    assert!(registry.is_empty());
}

// ---------------------------------------------------------------------------
// Memoization
// ---------------------------------------------------------------------------

#[test]
fn discovery_runs_once_per_definition() {
    let client = ScriptedDiscovery::new()
        .with_plugins("auth", vec![PluginInfo::new("key-auth", 1250, "0.3")]);
    let calls = client.call_counter();
    let registry = PluginRegistry::new(store_of(&["auth", "traffic"]), client);

    registry.build();
    assert!(registry.load_plugin("key-auth").is_some());
    assert!(registry.load_plugin("missing").is_none());
    assert_eq!(registry.plugin_names(), ["key-auth"]);

    // One discover call per definition, regardless of later lookups.
    assert_eq!(calls.load(std::sync::atomic::Ordering::SeqCst), 2);
}
