//! ---
//! sh_section: "01-scenario-engine"
//! sh_subsection: "test"
//! sh_type: "source"
//! sh_scope: "code"
//! sh_description: "Scenario catalog listing, loading, and saving on disk."
//! sh_version: "v0.1.0"
//! sh_owner: "tbd"
//! ---
use std::fs;

use serde_json::json;
use stagehand_scenario::{
    EnhancedScenario, LoadError, OperationStep, PluginCapabilities, PluginError, PluginRegistry,
    ScenarioCatalog, ScenarioDefinition,
};
use tempfile::tempdir;

fn enhanced_document() -> serde_json::Value {
    json!({
        "version": "1.0",
        "metadata": {"name": "erc20 transfer", "tags": ["erc20"]},
        "setup": {"hooks": {"before": [{"task": "deploy", "params": {"contract": "Token"}}]}},
        "scenarios": [{
            "name": "happy path",
            "steps": [
                {"task": "transfer", "params": {"to": "0x02", "amount": 5}},
                {"task": "transfer", "params": {"amount": 1e30}, "shouldFail": true, "expectedError": "insufficient"}
            ]
        }],
        "teardown": {"hooks": [{"task": "reset"}]}
    })
}

#[test]
fn lists_nested_and_mixed_formats() {
    let dir = tempdir().unwrap();
    fs::create_dir_all(dir.path().join("erc20")).unwrap();
    fs::write(dir.path().join("erc20/transfer.json"), "{}").unwrap();
    fs::write(dir.path().join("erc20/transfer.yaml"), "steps: []").unwrap();
    fs::write(dir.path().join("mint.yml"), "steps: []").unwrap();
    fs::write(dir.path().join("burn.scenario.ts"), "export default {}").unwrap();
    fs::write(dir.path().join("notes.md"), "# notes").unwrap();

    let catalog = ScenarioCatalog::new(dir.path());
    assert_eq!(
        catalog.list_scenarios(),
        vec!["burn", "erc20/transfer", "mint"]
    );
}

#[test]
fn missing_directory_lists_nothing() {
    let dir = tempdir().unwrap();
    let catalog = ScenarioCatalog::new(dir.path().join("absent"));
    assert!(catalog.list_scenarios().is_empty());
    assert!(matches!(
        catalog.load_scenario("anything"),
        Err(LoadError::NotFound { .. })
    ));
}

#[test]
fn save_then_load_round_trips() {
    let dir = tempdir().unwrap();
    let catalog = ScenarioCatalog::new(dir.path());
    let document = enhanced_document();

    let path = catalog.save_scenario("erc20/transfer", document.clone()).unwrap();
    assert!(path.ends_with("erc20/transfer.json"));

    let loaded = catalog.load_scenario("erc20/transfer").unwrap();
    assert_eq!(loaded, EnhancedScenario::from_document(document).unwrap());
    assert_eq!(loaded, catalog.load_scenario("erc20/transfer").unwrap());
    assert_eq!(loaded.operations().count(), 2);
    assert_eq!(catalog.list_scenarios(), vec!["erc20/transfer"]);
}

#[test]
fn save_accepts_json_text_and_overwrites() {
    let dir = tempdir().unwrap();
    let catalog = ScenarioCatalog::new(dir.path());
    catalog
        .save_scenario("mint", json!({"name": "mint", "steps": []}))
        .unwrap();
    let text = r#"{"name": "mint", "steps": [{"task": "mint", "params": {"amount": 1}}]}"#;
    catalog.save_scenario("mint", json!(text)).unwrap();

    let loaded = catalog.load_scenario("mint").unwrap();
    assert_eq!(loaded.operations().count(), 1);
    assert_eq!(loaded.version, "1.0");
}

#[test]
fn save_rejects_invalid_content_without_writing() {
    let dir = tempdir().unwrap();
    let catalog = ScenarioCatalog::new(dir.path());
    let err = catalog
        .save_scenario("broken", json!({"unrelated": true}))
        .unwrap_err();
    assert!(matches!(err, LoadError::Parse { .. }));
    assert!(!dir.path().join("broken.json").exists());

    let err = catalog.save_scenario("../escape", json!({"steps": []})).unwrap_err();
    assert!(matches!(err, LoadError::InvalidName { .. }));
}

#[test]
fn json_wins_over_yaml() {
    let dir = tempdir().unwrap();
    fs::write(
        dir.path().join("transfer.json"),
        r#"{"name": "from json", "steps": []}"#,
    )
    .unwrap();
    fs::write(dir.path().join("transfer.yaml"), "name: from yaml\nsteps: []\n").unwrap();

    let catalog = ScenarioCatalog::new(dir.path());
    assert_eq!(catalog.load_scenario("transfer").unwrap().name(), "from json");
}

#[test]
fn yaml_scenarios_load() {
    let dir = tempdir().unwrap();
    fs::write(
        dir.path().join("approve.yml"),
        "name: approve\nsteps:\n  - task: approve\n    params:\n      spender: \"0x03\"\n    shouldFail: true\n",
    )
    .unwrap();
    let scenario = ScenarioCatalog::new(dir.path()).load_scenario("approve").unwrap();
    let step = scenario.operations().next().unwrap();
    assert!(step.should_fail);
    assert_eq!(step.params, json!({"spender": "0x03"}));
}

#[test]
fn unparsable_file_is_a_parse_error() {
    let dir = tempdir().unwrap();
    fs::write(dir.path().join("bad.json"), "{ not json").unwrap();
    let err = ScenarioCatalog::new(dir.path()).load_scenario("bad").unwrap_err();
    assert!(matches!(err, LoadError::Parse { .. }), "{err}");
}

#[test]
fn code_scenario_requires_a_plugin() {
    let dir = tempdir().unwrap();
    fs::write(dir.path().join("burn.scenario.rs"), "// compiled elsewhere").unwrap();

    let bare = ScenarioCatalog::new(dir.path());
    assert!(matches!(
        bare.load_scenario("burn"),
        Err(LoadError::Plugin { .. })
    ));

    let plugins = PluginRegistry::new(PluginCapabilities::default().grant("amount", json!(3)))
        .register("burn", |caps: &PluginCapabilities| -> Result<EnhancedScenario, PluginError> {
            let amount = caps.require("amount")?.clone();
            Ok(EnhancedScenario::from_definition(ScenarioDefinition {
                name: "burn".into(),
                description: None,
                steps: vec![OperationStep::new("burn", json!({"amount": amount}))],
            }))
        });
    let catalog = ScenarioCatalog::new(dir.path()).with_plugins(plugins);
    let scenario = catalog.load_scenario("burn").unwrap();
    assert_eq!(
        scenario.operations().next().unwrap().params,
        json!({"amount": 3})
    );
}
