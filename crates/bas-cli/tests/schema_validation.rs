// SPDX-License-Identifier: MIT OR Apache-2.0
//! Generated schemas accept what the engine itself produces.

use bas_cli::commands::{SchemaKind, schema_json};
use bas_config::EngineConfig;
use bas_core::{Platform, Scenario, Step};

fn validator(kind: SchemaKind) -> jsonschema::Validator {
    let schema: serde_json::Value = serde_json::from_str(&schema_json(kind).unwrap()).unwrap();
    jsonschema::validator_for(&schema).unwrap()
}

#[test]
fn scenario_schema_accepts_built_scenario() {
    let scenario = Scenario::new("s", "demo", Platform::RemoteOperation)
        .with_step(Step::new("a", "A").with_metadata(
            "remote_operation",
            serde_json::json!({"action": "create_operation"}),
        ));
    let value = serde_json::to_value(&scenario).unwrap();
    assert!(validator(SchemaKind::Scenario).is_valid(&value));
}

#[test]
fn scenario_schema_rejects_unknown_platform() {
    let value = serde_json::json!({
        "scenario_id": "s",
        "name": "demo",
        "platform": "cobalt",
    });
    assert!(!validator(SchemaKind::Scenario).is_valid(&value));
}

#[test]
fn config_schema_accepts_defaults() {
    let value = serde_json::to_value(EngineConfig::default()).unwrap();
    assert!(validator(SchemaKind::Config).is_valid(&value));
}
