//! Integration tests for the CLI's supporting library pieces: config
//! loading and plan parsing. The `quester` binary itself composes these
//! with `QuestExecutor`/`SqlStateStore`, which are exercised directly in
//! `test_executor.rs` and `test_store.rs`.

use std::io::Write;

use quester::cli::config::EngineConfig;
use quester::cli::plan::parse_plan;
use quester::engine::types::{ErrorMode, RetryCaps};

#[test]
fn loads_store_path_and_worker_endpoints_from_yaml() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(
        file,
        r#"
store_path: "/tmp/quester-test.db"
default_tool_timeout_ms: 5000
worker_endpoints:
  architect: "http://localhost:9001/mcp"
  forge_master: "http://localhost:9002/mcp"
retry:
  max_tries_cap: 3
  wait_ms_cap: 1000
"#
    )
    .unwrap();

    let config = EngineConfig::load(Some(file.path())).unwrap();
    assert_eq!(config.store_path(), "/tmp/quester-test.db");
    assert_eq!(config.default_tool_timeout_ms(), 5000);
    assert_eq!(config.worker_endpoints().get("architect").unwrap(), "http://localhost:9001/mcp");
    assert_eq!(config.retry_caps().max_tries_cap, 3);
    assert_eq!(config.retry_caps().max_wait_ms_cap, 1000);
}

#[test]
fn partial_config_falls_back_to_defaults_for_missing_fields() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(file, "store_path: \"custom.db\"").unwrap();

    let config = EngineConfig::load(Some(file.path())).unwrap();
    assert_eq!(config.store_path(), "custom.db");
    assert_eq!(config.default_tool_timeout_ms(), 30_000);
    assert!(config.worker_endpoints().is_empty());
}

#[test]
fn explicit_missing_config_path_is_an_error() {
    let missing = std::path::Path::new("/tmp/definitely-not-a-quester-config.yaml");
    let err = EngineConfig::load(Some(missing)).unwrap_err();
    assert!(err.to_string().contains("Config file not found"));
}

#[test]
fn parses_a_multi_step_plan_document_into_a_runnable_quest() {
    let plan = r#"{
        "quest_type": "design_microservice",
        "input": {"requirements": "auth service"},
        "steps": [
            {"worker_name": "architect", "tool_name": "design_system"},
            {"worker_name": "forge_master", "tool_name": "generate_code", "on_error": "continue_with_input"},
            {"worker_name": "architect", "tool_name": "review_design", "retry": {"max_tries": 3, "wait_ms": 500}}
        ]
    }"#;

    let quest = parse_plan(plan, RetryCaps::default()).unwrap();
    assert_eq!(quest.quest_type, "design_microservice");
    assert_eq!(quest.plan.len(), 3);
    assert_eq!(quest.plan[1].on_error, ErrorMode::ContinueWithInput);
    assert_eq!(quest.plan[2].run_index, 1);
    assert_eq!(quest.plan[2].retry.max_tries, 3);
    assert_eq!(quest.plan[2].retry.wait_ms, 500);
}

#[test]
fn malformed_plan_json_is_rejected_with_context() {
    let err = parse_plan("{not valid json", RetryCaps::default()).unwrap_err();
    assert!(err.to_string().contains("failed to parse quest plan JSON"));
}

#[test]
fn configured_retry_caps_flow_through_parse_plan() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(
        file,
        r#"
retry:
  max_tries_cap: 2
  wait_ms_cap: 100
"#
    )
    .unwrap();
    let config = EngineConfig::load(Some(file.path())).unwrap();

    let plan = r#"{
        "quest_type": "t",
        "steps": [{"worker_name": "architect", "tool_name": "design_system", "retry": {"max_tries": 10, "wait_ms": 5000}}]
    }"#;

    let quest = parse_plan(plan, config.retry_caps()).unwrap();
    assert_eq!(quest.plan[0].retry.max_tries, 2);
    assert_eq!(quest.plan[0].retry.wait_ms, 100);
}
