use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, OnceLock};

use omra_cli::commands::run::RunOptions;
use omra_cli::commands::{config, doctor, run, steps};
use serde_json::{json, Value};
use tempfile::TempDir;

const CATALOG: &str = r#"{
    "agents": [
        {"id": "agent-1", "name": "Dispatch Lead", "role": "parent", "childrenIds": ["agent-3"]},
        {"id": "agent-3", "name": "Intake", "role": "child", "parentId": "agent-1"}
    ],
    "models": [{"id": "gpt-4o", "name": "GPT-4o", "provider": "openai"}],
    "knowledgeSources": [{"id": "kb-manuals", "name": "Appliance manuals"}]
}"#;

fn help_bot_script() -> Value {
    json!([
        {"field": "type", "value": "general"},
        {"field": "name", "value": "Help Bot"},
        {"field": "modelId", "value": "gpt-4o"},
        {"field": "ragConfig.enabled", "value": false},
        {"field": "fineTuningConfig.enabled", "value": false},
        {"field": "hierarchicalConfig.isHierarchical", "value": false}
    ])
}

#[test]
fn run_creates_help_bot_through_mandatory_steps_only() {
    with_env(&[], || {
        let dir = TempDir::new().expect("tempdir");
        let catalog = write_file(dir.path(), "catalog.json", CATALOG);
        let script = write_file(dir.path(), "script.json", &help_bot_script().to_string());

        let result = run::run(RunOptions {
            catalog: Some(catalog),
            script,
            ..RunOptions::default()
        });
        assert_eq!(result.exit_code, 0, "expected successful run: {}", result.output);

        let payload = parse_payload(&result.output);
        assert_eq!(payload["command"], "run");
        assert_eq!(payload["status"], "ok");
        assert_eq!(
            payload["message"],
            "created agent `agent-2` (general) via type -> basics -> model -> review"
        );
        assert!(payload.get("details").is_none());
    });
}

#[test]
fn run_json_output_and_store_carry_the_descriptor() {
    with_env(&[], || {
        let dir = TempDir::new().expect("tempdir");
        let catalog = write_file(dir.path(), "catalog.json", CATALOG);
        let script = write_file(dir.path(), "script.json", &help_bot_script().to_string());
        let store = dir.path().join("agents.json");

        let result = run::run(RunOptions {
            catalog: Some(catalog),
            script,
            store: Some(store.clone()),
            json: true,
        });
        assert_eq!(result.exit_code, 0, "expected successful run: {}", result.output);

        let payload = parse_payload(&result.output);
        let descriptor = &payload["details"]["descriptor"];
        assert_eq!(descriptor["name"], "Help Bot");
        assert!(descriptor["channelConfig"].is_null());
        assert_eq!(descriptor["hierarchy"]["role"], "standalone");
        assert_eq!(payload["details"]["steps"], json!(["type", "basics", "model", "review"]));

        let events = payload["details"]["auditEvents"].as_array().cloned().unwrap_or_default();
        assert_eq!(events.len(), 4);
        assert!(events[..3].iter().all(|event| event["event_type"] == "wizard.step.advanced"));
        let submitted = &events[3];
        assert_eq!(submitted["event_type"], "wizard.session.submitted");
        assert_eq!(submitted["outcome"], "Success");
        assert_eq!(submitted["metadata"]["agent_type"], "general");

        let stored: Value =
            serde_json::from_str(&fs::read_to_string(&store).expect("store written"))
                .expect("store is json");
        assert_eq!(stored.as_array().map(Vec::len), Some(1));
        assert_eq!(stored[0]["id"], "agent-2");
    });
}

#[test]
fn run_reports_unknown_parent_as_invariant_violation() {
    with_env(&[], || {
        let dir = TempDir::new().expect("tempdir");
        let catalog = write_file(dir.path(), "catalog.json", CATALOG);
        let mut script = help_bot_script();
        if let Some(updates) = script.as_array_mut() {
            updates.push(json!({"field": "hierarchicalConfig.isHierarchical", "value": true}));
            updates.push(json!({"field": "hierarchicalConfig.role", "value": "child"}));
            updates.push(json!({"field": "hierarchicalConfig.parentId", "value": "agent-9"}));
        }
        let script = write_file(dir.path(), "script.json", &script.to_string());

        let result = run::run(RunOptions {
            catalog: Some(catalog),
            script,
            ..RunOptions::default()
        });
        assert_eq!(result.exit_code, 4, "expected wizard rejection code");

        let payload = parse_payload(&result.output);
        assert_eq!(payload["status"], "error");
        assert_eq!(payload["error_class"], "invariant_violation");
        assert_eq!(payload["details"]["step"], "review");
        assert_eq!(
            payload["details"]["issues"],
            json!([{"field": "parentId", "reason": "not found"}])
        );
    });
}

#[test]
fn run_stops_on_first_incomplete_step() {
    with_env(&[], || {
        let dir = TempDir::new().expect("tempdir");
        let script = write_file(
            dir.path(),
            "script.json",
            &json!([{"field": "type", "value": "email"}, {"field": "name", "value": "Al"}])
                .to_string(),
        );

        let result = run::run(RunOptions { script, ..RunOptions::default() });
        assert_eq!(result.exit_code, 4);

        let payload = parse_payload(&result.output);
        assert_eq!(payload["error_class"], "step_incomplete");
        assert_eq!(payload["details"]["step"], "basics");
        assert_eq!(payload["details"]["issues"][0]["field"], "name");
    });
}

#[test]
fn run_rejects_unknown_script_field() {
    with_env(&[], || {
        let dir = TempDir::new().expect("tempdir");
        let script = write_file(
            dir.path(),
            "script.json",
            &json!([{"field": "ragConfig.vectorStore", "value": "pg"}]).to_string(),
        );

        let result = run::run(RunOptions { script, ..RunOptions::default() });
        assert_eq!(result.exit_code, 4);

        let payload = parse_payload(&result.output);
        assert_eq!(payload["error_class"], "draft_update");
        let message = payload["message"].as_str().unwrap_or_default();
        assert!(message.contains("ragConfig.vectorStore"), "unexpected message: {message}");
    });
}

#[test]
fn run_returns_script_failure_for_malformed_script() {
    with_env(&[], || {
        let dir = TempDir::new().expect("tempdir");
        let script = write_file(dir.path(), "script.json", "{\"field\": \"name\"}");

        let result = run::run(RunOptions { script, ..RunOptions::default() });
        assert_eq!(result.exit_code, 3);
        assert_eq!(parse_payload(&result.output)["error_class"], "script");
    });
}

#[test]
fn run_returns_catalog_failure_for_missing_catalog() {
    with_env(&[], || {
        let dir = TempDir::new().expect("tempdir");
        let script = write_file(dir.path(), "script.json", &help_bot_script().to_string());

        let result = run::run(RunOptions {
            catalog: Some(dir.path().join("missing.json")),
            script,
            ..RunOptions::default()
        });
        assert_eq!(result.exit_code, 3);
        assert_eq!(parse_payload(&result.output)["error_class"], "catalog");
    });
}

#[test]
fn run_returns_config_failure_for_invalid_env() {
    with_env(&[("OMRA_WIZARD_MAX_HIERARCHY_DEPTH", "1")], || {
        let dir = TempDir::new().expect("tempdir");
        let script = write_file(dir.path(), "script.json", &help_bot_script().to_string());

        let result = run::run(RunOptions { script, ..RunOptions::default() });
        assert_eq!(result.exit_code, 2, "expected config validation failure code");
        assert_eq!(parse_payload(&result.output)["error_class"], "config_validation");
    });
}

#[test]
fn steps_lists_reachable_and_skipped_steps() {
    with_env(&[], || {
        let dir = TempDir::new().expect("tempdir");
        let script = write_file(
            dir.path(),
            "script.json",
            &json!([
                {"field": "type", "value": "voice"},
                {"field": "ragConfig.enabled", "value": true}
            ])
            .to_string(),
        );

        let result = steps::run(&script);
        assert_eq!(result.exit_code, 0);

        let payload = parse_payload(&result.output);
        assert_eq!(
            payload["message"],
            "type -> basics -> model -> channel -> knowledge -> review (skipped: fine_tuning, hierarchy)"
        );
        assert_eq!(payload["details"]["skipped"], json!(["fine_tuning", "hierarchy"]));
    });
}

#[test]
fn steps_honours_configured_wizard_rules() {
    with_env(&[("OMRA_WIZARD_MAX_HIERARCHY_DEPTH", "1")], || {
        let dir = TempDir::new().expect("tempdir");
        let script = write_file(dir.path(), "script.json", &help_bot_script().to_string());

        let result = steps::run(&script);
        assert_eq!(result.exit_code, 2, "expected config validation failure code");
        assert_eq!(parse_payload(&result.output)["error_class"], "config_validation");
    });
}

#[test]
fn doctor_flags_inconsistent_catalog_links() {
    let dir = TempDir::new().expect("tempdir");
    let catalog = write_file(
        dir.path(),
        "catalog.json",
        r#"{"agents": [{"id": "agent-5", "name": "Orphan", "role": "child", "parentId": "agent-8"}]}"#,
    );
    let catalog_path = catalog.display().to_string();

    with_env(&[("OMRA_CATALOG_PATH", catalog_path.as_str())], || {
        let report = parse_payload(&doctor::run(true));
        assert_eq!(report["overall_status"], "fail");

        let checks = report["checks"].as_array().cloned().unwrap_or_default();
        let consistency = checks
            .iter()
            .find(|check| check["name"] == "catalog_link_consistency")
            .expect("consistency check present");
        assert_eq!(consistency["status"], "fail");
        assert_eq!(consistency["details"], "`agent-5` names missing parent `agent-8`");
    });
}

#[test]
fn doctor_passes_without_catalog() {
    with_env(&[], || {
        let report = parse_payload(&doctor::run(true));
        assert_eq!(report["overall_status"], "pass");
        assert_eq!(report["checks"][1]["status"], "skipped");
    });
}

#[test]
fn config_reports_env_source() {
    with_env(&[("OMRA_LOG_LEVEL", "debug")], || {
        let output = config::run();
        assert!(output.contains("- logging.level = debug (source: env (OMRA_LOG_LEVEL))"));
        assert!(output.contains("- wizard.max_hierarchy_depth = 5 (source: default)"));
    });
}

fn write_file(dir: &Path, name: &str, contents: &str) -> PathBuf {
    let path = dir.join(name);
    fs::write(&path, contents).expect("write fixture");
    path
}

fn parse_payload(output: &str) -> Value {
    serde_json::from_str(output).expect("command output should be valid JSON")
}

fn with_env(vars: &[(&str, &str)], test_fn: impl FnOnce()) {
    static ENV_LOCK: OnceLock<Mutex<()>> = OnceLock::new();
    let _guard =
        ENV_LOCK.get_or_init(|| Mutex::new(())).lock().expect("env mutex should not be poisoned");

    let keys = [
        "OMRA_WIZARD_MIN_NAME_LENGTH",
        "OMRA_WIZARD_MAX_HIERARCHY_DEPTH",
        "OMRA_WIZARD_FULL_GRAPH_CHECKS",
        "OMRA_WIZARD_REQUIRE_KNOWN_MODELS",
        "OMRA_CATALOG_PATH",
        "OMRA_LOGGING_LEVEL",
        "OMRA_LOGGING_FORMAT",
        "OMRA_LOG_LEVEL",
        "OMRA_LOG_FORMAT",
    ];

    let previous_values: Vec<(&str, Option<String>)> =
        keys.iter().map(|key| (*key, env::var(key).ok())).collect();

    for key in &keys {
        env::remove_var(key);
    }
    for (key, value) in vars {
        env::set_var(key, value);
    }

    test_fn();

    for (key, value) in previous_values {
        if let Some(value) = value {
            env::set_var(key, value);
        } else {
            env::remove_var(key);
        }
    }
}
