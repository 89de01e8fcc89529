//! End-to-end runs of workflow documents loaded from disk
//!
//! Exercises the loader, the file system actions and the engine together on
//! the classic "modify these files" workflow.

mod common;

use agentflow::{EngineStatus, LocalFileTools, RunOutcome, WorkflowEngine, WorkflowLoader};
use common::*;
use serde_json::json;
use tempfile::TempDir;

const MODIFY_FILES_JSON: &str = r#"{
    "name": "modify_files",
    "steps": [
        {
            "id": "ask_files",
            "type": "user_input",
            "description": "Ask which files to change",
            "input": {"files": "Which files should change?"},
            "prepend": [],
            "output": ["files", "context_files"],
            "next_step": "each_file"
        },
        {
            "id": "each_file",
            "type": "loop",
            "description": "Modify each file",
            "loop_over": "files.files_to_modify",
            "sub-steps": [
                {
                    "id": "read",
                    "type": "system_action",
                    "agent": "file_read",
                    "description": "Read the file",
                    "input": ["files_to_modify", "context_files"],
                    "output": ["code_to_modify", "context"],
                    "next_step": "modify"
                },
                {
                    "id": "modify",
                    "type": "agent_action",
                    "agent": "coder",
                    "description": "Rewrite the code",
                    "input": ["code_to_modify", "context"],
                    "output": ["modified_code"],
                    "next_step": "write"
                },
                {
                    "id": "write",
                    "type": "system_action",
                    "agent": "file_write",
                    "description": "Write the file",
                    "input": ["modified_code"],
                    "output": ["result_of_write"]
                }
            ],
            "next_step": "confirm"
        },
        {
            "id": "confirm",
            "type": "user_input",
            "description": "Confirm the result",
            "input": {"question": "Keep going?"},
            "prepend": ["result_of_write"],
            "output": ["again"],
            "next_step": {"on_success": "ask_files", "on_failure": "finish"}
        },
        {
            "id": "finish",
            "type": "system_action",
            "agent": "notify",
            "description": "Unknown actions are skipped"
        }
    ]
}"#;

fn setup() -> (TempDir, WorkflowEngine, Prompts) {
    let temp = TempDir::new().unwrap();
    let workflows = temp.path().join("workflows");
    std::fs::create_dir_all(&workflows).unwrap();
    std::fs::write(workflows.join("modify_files.json"), MODIFY_FILES_JSON).unwrap();
    std::fs::write(temp.path().join("a.rs"), "fn a() {}").unwrap();
    std::fs::write(temp.path().join("b.rs"), "fn b() {}").unwrap();
    std::fs::write(temp.path().join("shared.rs"), "pub struct Shared;").unwrap();

    let (engine, prompts) = engine();
    let engine = engine
        .with_loader(WorkflowLoader::new(&workflows))
        .with_file_tools(LocalFileTools::with_root(temp.path()));
    (temp, engine, prompts)
}

#[tokio::test]
async fn test_modify_files_document() {
    let (temp, mut engine, prompts) = setup();
    let (coder, calls) = ScriptedAgent::new(|inputs| {
        let code = inputs["code_to_modify"].as_str().unwrap_or_default();
        values(json!({ "modified_code": format!("// reviewed\\n{}", code) }))
    });
    engine.set_agent(coder);

    assert!(engine.load_workflow("modify_files").unwrap());
    assert_eq!(engine.execute_workflow().await.unwrap(), RunOutcome::Suspended);
    assert_eq!(prompts.last().unwrap(), "\nWhich files should change?\n");

    let outcome = engine
        .set_user_input(values(json!({
            "files": ["a.rs", "b.rs"],
            "context_files": ["shared.rs"],
        })))
        .await
        .unwrap();

    assert_eq!(outcome, RunOutcome::Suspended);
    assert_eq!(engine.current_step_id(), Some("confirm"));
    assert_eq!(
        prompts.last().unwrap(),
        "\nSuccessfully wrote file.\n\nKeep going?\n"
    );

    assert_eq!(
        std::fs::read_to_string(temp.path().join("a.rs")).unwrap(),
        "// reviewed\nfn a() {}"
    );
    assert_eq!(
        std::fs::read_to_string(temp.path().join("b.rs")).unwrap(),
        "// reviewed\nfn b() {}"
    );
    assert_eq!(
        std::fs::read_to_string(temp.path().join("a.rs.backup")).unwrap(),
        "fn a() {}"
    );

    {
        let calls = calls.lock().unwrap();
        assert_eq!(calls.len(), 2);
        assert_eq!(calls[0]["code_to_modify"], json!("fn a() {}"));
        assert_eq!(calls[0]["context"], json!("shared.rs\n\npub struct Shared;\n"));
        assert_eq!(calls[1]["code_to_modify"], json!("fn b() {}"));
    }

    // "no" takes the failure branch to the unknown system action, which ends the pass
    let outcome = engine
        .set_user_input(values(json!({"again": "no"})))
        .await
        .unwrap();
    assert_eq!(outcome, RunOutcome::Completed);
    assert_eq!(engine.current_step_id(), Some("ask_files"));
    assert_eq!(engine.status(), EngineStatus::Ready);
}

#[tokio::test]
async fn test_yaml_document_is_preferred() {
    let (temp, mut engine, _prompts) = setup();
    std::fs::write(
        temp.path().join("workflows").join("modify_files.yaml"),
        "name: yaml flavour\nsteps:\n  - id: only\n    type: user_input\n    output: [x]\n",
    )
    .unwrap();

    assert!(engine.load_workflow("modify_files").unwrap());
    assert_eq!(engine.workflow().unwrap().name, "yaml flavour");
}

#[tokio::test]
async fn test_missing_document_leaves_engine_idle() {
    let (_temp, mut engine, _prompts) = setup();

    assert!(!engine.load_workflow("does_not_exist").unwrap());
    assert_eq!(engine.status(), EngineStatus::Idle);
    assert_eq!(engine.execute_workflow().await.unwrap(), RunOutcome::Idle);
}

#[tokio::test]
async fn test_malformed_document_is_an_error() {
    let (temp, mut engine, _prompts) = setup();
    std::fs::write(
        temp.path().join("workflows").join("broken.json"),
        r#"{"name": "broken", "steps": [{"id": "x", "type": "loop", "loop_over": "nodot", "sub-steps": []}]}"#,
    )
    .unwrap();

    let err = engine.load_workflow("broken").unwrap_err();
    assert!(!err.is_recoverable());
    assert_eq!(engine.status(), EngineStatus::Idle);
}
