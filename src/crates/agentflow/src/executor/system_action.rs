//! `system_action` steps
//!
//! Built-in actions selected by the step's `agent` discriminator. File
//! actions work on fixed state keys.

use super::StepContext;
use crate::config::{Step, SystemAction};
use crate::state::{value_text, ExecutionState};
use crate::{FlowError, Result};
use serde_json::Value;
use tracing::{info, warn};

/// Files the workflow operates on; the first one is read and written
pub const FILES_TO_MODIFY: &str = "files_to_modify";
/// Extra files concatenated into [`CONTEXT`]
pub const CONTEXT_FILES: &str = "context_files";
/// Contents of the file being modified
pub const CODE_TO_MODIFY: &str = "code_to_modify";
/// Names and contents of the context files
pub const CONTEXT: &str = "context";
/// New contents to write back
pub const MODIFIED_CODE: &str = "modified_code";
/// Status message of the last write
pub const RESULT_OF_WRITE: &str = "result_of_write";

pub(crate) async fn execute(
    step: &Step,
    action: &SystemAction,
    ctx: &mut StepContext<'_>,
) -> Result<()> {
    info!(step_id = %step.id, action = %action, "Running system action");

    match action {
        SystemAction::FileRead => file_read(step, ctx).await,
        SystemAction::FileWrite => file_write(step, ctx).await,
        SystemAction::Unknown(name) => {
            warn!(step_id = %step.id, action = %name, "Unknown system action, skipping");
            Ok(())
        }
    }
}

async fn file_read(step: &Step, ctx: &mut StepContext<'_>) -> Result<()> {
    let target = target_file(step, ctx.state)?;
    let code = ctx.files.read_file(&target).await?;
    ctx.state.insert(CODE_TO_MODIFY, code);

    let mut context = String::new();
    for name in context_files(step, ctx.state) {
        let content = ctx.files.read_file(&name).await?;
        context.push_str(&format!("{}\n\n{}\n", name, content));
    }
    ctx.state.insert(CONTEXT, context);

    Ok(())
}

async fn file_write(step: &Step, ctx: &mut StepContext<'_>) -> Result<()> {
    let target = target_file(step, ctx.state)?;
    let code = ctx
        .state
        .get_text(MODIFIED_CODE)
        .ok_or_else(|| FlowError::MissingState {
            step_id: step.id.clone(),
            key: MODIFIED_CODE.to_string(),
        })?;

    let status = match ctx.files.write_file(&target, &code).await {
        Ok(status) => status,
        Err(e) => {
            warn!(step_id = %step.id, path = %target, error = %e, "File write failed");
            format!("Error writing file: {}", e)
        }
    };
    ctx.state.insert(RESULT_OF_WRITE, status);

    Ok(())
}

/// First entry of `files_to_modify`, which may be a list or a single path
fn target_file(step: &Step, state: &ExecutionState) -> Result<String> {
    let target = match state.get(FILES_TO_MODIFY) {
        Some(Value::Array(files)) => files.first().and_then(value_text),
        Some(other) => value_text(other),
        None => None,
    };

    target
        .filter(|path| !path.is_empty())
        .ok_or_else(|| FlowError::MissingState {
            step_id: step.id.clone(),
            key: FILES_TO_MODIFY.to_string(),
        })
}

fn context_files(step: &Step, state: &ExecutionState) -> Vec<String> {
    match state.get(CONTEXT_FILES) {
        Some(Value::Array(files)) => files.iter().filter_map(value_text).collect(),
        Some(Value::String(file)) if !file.is_empty() => vec![file.clone()],
        Some(Value::Null) | None => {
            warn!(step_id = %step.id, "No context files in state");
            Vec::new()
        }
        Some(other) => {
            warn!(step_id = %step.id, value = %other, "Ignoring malformed context_files");
            Vec::new()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::StepKind;
    use crate::tools::LocalFileTools;
    use serde_json::json;
    use tempfile::TempDir;

    fn system_step(action: SystemAction) -> Step {
        Step::new(
            "sys",
            StepKind::SystemAction {
                agent: action,
                input: vec![],
            },
        )
    }

    async fn run(action: SystemAction, state: &mut ExecutionState, root: &std::path::Path) -> Result<()> {
        let files = LocalFileTools::with_root(root);
        let provider = |_: &str| {};
        let step = system_step(action.clone());
        let mut ctx = StepContext {
            state,
            agent: None,
            input_provider: &provider,
            files: &files,
        };
        execute(&step, &action, &mut ctx).await
    }

    #[tokio::test]
    async fn test_file_read_with_context() {
        let temp = TempDir::new().unwrap();
        std::fs::write(temp.path().join("main.rs"), "fn main() {}").unwrap();
        std::fs::write(temp.path().join("lib.rs"), "pub fn lib() {}").unwrap();

        let mut state = ExecutionState::new();
        state.insert(FILES_TO_MODIFY, json!(["main.rs", "ignored.rs"]));
        state.insert(CONTEXT_FILES, json!(["lib.rs"]));

        run(SystemAction::FileRead, &mut state, temp.path()).await.unwrap();

        assert_eq!(state.get_text(CODE_TO_MODIFY).unwrap(), "fn main() {}");
        assert_eq!(state.get_text(CONTEXT).unwrap(), "lib.rs\n\npub fn lib() {}\n");
    }

    #[tokio::test]
    async fn test_file_read_accepts_single_path() {
        let temp = TempDir::new().unwrap();
        std::fs::write(temp.path().join("one.rs"), "one").unwrap();

        let mut state = ExecutionState::new();
        state.insert(FILES_TO_MODIFY, "one.rs");

        run(SystemAction::FileRead, &mut state, temp.path()).await.unwrap();

        assert_eq!(state.get_text(CODE_TO_MODIFY).unwrap(), "one");
        assert_eq!(state.get_text(CONTEXT).unwrap(), "");
    }

    #[tokio::test]
    async fn test_file_read_requires_target() {
        let temp = TempDir::new().unwrap();
        let mut state = ExecutionState::new();
        state.insert(FILES_TO_MODIFY, json!([]));

        let err = run(SystemAction::FileRead, &mut state, temp.path()).await.unwrap_err();
        assert!(matches!(err, FlowError::MissingState { ref key, .. } if key == FILES_TO_MODIFY));
    }

    #[tokio::test]
    async fn test_file_write_records_status() {
        let temp = TempDir::new().unwrap();
        let mut state = ExecutionState::new();
        state.insert(FILES_TO_MODIFY, json!(["out.rs"]));
        state.insert(MODIFIED_CODE, "fn new() {}");

        run(SystemAction::FileWrite, &mut state, temp.path()).await.unwrap();

        assert_eq!(state.get_text(RESULT_OF_WRITE).unwrap(), crate::tools::WRITE_OK);
        assert_eq!(
            std::fs::read_to_string(temp.path().join("out.rs")).unwrap(),
            "fn new() {}"
        );
    }

    #[tokio::test]
    async fn test_file_write_requires_code() {
        let temp = TempDir::new().unwrap();
        let mut state = ExecutionState::new();
        state.insert(FILES_TO_MODIFY, json!(["out.rs"]));

        let err = run(SystemAction::FileWrite, &mut state, temp.path()).await.unwrap_err();
        assert!(matches!(err, FlowError::MissingState { ref key, .. } if key == MODIFIED_CODE));
    }

    #[tokio::test]
    async fn test_unknown_action_is_noop() {
        let temp = TempDir::new().unwrap();
        let mut state = ExecutionState::new();
        state.insert("untouched", 1);

        run(
            SystemAction::Unknown("compile".to_string()),
            &mut state,
            temp.path(),
        )
        .await
        .unwrap();

        assert_eq!(state.len(), 1);
    }
}
