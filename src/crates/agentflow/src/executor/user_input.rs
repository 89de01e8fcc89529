//! `user_input` steps
//!
//! Compose a prompt from prepended state values followed by the step's literal
//! prompt fragments, hand it to the input provider, and suspend.

use super::StepContext;
use crate::config::{PromptFragments, Step};
use crate::state::{value_text, ExecutionState};
use tracing::{info, warn};

pub(crate) fn execute(
    step: &Step,
    prepend: &[String],
    fragments: &PromptFragments,
    ctx: &mut StepContext<'_>,
) {
    let prompt = build_prompt(step, prepend, fragments, ctx.state);
    info!(step_id = %step.id, outputs = ?step.output, "Waiting for user input");
    ctx.input_provider.request_input(&prompt);
}

/// Build the text shown to the user
///
/// A prepended key missing from state contributes nothing and is logged; this
/// is template rendering, not a data-integrity check.
pub fn build_prompt(
    step: &Step,
    prepend: &[String],
    fragments: &PromptFragments,
    state: &ExecutionState,
) -> String {
    let mut prompt = String::new();

    for key in prepend {
        match state.get_text(key) {
            Some(text) => push_block(&mut prompt, &text),
            None => warn!(step_id = %step.id, key = %key, "Prepend key missing from state"),
        }
    }

    for fragment in fragments.values().filter_map(value_text) {
        push_block(&mut prompt, &fragment);
    }

    prompt
}

fn push_block(prompt: &mut String, text: &str) {
    prompt.push('\n');
    prompt.push_str(text);
    prompt.push('\n');
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::StepKind;
    use serde_json::json;

    fn ask_step() -> Step {
        Step::new(
            "ask",
            StepKind::UserInput {
                input: PromptFragments::new(),
                prepend: vec![],
            },
        )
    }

    fn fragments(pairs: &[(&str, &str)]) -> PromptFragments {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), json!(v)))
            .collect()
    }

    #[test]
    fn test_prepend_then_fragments() {
        let mut state = ExecutionState::new();
        state.insert("review", "Looks fine");

        let prompt = build_prompt(
            &ask_step(),
            &["review".to_string()],
            &fragments(&[("q1", "Accept?"), ("q2", "Comments?")]),
            &state,
        );

        assert_eq!(prompt, "\nLooks fine\n\nAccept?\n\nComments?\n");
    }

    #[test]
    fn test_missing_prepend_is_skipped() {
        let state = ExecutionState::new();
        let prompt = build_prompt(
            &ask_step(),
            &["never_set".to_string()],
            &fragments(&[("q", "Which file?")]),
            &state,
        );

        assert_eq!(prompt, "\nWhich file?\n");
    }

    #[test]
    fn test_structured_prepend_is_json() {
        let mut state = ExecutionState::new();
        state.insert("files", json!(["a.rs", "b.rs"]));

        let prompt = build_prompt(
            &ask_step(),
            &["files".to_string()],
            &PromptFragments::new(),
            &state,
        );

        assert_eq!(prompt, "\n[\"a.rs\",\"b.rs\"]\n");
    }
}
