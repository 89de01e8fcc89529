//! Transition resolution
//!
//! Decides which step follows a completed one. Conditional transitions branch
//! on the literal `"yes"`/`"no"` strings agents and users produce; that
//! spelling is handled only by [`is_affirmative`].

use crate::config::{NextStep, Step};
use crate::state::{value_text, ExecutionState};
use crate::{FlowError, Result};
use tracing::debug;

/// Whether a branch value selects the success path
///
/// Case-insensitive match on `"yes"`; everything else is a failure.
pub fn is_affirmative(value: &str) -> bool {
    value.eq_ignore_ascii_case("yes")
}

/// Id of the step that follows `step`, or `None` when the scope ends here
///
/// A conditional transition reads `state[step.output[0]]`; a missing value is
/// an error rather than a guess.
pub fn resolve_next<'a>(step: &'a Step, state: &ExecutionState) -> Result<Option<&'a str>> {
    let next = match step.transition() {
        Some(next) => next,
        None => return Ok(None),
    };

    let target = match next {
        NextStep::Goto(id) => id.as_str(),
        NextStep::Branch {
            on_success,
            on_failure,
        } => {
            let key = step.output.first().ok_or_else(|| {
                FlowError::InvalidWorkflow(format!(
                    "Step '{}' branches but declares no output",
                    step.id
                ))
            })?;

            let value = state
                .get(key)
                .and_then(value_text)
                .ok_or_else(|| FlowError::MissingBranchValue {
                    step_id: step.id.clone(),
                    key: key.clone(),
                })?;

            let target = if is_affirmative(&value) {
                on_success
            } else {
                on_failure
            };
            debug!(step_id = %step.id, branch_key = %key, value = %value, target = %target, "Resolved branch");
            target.as_str()
        }
    };

    Ok(Some(target))
}

/// Position of `id` within one scope (top-level steps or a loop body)
pub fn find_step(steps: &[Step], id: &str) -> Result<usize> {
    steps
        .iter()
        .position(|s| s.id == id)
        .ok_or_else(|| FlowError::UnknownStep {
            step_id: id.to_string(),
        })
}
