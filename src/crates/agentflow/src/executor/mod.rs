//! Step executors
//!
//! One handler per non-loop step kind. Each reads and writes the execution
//! state through a [`StepContext`] and reports whether the engine may keep
//! going or must suspend. Loop steps are driven by the engine itself.

pub mod agent_action;
pub mod system_action;
pub mod user_input;

use crate::agent::{Agent, InputProvider};
use crate::config::{Step, StepKind};
use crate::state::ExecutionState;
use crate::tools::FileTools;
use crate::{FlowError, Result};
use tracing::debug;

/// Result of running one step
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepOutcome {
    /// The step finished; the engine resolves its transition
    Completed,
    /// The step is waiting for external input
    Suspended,
}

/// Everything a step may touch while it runs
pub struct StepContext<'a> {
    pub state: &'a mut ExecutionState,
    pub agent: Option<&'a dyn Agent>,
    pub input_provider: &'a dyn InputProvider,
    pub files: &'a dyn FileTools,
}

/// Dispatch `step` to the handler for its kind
pub async fn execute_step(step: &Step, ctx: &mut StepContext<'_>) -> Result<StepOutcome> {
    debug!(step_id = %step.id, kind = step.kind_name(), description = %step.description, "Executing step");

    match &step.kind {
        StepKind::UserInput { input, prepend } => {
            user_input::execute(step, prepend, input, ctx);
            Ok(StepOutcome::Suspended)
        }
        StepKind::AgentAction { agent, input } => {
            agent_action::execute(step, agent.as_deref(), input, ctx).await?;
            Ok(StepOutcome::Completed)
        }
        StepKind::SystemAction { agent, .. } => {
            system_action::execute(step, agent, ctx).await?;
            Ok(StepOutcome::Completed)
        }
        StepKind::Loop { .. } => Err(FlowError::InvalidWorkflow(format!(
            "Loop step '{}' cannot run as a plain step",
            step.id
        ))),
    }
}
