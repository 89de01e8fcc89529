//! `agent_action` steps

use super::StepContext;
use crate::config::Step;
use crate::{FlowError, Result};
use tracing::info;

/// Run the bound agent on the step's inputs and copy its declared outputs
/// into state
///
/// Every declared output must be present in the agent result; nothing is
/// written unless all of them are.
pub(crate) async fn execute(
    step: &Step,
    label: Option<&str>,
    input_keys: &[String],
    ctx: &mut StepContext<'_>,
) -> Result<()> {
    let agent = ctx.agent.ok_or_else(|| FlowError::NoAgent {
        step_id: step.id.clone(),
    })?;

    let inputs = ctx.state.select(input_keys);
    info!(
        step_id = %step.id,
        agent = agent.name(),
        label = label.unwrap_or(""),
        inputs = ?input_keys,
        "Running agent action"
    );

    let mut result = agent.run_agent(inputs).await?;

    if let Some(missing) = step.output.iter().find(|key| !result.contains_key(*key)) {
        return Err(FlowError::MissingAgentOutput {
            step_id: step.id.clone(),
            key: missing.clone(),
        });
    }

    for key in &step.output {
        if let Some(value) = result.remove(key) {
            ctx.state.insert(key.clone(), value);
        }
    }

    Ok(())
}
