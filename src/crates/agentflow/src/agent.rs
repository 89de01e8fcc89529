//! Collaborator interfaces
//!
//! The engine talks to the outside world through two seams: the agent that
//! performs `agent_action` steps, and the input provider that surfaces
//! `user_input` prompts to whatever UI embeds the engine.

use crate::state::StateMap;
use crate::Result;
use async_trait::async_trait;

/// Performs agent actions
///
/// The result must contain at least the keys the invoking step declares in
/// its `output`.
#[async_trait]
pub trait Agent: Send + Sync {
    /// Agent name, for logging
    fn name(&self) -> &str {
        "agent"
    }

    /// Run the agent on the step's inputs
    async fn run_agent(&self, inputs: StateMap) -> Result<StateMap>;
}

/// Surfaces a prompt to the user
///
/// Returns nothing; the answer arrives later through
/// [`WorkflowEngine::set_user_input`](crate::engine::WorkflowEngine::set_user_input).
pub trait InputProvider: Send + Sync {
    fn request_input(&self, prompt: &str);
}

impl<F> InputProvider for F
where
    F: Fn(&str) + Send + Sync,
{
    fn request_input(&self, prompt: &str) {
        self(prompt)
    }
}
