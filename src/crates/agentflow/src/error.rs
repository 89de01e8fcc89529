//! Error types for agentflow
//!
//! A single error enum covers configuration problems, missing state,
//! and collaborator contract violations.

use thiserror::Error;

/// Result type for agentflow operations
pub type Result<T> = std::result::Result<T, FlowError>;

/// Errors that can occur while loading or driving a workflow
#[derive(Debug, Error)]
pub enum FlowError {
    /// No workflow document exists for the requested id
    #[error("Workflow not found: {id}")]
    WorkflowNotFound { id: String },

    /// The workflow document parsed but failed validation
    #[error("Invalid workflow: {0}")]
    InvalidWorkflow(String),

    /// A transition named a step that does not exist in its scope
    #[error("Unknown step: {step_id}")]
    UnknownStep { step_id: String },

    /// A loop step was found inside another loop's body
    #[error("Nested loop '{step_id}' is not supported")]
    NestedLoop { step_id: String },

    /// `loop_over` is not of the form `<listKey>.<itemKey>`
    #[error("Step '{step_id}' has malformed loop_over '{value}'")]
    InvalidLoopOver { step_id: String, value: String },

    /// A conditional transition found no value under its branch key
    #[error("Step '{step_id}' branches on '{key}' but no value was produced")]
    MissingBranchValue { step_id: String, key: String },

    /// A system action needs a state key that was never populated
    #[error("Step '{step_id}' requires state key '{key}'")]
    MissingState { step_id: String, key: String },

    /// The agent result lacks an output the step declared
    #[error("Agent result for step '{step_id}' is missing output '{key}'")]
    MissingAgentOutput { step_id: String, key: String },

    /// An agent step was reached with no agent bound to the engine
    #[error("Step '{step_id}' requires an agent but none is set")]
    NoAgent { step_id: String },

    /// The agent collaborator failed
    #[error("Agent error: {0}")]
    Agent(String),

    /// A single drive executed more steps than allowed
    #[error("Exceeded max steps per run: {limit}")]
    StepLimitExceeded { limit: usize },

    /// Settings or document loading error
    #[error("Configuration error: {0}")]
    Config(String),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl FlowError {
    /// Whether the host can carry on without treating the run as broken.
    ///
    /// Only a missing workflow document is recoverable; every other error
    /// points at a bad document or a misbehaving collaborator.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Self::WorkflowNotFound { .. })
    }
}
