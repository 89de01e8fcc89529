//! Workflow execution engine for agent-driven tasks
//!
//! A workflow is a declarative list of steps (user input, agent action,
//! system action, loop) linked by plain or yes/no transitions. The
//! [`WorkflowEngine`] walks the steps against a shared key/value state,
//! suspends whenever it needs input from the user and resumes when the host
//! delivers it.
//!
//! ```no_run
//! use agentflow::{RunOutcome, StateMap, WorkflowEngine};
//!
//! # async fn demo() -> agentflow::Result<()> {
//! let mut engine = WorkflowEngine::new(|prompt: &str| println!("{}", prompt));
//! engine.load_workflow("modify_file")?;
//!
//! if engine.execute_workflow().await? == RunOutcome::Suspended {
//!     let mut answer = StateMap::new();
//!     answer.insert("files_to_modify".into(), serde_json::json!(["src/main.rs"]));
//!     engine.set_user_input(answer).await?;
//! }
//! # Ok(())
//! # }
//! ```

pub mod agent;
pub mod config;
pub mod engine;
pub mod error;
pub mod executor;
pub mod logging;
pub mod state;
pub mod tools;
pub mod transition;

pub use agent::{Agent, InputProvider};
pub use config::{
    LoopOver, NextStep, Settings, SettingsLoader, Step, StepKind, SystemAction, Workflow,
    WorkflowLoader,
};
pub use engine::{EngineStatus, LoopProgress, RunOutcome, WorkflowEngine};
pub use error::{FlowError, Result};
pub use state::{ExecutionState, LoopCursor, StateMap};
pub use tools::{FileTools, LocalFileTools};
