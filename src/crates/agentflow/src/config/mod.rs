//! Configuration module
//!
//! Provides:
//! - Workflow definitions (steps, kinds, transitions) and their validation
//! - YAML/JSON workflow document loading with includes and environment expansion
//! - TOML settings for the engine and its host

pub mod loader;
pub mod settings;
pub mod workflow;

pub use loader::{load_workflow_file, WorkflowLoader};
pub use settings::{
    AgentSettings, EngineSettings, LoggingSettings, Settings, SettingsLoader, WorkflowSettings,
};
pub use workflow::{LoopOver, NextStep, PromptFragments, Step, StepKind, SystemAction, Workflow};
