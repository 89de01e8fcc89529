//! Workflow definitions
//!
//! Declarative description of a workflow: an ordered list of steps, each one
//! of four kinds, linked by unconditional or success/failure transitions.
//! Definitions are immutable once loaded.

use crate::config::loader;
use crate::{FlowError, Result};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashSet;

/// Literal prompt fragments of a user-input step, in declaration order
pub type PromptFragments = Map<String, Value>;

/// Workflow definition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Workflow {
    /// Workflow name
    pub name: String,
    /// Workflow description
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Top-level steps; execution starts at the first one
    pub steps: Vec<Step>,
}

/// Individual workflow step
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Step {
    /// Step identifier, unique within its scope
    pub id: String,
    /// Human-readable label
    #[serde(default)]
    pub description: String,
    /// Kind-specific fields
    #[serde(flatten)]
    pub kind: StepKind,
    /// State keys this step produces
    #[serde(default)]
    pub output: Vec<String>,
    /// Where to go once this step completes
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_step: Option<NextStep>,
}

/// The four step kinds
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StepKind {
    /// Ask the host for input and suspend
    UserInput {
        /// Literal prompt fragments shown after the prepended state values
        #[serde(default)]
        input: PromptFragments,
        /// State keys whose values lead the prompt
        #[serde(default)]
        prepend: Vec<String>,
    },
    /// Hand state values to the bound agent
    AgentAction {
        /// Descriptive agent label; the agent itself is bound per engine
        #[serde(default, skip_serializing_if = "Option::is_none")]
        agent: Option<String>,
        /// State keys passed to the agent
        #[serde(default)]
        input: Vec<String>,
    },
    /// Run a built-in system action such as a file read or write
    SystemAction {
        /// Action discriminator
        agent: SystemAction,
        #[serde(default)]
        input: Vec<String>,
    },
    /// Repeat a body of sub-steps once per element of a state list
    Loop {
        /// `<listKey>.<itemKey>`
        loop_over: String,
        /// Loop body
        #[serde(rename = "sub-steps", alias = "sub_steps")]
        sub_steps: Vec<Step>,
    },
}

/// System action discriminator
///
/// Unrecognised names are kept rather than rejected so that documents written
/// for a newer vocabulary still load.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum SystemAction {
    FileRead,
    FileWrite,
    Unknown(String),
}

impl SystemAction {
    pub fn as_str(&self) -> &str {
        match self {
            Self::FileRead => "file_read",
            Self::FileWrite => "file_write",
            Self::Unknown(name) => name,
        }
    }
}

impl From<String> for SystemAction {
    fn from(s: String) -> Self {
        match s.as_str() {
            "file_read" => Self::FileRead,
            "file_write" => Self::FileWrite,
            _ => Self::Unknown(s),
        }
    }
}

impl From<SystemAction> for String {
    fn from(action: SystemAction) -> Self {
        action.as_str().to_string()
    }
}

impl std::fmt::Display for SystemAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Step transition (what to do next)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum NextStep {
    /// Go to a specific step
    Goto(String),
    /// Branch on the step's first declared output
    Branch { on_success: String, on_failure: String },
}

impl NextStep {
    /// Step ids this transition can lead to
    pub fn targets(&self) -> Vec<&str> {
        match self {
            Self::Goto(id) => vec![id.as_str()],
            Self::Branch {
                on_success,
                on_failure,
            } => vec![on_success.as_str(), on_failure.as_str()],
        }
    }
}

/// Parsed form of a loop step's `loop_over`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoopOver {
    /// State key holding the list to iterate
    pub list_key: String,
    /// State key the current element is published under
    pub item_key: String,
}

impl LoopOver {
    /// Parse `"<listKey>.<itemKey>"`
    pub fn parse(step_id: &str, value: &str) -> Result<Self> {
        let invalid = || FlowError::InvalidLoopOver {
            step_id: step_id.to_string(),
            value: value.to_string(),
        };

        let (list_key, item_key) = value.split_once('.').ok_or_else(invalid)?;
        if list_key.is_empty() || item_key.is_empty() || item_key.contains('.') {
            return Err(invalid());
        }

        Ok(Self {
            list_key: list_key.to_string(),
            item_key: item_key.to_string(),
        })
    }
}

impl Step {
    /// Create a step of the given kind with no outputs or transition
    pub fn new(id: impl Into<String>, kind: StepKind) -> Self {
        Self {
            id: id.into(),
            description: String::new(),
            kind,
            output: Vec::new(),
            next_step: None,
        }
    }

    /// Set the declared outputs
    pub fn with_output<I, S>(mut self, output: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.output = output.into_iter().map(Into::into).collect();
        self
    }

    /// Set the transition
    pub fn with_next(mut self, next: NextStep) -> Self {
        self.next_step = Some(next);
        self
    }

    /// The effective transition; an empty id counts as none
    pub fn transition(&self) -> Option<&NextStep> {
        match &self.next_step {
            Some(NextStep::Goto(id)) if id.is_empty() => None,
            other => other.as_ref(),
        }
    }

    /// Short kind name, as written in documents
    pub fn kind_name(&self) -> &'static str {
        match self.kind {
            StepKind::UserInput { .. } => "user_input",
            StepKind::AgentAction { .. } => "agent_action",
            StepKind::SystemAction { .. } => "system_action",
            StepKind::Loop { .. } => "loop",
        }
    }

    /// Loop body, empty for non-loop steps
    pub fn sub_steps(&self) -> &[Step] {
        match &self.kind {
            StepKind::Loop { sub_steps, .. } => sub_steps,
            _ => &[],
        }
    }
}

impl Workflow {
    /// Parse a workflow document (YAML or JSON) and validate it
    ///
    /// `${VAR:default}` placeholders are expanded as in
    /// [`load_workflow_file`](crate::config::load_workflow_file). `$include`
    /// needs a file to resolve against and is rejected here.
    pub fn parse(content: &str) -> Result<Self> {
        loader::parse_document(content, None)
    }

    /// Position of a top-level step
    pub fn step_index(&self, id: &str) -> Option<usize> {
        self.steps.iter().position(|s| s.id == id)
    }

    /// Check structural rules that must hold before the workflow can run
    pub fn validate(&self) -> Result<()> {
        if self.steps.is_empty() {
            return Err(FlowError::InvalidWorkflow(format!(
                "Workflow '{}' has no steps",
                self.name
            )));
        }
        validate_scope(&self.steps, false)
    }
}

fn validate_scope(steps: &[Step], in_loop: bool) -> Result<()> {
    let mut ids = HashSet::new();

    for step in steps {
        if step.id.is_empty() {
            return Err(FlowError::InvalidWorkflow("Step with empty id".to_string()));
        }
        if !ids.insert(step.id.as_str()) {
            return Err(FlowError::InvalidWorkflow(format!(
                "Duplicate step id: {}",
                step.id
            )));
        }

        if let StepKind::Loop {
            loop_over,
            sub_steps,
        } = &step.kind
        {
            if in_loop {
                return Err(FlowError::NestedLoop {
                    step_id: step.id.clone(),
                });
            }
            LoopOver::parse(&step.id, loop_over)?;
            if sub_steps.is_empty() {
                return Err(FlowError::InvalidWorkflow(format!(
                    "Loop '{}' has no sub-steps",
                    step.id
                )));
            }
            validate_scope(sub_steps, true)?;
        }

        if let Some(NextStep::Branch { .. }) = step.transition() {
            if step.output.is_empty() {
                return Err(FlowError::InvalidWorkflow(format!(
                    "Step '{}' branches but declares no output to branch on",
                    step.id
                )));
            }
        }
    }

    for step in steps {
        if let Some(next) = step.transition() {
            for target in next.targets() {
                if !ids.contains(target) {
                    return Err(FlowError::UnknownStep {
                        step_id: target.to_string(),
                    });
                }
            }
        }
    }

    Ok(())
}
