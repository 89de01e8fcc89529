//! Workflow engine
//!
//! Owns one workflow run: the installed definition, the execution state, the
//! step cursor and the single loop cursor. [`WorkflowEngine::execute_workflow`]
//! drives steps until a `user_input` step suspends or the workflow runs out of
//! transitions; a finished pass rewinds to the first step so the next drive
//! starts over with the state it left behind.
//!
//! Suspension is a flag, not a blocked task. The host surfaces the prompt,
//! collects the answer however it likes and hands it back through
//! [`WorkflowEngine::set_user_input`].

use crate::agent::{Agent, InputProvider};
use crate::config::{EngineSettings, LoopOver, Step, StepKind, Workflow, WorkflowLoader, WorkflowSettings};
use crate::executor::{execute_step, StepContext, StepOutcome};
use crate::state::{ExecutionState, LoopCursor, StateMap};
use crate::tools::{FileTools, LocalFileTools};
use crate::transition::{find_step, resolve_next};
use crate::{FlowError, Result};
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, info, info_span, warn, Instrument};
use uuid::Uuid;

/// What a drive of the engine ended with
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    /// Nothing ran: no workflow is installed, or the call was ignored
    Idle,
    /// A `user_input` step is waiting for [`WorkflowEngine::set_user_input`]
    Suspended,
    /// The workflow finished a pass and rewound to its first step
    Completed,
}

/// Engine state as seen from outside
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineStatus {
    /// No workflow installed
    Idle,
    /// A workflow is installed and the next drive will run steps
    Ready,
    /// Waiting for user input
    Suspended,
}

/// Progress through the active loop
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoopProgress {
    /// Position of the element being processed
    pub index: usize,
    /// Number of elements snapshotted on entry
    pub len: usize,
}

/// Drives a single workflow run
pub struct WorkflowEngine {
    workflow: Option<Arc<Workflow>>,
    loader: WorkflowLoader,
    settings: EngineSettings,
    agent: Option<Arc<dyn Agent>>,
    input_provider: Arc<dyn InputProvider>,
    files: Arc<dyn FileTools>,
    state: ExecutionState,
    /// Index of the current top-level step
    current: usize,
    loop_cursor: Option<LoopCursor>,
    suspended: bool,
    run_id: Uuid,
}

impl WorkflowEngine {
    /// Create an engine that surfaces prompts through `input_provider`
    ///
    /// Workflows load from the default `workflows` directory and system
    /// actions use the local filesystem.
    pub fn new<P>(input_provider: P) -> Self
    where
        P: InputProvider + 'static,
    {
        Self {
            workflow: None,
            loader: WorkflowLoader::new(WorkflowSettings::default().dir),
            settings: EngineSettings::default(),
            agent: None,
            input_provider: Arc::new(input_provider),
            files: Arc::new(LocalFileTools::new()),
            state: ExecutionState::new(),
            current: 0,
            loop_cursor: None,
            suspended: false,
            run_id: Uuid::nil(),
        }
    }

    /// Load workflows through `loader`
    pub fn with_loader(mut self, loader: WorkflowLoader) -> Self {
        self.loader = loader;
        self
    }

    /// Apply engine limits
    pub fn with_settings(mut self, settings: EngineSettings) -> Self {
        self.settings = settings;
        self
    }

    /// Use `files` for `file_read`/`file_write` system actions
    pub fn with_file_tools<F>(mut self, files: F) -> Self
    where
        F: FileTools + 'static,
    {
        self.files = Arc::new(files);
        self
    }

    /// Bind the agent that performs every `agent_action` step
    pub fn set_agent<A>(&mut self, agent: A)
    where
        A: Agent + 'static,
    {
        info!(agent = agent.name(), "Agent bound");
        self.agent = Some(Arc::new(agent));
    }

    /// Load the workflow named `id` through the engine's loader
    ///
    /// A missing document is logged and leaves the engine as it was; the
    /// return value says whether a workflow was installed. Documents that
    /// exist but fail to parse or validate are errors.
    pub fn load_workflow(&mut self, id: &str) -> Result<bool> {
        match self.loader.load(id) {
            Ok(workflow) => {
                self.install(workflow);
                Ok(true)
            }
            Err(FlowError::WorkflowNotFound { id }) => {
                warn!(workflow_id = %id, dir = %self.loader.dir().display(), "No workflow found");
                Ok(false)
            }
            Err(e) => Err(e),
        }
    }

    /// Install an already-parsed workflow after validating it
    pub fn install_workflow(&mut self, workflow: Workflow) -> Result<()> {
        workflow.validate()?;
        self.install(workflow);
        Ok(())
    }

    fn install(&mut self, workflow: Workflow) {
        self.run_id = Uuid::new_v4();
        info!(
            workflow = %workflow.name,
            steps = workflow.steps.len(),
            run_id = %self.run_id,
            "Starting workflow"
        );
        self.workflow = Some(Arc::new(workflow));
        self.current = 0;
        self.loop_cursor = None;
        self.suspended = false;
    }

    /// Run steps from the cursor until the engine suspends or a pass finishes
    ///
    /// Returns [`RunOutcome::Idle`] when no workflow is installed. While
    /// suspended nothing runs and [`RunOutcome::Suspended`] is returned again.
    /// A step that fails leaves the cursor on itself.
    pub async fn execute_workflow(&mut self) -> Result<RunOutcome> {
        let workflow = match &self.workflow {
            Some(workflow) => Arc::clone(workflow),
            None => {
                debug!("No workflow installed");
                return Ok(RunOutcome::Idle);
            }
        };

        if self.suspended {
            debug!(step_id = ?self.current_step_id(), "Still waiting for user input");
            return Ok(RunOutcome::Suspended);
        }

        let span = info_span!("workflow", workflow = %workflow.name, run_id = %self.run_id);
        self.drive(&workflow).instrument(span).await
    }

    /// Deliver the answer to the suspended `user_input` step and keep driving
    ///
    /// Each output the step declares is copied from `values`; a declared
    /// output missing from `values` is stored as `null`. Calls made while the
    /// engine is not suspended are ignored.
    pub async fn set_user_input(&mut self, values: StateMap) -> Result<RunOutcome> {
        let workflow = match &self.workflow {
            Some(workflow) if self.suspended => Arc::clone(workflow),
            _ => {
                warn!("User input received while not waiting for it, ignoring");
                return Ok(RunOutcome::Idle);
            }
        };

        let span = info_span!("workflow", workflow = %workflow.name, run_id = %self.run_id);
        self.resume(&workflow, values).instrument(span).await
    }

    /// Drop the workflow, its state and every cursor
    pub fn exit_workflow(&mut self) {
        if let Some(workflow) = &self.workflow {
            info!(workflow = %workflow.name, run_id = %self.run_id, "Exiting workflow");
        }
        self.workflow = None;
        self.state.clear();
        self.current = 0;
        self.loop_cursor = None;
        self.suspended = false;
        self.run_id = Uuid::nil();
    }

    pub fn status(&self) -> EngineStatus {
        match (&self.workflow, self.suspended) {
            (None, _) => EngineStatus::Idle,
            (Some(_), true) => EngineStatus::Suspended,
            (Some(_), false) => EngineStatus::Ready,
        }
    }

    pub fn is_suspended(&self) -> bool {
        self.suspended
    }

    /// Id of the step under the cursor (a loop body step while a loop is active)
    pub fn current_step_id(&self) -> Option<&str> {
        let workflow = self.workflow.as_deref()?;
        self.cursor_step(workflow).ok().map(|step| step.id.as_str())
    }

    /// Output names the suspended step expects; empty when not suspended
    pub fn awaiting_outputs(&self) -> &[String] {
        match self.workflow.as_deref() {
            Some(workflow) if self.suspended => self
                .cursor_step(workflow)
                .map(|step| step.output.as_slice())
                .unwrap_or(&[]),
            _ => &[],
        }
    }

    pub fn loop_progress(&self) -> Option<LoopProgress> {
        self.loop_cursor.as_ref().map(|cursor| LoopProgress {
            index: cursor.current_index,
            len: cursor.items.len(),
        })
    }

    pub fn workflow(&self) -> Option<&Workflow> {
        self.workflow.as_deref()
    }

    pub fn state(&self) -> &ExecutionState {
        &self.state
    }

    /// Mutable state, for seeding values before a drive
    pub fn state_mut(&mut self) -> &mut ExecutionState {
        &mut self.state
    }

    /// Identifier of the installed workflow's run
    pub fn run_id(&self) -> Option<Uuid> {
        self.workflow.as_ref().map(|_| self.run_id)
    }

    async fn resume(&mut self, workflow: &Workflow, mut values: StateMap) -> Result<RunOutcome> {
        let step = self.cursor_step(workflow)?;

        for key in &step.output {
            let value = values.remove(key).unwrap_or_else(|| {
                warn!(step_id = %step.id, key = %key, "Declared output missing from user input, storing null");
                Value::Null
            });
            self.state.insert(key.clone(), value);
        }
        for key in values.keys() {
            warn!(step_id = %step.id, key = %key, "Ignoring undeclared user input key");
        }

        info!(step_id = %step.id, "User input received, resuming");
        self.suspended = false;

        if self.advance(workflow)? {
            return Ok(RunOutcome::Completed);
        }
        self.drive(workflow).await
    }

    async fn drive(&mut self, workflow: &Workflow) -> Result<RunOutcome> {
        let limit = self.settings.max_steps_per_run;
        // Steps since the last loop item finished, and loop entries in this drive
        let mut executed = 0usize;
        let mut entries = 0usize;

        loop {
            if self.loop_cursor.as_ref().is_some_and(LoopCursor::is_complete) {
                if self.leave_loop(workflow)? {
                    return Ok(RunOutcome::Completed);
                }
                continue;
            }

            executed += 1;
            if executed > limit {
                return Err(FlowError::StepLimitExceeded { limit });
            }

            let step = self.cursor_step(workflow)?;
            if let StepKind::Loop { loop_over, .. } = &step.kind {
                entries += 1;
                if entries > limit {
                    return Err(FlowError::StepLimitExceeded { limit });
                }
                self.enter_loop(step, loop_over)?;
                continue;
            }

            let outcome = {
                let mut ctx = StepContext {
                    state: &mut self.state,
                    agent: self.agent.as_deref(),
                    input_provider: self.input_provider.as_ref(),
                    files: self.files.as_ref(),
                };
                execute_step(step, &mut ctx).await?
            };

            if outcome == StepOutcome::Suspended {
                self.suspended = true;
                return Ok(RunOutcome::Suspended);
            }

            let iteration = self.loop_progress();
            if self.advance(workflow)? {
                return Ok(RunOutcome::Completed);
            }
            if self.loop_progress() != iteration {
                executed = 0;
            }
        }
    }

    /// Step under the cursor
    fn cursor_step<'w>(&self, workflow: &'w Workflow) -> Result<&'w Step> {
        match &self.loop_cursor {
            Some(cursor) => loop_body(workflow, cursor.parent)?
                .get(cursor.sub_step)
                .ok_or_else(|| {
                    FlowError::InvalidWorkflow(format!(
                        "Loop body position {} out of range",
                        cursor.sub_step
                    ))
                }),
            None => top_step(workflow, self.current),
        }
    }

    fn enter_loop(&mut self, step: &Step, loop_over: &str) -> Result<()> {
        let LoopOver { list_key, item_key } = LoopOver::parse(&step.id, loop_over)?;

        let items = match self.state.get(&list_key) {
            Some(Value::Array(items)) => items.clone(),
            Some(Value::Null) | None => {
                warn!(step_id = %step.id, key = %list_key, "Loop list missing from state, nothing to iterate");
                Vec::new()
            }
            Some(other) => {
                warn!(step_id = %step.id, key = %list_key, "Loop list is not a list, iterating it as one item");
                vec![other.clone()]
            }
        };

        info!(step_id = %step.id, key = %list_key, items = items.len(), "Entering loop");
        let cursor = LoopCursor::new(self.current, items, item_key);
        cursor.publish(&mut self.state);
        self.loop_cursor = Some(cursor);
        Ok(())
    }

    /// Resolve the finished loop's own transition and drop the cursor
    fn leave_loop(&mut self, workflow: &Workflow) -> Result<bool> {
        let parent = top_step(workflow, self.current)?;
        let next = resolve_next(parent, &self.state)?;
        let finished = self.goto(workflow, next)?;

        let iterations = self.loop_cursor.take().map_or(0, |cursor| cursor.items.len());
        info!(step_id = %parent.id, iterations, "Loop complete");
        Ok(finished)
    }

    /// Move past the completed step under the cursor
    ///
    /// Inside a loop body an explicit transition jumps within the body, no
    /// transition moves to the next sub-step, and running off the end of the
    /// body starts the next iteration. Returns whether the pass finished.
    fn advance(&mut self, workflow: &Workflow) -> Result<bool> {
        let step = self.cursor_step(workflow)?;
        let next = resolve_next(step, &self.state)?;

        if let Some(cursor) = self.loop_cursor.as_mut() {
            let body = loop_body(workflow, cursor.parent)?;
            match next {
                Some(id) => {
                    cursor.sub_step = find_step(body, id)?;
                    debug!(from = %step.id, to = %id, "Loop body transition");
                }
                None if cursor.sub_step + 1 < body.len() => cursor.sub_step += 1,
                None => {
                    cursor.advance();
                    cursor.publish(&mut self.state);
                    debug!(index = cursor.current_index, len = cursor.items.len(), "Loop iteration finished");
                }
            }
            return Ok(false);
        }

        self.goto(workflow, next)
    }

    fn goto(&mut self, workflow: &Workflow, next: Option<&str>) -> Result<bool> {
        match next {
            Some(id) => {
                self.current = find_step(&workflow.steps, id)?;
                debug!(to = %id, "Transition");
                Ok(false)
            }
            None => {
                info!(workflow = %workflow.name, "Workflow complete, restarting from first step");
                self.current = 0;
                Ok(true)
            }
        }
    }
}

fn top_step(workflow: &Workflow, index: usize) -> Result<&Step> {
    workflow.steps.get(index).ok_or_else(|| {
        FlowError::InvalidWorkflow(format!("Step position {} out of range", index))
    })
}

fn loop_body(workflow: &Workflow, parent: usize) -> Result<&[Step]> {
    let parent = top_step(workflow, parent)?;
    match &parent.kind {
        StepKind::Loop { sub_steps, .. } => Ok(sub_steps),
        _ => Err(FlowError::InvalidWorkflow(format!(
            "Step '{}' is not a loop",
            parent.id
        ))),
    }
}
