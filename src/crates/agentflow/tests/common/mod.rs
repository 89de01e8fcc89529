//! Shared fixtures for engine integration tests

#![allow(dead_code)]

use agentflow::config::PromptFragments;
use agentflow::{Agent, NextStep, Result, StateMap, Step, StepKind, Workflow, WorkflowEngine};
use async_trait::async_trait;
use serde_json::{json, Value};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

/// Prompts surfaced by the engine, in order
#[derive(Clone, Default)]
pub struct Prompts(Arc<Mutex<Vec<String>>>);

impl Prompts {
    pub fn count(&self) -> usize {
        self.0.lock().unwrap().len()
    }

    pub fn last(&self) -> Option<String> {
        self.0.lock().unwrap().last().cloned()
    }

    pub fn all(&self) -> Vec<String> {
        self.0.lock().unwrap().clone()
    }
}

/// Agent that answers through a closure and records every call
pub struct ScriptedAgent {
    calls: Arc<Mutex<Vec<StateMap>>>,
    respond: Box<dyn Fn(&StateMap) -> StateMap + Send + Sync>,
}

impl ScriptedAgent {
    pub fn new<F>(respond: F) -> (Self, Arc<Mutex<Vec<StateMap>>>)
    where
        F: Fn(&StateMap) -> StateMap + Send + Sync + 'static,
    {
        let calls = Arc::new(Mutex::new(Vec::new()));
        let agent = Self {
            calls: Arc::clone(&calls),
            respond: Box::new(respond),
        };
        (agent, calls)
    }

    /// Replies with `responses` in order, then with empty maps
    pub fn queue(responses: Vec<Value>) -> (Self, Arc<Mutex<Vec<StateMap>>>) {
        let queue = Mutex::new(VecDeque::from(responses));
        Self::new(move |_| match queue.lock().unwrap().pop_front() {
            Some(Value::Object(map)) => map,
            _ => StateMap::new(),
        })
    }
}

#[async_trait]
impl Agent for ScriptedAgent {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn run_agent(&self, inputs: StateMap) -> Result<StateMap> {
        let output = (self.respond)(&inputs);
        self.calls.lock().unwrap().push(inputs);
        Ok(output)
    }
}

/// Engine whose prompts are recorded
pub fn engine() -> (WorkflowEngine, Prompts) {
    let prompts = Prompts::default();
    let sink = Arc::clone(&prompts.0);
    let engine = WorkflowEngine::new(move |prompt: &str| sink.lock().unwrap().push(prompt.to_string()));
    (engine, prompts)
}

/// Engine with `steps` installed
pub fn engine_with(steps: Vec<Step>) -> (WorkflowEngine, Prompts) {
    let (mut engine, prompts) = engine();
    engine.install_workflow(workflow(steps)).unwrap();
    (engine, prompts)
}

pub fn workflow(steps: Vec<Step>) -> Workflow {
    Workflow {
        name: "test".to_string(),
        description: None,
        steps,
    }
}

pub fn ask(id: &str, outputs: &[&str]) -> Step {
    let mut input = PromptFragments::new();
    input.insert("question".to_string(), json!(format!("Answer for {}", id)));
    Step::new(
        id,
        StepKind::UserInput {
            input,
            prepend: vec![],
        },
    )
    .with_output(outputs.iter().copied())
}

pub fn agent(id: &str, inputs: &[&str], outputs: &[&str]) -> Step {
    Step::new(
        id,
        StepKind::AgentAction {
            agent: Some("coder".to_string()),
            input: inputs.iter().map(|s| s.to_string()).collect(),
        },
    )
    .with_output(outputs.iter().copied())
}

pub fn each(id: &str, loop_over: &str, body: Vec<Step>) -> Step {
    Step::new(
        id,
        StepKind::Loop {
            loop_over: loop_over.to_string(),
            sub_steps: body,
        },
    )
}

pub fn goto(id: &str) -> NextStep {
    NextStep::Goto(id.to_string())
}

pub fn branch(on_success: &str, on_failure: &str) -> NextStep {
    NextStep::Branch {
        on_success: on_success.to_string(),
        on_failure: on_failure.to_string(),
    }
}

/// Build a state map from a JSON object literal
pub fn values(value: Value) -> StateMap {
    match value {
        Value::Object(map) => map,
        other => panic!("expected a JSON object, got {}", other),
    }
}
