//! Text rendering of workflow documents and answers

use agentflow::{NextStep, Step, StepKind, Workflow};
use serde_json::Value;
use std::fmt::Write;

/// Step graph, one line per step with loop bodies indented
pub fn describe(workflow: &Workflow) -> String {
    let mut out = format!("{} ({} steps)\n", workflow.name, workflow.steps.len());
    if let Some(description) = &workflow.description {
        let _ = writeln!(out, "  {}", description);
    }
    for step in &workflow.steps {
        describe_step(&mut out, step, 1);
    }
    out
}

fn describe_step(out: &mut String, step: &Step, depth: usize) {
    let indent = "  ".repeat(depth);
    let kind = match &step.kind {
        StepKind::UserInput { .. } => "user_input".to_string(),
        StepKind::AgentAction { agent: Some(agent), .. } => format!("agent_action {}", agent),
        StepKind::AgentAction { agent: None, .. } => "agent_action".to_string(),
        StepKind::SystemAction { agent, .. } => format!("system_action {}", agent),
        StepKind::Loop { loop_over, .. } => format!("loop {}", loop_over),
    };
    let next = match step.transition() {
        Some(NextStep::Goto(id)) => format!("-> {}", id),
        Some(NextStep::Branch {
            on_success,
            on_failure,
        }) => format!("-> yes: {}, no: {}", on_success, on_failure),
        None => "(end)".to_string(),
    };

    let _ = writeln!(out, "{}{} [{}] {}", indent, step.id, kind, next);
    for sub in step.sub_steps() {
        describe_step(out, sub, depth + 1);
    }
}

/// Parse a typed answer: JSON when it parses, plain text otherwise
pub fn parse_value(raw: &str) -> Value {
    serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string()))
}

/// Parse a `key=value` assignment
pub fn parse_assignment(raw: &str) -> Result<(String, Value), String> {
    match raw.split_once('=') {
        Some((key, value)) if !key.trim().is_empty() => {
            Ok((key.trim().to_string(), parse_value(value)))
        }
        _ => Err(format!("expected key=value, got '{}'", raw)),
    }
}
