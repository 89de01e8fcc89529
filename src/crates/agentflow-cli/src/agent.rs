//! External-process agent
//!
//! Runs a configured command once per `agent_action` step. The step inputs go
//! to the child's stdin as a JSON object and the child must print a JSON
//! object holding the step's outputs on stdout.

use agentflow::config::AgentSettings;
use agentflow::{Agent, FlowError, Result, StateMap};
use async_trait::async_trait;
use serde_json::Value;
use std::process::Stdio;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::debug;

pub struct CommandAgent {
    command: String,
    args: Vec<String>,
    timeout: Duration,
}

impl CommandAgent {
    pub fn new(command: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            command: command.into(),
            args,
            timeout: Duration::from_secs(AgentSettings::default().timeout_secs),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Agent described by `settings`, if a command is configured
    pub fn from_settings(settings: &AgentSettings) -> Option<Self> {
        let command = settings.command.as_deref().filter(|c| !c.is_empty())?;
        Some(
            Self::new(command, settings.args.clone())
                .with_timeout(Duration::from_secs(settings.timeout_secs)),
        )
    }
}

#[async_trait]
impl Agent for CommandAgent {
    fn name(&self) -> &str {
        &self.command
    }

    async fn run_agent(&self, inputs: StateMap) -> Result<StateMap> {
        let payload = serde_json::to_vec(&inputs)?;

        let mut child = Command::new(&self.command)
            .args(&self.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| FlowError::Agent(format!("Failed to start '{}': {}", self.command, e)))?;

        let mut stdin = child
            .stdin
            .take()
            .ok_or_else(|| FlowError::Agent("Agent stdin unavailable".to_string()))?;
        let writer = tokio::spawn(async move { stdin.write_all(&payload).await });

        let output = tokio::time::timeout(self.timeout, child.wait_with_output())
            .await
            .map_err(|_| {
                FlowError::Agent(format!(
                    "'{}' timed out after {}s",
                    self.command,
                    self.timeout.as_secs_f32()
                ))
            })??;

        if let Ok(Err(e)) = writer.await {
            debug!(error = %e, "Agent closed stdin before reading all inputs");
        }

        if !output.status.success() {
            return Err(FlowError::Agent(format!(
                "'{}' exited with {}: {}",
                self.command,
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }

        match serde_json::from_slice::<Value>(&output.stdout)? {
            Value::Object(outputs) => Ok(outputs),
            other => Err(FlowError::Agent(format!(
                "'{}' printed {} instead of a JSON object",
                self.command, other
            ))),
        }
    }
}
