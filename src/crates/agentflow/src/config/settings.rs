//! Engine and host settings
//!
//! Supports dual-location configuration:
//! - User-level: ~/.agentflow/agentflow.toml
//! - Project-level: ./.agentflow/agentflow.toml
//!
//! Project-level values override user-level ones.

use crate::config::loader::expand_env;
use crate::{FlowError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{debug, info};

/// Main settings
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub workflows: WorkflowSettings,

    #[serde(default)]
    pub engine: EngineSettings,

    #[serde(default)]
    pub agent: AgentSettings,

    #[serde(default)]
    pub logging: LoggingSettings,
}

/// Where workflow documents live
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowSettings {
    /// Directory searched by `load_workflow(id)`
    #[serde(default = "default_workflows_dir")]
    pub dir: PathBuf,
}

impl Default for WorkflowSettings {
    fn default() -> Self {
        Self {
            dir: default_workflows_dir(),
        }
    }
}

fn default_workflows_dir() -> PathBuf {
    PathBuf::from("workflows")
}

/// Engine limits
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineSettings {
    /// Maximum steps one drive may execute without finishing a loop item,
    /// and maximum loop entries per drive
    #[serde(default = "default_max_steps_per_run")]
    pub max_steps_per_run: usize,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            max_steps_per_run: default_max_steps_per_run(),
        }
    }
}

fn default_max_steps_per_run() -> usize {
    1000
}

/// External-process agent used by the CLI host
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentSettings {
    /// Program to run; no agent is bound when unset
    #[serde(default)]
    pub command: Option<String>,

    /// Program arguments
    #[serde(default)]
    pub args: Vec<String>,

    /// Seconds to wait for one agent invocation
    #[serde(default = "default_agent_timeout")]
    pub timeout_secs: u64,
}

impl Default for AgentSettings {
    fn default() -> Self {
        Self {
            command: None,
            args: Vec::new(),
            timeout_secs: default_agent_timeout(),
        }
    }
}

fn default_agent_timeout() -> u64 {
    300
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggingSettings {
    /// Log level: "trace", "debug", "info", "warn", "error"
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log format: "compact" or "pretty"
    #[serde(default = "default_log_format")]
    pub format: String,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "compact".to_string()
}

impl Settings {
    /// Parse settings from TOML
    pub fn from_toml(content: &str) -> Result<Self> {
        toml::from_str(content)
            .map_err(|e| FlowError::Config(format!("Failed to parse settings: {}", e)))
    }

    /// Expand `${VAR}` references in the agent command line
    pub fn resolve_env_vars(&mut self) {
        if let Some(command) = self.agent.command.as_mut() {
            let expanded = expand_env(command).into_owned();
            *command = expanded;
        }
        for arg in self.agent.args.iter_mut() {
            let expanded = expand_env(arg).into_owned();
            *arg = expanded;
        }
    }
}

/// Settings loader that handles both user and project files
pub struct SettingsLoader {
    user_path: Option<PathBuf>,
    project_path: Option<PathBuf>,
}

impl SettingsLoader {
    /// Loader for the standard user and project locations
    pub fn new() -> Self {
        Self {
            user_path: dirs::home_dir().map(|home| home.join(".agentflow").join("agentflow.toml")),
            project_path: std::env::current_dir()
                .ok()
                .map(|cwd| cwd.join(".agentflow").join("agentflow.toml")),
        }
    }

    /// Loader for explicit locations
    pub fn with_paths(user_path: Option<PathBuf>, project_path: Option<PathBuf>) -> Self {
        Self {
            user_path,
            project_path,
        }
    }

    /// Load settings with project taking precedence over user
    ///
    /// Files are merged key by key, so a project file only overrides the
    /// values it actually sets.
    pub async fn load(&self) -> Result<Settings> {
        let mut merged = toml::Table::new();

        for path in [&self.user_path, &self.project_path].into_iter().flatten() {
            if !path.exists() {
                debug!(path = %path.display(), "Settings file not found");
                continue;
            }
            let table = Self::load_from_path(path).await?;
            debug!(path = %path.display(), "Loaded settings file");
            deep_merge(&mut merged, table);
        }

        let mut settings: Settings = toml::Value::Table(merged)
            .try_into()
            .map_err(|e| FlowError::Config(format!("Invalid settings: {}", e)))?;
        settings.resolve_env_vars();
        info!("Settings loaded");
        Ok(settings)
    }

    async fn load_from_path(path: &Path) -> Result<toml::Table> {
        let content = fs::read_to_string(path)
            .await
            .map_err(|e| FlowError::Config(format!("Failed to read {}: {}", path.display(), e)))?;
        content
            .parse::<toml::Table>()
            .map_err(|e| FlowError::Config(format!("Failed to parse {}: {}", path.display(), e)))
    }
}

/// Merge `other` into `base`; nested tables merge recursively, everything else is replaced
fn deep_merge(base: &mut toml::Table, other: toml::Table) {
    for (key, other_value) in other {
        match other_value {
            toml::Value::Table(other_table) => {
                if let Some(toml::Value::Table(base_table)) = base.get_mut(&key) {
                    deep_merge(base_table, other_table);
                } else {
                    base.insert(key, toml::Value::Table(other_table));
                }
            }
            other_value => {
                base.insert(key, other_value);
            }
        }
    }
}

impl Default for SettingsLoader {
    fn default() -> Self {
        Self::new()
    }
}
