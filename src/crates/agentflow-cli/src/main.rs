//! # agentflow
//!
//! Terminal host for agentflow workflows: prints prompts, reads answers from
//! stdin and drives an external-process agent.

mod agent;
mod render;

use agent::CommandAgent;
use agentflow::config::load_workflow_file;
use agentflow::logging::init_tracing;
use agentflow::{RunOutcome, SettingsLoader, StateMap, StepKind, WorkflowEngine, WorkflowLoader};
use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use serde_json::Value;
use std::io::Write;
use std::path::{Path, PathBuf};
use tokio::io::{AsyncBufReadExt, BufReader, Lines, Stdin};
use tracing::info;

#[derive(Parser)]
#[command(name = "agentflow")]
#[command(about = "Run declarative agent workflows from the terminal", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a workflow interactively
    Run {
        /// Workflow id, resolved inside the workflows directory
        id: String,

        /// Directory holding workflow documents
        #[arg(short = 'd', long, env = "AGENTFLOW_WORKFLOWS_DIR")]
        workflows_dir: Option<PathBuf>,

        /// Command run for every agent action
        #[arg(short, long, env = "AGENTFLOW_AGENT_COMMAND")]
        agent_command: Option<String>,

        /// Seed a state value before the run (repeatable)
        #[arg(short, long = "set", value_name = "KEY=VALUE", value_parser = render::parse_assignment)]
        set: Vec<(String, Value)>,

        /// Stop after this many completed passes
        #[arg(short, long, default_value_t = 1)]
        passes: usize,
    },

    /// Parse and validate a workflow document
    Validate {
        /// Path to a YAML or JSON document
        file: PathBuf,
    },

    /// Print the step graph of a workflow document
    Show {
        /// Path to a YAML or JSON document
        file: PathBuf,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Run {
            id,
            workflows_dir,
            agent_command,
            set,
            passes,
        } => run(id, workflows_dir, agent_command, set, passes).await,
        Commands::Validate { file } => validate(&file),
        Commands::Show { file } => show(&file),
    }
}

async fn run(
    id: String,
    workflows_dir: Option<PathBuf>,
    agent_command: Option<String>,
    seed: Vec<(String, Value)>,
    passes: usize,
) -> anyhow::Result<()> {
    let mut settings = SettingsLoader::new().load().await?;
    init_tracing(&settings.logging)?;

    if let Some(dir) = workflows_dir {
        settings.workflows.dir = dir;
    }
    if let Some(command) = agent_command {
        settings.agent.command = Some(command);
    }

    let mut engine = WorkflowEngine::new(|prompt: &str| println!("{}", prompt))
        .with_loader(WorkflowLoader::new(&settings.workflows.dir))
        .with_settings(settings.engine.clone());

    match CommandAgent::from_settings(&settings.agent) {
        Some(agent) => engine.set_agent(agent),
        None => info!("No agent command configured; agent actions will fail"),
    }

    if !engine.load_workflow(&id)? {
        bail!(
            "No workflow '{}' in {}",
            id,
            settings.workflows.dir.display()
        );
    }
    for (key, value) in seed {
        engine.state_mut().insert(key, value);
    }

    let mut answers = BufReader::new(tokio::io::stdin()).lines();
    let mut completed = 0;
    let mut outcome = engine.execute_workflow().await?;

    loop {
        match outcome {
            RunOutcome::Idle => break,
            RunOutcome::Completed => {
                completed += 1;
                info!(passes = completed, "Workflow pass complete");
                if completed >= passes {
                    break;
                }
                outcome = engine.execute_workflow().await?;
            }
            RunOutcome::Suspended => {
                let keys = engine.awaiting_outputs().to_vec();
                match read_answers(&mut answers, &keys).await? {
                    Some(values) => outcome = engine.set_user_input(values).await?,
                    None => {
                        info!("Input closed, stopping");
                        break;
                    }
                }
            }
        }
    }

    println!("{}", serde_json::to_string_pretty(engine.state().as_map())?);
    engine.exit_workflow();
    Ok(())
}

/// One line per awaited key; `None` once stdin is exhausted
async fn read_answers(
    lines: &mut Lines<BufReader<Stdin>>,
    keys: &[String],
) -> anyhow::Result<Option<StateMap>> {
    let mut values = StateMap::new();
    for key in keys {
        print!("{}> ", key);
        std::io::stdout().flush()?;

        match lines.next_line().await? {
            Some(line) => {
                values.insert(key.clone(), render::parse_value(line.trim()));
            }
            None => return Ok(None),
        }
    }
    Ok(Some(values))
}

fn validate(file: &Path) -> anyhow::Result<()> {
    let workflow = load_workflow_file(file)
        .with_context(|| format!("Invalid workflow document {}", file.display()))?;

    let loops = workflow
        .steps
        .iter()
        .filter(|s| matches!(s.kind, StepKind::Loop { .. }))
        .count();
    let body_steps: usize = workflow.steps.iter().map(|s| s.sub_steps().len()).sum();

    println!("✓ Workflow is valid");
    println!("  Name: {}", workflow.name);
    println!("  Steps: {}", workflow.steps.len());
    println!("  Loops: {} ({} body steps)", loops, body_steps);
    Ok(())
}

fn show(file: &Path) -> anyhow::Result<()> {
    let workflow = load_workflow_file(file)
        .with_context(|| format!("Invalid workflow document {}", file.display()))?;
    print!("{}", render::describe(&workflow));
    Ok(())
}
