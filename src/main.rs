//! Flowpilot - workflow autopilot for spec-driven development.
//!
//! Drives an external SDD CLI from plan to verified implementation:
//! creates plans and specs, decomposes them into tasks, runs the execution
//! pipeline, and reports workflow status.

use std::io;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::{generate, Shell};
use tokio::sync::mpsc;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use flowpilot::{
    cancel_pair, Config, LogLevel, MapFormat, PhaseOrchestrator, PipelineEvent, PromptKind,
    SessionError, SessionFlow, SessionOutcome, ToolDriver, ToolEvent,
};

/// Workflow autopilot for spec-driven development
#[derive(Parser)]
#[command(name = "flowpilot")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Subcommand to run
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Override the SDD tool binary
    #[arg(long, global = true)]
    tool: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Execute the full pipeline against a plan
    Run {
        /// Plan reference (filename under the planning dir, or a path)
        plan: String,

        /// Agent to execute with (defaults to the configured agent)
        #[arg(short, long)]
        agent: Option<String>,

        /// Skip the agent availability check
        #[arg(long)]
        no_agent_check: bool,
    },

    /// Create a plan document
    Plan {
        /// Plan title
        title: String,
    },

    /// Create a feature specification
    Spec {
        /// Feature description
        description: String,

        /// Spec title
        #[arg(short, long)]
        title: Option<String>,
    },

    /// Verify an implementation against a plan
    Verify {
        /// Plan file
        plan: String,

        /// Print the verification prompt instead of running verification
        #[arg(long)]
        prompt: bool,

        /// Spec file to verify against (with --prompt)
        #[arg(long)]
        spec: Option<String>,
    },

    /// Decompose a plan into atomic tasks
    Decompose {
        /// Plan file
        plan: String,
    },

    /// Print the execution prompt for a plan or verification
    Prompt {
        /// Prompt kind (plan, verify)
        kind: PromptKind,

        /// Target file
        file: String,
    },

    /// Generate a compressed codebase map
    Map {
        /// Output format (summary, markdown, json)
        #[arg(short, long, default_value = "summary")]
        format: MapFormat,
    },

    /// Work with a plan's task queue
    Tasks {
        /// Tasks operation
        #[command(subcommand)]
        operation: TasksOperation,
    },

    /// Execute a single task with an agent
    Exec {
        /// Task specification
        task: String,

        /// Plan reference
        plan: String,

        /// Agent to execute with
        #[arg(short, long)]
        agent: Option<String>,
    },

    /// Show the tool's workflow status
    Status {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Manage the tool's workflow lifecycle
    Workflow {
        /// Workflow operation
        #[command(subcommand)]
        operation: WorkflowOperation,
    },

    /// Check which execution agents are available
    Agents,

    /// Log in to an agent CLI
    Login {
        /// Agent CLI binary (e.g. claude, gemini)
        agent: String,

        /// Hard timeout for the interactive login, in seconds
        #[arg(long)]
        timeout_secs: Option<u64>,
    },

    /// Check that the SDD tool is installed and reachable
    Doctor,

    /// Show configuration
    Config {
        /// Show config file path
        #[arg(long)]
        path: bool,
    },

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        shell: Shell,
    },
}

/// Task queue operations.
#[derive(Subcommand)]
enum TasksOperation {
    /// Show the next pending task with its prompt
    Next {
        /// Plan reference
        plan: String,
    },

    /// List all tasks
    List {
        /// Plan reference
        plan: String,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Mark a task as in progress
    Start {
        /// Plan reference
        plan: String,

        /// Task id (e.g. task-2)
        task: String,
    },

    /// Mark a task as complete
    Complete {
        /// Plan reference
        plan: String,

        /// Task id (e.g. task-2)
        task: String,
    },
}

/// Workflow lifecycle operations.
#[derive(Subcommand)]
enum WorkflowOperation {
    /// Start a new workflow
    Start {
        /// Workflow name
        name: String,
    },

    /// Show guidance for the next step
    Next,

    /// Transition to a specific phase
    Transition {
        /// Target phase
        phase: String,

        /// Reason for the transition
        #[arg(short, long)]
        reason: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Setup logging
    let filter = if cli.verbose { EnvFilter::new("debug") } else { EnvFilter::new("warn") };
    tracing_subscriber::registry().with(fmt::layer().with_target(false)).with(filter).init();

    let mut config = Config::load()?;
    if let Some(tool) = cli.tool {
        config.tool.command = tool;
    }

    match cli.command {
        Commands::Run { plan, agent, no_agent_check } => {
            cmd_run(&config, &plan, agent.as_deref(), no_agent_check).await?;
        }
        Commands::Plan { title } => {
            cmd_plan(&config, &title).await?;
        }
        Commands::Spec { description, title } => {
            cmd_spec(&config, &description, title.as_deref()).await?;
        }
        Commands::Verify { plan, prompt, spec } => {
            cmd_verify(&config, &plan, prompt, spec.as_deref()).await?;
        }
        Commands::Decompose { plan } => {
            cmd_decompose(&config, &plan).await?;
        }
        Commands::Prompt { kind, file } => {
            cmd_prompt(&config, kind, &file).await?;
        }
        Commands::Map { format } => {
            cmd_map(&config, format).await?;
        }
        Commands::Tasks { operation } => {
            cmd_tasks(&config, operation).await?;
        }
        Commands::Exec { task, plan, agent } => {
            cmd_exec(&config, &task, &plan, agent.as_deref()).await?;
        }
        Commands::Status { json } => {
            cmd_status(&config, json).await?;
        }
        Commands::Workflow { operation } => {
            cmd_workflow(&config, operation).await?;
        }
        Commands::Agents => {
            cmd_agents(&config).await?;
        }
        Commands::Login { agent, timeout_secs } => {
            cmd_login(&config, &agent, timeout_secs).await?;
        }
        Commands::Doctor => {
            cmd_doctor(&config).await?;
        }
        Commands::Config { path } => {
            cmd_config(&config, path)?;
        }
        Commands::Completions { shell } => {
            cmd_completions(shell);
        }
    }

    Ok(())
}

/// Render one pipeline event to the terminal.
fn print_pipeline_event(event: &PipelineEvent) {
    match event {
        PipelineEvent::Log { level, message } => match level {
            LogLevel::Error => eprintln!("[{}] {}", level.tag(), message),
            _ => println!("[{}] {}", level.tag(), message),
        },
        PipelineEvent::Progress(percent) => {
            println!("[progress] {percent:.0}%");
        }
        // Run/phase boundaries are already narrated through Log events
        _ => {}
    }
}

/// Execute the full pipeline.
async fn cmd_run(
    config: &Config,
    plan: &str,
    agent: Option<&str>,
    no_agent_check: bool,
) -> Result<()> {
    let agent = agent.unwrap_or(&config.pipeline.default_agent).to_string();

    let (pipeline_tx, mut pipeline_rx) = mpsc::unbounded_channel();
    let (tool_tx, mut tool_rx) = mpsc::unbounded_channel();

    let driver = Arc::new(ToolDriver::from_config(config).with_events(tool_tx));
    let mut orchestrator = PhaseOrchestrator::new(driver, config, pipeline_tx);
    if no_agent_check {
        orchestrator = orchestrator.gate_agent(false);
    }

    // Render both event streams live while the pipeline runs
    let printer = tokio::spawn(async move {
        let mut pipeline_open = true;
        let mut tool_open = true;
        while pipeline_open || tool_open {
            tokio::select! {
                event = pipeline_rx.recv(), if pipeline_open => match event {
                    Some(event) => print_pipeline_event(&event),
                    None => pipeline_open = false,
                },
                event = tool_rx.recv(), if tool_open => match event {
                    Some(ToolEvent::Stdout(chunk) | ToolEvent::Stderr(chunk)) => {
                        print!("{chunk}");
                    }
                    None => tool_open = false,
                },
            }
        }
    });

    let outcome = orchestrator.execute(plan, &agent).await;
    let summary = outcome.map(|run| (run.id, run.phases.len()));

    // Dropping the orchestrator closes both event channels
    drop(orchestrator);
    let _ = printer.await;

    let (run_id, phases) = summary?;
    println!("\nRun {run_id} finished: {phases} phases completed");
    Ok(())
}

/// Create a plan.
async fn cmd_plan(config: &Config, title: &str) -> Result<()> {
    let driver = ToolDriver::from_config(config);
    let result = driver.plan(title).await?;
    println!("Plan created: {}", result.full_path);
    println!("Run the pipeline with: flowpilot run {}", result.filename);
    Ok(())
}

/// Create a spec.
async fn cmd_spec(config: &Config, description: &str, title: Option<&str>) -> Result<()> {
    let driver = ToolDriver::from_config(config);
    let result = driver.spec(description, title).await?;
    if result.title.is_empty() {
        println!("Spec created: {}", result.full_path);
    } else {
        println!("Spec created: {} ({})", result.full_path, result.title);
    }
    Ok(())
}

/// Verify an implementation, or print the verification prompt.
async fn cmd_verify(config: &Config, plan: &str, prompt: bool, spec: Option<&str>) -> Result<()> {
    let driver = ToolDriver::from_config(config);

    if prompt {
        let text = driver.verify_prompt(plan, spec).await?;
        println!("{text}");
        return Ok(());
    }

    let result = driver.verify(plan).await?;
    println!("Report: {}", result.full_path);
    if let Some(status) = result.status {
        println!("Status: {status:?}");
    }
    if let (Some(passed), Some(total)) = (result.checks_passed, result.checks_total) {
        println!("Checks: {passed}/{total}");
    }
    Ok(())
}

/// Decompose a plan into tasks.
async fn cmd_decompose(config: &Config, plan: &str) -> Result<()> {
    let driver = ToolDriver::from_config(config);
    let result = driver.decompose(plan).await?;
    println!("Decomposed {} into {} tasks:", result.plan_ref, result.tasks_count);
    for task in &result.tasks {
        println!("  {} [{:?}] {}", task.id, task.status, task.title);
    }
    Ok(())
}

/// Print an execution prompt.
async fn cmd_prompt(config: &Config, kind: PromptKind, file: &str) -> Result<()> {
    let driver = ToolDriver::from_config(config);
    let prompt = driver.prompt(kind, file).await?;
    println!("{prompt}");
    Ok(())
}

/// Generate a codebase map.
async fn cmd_map(config: &Config, format: MapFormat) -> Result<()> {
    let driver = ToolDriver::from_config(config);
    let result = driver.map(format).await?;
    println!("{}", result.content.trim_end());
    if result.files_count > 0 {
        println!(
            "\n{} files, {} symbols, languages: {}",
            result.files_count,
            result.symbols_count,
            result.languages.join(", ")
        );
    }
    Ok(())
}

/// Task queue operations.
async fn cmd_tasks(config: &Config, operation: TasksOperation) -> Result<()> {
    let driver = ToolDriver::from_config(config);

    match operation {
        TasksOperation::Next { plan } => {
            let result = driver.tasks_next(&plan).await?;
            if result.all_completed {
                println!("All tasks completed 🎉");
            } else if let Some(task) = &result.task {
                println!("Next task: {} - {}", task.id, task.title);
                println!("\n{}", result.prompt);
            } else {
                println!("{}", result.prompt);
            }
        }
        TasksOperation::List { plan, json } => {
            let result = driver.tasks_list(&plan).await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&result)?);
            } else {
                for task in &result.tasks {
                    println!("{} [{:?}] {}", task.id, task.status, task.title);
                }
                println!("\nTotal: {} tasks", result.tasks_count);
            }
        }
        TasksOperation::Start { plan, task } => {
            driver.tasks_start(&plan, &task).await?;
            println!("Started {task}");
        }
        TasksOperation::Complete { plan, task } => {
            driver.tasks_complete(&plan, &task).await?;
            println!("Completed {task}");
        }
    }

    Ok(())
}

/// Execute a single task with an agent.
async fn cmd_exec(config: &Config, task: &str, plan: &str, agent: Option<&str>) -> Result<()> {
    let agent = agent.unwrap_or(&config.pipeline.default_agent);
    let driver = ToolDriver::from_config(config);
    let output = driver.exec(task, plan, agent).await?;
    println!("{output}");
    Ok(())
}

/// Show the tool's workflow status.
async fn cmd_status(config: &Config, json: bool) -> Result<()> {
    let driver = ToolDriver::from_config(config);
    let status = driver.workflow_status().await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&status)?);
        return Ok(());
    }

    println!("Workflow {} ({})", status.id, status.name);
    println!("Current phase: {}", status.current_phase);
    if !status.next_phase.is_empty() {
        println!("Suggested next: {}", status.next_phase);
    }
    let artifact = |label: &str, path: &Option<String>| match path {
        Some(path) => println!("  {label}: {path}"),
        None => println!("  {label}: (none)"),
    };
    artifact("Spec", &status.spec_path);
    artifact("Plan", &status.plan_path);
    artifact("Tasks", &status.task_queue_path);
    artifact("Verification", &status.verify_path);
    println!("{} transitions recorded", status.history_count);
    Ok(())
}

/// Workflow lifecycle operations.
async fn cmd_workflow(config: &Config, operation: WorkflowOperation) -> Result<()> {
    let driver = ToolDriver::from_config(config);

    match operation {
        WorkflowOperation::Start { name } => {
            driver.workflow_start(&name).await?;
            println!("Workflow '{name}' started");
        }
        WorkflowOperation::Next => {
            let guidance = driver.workflow_next().await?;
            println!("{}", guidance.guidance.trim_end());
        }
        WorkflowOperation::Transition { phase, reason } => {
            driver.workflow_transition(&phase, reason.as_deref()).await?;
            println!("Transitioned to {phase}");
        }
    }

    Ok(())
}

/// Check available agents.
async fn cmd_agents(config: &Config) -> Result<()> {
    let driver = ToolDriver::from_config(config);
    let status = driver.agents().await?;

    if status.agents.is_empty() {
        println!("No agents reported by the tool");
        return Ok(());
    }

    for agent in &status.agents {
        let icon = if agent.available { "✅" } else { "❌" };
        println!("{icon} {}", agent.name);
        if let Some(install) = &agent.install_command {
            println!("   Install: {install}");
        }
    }
    Ok(())
}

/// Log in to an agent CLI, with Ctrl-C cancelling the attempt.
async fn cmd_login(config: &Config, agent: &str, timeout_secs: Option<u64>) -> Result<()> {
    let mut flow = SessionFlow::from_config(agent, &config.session);
    if let Some(secs) = timeout_secs {
        flow = flow.with_timeout(Duration::from_secs(secs));
    }

    let (handle, signal) = cancel_pair();
    ctrlc::set_handler(move || handle.cancel())?;

    println!("Logging in to {agent}... (Ctrl-C to cancel)");
    match flow.login(signal).await {
        Ok(SessionOutcome::AlreadyAuthenticated) => {
            println!("Already authenticated");
        }
        Ok(SessionOutcome::Authenticated) => {
            println!("Login successful");
        }
        Ok(SessionOutcome::ManualEntryRequired) => {
            println!("The {agent} CLI is not installed.");
            println!("Set the agent's API key environment variable to authenticate manually,");
            println!("or install the CLI and re-run `flowpilot login {agent}`.");
        }
        Err(SessionError::Cancelled) => {
            println!("Login cancelled");
        }
        Err(err) => return Err(err.into()),
    }
    Ok(())
}

/// Check that the SDD tool is installed and reachable.
async fn cmd_doctor(config: &Config) -> Result<()> {
    let driver = ToolDriver::from_config(config);

    if driver.is_installed().await {
        println!("✅ {} is installed and responding", driver.program());
    } else {
        println!("❌ {} is not installed or not in PATH", driver.program());
        anyhow::bail!("SDD tool not found");
    }

    match driver.agents().await {
        Ok(status) => {
            let available = status.agents.iter().filter(|a| a.available).count();
            println!("   {available}/{} agents available", status.agents.len());
        }
        Err(_) => println!("   (agent listing unavailable)"),
    }

    Ok(())
}

/// Show configuration.
fn cmd_config(config: &Config, path_only: bool) -> Result<()> {
    if path_only {
        match Config::config_dir() {
            Some(dir) => println!("{}", dir.join("config.toml").display()),
            None => println!("(no config directory)"),
        }
        return Ok(());
    }

    println!("{}", toml::to_string_pretty(config)?);
    Ok(())
}

/// Generate shell completions.
fn cmd_completions(shell: Shell) {
    let mut cmd = Cli::command();
    let name = cmd.get_name().to_string();
    generate(shell, &mut cmd, name, &mut io::stdout());
}
