//! Typed driver for the external SDD tool.
//!
//! One typed async method per tool subcommand, each following the same
//! template: build the argument list, run the tool, turn a non-zero exit
//! into a [`CliError`], decode stdout into the matching result type. No
//! method ever retries; each call is at-most-once against the tool.

mod error;

use std::path::PathBuf;

use tokio::sync::mpsc;
use tracing::debug;

use crate::core::{Config, ToolEvent};
use crate::process::{ProcessResult, ProcessRunner, RunOptions};
use crate::protocol::{
    decode_agents, decode_decompose, decode_map, decode_plan, decode_prompt, decode_spec,
    decode_task, decode_verify, decode_workflow_guidance, decode_workflow_status, AgentStatus,
    DecomposeResult, MapResult, PlanResult, SpecResult, TaskResult, VerifyResult,
    WorkflowGuidance, WorkflowStatus,
};

pub use error::CliError;

/// Which prompt the tool should generate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PromptKind {
    /// Prompt for filling a plan
    Plan,
    /// Prompt for reviewing a verification
    Verify,
}

impl PromptKind {
    /// The subcommand argument for this prompt kind.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Plan => "plan",
            Self::Verify => "verify",
        }
    }
}

impl std::str::FromStr for PromptKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "plan" => Ok(Self::Plan),
            "verify" => Ok(Self::Verify),
            other => Err(format!("unknown prompt kind: {other}")),
        }
    }
}

/// Output format for the codebase map.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum MapFormat {
    /// Condensed summary (default)
    #[default]
    Summary,
    /// Full markdown map
    Markdown,
    /// Machine-readable JSON
    Json,
}

impl MapFormat {
    /// The `--format` argument value.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Summary => "summary",
            Self::Markdown => "markdown",
            Self::Json => "json",
        }
    }
}

impl std::str::FromStr for MapFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "summary" => Ok(Self::Summary),
            "markdown" => Ok(Self::Markdown),
            "json" => Ok(Self::Json),
            other => Err(format!("unknown map format: {other}")),
        }
    }
}

/// Typed façade over the external SDD tool.
pub struct ToolDriver {
    runner: ProcessRunner,
    program: String,
    working_dir: Option<PathBuf>,
    events: Option<mpsc::UnboundedSender<ToolEvent>>,
}

impl ToolDriver {
    /// Create a driver for the given tool binary.
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            runner: ProcessRunner::new(),
            program: program.into(),
            working_dir: None,
            events: None,
        }
    }

    /// Create a driver from application configuration.
    pub fn from_config(config: &Config) -> Self {
        let mut driver = Self::new(config.tool.command.clone());
        driver.working_dir = config.working_dir();
        driver
    }

    /// Set the working directory for tool invocations.
    #[must_use]
    pub fn with_working_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_dir = Some(dir.into());
        self
    }

    /// Attach an event channel that receives live output chunks from
    /// streaming subcommands.
    #[must_use]
    pub fn with_events(mut self, events: mpsc::UnboundedSender<ToolEvent>) -> Self {
        self.events = Some(events);
        self
    }

    /// The tool binary this driver invokes.
    pub fn program(&self) -> &str {
        &self.program
    }

    /// Run the tool with `args`, translating failures into [`CliError`].
    ///
    /// When `stream` is set and an event channel is attached, output chunks
    /// are forwarded as [`ToolEvent`]s while the tool runs.
    async fn run_command(&self, args: &[&str], stream: bool) -> Result<ProcessResult, CliError> {
        let arg_list: Vec<String> = args.iter().map(|a| (*a).to_string()).collect();

        let mut options = RunOptions::new();
        if let Some(dir) = &self.working_dir {
            options = options.with_working_dir(dir.clone());
        }
        if stream {
            if let Some(tx) = &self.events {
                let tx_out = tx.clone();
                options = options.on_stdout(move |chunk| {
                    let _ = tx_out.send(ToolEvent::Stdout(chunk.to_string()));
                });
                let tx_err = tx.clone();
                options = options.on_stderr(move |chunk| {
                    let _ = tx_err.send(ToolEvent::Stderr(chunk.to_string()));
                });
            }
        }

        debug!(program = %self.program, ?args, "invoking tool");
        let result = self.runner.run(&self.program, &arg_list, options).await.map_err(|err| {
            if err.kind() == std::io::ErrorKind::NotFound {
                CliError::ToolNotFound
            } else {
                CliError::Launch(err.to_string())
            }
        })?;

        if result.exit_code != Some(0) {
            return Err(CliError::CommandFailed {
                command_line: format!("{} {}", self.program, args.join(" ")),
                stderr: result.stderr,
                exit_code: result.exit_code,
            });
        }

        Ok(result)
    }

    /// Check whether the tool is installed and runnable.
    ///
    /// A cheap `--help` probe; every failure means "not installed" and no
    /// error ever propagates out of this method.
    pub async fn is_installed(&self) -> bool {
        self.run_command(&["--help"], false).await.is_ok()
    }

    /// Create a plan document.
    pub async fn plan(&self, title: &str) -> Result<PlanResult, CliError> {
        let result = self.run_command(&["plan", title], true).await?;
        Ok(decode_plan(&result.stdout)?)
    }

    /// Verify an implementation against a plan.
    pub async fn verify(&self, plan_file: &str) -> Result<VerifyResult, CliError> {
        let result = self.run_command(&["verify", plan_file], true).await?;
        Ok(decode_verify(&result.stdout)?)
    }

    /// Generate a verification prompt for LLM review.
    pub async fn verify_prompt(
        &self,
        plan_file: &str,
        spec_file: Option<&str>,
    ) -> Result<String, CliError> {
        let mut args = vec!["verify", plan_file, "--prompt"];
        if let Some(spec) = spec_file {
            args.push("--spec");
            args.push(spec);
        }
        let result = self.run_command(&args, false).await?;
        Ok(result.stdout)
    }

    /// Generate an execution prompt for a plan or verification.
    pub async fn prompt(&self, kind: PromptKind, file: &str) -> Result<String, CliError> {
        let result = self.run_command(&["prompt", kind.as_str(), file], false).await?;
        Ok(decode_prompt(&result.stdout))
    }

    /// Create a feature specification.
    pub async fn spec(
        &self,
        description: &str,
        title: Option<&str>,
    ) -> Result<SpecResult, CliError> {
        let mut args = vec!["spec", description];
        if let Some(title) = title {
            args.push("--title");
            args.push(title);
        }
        let result = self.run_command(&args, true).await?;
        Ok(decode_spec(&result.stdout)?)
    }

    /// Generate a compressed codebase map.
    pub async fn map(&self, format: MapFormat) -> Result<MapResult, CliError> {
        let result = self.run_command(&["map", "--format", format.as_str()], false).await?;
        Ok(decode_map(&result.stdout))
    }

    /// Decompose a plan into atomic tasks.
    pub async fn decompose(&self, plan_file: &str) -> Result<DecomposeResult, CliError> {
        let result = self.run_command(&["decompose", plan_file], true).await?;
        Ok(decode_decompose(&result.stdout))
    }

    /// Get the next pending task from a plan, with its prompt.
    pub async fn tasks_next(&self, plan_ref: &str) -> Result<TaskResult, CliError> {
        let result = self.run_command(&["tasks", "next", plan_ref, "--prompt"], false).await?;
        Ok(decode_task(&result.stdout))
    }

    /// List all tasks for a plan.
    pub async fn tasks_list(&self, plan_ref: &str) -> Result<DecomposeResult, CliError> {
        let result = self.run_command(&["tasks", "list", plan_ref], false).await?;
        Ok(decode_decompose(&result.stdout))
    }

    /// Mark a task as in progress.
    pub async fn tasks_start(&self, plan_ref: &str, task_id: &str) -> Result<(), CliError> {
        self.run_command(&["tasks", "start", plan_ref, task_id], false).await?;
        Ok(())
    }

    /// Mark a task as complete.
    pub async fn tasks_complete(&self, plan_ref: &str, task_id: &str) -> Result<(), CliError> {
        self.run_command(&["tasks", "complete", plan_ref, task_id], false).await?;
        Ok(())
    }

    /// Execute a task with an external agent.
    pub async fn exec(
        &self,
        task_spec: &str,
        plan_ref: &str,
        agent: &str,
    ) -> Result<String, CliError> {
        let result =
            self.run_command(&["exec", task_spec, plan_ref, "--agent", agent], true).await?;
        Ok(result.stdout)
    }

    /// Get the tool's current workflow status (read-only).
    pub async fn workflow_status(&self) -> Result<WorkflowStatus, CliError> {
        let result = self.run_command(&["workflow", "status"], false).await?;
        Ok(decode_workflow_status(&result.stdout))
    }

    /// Start a new workflow in the tool.
    pub async fn workflow_start(&self, name: &str) -> Result<(), CliError> {
        self.run_command(&["workflow", "start", name], false).await?;
        Ok(())
    }

    /// Ask the tool for guidance on the next step.
    pub async fn workflow_next(&self) -> Result<WorkflowGuidance, CliError> {
        let result = self.run_command(&["workflow", "next"], false).await?;
        Ok(decode_workflow_guidance(&result.stdout))
    }

    /// Transition the tool's workflow to a specific phase.
    pub async fn workflow_transition(
        &self,
        phase: &str,
        reason: Option<&str>,
    ) -> Result<(), CliError> {
        let mut args = vec!["workflow", "transition", phase];
        if let Some(reason) = reason {
            args.push("--reason");
            args.push(reason);
        }
        self.run_command(&args, false).await?;
        Ok(())
    }

    /// Check which execution agents are available.
    pub async fn agents(&self) -> Result<AgentStatus, CliError> {
        let result = self.run_command(&["agents"], false).await?;
        Ok(decode_agents(&result.stdout))
    }
}
