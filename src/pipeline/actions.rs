//! Pluggable phase bodies.
//!
//! Each phase of the pipeline executes a [`PhaseAction`]. The default set
//! reproduces the stock pipeline (load plan, generate prompt, simulated
//! research/implementation, verify); callers can substitute any action
//! without touching the state machine.

use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::core::{LogLevel, PipelineEvent};
use crate::driver::{PromptKind, ToolDriver};

/// Mutable context threaded through the phases of one run.
///
/// Later phases consume artifacts earlier phases store here (the generated
/// prompt depends on the loaded plan, verification on the implementation).
pub struct PhaseContext<'a> {
    /// Driver for the external tool
    pub driver: &'a ToolDriver,

    /// Workspace root directory
    pub workspace_root: PathBuf,

    /// Planning directory name, relative to the workspace root
    pub planning_dir: String,

    /// The plan reference this run executes
    pub plan_ref: String,

    /// The agent driving execution
    pub agent: String,

    /// Loaded plan content, set by the load-plan phase
    pub plan_content: Option<String>,

    /// Generated execution prompt, set by the generate-prompt phase
    pub prompt: Option<String>,

    /// Verification report content, set by the verify phase
    pub verify_report: Option<String>,

    /// Delay between simulated steps
    pub step_delay: Duration,

    events: mpsc::UnboundedSender<PipelineEvent>,
}

impl<'a> PhaseContext<'a> {
    pub(crate) fn new(
        driver: &'a ToolDriver,
        workspace_root: PathBuf,
        planning_dir: String,
        plan_ref: String,
        agent: String,
        step_delay: Duration,
        events: mpsc::UnboundedSender<PipelineEvent>,
    ) -> Self {
        Self {
            driver,
            workspace_root,
            planning_dir,
            plan_ref,
            agent,
            plan_content: None,
            prompt: None,
            verify_report: None,
            step_delay,
            events,
        }
    }

    /// Emit a user-facing log line.
    pub fn log(&self, level: LogLevel, message: impl Into<String>) {
        let _ = self.events.send(PipelineEvent::Log { level, message: message.into() });
    }

    /// Resolve the plan reference to a path: absolute references are used
    /// as-is, relative ones live under `<workspace>/<planning_dir>/plans`.
    pub fn plan_path(&self) -> PathBuf {
        let reference = Path::new(&self.plan_ref);
        if reference.is_absolute() {
            reference.to_path_buf()
        } else {
            self.workspace_root.join(&self.planning_dir).join("plans").join(reference)
        }
    }
}

/// One phase's executable body.
#[async_trait]
pub trait PhaseAction: Send + Sync {
    /// Execute the phase against the shared run context.
    ///
    /// An `Err` marks the phase failed and aborts the remaining pipeline.
    async fn run(&self, ctx: &mut PhaseContext<'_>) -> anyhow::Result<()>;
}

/// Loads the plan file into the run context.
pub struct LoadPlanAction;

#[async_trait]
impl PhaseAction for LoadPlanAction {
    async fn run(&self, ctx: &mut PhaseContext<'_>) -> anyhow::Result<()> {
        ctx.log(LogLevel::Info, "Loading plan file...");

        let path = ctx.plan_path();
        if !path.exists() {
            anyhow::bail!("Plan file not found: {}", path.display());
        }

        let content = tokio::fs::read_to_string(&path).await?;
        ctx.log(
            LogLevel::Info,
            format!(
                "Loaded plan: {}",
                path.file_name().map(|n| n.to_string_lossy().into_owned()).unwrap_or_default()
            ),
        );
        ctx.plan_content = Some(content);

        Ok(())
    }
}

/// Generates the execution prompt via the tool and stores it in context.
pub struct GeneratePromptAction;

#[async_trait]
impl PhaseAction for GeneratePromptAction {
    async fn run(&self, ctx: &mut PhaseContext<'_>) -> anyhow::Result<()> {
        ctx.log(LogLevel::Info, "Generating execution prompt...");

        let prompt = ctx.driver.prompt(PromptKind::Plan, &ctx.plan_ref).await?;
        ctx.prompt = Some(prompt);

        ctx.log(LogLevel::Success, "Prompt generated");
        ctx.log(LogLevel::Info, "Hand this prompt to your AI agent to begin execution");

        Ok(())
    }
}

/// Simulated research phase.
///
/// A production binding would await the agent's own completion signal; this
/// stand-in walks through fixed steps with a configurable delay.
pub struct ResearchAction;

#[async_trait]
impl PhaseAction for ResearchAction {
    async fn run(&self, ctx: &mut PhaseContext<'_>) -> anyhow::Result<()> {
        ctx.log(LogLevel::Info, "Executing research phase...");
        ctx.log(
            LogLevel::Warning,
            "This is a simulated phase - in production, this would trigger the actual AI agent",
        );

        for step in ["Analyzing requirements", "Researching solutions", "Planning implementation"]
        {
            ctx.log(LogLevel::Info, format!("  • {step}..."));
            tokio::time::sleep(ctx.step_delay).await;
        }

        ctx.log(LogLevel::Success, "Research phase completed");
        Ok(())
    }
}

/// Simulated implementation phase.
pub struct ImplementAction;

#[async_trait]
impl PhaseAction for ImplementAction {
    async fn run(&self, ctx: &mut PhaseContext<'_>) -> anyhow::Result<()> {
        ctx.log(LogLevel::Info, "Executing implementation phase...");
        ctx.log(
            LogLevel::Warning,
            "This is a simulated phase - in production, this would monitor the AI agent",
        );

        for step in ["Creating files", "Writing code", "Running tests", "Fixing issues"] {
            ctx.log(LogLevel::Info, format!("  • {step}..."));
            tokio::time::sleep(ctx.step_delay).await;
        }

        ctx.log(LogLevel::Success, "Implementation phase completed");
        Ok(())
    }
}

/// Runs the tool's verification and loads the report into context.
pub struct VerifyAction;

#[async_trait]
impl PhaseAction for VerifyAction {
    async fn run(&self, ctx: &mut PhaseContext<'_>) -> anyhow::Result<()> {
        ctx.log(LogLevel::Info, "Running verification...");

        let result = ctx.driver.verify(&ctx.plan_ref).await?;

        let report_path = Path::new(&result.full_path);
        if report_path.exists() {
            ctx.verify_report = Some(tokio::fs::read_to_string(report_path).await?);
            ctx.log(
                LogLevel::Success,
                format!(
                    "Verification report created: {}",
                    report_path
                        .file_name()
                        .map(|n| n.to_string_lossy().into_owned())
                        .unwrap_or_default()
                ),
            );
        }

        if let (Some(passed), Some(total)) = (result.checks_passed, result.checks_total) {
            ctx.log(LogLevel::Info, format!("Checks: {passed}/{total}"));
        }

        Ok(())
    }
}

/// The default action set, aligned with [`PhaseId::all`](super::PhaseId::all).
pub fn default_actions() -> Vec<Box<dyn PhaseAction>> {
    vec![
        Box::new(LoadPlanAction),
        Box::new(GeneratePromptAction),
        Box::new(ResearchAction),
        Box::new(ImplementAction),
        Box::new(VerifyAction),
    ]
}
