//! Sequential phase orchestration.
//!
//! Drives one [`WorkflowRun`] at a time through its phases in declared
//! order. A phase failure aborts every remaining phase and fails the run;
//! later phases assume the artifacts of earlier ones exist.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use thiserror::Error;
use tokio::sync::mpsc;
use tracing::{debug, error, info};

use super::actions::{default_actions, PhaseAction, PhaseContext};
use super::{format_duration, Phase, PhaseId, PhaseStatus, RunStatus, WorkflowRun};
use crate::core::{Config, LogLevel, PipelineEvent};
use crate::driver::{CliError, ToolDriver};

/// Errors that fail a workflow run.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// The requested agent is not available.
    #[error("agent \"{0}\" is not available - run `flowpilot agents` to see options")]
    AgentUnavailable(String),

    /// The pre-run agent probe itself failed.
    #[error("failed to query agents: {0}")]
    AgentProbe(#[from] CliError),

    /// A phase action failed; the run aborted at that phase.
    #[error("phase \"{phase}\" failed: {message}")]
    PhaseFailed {
        /// Title of the failing phase
        phase: String,

        /// The failing action's error message
        message: String,
    },
}

/// Sequences phases of a workflow run over the tool driver.
///
/// Owns the single active [`WorkflowRun`]; no other writer exists, and all
/// mutation happens from the run's own sequential control flow.
pub struct PhaseOrchestrator {
    driver: Arc<ToolDriver>,
    events: mpsc::UnboundedSender<PipelineEvent>,
    workspace_root: PathBuf,
    planning_dir: String,
    step_delay: Duration,
    check_agent: bool,
    templates: Vec<Phase>,
    actions: Vec<Box<dyn PhaseAction>>,
    run: Option<WorkflowRun>,
}

impl PhaseOrchestrator {
    /// Create an orchestrator with the standard five-phase pipeline.
    pub fn new(
        driver: Arc<ToolDriver>,
        config: &Config,
        events: mpsc::UnboundedSender<PipelineEvent>,
    ) -> Self {
        let workspace_root = config
            .working_dir()
            .or_else(|| std::env::current_dir().ok())
            .unwrap_or_else(|| PathBuf::from("."));

        Self {
            driver,
            events,
            workspace_root,
            planning_dir: config.tool.planning_dir.clone(),
            step_delay: Duration::from_millis(config.pipeline.simulate_step_delay_ms),
            check_agent: config.pipeline.check_agent,
            templates: PhaseId::all().into_iter().map(Phase::from).collect(),
            actions: default_actions(),
            run: None,
        }
    }

    /// Replace the pipeline's phases and their actions.
    ///
    /// The state machine is indifferent to what the actions do; this is the
    /// seam through which real agent execution is substituted for the
    /// simulated phases.
    #[must_use]
    pub fn with_actions(mut self, pairs: Vec<(Phase, Box<dyn PhaseAction>)>) -> Self {
        let (templates, actions) = pairs.into_iter().unzip();
        self.templates = templates;
        self.actions = actions;
        self
    }

    /// Enable or disable the pre-run agent availability check.
    #[must_use]
    pub fn gate_agent(mut self, check: bool) -> Self {
        self.check_agent = check;
        self
    }

    /// The run most recently executed (or currently executing).
    pub fn current_run(&self) -> Option<&WorkflowRun> {
        self.run.as_ref()
    }

    fn emit(&self, event: PipelineEvent) {
        let _ = self.events.send(event);
    }

    fn log(&self, level: LogLevel, message: impl Into<String>) {
        self.emit(PipelineEvent::Log { level, message: message.into() });
    }

    /// Execute the full pipeline against `plan_ref` with `agent`.
    ///
    /// Phases run strictly sequentially in declared order. The first phase
    /// failure freezes `current_phase_index` at the failing phase, marks
    /// the run failed, and propagates the error; no later phase runs.
    pub async fn execute(
        &mut self,
        plan_ref: &str,
        agent: &str,
    ) -> Result<&WorkflowRun, PipelineError> {
        if self.check_agent {
            let status = self.driver.agents().await?;
            if !status.find(agent).is_some_and(|a| a.available) {
                return Err(PipelineError::AgentUnavailable(agent.to_string()));
            }
        }

        let mut run =
            WorkflowRun::new(plan_ref, agent, self.templates.iter().cloned().collect());
        let run_start = Utc::now();
        run.status = RunStatus::Running;
        run.start_time = Some(run_start);

        info!(run_id = %run.id, plan_ref, agent, "starting workflow run");
        self.emit(PipelineEvent::RunStarted {
            run_id: run.id,
            plan_ref: plan_ref.to_string(),
            agent: agent.to_string(),
        });
        self.log(LogLevel::Info, format!("🚀 Starting workflow execution with {agent}"));

        let mut ctx = PhaseContext::new(
            &self.driver,
            self.workspace_root.clone(),
            self.planning_dir.clone(),
            plan_ref.to_string(),
            agent.to_string(),
            self.step_delay,
            self.events.clone(),
        );

        let total = run.phases.len();
        let mut failure: Option<PipelineError> = None;

        for index in 0..total {
            run.current_phase_index = index;

            let started = Utc::now();
            let title = {
                let phase = &mut run.phases[index];
                phase.status = PhaseStatus::Running;
                phase.start_time = Some(started);
                phase.title.clone()
            };

            debug!(index, %title, "phase started");
            self.emit(PipelineEvent::PhaseStarted { index, title: title.clone() });
            self.log(LogLevel::Info, format!("▶️  {title}"));

            let outcome = self.actions[index].run(&mut ctx).await;
            let finished = Utc::now();
            let phase = &mut run.phases[index];
            phase.end_time = Some(finished);

            match outcome {
                Ok(()) => {
                    phase.status = PhaseStatus::Completed;
                    self.emit(PipelineEvent::PhaseCompleted { index, title: title.clone() });
                    self.log(
                        LogLevel::Success,
                        format!("✓ {title} completed in {}", format_duration(started, finished)),
                    );
                    #[allow(clippy::cast_precision_loss)]
                    let progress = ((index + 1) as f32 / total as f32) * 100.0;
                    self.emit(PipelineEvent::Progress(progress));
                }
                Err(err) => {
                    let message = err.to_string();
                    phase.status = PhaseStatus::Failed;
                    phase.error = Some(message.clone());

                    error!(index, %title, %message, "phase failed");
                    self.log(LogLevel::Error, format!("✗ {title} failed: {message}"));

                    failure = Some(PipelineError::PhaseFailed { phase: title, message });
                    break;
                }
            }
        }

        let finished = Utc::now();
        run.end_time = Some(finished);

        if let Some(err) = failure {
            run.status = RunStatus::Failed;
            self.log(LogLevel::Error, format!("❌ Workflow failed: {err}"));
            self.emit(PipelineEvent::RunFailed { error: err.to_string() });
            self.run = Some(run);
            return Err(err);
        }

        run.status = RunStatus::Completed;
        let duration = format_duration(run_start, finished);
        info!(run_id = %run.id, %duration, "workflow run completed");
        self.log(
            LogLevel::Success,
            format!("✅ Workflow completed successfully in {duration}"),
        );
        self.emit(PipelineEvent::RunCompleted { duration });

        Ok(self.run.insert(run))
    }
}
