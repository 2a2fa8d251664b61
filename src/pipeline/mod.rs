//! The local execution pipeline.
//!
//! A fixed five-phase state machine (load plan → generate prompt → research
//! → implement → verify) sequenced over the tool driver. The pipeline's
//! phases are the only workflow state this crate owns; the tool's persisted
//! lifecycle is observed read-only through `workflow status`.

mod actions;
mod orchestrator;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub use actions::{
    default_actions, GeneratePromptAction, ImplementAction, LoadPlanAction, PhaseAction,
    PhaseContext, ResearchAction, VerifyAction,
};
pub use orchestrator::{PhaseOrchestrator, PipelineError};

/// The five standard pipeline phases, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PhaseId {
    /// Load and validate the plan file
    LoadPlan,
    /// Generate the execution prompt for the agent
    GeneratePrompt,
    /// Agent researches and plans the implementation
    Research,
    /// Agent implements the planned changes
    Implement,
    /// Verify the implementation against the plan
    Verify,
}

impl PhaseId {
    /// All standard phases in execution order.
    pub fn all() -> [Self; 5] {
        [Self::LoadPlan, Self::GeneratePrompt, Self::Research, Self::Implement, Self::Verify]
    }

    /// Stable string identifier.
    pub fn id(&self) -> &'static str {
        match self {
            Self::LoadPlan => "load-plan",
            Self::GeneratePrompt => "generate-prompt",
            Self::Research => "execute-research",
            Self::Implement => "execute-implementation",
            Self::Verify => "verify-implementation",
        }
    }

    /// Human-readable title.
    pub fn title(&self) -> &'static str {
        match self {
            Self::LoadPlan => "Load Plan",
            Self::GeneratePrompt => "Generate Prompt",
            Self::Research => "Research Phase",
            Self::Implement => "Implementation Phase",
            Self::Verify => "Verification",
        }
    }

    /// One-line description.
    pub fn description(&self) -> &'static str {
        match self {
            Self::LoadPlan => "Load and parse the plan file",
            Self::GeneratePrompt => "Generate execution prompt for AI agent",
            Self::Research => "AI agent researches and plans implementation",
            Self::Implement => "AI agent implements the planned changes",
            Self::Verify => "Verify implementation against plan",
        }
    }
}

/// Lifecycle state of one phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PhaseStatus {
    /// Not yet started
    Pending,
    /// Currently executing
    Running,
    /// Finished successfully (terminal)
    Completed,
    /// Finished unsuccessfully (terminal)
    Failed,
}

/// One phase of a workflow run.
///
/// Created when the pipeline is built, mutated only by the orchestrator,
/// never shared across runs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Phase {
    /// Stable phase identifier
    pub id: String,

    /// Human-readable title
    pub title: String,

    /// One-line description
    pub description: String,

    /// Lifecycle state
    pub status: PhaseStatus,

    /// When the phase started executing
    pub start_time: Option<DateTime<Utc>>,

    /// When the phase reached a terminal state
    pub end_time: Option<DateTime<Utc>>,

    /// Error message, for failed phases
    pub error: Option<String>,
}

impl Phase {
    /// Create a pending phase.
    pub fn new(
        id: impl Into<String>,
        title: impl Into<String>,
        description: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            description: description.into(),
            status: PhaseStatus::Pending,
            start_time: None,
            end_time: None,
            error: None,
        }
    }
}

impl From<PhaseId> for Phase {
    fn from(id: PhaseId) -> Self {
        Self::new(id.id(), id.title(), id.description())
    }
}

/// Lifecycle state of a workflow run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    /// Built but not started
    Idle,
    /// Executing phases
    Running,
    /// Every phase completed (terminal)
    Completed,
    /// A phase failed (terminal)
    Failed,
}

/// One execution of the pipeline.
///
/// Exclusively owned and mutated by the orchestrator; replaced wholesale on
/// the next run. `current_phase_index` only ever advances forward and
/// freezes at the failing index when a phase fails.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowRun {
    /// Unique identifier of this run
    pub id: Uuid,

    /// The plan being executed
    pub plan_ref: String,

    /// The agent driving execution
    pub agent: String,

    /// Phases in execution order
    pub phases: Vec<Phase>,

    /// Index of the phase currently (or last) executing
    pub current_phase_index: usize,

    /// Lifecycle state
    pub status: RunStatus,

    /// When the run started
    pub start_time: Option<DateTime<Utc>>,

    /// When the run reached a terminal state
    pub end_time: Option<DateTime<Utc>>,
}

impl WorkflowRun {
    /// Create an idle run over the given phases.
    pub fn new(plan_ref: impl Into<String>, agent: impl Into<String>, phases: Vec<Phase>) -> Self {
        Self {
            id: Uuid::new_v4(),
            plan_ref: plan_ref.into(),
            agent: agent.into(),
            phases,
            current_phase_index: 0,
            status: RunStatus::Idle,
            start_time: None,
            end_time: None,
        }
    }
}

/// Format an elapsed duration as `3m 12s` or `45s`.
pub(crate) fn format_duration(start: DateTime<Utc>, end: DateTime<Utc>) -> String {
    let seconds = (end - start).num_seconds().max(0);
    let minutes = seconds / 60;

    if minutes > 0 {
        format!("{}m {}s", minutes, seconds % 60)
    } else {
        format!("{}s", seconds)
    }
}
