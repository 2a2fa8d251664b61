//! Typed results decoded from the tool's output.
//!
//! All of these are immutable value objects derived from a single captured
//! stdout string.

use serde::{Deserialize, Serialize};

/// Result of `plan` — a created plan document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlanResult {
    /// Full path of the plan file as reported by the tool
    pub full_path: String,

    /// Basename of the plan file
    pub filename: String,
}

/// Overall verdict of a verification report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VerifyStatus {
    /// Every check passed
    Passed,
    /// At least one check failed
    Failed,
    /// Some checks passed, some failed
    Partial,
}

impl VerifyStatus {
    /// Parse a status word from the tool's output, case-insensitively.
    pub fn parse(word: &str) -> Option<Self> {
        match word.to_lowercase().as_str() {
            "passed" => Some(Self::Passed),
            "failed" => Some(Self::Failed),
            "partial" => Some(Self::Partial),
            _ => None,
        }
    }
}

/// Result of `verify` — a verification report.
///
/// Older tool versions only print the report path; status and check counts
/// stay absent for those.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerifyResult {
    /// Full path of the verification report
    pub full_path: String,

    /// Overall verdict, when the tool printed one
    pub status: Option<VerifyStatus>,

    /// Number of checks that passed
    pub checks_passed: Option<u32>,

    /// Total number of checks
    pub checks_total: Option<u32>,
}

/// Result of `spec` — a created feature specification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpecResult {
    /// Full path of the spec file
    pub full_path: String,

    /// Basename of the spec file
    pub filename: String,

    /// Spec title, empty when the tool did not print one
    pub title: String,
}

/// Result of `map` — a compressed codebase map summary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MapResult {
    /// The raw map output, verbatim
    pub content: String,

    /// Number of files covered
    pub files_count: u32,

    /// Number of symbols covered
    pub symbols_count: u32,

    /// Languages detected in the codebase
    pub languages: Vec<String>,
}

/// Lifecycle state of one task in a task queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskState {
    /// Not yet started
    Pending,
    /// Currently being worked on
    InProgress,
    /// Finished successfully
    Done,
    /// Finished unsuccessfully
    Failed,
}

impl TaskState {
    /// Map a status glyph from the tool's output to a state.
    ///
    /// Unknown glyphs map to `Pending` so that future tool versions with
    /// new glyphs degrade gracefully instead of failing the decode.
    pub fn from_glyph(glyph: &str) -> Self {
        match glyph {
            "🔄" => Self::InProgress,
            "✅" => Self::Done,
            "❌" => Self::Failed,
            _ => Self::Pending,
        }
    }
}

/// One task decomposed from a plan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskInfo {
    /// Task identifier (e.g. `task-3`)
    pub id: String,

    /// Task title
    pub title: String,

    /// Lifecycle state
    pub status: TaskState,

    /// Files the task touches, when listed
    pub files: Vec<String>,
}

/// Result of `decompose` / `tasks list` — an ordered task queue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DecomposeResult {
    /// Reference to the plan the queue was decomposed from
    pub plan_ref: String,

    /// Number of tasks in the queue
    pub tasks_count: usize,

    /// Tasks in source order
    pub tasks: Vec<TaskInfo>,
}

/// Result of `tasks next` — the next pending task, with its prompt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskResult {
    /// The next task, or `None` when the queue is exhausted or the output
    /// carried no task id
    pub task: Option<TaskInfo>,

    /// Prompt text to hand to an agent
    pub prompt: String,

    /// Whether every task in the queue is already completed
    pub all_completed: bool,
}

/// Result of `workflow status` — the tool's own persisted lifecycle.
///
/// This state machine belongs to the tool; flowpilot reads it for display
/// and never writes it back.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkflowStatus {
    /// Workflow identifier (e.g. `wf-3`)
    pub id: String,

    /// Workflow name
    pub name: String,

    /// The tool's current lifecycle phase
    pub current_phase: String,

    /// Path of the spec artifact, when one exists
    pub spec_path: Option<String>,

    /// Path of the plan artifact, when one exists
    pub plan_path: Option<String>,

    /// Path of the task queue artifact, when one exists
    pub task_queue_path: Option<String>,

    /// Path of the verification artifact, when one exists
    pub verify_path: Option<String>,

    /// The phase the tool suggests transitioning to next
    pub next_phase: String,

    /// Number of recorded phase transitions
    pub history_count: u32,
}

/// Result of `workflow next` — free-form guidance for the next step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkflowGuidance {
    /// The tool's current lifecycle phase
    pub current_phase: String,

    /// Suggested next phase
    pub next_phase: String,

    /// The raw guidance text
    pub guidance: String,
}

/// One execution agent known to the tool.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentInfo {
    /// Agent name as reported
    pub name: String,

    /// Whether the agent binary is installed and usable
    pub available: bool,

    /// Install command suggested by the tool for missing agents
    pub install_command: Option<String>,
}

/// Result of `agents` — availability of every known agent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentStatus {
    /// Agents in source order
    pub agents: Vec<AgentInfo>,
}

impl AgentStatus {
    /// Look up an agent by name, case-insensitively.
    pub fn find(&self, name: &str) -> Option<&AgentInfo> {
        self.agents.iter().find(|a| a.name.eq_ignore_ascii_case(name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_task_state_glyphs() {
        assert_eq!(TaskState::from_glyph("⬜"), TaskState::Pending);
        assert_eq!(TaskState::from_glyph("🔄"), TaskState::InProgress);
        assert_eq!(TaskState::from_glyph("✅"), TaskState::Done);
        assert_eq!(TaskState::from_glyph("❌"), TaskState::Failed);
    }

    #[test]
    fn test_unknown_glyph_defaults_to_pending() {
        assert_eq!(TaskState::from_glyph("🟣"), TaskState::Pending);
        assert_eq!(TaskState::from_glyph(""), TaskState::Pending);
    }

    #[test]
    fn test_verify_status_parse() {
        assert_eq!(VerifyStatus::parse("Passed"), Some(VerifyStatus::Passed));
        assert_eq!(VerifyStatus::parse("FAILED"), Some(VerifyStatus::Failed));
        assert_eq!(VerifyStatus::parse("partial"), Some(VerifyStatus::Partial));
        assert_eq!(VerifyStatus::parse("unknown"), None);
    }

    #[test]
    fn test_agent_status_find() {
        let status = AgentStatus {
            agents: vec![AgentInfo {
                name: "Aider".to_string(),
                available: true,
                install_command: None,
            }],
        };

        assert!(status.find("aider").is_some());
        assert!(status.find("AIDER").is_some());
        assert!(status.find("cursor").is_none());
    }
}
