//! Decoders from raw tool stdout to typed results.
//!
//! Each decoder applies its primary pattern first and falls back to legacy
//! patterns before giving up. A decoder that cannot locate a mandatory
//! field returns a [`DecodeError`] carrying the raw text for diagnostics;
//! optional fields default to absent, since older tool versions omit them.

use std::path::Path;

use once_cell::sync::Lazy;
use regex::Regex;
use thiserror::Error;

use super::results::{
    AgentInfo, AgentStatus, DecomposeResult, MapResult, PlanResult, SpecResult, TaskInfo,
    TaskResult, TaskState, VerifyResult, VerifyStatus, WorkflowGuidance, WorkflowStatus,
};

/// Failure to locate a mandatory field in the tool's output.
///
/// Carries the raw text so an operator can diagnose a format mismatch
/// without re-running the tool.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("failed to decode {kind} output: {raw}")]
pub struct DecodeError {
    /// Which decoder failed
    pub kind: &'static str,

    /// The text that matched no known pattern
    pub raw: String,
}

impl DecodeError {
    fn new(kind: &'static str, raw: &str) -> Self {
        Self { kind, raw: raw.to_string() }
    }
}

static PLAN_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"Created plan: (.*)").unwrap());

static VERIFY_PATH_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"Report saved: (.*)").unwrap());
static VERIFY_STATUS_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\*\*Status\*\*: (✅|❌|⚠️) (\w+)").unwrap());
static VERIFY_CHECKS_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\*\*Checks\*\*: (\d+)/(\d+)").unwrap());
static VERIFY_LEGACY_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"Verification report created: (.*)").unwrap());

static SPEC_FILE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"📄 File: (.*)").unwrap());
static SPEC_TITLE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"📝 Title: (.*)").unwrap());

static MAP_FILES_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"Files: (\d+)").unwrap());
static MAP_SYMBOLS_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"Symbols: (\d+)").unwrap());
static MAP_LANGUAGES_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"Languages: ([^\n]+)").unwrap());

static QUEUE_HEADER_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"# Task Queue: (.*)").unwrap());
static QUEUE_TASK_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"## (⬜|🔄|✅|❌) (task-\d+): (.+)").unwrap());

static TASK_ID_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\*\*Task ID\*\*: (task-\d+)").unwrap());
static TASK_TITLE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"# (?:Next Task|Execute Task): (.+)").unwrap());

static WF_ID_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"# Workflow Status: (wf-\d+)").unwrap());
static WF_NAME_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\*\*Name\*\*: (.+)").unwrap());
static WF_PHASE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\*\*Current Phase\*\*: (\w+)").unwrap());
static WF_NEXT_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"Suggested next phase: \*\*(\w+)\*\*").unwrap());
static WF_HISTORY_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(\d+) transitions recorded").unwrap());
static WF_SPEC_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"Spec: ([^\n]+)").unwrap());
static WF_PLAN_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"Plan: ([^\n]+)").unwrap());
static WF_TASKS_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"Tasks: ([^\n]+)").unwrap());
static WF_VERIFY_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"Verification: ([^\n]+)").unwrap());

static GUIDANCE_PHASE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"Current phase: (\w+)").unwrap());
static GUIDANCE_NEXT_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"Suggested next: (\w+)").unwrap());

static AGENT_LINE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"- \*\*(.+?)\*\*: (✅|❌) (.+)").unwrap());
static AGENT_INSTALL_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"Install: `([^`]+)`").unwrap());

/// Extract the basename from a tool-reported path.
fn basename(path: &str) -> String {
    Path::new(path)
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// Capture group 1 of `re` in `text`, trimmed.
fn capture(re: &Regex, text: &str) -> Option<String> {
    re.captures(text).map(|caps| caps[1].trim().to_string())
}

/// Decode `Created plan: <path>` output.
pub fn decode_plan(stdout: &str) -> Result<PlanResult, DecodeError> {
    let full_path = capture(&PLAN_RE, stdout).ok_or_else(|| DecodeError::new("plan", stdout))?;
    let filename = basename(&full_path);
    Ok(PlanResult { full_path, filename })
}

/// Decode `verify` output.
///
/// Tries the current `Report saved:` format first, then the legacy
/// `Verification report created:` format. Status and check counts only
/// exist in the current format and stay absent otherwise.
pub fn decode_verify(stdout: &str) -> Result<VerifyResult, DecodeError> {
    if let Some(full_path) = capture(&VERIFY_PATH_RE, stdout) {
        let status = VERIFY_STATUS_RE
            .captures(stdout)
            .and_then(|caps| VerifyStatus::parse(&caps[2]));
        let (checks_passed, checks_total) = VERIFY_CHECKS_RE
            .captures(stdout)
            .map(|caps| (caps[1].parse().ok(), caps[2].parse().ok()))
            .unwrap_or((None, None));

        return Ok(VerifyResult { full_path, status, checks_passed, checks_total });
    }

    let full_path =
        capture(&VERIFY_LEGACY_RE, stdout).ok_or_else(|| DecodeError::new("verify", stdout))?;
    Ok(VerifyResult { full_path, status: None, checks_passed: None, checks_total: None })
}

/// Decode `prompt` output: the whole stdout, trimmed.
pub fn decode_prompt(stdout: &str) -> String {
    stdout.trim().to_string()
}

/// Decode `spec` output.
pub fn decode_spec(stdout: &str) -> Result<SpecResult, DecodeError> {
    let full_path =
        capture(&SPEC_FILE_RE, stdout).ok_or_else(|| DecodeError::new("spec", stdout))?;
    let title = capture(&SPEC_TITLE_RE, stdout).unwrap_or_default();
    let filename = basename(&full_path);
    Ok(SpecResult { full_path, filename, title })
}

/// Decode `map` summary output.
///
/// Every field is optional in the tool's output; missing counts default to
/// zero and the raw content is always preserved.
pub fn decode_map(stdout: &str) -> MapResult {
    let files_count = capture(&MAP_FILES_RE, stdout).and_then(|n| n.parse().ok()).unwrap_or(0);
    let symbols_count =
        capture(&MAP_SYMBOLS_RE, stdout).and_then(|n| n.parse().ok()).unwrap_or(0);
    let languages = capture(&MAP_LANGUAGES_RE, stdout)
        .map(|list| list.split(',').map(|lang| lang.trim().to_string()).collect())
        .unwrap_or_default();

    MapResult { content: stdout.to_string(), files_count, symbols_count, languages }
}

/// Decode `decompose` / `tasks list` output into an ordered task queue.
///
/// Task lines look like `## ⬜ task-1: Fix the bug`; records accumulate in
/// source order.
pub fn decode_decompose(stdout: &str) -> DecomposeResult {
    let plan_ref = capture(&QUEUE_HEADER_RE, stdout).unwrap_or_default();

    let tasks: Vec<TaskInfo> = QUEUE_TASK_RE
        .captures_iter(stdout)
        .map(|caps| TaskInfo {
            id: caps[2].to_string(),
            title: caps[3].trim().to_string(),
            status: TaskState::from_glyph(&caps[1]),
            files: Vec::new(),
        })
        .collect();

    DecomposeResult { plan_ref, tasks_count: tasks.len(), tasks }
}

/// Decode `tasks next` output.
pub fn decode_task(stdout: &str) -> TaskResult {
    if stdout.contains("All tasks completed") || stdout.contains("🎉") {
        return TaskResult { task: None, prompt: String::new(), all_completed: true };
    }

    let task = capture(&TASK_ID_RE, stdout).map(|id| TaskInfo {
        id,
        title: capture(&TASK_TITLE_RE, stdout).unwrap_or_default(),
        status: TaskState::Pending,
        files: Vec::new(),
    });

    TaskResult { task, prompt: stdout.to_string(), all_completed: false }
}

/// An artifact path line where the literal `(none)` means absent.
fn artifact_path(re: &Regex, stdout: &str) -> Option<String> {
    capture(re, stdout).filter(|path| !path.contains("(none)"))
}

/// Decode `workflow status` output.
///
/// The tool's own lifecycle state; consumed read-only. Missing fields fall
/// back to the tool's documented defaults rather than failing.
pub fn decode_workflow_status(stdout: &str) -> WorkflowStatus {
    WorkflowStatus {
        id: capture(&WF_ID_RE, stdout).unwrap_or_default(),
        name: capture(&WF_NAME_RE, stdout).unwrap_or_else(|| "default".to_string()),
        current_phase: capture(&WF_PHASE_RE, stdout).unwrap_or_else(|| "idle".to_string()),
        spec_path: artifact_path(&WF_SPEC_RE, stdout),
        plan_path: artifact_path(&WF_PLAN_RE, stdout),
        task_queue_path: artifact_path(&WF_TASKS_RE, stdout),
        verify_path: artifact_path(&WF_VERIFY_RE, stdout),
        next_phase: capture(&WF_NEXT_RE, stdout).unwrap_or_default(),
        history_count: capture(&WF_HISTORY_RE, stdout).and_then(|n| n.parse().ok()).unwrap_or(0),
    }
}

/// Decode `workflow next` output.
pub fn decode_workflow_guidance(stdout: &str) -> WorkflowGuidance {
    WorkflowGuidance {
        current_phase: capture(&GUIDANCE_PHASE_RE, stdout).unwrap_or_else(|| "idle".to_string()),
        next_phase: capture(&GUIDANCE_NEXT_RE, stdout).unwrap_or_default(),
        guidance: stdout.to_string(),
    }
}

/// Decode `agents` output.
///
/// Agent lines look like `- **Aider**: ✅ Available`; a global
/// `Install: \`cmd\`` line is attached to unavailable agents.
pub fn decode_agents(stdout: &str) -> AgentStatus {
    let install_command = capture(&AGENT_INSTALL_RE, stdout);

    let agents: Vec<AgentInfo> = AGENT_LINE_RE
        .captures_iter(stdout)
        .map(|caps| {
            let available = &caps[2] == "✅";
            AgentInfo {
                name: caps[1].to_string(),
                available,
                install_command: if available { None } else { install_command.clone() },
            }
        })
        .collect();

    AgentStatus { agents }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_plan() {
        let stdout = "Created plan: /project/sdd-planning/plans/plan-2024-03-01-feat.md\n\
                      To fill this plan, run:\n  sdd prompt plan plan-2024-03-01-feat.md";
        let result = decode_plan(stdout).unwrap();
        assert_eq!(result.full_path, "/project/sdd-planning/plans/plan-2024-03-01-feat.md");
        assert_eq!(result.filename, "plan-2024-03-01-feat.md");
    }

    #[test]
    fn test_decode_plan_failure_names_text() {
        let err = decode_plan("Some random error message").unwrap_err();
        assert_eq!(err.kind, "plan");
        assert!(err.raw.contains("Some random error message"));
        assert!(err.to_string().contains("plan"));
    }

    #[test]
    fn test_decode_verify_new_format() {
        let stdout = "Report saved: /project/verify-2024-03-01.md\n\
                      **Status**: ✅ passed\n\
                      **Checks**: 12/14";
        let result = decode_verify(stdout).unwrap();
        assert_eq!(result.full_path, "/project/verify-2024-03-01.md");
        assert_eq!(result.status, Some(VerifyStatus::Passed));
        assert_eq!(result.checks_passed, Some(12));
        assert_eq!(result.checks_total, Some(14));
    }

    #[test]
    fn test_decode_verify_new_format_without_optionals() {
        let result = decode_verify("Report saved: /tmp/report.md").unwrap();
        assert_eq!(result.full_path, "/tmp/report.md");
        assert_eq!(result.status, None);
        assert_eq!(result.checks_passed, None);
        assert_eq!(result.checks_total, None);
    }

    #[test]
    fn test_decode_verify_legacy_format() {
        let result = decode_verify("Verification report created: /tmp/verify.md").unwrap();
        assert_eq!(result.full_path, "/tmp/verify.md");
        assert_eq!(result.status, None);
    }

    #[test]
    fn test_decode_verify_partial_status() {
        let stdout = "Report saved: /tmp/report.md\n**Status**: ⚠️ partial";
        let result = decode_verify(stdout).unwrap();
        assert_eq!(result.status, Some(VerifyStatus::Partial));
    }

    #[test]
    fn test_decode_verify_failure() {
        let err = decode_verify("nothing recognizable here").unwrap_err();
        assert_eq!(err.kind, "verify");
        assert!(err.raw.contains("nothing recognizable"));
    }

    #[test]
    fn test_decode_prompt_trims() {
        assert_eq!(decode_prompt("  \nThis is the prompt content\n  "), "This is the prompt content");
    }

    #[test]
    fn test_decode_spec() {
        let stdout = "📄 File: /project/specs/SPEC-auth.md\n📝 Title: Auth overhaul";
        let result = decode_spec(stdout).unwrap();
        assert_eq!(result.full_path, "/project/specs/SPEC-auth.md");
        assert_eq!(result.filename, "SPEC-auth.md");
        assert_eq!(result.title, "Auth overhaul");
    }

    #[test]
    fn test_decode_spec_without_title() {
        let result = decode_spec("📄 File: /tmp/SPEC.md").unwrap();
        assert_eq!(result.title, "");
    }

    #[test]
    fn test_decode_spec_failure() {
        assert!(decode_spec("no file line at all").is_err());
    }

    #[test]
    fn test_decode_map() {
        let stdout = "Codebase map\nFiles: 120\nSymbols: 3456\nLanguages: Rust, TypeScript, Go";
        let result = decode_map(stdout);
        assert_eq!(result.files_count, 120);
        assert_eq!(result.symbols_count, 3456);
        assert_eq!(result.languages, vec!["Rust", "TypeScript", "Go"]);
        assert_eq!(result.content, stdout);
    }

    #[test]
    fn test_decode_map_defaults() {
        let result = decode_map("nothing useful");
        assert_eq!(result.files_count, 0);
        assert_eq!(result.symbols_count, 0);
        assert!(result.languages.is_empty());
    }

    #[test]
    fn test_decode_decompose_preserves_order() {
        let stdout = "# Task Queue: plan-feat.md\n\n\
                      ## ⬜ task-1: Fix bug\n\
                      ## ✅ task-2: Add test\n\
                      ## 🔄 task-3: Refactor module\n\
                      ## ❌ task-4: Deploy";
        let result = decode_decompose(stdout);
        assert_eq!(result.plan_ref, "plan-feat.md");
        assert_eq!(result.tasks_count, 4);
        assert_eq!(result.tasks[0].id, "task-1");
        assert_eq!(result.tasks[0].title, "Fix bug");
        assert_eq!(result.tasks[0].status, TaskState::Pending);
        assert_eq!(result.tasks[1].status, TaskState::Done);
        assert_eq!(result.tasks[2].status, TaskState::InProgress);
        assert_eq!(result.tasks[3].status, TaskState::Failed);
    }

    #[test]
    fn test_decode_decompose_empty() {
        let result = decode_decompose("no tasks here");
        assert_eq!(result.plan_ref, "");
        assert_eq!(result.tasks_count, 0);
        assert!(result.tasks.is_empty());
    }

    #[test]
    fn test_decode_task_all_completed() {
        let result = decode_task("🎉 All tasks completed for plan-feat.md");
        assert!(result.all_completed);
        assert!(result.task.is_none());
        assert!(result.prompt.is_empty());
    }

    #[test]
    fn test_decode_task_next() {
        let stdout = "# Next Task: Wire up the retry loop\n\
                      **Task ID**: task-2\n\n\
                      Implement the retry loop described in the plan.";
        let result = decode_task(stdout);
        assert!(!result.all_completed);
        let task = result.task.unwrap();
        assert_eq!(task.id, "task-2");
        assert_eq!(task.title, "Wire up the retry loop");
        assert_eq!(task.status, TaskState::Pending);
        assert_eq!(result.prompt, stdout);
    }

    #[test]
    fn test_decode_task_without_id() {
        let result = decode_task("free-form prompt with no task header");
        assert!(result.task.is_none());
        assert!(!result.all_completed);
        assert_eq!(result.prompt, "free-form prompt with no task header");
    }

    #[test]
    fn test_decode_workflow_status() {
        let stdout = "# Workflow Status: wf-7\n\
                      **Name**: auth-rework\n\
                      **Current Phase**: planning\n\n\
                      Spec: /project/SPEC.md\n\
                      Plan: /project/plan.md\n\
                      Tasks: (none)\n\
                      Verification: (none)\n\n\
                      Suggested next phase: **decomposition**\n\
                      4 transitions recorded";
        let status = decode_workflow_status(stdout);
        assert_eq!(status.id, "wf-7");
        assert_eq!(status.name, "auth-rework");
        assert_eq!(status.current_phase, "planning");
        assert_eq!(status.spec_path.as_deref(), Some("/project/SPEC.md"));
        assert_eq!(status.plan_path.as_deref(), Some("/project/plan.md"));
        assert_eq!(status.task_queue_path, None);
        assert_eq!(status.verify_path, None);
        assert_eq!(status.next_phase, "decomposition");
        assert_eq!(status.history_count, 4);
    }

    #[test]
    fn test_decode_workflow_status_defaults() {
        let status = decode_workflow_status("unrecognized output");
        assert_eq!(status.id, "");
        assert_eq!(status.name, "default");
        assert_eq!(status.current_phase, "idle");
        assert_eq!(status.history_count, 0);
    }

    #[test]
    fn test_decode_workflow_guidance() {
        let stdout = "Current phase: execution\nSuggested next: verification\nRun verify next.";
        let guidance = decode_workflow_guidance(stdout);
        assert_eq!(guidance.current_phase, "execution");
        assert_eq!(guidance.next_phase, "verification");
        assert_eq!(guidance.guidance, stdout);
    }

    #[test]
    fn test_decode_workflow_guidance_defaults() {
        let guidance = decode_workflow_guidance("???");
        assert_eq!(guidance.current_phase, "idle");
        assert_eq!(guidance.next_phase, "");
    }

    #[test]
    fn test_decode_agents() {
        let stdout = "- **Aider**: ✅ Available\n\
                      - **Claude Code**: ❌ Not installed\n\
                      Install: `npm install -g @anthropic-ai/claude-code`";
        let status = decode_agents(stdout);
        assert_eq!(status.agents.len(), 2);
        assert_eq!(status.agents[0].name, "Aider");
        assert!(status.agents[0].available);
        assert_eq!(status.agents[0].install_command, None);
        assert_eq!(status.agents[1].name, "Claude Code");
        assert!(!status.agents[1].available);
        assert_eq!(
            status.agents[1].install_command.as_deref(),
            Some("npm install -g @anthropic-ai/claude-code")
        );
    }

    #[test]
    fn test_decode_agents_empty() {
        assert!(decode_agents("no agents listed").agents.is_empty());
    }
}
