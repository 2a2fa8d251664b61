//! # Flowpilot
//!
//! Workflow autopilot for spec-driven development.
//!
//! Flowpilot drives an external SDD CLI (plan, spec, decompose, execute,
//! verify) from one cockpit: it spawns the tool, decodes its text output
//! into typed results, and sequences a five-phase execution pipeline with
//! live progress events.
//!
//! ## Features
//!
//! - **Typed tool driver**: every tool subcommand exposed as a typed async
//!   method with a uniform error shape
//! - **Defensive output decoding**: ordered fallback patterns tolerate the
//!   tool's evolving, undocumented stdout formats
//! - **Phase pipeline**: load plan → generate prompt → research → implement
//!   → verify, with per-phase status, timestamps, and progress events
//! - **Agent login flow**: bounded interactive login against agent CLIs,
//!   with timeout and Ctrl-C cancellation
//!
//! ## Quick Start
//!
//! ```bash
//! # Install
//! cargo install flowpilot
//!
//! # Create a plan and run the pipeline against it
//! flowpilot plan "Add retry logic"
//! flowpilot run plan-2024-01-15-add-retry-logic.md --agent aider
//! ```

#![forbid(unsafe_code)]
#![warn(clippy::all, clippy::pedantic, clippy::nursery)]
// Allow common patterns that are intentional in this codebase
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_const_for_fn)]
#![allow(clippy::doc_markdown)]
#![allow(clippy::return_self_not_must_use)]
#![allow(clippy::option_if_let_else)]
#![allow(clippy::map_unwrap_or)]
#![allow(clippy::uninlined_format_args)]
#![allow(clippy::too_many_lines)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::items_after_statements)]
#![allow(clippy::redundant_closure_for_method_calls)]

pub mod core;
pub mod driver;
pub mod pipeline;
pub mod process;
pub mod protocol;
pub mod session;

pub use crate::core::{Config, LogLevel, PipelineEvent, ToolEvent};
pub use driver::{CliError, MapFormat, PromptKind, ToolDriver};
pub use pipeline::{
    Phase, PhaseAction, PhaseContext, PhaseId, PhaseOrchestrator, PhaseStatus, PipelineError,
    RunStatus, WorkflowRun,
};
pub use process::{cancel_pair, CancelHandle, CancelSignal, ProcessResult, ProcessRunner, RunOptions};
pub use protocol::{
    AgentInfo, AgentStatus, DecodeError, DecomposeResult, MapResult, PlanResult, SpecResult,
    TaskInfo, TaskResult, TaskState, VerifyResult, VerifyStatus, WorkflowGuidance, WorkflowStatus,
};
pub use session::{SessionError, SessionFlow, SessionOutcome};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Application name
pub const APP_NAME: &str = "flowpilot";

/// Short alias
pub const APP_ALIAS: &str = "fpl";
