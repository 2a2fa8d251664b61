//! Typed event stream for driver and pipeline observers.
//!
//! Each layer emits a stream of typed records over an unbounded channel
//! rather than calling back into its consumer. Outer layers subscribe to
//! whichever stream they need and render it however they like.

use serde::{Deserialize, Serialize};

/// Severity of a user-facing log line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    /// Neutral progress information
    Info,
    /// A step finished successfully
    Success,
    /// Something unexpected but non-fatal
    Warning,
    /// A failure
    Error,
}

impl LogLevel {
    /// Short tag used when rendering to a terminal.
    pub fn tag(&self) -> &'static str {
        match self {
            Self::Info => "info",
            Self::Success => "ok",
            Self::Warning => "warn",
            Self::Error => "error",
        }
    }
}

/// Raw output events emitted by the tool driver while a subcommand runs.
///
/// These carry chunks exactly as the subprocess produced them, in arrival
/// order, so a subscriber can render live logs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ToolEvent {
    /// A chunk of the tool's standard output
    Stdout(String),
    /// A chunk of the tool's standard error
    Stderr(String),
}

/// Events emitted by the phase orchestrator over the lifetime of one run.
#[derive(Debug, Clone)]
pub enum PipelineEvent {
    /// A workflow run has started
    RunStarted {
        /// Identifier of this run
        run_id: uuid::Uuid,
        /// The plan being executed
        plan_ref: String,
        /// The agent driving execution
        agent: String,
    },

    /// A phase has started executing
    PhaseStarted {
        /// Index of the phase in the pipeline
        index: usize,
        /// Phase title
        title: String,
    },

    /// A phase finished successfully
    PhaseCompleted {
        /// Index of the phase in the pipeline
        index: usize,
        /// Phase title
        title: String,
    },

    /// Overall progress, 0–100
    Progress(f32),

    /// A user-facing log line
    Log {
        /// Severity
        level: LogLevel,
        /// Message text
        message: String,
    },

    /// The run finished with every phase completed
    RunCompleted {
        /// Total elapsed wall-clock duration, pre-formatted
        duration: String,
    },

    /// The run aborted on a phase failure
    RunFailed {
        /// The failing phase's error message
        error: String,
    },
}
