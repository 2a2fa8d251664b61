//! Tool driver error types.

use thiserror::Error;

use crate::protocol::DecodeError;

/// Errors surfaced by the tool driver.
///
/// Every failure mode of a single tool invocation collapses into this one
/// shape; raw platform errors never cross the driver boundary.
#[derive(Debug, Error)]
pub enum CliError {
    /// The tool binary could not be found. The message is stable across
    /// platforms so callers need not special-case OS error text.
    #[error("SDD tool not found. Please ensure it is installed and in your PATH.")]
    ToolNotFound,

    /// The tool could be found but not launched.
    #[error("failed to launch SDD tool: {0}")]
    Launch(String),

    /// The tool ran and reported failure.
    #[error("command `{command_line}` failed with exit code {}", exit_code_label(.exit_code))]
    CommandFailed {
        /// The full invoked command line
        command_line: String,

        /// Captured standard error
        stderr: String,

        /// Exit code, or `None` for abnormal termination
        exit_code: Option<i32>,
    },

    /// The tool succeeded but its output matched no known pattern.
    #[error(transparent)]
    Decode(#[from] DecodeError),
}

fn exit_code_label(code: &Option<i32>) -> String {
    code.map_or_else(|| "none".to_string(), |c| c.to_string())
}
