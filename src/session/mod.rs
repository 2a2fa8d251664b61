//! Bounded login handshake against agent CLIs.
//!
//! Agents authenticate through their own CLI (`<agent> auth login`). The
//! flow probes the non-interactive status first, only launches the
//! interactive login when needed, bounds it with a hard timeout and an
//! explicit cancellation signal, and re-probes before declaring success:
//! a zero exit code alone is not proof of authentication.

use std::time::Duration;

use thiserror::Error;
use tracing::{debug, info, warn};

use crate::core::SessionConfig;
use crate::process::{CancelSignal, ProcessRunner, RunOptions};

/// How a login flow ended, short of an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionOutcome {
    /// The agent was already authenticated; no login was launched
    AlreadyAuthenticated,

    /// Interactive login ran and the re-probe confirmed authentication
    Authenticated,

    /// The agent CLI is not installed; the caller should fall back to
    /// manual credential entry. Recoverable, not fatal.
    ManualEntryRequired,
}

/// Failures of a login flow.
#[derive(Debug, Error)]
pub enum SessionError {
    /// The interactive login exceeded its hard timeout and was killed.
    #[error("login timed out after {0} seconds")]
    Timeout(u64),

    /// The caller cancelled the login; the subprocess was killed.
    #[error("login was cancelled")]
    Cancelled,

    /// The agent CLI exists but could not be launched.
    #[error("failed to launch agent CLI: {0}")]
    LaunchFailed(String),

    /// The login subprocess exited non-zero.
    #[error("login failed: {stderr}")]
    LoginFailed {
        /// Exit code, or `None` for abnormal termination
        exit_code: Option<i32>,

        /// Captured standard error
        stderr: String,
    },

    /// Login exited zero but the status re-probe still reports
    /// unauthenticated.
    #[error("login completed but the agent still reports unauthenticated")]
    NotAuthenticated,
}

/// Login flow for one agent CLI.
pub struct SessionFlow {
    runner: ProcessRunner,
    program: String,
    status_args: Vec<String>,
    login_args: Vec<String>,
    login_timeout: Duration,
}

impl SessionFlow {
    /// Create a flow for the given agent binary with default arguments.
    pub fn new(program: impl Into<String>) -> Self {
        Self::from_config(program, &SessionConfig::default())
    }

    /// Create a flow configured from the `[session]` config section.
    pub fn from_config(program: impl Into<String>, config: &SessionConfig) -> Self {
        Self {
            runner: ProcessRunner::new(),
            program: program.into(),
            status_args: config.status_args.clone(),
            login_args: config.login_args.clone(),
            login_timeout: Duration::from_secs(config.login_timeout_secs),
        }
    }

    /// Override the hard login timeout.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.login_timeout = timeout;
        self
    }

    /// Probe authentication status without prompting.
    ///
    /// Exit code 0 means authenticated; every other outcome, including a
    /// missing binary, means not.
    pub async fn is_authenticated(&self) -> bool {
        match self.runner.run(&self.program, &self.status_args, RunOptions::new()).await {
            Ok(result) => result.success(),
            Err(_) => false,
        }
    }

    /// Run the login handshake.
    ///
    /// Probes status first and returns immediately when already
    /// authenticated. Otherwise launches the interactive login, killing it
    /// on timeout or when `cancel` fires, and re-probes status after a
    /// zero exit before declaring success.
    pub async fn login(&self, cancel: CancelSignal) -> Result<SessionOutcome, SessionError> {
        if self.is_authenticated().await {
            debug!(program = %self.program, "already authenticated, skipping login");
            return Ok(SessionOutcome::AlreadyAuthenticated);
        }

        info!(program = %self.program, "launching interactive login");
        let options =
            RunOptions::new().with_timeout(self.login_timeout).with_cancel(cancel);

        let result = match self.runner.run(&self.program, &self.login_args, options).await {
            Ok(result) => result,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                warn!(program = %self.program, "agent CLI not installed, falling back to manual entry");
                return Ok(SessionOutcome::ManualEntryRequired);
            }
            Err(err) => return Err(SessionError::LaunchFailed(err.to_string())),
        };

        if result.timed_out {
            return Err(SessionError::Timeout(self.login_timeout.as_secs()));
        }
        if result.cancelled {
            return Err(SessionError::Cancelled);
        }
        if !result.success() {
            return Err(SessionError::LoginFailed {
                exit_code: result.exit_code,
                stderr: result.stderr,
            });
        }

        // A zero exit alone is not sufficient proof of authentication
        if self.is_authenticated().await {
            info!(program = %self.program, "login confirmed");
            Ok(SessionOutcome::Authenticated)
        } else {
            Err(SessionError::NotAuthenticated)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::process::cancel_pair;

    #[cfg(unix)]
    mod unix {
        use std::os::unix::fs::PermissionsExt;

        use tempfile::TempDir;

        use super::*;

        /// Write an executable fake agent CLI and return its path.
        ///
        /// The script dispatches on `auth status` / `auth login`.
        fn fake_agent(dir: &TempDir, status_body: &str, login_body: &str) -> String {
            let path = dir.path().join("fake-agent");
            let script = format!(
                "#!/bin/sh\nd=$(dirname \"$0\")\ncase \"$1 $2\" in\n\
                 \"auth status\") {status_body} ;;\n\
                 \"auth login\") {login_body} ;;\n\
                 *) exit 64 ;;\nesac\n"
            );
            std::fs::write(&path, script).unwrap();
            std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
            path.to_string_lossy().into_owned()
        }

        #[tokio::test]
        async fn test_already_authenticated_skips_login() {
            let dir = TempDir::new().unwrap();
            // Login would fail loudly if it ever ran
            let agent = fake_agent(&dir, "exit 0", "exit 99");

            let (_handle, signal) = cancel_pair();
            let outcome = SessionFlow::new(agent).login(signal).await.unwrap();
            assert_eq!(outcome, SessionOutcome::AlreadyAuthenticated);
        }

        #[tokio::test]
        async fn test_login_then_reprobe_confirms() {
            let dir = TempDir::new().unwrap();
            let agent = fake_agent(
                &dir,
                r#"test -f "$d/token"; exit $?"#,
                r#"touch "$d/token"; exit 0"#,
            );

            let (_handle, signal) = cancel_pair();
            let outcome = SessionFlow::new(agent).login(signal).await.unwrap();
            assert_eq!(outcome, SessionOutcome::Authenticated);
        }

        #[tokio::test]
        async fn test_zero_exit_without_auth_is_not_success() {
            let dir = TempDir::new().unwrap();
            // Login claims success but never establishes a session
            let agent = fake_agent(&dir, "exit 1", "exit 0");

            let (_handle, signal) = cancel_pair();
            let err = SessionFlow::new(agent).login(signal).await.unwrap_err();
            assert!(matches!(err, SessionError::NotAuthenticated));
        }

        #[tokio::test]
        async fn test_login_failure_carries_stderr() {
            let dir = TempDir::new().unwrap();
            let agent = fake_agent(&dir, "exit 1", r#"echo "bad credentials" 1>&2; exit 2"#);

            let (_handle, signal) = cancel_pair();
            let err = SessionFlow::new(agent).login(signal).await.unwrap_err();
            match err {
                SessionError::LoginFailed { exit_code, stderr } => {
                    assert_eq!(exit_code, Some(2));
                    assert!(stderr.contains("bad credentials"));
                }
                other => panic!("expected LoginFailed, got {other:?}"),
            }
        }

        #[tokio::test]
        async fn test_timeout_kills_login() {
            let dir = TempDir::new().unwrap();
            let agent = fake_agent(&dir, "exit 1", "sleep 5");

            let (_handle, signal) = cancel_pair();
            let flow = SessionFlow::new(agent).with_timeout(Duration::from_millis(100));
            let err = flow.login(signal).await.unwrap_err();
            assert!(matches!(err, SessionError::Timeout(_)));
        }

        #[tokio::test]
        async fn test_cancellation_kills_login() {
            let dir = TempDir::new().unwrap();
            let agent = fake_agent(&dir, "exit 1", "sleep 5");

            let (handle, signal) = cancel_pair();
            tokio::spawn(async move {
                tokio::time::sleep(Duration::from_millis(50)).await;
                handle.cancel();
            });

            let err = SessionFlow::new(agent).login(signal).await.unwrap_err();
            assert!(matches!(err, SessionError::Cancelled), "cancelled login must never succeed");
        }
    }

    #[tokio::test]
    async fn test_missing_binary_falls_back_to_manual_entry() {
        let (_handle, signal) = cancel_pair();
        let flow = SessionFlow::new("definitely-not-a-real-binary-xyz");
        let outcome = flow.login(signal).await.unwrap();
        assert_eq!(outcome, SessionOutcome::ManualEntryRequired);
    }

    #[tokio::test]
    async fn test_is_authenticated_never_errors() {
        let flow = SessionFlow::new("definitely-not-a-real-binary-xyz");
        assert!(!flow.is_authenticated().await);
    }
}
