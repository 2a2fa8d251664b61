//! External process execution.
//!
//! Handles spawning subprocesses and capturing output, streaming chunks to
//! caller-supplied sinks as they arrive. One subprocess per call; concurrent
//! calls are fully independent.

use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;

use tokio::io::AsyncReadExt;
use tokio::process::Command;
use tokio::sync::watch;
use tracing::{debug, warn};

/// Result of running an external process to completion.
///
/// `exit_code` is `None` when the process was killed or terminated
/// abnormally rather than exiting on its own; this is distinct from
/// `Some(0)`.
#[derive(Debug)]
pub struct ProcessResult {
    /// Aggregated standard output
    pub stdout: String,

    /// Aggregated standard error
    pub stderr: String,

    /// Exit code, or `None` for abnormal termination
    pub exit_code: Option<i32>,

    /// Whether the run was killed by the configured timeout
    pub timed_out: bool,

    /// Whether the run was killed by the cancellation signal
    pub cancelled: bool,
}

impl ProcessResult {
    /// Check if the process exited normally with code 0.
    pub fn success(&self) -> bool {
        self.exit_code == Some(0)
    }
}

/// Sink receiving output chunks as they arrive, before aggregation.
pub type OutputSink = Box<dyn FnMut(&str) + Send + 'static>;

/// Options for a single process invocation.
#[derive(Default)]
pub struct RunOptions {
    /// Working directory for the child process
    pub working_dir: Option<PathBuf>,

    /// Sink for standard-output chunks
    pub on_stdout: Option<OutputSink>,

    /// Sink for standard-error chunks
    pub on_stderr: Option<OutputSink>,

    /// Kill the child after this long
    pub timeout: Option<Duration>,

    /// Kill the child when this signal fires
    pub cancel: Option<CancelSignal>,
}

impl RunOptions {
    /// Create empty options.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the working directory.
    #[must_use]
    pub fn with_working_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_dir = Some(dir.into());
        self
    }

    /// Set the stdout chunk sink.
    #[must_use]
    pub fn on_stdout(mut self, sink: impl FnMut(&str) + Send + 'static) -> Self {
        self.on_stdout = Some(Box::new(sink));
        self
    }

    /// Set the stderr chunk sink.
    #[must_use]
    pub fn on_stderr(mut self, sink: impl FnMut(&str) + Send + 'static) -> Self {
        self.on_stderr = Some(Box::new(sink));
        self
    }

    /// Set a hard timeout after which the child is killed.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Attach a cancellation signal that kills the child when triggered.
    #[must_use]
    pub fn with_cancel(mut self, cancel: CancelSignal) -> Self {
        self.cancel = Some(cancel);
        self
    }
}

/// Handle that triggers cancellation of an in-flight process run.
#[derive(Debug, Clone)]
pub struct CancelHandle(watch::Sender<bool>);

impl CancelHandle {
    /// Signal cancellation. Idempotent.
    pub fn cancel(&self) {
        let _ = self.0.send(true);
    }
}

/// Receiving side of a cancellation pair, passed into [`RunOptions`].
#[derive(Debug, Clone)]
pub struct CancelSignal(watch::Receiver<bool>);

impl CancelSignal {
    /// Wait until cancellation is signalled.
    pub async fn triggered(&mut self) {
        // Already cancelled before we started listening
        if *self.0.borrow() {
            return;
        }
        while self.0.changed().await.is_ok() {
            if *self.0.borrow() {
                return;
            }
        }
        // Sender dropped without cancelling; park forever so the select
        // branch never wins
        std::future::pending::<()>().await;
    }
}

/// Create a connected cancellation handle/signal pair.
pub fn cancel_pair() -> (CancelHandle, CancelSignal) {
    let (tx, rx) = watch::channel(false);
    (CancelHandle(tx), CancelSignal(rx))
}

/// Runs external programs one invocation at a time.
///
/// Carries no state; it exists as a seam so callers can hold one runner
/// and tests can exercise the exact code path the driver uses.
#[derive(Debug, Clone, Default)]
pub struct ProcessRunner;

impl ProcessRunner {
    /// Create a new runner.
    pub fn new() -> Self {
        Self
    }

    /// Run `program` with `args` to completion.
    ///
    /// Output chunks are delivered to the sinks in arrival order before
    /// aggregation. Returns `Err` only when the process cannot be launched
    /// (e.g. the executable does not exist); once launched, every
    /// termination outcome resolves to a [`ProcessResult`] and
    /// interpretation is left to the caller.
    pub async fn run(
        &self,
        program: &str,
        args: &[String],
        options: RunOptions,
    ) -> std::io::Result<ProcessResult> {
        let RunOptions { working_dir, on_stdout, on_stderr, timeout, cancel } = options;

        let mut cmd = Command::new(program);
        cmd.args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        if let Some(dir) = &working_dir {
            cmd.current_dir(dir);
        }

        debug!(program, ?args, "spawning child process");
        let mut child = cmd.spawn()?;

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| std::io::Error::other("child stdout was not piped"))?;
        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| std::io::Error::other("child stderr was not piped"))?;

        let stdout_task = tokio::spawn(drain_stream(stdout, on_stdout));
        let stderr_task = tokio::spawn(drain_stream(stderr, on_stderr));

        let mut timed_out = false;
        let mut cancelled = false;
        let mut cancel = cancel;

        let deadline = timeout.map(|t| tokio::time::Instant::now() + t);
        let timeout_sleep = tokio::time::sleep_until(
            deadline.unwrap_or_else(|| tokio::time::Instant::now()),
        );
        tokio::pin!(timeout_sleep);

        let status = loop {
            tokio::select! {
                status = child.wait() => break status?,
                () = &mut timeout_sleep, if deadline.is_some() && !timed_out && !cancelled => {
                    warn!(program, "process timed out, killing");
                    timed_out = true;
                    let _ = child.start_kill();
                }
                () = trigger(&mut cancel), if cancel.is_some() && !timed_out && !cancelled => {
                    debug!(program, "process run cancelled, killing");
                    cancelled = true;
                    let _ = child.start_kill();
                }
            }
        };

        let stdout = stdout_task.await.unwrap_or_default();
        let stderr = stderr_task.await.unwrap_or_default();

        let exit_code = status.code();
        debug!(program, ?exit_code, timed_out, cancelled, "process finished");

        Ok(ProcessResult { stdout, stderr, exit_code, timed_out, cancelled })
    }
}

/// Await the cancellation signal, if one is attached.
async fn trigger(cancel: &mut Option<CancelSignal>) {
    match cancel {
        Some(signal) => signal.triggered().await,
        None => std::future::pending().await,
    }
}

/// Read a child stream to EOF, feeding each chunk to the sink.
async fn drain_stream<R>(mut reader: R, mut sink: Option<OutputSink>) -> String
where
    R: tokio::io::AsyncRead + Unpin + Send,
{
    let mut buf = [0u8; 8192];
    let mut collected = String::new();

    loop {
        match reader.read(&mut buf).await {
            Ok(0) | Err(_) => break,
            Ok(n) => {
                let chunk = String::from_utf8_lossy(&buf[..n]);
                if let Some(sink) = sink.as_mut() {
                    sink(&chunk);
                }
                collected.push_str(&chunk);
            }
        }
    }

    collected
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use super::*;

    fn args(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| (*s).to_string()).collect()
    }

    #[tokio::test]
    async fn test_run_captures_stdout() {
        let runner = ProcessRunner::new();
        let result = runner.run("echo", &args(&["hello"]), RunOptions::new()).await.unwrap();

        assert!(result.success());
        assert_eq!(result.exit_code, Some(0));
        assert!(result.stdout.contains("hello"));
        assert!(!result.timed_out);
        assert!(!result.cancelled);
    }

    #[tokio::test]
    async fn test_run_captures_stderr_and_nonzero_exit() {
        let runner = ProcessRunner::new();
        let result = runner
            .run("sh", &args(&["-c", "echo oops 1>&2; exit 3"]), RunOptions::new())
            .await
            .unwrap();

        assert_eq!(result.exit_code, Some(3));
        assert!(result.stderr.contains("oops"));
        assert!(result.stdout.is_empty());
    }

    #[tokio::test]
    async fn test_run_streams_chunks_to_sink() {
        let seen = Arc::new(Mutex::new(String::new()));
        let sink_seen = seen.clone();

        let runner = ProcessRunner::new();
        let result = runner
            .run(
                "sh",
                &args(&["-c", "echo first; echo second"]),
                RunOptions::new().on_stdout(move |chunk| {
                    sink_seen.lock().unwrap().push_str(chunk);
                }),
            )
            .await
            .unwrap();

        // Sink saw the same bytes, in order, that were aggregated
        assert_eq!(*seen.lock().unwrap(), result.stdout);
        let first = result.stdout.find("first").unwrap();
        let second = result.stdout.find("second").unwrap();
        assert!(first < second);
    }

    #[tokio::test]
    async fn test_launch_failure_rejects() {
        let runner = ProcessRunner::new();
        let err = runner
            .run("definitely-not-a-real-binary-xyz", &[], RunOptions::new())
            .await
            .unwrap_err();

        assert_eq!(err.kind(), std::io::ErrorKind::NotFound);
    }

    #[tokio::test]
    async fn test_timeout_kills_child() {
        let runner = ProcessRunner::new();
        let result = runner
            .run(
                "sleep",
                &args(&["5"]),
                RunOptions::new().with_timeout(Duration::from_millis(100)),
            )
            .await
            .unwrap();

        assert!(result.timed_out);
        assert!(!result.cancelled);
        assert_eq!(result.exit_code, None);
    }

    #[tokio::test]
    async fn test_cancel_kills_child() {
        let (handle, signal) = cancel_pair();

        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            handle.cancel();
        });

        let runner = ProcessRunner::new();
        let result = runner
            .run("sleep", &args(&["5"]), RunOptions::new().with_cancel(signal))
            .await
            .unwrap();

        assert!(result.cancelled);
        assert!(!result.timed_out);
        assert_eq!(result.exit_code, None);
    }

    #[tokio::test]
    async fn test_concurrent_runs_are_independent() {
        let runner = ProcessRunner::new();
        let args_one = args(&["one"]);
        let args_two = args(&["two"]);
        let (a, b) = tokio::join!(
            runner.run("echo", &args_one, RunOptions::new()),
            runner.run("echo", &args_two, RunOptions::new()),
        );

        assert!(a.unwrap().stdout.contains("one"));
        assert!(b.unwrap().stdout.contains("two"));
    }
}
