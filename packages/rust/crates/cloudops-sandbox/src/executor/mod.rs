//! Bounded executor.
//!
//! Every execution gets its own interpreter child process with its own
//! stdout/stderr pipes. The wait is wrapped in a deadline; when it expires
//! the child handle is dropped and `kill_on_drop` terminates the process.

mod program;
mod report;

use std::path::PathBuf;
use std::process::{Output, Stdio};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use cloudops_types::{ExecutionResult, Failure, FailureKind};
use cloudops_vetter::VettedSnippet;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::{debug, warn};

use crate::config::ExecutorConfig;
use crate::error::{ExecutorError, Result};
use crate::namespace::ExecutionNamespace;

use program::render_program;
use report::{FailureReport, split_stderr};

/// Runs a vetted snippet against a namespace under a deadline.
#[async_trait]
pub trait SnippetRunner: Send + Sync {
    /// Runner name for logs.
    fn name(&self) -> &str;

    /// Execute once. Never fails: every outcome is an [`ExecutionResult`].
    async fn run(
        &self,
        snippet: VettedSnippet,
        namespace: ExecutionNamespace,
        timeout: Duration,
    ) -> ExecutionResult;
}

/// Python interpreter child process per execution.
#[derive(Debug, Clone)]
pub struct PythonProcessRunner {
    interpreter: PathBuf,
    config: ExecutorConfig,
}

impl PythonProcessRunner {
    /// Runner using the configured interpreter as given.
    #[must_use]
    pub fn new(config: ExecutorConfig) -> Self {
        Self {
            interpreter: config.interpreter.clone(),
            config,
        }
    }

    /// Runner with the interpreter resolved to an absolute path.
    ///
    /// # Errors
    ///
    /// [`ExecutorError::InterpreterNotFound`] when it is not on `PATH`.
    pub fn resolve(config: ExecutorConfig) -> Result<Self> {
        let interpreter =
            which::which(&config.interpreter).map_err(|e| ExecutorError::InterpreterNotFound {
                name: config.interpreter.display().to_string(),
                message: e.to_string(),
            })?;
        Ok(Self {
            interpreter,
            config,
        })
    }

    /// Interpreter that will be spawned.
    #[must_use]
    pub fn interpreter(&self) -> &std::path::Path {
        &self.interpreter
    }

    fn command(&self, namespace: &ExecutionNamespace) -> Command {
        let mut cmd = Command::new(&self.interpreter);
        cmd.args(&self.config.interpreter_args)
            .arg("-")
            .env_clear()
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        for key in &self.config.env_passthrough {
            if let Some(value) = std::env::var_os(key) {
                cmd.env(key, value);
            }
        }
        cmd.env("PYTHONIOENCODING", "utf-8")
            .env("PYTHONDONTWRITEBYTECODE", "1");
        cmd.envs(namespace.env().iter().map(|(k, v)| (k, v)));
        for (var, secret) in namespace.secret_env() {
            cmd.env(var, secret.expose());
        }
        cmd
    }
}

#[async_trait]
impl SnippetRunner for PythonProcessRunner {
    fn name(&self) -> &str {
        "python-process"
    }

    async fn run(
        &self,
        snippet: VettedSnippet,
        namespace: ExecutionNamespace,
        timeout: Duration,
    ) -> ExecutionResult {
        let program = render_program(&namespace, snippet.as_str());
        let mut cmd = self.command(&namespace);
        drop(namespace);

        let started = Instant::now();
        let mut child = match cmd.spawn() {
            Ok(child) => child,
            Err(e) => {
                warn!(interpreter = %self.interpreter.display(), error = %e, "failed to start interpreter");
                return Failure::new(
                    FailureKind::Internal,
                    format!(
                        "Failed to start interpreter {}: {e}",
                        self.interpreter.display()
                    ),
                )
                .into();
            }
        };
        debug!(pid = ?child.id(), "interpreter started");

        let stdin = child.stdin.take();
        let run = async move {
            if let Some(mut pipe) = stdin {
                pipe.write_all(program.as_bytes()).await?;
            }
            child.wait_with_output().await
        };

        match tokio::time::timeout(timeout, run).await {
            Ok(Ok(output)) => {
                let elapsed = started.elapsed();
                debug!(elapsed_ms = elapsed.as_millis(), status = ?output.status, "interpreter finished");
                interpret(&output)
            }
            Ok(Err(e)) => Failure::new(
                FailureKind::Internal,
                format!("Interpreter I/O failed: {e}"),
            )
            .with_elapsed(started.elapsed())
            .into(),
            Err(_) => {
                warn!(timeout_secs = timeout.as_secs_f64(), "execution timed out; interpreter killed");
                ExecutionResult::Timeout { elapsed: timeout }
            }
        }
    }
}

/// Map a finished interpreter to a result.
fn interpret(output: &Output) -> ExecutionResult {
    let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
    let stderr = String::from_utf8_lossy(&output.stderr);
    let (warnings, report) = split_stderr(&stderr);

    if let Some(raw) = report {
        return match serde_json::from_str::<FailureReport>(raw) {
            Ok(report) => report.into_failure().into(),
            Err(e) => Failure::new(
                FailureKind::Internal,
                format!("Malformed failure report: {e}"),
            )
            .with_diagnostic(stderr.to_string())
            .into(),
        };
    }

    if !output.status.success() {
        let message = match output.status.code() {
            Some(code) => format!("Interpreter exited with status {code}"),
            None => "Interpreter was terminated by a signal".to_string(),
        };
        let mut failure = Failure::new(FailureKind::Runtime, message).with_error_type("ProcessExit");
        if !warnings.is_empty() {
            failure = failure.with_diagnostic(warnings);
        }
        return failure.into();
    }

    ExecutionResult::success(stdout, warnings)
}
