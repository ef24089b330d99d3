use std::fmt;
use std::time::Duration;

/// Category of a failed execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FailureKind {
    /// Snippet rejected before it ran (syntax error or denied construct).
    Vetting,
    /// Required credential material was absent or could not be resolved.
    Credential,
    /// Remote authentication was refused.
    Authentication,
    /// Transport could not be established or broke mid-exchange.
    Connection,
    /// Caller supplied unusable parameters.
    Parameter,
    /// The snippet raised an uncaught exception.
    Runtime,
    /// Anything else (spawn failure, join error, malformed report).
    Internal,
}

impl FailureKind {
    /// Wire tag for `error_type`. Runtime failures carry the exception
    /// class name instead, so this is only the fallback for them.
    #[must_use]
    pub fn tag(self) -> &'static str {
        match self {
            FailureKind::Vetting => "VettingError",
            FailureKind::Credential => "CredentialError",
            FailureKind::Authentication => "AuthenticationError",
            FailureKind::Connection => "ConnectionError",
            FailureKind::Parameter => "ParameterError",
            FailureKind::Runtime => "RuntimeError",
            FailureKind::Internal => "InternalError",
        }
    }
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

/// A normalized failure.
#[derive(Debug, Clone, PartialEq)]
pub struct Failure {
    /// Failure category.
    pub kind: FailureKind,
    /// Tag reported as `error_type`.
    pub error_type: String,
    /// Human-readable message.
    pub message: String,
    /// Full diagnostic (traceback) when one exists.
    pub diagnostic: Option<String>,
    /// Wall-clock time spent before the failure, when measured.
    pub elapsed: Option<Duration>,
}

impl Failure {
    /// Failure whose `error_type` is the kind's own tag.
    pub fn new(kind: FailureKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            error_type: kind.tag().to_string(),
            message: message.into(),
            diagnostic: None,
            elapsed: None,
        }
    }

    /// Runtime failure raised by the snippet itself.
    pub fn runtime(
        error_type: impl Into<String>,
        message: impl Into<String>,
        traceback: Option<String>,
    ) -> Self {
        Self {
            kind: FailureKind::Runtime,
            error_type: error_type.into(),
            message: message.into(),
            diagnostic: traceback,
            elapsed: None,
        }
    }

    /// Override the reported `error_type`.
    #[must_use]
    pub fn with_error_type(mut self, error_type: impl Into<String>) -> Self {
        self.error_type = error_type.into();
        self
    }

    /// Attach a diagnostic.
    #[must_use]
    pub fn with_diagnostic(mut self, diagnostic: impl Into<String>) -> Self {
        self.diagnostic = Some(diagnostic.into());
        self
    }

    /// Attach elapsed time.
    #[must_use]
    pub fn with_elapsed(mut self, elapsed: Duration) -> Self {
        self.elapsed = Some(elapsed);
        self
    }
}

impl fmt::Display for Failure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.error_type, self.message)
    }
}

/// Remote-only fields of a completed command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteOutcome {
    /// Real exit status of the remote process.
    pub exit_code: i32,
    /// Connect-to-stream-close wall-clock time.
    pub execution_time: Duration,
    /// Host the command ran on.
    pub hostname: String,
}

/// A completed execution.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SuccessOutcome {
    /// Captured standard output, unmodified.
    pub stdout: String,
    /// Captured standard error, when non-empty.
    pub warnings: Option<String>,
    /// Present for remote commands.
    pub remote: Option<RemoteOutcome>,
}

/// Outcome of one execution.
#[derive(Debug, Clone, PartialEq)]
pub enum ExecutionResult {
    /// The snippet or command ran to completion.
    Success(SuccessOutcome),
    /// The execution failed before or while running.
    Failure(Failure),
    /// The deadline passed; `elapsed` is the configured bound.
    Timeout {
        /// Configured bound that expired.
        elapsed: Duration,
    },
}

impl ExecutionResult {
    /// Local success from captured streams. Empty stderr is not a warning.
    pub fn success(stdout: impl Into<String>, stderr: impl Into<String>) -> Self {
        let stderr = stderr.into();
        ExecutionResult::Success(SuccessOutcome {
            stdout: stdout.into(),
            warnings: (!stderr.is_empty()).then_some(stderr),
            remote: None,
        })
    }

    /// Shorthand for a failure of the given kind.
    pub fn failure(kind: FailureKind, message: impl Into<String>) -> Self {
        ExecutionResult::Failure(Failure::new(kind, message))
    }

    /// True for `Success`.
    #[must_use]
    pub fn is_success(&self) -> bool {
        matches!(self, ExecutionResult::Success(_))
    }

    /// Borrow the failure, if any.
    #[must_use]
    pub fn as_failure(&self) -> Option<&Failure> {
        match self {
            ExecutionResult::Failure(failure) => Some(failure),
            _ => None,
        }
    }

    /// Borrow the success payload, if any.
    #[must_use]
    pub fn as_success(&self) -> Option<&SuccessOutcome> {
        match self {
            ExecutionResult::Success(outcome) => Some(outcome),
            _ => None,
        }
    }
}

impl From<Failure> for ExecutionResult {
    fn from(failure: Failure) -> Self {
        ExecutionResult::Failure(failure)
    }
}
