use serde::{Deserialize, Serialize};

use crate::result::{ExecutionResult, Failure};

/// Wire record returned by every tool.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ToolResponse {
    /// Overall verdict.
    pub success: bool,
    /// Captured stdout.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output: Option<String>,
    /// Captured stderr (non-fatal warnings for local snippets).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub errors: Option<String>,
    /// Remote exit status.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exit_code: Option<i32>,
    /// Seconds, fractional.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub execution_time: Option<f64>,
    /// Remote host.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hostname: Option<String>,
    /// Failure message.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Failure kind tag or exception class name.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_type: Option<String>,
    /// Full traceback for runtime failures.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub traceback: Option<String>,
    /// Stored snippets that were loaded before the caller's snippet.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub functions_available: Option<Vec<String>>,
}

impl ToolResponse {
    /// Plain success with output only (store operations).
    pub fn ok(output: impl Into<String>) -> Self {
        Self {
            success: true,
            output: Some(output.into()),
            ..Self::default()
        }
    }

    /// Plain failure with a tag (used for requests rejected before execution).
    pub fn error(error_type: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            success: false,
            error: Some(message.into()),
            error_type: Some(error_type.into()),
            ..Self::default()
        }
    }

    /// Attach the list of preloaded snippet names.
    #[must_use]
    pub fn with_functions_available(mut self, names: Vec<String>) -> Self {
        self.functions_available = Some(names);
        self
    }

    /// Pretty JSON text as delivered to tool callers.
    #[must_use]
    pub fn to_json(&self) -> String {
        serde_json::to_string_pretty(self).unwrap_or_else(|e| {
            format!(r#"{{"success": false, "error": "serialization failed: {e}", "error_type": "InternalError"}}"#)
        })
    }
}

impl From<Failure> for ToolResponse {
    fn from(failure: Failure) -> Self {
        Self {
            success: false,
            error: Some(failure.message),
            error_type: Some(failure.error_type),
            traceback: failure.diagnostic,
            execution_time: failure.elapsed.map(|d| d.as_secs_f64()),
            ..Self::default()
        }
    }
}

impl From<ExecutionResult> for ToolResponse {
    fn from(result: ExecutionResult) -> Self {
        match result {
            ExecutionResult::Success(outcome) => {
                let mut response = Self {
                    success: true,
                    output: Some(outcome.stdout),
                    errors: outcome.warnings,
                    ..Self::default()
                };
                // A remote command that ran to completion is a success whatever
                // its status; callers read `exit_code`.
                if let Some(remote) = outcome.remote {
                    response.exit_code = Some(remote.exit_code);
                    response.execution_time = Some(remote.execution_time.as_secs_f64());
                    response.hostname = Some(remote.hostname);
                }
                response
            }
            ExecutionResult::Failure(failure) => failure.into(),
            ExecutionResult::Timeout { elapsed } => Self {
                success: false,
                error: Some(format!(
                    "Code execution timed out after {} seconds",
                    elapsed.as_secs()
                )),
                error_type: Some("TimeoutError".to_string()),
                execution_time: Some(elapsed.as_secs_f64()),
                ..Self::default()
            },
        }
    }
}
