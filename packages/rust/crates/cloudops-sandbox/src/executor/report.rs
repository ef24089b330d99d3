//! Failure reports written by the interpreter prelude.

use cloudops_types::{Failure, FailureKind};
use serde::Deserialize;

/// Prefix of the report line on stderr.
pub(crate) const REPORT_MARKER: &str = "\u{1e}__CLOUDOPS_REPORT__";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub(crate) enum ReportStage {
    Namespace,
    Snippet,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub(crate) struct FailureReport {
    pub stage: ReportStage,
    pub error_type: String,
    pub message: String,
    #[serde(default)]
    pub traceback: String,
    #[serde(default)]
    pub binding: Option<String>,
}

impl FailureReport {
    pub(crate) fn into_failure(self) -> Failure {
        let traceback = (!self.traceback.is_empty()).then_some(self.traceback);
        match self.stage {
            ReportStage::Snippet => Failure::runtime(self.error_type, self.message, traceback),
            ReportStage::Namespace => {
                let binding = self.binding.unwrap_or_else(|| "namespace".to_string());
                let mut failure = Failure::new(
                    FailureKind::Credential,
                    format!(
                        "Failed to build '{binding}': {}: {}",
                        self.error_type, self.message
                    ),
                );
                failure.diagnostic = traceback;
                failure
            }
        }
    }
}

/// Split captured stderr into the warning text and the raw report line.
/// The prelude writes one newline before the marker; it is removed here.
pub(crate) fn split_stderr(stderr: &str) -> (&str, Option<&str>) {
    let Some(idx) = stderr.rfind(REPORT_MARKER) else {
        return (stderr, None);
    };
    let before = &stderr[..idx];
    let warnings = before.strip_suffix('\n').unwrap_or(before);
    let report = stderr[idx + REPORT_MARKER.len()..]
        .lines()
        .next()
        .unwrap_or_default();
    (warnings, Some(report))
}
