//! Snippet vetting pipeline.

use std::collections::BTreeSet;

use serde::Deserialize;
use tracing::debug;

use crate::error::{Result, VettingError};
use crate::escape::unescape_literals;
use crate::normalize::normalize;
use crate::python::{PythonSyntax, find_denied_call};

/// Callables refused when invoked by bare name.
pub const DEFAULT_DENIED_CALLS: [&str; 7] = [
    "eval",        // dynamic evaluation
    "exec",        // dynamic execution
    "open",        // raw file access
    "Popen",       // subprocess invocation
    "check_call",  // subprocess invocation
    "check_output",
    "system",
];

/// Vetter configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct VetterConfig {
    /// Bare callee names that are rejected.
    pub denied_calls: BTreeSet<String>,
    /// Collapse doubled escapes (`\\n` and friends) before parsing.
    pub unescape_literals: bool,
}

impl Default for VetterConfig {
    fn default() -> Self {
        Self {
            denied_calls: DEFAULT_DENIED_CALLS.iter().map(ToString::to_string).collect(),
            unescape_literals: true,
        }
    }
}

impl VetterConfig {
    /// Replace the deny-list.
    #[must_use]
    pub fn with_denied_calls<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.denied_calls = names.into_iter().map(Into::into).collect();
        self
    }

    /// Toggle the escape pre-pass.
    #[must_use]
    pub fn with_unescape_literals(mut self, enabled: bool) -> Self {
        self.unescape_literals = enabled;
        self
    }
}

/// Snippet text that passed vetting, normalized.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VettedSnippet {
    code: String,
}

impl VettedSnippet {
    /// Normalized source.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.code
    }

    /// Take the normalized source.
    #[must_use]
    pub fn into_inner(self) -> String {
        self.code
    }
}

/// Static vetter: escape pre-pass, normalization, parse, deny-list walk.
///
/// This is a name-based denylist. Aliases (`f = eval; f(...)`), attribute
/// chains (`builtins.eval(...)`) and other indirect references pass.
#[derive(Debug, Clone)]
pub struct SnippetVetter {
    config: VetterConfig,
    syntax: PythonSyntax,
}

impl SnippetVetter {
    /// Vetter with the default deny-list.
    #[must_use]
    pub fn new() -> Self {
        Self::with_config(VetterConfig::default())
    }

    /// Vetter with a custom configuration.
    #[must_use]
    pub fn with_config(config: VetterConfig) -> Self {
        Self {
            config,
            syntax: PythonSyntax::new(),
        }
    }

    /// Active configuration.
    #[must_use]
    pub fn config(&self) -> &VetterConfig {
        &self.config
    }

    /// Run the full pipeline.
    ///
    /// # Errors
    ///
    /// [`VettingError::Syntax`] when the snippet does not parse,
    /// [`VettingError::UnsafeConstruct`] when it calls a denied name.
    pub fn vet(&self, snippet: &str) -> Result<VettedSnippet> {
        if self.config.unescape_literals {
            self.vet_verbatim(&unescape_literals(snippet))
        } else {
            self.vet_verbatim(snippet)
        }
    }

    /// Run the pipeline without the escape pre-pass, for text that is
    /// already source code (stored snippets).
    ///
    /// # Errors
    ///
    /// Same as [`SnippetVetter::vet`].
    pub fn vet_verbatim(&self, snippet: &str) -> Result<VettedSnippet> {
        let code = normalize(snippet)?;
        let tree = self.syntax.parse(&code)?;

        if let Some(hit) = find_denied_call(&tree, &code, &self.config.denied_calls) {
            debug!(name = %hit.name, line = hit.line, "snippet rejected by deny-list");
            return Err(VettingError::UnsafeConstruct {
                name: hit.name,
                line: hit.line,
                column: hit.column,
            });
        }

        Ok(VettedSnippet { code })
    }

    /// Normalize and parse only; returns the normalized text.
    ///
    /// # Errors
    ///
    /// [`VettingError::Syntax`] when the code does not parse.
    pub fn check_syntax(&self, code: &str) -> Result<String> {
        let code = normalize(code)?;
        self.syntax.parse(&code)?;
        Ok(code)
    }
}

impl Default for SnippetVetter {
    fn default() -> Self {
        Self::new()
    }
}
