//! Destructive-command screening.
//!
//! A substring check, case-insensitive, applied before any connection is
//! opened. Commands that pass are forwarded exactly as given.

use crate::error::{RemoteError, Result};

/// Patterns rejected by default.
pub const DEFAULT_DENIED_PATTERNS: [&str; 7] = [
    "rm -rf /",
    "mkfs",
    "dd if=",
    "format",
    ":(){ :|:& };:",
    "chmod 777",
    "chown root",
];

/// Case-insensitive substring deny-list for shell commands.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandSanitizer {
    patterns: Vec<String>,
}

impl Default for CommandSanitizer {
    fn default() -> Self {
        Self::new(DEFAULT_DENIED_PATTERNS)
    }
}

impl CommandSanitizer {
    /// Sanitizer with exactly these patterns.
    pub fn new<I, S>(patterns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut sanitizer = Self {
            patterns: Vec::new(),
        };
        sanitizer.extend(patterns);
        sanitizer
    }

    /// Add patterns on top of the current list.
    #[must_use]
    pub fn with_extra_patterns<I, S>(mut self, patterns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.extend(patterns);
        self
    }

    fn extend<I, S>(&mut self, patterns: I)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        for pattern in patterns {
            let pattern = pattern.as_ref().to_lowercase();
            if !pattern.is_empty() && !self.patterns.contains(&pattern) {
                self.patterns.push(pattern);
            }
        }
    }

    /// Patterns in match order.
    #[must_use]
    pub fn patterns(&self) -> &[String] {
        &self.patterns
    }

    /// Accept or reject `command`.
    ///
    /// # Errors
    ///
    /// [`RemoteError::EmptyCommand`] for blank input,
    /// [`RemoteError::DeniedPattern`] naming the first pattern found.
    pub fn check(&self, command: &str) -> Result<()> {
        if command.trim().is_empty() {
            return Err(RemoteError::EmptyCommand);
        }
        let lowered = command.to_lowercase();
        match self.patterns.iter().find(|p| lowered.contains(p.as_str())) {
            Some(pattern) => Err(RemoteError::DeniedPattern {
                pattern: pattern.clone(),
            }),
            None => Ok(()),
        }
    }
}
