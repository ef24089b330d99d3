//! Snippet records and filters.

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Category used when a save does not name one.
pub const DEFAULT_CATEGORY: &str = "general";

/// A stored snippet.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SnippetEntry {
    /// Unique name.
    pub name: String,
    /// Normalized Python source.
    pub code: String,
    /// Free-form description.
    #[serde(default)]
    pub description: String,
    /// Tags used for filtering.
    #[serde(default)]
    pub tags: Vec<String>,
    /// Category used for filtering.
    #[serde(default = "default_category")]
    pub category: String,
    /// First save.
    pub created_at: DateTime<Utc>,
    /// Last preload into an execution.
    #[serde(default)]
    pub last_used: Option<DateTime<Utc>>,
    /// Number of preloads.
    #[serde(default)]
    pub usage_count: u64,
    /// Starts at 1, bumped on every re-save of the same name.
    #[serde(default = "first_version")]
    pub version: u32,
}

fn default_category() -> String {
    DEFAULT_CATEGORY.to_string()
}

fn first_version() -> u32 {
    1
}

/// Input to a save.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, JsonSchema)]
pub struct NewSnippet {
    /// Unique name.
    pub name: String,
    /// Python source.
    pub code: String,
    /// Free-form description.
    #[serde(default)]
    pub description: String,
    /// Tags used for filtering.
    #[serde(default)]
    pub tags: Vec<String>,
    /// Category; `general` when omitted.
    #[serde(default)]
    pub category: Option<String>,
}

/// List filter. An empty filter matches everything.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, JsonSchema)]
pub struct SnippetFilter {
    /// Exact category match.
    #[serde(default)]
    pub category: Option<String>,
    /// Matches when the snippet carries any of these tags.
    #[serde(default)]
    pub tags: Vec<String>,
}

impl SnippetFilter {
    /// True when `entry` passes the filter.
    #[must_use]
    pub fn matches(&self, entry: &SnippetEntry) -> bool {
        if let Some(category) = &self.category
            && entry.category != *category
        {
            return false;
        }
        self.tags.is_empty() || self.tags.iter().any(|t| entry.tags.contains(t))
    }
}
