//! Snippet store trait and the JSON-file implementation.

use std::path::PathBuf;
use std::sync::{Mutex, MutexGuard, PoisonError};

use chrono::Utc;
use cloudops_vetter::SnippetVetter;
use serde::Deserialize;
use tracing::{debug, info};

use crate::error::{Result, StoreError};
use crate::persistence::{SnippetTable, Upsert};
use crate::snippet::{DEFAULT_CATEGORY, NewSnippet, SnippetEntry, SnippetFilter};

/// Default capacity.
pub const DEFAULT_MAX_ENTRIES: usize = 20;

/// Reusable-snippet store.
///
/// Implementations must serialize mutations; readers may run concurrently
/// with them but observe either the state before or after a mutation.
pub trait SnippetStore: Send + Sync {
    /// Create or replace a snippet. Replacing bumps `version`.
    ///
    /// # Errors
    ///
    /// Invalid name, unparsable code, capacity reached, or persistence failure.
    fn save(&self, snippet: NewSnippet) -> Result<SnippetEntry>;

    /// Entries matching `filter`, ordered by name.
    ///
    /// # Errors
    ///
    /// Implementation-specific read failure.
    fn list(&self, filter: &SnippetFilter) -> Result<Vec<SnippetEntry>>;

    /// One entry by name.
    ///
    /// # Errors
    ///
    /// Implementation-specific read failure.
    fn get(&self, name: &str) -> Result<Option<SnippetEntry>>;

    /// Remove an entry. Returns whether it existed.
    ///
    /// # Errors
    ///
    /// Persistence failure.
    fn delete(&self, name: &str) -> Result<bool>;

    /// `(name, code)` of every entry, ordered by name.
    ///
    /// # Errors
    ///
    /// Implementation-specific read failure.
    fn get_all_code(&self) -> Result<Vec<(String, String)>>;

    /// Mark an entry as used by an execution.
    ///
    /// # Errors
    ///
    /// [`StoreError::NotFound`] or persistence failure.
    fn record_usage(&self, name: &str) -> Result<()>;
}

/// Store configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Backing JSON file; `None` keeps everything in memory.
    pub path: Option<PathBuf>,
    /// Maximum number of entries.
    pub max_entries: usize,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            path: None,
            max_entries: DEFAULT_MAX_ENTRIES,
        }
    }
}

impl StoreConfig {
    /// Persist to `path`.
    #[must_use]
    pub fn with_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.path = Some(path.into());
        self
    }

    /// Set the capacity.
    #[must_use]
    pub fn with_max_entries(mut self, max_entries: usize) -> Self {
        self.max_entries = max_entries;
        self
    }
}

/// JSON-file snippet store. Every mutation runs under one mutex and rewrites
/// the file atomically before the in-memory state is replaced.
pub struct JsonSnippetStore {
    config: StoreConfig,
    vetter: SnippetVetter,
    table: Mutex<SnippetTable>,
}

impl JsonSnippetStore {
    /// Open a store, loading the backing file when it exists.
    ///
    /// # Errors
    ///
    /// The file exists but cannot be read or decoded.
    pub fn open(config: StoreConfig) -> Result<Self> {
        let table = match &config.path {
            Some(path) => SnippetTable::load(path)?,
            None => SnippetTable::default(),
        };
        Ok(Self {
            config,
            vetter: SnippetVetter::new(),
            table: Mutex::new(table),
        })
    }

    /// Purely in-memory store.
    #[must_use]
    pub fn in_memory(max_entries: usize) -> Self {
        Self {
            config: StoreConfig::default().with_max_entries(max_entries),
            vetter: SnippetVetter::new(),
            table: Mutex::new(SnippetTable::default()),
        }
    }

    /// Active configuration.
    #[must_use]
    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    /// Number of stored entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    /// True when empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lock().len() == 0
    }

    fn lock(&self) -> MutexGuard<'_, SnippetTable> {
        self.table.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Apply `mutate` to a copy, persist the copy, then swap it in.
    fn commit<T>(&self, mutate: impl FnOnce(&mut SnippetTable) -> Result<T>) -> Result<T> {
        let mut guard = self.lock();
        let mut next = guard.clone();
        let out = mutate(&mut next)?;
        if let Some(path) = &self.config.path {
            next.write_to(path)?;
        }
        *guard = next;
        Ok(out)
    }
}

impl SnippetStore for JsonSnippetStore {
    fn save(&self, snippet: NewSnippet) -> Result<SnippetEntry> {
        let name = snippet.name.trim().to_string();
        if name.is_empty() || name.chars().any(char::is_whitespace) {
            return Err(StoreError::InvalidName(snippet.name));
        }
        let code = self
            .vetter
            .check_syntax(&snippet.code)
            .map_err(|source| StoreError::Syntax {
                name: name.clone(),
                source,
            })?;

        let category = snippet
            .category
            .filter(|c| !c.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_CATEGORY.to_string());
        let fields = Upsert {
            name,
            code,
            description: snippet.description,
            tags: snippet.tags,
            category,
        };
        let max = self.config.max_entries;
        let saved = self.commit(|table| table.upsert(fields, max, Utc::now()))?;

        info!(name = %saved.name, version = saved.version, "snippet saved");
        Ok(saved)
    }

    fn list(&self, filter: &SnippetFilter) -> Result<Vec<SnippetEntry>> {
        Ok(self
            .lock()
            .entries()
            .filter(|entry| filter.matches(entry))
            .cloned()
            .collect())
    }

    fn get(&self, name: &str) -> Result<Option<SnippetEntry>> {
        Ok(self.lock().get(name).cloned())
    }

    fn delete(&self, name: &str) -> Result<bool> {
        if !self.lock().contains(name) {
            return Ok(false);
        }
        let removed = self.commit(|table| Ok(table.remove(name)))?;
        if removed {
            info!(name, "snippet deleted");
        }
        Ok(removed)
    }

    fn get_all_code(&self) -> Result<Vec<(String, String)>> {
        Ok(self
            .lock()
            .entries()
            .map(|entry| (entry.name.clone(), entry.code.clone()))
            .collect())
    }

    fn record_usage(&self, name: &str) -> Result<()> {
        self.commit(|table| {
            let entry = table.touch(name, Utc::now())?;
            debug!(name, usage_count = entry.usage_count, "snippet usage recorded");
            Ok(())
        })
    }
}
