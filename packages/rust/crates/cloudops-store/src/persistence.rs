//! The snippet table and its JSON file.

use std::collections::BTreeMap;
use std::io::Write;
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;
use tracing::info;

use crate::error::{Result, StoreError};
use crate::snippet::SnippetEntry;

/// Fields of a save after name, code and category have been validated.
pub(crate) struct Upsert {
    pub name: String,
    pub code: String,
    pub description: String,
    pub tags: Vec<String>,
    pub category: String,
}

/// Snippets keyed by name. Serializes as a bare JSON object.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub(crate) struct SnippetTable(BTreeMap<String, SnippetEntry>);

impl SnippetTable {
    /// Read `path`. A missing or blank file is an empty table.
    pub(crate) fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            info!("No existing snippet file at {}", path.display());
            return Ok(Self::default());
        }
        let json = std::fs::read_to_string(path).map_err(|source| StoreError::Persist {
            path: path.to_path_buf(),
            source,
        })?;
        if json.trim().is_empty() {
            return Ok(Self::default());
        }
        let table: Self = serde_json::from_str(&json).map_err(|source| StoreError::Corrupt {
            path: path.to_path_buf(),
            source,
        })?;
        info!("Loaded {} snippets from {}", table.len(), path.display());
        Ok(table)
    }

    /// Replace `path` with this table. Readers see the old file or the new
    /// one, never a partial write.
    pub(crate) fn write_to(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        let dir = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        let persist_err = |source| StoreError::Persist {
            path: path.to_path_buf(),
            source,
        };

        std::fs::create_dir_all(dir).map_err(persist_err)?;
        let mut staged = NamedTempFile::new_in(dir).map_err(persist_err)?;
        staged.write_all(json.as_bytes()).map_err(persist_err)?;
        staged.as_file().sync_all().map_err(persist_err)?;
        staged.persist(path).map_err(|e| persist_err(e.error))?;
        Ok(())
    }

    /// Insert `fields`, or replace the entry of the same name.
    ///
    /// A replacement keeps `created_at`, `last_used` and `usage_count` and
    /// bumps `version`. Only a new name counts against `max`.
    pub(crate) fn upsert(
        &mut self,
        fields: Upsert,
        max: usize,
        now: DateTime<Utc>,
    ) -> Result<SnippetEntry> {
        let entry = match self.0.get(&fields.name) {
            Some(existing) => SnippetEntry {
                created_at: existing.created_at,
                last_used: existing.last_used,
                usage_count: existing.usage_count,
                version: existing.version.saturating_add(1),
                ..fields.into_entry(now)
            },
            None if self.0.len() >= max => {
                return Err(StoreError::LimitReached {
                    max,
                    name: fields.name,
                });
            }
            None => fields.into_entry(now),
        };
        self.0.insert(entry.name.clone(), entry.clone());
        Ok(entry)
    }

    /// Stamp one use of `name`.
    pub(crate) fn touch(&mut self, name: &str, now: DateTime<Utc>) -> Result<&SnippetEntry> {
        let entry = self
            .0
            .get_mut(name)
            .ok_or_else(|| StoreError::NotFound(name.to_string()))?;
        entry.usage_count += 1;
        entry.last_used = Some(now);
        Ok(entry)
    }

    pub(crate) fn remove(&mut self, name: &str) -> bool {
        self.0.remove(name).is_some()
    }

    pub(crate) fn contains(&self, name: &str) -> bool {
        self.0.contains_key(name)
    }

    pub(crate) fn get(&self, name: &str) -> Option<&SnippetEntry> {
        self.0.get(name)
    }

    /// Entries ordered by name.
    pub(crate) fn entries(&self) -> impl Iterator<Item = &SnippetEntry> {
        self.0.values()
    }

    pub(crate) fn len(&self) -> usize {
        self.0.len()
    }
}

impl Upsert {
    fn into_entry(self, now: DateTime<Utc>) -> SnippetEntry {
        SnippetEntry {
            name: self.name,
            code: self.code,
            description: self.description,
            tags: self.tags,
            category: self.category,
            created_at: now,
            last_used: None,
            usage_count: 0,
            version: 1,
        }
    }
}
