//! cloudops-store - Reusable snippet store
//!
//! Named Python snippets that can be preloaded into an execution before the
//! caller's own snippet runs. Saves are syntax-checked, capacity is bounded,
//! and every mutation is persisted atomically (temp file + rename).

mod error;
mod persistence;
mod snippet;
mod store;

pub use error::{Result, StoreError};
pub use snippet::{DEFAULT_CATEGORY, NewSnippet, SnippetEntry, SnippetFilter};
pub use store::{DEFAULT_MAX_ENTRIES, JsonSnippetStore, SnippetStore, StoreConfig};
