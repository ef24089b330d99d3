//! cloudops-vetter - Static vetting of Python snippets
//!
//! Every local snippet passes through [`SnippetVetter::vet`] before it is
//! handed to an interpreter:
//!
//! 1. doubled escapes (`\\n`, `\\t`, ...) are collapsed
//! 2. line endings, indentation and the trailing newline are normalized
//! 3. the text is parsed with tree-sitter; parse errors are `SyntaxError`
//! 4. every call node is checked against a bare-name deny-list
//!
//! ## Usage
//!
//! ```rust
//! use cloudops_vetter::{SnippetVetter, VettingError};
//!
//! let vetter = SnippetVetter::new();
//! assert!(vetter.vet("print(1 + 1)").is_ok());
//! assert!(matches!(
//!     vetter.vet("eval('1 + 1')"),
//!     Err(VettingError::UnsafeConstruct { .. })
//! ));
//! ```
//!
//! The deny-list is not a security boundary: it only sees direct calls by
//! bare name.

mod error;
mod escape;
mod normalize;
mod python;
mod vetter;

pub use error::{Result, VettingError};
pub use escape::unescape_literals;
pub use normalize::normalize;
pub use python::{DeniedCall, PythonSyntax, find_denied_call};
pub use vetter::{DEFAULT_DENIED_CALLS, SnippetVetter, VettedSnippet, VetterConfig};
