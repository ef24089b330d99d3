//! Tree-sitter Python parsing and tree walks.

use std::collections::BTreeSet;

use tree_sitter::{Language, Node, Parser, Tree};

use crate::error::{Result, VettingError};

/// Callee name and 1-based position of a denied call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeniedCall {
    /// Denied callee.
    pub name: String,
    /// 1-based line.
    pub line: usize,
    /// 1-based column.
    pub column: usize,
}

/// Python grammar handle.
///
/// `Parser` is not `Sync`, so a fresh parser is created per parse and only
/// the language is shared.
#[derive(Clone)]
pub struct PythonSyntax {
    language: Language,
}

impl PythonSyntax {
    /// Load the bundled grammar.
    pub fn new() -> Self {
        Self {
            language: tree_sitter_python::LANGUAGE.into(),
        }
    }

    /// Parse `code`, failing with a syntax error at the first error or
    /// missing node.
    pub fn parse(&self, code: &str) -> Result<Tree> {
        let mut parser = Parser::new();
        parser
            .set_language(&self.language)
            .map_err(|e| VettingError::Parser(e.to_string()))?;
        let tree = parser
            .parse(code, None)
            .ok_or_else(|| VettingError::Parser("parse was cancelled".to_string()))?;

        let root = tree.root_node();
        if root.has_error() {
            return Err(first_syntax_error(root, code));
        }
        Ok(tree)
    }
}

impl Default for PythonSyntax {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for PythonSyntax {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PythonSyntax").finish_non_exhaustive()
    }
}

/// Find the first call whose callee is a bare identifier in `denied`.
/// A Python 2 `exec` statement counts as a call to `exec`.
pub fn find_denied_call(tree: &Tree, code: &str, denied: &BTreeSet<String>) -> Option<DeniedCall> {
    walk(tree.root_node(), |node| {
        let name = match node.kind() {
            "call" => {
                let callee = node.child_by_field_name("function")?;
                if callee.kind() != "identifier" {
                    return None;
                }
                callee.utf8_text(code.as_bytes()).ok()?
            }
            "exec_statement" => "exec",
            _ => return None,
        };
        if !denied.contains(name) {
            return None;
        }
        let pos = node.start_position();
        Some(DeniedCall {
            name: name.to_string(),
            line: pos.row + 1,
            column: pos.column + 1,
        })
    })
}

fn first_syntax_error(root: Node<'_>, code: &str) -> VettingError {
    let found = walk(root, |node| {
        if node.is_missing() {
            Some((format!("expected '{}'", node.kind()), node))
        } else if node.is_error() {
            let text = node.utf8_text(code.as_bytes()).unwrap_or_default();
            let near: String = text.lines().next().unwrap_or_default().chars().take(40).collect();
            let message = if near.trim().is_empty() {
                "invalid syntax".to_string()
            } else {
                format!("invalid syntax near '{}'", near.trim())
            };
            Some((message, node))
        } else {
            None
        }
    });

    let (message, node) = found.unwrap_or_else(|| ("invalid syntax".to_string(), root));
    let pos = node.start_position();
    VettingError::Syntax {
        message,
        line: pos.row + 1,
        column: pos.column + 1,
    }
}

/// Pre-order walk; stops at the first node for which `visit` returns `Some`.
fn walk<'t, T>(root: Node<'t>, mut visit: impl FnMut(Node<'t>) -> Option<T>) -> Option<T> {
    let mut cursor = root.walk();
    loop {
        if let Some(hit) = visit(cursor.node()) {
            return Some(hit);
        }
        if cursor.goto_first_child() {
            continue;
        }
        loop {
            if cursor.goto_next_sibling() {
                break;
            }
            if !cursor.goto_parent() {
                return None;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn denied() -> BTreeSet<String> {
        ["eval", "exec", "open"].iter().map(ToString::to_string).collect()
    }

    #[test]
    fn test_parse_valid_code() {
        let syntax = PythonSyntax::new();
        assert!(syntax.parse("def f(x):\n    return x * 2\n").is_ok());
    }

    #[test]
    fn test_parse_reports_line() {
        let syntax = PythonSyntax::new();
        let err = syntax.parse("x = 1\ny = (2,\n").unwrap_err();
        assert!(matches!(err, VettingError::Syntax { .. }));
    }

    #[test]
    fn test_finds_bare_call_position() {
        let syntax = PythonSyntax::new();
        let code = "x = 1\nresult = eval('1 + 1')\n";
        let tree = syntax.parse(code).unwrap();
        let hit = find_denied_call(&tree, code, &denied()).unwrap();
        assert_eq!(hit.name, "eval");
        assert_eq!(hit.line, 2);
        assert_eq!(hit.column, 10);
    }

    #[test]
    fn test_attribute_call_is_not_flagged() {
        let syntax = PythonSyntax::new();
        let code = "import builtins\nbuiltins.eval('1')\n";
        let tree = syntax.parse(code).unwrap();
        assert!(find_denied_call(&tree, code, &denied()).is_none());
    }

    #[test]
    fn test_nested_call_is_flagged() {
        let syntax = PythonSyntax::new();
        let code = "def f():\n    return [open(p) for p in paths]\n";
        let tree = syntax.parse(code).unwrap();
        let hit = find_denied_call(&tree, code, &denied()).unwrap();
        assert_eq!(hit.name, "open");
        assert_eq!(hit.line, 2);
    }
}
