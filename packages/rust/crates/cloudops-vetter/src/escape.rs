//! Literal-escape pre-pass.
//!
//! Callers frequently deliver snippets that were JSON-encoded twice, so a
//! newline arrives as the two characters `\` `n`. The pass collapses those
//! doubled escapes back into real characters before parsing.

/// Replacement pairs, applied in this order.
const ESCAPES: [(&str, &str); 6] = [
    ("\\n", "\n"),
    ("\\t", "\t"),
    ("\\r", "\r"),
    ("\\\"", "\""),
    ("\\'", "'"),
    ("\\\\", "\\"),
];

/// Collapse doubled escapes into the characters they denote.
#[must_use]
pub fn unescape_literals(code: &str) -> String {
    if !code.contains('\\') {
        return code.to_string();
    }
    ESCAPES
        .iter()
        .fold(code.to_string(), |acc, (from, to)| acc.replace(from, to))
}
