//! Cosmetic normalization applied before parsing.

use crate::error::{Result, VettingError};

/// Normalize line endings to `\n`, strip the common leading indentation and
/// make sure non-empty text ends with a newline.
///
/// # Errors
///
/// Returns [`VettingError::Syntax`] when the text contains a NUL byte.
pub fn normalize(code: &str) -> Result<String> {
    if let Some(offset) = code.find('\0') {
        let (line, column) = position_of(code, offset);
        return Err(VettingError::Syntax {
            message: "source code cannot contain null bytes".to_string(),
            line,
            column,
        });
    }

    let unified = code.replace("\r\n", "\n").replace('\r', "\n");
    let mut text = dedent(&unified);
    if !text.is_empty() && !text.ends_with('\n') {
        text.push('\n');
    }
    Ok(text)
}

/// Remove the longest whitespace prefix shared by every non-blank line.
/// Whitespace-only lines are emptied.
fn dedent(text: &str) -> String {
    let mut margin: Option<&str> = None;
    for line in text.lines().filter(|l| !l.trim().is_empty()) {
        let indent = &line[..line.len() - line.trim_start_matches([' ', '\t']).len()];
        margin = Some(match margin {
            None => indent,
            Some(current) => common_prefix(current, indent),
        });
    }
    let margin = margin.unwrap_or("");

    let mut out = String::with_capacity(text.len());
    for (idx, line) in text.split('\n').enumerate() {
        if idx > 0 {
            out.push('\n');
        }
        if line.trim().is_empty() {
            continue;
        }
        out.push_str(line.strip_prefix(margin).unwrap_or(line));
    }
    out
}

fn common_prefix<'a>(a: &'a str, b: &str) -> &'a str {
    let len = a
        .bytes()
        .zip(b.bytes())
        .take_while(|(x, y)| x == y)
        .count();
    &a[..len]
}

fn position_of(code: &str, offset: usize) -> (usize, usize) {
    let before = &code[..offset];
    let line = before.matches('\n').count() + 1;
    let column = before.rfind('\n').map_or(offset, |nl| offset - nl - 1) + 1;
    (line, column)
}
