//! Rung text tokenizer.
//!
//! A token is either one complete instruction call or one of the branch symbols `[`, `]`, `,`.
//! Instruction spans are scanned by parenthesis depth, so brackets and commas of array
//! subscripts stay inside the instruction token. The terminating `;` is not a token.

use crate::error::{L5xError, L5xResult};

pub const BRANCH_START: &str = "[";
pub const BRANCH_END: &str = "]";
pub const BRANCH_NEXT: &str = ",";

pub fn is_branch_token(token: &str) -> bool {
    token == BRANCH_START || token == BRANCH_END || token == BRANCH_NEXT
}

pub fn tokenize(text: &str) -> L5xResult<Vec<String>> {
    let body = strip_terminator(text);
    let chars: Vec<(usize, char)> = body.char_indices().collect();
    let mut tokens = Vec::new();
    let mut i = 0;

    while i < chars.len() {
        let (offset, ch) = chars[i];
        match ch {
            '[' | ']' | ',' => {
                tokens.push(ch.to_string());
                i += 1;
            }
            c if c.is_whitespace() => i += 1,
            c if c.is_ascii_alphanumeric() || c == '_' => {
                let start = offset;
                while i < chars.len() && (chars[i].1.is_ascii_alphanumeric() || chars[i].1 == '_') {
                    i += 1;
                }
                if i >= chars.len() || chars[i].1 != '(' {
                    return Err(L5xError::structural(format!(
                        "expected '(' after '{}' at offset {}",
                        &body[start..chars.get(i).map(|c| c.0).unwrap_or(body.len())],
                        start
                    )));
                }
                let mut depth = 0i32;
                let mut end = None;
                while i < chars.len() {
                    match chars[i].1 {
                        '(' => depth += 1,
                        ')' => {
                            depth -= 1;
                            if depth == 0 {
                                end = Some(chars[i].0 + 1);
                                i += 1;
                                break;
                            }
                        }
                        _ => {}
                    }
                    i += 1;
                }
                let end = end.ok_or_else(|| {
                    L5xError::structural(format!(
                        "unbalanced parentheses in instruction starting at offset {}",
                        start
                    ))
                })?;
                tokens.push(body[start..end].to_string());
            }
            other => {
                return Err(L5xError::structural(format!(
                    "unexpected character '{}' at offset {}",
                    other, offset
                )));
            }
        }
    }

    Ok(tokens)
}

/// Rung text without trailing whitespace and the terminating `;`.
pub fn strip_terminator(text: &str) -> &str {
    let trimmed = text.trim_end();
    trimmed.strip_suffix(';').unwrap_or(trimmed).trim_end()
}

pub fn join(tokens: &[String]) -> String {
    tokens.concat()
}
