//! Pure scans and rewrites over rung token lists.

use super::tokenizer::{BRANCH_END, BRANCH_NEXT, BRANCH_START};
use crate::error::{L5xError, L5xResult};

/// Index of the `]` matching the `[` at `start`; `None` when it never closes.
/// An empty token list has no branches at all.
pub fn find_matching_branch_end(tokens: &[String], start: usize) -> L5xResult<Option<usize>> {
    if tokens.is_empty() {
        return Ok(None);
    }
    if tokens.get(start).map(String::as_str) != Some(BRANCH_START) {
        return Err(L5xError::structural(format!(
            "token {} is not a branch start",
            start
        )));
    }
    let mut depth = 1usize;
    for (index, token) in tokens.iter().enumerate().skip(start + 1) {
        match token.as_str() {
            BRANCH_START => depth += 1,
            BRANCH_END => {
                depth -= 1;
                if depth == 0 {
                    return Ok(Some(index));
                }
            }
            _ => {}
        }
    }
    Ok(None)
}

/// Deepest count of `,` alternatives seen inside nested branches of the branch at `start`.
pub fn branch_internal_nesting_level(tokens: &[String], start: usize) -> L5xResult<usize> {
    let end = find_matching_branch_end(tokens, start)?.ok_or_else(|| {
        L5xError::structural(format!("no matching end for branch at token {}", start))
    })?;

    let mut open = 0i64;
    let mut nesting_counter = 0usize;
    let mut nesting_level = 0usize;
    for token in &tokens[start + 1..end] {
        if open < 0 {
            return Err(L5xError::structural("mismatched brackets in rung text"));
        }
        match token.as_str() {
            BRANCH_START => open += 1,
            BRANCH_NEXT if open != 0 => {
                nesting_counter += 1;
                nesting_level = nesting_level.max(nesting_counter);
            }
            BRANCH_END => open -= 1,
            _ => {}
        }
    }
    Ok(nesting_level)
}

/// `[`/`]` depth in effect at token `position` (0 = main line, also for positions past the end).
pub fn branch_nesting_level(tokens: &[String], position: usize) -> usize {
    let mut level = 0i64;
    for (index, token) in tokens.iter().enumerate() {
        match token.as_str() {
            BRANCH_START => level += 1,
            BRANCH_END => level -= 1,
            _ => {}
        }
        if index == position {
            return level.max(0) as usize;
        }
    }
    0
}

/// Maximum branch depth. The first `,` after a `[` belongs to the opening alternative and
/// only records the depth to restore; each later `,` in the same run adds one level until
/// the next `]` restores the recorded depth.
pub fn max_branch_depth(tokens: &[String]) -> usize {
    let mut first_next_seen = false;
    let mut current = 0i64;
    let mut max = 0i64;
    let mut restore = 0i64;

    for token in tokens {
        match token.as_str() {
            BRANCH_START => {
                current += 1;
                max = max.max(current);
            }
            BRANCH_NEXT => {
                if !first_next_seen {
                    first_next_seen = true;
                    restore = current;
                } else {
                    current += 1;
                    max = max.max(current);
                }
            }
            BRANCH_END => {
                first_next_seen = false;
                current = restore;
            }
            _ => {}
        }
    }
    max.max(0) as usize
}

/// Bracket balance never negative and zero at the end. Empty input is valid.
pub fn validate_branch_structure(tokens: &[String]) -> bool {
    let mut depth = 0i64;
    for token in tokens {
        match token.as_str() {
            BRANCH_START => depth += 1,
            BRANCH_END => {
                depth -= 1;
                if depth < 0 {
                    return false;
                }
            }
            _ => {}
        }
    }
    depth == 0
}

/// Wrap `[start, end)` in a branch whose second alternative holds `branch_instructions`.
pub fn insert_branch_tokens(
    tokens: &[String],
    start: usize,
    end: usize,
    branch_instructions: &[String],
) -> L5xResult<Vec<String>> {
    if start > end {
        return Err(L5xError::structural(
            "branch start must not be after branch end",
        ));
    }
    if end > tokens.len() {
        return Err(L5xError::structural(format!(
            "branch end {} out of range for {} tokens",
            end,
            tokens.len()
        )));
    }
    let mut out = Vec::with_capacity(tokens.len() + branch_instructions.len() + 3);
    out.extend_from_slice(&tokens[..start]);
    out.push(BRANCH_START.to_string());
    out.extend_from_slice(&tokens[start..end]);
    out.push(BRANCH_NEXT.to_string());
    out.extend_from_slice(branch_instructions);
    out.push(BRANCH_END.to_string());
    out.extend_from_slice(&tokens[end..]);
    Ok(out)
}

/// Insert a `,` before the next sibling-level separator after the `[`/`,` at `position`.
pub fn insert_branch_level_tokens(tokens: &[String], position: usize) -> L5xResult<Vec<String>> {
    let token = tokens.get(position).ok_or_else(|| {
        L5xError::structural(format!(
            "branch position {} out of range for {} tokens",
            position,
            tokens.len()
        ))
    })?;
    if token != BRANCH_START && token != BRANCH_NEXT {
        return Err(L5xError::structural(format!(
            "token {} is not a branch start or branch next",
            position
        )));
    }

    let mut index = position + 1;
    let mut nested = 0usize;
    while index < tokens.len() {
        match tokens[index].as_str() {
            BRANCH_START => nested += 1,
            BRANCH_END => {
                if nested == 0 {
                    break;
                }
                nested -= 1;
            }
            BRANCH_NEXT if nested == 0 => break,
            _ => {}
        }
        index += 1;
    }
    if index >= tokens.len() {
        return Err(L5xError::structural(
            "no sibling branch separator after the branch position",
        ));
    }

    let mut out = tokens.to_vec();
    out.insert(index, BRANCH_NEXT.to_string());
    Ok(out)
}

/// Drop the inclusive token range `[start, end]`.
pub fn remove_tokens(tokens: &[String], start: usize, end: usize) -> L5xResult<Vec<String>> {
    if end < start {
        return Err(L5xError::structural(
            "end position must not be before start position",
        ));
    }
    if start >= tokens.len() {
        return Err(L5xError::structural(format!(
            "start position {} out of range for {} tokens",
            start,
            tokens.len()
        )));
    }
    Ok(tokens
        .iter()
        .enumerate()
        .filter(|(index, _)| *index < start || *index > end)
        .map(|(_, token)| token.clone())
        .collect())
}
