//! JSON extraction from raw LLM text for the structured side channel.
//!
//! Models asked for JSON do not reliably return clean JSON. This module
//! recovers a [`serde_json::Value`] through multiple strategies before
//! giving up; the caller decides what a total failure means (for probe
//! output it becomes a neutral default, never a failed round).

use crate::error::RunnerError;

/// Extract a JSON value from raw LLM output.
///
/// Attempts, in order:
/// 1. Direct `serde_json` parse
/// 2. Extract the payload of a markdown code block and parse that
/// 3. Strip trailing commas and retry
/// 4. Code block extraction followed by trailing-comma stripping
///
/// # Errors
///
/// Returns [`RunnerError::Parse`] if every strategy fails.
pub fn extract_json(raw: &str) -> Result<serde_json::Value, RunnerError> {
    let trimmed = raw.trim();

    // Strategy 1: direct parse
    if let Ok(value) = serde_json::from_str(trimmed) {
        return Ok(value);
    }

    // Strategy 2: extract from markdown code block
    if let Some(inner) = extract_codeblock(trimmed)
        && let Ok(value) = serde_json::from_str(inner)
    {
        return Ok(value);
    }

    // Strategy 3: strip trailing commas and retry
    let cleaned = strip_trailing_commas(trimmed);
    if let Ok(value) = serde_json::from_str(&cleaned) {
        return Ok(value);
    }

    // Strategy 4: code block then strip commas
    if let Some(inner) = extract_codeblock(trimmed) {
        let cleaned_inner = strip_trailing_commas(inner);
        if let Ok(value) = serde_json::from_str(&cleaned_inner) {
            return Ok(value);
        }
    }

    Err(RunnerError::Parse(format!(
        "all parse strategies failed for: {trimmed}"
    )))
}

/// Return the payload of the first fenced code block, if any.
///
/// Handles both ```` ```json ```` and bare ```` ``` ```` fences.
fn extract_codeblock(text: &str) -> Option<&str> {
    let start = text.find("```")?;
    let after_fence = text.get(start.checked_add(3)?..)?;
    // Skip an optional language tag up to the first newline.
    let body_start = after_fence.find('\n').map_or(0, |i| i.saturating_add(1));
    let body = after_fence.get(body_start..)?;
    let end = body.find("```")?;
    body.get(..end).map(str::trim)
}

/// Remove commas that directly precede a closing brace or bracket.
fn strip_trailing_commas(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut chars = text.chars();
    while let Some(ch) = chars.next() {
        if ch == ',' {
            // Look ahead past whitespace for a closer.
            let next_significant = chars.clone().find(|c| !c.is_whitespace());
            if matches!(next_significant, Some('}' | ']')) {
                continue;
            }
        }
        out.push(ch);
    }
    out
}
