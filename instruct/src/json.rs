//! Locating JSON in model text output.

use serde_json::Value;

use crate::config::Mode;
use crate::error::ParseError;

/// Extracts the JSON document from a model's text answer.
///
/// [`Mode::Json`] and [`Mode::Tools`] expect the whole (trimmed) text to be
/// JSON. [`Mode::MdJson`] reads the first fenced code block, falling back to
/// the outermost `{...}` or `[...]` span when the model forgot the fence.
///
/// # Examples
///
/// ```
/// use rig_instruct::config::Mode;
/// use rig_instruct::json::extract_json;
/// use serde_json::json;
///
/// let text = "Here you go:\n```json\n{\"name\": \"John\"}\n```";
/// assert_eq!(extract_json(text, Mode::MdJson).unwrap(), json!({"name": "John"}));
/// ```
pub fn extract_json(text: &str, mode: Mode) -> Result<Value, ParseError> {
    let candidate = match mode {
        Mode::Json | Mode::Tools => text.trim(),
        Mode::MdJson => fenced_block(text)
            .or_else(|| outer_span(text))
            .ok_or_else(|| {
                ParseError::new("no JSON code block found in response").with_raw_text(text)
            })?,
    };

    if candidate.is_empty() {
        return Err(ParseError::new("response was empty").with_raw_text(text));
    }

    serde_json::from_str(candidate)
        .map_err(|e| ParseError::new(format!("invalid JSON: {e}")).with_raw_text(text))
}

/// Body of the first ``` fence, with an optional language tag dropped.
fn fenced_block(text: &str) -> Option<&str> {
    let start = text.find("```")?;
    let after_ticks = &text[start + 3..];
    let body_start = after_ticks.find('\n')? + 1;
    let body = &after_ticks[body_start..];
    let end = body.find("```")?;
    Some(body[..end].trim())
}

fn outer_span(text: &str) -> Option<&str> {
    let start = text.find(['{', '['])?;
    let close = if text[start..].starts_with('{') { '}' } else { ']' };
    let end = text.rfind(close)?;
    (end > start).then(|| &text[start..=end])
}
