use regex::Regex;
use serde_json::Value;
use std::sync::OnceLock;

use crate::error::ExtractError;

fn fenced_block() -> &'static Regex {
    static FENCED: OnceLock<Regex> = OnceLock::new();
    FENCED.get_or_init(|| {
        Regex::new(r"(?s)```(?:json)?\s*(\{.*?\})\s*```").expect("fenced block pattern")
    })
}

fn outer_object() -> &'static Regex {
    static OBJECT: OnceLock<Regex> = OnceLock::new();
    OBJECT.get_or_init(|| Regex::new(r"(?s)\{.*\}").expect("object pattern"))
}

/// Pull a JSON object out of raw model output.
///
/// Tries the whole text, then a fenced code block, then the widest `{...}` span.
pub fn extract_json(raw: &str) -> Result<Value, ExtractError> {
    let text = raw.trim();
    if text.is_empty() {
        return Err(ExtractError::Empty);
    }

    if let Ok(value @ Value::Object(_)) = serde_json::from_str::<Value>(text) {
        return Ok(value);
    }

    let candidates = fenced_block()
        .captures(text)
        .and_then(|caps| caps.get(1))
        .into_iter()
        .chain(outer_object().find(text));

    for candidate in candidates {
        if let Ok(value @ Value::Object(_)) = serde_json::from_str::<Value>(candidate.as_str()) {
            return Ok(value);
        }
    }

    Err(ExtractError::NoJsonObject)
}
