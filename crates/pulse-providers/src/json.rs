//! JSON extraction from model output.
//!
//! Models wrap JSON in markdown fences or chat around it even in JSON mode.
//! Strip the fences, then cut to the outermost `{...}` / `[...]` span.

use pulse_core::error::{PulseError, Result};
use regex::Regex;
use serde_json::Value;

/// Best-effort JSON substring of `raw`, or `None` if there is nothing to parse.
pub fn extract_json(raw: &str) -> Option<String> {
    let fence = Regex::new(r"```(?:json|JSON)?\s*|\s*```").ok()?;
    let clean = fence.replace_all(raw, "");
    let clean = clean.trim();
    if clean.is_empty() {
        return None;
    }

    let start = clean.find(['{', '[']);
    let end = clean.rfind(['}', ']']);
    match (start, end) {
        (Some(s), Some(e)) if s < e => Some(clean[s..=e].to_string()),
        _ => Some(clean.to_string()),
    }
}

/// Extract and parse a JSON value from model output.
pub fn parse_json(raw: &str) -> Result<Value> {
    let candidate = extract_json(raw)
        .ok_or_else(|| PulseError::Provider("empty response where JSON was expected".into()))?;
    serde_json::from_str(&candidate)
        .map_err(|e| PulseError::Provider(format!("malformed JSON in response: {e}")))
}
