//! JSON codec for scope settings files.
//!
//! File format: one flat JSON object per scope, keys are setting keys and
//! values are native JSON scalars.
//!
//! ```json
//! {"music_volume":0.5,"subtitles":true,"difficulty":2}
//! ```
//!
//! There is no version header and no schema.  Reading is deliberately
//! forgiving: every scalar is first turned back into text and then re-typed
//! with [`parse_scalar`], so a file written by an older build (or edited by
//! hand, e.g. `"difficulty": "2"`) still loads.  Entries that cannot be
//! re-typed are simply not returned and the caller falls back to defaults.

use std::collections::BTreeMap;

use thiserror::Error;
use tracing::debug;

use crate::domain::value::{Value, ValueKind};

/// File name used for every scope's settings file.
pub const SETTINGS_FILE_NAME: &str = "settings.json";

/// Errors that can occur while decoding or encoding a settings file.
#[derive(Debug, Error)]
pub enum CodecError {
    /// The text is not valid JSON.
    #[error("malformed settings JSON: {0}")]
    Json(#[from] serde_json::Error),

    /// The JSON document is valid but its top level is not an object.
    #[error("settings JSON must be an object, found {0}")]
    NotAnObject(&'static str),
}

// ── Public API ────────────────────────────────────────────────────────────────

/// Parses a settings file into a flat key → text mapping.
///
/// Strings are kept verbatim, booleans become `true`/`false`, numbers keep
/// their JSON spelling.  `null`, arrays, and nested objects are dropped.
/// Empty or whitespace-only text yields an empty map.
///
/// # Errors
///
/// Returns [`CodecError::Json`] for malformed JSON and
/// [`CodecError::NotAnObject`] when the document is not an object.
///
/// # Examples
///
/// ```rust
/// use settings_core::decode_settings;
///
/// let map = decode_settings(r#"{"volume":0.5,"muted":false}"#).unwrap();
/// assert_eq!(map["volume"], "0.5");
/// assert_eq!(map["muted"], "false");
/// ```
pub fn decode_settings(text: &str) -> Result<BTreeMap<String, String>, CodecError> {
    if text.trim().is_empty() {
        return Ok(BTreeMap::new());
    }

    let root: serde_json::Value = serde_json::from_str(text)?;
    let object = match root {
        serde_json::Value::Object(map) => map,
        other => return Err(CodecError::NotAnObject(json_type_name(&other))),
    };

    let mut out = BTreeMap::new();
    for (key, value) in object {
        let raw = match value {
            serde_json::Value::String(s) => s,
            serde_json::Value::Bool(b) => b.to_string(),
            serde_json::Value::Number(n) => n.to_string(),
            other => {
                debug!(key = %key, kind = json_type_name(&other), "non-scalar settings entry dropped");
                continue;
            }
        };
        out.insert(key, raw);
    }
    Ok(out)
}

/// Re-types a raw text value.
///
/// Tries, in order: boolean (`true`/`false`, case-insensitive), integer
/// (`i64`), float (`f64`, finite only).  Surrounding whitespace is ignored.
/// The first successful parse wins.
pub fn parse_scalar(raw: &str) -> Option<Value> {
    let trimmed = raw.trim();

    if trimmed.eq_ignore_ascii_case("true") {
        return Some(Value::Bool(true));
    }
    if trimmed.eq_ignore_ascii_case("false") {
        return Some(Value::Bool(false));
    }
    if let Ok(i) = trimmed.parse::<i64>() {
        return Some(Value::Int(i));
    }
    match trimmed.parse::<f64>() {
        Ok(f) if f.is_finite() => Some(Value::Float(f)),
        _ => None,
    }
}

/// Resolves a raw text value for a setting of the given kind.
///
/// Text settings take the raw string as-is.  Other kinds go through
/// [`parse_scalar`] and are then adapted with [`Value::coerce_to`], so an
/// integer written for a float setting still loads.  `None` means the entry
/// is unusable and the definition default applies.
pub fn resolve_value(raw: &str, kind: ValueKind) -> Option<Value> {
    if kind == ValueKind::Text {
        return Some(Value::Text(raw.to_string()));
    }
    parse_scalar(raw)?.coerce_to(kind)
}

/// Serializes a scope's values as a compact flat JSON object.
///
/// Keys come out in sorted order so repeated saves of the same state are
/// byte-identical.
///
/// # Errors
///
/// Returns [`CodecError::Json`] if serialization fails.
pub fn encode_settings(values: &BTreeMap<String, Value>) -> Result<String, CodecError> {
    Ok(serde_json::to_string(values)?)
}

// ── Helpers ───────────────────────────────────────────────────────────────────

fn json_type_name(value: &serde_json::Value) -> &'static str {
    match value {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "boolean",
        serde_json::Value::Number(_) => "number",
        serde_json::Value::String(_) => "string",
        serde_json::Value::Array(_) => "array",
        serde_json::Value::Object(_) => "object",
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
