//! Lenient decoding of raw marker values.

use serde_json::Value;

use crate::state::FieldValue;

/// Decode a raw marker value. Never fails: a well-formed list literal becomes
/// [`FieldValue::List`], anything else is kept verbatim (trimmed) as text.
pub fn decode(raw: &str) -> FieldValue {
    match decode_list(raw) {
        Some(items) => FieldValue::List(items),
        None => FieldValue::Text(raw.trim().to_string()),
    }
}

/// Strict list decoding: a JSON array whose elements are all scalars.
///
/// Strings are kept as-is, numbers and booleans use their JSON text. Nested
/// arrays, objects and nulls reject the whole literal.
pub fn decode_list(raw: &str) -> Option<Vec<String>> {
    let trimmed = raw.trim();
    if !trimmed.starts_with('[') || !trimmed.ends_with(']') {
        return None;
    }

    let Ok(Value::Array(items)) = serde_json::from_str::<Value>(trimmed) else {
        return None;
    };

    items
        .into_iter()
        .map(|item| match item {
            Value::String(s) => Some(s),
            Value::Number(n) => Some(n.to_string()),
            Value::Bool(b) => Some(b.to_string()),
            Value::Null | Value::Array(_) | Value::Object(_) => None,
        })
        .collect()
}
