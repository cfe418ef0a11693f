//! Canonical response shape.
//!
//! The wire format uses camelCase keys (`finishReason`, `usageMetadata`);
//! callers work with snake_case. The rewrite happens exactly once, at the
//! HTTP boundary, and is pure and idempotent: snake_case input passes
//! through unchanged. Arrays are traversed; scalar values are untouched.

use serde_json::Value;

/// Convert one camelCase key to snake_case.
///
/// Existing underscores are preserved, so applying the conversion to an
/// already-converted key is a no-op.
pub fn camel_to_snake(key: &str) -> String {
    let mut out = String::with_capacity(key.len() + 4);
    let mut prev_lower_or_digit = false;
    for ch in key.chars() {
        if ch.is_ascii_uppercase() {
            if prev_lower_or_digit {
                out.push('_');
            }
            out.push(ch.to_ascii_lowercase());
            prev_lower_or_digit = false;
        } else {
            prev_lower_or_digit = ch.is_ascii_lowercase() || ch.is_ascii_digit();
            out.push(ch);
        }
    }
    out
}

/// Recursively rewrite every object key from camelCase to snake_case.
pub fn normalize_keys(value: Value) -> Value {
    match value {
        Value::Object(map) => Value::Object(
            map.into_iter()
                .map(|(k, v)| (camel_to_snake(&k), normalize_keys(v)))
                .collect(),
        ),
        Value::Array(items) => Value::Array(items.into_iter().map(normalize_keys).collect()),
        other => other,
    }
}

/// Normalize a model name to its resource form by prefixing `models/` when
/// the prefix is absent. Already-qualified names pass through unchanged.
pub fn normalize_model_name(name: &str) -> String {
    if name.starts_with("models/") {
        name.to_string()
    } else {
        format!("models/{name}")
    }
}
