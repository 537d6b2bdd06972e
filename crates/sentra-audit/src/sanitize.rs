//! Recursive sanitation of audit detail payloads.

use serde_json::Value;

/// Keys whose values are always redacted, matched case-insensitively.
const DENYLIST: &[&str] = &[
    "password",
    "passwd",
    "secret",
    "token",
    "api_key",
    "apikey",
    "authorization",
    "cookie",
    "session_token",
    "ssn",
    "social_security",
    "credit_card",
    "card_number",
    "cvv",
    "pin",
    "private_key",
];

/// Substrings that flag a key as sensitive wherever they appear
/// ("user_password", "refresh_token").
const DENY_SUBSTRINGS: &[&str] = &["password", "secret", "token", "private_key"];

const REDACTED: &str = "[REDACTED]";
const TRUNCATED_SUFFIX: &str = "...[truncated]";
const MAX_STRING_LEN: usize = 1000;
const MAX_DEPTH: usize = 8;

/// Sanitize a detail payload before it is hashed and persisted.
///
/// Denylisted keys are redacted at any nesting depth, long strings are
/// truncated, and nesting beyond the depth cap collapses to a marker.
pub fn sanitize_details(value: &Value) -> Value {
    sanitize_value(value, 0)
}

fn sanitize_value(value: &Value, depth: usize) -> Value {
    if depth > MAX_DEPTH {
        return Value::String("[DEPTH_LIMIT]".to_string());
    }

    match value {
        Value::Object(map) => {
            let mut out = serde_json::Map::new();
            for (key, val) in map {
                if is_sensitive_key(key) {
                    out.insert(key.clone(), Value::String(REDACTED.to_string()));
                } else {
                    out.insert(key.clone(), sanitize_value(val, depth + 1));
                }
            }
            Value::Object(out)
        }
        Value::Array(items) => Value::Array(
            items
                .iter()
                .map(|item| sanitize_value(item, depth + 1))
                .collect(),
        ),
        Value::String(s) => Value::String(truncate(s)),
        other => other.clone(),
    }
}

fn is_sensitive_key(key: &str) -> bool {
    let lowered = key.to_ascii_lowercase();
    DENYLIST.iter().any(|k| lowered == *k)
        || DENY_SUBSTRINGS.iter().any(|k| lowered.contains(k))
}

fn truncate(s: &str) -> String {
    if s.chars().count() <= MAX_STRING_LEN {
        return s.to_string();
    }
    let mut out: String = s.chars().take(MAX_STRING_LEN).collect();
    out.push_str(TRUNCATED_SUFFIX);
    out
}
