use crate::constants::limits::REDACTION_MAX_DEPTH;
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;

const REDACTED: &str = "[REDACTED]";
const MAX_DEPTH_MARKER: &str = "[MaxDepth]";

const REDACTED_KEY_FRAGMENTS: &[&str] = &[
    "token",
    "authorization",
    "client_secret",
    "secret",
    "contentbase64",
    "password",
    "apikey",
    "cookie",
];

static INLINE_PATTERNS: Lazy<Vec<(Regex, &'static str)>> = Lazy::new(|| {
    vec![
        (
            Regex::new(r"\b(Bearer)\s+([A-Za-z0-9._~+/=-]{8,})").expect("inline redaction regex"),
            "$1 ***REDACTED***",
        ),
        (
            Regex::new(r"\beyJ[a-zA-Z0-9_-]{10,}\.[a-zA-Z0-9_-]{10,}\.[a-zA-Z0-9_-]{10,}\b")
                .expect("inline redaction regex"),
            "***REDACTED***",
        ),
        (
            Regex::new(r#"\b(client_secret|access_token|password)\b("?\s*[:=]\s*"?)([^\s"',&]+)"#)
                .expect("inline redaction regex"),
            "$1$2***REDACTED***",
        ),
    ]
});

pub fn should_redact_key(key: &str) -> bool {
    let normalized = key.to_lowercase();
    REDACTED_KEY_FRAGMENTS
        .iter()
        .any(|fragment| normalized.contains(fragment))
}

pub fn redact_text(value: &str) -> String {
    let mut out = value.to_string();
    for (re, replacement) in INLINE_PATTERNS.iter() {
        if re.is_match(&out) {
            out = re.replace_all(&out, *replacement).to_string();
        }
    }
    out
}

fn redact_at_depth(value: &Value, depth: usize) -> Value {
    if depth >= REDACTION_MAX_DEPTH {
        return Value::String(MAX_DEPTH_MARKER.to_string());
    }
    match value {
        Value::String(text) => Value::String(redact_text(text)),
        Value::Array(items) => Value::Array(
            items
                .iter()
                .map(|item| redact_at_depth(item, depth + 1))
                .collect(),
        ),
        Value::Object(map) => {
            let mut out = serde_json::Map::new();
            for (key, entry) in map {
                if should_redact_key(key) {
                    out.insert(key.clone(), Value::String(REDACTED.to_string()));
                } else {
                    out.insert(key.clone(), redact_at_depth(entry, depth + 1));
                }
            }
            Value::Object(out)
        }
        _ => value.clone(),
    }
}

/// Masks secret-looking keys and inline credentials in structured log fields.
pub fn redact_fields(value: &Value) -> Value {
    redact_at_depth(value, 0)
}

/// Bounds a string to `max_bytes` without splitting a UTF-8 sequence.
pub fn preview(value: &str, max_bytes: usize) -> String {
    if value.len() <= max_bytes {
        return value.to_string();
    }
    let mut end = max_bytes;
    while end > 0 && !value.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}...", &value[..end])
}
