//! Log hygiene helpers.
//!
//! Request bodies can carry megabytes of base64 media and must never leak
//! credentials; everything routed through `tracing` goes via these helpers.

use serde_json::Value;

/// Longest string literal reproduced verbatim in debug logs.
const MAX_LOGGED_STRING: usize = 256;

/// Short identifier for a credential, safe for logs.
pub fn mask_key(key: &str) -> String {
    if key.len() <= 8 {
        key.to_string()
    } else {
        format!("{}...{}", &key[..4], &key[key.len() - 4..])
    }
}

/// Deep-copy a JSON body with long strings elided.
pub fn sanitize_body(body: &Value) -> Value {
    match body {
        Value::String(s) if s.len() > MAX_LOGGED_STRING => {
            Value::String(format!("<{} bytes elided>", s.len()))
        }
        Value::Array(items) => Value::Array(items.iter().map(sanitize_body).collect()),
        Value::Object(map) => Value::Object(
            map.iter()
                .map(|(k, v)| (k.clone(), sanitize_body(v)))
                .collect(),
        ),
        other => other.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn masks_short_and_long_keys() {
        assert_eq!(mask_key("short"), "short");
        assert_eq!(mask_key("sk-abcdefghijklmnop"), "sk-a...mnop");
    }

    #[test]
    fn elides_long_strings_recursively() {
        let body = json!({
            "model": "m",
            "contents": [{"parts": [{"inlineData": {"data": "x".repeat(5000)}}]}],
        });
        let sanitized = sanitize_body(&body);
        assert_eq!(sanitized["model"], "m");
        let data = sanitized["contents"][0]["parts"][0]["inlineData"]["data"]
            .as_str()
            .unwrap();
        assert_eq!(data, "<5000 bytes elided>");
    }
}
