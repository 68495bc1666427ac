//! Message content normalization.
//!
//! Backend history entries sometimes carry structured content: a JSON-encoded
//! array of blocks instead of plain text. Display code wants one flat string
//! either way.

use serde_json::Value;

/// Flatten message content into plain text.
///
/// If `content` parses as a JSON array, the text of its elements is
/// concatenated in order: plain strings contribute themselves, objects tagged
/// `"type": "text"` contribute their `text` field (empty when missing), and
/// everything else is dropped. Any other input, including malformed JSON, is
/// returned unchanged. This never fails.
///
/// # Examples
///
/// ```
/// use brook::utils::content::extract_text;
///
/// assert_eq!(extract_text(r#"[{"type":"text","text":"hi"}]"#), "hi");
/// assert_eq!(extract_text("plain"), "plain");
/// assert_eq!(extract_text("not json {"), "not json {");
/// ```
pub fn extract_text(content: &str) -> String {
    let Ok(Value::Array(blocks)) = serde_json::from_str::<Value>(content) else {
        return content.to_string();
    };

    blocks.iter().filter_map(block_text).collect()
}

fn block_text(block: &Value) -> Option<&str> {
    match block {
        Value::String(text) => Some(text),
        Value::Object(fields) if fields.get("type").and_then(Value::as_str) == Some("text") => {
            Some(fields.get("text").and_then(Value::as_str).unwrap_or(""))
        }
        _ => None,
    }
}
