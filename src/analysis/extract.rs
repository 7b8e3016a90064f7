//! Extraction of structured payloads from free-form model output.
//!
//! Model responses often wrap the JSON object we want in prose
//! ("Here is the analysis: {...}"). These functions are pure so the parsing
//! contract can be tested without a network.

use serde_json::Value;

/// Error message for a body with no recoverable JSON object.
pub const UNPARSEABLE: &str = "unparseable response";

/// Find the first well-formed JSON object embedded in `text`.
///
/// Each `{` is tried in order as the start of an object; the first one that
/// parses wins. Trailing text after the object is ignored.
pub fn extract_json_object(text: &str) -> Option<Value> {
    for (pos, _) in text.match_indices('{') {
        let mut stream = serde_json::Deserializer::from_str(&text[pos..]).into_iter::<Value>();
        if let Some(Ok(value @ Value::Object(_))) = stream.next() {
            return Some(value);
        }
    }
    None
}

/// Extract the structured payload from a successful response body.
///
/// If the body is a JSON object carrying `response_field` as a string, the
/// payload is parsed out of that string. A JSON object without the field is
/// the payload itself. Anything else is searched as raw text.
pub fn extract_payload(body: &str, response_field: &str) -> Result<Value, String> {
    match serde_json::from_str::<Value>(body) {
        Ok(Value::Object(map)) => match map.get(response_field) {
            Some(Value::String(inner)) => {
                extract_json_object(inner).ok_or_else(|| UNPARSEABLE.to_string())
            }
            Some(Value::Object(inner)) => Ok(Value::Object(inner.clone())),
            _ => Ok(Value::Object(map)),
        },
        _ => extract_json_object(body).ok_or_else(|| UNPARSEABLE.to_string()),
    }
}
