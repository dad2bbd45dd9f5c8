//! Serialized hydration payloads.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as JsonValue};

/// The serialized state of one component instance: every plain and signal
/// entry by key. Computed entries are recomputed on the client instead.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SsrState {
    values: Map<String, JsonValue>,
}

impl SsrState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an entry. Values that fail to serialize are skipped.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Serialize) {
        match serde_json::to_value(value) {
            Ok(json) => {
                self.values.insert(key.into(), json);
            }
            Err(error) => {
                tracing::warn!(%error, "skipping unserializable state entry");
            }
        }
    }

    pub fn get(&self, key: &str) -> Option<&JsonValue> {
        self.values.get(key)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.values.keys().map(String::as_str)
    }

    pub fn as_map(&self) -> &Map<String, JsonValue> {
        &self.values
    }

    pub fn into_map(self) -> Map<String, JsonValue> {
        self.values
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// JSON safe to embed in a `<script>` element.
    pub fn to_script_json(&self) -> Result<String, serde_json::Error> {
        Ok(escape_script_json(&self.to_json()?))
    }

    /// Parse a state blob. Anything but a JSON object is rejected.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}

impl From<Map<String, JsonValue>> for SsrState {
    fn from(values: Map<String, JsonValue>) -> Self {
        Self { values }
    }
}

/// The rendered markup of one component instance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContentBlob {
    pub content: String,
}

impl ContentBlob {
    pub fn new(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
        }
    }

    pub fn to_script_json(&self) -> Result<String, serde_json::Error> {
        Ok(escape_script_json(&serde_json::to_string(self)?))
    }

    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}

/// Escape `<`, `>` and `&` as JSON unicode escapes.
///
/// These characters only occur inside JSON strings, so the result decodes
/// to the same value and can never close the surrounding script element.
pub fn escape_script_json(json: &str) -> String {
    let mut out = String::with_capacity(json.len());
    for c in json.chars() {
        match c {
            '<' => out.push_str("\\u003c"),
            '>' => out.push_str("\\u003e"),
            '&' => out.push_str("\\u0026"),
            _ => out.push(c),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn state_is_a_flat_object() {
        let mut state = SsrState::new();
        state.insert("count", 3);
        state.insert("label", "hi");

        assert_eq!(state.to_json().unwrap(), r#"{"count":3,"label":"hi"}"#);
        assert_eq!(state.len(), 2);
    }

    #[test]
    fn non_object_state_is_rejected() {
        assert!(SsrState::from_json("[1,2]").is_err());
        assert!(SsrState::from_json("{\"a\":").is_err());
        assert_eq!(SsrState::from_json("{}").unwrap(), SsrState::new());
    }

    #[test]
    fn script_json_cannot_close_script() {
        let blob = ContentBlob::new("<p>a & b</p></script>");
        let json = blob.to_script_json().unwrap();

        assert!(!json.contains('<'));
        assert!(!json.contains('>'));
        assert_eq!(ContentBlob::from_json(&json).unwrap(), blob);
    }

    #[test]
    fn escaped_state_decodes_to_same_values() {
        let mut state = SsrState::new();
        state.insert("html", "</script><script>");
        let json = state.to_script_json().unwrap();

        let back = SsrState::from_json(&json).unwrap();
        assert_eq!(back.get("html"), Some(&json!("</script><script>")));
    }
}
