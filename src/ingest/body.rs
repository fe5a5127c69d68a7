//! Body normalization.
//!
//! Inbound bodies have no declared shape. Each one is classified once into
//! a [`StoredBody`] and never rejected for its content: JSON is kept as
//! parsed, anything else is kept verbatim under a reserved field.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Field holding the original text of a body that is not JSON.
pub const RAW_FIELD: &str = "_raw";

/// A normalized request body.
///
/// Serialized as `null`, the JSON value itself, or `{"_raw": "<text>"}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "Value", into = "Value")]
pub enum StoredBody {
    /// The request carried no body.
    Empty,
    /// The body parsed as JSON.
    Json(Value),
    /// The body was not valid JSON; kept unmodified.
    Raw(String),
}

impl StoredBody {
    pub fn is_empty(&self) -> bool {
        matches!(self, StoredBody::Empty)
    }

    pub fn as_json(&self) -> Option<&Value> {
        match self {
            StoredBody::Json(value) => Some(value),
            _ => None,
        }
    }

    pub fn as_raw(&self) -> Option<&str> {
        match self {
            StoredBody::Raw(text) => Some(text),
            _ => None,
        }
    }
}

impl From<StoredBody> for Value {
    fn from(body: StoredBody) -> Self {
        match body {
            StoredBody::Empty => Value::Null,
            StoredBody::Json(value) => value,
            StoredBody::Raw(text) => {
                let mut wrapper = Map::with_capacity(1);
                wrapper.insert(RAW_FIELD.to_string(), Value::String(text));
                Value::Object(wrapper)
            }
        }
    }
}

impl From<Value> for StoredBody {
    fn from(value: Value) -> Self {
        match value {
            Value::Null => StoredBody::Empty,
            Value::Object(mut map) if map.len() == 1 && map.get(RAW_FIELD).is_some_and(Value::is_string) => {
                match map.remove(RAW_FIELD) {
                    Some(Value::String(text)) => StoredBody::Raw(text),
                    _ => StoredBody::Json(Value::Object(map)),
                }
            }
            other => StoredBody::Json(other),
        }
    }
}

/// Classify a raw body.
pub fn normalize(raw: &str) -> StoredBody {
    if raw.is_empty() {
        return StoredBody::Empty;
    }
    match serde_json::from_str::<Value>(raw) {
        Ok(value) => StoredBody::Json(value),
        Err(_) => StoredBody::Raw(raw.to_string()),
    }
}

/// Decode request bytes as UTF-8, replacing invalid sequences, then classify.
pub fn normalize_bytes(raw: &[u8]) -> StoredBody {
    normalize(&String::from_utf8_lossy(raw))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn empty_body_is_empty() {
        assert_eq!(normalize(""), StoredBody::Empty);
        assert_eq!(Value::from(normalize("")), Value::Null);
    }

    #[test]
    fn json_object_is_kept() {
        let body = normalize(r#"{"event":"push","commits":[1,2,3],"nested":{"ok":true}}"#);
        assert_eq!(
            body,
            StoredBody::Json(json!({"event": "push", "commits": [1, 2, 3], "nested": {"ok": true}}))
        );
    }

    #[test]
    fn json_scalars_and_arrays_are_kept() {
        assert_eq!(normalize("42"), StoredBody::Json(json!(42)));
        assert_eq!(normalize("\"hi\""), StoredBody::Json(json!("hi")));
        assert_eq!(normalize("[true, null]"), StoredBody::Json(json!([true, null])));
        assert_eq!(normalize("  {\"a\": 1}\n"), StoredBody::Json(json!({"a": 1})));
    }

    #[test]
    fn numbers_keep_their_exact_text() {
        let raw = r#"{"id":123456789012345678901234567890,"neg":-98765432109876543210}"#;
        let body = normalize(raw);
        assert!(body.as_json().is_some());
        assert_eq!(serde_json::to_string(&body).unwrap(), raw);

        let reloaded: StoredBody = serde_json::from_str(raw).unwrap();
        assert_eq!(reloaded, body);
    }

    #[test]
    fn invalid_json_is_wrapped_verbatim() {
        let body = normalize("not json{");
        assert_eq!(body, StoredBody::Raw("not json{".to_string()));
        assert_eq!(Value::from(body), json!({"_raw": "not json{"}));
    }

    #[test]
    fn form_encoded_body_is_raw() {
        let text = "a=1&b=two%20words";
        assert_eq!(normalize(text).as_raw(), Some(text));
    }

    #[test]
    fn whitespace_only_body_is_raw() {
        assert_eq!(normalize("   "), StoredBody::Raw("   ".to_string()));
    }

    #[test]
    fn invalid_utf8_is_replaced() {
        let body = normalize_bytes(&[b'o', b'k', 0xff]);
        assert_eq!(body.as_raw(), Some("ok\u{fffd}"));
    }

    #[test]
    fn serializes_to_stored_shape() {
        let raw = serde_json::to_value(StoredBody::Raw("x<y>".into())).unwrap();
        assert_eq!(raw, json!({"_raw": "x<y>"}));

        let empty = serde_json::to_value(StoredBody::Empty).unwrap();
        assert_eq!(empty, Value::Null);
    }

    #[test]
    fn deserializes_raw_wrapper() {
        let body: StoredBody = serde_json::from_value(json!({"_raw": "plain"})).unwrap();
        assert_eq!(body, StoredBody::Raw("plain".into()));

        let body: StoredBody = serde_json::from_value(json!({"_raw": 1})).unwrap();
        assert_eq!(body, StoredBody::Json(json!({"_raw": 1})));

        let body: StoredBody = serde_json::from_value(json!({"_raw": "a", "b": 2})).unwrap();
        assert!(body.as_json().is_some());
    }
}
