//! Free-form JSON value used for request/response bodies (spec §9).
//!
//! Request bodies and captured response bodies are ad-hoc JSON. We model
//! them as our own sum type rather than passing `serde_json::Value` around
//! directly so that size-capping and equality are defined once, at the
//! type's boundary, and so the algebra crate (which never inspects body
//! contents) doesn't need a `serde_json` dependency at all.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum JsonValue {
    Null,
    Bool(bool),
    Number(f64),
    String(String),
    Array(Vec<JsonValue>),
    /// `BTreeMap` rather than `HashMap` so equality and serialization are
    /// deterministic (stable key order) — matters for signing, where the
    /// body bytes must be reproducible.
    Object(BTreeMap<String, JsonValue>),
}

impl Default for JsonValue {
    fn default() -> Self {
        JsonValue::Null
    }
}

impl JsonValue {
    /// Approximate serialized size in bytes, used to enforce
    /// `maxResponseSizeKb` without re-serializing on the hot path.
    pub fn approx_bytes(&self) -> usize {
        match self {
            JsonValue::Null => 4,
            JsonValue::Bool(_) => 5,
            JsonValue::Number(_) => 8,
            JsonValue::String(s) => s.len() + 2,
            JsonValue::Array(items) => {
                2 + items.iter().map(|v| v.approx_bytes() + 1).sum::<usize>()
            }
            JsonValue::Object(map) => {
                2 + map
                    .iter()
                    .map(|(k, v)| k.len() + 3 + v.approx_bytes() + 1)
                    .sum::<usize>()
            }
        }
    }

    pub fn to_serde(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or(serde_json::Value::Null)
    }

    pub fn from_serde(value: serde_json::Value) -> Self {
        serde_json::from_value(value).unwrap_or(JsonValue::Null)
    }
}

impl fmt::Display for JsonValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_serde())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn approx_bytes_nonzero_for_each_variant() {
        assert!(JsonValue::Null.approx_bytes() > 0);
        assert!(JsonValue::Bool(true).approx_bytes() > 0);
        assert!(JsonValue::String("hello".into()).approx_bytes() >= 5);
    }

    #[test]
    fn roundtrip_through_serde_json() {
        let mut map = BTreeMap::new();
        map.insert("a".to_string(), JsonValue::Number(1.0));
        map.insert("b".to_string(), JsonValue::Array(vec![JsonValue::Bool(true)]));
        let v = JsonValue::Object(map);
        let serde_v = v.to_serde();
        let back = JsonValue::from_serde(serde_v);
        assert_eq!(v, back);
    }

    #[test]
    fn object_key_order_is_deterministic() {
        let json = serde_json::json!({"z": 1, "a": 2});
        let v1 = JsonValue::from_serde(json.clone());
        let v2 = JsonValue::from_serde(json);
        assert_eq!(v1, v2);
        if let JsonValue::Object(map) = v1 {
            let keys: Vec<&String> = map.keys().collect();
            assert_eq!(keys, vec!["a", "z"]);
        } else {
            panic!("expected object");
        }
    }
}
