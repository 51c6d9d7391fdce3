// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! OTLP `AnyValue` decoding.
//!
//! OTLP/JSON encodes attribute values as a single-key object such as
//! `{"stringValue": "grep"}` or `{"intValue": "5"}`. Each shape is decoded
//! into an explicit [`AnyValue`] variant. Shapes that do not match a known
//! variant (wrong JSON type, unparseable int64 string) decode as
//! [`AnyValue::Empty`] instead of failing the whole payload.

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Deserializer};
use serde_json::Value;

/// A decoded OTLP attribute or body value.
#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
#[serde(from = "RawAnyValue")]
pub enum AnyValue {
    /// Missing or unrecognised shape.
    #[default]
    Empty,
    String(String),
    Int(i64),
    Double(f64),
    Bool(bool),
    Array(Vec<AnyValue>),
    KvList(Vec<KeyValue>),
    /// Base64 bytes, kept encoded.
    Bytes(String),
}

/// Wire form of `AnyValue`: every field optional and untyped so that a
/// bad variant degrades to `Empty` rather than a parse error.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct RawAnyValue {
    string_value: Option<Value>,
    int_value: Option<Value>,
    double_value: Option<Value>,
    bool_value: Option<Value>,
    array_value: Option<Value>,
    kvlist_value: Option<Value>,
    bytes_value: Option<Value>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawValues<T> {
    values: Vec<T>,
}

impl From<RawAnyValue> for AnyValue {
    fn from(raw: RawAnyValue) -> Self {
        if let Some(Value::String(s)) = raw.string_value {
            return AnyValue::String(s);
        }
        if let Some(i) = raw.int_value.as_ref().and_then(json_i64) {
            return AnyValue::Int(i);
        }
        if let Some(d) = raw.double_value.as_ref().and_then(json_f64) {
            return AnyValue::Double(d);
        }
        if let Some(Value::Bool(b)) = raw.bool_value {
            return AnyValue::Bool(b);
        }
        if let Some(values) = raw
            .array_value
            .and_then(|v| serde_json::from_value::<RawValues<AnyValue>>(v).ok())
        {
            return AnyValue::Array(values.values);
        }
        if let Some(values) = raw
            .kvlist_value
            .and_then(|v| serde_json::from_value::<RawValues<KeyValue>>(v).ok())
        {
            return AnyValue::KvList(values.values);
        }
        if let Some(Value::String(b)) = raw.bytes_value {
            return AnyValue::Bytes(b);
        }
        AnyValue::Empty
    }
}

impl AnyValue {
    /// Whether this is a scalar (string, int, double or bool).
    pub fn is_scalar(&self) -> bool {
        matches!(
            self,
            Self::String(_) | Self::Int(_) | Self::Double(_) | Self::Bool(_)
        )
    }

    /// Scalar rendered as a string; numeric values are stringified.
    pub fn as_string(&self) -> Option<String> {
        match self {
            Self::String(s) => Some(s.clone()),
            Self::Int(i) => Some(i.to_string()),
            Self::Double(d) => Some(d.to_string()),
            Self::Bool(b) => Some(b.to_string()),
            _ => None,
        }
    }

    /// Non-negative integer view. Numeric strings are parsed, since
    /// producers commonly send counts as `stringValue`.
    pub fn as_u64(&self) -> Option<u64> {
        match self {
            Self::Int(i) => u64::try_from(*i).ok(),
            Self::Double(d) => f64_to_u64(*d),
            Self::String(s) => {
                let s = s.trim();
                s.parse::<u64>()
                    .ok()
                    .or_else(|| s.parse::<f64>().ok().and_then(f64_to_u64))
            }
            _ => None,
        }
    }

    /// Finite float view. Numeric strings are parsed.
    pub fn as_f64(&self) -> Option<f64> {
        let value = match self {
            Self::Int(i) => *i as f64,
            Self::Double(d) => *d,
            Self::String(s) => s.trim().parse::<f64>().ok()?,
            _ => return None,
        };
        value.is_finite().then_some(value)
    }
}

impl fmt::Display for AnyValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Empty => Ok(()),
            Self::String(s) => write!(f, "{}", s),
            Self::Int(i) => write!(f, "{}", i),
            Self::Double(d) => write!(f, "{}", d),
            Self::Bool(b) => write!(f, "{}", b),
            Self::Bytes(b) => write!(f, "{}", b),
            Self::Array(values) => {
                let parts: Vec<String> = values.iter().map(ToString::to_string).collect();
                write!(f, "[{}]", parts.join(", "))
            }
            Self::KvList(pairs) => {
                let parts: Vec<String> = pairs
                    .iter()
                    .map(|kv| format!("{}={}", kv.key, kv.value))
                    .collect();
                write!(f, "{}", parts.join(", "))
            }
        }
    }
}

fn f64_to_u64(d: f64) -> Option<u64> {
    (d.is_finite() && d >= 0.0 && d <= u64::MAX as f64).then(|| d as u64)
}

/// Lenient int64: proto3 JSON allows both `5` and `"5"`.
pub(crate) fn json_i64(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64().or_else(|| {
            n.as_f64()
                .filter(|f| f.is_finite() && f.fract() == 0.0)
                .map(|f| f as i64)
        }),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// Lenient uint64 (counts, nanosecond timestamps).
pub(crate) fn json_u64(value: &Value) -> Option<u64> {
    match value {
        Value::Number(n) => n.as_u64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// Lenient double: numbers, numeric strings, and the proto3 special strings.
pub(crate) fn json_f64(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// Serde helper: optional lenient int64 field.
pub(crate) fn lenient_i64<'de, D>(deserializer: D) -> Result<Option<i64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(value.as_ref().and_then(json_i64))
}

/// Serde helper: optional lenient uint64 field.
pub(crate) fn lenient_u64<'de, D>(deserializer: D) -> Result<Option<u64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(value.as_ref().and_then(json_u64))
}

/// Serde helper: optional lenient double field.
pub(crate) fn lenient_f64<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(value.as_ref().and_then(json_f64))
}

/// A single OTLP key/value attribute.
#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
#[serde(default)]
pub struct KeyValue {
    pub key: String,
    pub value: AnyValue,
}

/// Flat attribute map built from a list of OTLP key/values.
///
/// Only scalar values are kept. Later duplicates of a key win.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Attributes(HashMap<String, AnyValue>);

impl Attributes {
    /// Build from an OTLP attribute list, dropping non-scalar values.
    pub fn from_key_values(pairs: &[KeyValue]) -> Self {
        let map = pairs
            .iter()
            .filter(|kv| !kv.key.is_empty() && kv.value.is_scalar())
            .map(|kv| (kv.key.clone(), kv.value.clone()))
            .collect();
        Self(map)
    }

    pub fn get(&self, key: &str) -> Option<&AnyValue> {
        self.0.get(key)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    /// String value of `key`, stringifying numbers.
    pub fn get_str(&self, key: &str) -> Option<String> {
        self.get(key).and_then(AnyValue::as_string)
    }

    /// String value of the first key present.
    pub fn first_str(&self, keys: &[&str]) -> Option<String> {
        keys.iter().find_map(|key| self.get_str(key))
    }

    pub fn get_u64(&self, key: &str) -> Option<u64> {
        self.get(key).and_then(AnyValue::as_u64)
    }

    pub fn get_f64(&self, key: &str) -> Option<f64> {
        self.get(key).and_then(AnyValue::as_f64)
    }

    pub fn insert(&mut self, key: impl Into<String>, value: AnyValue) {
        self.0.insert(key.into(), value);
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &AnyValue)> {
        self.0.iter()
    }
}

impl<K: Into<String>> FromIterator<(K, AnyValue)> for Attributes {
    fn from_iter<I: IntoIterator<Item = (K, AnyValue)>>(iter: I) -> Self {
        Self(iter.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn decode(value: Value) -> AnyValue {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_decode_scalar_variants() {
        assert_eq!(decode(json!({"stringValue": "grep"})), AnyValue::String("grep".into()));
        assert_eq!(decode(json!({"intValue": 5})), AnyValue::Int(5));
        assert_eq!(decode(json!({"intValue": "42"})), AnyValue::Int(42));
        assert_eq!(decode(json!({"doubleValue": 0.5})), AnyValue::Double(0.5));
        assert_eq!(decode(json!({"boolValue": true})), AnyValue::Bool(true));
    }

    #[test]
    fn test_unrecognised_shapes_fail_closed() {
        assert_eq!(decode(json!({})), AnyValue::Empty);
        assert_eq!(decode(json!({"intValue": "not a number"})), AnyValue::Empty);
        assert_eq!(decode(json!({"boolValue": "yes"})), AnyValue::Empty);
        assert_eq!(decode(json!({"mysteryValue": 1})), AnyValue::Empty);
    }

    #[test]
    fn test_decode_kvlist_renders_key_value_pairs() {
        let value = decode(json!({
            "kvlistValue": {"values": [
                {"key": "model", "value": {"stringValue": "sonnet"}},
                {"key": "tokens", "value": {"intValue": "12"}}
            ]}
        }));
        assert_eq!(value.to_string(), "model=sonnet, tokens=12");
    }

    #[test]
    fn test_numeric_views() {
        assert_eq!(AnyValue::String(" 1000 ".into()).as_u64(), Some(1000));
        assert_eq!(AnyValue::String("0.0375".into()).as_f64(), Some(0.0375));
        assert_eq!(AnyValue::Int(-3).as_u64(), None);
        assert_eq!(AnyValue::Double(f64::NAN).as_f64(), None);
        assert_eq!(AnyValue::Bool(true).as_u64(), None);
        assert_eq!(AnyValue::String("abc".into()).as_u64(), None);
    }

    #[test]
    fn test_attributes_keep_scalars_only() {
        let pairs: Vec<KeyValue> = serde_json::from_value(json!([
            {"key": "tool", "value": {"stringValue": "grep"}},
            {"key": "count", "value": {"intValue": 3}},
            {"key": "nested", "value": {"arrayValue": {"values": []}}},
            {"key": "broken", "value": {"intValue": {}}}
        ]))
        .unwrap();

        let attrs = Attributes::from_key_values(&pairs);
        assert_eq!(attrs.len(), 2);
        assert_eq!(attrs.get_str("tool"), Some("grep".to_string()));
        assert_eq!(attrs.get_str("count"), Some("3".to_string()));
        assert!(!attrs.contains("nested"));
        assert_eq!(attrs.first_str(&["missing", "tool"]), Some("grep".to_string()));
    }
}
