//! Record representations
//!
//! Records move through three shapes on their way to the store:
//!
//! - [`RawRecord`]: ordered field → [`Value`] mapping as produced by a source reader.
//!   Values may nest (lists, maps).
//! - [`FlatRecord`]: ordered field → `String` mapping produced by the flattener. This is
//!   the only shape that crosses a component boundary after reading.
//! - [`NormalizedRecord`]: canonical field names, identity values cleaned, plus the
//!   `canonical_key` and `ingest_timestamp` every record carries into the merge.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// Field name of the deterministic identity hash
pub const CANONICAL_KEY_FIELD: &str = "canonical_key";

/// Field name of the processing timestamp stamped on every record
pub const INGEST_TIMESTAMP_FIELD: &str = "ingest_timestamp";

/// Tagged value union for loosely-typed source data
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    List(Vec<Value>),
    Map(RawRecord),
}

impl Value {
    /// Whether this value is a scalar (not a list or map)
    pub fn is_scalar(&self) -> bool {
        !matches!(self, Value::List(_) | Value::Map(_))
    }

    /// Render a scalar as its field text. Nulls render as the empty string.
    ///
    /// Lists and maps render as compact JSON so nothing is ever lost silently
    /// when a caller stringifies a nested value directly.
    pub fn to_field_string(&self) -> String {
        match self {
            Value::Null => String::new(),
            Value::Bool(b) => b.to_string(),
            Value::Int(i) => i.to_string(),
            Value::Float(f) => format_float(*f),
            Value::Text(s) => s.clone(),
            Value::List(_) | Value::Map(_) => {
                serde_json::to_string(&serde_json::Value::from(self.clone())).unwrap_or_default()
            }
        }
    }
}

/// Render a float without a trailing `.0` when it holds an integral value
pub fn format_float(f: f64) -> String {
    if f.is_finite() && f.fract() == 0.0 && f.abs() < 1e15 {
        format!("{}", f as i64)
    } else if f.is_finite() {
        f.to_string()
    } else {
        String::new()
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Text(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Text(s)
    }
}

impl From<serde_json::Value> for Value {
    fn from(value: serde_json::Value) -> Self {
        match value {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Bool(b),
            serde_json::Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Value::Int(i)
                } else if let Some(f) = n.as_f64() {
                    Value::Float(f)
                } else {
                    Value::Text(n.to_string())
                }
            }
            serde_json::Value::String(s) => Value::Text(s),
            serde_json::Value::Array(items) => {
                Value::List(items.into_iter().map(Value::from).collect())
            }
            serde_json::Value::Object(map) => Value::Map(RawRecord(
                map.into_iter().map(|(k, v)| (k, Value::from(v))).collect(),
            )),
        }
    }
}

impl From<Value> for serde_json::Value {
    fn from(value: Value) -> Self {
        match value {
            Value::Null => serde_json::Value::Null,
            Value::Bool(b) => serde_json::Value::Bool(b),
            Value::Int(i) => serde_json::Value::from(i),
            Value::Float(f) => serde_json::Number::from_f64(f)
                .map(serde_json::Value::Number)
                .unwrap_or(serde_json::Value::Null),
            Value::Text(s) => serde_json::Value::String(s),
            Value::List(items) => {
                serde_json::Value::Array(items.into_iter().map(serde_json::Value::from).collect())
            }
            Value::Map(record) => serde_json::Value::Object(
                record
                    .0
                    .into_iter()
                    .map(|(k, v)| (k, serde_json::Value::from(v)))
                    .collect(),
            ),
        }
    }
}

/// Ordered mapping from source field name to value
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RawRecord(pub IndexMap<String, Value>);

impl RawRecord {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.0.insert(key.into(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.0.iter()
    }
}

impl FromIterator<(String, Value)> for RawRecord {
    fn from_iter<T: IntoIterator<Item = (String, Value)>>(iter: T) -> Self {
        RawRecord(iter.into_iter().collect())
    }
}

impl From<FlatRecord> for RawRecord {
    fn from(flat: FlatRecord) -> Self {
        flat.0.into_iter().map(|(k, v)| (k, Value::Text(v))).collect()
    }
}

/// Ordered, strictly flat, string-valued record
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FlatRecord(pub IndexMap<String, String>);

impl FlatRecord {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.0.insert(key.into(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &String)> {
        self.0.iter()
    }
}

impl FromIterator<(String, String)> for FlatRecord {
    fn from_iter<T: IntoIterator<Item = (String, String)>>(iter: T) -> Self {
        FlatRecord(iter.into_iter().collect())
    }
}

/// A record ready for the merge: canonical names, string values, identity hash and timestamp
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NormalizedRecord {
    /// Canonical field name → value (excludes `canonical_key` and `ingest_timestamp`)
    pub fields: IndexMap<String, String>,
    /// Deterministic identity hash (64 hex chars)
    pub canonical_key: String,
    /// Processing time, `YYYY-MM-DD HH:MM:SS.ffffff` UTC
    pub ingest_timestamp: String,
}

impl NormalizedRecord {
    /// Value of a column; the reserved columns resolve to their dedicated fields
    /// and absent fields resolve to the empty string.
    pub fn value(&self, column: &str) -> &str {
        match column {
            CANONICAL_KEY_FIELD => &self.canonical_key,
            INGEST_TIMESTAMP_FIELD => &self.ingest_timestamp,
            other => self.fields.get(other).map(String::as_str).unwrap_or(""),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_json_conversion_preserves_order() {
        let json: serde_json::Value =
            serde_json::from_str(r#"{"z": 1, "a": {"b": [true, null]}, "m": 1.5}"#).unwrap();
        let value = Value::from(json);
        let Value::Map(record) = value else {
            panic!("expected map");
        };
        let keys: Vec<&String> = record.0.keys().collect();
        assert_eq!(keys, vec!["z", "a", "m"]);
        assert_eq!(record.get("z"), Some(&Value::Int(1)));
        assert_eq!(record.get("m"), Some(&Value::Float(1.5)));
    }

    #[test]
    fn test_field_string_rendering() {
        assert_eq!(Value::Null.to_field_string(), "");
        assert_eq!(Value::Float(5.0).to_field_string(), "5");
        assert_eq!(Value::Float(2.25).to_field_string(), "2.25");
        assert_eq!(Value::Float(f64::NAN).to_field_string(), "");
        assert_eq!(
            Value::List(vec![Value::from("a"), Value::Int(2)]).to_field_string(),
            r#"["a",2]"#
        );
    }

    #[test]
    fn test_normalized_record_value_lookup() {
        let mut fields = IndexMap::new();
        fields.insert("email".to_string(), "a@b.c".to_string());
        let record = NormalizedRecord {
            fields,
            canonical_key: "k".to_string(),
            ingest_timestamp: "2024-01-01 00:00:00.000000".to_string(),
        };
        assert_eq!(record.value("email"), "a@b.c");
        assert_eq!(record.value("phone"), "");
        assert_eq!(record.value(CANONICAL_KEY_FIELD), "k");
    }
}
