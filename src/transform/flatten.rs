//! Flattening of nested records into `key → string` form

use crate::models::{FlatRecord, RawRecord, Value};

/// Default separator between parent and child keys
pub const DEFAULT_SEPARATOR: &str = "_";

/// Flatten a raw record.
///
/// - nested maps merge as `parent + sep + child`
/// - a list of scalars becomes one JSON array text; an empty list becomes `""`
/// - a list whose first element is a map flattens only that first element
/// - null becomes `""`
///
/// Flattening an already-flat record returns it unchanged.
///
/// # Examples
///
/// ```
/// use unified_ingest::models::{RawRecord, Value};
/// use unified_ingest::transform::flatten;
///
/// let mut address = RawRecord::new();
/// address.insert("city", "Leeds");
/// let mut record = RawRecord::new();
/// record.insert("address", Value::Map(address));
///
/// let flat = flatten(&record, "_");
/// assert_eq!(flat.get("address_city"), Some("Leeds"));
/// ```
pub fn flatten(record: &RawRecord, sep: &str) -> FlatRecord {
    let mut flat = FlatRecord::new();
    flatten_into(record, None, sep, &mut flat);
    flat
}

fn flatten_into(record: &RawRecord, parent: Option<&str>, sep: &str, out: &mut FlatRecord) {
    for (key, value) in record.iter() {
        let new_key = match parent {
            Some(p) => format!("{}{}{}", p, sep, key),
            None => key.clone(),
        };

        match value {
            Value::Map(child) => flatten_into(child, Some(&new_key), sep, out),
            Value::List(items) => match items.first() {
                None => out.insert(new_key, String::new()),
                Some(Value::Map(first)) => flatten_into(first, Some(&new_key), sep, out),
                Some(_) => out.insert(new_key, value.to_field_string()),
            },
            scalar => out.insert(new_key, scalar.to_field_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn nested() -> RawRecord {
        let json: serde_json::Value = serde_json::from_str(
            r#"{
                "name": "Ann",
                "age": 41,
                "active": true,
                "nickname": null,
                "address": {"city": "Leeds", "geo": {"lat": 53.8}},
                "tags": ["a", "b"],
                "empty": [],
                "jobs": [{"title": "Dev", "year": 2020}, {"title": "Ops"}]
            }"#,
        )
        .unwrap();
        match Value::from(json) {
            Value::Map(record) => record,
            _ => unreachable!(),
        }
    }

    #[test]
    fn test_flatten_rules() {
        let flat = flatten(&nested(), DEFAULT_SEPARATOR);
        assert_eq!(flat.get("name"), Some("Ann"));
        assert_eq!(flat.get("age"), Some("41"));
        assert_eq!(flat.get("active"), Some("true"));
        assert_eq!(flat.get("nickname"), Some(""));
        assert_eq!(flat.get("address_city"), Some("Leeds"));
        assert_eq!(flat.get("address_geo_lat"), Some("53.8"));
        assert_eq!(flat.get("tags"), Some(r#"["a","b"]"#));
        assert_eq!(flat.get("empty"), Some(""));
        assert_eq!(flat.get("jobs_title"), Some("Dev"));
        assert_eq!(flat.get("jobs_year"), Some("2020"));
        assert!(!flat.contains_key("address"));
    }

    #[test]
    fn test_flatten_is_idempotent() {
        let once = flatten(&nested(), DEFAULT_SEPARATOR);
        let twice = flatten(&RawRecord::from(once.clone()), DEFAULT_SEPARATOR);
        assert_eq!(once, twice);
    }

    #[test]
    fn test_custom_separator() {
        let flat = flatten(&nested(), ".");
        assert_eq!(flat.get("address.geo.lat"), Some("53.8"));
    }
}
