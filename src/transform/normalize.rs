//! Field normalization: canonical names, synonym vocabulary, identity cleanup

use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use once_cell::sync::Lazy;
use regex::Regex;

use super::canonical_key::canonical_key;
use crate::models::{
    CANONICAL_KEY_FIELD, DropReason, FlatRecord, INGEST_TIMESTAMP_FIELD, NormalizedRecord,
};
use crate::validation::quality::{MAX_VALUE_LENGTH, sanitize_for_storage, validate_record};

static RE_NON_WORD: Lazy<Regex> = Lazy::new(|| Regex::new(r"\W").expect("Invalid regex"));
static RE_UNDERSCORES: Lazy<Regex> = Lazy::new(|| Regex::new(r"_+").expect("Invalid regex"));

/// Source name → canonical name, applied in this order and only when the target is absent
pub const SYNONYMS: [(&str, &str); 9] = [
    ("fname", "first_name"),
    ("lname", "last_name"),
    ("full_name", "name"),
    ("email_address", "email"),
    ("e_mail", "email"),
    ("phone_number", "phone"),
    ("mobile", "phone"),
    ("date_of_birth", "dob"),
    ("birth_date", "dob"),
];

/// Fields whose values are lowercased for identity matching
pub const IDENTITY_VALUE_FIELDS: [&str; 5] = ["name", "first_name", "last_name", "email", "phone"];

/// Timestamp layout stored in `ingest_timestamp`
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.6f";

/// Normalize a field name.
///
/// Lowercase, trim, every non-word character to `_`, collapse `_` runs and
/// strip leading/trailing `_`. Applying it twice gives the same result.
///
/// # Examples
///
/// ```
/// use unified_ingest::transform::normalize_field_name;
///
/// assert_eq!(normalize_field_name(" E-Mail Address "), "e_mail_address");
/// assert_eq!(normalize_field_name("__Phone__No."), "phone_no");
/// ```
pub fn normalize_field_name(name: &str) -> String {
    let lowered = name.trim().to_lowercase();
    let replaced = RE_NON_WORD.replace_all(&lowered, "_");
    let collapsed = RE_UNDERSCORES.replace_all(&replaced, "_");
    collapsed.trim_matches('_').to_string()
}

/// Render a processing time the way `ingest_timestamp` stores it
pub fn format_ingest_timestamp(time: &DateTime<Utc>) -> String {
    time.format(TIMESTAMP_FORMAT).to_string()
}

/// Normalizes flat records for one run
#[derive(Debug, Clone)]
pub struct FieldNormalizer {
    ingest_timestamp: String,
    max_value_length: usize,
    required_fields: Vec<String>,
}

impl FieldNormalizer {
    /// Create a normalizer stamping every record with `run_time`
    pub fn new(run_time: DateTime<Utc>) -> Self {
        Self {
            ingest_timestamp: format_ingest_timestamp(&run_time),
            max_value_length: MAX_VALUE_LENGTH,
            required_fields: Vec::new(),
        }
    }

    pub fn with_max_value_length(mut self, max_value_length: usize) -> Self {
        self.max_value_length = max_value_length;
        self
    }

    pub fn with_required_fields(mut self, required_fields: Vec<String>) -> Self {
        self.required_fields = required_fields
            .iter()
            .map(|f| normalize_field_name(f))
            .collect();
        self
    }

    pub fn ingest_timestamp(&self) -> &str {
        &self.ingest_timestamp
    }

    /// Normalize one flat record.
    ///
    /// Fails with [`DropReason::MissingRequiredField`] when a configured required
    /// field is absent or empty after normalization.
    pub fn normalize(&self, record: FlatRecord) -> Result<NormalizedRecord, DropReason> {
        let mut fields: IndexMap<String, String> = IndexMap::with_capacity(record.len());

        for (raw_name, raw_value) in record.0 {
            let name = normalize_field_name(&raw_name);
            if name.is_empty() || name == CANONICAL_KEY_FIELD || name == INGEST_TIMESTAMP_FIELD {
                continue;
            }
            let value = sanitize_for_storage(&raw_value, self.max_value_length);
            match fields.get_mut(&name) {
                // First non-empty value wins
                Some(existing) if existing.is_empty() => *existing = value,
                Some(_) => {}
                None => {
                    fields.insert(name, value);
                }
            }
        }

        for (source, target) in SYNONYMS {
            if fields.contains_key(source) && !fields.contains_key(target) {
                fields = fields
                    .into_iter()
                    .map(|(k, v)| if k == source { (target.to_string(), v) } else { (k, v) })
                    .collect();
            }
        }

        for field in IDENTITY_VALUE_FIELDS {
            if let Some(value) = fields.get_mut(field) {
                *value = value.trim().to_lowercase();
            }
        }

        if !validate_record(
            |k| fields.get(k).map(String::as_str),
            &self.required_fields,
        ) {
            return Err(DropReason::MissingRequiredField);
        }

        let canonical_key = canonical_key(&fields);
        Ok(NormalizedRecord {
            fields,
            canonical_key,
            ingest_timestamp: self.ingest_timestamp.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn run_time() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, 12, 30, 0).unwrap()
    }

    fn flat(pairs: &[(&str, &str)]) -> FlatRecord {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_normalize_field_name_idempotent() {
        for raw in ["First Name", " e-mail!! ", "Phone__Number", "déjà vu", "___"] {
            let once = normalize_field_name(raw);
            assert_eq!(normalize_field_name(&once), once, "{}", raw);
        }
        assert_eq!(normalize_field_name("First Name"), "first_name");
        assert_eq!(normalize_field_name("___"), "");
    }

    #[test]
    fn test_synonyms_and_identity_values() {
        let normalizer = FieldNormalizer::new(run_time());
        let record = normalizer
            .normalize(flat(&[
                ("Full Name", "  Ann SMITH "),
                ("E-Mail", "ANN@X.COM"),
                ("Mobile", "555 0100"),
                ("Date Of Birth", "1990-01-01"),
                ("City", "Leeds"),
            ]))
            .unwrap();

        let keys: Vec<&str> = record.fields.keys().map(String::as_str).collect();
        assert_eq!(keys, vec!["name", "email", "phone", "dob", "city"]);
        assert_eq!(record.value("name"), "ann smith");
        assert_eq!(record.value("email"), "ann@x.com");
        assert_eq!(record.value("city"), "Leeds");
        assert_eq!(record.ingest_timestamp, "2024-05-01 12:30:00.000000");
    }

    #[test]
    fn test_synonym_skipped_when_target_present() {
        let normalizer = FieldNormalizer::new(run_time());
        let record = normalizer
            .normalize(flat(&[("email", "a@x.com"), ("email_address", "b@x.com")]))
            .unwrap();
        assert_eq!(record.value("email"), "a@x.com");
        assert_eq!(record.value("email_address"), "b@x.com");
    }

    #[test]
    fn test_colliding_names_keep_first_non_empty() {
        let normalizer = FieldNormalizer::new(run_time());
        let record = normalizer
            .normalize(flat(&[("Email", ""), ("EMAIL", "x@y.z"), ("email ", "other@y.z")]))
            .unwrap();
        assert_eq!(record.fields.len(), 1);
        assert_eq!(record.value("email"), "x@y.z");
    }

    #[test]
    fn test_key_independent_of_source_spelling() {
        let normalizer = FieldNormalizer::new(run_time());
        let a = normalizer
            .normalize(flat(&[("full_name", "Ann"), ("e_mail", "ANN@x.com")]))
            .unwrap();
        let b = normalizer
            .normalize(flat(&[("Email", " ann@X.com "), ("Name", "ann"), ("zip", "1")]))
            .unwrap();
        assert_eq!(a.canonical_key, b.canonical_key);
    }

    #[test]
    fn test_required_fields_and_value_cap() {
        let normalizer = FieldNormalizer::new(run_time())
            .with_required_fields(vec!["Email".to_string()])
            .with_max_value_length(3);
        assert_eq!(
            normalizer.normalize(flat(&[("name", "Ann")])),
            Err(DropReason::MissingRequiredField)
        );
        let record = normalizer
            .normalize(flat(&[("email", "abcdef"), ("canonical_key", "spoofed")]))
            .unwrap();
        assert_eq!(record.value("email"), "abc");
        assert!(!record.fields.contains_key("canonical_key"));
    }
}
