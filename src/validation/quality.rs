//! Data-quality sanitization and repair utilities.
//!
//! Every function here is total: bad input produces an empty string, `false`
//! or `None`, never an error. Readers use these to salvage malformed lines and
//! the normalizer uses them to cap and clean every stored value.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::models::{RawRecord, Value};

/// Default cap on stored value length, in characters
pub const MAX_VALUE_LENGTH: usize = 10000;

/// Delimiters tried, in order, when recovering a corrupted delimited line
pub const RECOVERY_DELIMITERS: [char; 4] = [',', ';', '\t', '|'];

// Control characters except tab, newline and carriage return
static CONTROL_CHARS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[\x00-\x08\x0B\x0C\x0E-\x1F\x7F]").expect("Invalid regex"));

/// Shape of a line handed to [`recover_corrupted_line`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineFormat {
    Delimited,
    Json,
}

/// Strip control characters, collapse whitespace runs to one space and trim.
///
/// # Examples
///
/// ```
/// use unified_ingest::validation::quality::clean_string;
///
/// assert_eq!(clean_string("  John\x00  Smith\n"), "John Smith");
/// ```
pub fn clean_string(value: &str) -> String {
    let stripped = CONTROL_CHARS.replace_all(value, "");
    stripped.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Cap a string at `max_length` characters (not bytes).
pub fn truncate(value: &str, max_length: usize) -> &str {
    match value.char_indices().nth(max_length) {
        Some((idx, _)) => &value[..idx],
        None => value,
    }
}

/// Cap then clean a value for storage.
pub fn sanitize_for_storage(value: &str, max_length: usize) -> String {
    clean_string(truncate(value, max_length))
}

/// Whether every required field is present with a non-empty value.
pub fn validate_record<'a, I>(lookup: impl Fn(&str) -> Option<&'a str>, required: I) -> bool
where
    I: IntoIterator,
    I::Item: AsRef<str>,
{
    required
        .into_iter()
        .all(|field| lookup(field.as_ref()).is_some_and(|v| !v.is_empty()))
}

/// Balance unclosed `{`/`[` (and a dangling string) with the minimal closers.
///
/// Returns the repaired text only when it then parses as JSON.
///
/// # Examples
///
/// ```
/// use unified_ingest::validation::quality::repair_json_line;
///
/// assert_eq!(repair_json_line(r#"{"a":1,"b":2"#).as_deref(), Some(r#"{"a":1,"b":2}"#));
/// assert_eq!(repair_json_line("[1,2,3").as_deref(), Some("[1,2,3]"));
/// assert_eq!(repair_json_line("not json"), None);
/// ```
pub fn repair_json_line(line: &str) -> Option<String> {
    let line = line.trim();
    if line.is_empty() {
        return None;
    }

    let mut stack: Vec<char> = Vec::new();
    let mut in_string = false;
    let mut escaped = false;

    for c in line.chars() {
        if in_string {
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == '"' {
                in_string = false;
            }
            continue;
        }
        match c {
            '"' => in_string = true,
            '{' => stack.push('}'),
            '[' => stack.push(']'),
            '}' | ']' => {
                if stack.last() == Some(&c) {
                    stack.pop();
                } else {
                    return None;
                }
            }
            _ => {}
        }
    }

    let mut repaired = String::with_capacity(line.len() + stack.len() + 1);
    repaired.push_str(line);
    if in_string {
        if escaped {
            repaired.pop();
        }
        repaired.push('"');
    }
    while let Some(closer) = stack.pop() {
        repaired.push(closer);
    }

    serde_json::from_str::<serde_json::Value>(&repaired)
        .ok()
        .map(|_| repaired)
}

/// Salvage a line that failed normal parsing.
///
/// Delimited lines are split on the first delimiter that yields more than one
/// part, producing positional `col_<i>` fields. JSON lines are repaired and
/// must then parse to an object.
///
/// # Examples
///
/// ```
/// use unified_ingest::validation::quality::{recover_corrupted_line, LineFormat};
///
/// let record = recover_corrupted_line("a,b;c", LineFormat::Delimited).unwrap();
/// let keys: Vec<_> = record.iter().map(|(k, _)| k.as_str()).collect();
/// assert_eq!(keys, vec!["col_0", "col_1"]);
/// ```
pub fn recover_corrupted_line(line: &str, format: LineFormat) -> Option<RawRecord> {
    if line.trim().is_empty() {
        return None;
    }

    match format {
        LineFormat::Delimited => {
            let line = clean_string(line);
            RECOVERY_DELIMITERS.iter().find_map(|delimiter| {
                let parts: Vec<&str> = line.split(*delimiter).collect();
                (parts.len() > 1).then(|| {
                    parts
                        .iter()
                        .enumerate()
                        .map(|(i, part)| (format!("col_{}", i), Value::Text(clean_string(part))))
                        .collect()
                })
            })
        }
        LineFormat::Json => {
            let fixed = repair_json_line(line)?;
            match serde_json::from_str::<serde_json::Value>(&fixed).ok()? {
                json @ serde_json::Value::Object(_) => match Value::from(json) {
                    Value::Map(record) => Some(record),
                    _ => None,
                },
                _ => None,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_clean_string_strips_controls_and_collapses() {
        assert_eq!(clean_string("\x07Alice\t\tB\r\n  "), "Alice B");
        assert_eq!(clean_string(""), "");
        assert_eq!(clean_string("   "), "");
        assert_eq!(clean_string("a\x7Fb"), "ab");
    }

    #[test]
    fn test_truncate_counts_chars() {
        assert_eq!(truncate("héllo", 2), "hé");
        assert_eq!(truncate("abc", 10), "abc");
        assert_eq!(truncate("abc", 0), "");
    }

    #[test]
    fn test_sanitize_for_storage_caps_then_cleans() {
        let long = "x".repeat(MAX_VALUE_LENGTH + 50);
        assert_eq!(
            sanitize_for_storage(&long, MAX_VALUE_LENGTH).chars().count(),
            MAX_VALUE_LENGTH
        );
        assert_eq!(sanitize_for_storage(" a  b ", 3), "a");
    }

    #[test]
    fn test_validate_record() {
        let mut record = HashMap::new();
        record.insert("email", "a@b.com");
        record.insert("name", "");
        let lookup = |k: &str| record.get(k).copied();

        assert!(validate_record(lookup, Vec::<String>::new()));
        assert!(validate_record(lookup, ["email"]));
        assert!(!validate_record(lookup, ["email", "name"]));
        assert!(!validate_record(lookup, ["phone"]));
    }

    #[test]
    fn test_repair_json_line() {
        assert_eq!(
            repair_json_line(r#"{"a":1,"b":2"#).as_deref(),
            Some(r#"{"a":1,"b":2}"#)
        );
        assert_eq!(repair_json_line("[1,2,3").as_deref(), Some("[1,2,3]"));
        assert_eq!(
            repair_json_line(r#"{"a":[1,{"b":2"#).as_deref(),
            Some(r#"{"a":[1,{"b":2}]}"#)
        );
        // Braces inside strings are not counted
        assert_eq!(
            repair_json_line(r#"{"a":"{{""#).as_deref(),
            Some(r#"{"a":"{{"}"#)
        );
        assert_eq!(
            repair_json_line(r#"{"a":"open"#).as_deref(),
            Some(r#"{"a":"open"}"#)
        );
        assert_eq!(repair_json_line(r#"{"a":1}}"#), None);
        assert_eq!(repair_json_line(r#"{"a":"#), None);
        assert_eq!(repair_json_line("   "), None);
    }

    #[test]
    fn test_recover_delimited_line() {
        let record = recover_corrupted_line("a,b;c", LineFormat::Delimited).unwrap();
        assert_eq!(record.len(), 2);
        assert_eq!(record.get("col_0"), Some(&Value::from("a")));
        assert_eq!(record.get("col_1"), Some(&Value::from("b;c")));

        let record = recover_corrupted_line("x|y|z", LineFormat::Delimited).unwrap();
        assert_eq!(record.get("col_2"), Some(&Value::from("z")));

        assert!(recover_corrupted_line("single", LineFormat::Delimited).is_none());
        assert!(recover_corrupted_line("", LineFormat::Delimited).is_none());
    }

    #[test]
    fn test_recover_json_line() {
        let record = recover_corrupted_line(r#"{"name":"Ann""#, LineFormat::Json).unwrap();
        assert_eq!(record.get("name"), Some(&Value::from("Ann")));

        assert!(recover_corrupted_line("[1,2", LineFormat::Json).is_none());
        assert!(recover_corrupted_line("garbage", LineFormat::Json).is_none());
    }
}
