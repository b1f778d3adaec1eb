//! SQL dump reader
//!
//! Scans a dump for `INSERT INTO <table> (<columns>) VALUES (...), (...)`
//! statements and turns every value tuple into one record. Anything else in the
//! dump (DDL, comments, SET statements) is ignored. The scan is tolerant: a
//! statement that cannot be parsed is counted and skipped.
//!
//! A statement only starts outside quoted text and comments, so `insert into`
//! inside a string value stays part of that value. An unterminated quote hides
//! every statement after it.

use std::path::Path;

use once_cell::sync::Lazy;
use regex::Regex;

use super::encoding::{SourceEncoding, read_text};
use super::{ReadError, SourceReader};
use crate::models::{DropReason, RawRecord, RecordOutcome, Recovery, Value};

static RE_INSERT_START: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\bINSERT\s+INTO\b").expect("Invalid regex"));
static RE_INSERT_STATEMENT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?is)^INSERT\s+INTO\s+([`"\w.\[\]]+)\s*\(([^)]*)\)\s*VALUES\s*(.*)$"#)
        .expect("Invalid regex")
});

const QUOTE_CHARS: [char; 3] = ['\'', '"', '`'];

/// Reader for SQL dump files
#[derive(Debug, Clone, Copy, Default)]
pub struct SqlDumpReader;

impl SqlDumpReader {
    /// Parse already-decoded text
    pub fn read_str(&self, text: &str) -> Result<Vec<RecordOutcome>, ReadError> {
        if text.trim().is_empty() {
            return Err(ReadError::Empty);
        }

        let starts = statement_starts(text);
        if starts.is_empty() {
            return Err(ReadError::Preflight(
                "no INSERT INTO statements found".to_string(),
            ));
        }

        let mut outcomes = Vec::new();
        for (i, start) in starts.iter().enumerate() {
            let end = starts.get(i + 1).copied().unwrap_or(text.len());
            parse_statement(&text[*start..end], &mut outcomes);
        }

        Ok(outcomes)
    }
}

impl SourceReader for SqlDumpReader {
    fn read(
        &self,
        path: &Path,
        encoding: SourceEncoding,
    ) -> Result<Vec<RecordOutcome>, ReadError> {
        let text = read_text(path, encoding)?;
        self.read_str(&text)
    }
}

/// Lexical context while scanning for statement starts
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Scan {
    Code,
    Quoted(char),
    LineComment,
    BlockComment,
}

/// Byte offsets of `INSERT INTO` keywords outside quotes and comments
fn statement_starts(text: &str) -> Vec<usize> {
    let mut candidates = RE_INSERT_START.find_iter(text).map(|m| m.start()).peekable();
    let bytes = text.as_bytes();
    let mut starts = Vec::new();
    let mut scan = Scan::Code;
    let mut escaped = false;

    for (i, c) in text.char_indices() {
        if candidates.peek().is_none() {
            break;
        }
        if candidates.peek() == Some(&i) {
            candidates.next();
            if scan == Scan::Code {
                starts.push(i);
            }
        }

        scan = match scan {
            Scan::Quoted(q) => {
                if escaped {
                    escaped = false;
                    scan
                } else if c == '\\' {
                    escaped = true;
                    scan
                } else if c == q {
                    Scan::Code
                } else {
                    scan
                }
            }
            Scan::LineComment if c == '\n' => Scan::Code,
            Scan::BlockComment if c == '*' && bytes.get(i + 1) == Some(&b'/') => Scan::Code,
            Scan::Code => match c {
                '\'' | '"' | '`' => Scan::Quoted(c),
                '-' if bytes.get(i + 1) == Some(&b'-') => Scan::LineComment,
                '/' if bytes.get(i + 1) == Some(&b'*') => Scan::BlockComment,
                _ => scan,
            },
            other => other,
        };
    }

    starts
}

fn parse_statement(statement: &str, outcomes: &mut Vec<RecordOutcome>) {
    let Some(caps) = RE_INSERT_STATEMENT.captures(statement) else {
        tracing::warn!(
            "Skipping malformed INSERT statement: {}",
            statement.chars().take(80).collect::<String>()
        );
        outcomes.push(RecordOutcome::Dropped(DropReason::MalformedStatement));
        return;
    };

    let table = caps.get(1).map(|m| m.as_str()).unwrap_or_default();
    let columns: Vec<String> = caps
        .get(2)
        .map(|m| m.as_str())
        .unwrap_or_default()
        .split(',')
        .map(|c| c.trim().trim_matches(|ch| QUOTE_CHARS.contains(&ch) || ch == '[' || ch == ']'))
        .map(str::to_string)
        .collect();
    let values = caps.get(3).map(|m| m.as_str()).unwrap_or_default();

    if columns.iter().any(String::is_empty) {
        outcomes.push(RecordOutcome::Dropped(DropReason::MalformedStatement));
        return;
    }

    let tuples = split_tuples(values);
    if tuples.is_empty() {
        outcomes.push(RecordOutcome::Dropped(DropReason::MalformedStatement));
        return;
    }
    tracing::debug!("INSERT into {} with {} row(s)", table, tuples.len());

    for tuple in tuples {
        let row = split_values(tuple);
        if row.is_empty() {
            outcomes.push(RecordOutcome::Dropped(DropReason::MalformedStatement));
            continue;
        }

        let width = row.len().min(columns.len());
        let record: RawRecord = columns
            .iter()
            .cloned()
            .zip(row.iter().cloned())
            .take(width)
            .collect();

        if row.len() == columns.len() {
            outcomes.push(RecordOutcome::Parsed(record));
        } else {
            outcomes.push(RecordOutcome::Recovered(record, Recovery::PartialSqlRow));
        }
    }
}

/// Split the text after `VALUES` into the contents of each `( ... )` tuple.
///
/// Parentheses and `;` inside quotes are ignored. The scan stops at the first
/// top-level `;`. A trailing tuple cut off by end of input is kept as-is.
fn split_tuples(values: &str) -> Vec<&str> {
    let mut tuples = Vec::new();
    let mut quote: Option<char> = None;
    let mut escaped = false;
    let mut depth: usize = 0;
    let mut start = 0;

    for (i, c) in values.char_indices() {
        if let Some(q) = quote {
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == q {
                quote = None;
            }
            continue;
        }
        match c {
            '\'' | '"' | '`' if depth > 0 => quote = Some(c),
            '(' => {
                if depth == 0 {
                    start = i + 1;
                }
                depth += 1;
            }
            ')' if depth > 0 => {
                depth -= 1;
                if depth == 0 {
                    tuples.push(&values[start..i]);
                }
            }
            ';' if depth == 0 => break,
            _ => {}
        }
    }

    if depth > 0 && start < values.len() {
        let tail = values[start..].trim_end();
        if !tail.is_empty() {
            tuples.push(tail);
        }
    }

    tuples
}

/// Split one tuple into values on commas outside quotes.
///
/// A quote character opens a quoted run that only the same character closes;
/// a backslash inside quotes escapes the next character.
fn split_values(tuple: &str) -> Vec<Value> {
    if tuple.trim().is_empty() {
        return Vec::new();
    }

    let mut values = Vec::new();
    let mut current = String::new();
    let mut quote: Option<char> = None;
    let mut escaped = false;

    for c in tuple.chars() {
        if let Some(q) = quote {
            if escaped {
                current.push(c);
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else {
                if c == q {
                    quote = None;
                }
                current.push(c);
            }
            continue;
        }
        match c {
            '\'' | '"' | '`' => {
                quote = Some(c);
                current.push(c);
            }
            ',' => values.push(finish_value(&std::mem::take(&mut current))),
            _ => current.push(c),
        }
    }
    values.push(finish_value(&current));

    values
}

fn finish_value(raw: &str) -> Value {
    let raw = raw.trim();
    match raw.chars().next() {
        Some(q) if QUOTE_CHARS.contains(&q) => {
            let inner = raw.trim_matches(|c| QUOTE_CHARS.contains(&c));
            let doubled: String = [q, q].iter().collect();
            Value::Text(inner.replace(&doubled, &q.to_string()))
        }
        _ if raw.eq_ignore_ascii_case("null") => Value::Null,
        _ => Value::Text(raw.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DUMP: &str = r#"-- MySQL dump
CREATE TABLE users (id int, name varchar(20), email varchar(50));
INSERT INTO `users` (`id`, `name`, `email`) VALUES (1, 'Ann', 'ann@x.com'),(2,'O''Brien, Pat',NULL);
insert into users (id, name, email)
values (3, 'Bob');
INSERT INTO users VALUES garbage;
INSERT INTO users (id, name) VALUES (4, 'It\'s (fine)');
"#;

    #[test]
    fn test_dump_outcomes() {
        let outcomes = SqlDumpReader.read_str(DUMP).unwrap();
        assert_eq!(outcomes.len(), 5);

        let ann = outcomes[0].record().unwrap();
        assert_eq!(ann.get("id"), Some(&Value::from("1")));
        assert_eq!(ann.get("email"), Some(&Value::from("ann@x.com")));

        let pat = outcomes[1].record().unwrap();
        assert_eq!(pat.get("name"), Some(&Value::from("O'Brien, Pat")));
        assert_eq!(pat.get("email"), Some(&Value::Null));

        match &outcomes[2] {
            RecordOutcome::Recovered(record, Recovery::PartialSqlRow) => {
                assert_eq!(record.len(), 2);
                assert_eq!(record.get("name"), Some(&Value::from("Bob")));
            }
            other => panic!("expected partial row, got {:?}", other),
        }

        assert_eq!(
            outcomes[3],
            RecordOutcome::Dropped(DropReason::MalformedStatement)
        );

        let fine = outcomes[4].record().unwrap();
        assert_eq!(fine.get("name"), Some(&Value::from("It's (fine)")));
    }

    #[test]
    fn test_truncated_final_tuple_is_partial() {
        let outcomes = SqlDumpReader
            .read_str("INSERT INTO t (a, b, c) VALUES (1, 'x'), (2, 'y'")
            .unwrap();
        assert_eq!(outcomes.len(), 2);
        assert!(matches!(
            outcomes[0],
            RecordOutcome::Recovered(_, Recovery::PartialSqlRow)
        ));
        assert_eq!(
            outcomes[1].record().unwrap().get("b"),
            Some(&Value::from("y"))
        );
    }

    #[test]
    fn test_no_inserts_fails_preflight() {
        assert!(matches!(
            SqlDumpReader.read_str("CREATE TABLE t (a int);"),
            Err(ReadError::Preflight(_))
        ));
    }

    #[test]
    fn test_split_values_null_and_quotes() {
        assert_eq!(
            split_values(r#" NULL, 'null', "a,b", `c` "#),
            vec![
                Value::Null,
                Value::from("null"),
                Value::from("a,b"),
                Value::from("c"),
            ]
        );
    }

    #[test]
    fn test_insert_keyword_inside_values_is_data() {
        let dump = "-- Ann's export\n\
            INSERT INTO notes (id, body) VALUES (1,'please insert into db'),\
            (2, 'INSERT INTO x (a) VALUES (1)');\n\
            /* don't split */ INSERT INTO notes (id, body) VALUES (3, 'ok');\n";
        let outcomes = SqlDumpReader.read_str(dump).unwrap();
        assert_eq!(outcomes.len(), 3);
        assert!(
            outcomes
                .iter()
                .all(|o| matches!(o, RecordOutcome::Parsed(_)))
        );
        assert_eq!(
            outcomes[0].record().unwrap().get("body"),
            Some(&Value::from("please insert into db"))
        );
        assert_eq!(
            outcomes[1].record().unwrap().get("body"),
            Some(&Value::from("INSERT INTO x (a) VALUES (1)"))
        );
        assert_eq!(
            outcomes[2].record().unwrap().get("id"),
            Some(&Value::from("3"))
        );
    }

    #[test]
    fn test_statement_starts_skip_quotes_and_comments() {
        let text = "INSERT INTO a (x) VALUES ('insert into');\n-- insert into b\nINSERT INTO c (x) VALUES (1);";
        let starts = statement_starts(text);
        assert_eq!(starts.len(), 2);
        assert!(text[starts[1]..].starts_with("INSERT INTO c"));
        assert!(statement_starts("SELECT 'insert into t';").is_empty());
    }
}
