//! Input validation and sanitization for store identifiers.
//!
//! Table names come from configuration and column names come from arbitrary
//! source files, so both are checked or rewritten before they reach SQL.

use thiserror::Error;

/// Maximum length for table names
pub const MAX_TABLE_NAME_LENGTH: usize = 255;

/// Maximum length for column names
pub const MAX_COLUMN_NAME_LENGTH: usize = 255;

/// Errors that can occur during input validation.
#[derive(Debug, Clone, Error)]
pub enum ValidationError {
    /// Input is empty when a value is required
    #[error("{0} cannot be empty")]
    Empty(&'static str),

    /// Input exceeds maximum allowed length
    #[error("{field} exceeds maximum length (max: {max}, got: {actual})")]
    TooLong {
        field: &'static str,
        max: usize,
        actual: usize,
    },

    /// Input contains invalid characters
    #[error("{field} contains invalid characters: {reason}")]
    InvalidCharacters { field: &'static str, reason: String },

    /// Input has invalid format
    #[error("{0}: {1}")]
    InvalidFormat(&'static str, String),

    /// Input is a reserved word
    #[error("{field} cannot be a reserved word: {word}")]
    ReservedWord { field: &'static str, word: String },
}

/// Result type for validation operations.
pub type ValidationResult<T> = Result<T, ValidationError>;

/// Validate a store table name.
///
/// # Rules
///
/// - Must not be empty
/// - Must not exceed 255 characters
/// - Must start with a letter or underscore
/// - May contain letters, digits and underscores
/// - Cannot be a SQL reserved word
///
/// # Examples
///
/// ```
/// use unified_ingest::validation::input::validate_table_name;
///
/// assert!(validate_table_name("master_records").is_ok());
/// assert!(validate_table_name("").is_err());
/// assert!(validate_table_name("1records").is_err());
/// assert!(validate_table_name("records; DROP").is_err());
/// ```
pub fn validate_table_name(name: &str) -> ValidationResult<()> {
    let Some(first_char) = name.chars().next() else {
        return Err(ValidationError::Empty("table name"));
    };

    if name.len() > MAX_TABLE_NAME_LENGTH {
        return Err(ValidationError::TooLong {
            field: "table name",
            max: MAX_TABLE_NAME_LENGTH,
            actual: name.len(),
        });
    }

    if !first_char.is_alphabetic() && first_char != '_' {
        return Err(ValidationError::InvalidFormat(
            "table name",
            "must start with a letter or underscore".to_string(),
        ));
    }

    if let Some(c) = name.chars().find(|c| !c.is_alphanumeric() && *c != '_') {
        return Err(ValidationError::InvalidCharacters {
            field: "table name",
            reason: format!("invalid character: '{}'", c),
        });
    }

    if is_sql_reserved_word(name) {
        return Err(ValidationError::ReservedWord {
            field: "table name",
            word: name.to_string(),
        });
    }

    Ok(())
}

/// Rewrite an incoming field name into a store column name.
///
/// Spaces and hyphens become underscores; anything else is kept and the result
/// is always quoted with [`quote_identifier`] when used in SQL.
///
/// # Examples
///
/// ```
/// use unified_ingest::validation::input::sanitize_column_name;
///
/// assert_eq!(sanitize_column_name("home address").unwrap(), "home_address");
/// assert_eq!(sanitize_column_name("e-mail").unwrap(), "e_mail");
/// assert!(sanitize_column_name("   ").is_err());
/// ```
pub fn sanitize_column_name(name: &str) -> ValidationResult<String> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Err(ValidationError::Empty("column name"));
    }

    let sanitized: String = trimmed
        .chars()
        .map(|c| if c == ' ' || c == '-' { '_' } else { c })
        .collect();

    if sanitized.chars().count() > MAX_COLUMN_NAME_LENGTH {
        return Err(ValidationError::TooLong {
            field: "column name",
            max: MAX_COLUMN_NAME_LENGTH,
            actual: sanitized.chars().count(),
        });
    }

    if sanitized.chars().any(|c| c.is_control()) {
        return Err(ValidationError::InvalidCharacters {
            field: "column name",
            reason: "contains control characters".to_string(),
        });
    }

    Ok(sanitized)
}

/// Quote an identifier for DuckDB by wrapping it in double quotes.
///
/// Internal quote characters are escaped by doubling them, so the result is
/// safe to splice into a statement.
///
/// # Examples
///
/// ```
/// use unified_ingest::validation::input::quote_identifier;
///
/// assert_eq!(quote_identifier("email"), "\"email\"");
/// assert_eq!(quote_identifier("a\"b"), "\"a\"\"b\"");
/// ```
pub fn quote_identifier(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// Check if a word is a SQL reserved word.
///
/// This is a basic check covering common reserved words across SQL dialects.
fn is_sql_reserved_word(word: &str) -> bool {
    const RESERVED_WORDS: &[&str] = &[
        "select", "from", "where", "insert", "update", "delete", "create", "drop", "alter",
        "table", "index", "view", "database", "schema", "grant", "revoke", "commit", "rollback",
        "begin", "end", "transaction", "primary", "foreign", "key", "references", "constraint",
        "unique", "check", "default", "not", "null", "and", "or", "in", "between", "like", "is",
        "case", "when", "then", "else", "as", "on", "join", "group", "by", "having", "order",
        "limit", "offset", "union", "values", "set", "into",
    ];

    let lower = word.to_lowercase();
    RESERVED_WORDS.contains(&lower.as_str())
}
