//! Store schema definitions
//!
//! The master table starts with the identity columns and the processing
//! timestamp; everything else arrives through additive evolution.

use crate::validation::input::quote_identifier;

/// Columns created with a fresh master table, in ordinal order
pub const BASE_COLUMNS: [(&str, &str); 8] = [
    ("canonical_key", "VARCHAR"),
    ("name", "VARCHAR"),
    ("first_name", "VARCHAR"),
    ("last_name", "VARCHAR"),
    ("email", "VARCHAR"),
    ("phone", "VARCHAR"),
    ("dob", "VARCHAR"),
    ("ingest_timestamp", "TIMESTAMP"),
];

/// Store schema helper
pub struct StoreSchema;

impl StoreSchema {
    /// `CREATE TABLE IF NOT EXISTS` for the master table
    ///
    /// No index is created: DuckDB refuses `ALTER TABLE ... ADD COLUMN` on
    /// tables that carry one.
    pub fn create_table_sql(table: &str) -> String {
        let columns: Vec<String> = BASE_COLUMNS
            .iter()
            .map(|(name, sql_type)| format!("    {} {}", quote_identifier(name), sql_type))
            .collect();
        format!(
            "CREATE TABLE IF NOT EXISTS {} (\n{}\n);",
            quote_identifier(table),
            columns.join(",\n")
        )
    }

    /// Column listing for a table, ordered by position
    pub fn describe_columns_sql() -> &'static str {
        "SELECT column_name FROM information_schema.columns \
         WHERE table_name = ? ORDER BY ordinal_position"
    }

    /// `ALTER TABLE ... ADD COLUMN`
    pub fn add_column_sql(table: &str, column: &str, sql_type: &str) -> String {
        format!(
            "ALTER TABLE {} ADD COLUMN {} {}",
            quote_identifier(table),
            quote_identifier(column),
            sql_type
        )
    }

    /// Parameterized insert over the given columns
    ///
    /// The timestamp column is cast explicitly so text values bind cleanly.
    pub fn insert_sql(table: &str, columns: &[String]) -> String {
        let names: Vec<String> = columns.iter().map(|c| quote_identifier(c)).collect();
        let placeholders: Vec<&str> = columns
            .iter()
            .map(|c| {
                if c.eq_ignore_ascii_case(crate::models::INGEST_TIMESTAMP_FIELD) {
                    "CAST(? AS TIMESTAMP)"
                } else {
                    "?"
                }
            })
            .collect();
        format!(
            "INSERT INTO {} ({}) VALUES ({})",
            quote_identifier(table),
            names.join(", "),
            placeholders.join(", ")
        )
    }

    /// Row count of a table
    pub fn count_sql(table: &str) -> String {
        format!("SELECT COUNT(*) FROM {}", quote_identifier(table))
    }

    /// Rows matching one canonical key
    pub fn lookup_sql(table: &str) -> String {
        format!(
            "SELECT * FROM {} WHERE {} = ?",
            quote_identifier(table),
            quote_identifier(crate::models::CANONICAL_KEY_FIELD)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_table_sql() {
        let sql = StoreSchema::create_table_sql("master_records");
        assert!(sql.starts_with("CREATE TABLE IF NOT EXISTS \"master_records\""));
        assert!(sql.contains("\"canonical_key\" VARCHAR"));
        assert!(sql.contains("\"ingest_timestamp\" TIMESTAMP"));
        assert!(!sql.to_uppercase().contains("INDEX"));
    }

    #[test]
    fn test_insert_sql_casts_timestamp() {
        let sql = StoreSchema::insert_sql(
            "t",
            &["canonical_key".to_string(), "ingest_timestamp".to_string()],
        );
        assert_eq!(
            sql,
            "INSERT INTO \"t\" (\"canonical_key\", \"ingest_timestamp\") VALUES (?, CAST(? AS TIMESTAMP))"
        );
    }

    #[test]
    fn test_add_column_sql_quotes_names() {
        assert_eq!(
            StoreSchema::add_column_sql("t", "home address", "VARCHAR"),
            "ALTER TABLE \"t\" ADD COLUMN \"home address\" VARCHAR"
        );
    }
}
