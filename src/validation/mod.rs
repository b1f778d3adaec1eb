//! Validation functionality
//!
//! Provides validation logic for:
//! - Data quality (string cleaning, JSON repair, corrupted-line recovery)
//! - Store identifiers (table and column names)
//! - XML well-formedness

pub mod input;
pub mod quality;
pub mod xml;

pub use input::{
    ValidationError, quote_identifier, sanitize_column_name, validate_table_name,
};
pub use quality::{
    LineFormat, MAX_VALUE_LENGTH, clean_string, recover_corrupted_line, repair_json_line,
    sanitize_for_storage, truncate, validate_record,
};
pub use xml::check_well_formed;
