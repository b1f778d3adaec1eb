//! Command-line interface support for the `unified-ingest` binary

pub mod commands;
pub mod error;

pub use error::CliError;
