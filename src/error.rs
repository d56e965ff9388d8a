//! Error types for the olist-etl library.
//!
//! Every fallible operation in the library returns [`Result`], an alias over
//! [`EtlError`]. The binary wraps these in `anyhow` for context.

use std::path::PathBuf;

use thiserror::Error;

/// Errors that can occur while loading, transforming or scoring the dataset.
#[derive(Error, Debug)]
pub enum EtlError {
    /// Database-related errors
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// Malformed CSV input, including rows with the wrong number of fields
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// File I/O errors
    #[error("File I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A source CSV file does not exist
    #[error("Source file not found: {}", .0.display())]
    MissingSource(PathBuf),

    /// The CSV header does not have as many fields as the table has columns
    #[error("Column count mismatch for table {table}: expected {expected}, found {found}")]
    ColumnMismatch {
        /// Target table
        table: String,
        /// Number of columns declared in the schema registry
        expected: usize,
        /// Number of fields in the CSV header
        found: usize,
    },

    /// Table is not part of the schema registry
    #[error("Unknown table: {0}")]
    UnknownTable(String),

    /// Column is not declared on the given table
    #[error("Unknown column {column} on table {table}")]
    UnknownColumn {
        /// Table that was searched
        table: String,
        /// Missing column
        column: String,
    },

    /// The schema registry failed validation
    #[error("Invalid schema: {0}")]
    InvalidSchema(String),

    /// Configuration could not be read or deserialized
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    /// Configuration values failed validation
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Invalid date format
    #[error("Invalid date format: {0}")]
    InvalidDate(String),
}

/// Convenience type alias for Result with `EtlError`
pub type Result<T> = std::result::Result<T, EtlError>;

impl EtlError {
    /// True when the error was caused by the input files rather than the database.
    #[must_use]
    pub const fn is_input_error(&self) -> bool {
        matches!(
            self,
            Self::Csv(_) | Self::MissingSource(_) | Self::ColumnMismatch { .. }
        )
    }
}
