use std::path::Path;
use std::sync::LazyLock;

use chrono::NaiveDate;
use regex::Regex;

use crate::error::{EtlError, Result};

static IDENTIFIER: LazyLock<Regex> = LazyLock::new(|| {
    #[allow(clippy::unwrap_used)]
    Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").unwrap()
});

/// Validation utilities for identifiers, paths and dates
#[derive(Debug, Copy, Clone)]
pub struct InputValidator;

impl InputValidator {
    /// Validate a table or column name before it is interpolated into SQL
    pub fn validate_identifier(name: &str) -> Result<()> {
        if name.is_empty() {
            return Err(EtlError::InvalidSchema("identifier cannot be empty".to_string()));
        }

        if name.len() > 64 {
            return Err(EtlError::InvalidSchema(format!(
                "identifier too long (max 64 characters): {name}"
            )));
        }

        if !IDENTIFIER.is_match(name) {
            return Err(EtlError::InvalidSchema(format!(
                "identifier contains invalid characters: {name:?}"
            )));
        }

        Ok(())
    }

    /// Validate a configured file or directory path
    pub fn validate_path_setting(key: &str, path: &str) -> Result<()> {
        if path.trim().is_empty() {
            return Err(EtlError::InvalidConfig(format!("{key} cannot be empty")));
        }

        if path.contains('\0') {
            return Err(EtlError::InvalidConfig(format!(
                "{key} contains invalid characters"
            )));
        }

        if path.len() > 4096 {
            return Err(EtlError::InvalidConfig(format!(
                "{key} too long (max 4096 characters)"
            )));
        }

        Ok(())
    }

    /// Validate that the dataset directory exists
    pub fn validate_dataset_dir(path: &Path) -> Result<()> {
        if !path.exists() {
            return Err(EtlError::MissingSource(path.to_path_buf()));
        }

        if !path.is_dir() {
            return Err(EtlError::InvalidConfig(format!(
                "dataset directory is not a directory: {}",
                path.display()
            )));
        }

        Ok(())
    }

    /// Validate that a source CSV exists and is a regular file
    pub fn validate_source_file(path: &Path) -> Result<()> {
        if !path.is_file() {
            return Err(EtlError::MissingSource(path.to_path_buf()));
        }

        Ok(())
    }

    /// Parse a `YYYY-MM-DD` date
    pub fn parse_date(value: &str) -> Result<NaiveDate> {
        NaiveDate::parse_from_str(value.trim(), "%Y-%m-%d")
            .map_err(|e| EtlError::InvalidDate(format!("{value}: {e}")))
    }
}
