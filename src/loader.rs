//! CSV ingestion into the base tables
//!
//! Each table is created if absent and then filled with
//! `INSERT ... ON CONFLICT DO NOTHING`, so loading the same file twice leaves
//! the table unchanged. Rows that collide with an existing natural key are
//! dropped silently and only show up as `rows_skipped` in the [`LoadReport`].

use std::path::Path;

use tracing::{debug, info, warn};

use crate::db::Database;
use crate::error::{EtlError, Result};
use crate::models::LoadReport;
use crate::schema::{SchemaRegistry, TableSchema};
use crate::validation::InputValidator;

/// Hook invoked after every table load
#[cfg_attr(test, mockall::automock)]
pub trait LoadObserver {
    /// Called once the table's transaction has committed
    fn on_table_loaded(&mut self, db: &Database, report: &LoadReport) -> Result<()>;
}

/// Logs a structured summary per table, plus a row preview at debug level
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingLoadObserver {
    preview_rows: usize,
}

impl TracingLoadObserver {
    /// `preview_rows == 0` disables the preview
    #[must_use]
    pub const fn new(preview_rows: usize) -> Self {
        Self { preview_rows }
    }
}

impl LoadObserver for TracingLoadObserver {
    fn on_table_loaded(&mut self, db: &Database, report: &LoadReport) -> Result<()> {
        let total_rows = db.row_count(&report.table)?;
        info!(
            table = %report.table,
            rows_read = report.rows_read,
            rows_inserted = report.rows_inserted,
            rows_skipped = report.rows_skipped,
            total_rows,
            "Table loaded"
        );

        if self.preview_rows > 0 && tracing::enabled!(tracing::Level::DEBUG) {
            for row in db.preview(&report.table, self.preview_rows)? {
                debug!(table = %report.table, row = %row.join(" | "), "Preview");
            }
        }
        Ok(())
    }
}

/// Loads CSV files into base tables over a single connection
pub struct TableLoader<'a> {
    db: &'a mut Database,
    observer: Option<Box<dyn LoadObserver + 'a>>,
}

impl<'a> TableLoader<'a> {
    /// Loader without an observer
    pub fn new(db: &'a mut Database) -> Self {
        Self { db, observer: None }
    }

    /// Attach a hook called after each table load
    #[must_use]
    pub fn with_observer(mut self, observer: Box<dyn LoadObserver + 'a>) -> Self {
        self.observer = Some(observer);
        self
    }

    /// Create `schema`'s table if absent and insert every row of `source`
    ///
    /// Fails without touching the table if the file is missing, the header
    /// width differs from the column count, or any row is malformed.
    pub fn load(&mut self, schema: &TableSchema, source: &Path) -> Result<LoadReport> {
        self.db.execute_batch(&schema.create_table_sql())?;
        InputValidator::validate_source_file(source)?;

        let mut reader = csv::ReaderBuilder::new().has_headers(true).from_path(source)?;
        let headers = reader.headers()?.clone();
        if headers.len() != schema.columns.len() {
            return Err(EtlError::ColumnMismatch {
                table: schema.name.to_string(),
                expected: schema.columns.len(),
                found: headers.len(),
            });
        }
        if let Some((found, expected)) = headers
            .iter()
            .zip(schema.column_names())
            .find(|(found, expected)| found.trim() != *expected)
        {
            // Matching is positional; a renamed header is worth a warning only.
            warn!(table = schema.name, found, expected, "CSV header differs from column name");
        }

        let mut report = LoadReport::new(schema.name, &source.display().to_string());
        let tx = self.db.transaction()?;
        {
            let mut stmt = tx.prepare(&schema.insert_or_ignore_sql())?;
            for record in reader.records() {
                let record = record?;
                let values = record.iter().map(|field| (!field.is_empty()).then_some(field));
                let changed = stmt.execute(rusqlite::params_from_iter(values))?;
                report.record(changed > 0);
            }
        }
        tx.commit()?;

        crate::metrics::record_load(&report);
        if let Some(observer) = self.observer.as_mut() {
            observer.on_table_loaded(&*self.db, &report)?;
        }
        Ok(report)
    }

    /// Load every base table from `dataset_dir`, in registry order
    pub fn load_all(&mut self, registry: &SchemaRegistry, dataset_dir: &Path) -> Result<Vec<LoadReport>> {
        InputValidator::validate_dataset_dir(dataset_dir)?;

        let mut reports = Vec::with_capacity(registry.base_tables().len());
        for schema in registry.base_tables() {
            let Some(file) = schema.source_file else {
                return Err(EtlError::InvalidSchema(format!(
                    "base table {} has no source file",
                    schema.name
                )));
            };
            reports.push(self.load(schema, &dataset_dir.join(file))?);
        }
        Ok(reports)
    }
}
