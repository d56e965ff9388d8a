use metrics::{counter, histogram};
use std::time::Duration;

use crate::models::LoadReport;

/// Rows parsed from source CSV files
pub const ROWS_READ_TOTAL: &str = "olist_etl_rows_read_total";
/// Rows written to base tables
pub const ROWS_INSERTED_TOTAL: &str = "olist_etl_rows_inserted_total";
/// Rows dropped on natural-key conflict
pub const ROWS_SKIPPED_TOTAL: &str = "olist_etl_rows_skipped_total";
/// Wall time of each pipeline stage
pub const STAGE_DURATION_SECONDS: &str = "olist_etl_stage_duration_seconds";

/// Record the row counts of one table load
pub fn record_load(report: &LoadReport) {
    let table = report.table.clone();
    counter!(ROWS_READ_TOTAL, "table" => table.clone()).increment(report.rows_read as u64);
    counter!(ROWS_INSERTED_TOTAL, "table" => table.clone()).increment(report.rows_inserted as u64);
    counter!(ROWS_SKIPPED_TOTAL, "table" => table).increment(report.rows_skipped as u64);
}

/// Record how long a pipeline stage took
pub fn record_stage_duration(stage: &'static str, duration: Duration) {
    histogram!(STAGE_DURATION_SECONDS, "stage" => stage).record(duration.as_secs_f64());
}
