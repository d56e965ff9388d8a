//! Data models shared across the pipeline
//!
//! Load and pipeline reports, the rating model choice, and the typed rows
//! read back from the analytic tables.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Outcome of loading one CSV file into its table
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoadReport {
    /// Target table
    pub table: String,
    /// Source CSV path
    pub source: String,
    /// Data rows parsed from the CSV (header excluded)
    pub rows_read: usize,
    /// Rows actually written
    pub rows_inserted: usize,
    /// Rows dropped because they collided with an existing natural key
    pub rows_skipped: usize,
}

impl LoadReport {
    /// Empty report for a table about to be loaded
    #[must_use]
    pub fn new(table: &str, source: &str) -> Self {
        Self {
            table: table.to_string(),
            source: source.to_string(),
            rows_read: 0,
            rows_inserted: 0,
            rows_skipped: 0,
        }
    }

    /// Count one parsed row and whether it was inserted
    pub fn record(&mut self, inserted: bool) {
        self.rows_read += 1;
        if inserted {
            self.rows_inserted += 1;
        } else {
            self.rows_skipped += 1;
        }
    }
}

/// Result of an analytic table builder
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Materialization {
    /// The table was absent and has been created with this many rows
    Created {
        /// Rows written
        rows: usize,
    },
    /// The table already existed and was left untouched
    AlreadyPresent,
}

/// How `most_valuable_customers` rates customers
///
/// The two models disagree on both output scale and reference date, so a run
/// uses exactly one of them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RatingModel {
    /// Weighted spend/orders plus recency bonus, ranked with competition ranking.
    /// Recency is measured against the wall-clock date at run time.
    Composite,
    /// Recency/frequency/monetary quintile scores folded onto a 0-10 scale
    Rfm {
        /// Fixed date recency is measured from
        analysis_date: NaiveDate,
    },
}

impl RatingModel {
    /// Configuration name of the model
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Composite => "composite",
            Self::Rfm { .. } => "rfm",
        }
    }
}

/// `customer_rating` column; its meaning depends on the rating model
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CustomerRating {
    /// Competition rank, 1 is best
    Rank(i64),
    /// RFM score in 0..=10, higher is better
    Score(f64),
}

/// One row of `most_valuable_customers`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CustomerValue {
    /// `None` only for fact rows whose order is missing
    pub customer_id: Option<String>,
    /// Sum of delivered item prices
    pub total_spent: f64,
    /// Distinct delivered orders
    pub total_orders: i64,
    /// Latest delivery date
    pub last_order_date: Option<NaiveDate>,
    pub customer_rating: CustomerRating,
}

/// One row of `rolling_quarters`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RollingQuarter {
    /// `None` for items whose order is missing
    pub customer_id: Option<String>,
    /// First day of the month; `None` for items whose order was never delivered
    pub month: Option<NaiveDate>,
    pub monthly_total: f64,
    pub rolling_quartal_avg: f64,
}

/// Summary of a full pipeline run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineReport {
    /// One report per base table, in load order
    pub loads: Vec<LoadReport>,
    /// Rows appended to `facts_order_items`
    pub facts_inserted: usize,
    /// Name of the model used for `most_valuable_customers`
    pub rating_model: String,
    /// Outcome of the `most_valuable_customers` build
    pub most_valuable_customers: Materialization,
    /// Outcome of the `rolling_quarters` build
    pub rolling_quarters: Materialization,
}
