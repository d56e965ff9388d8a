//! Recency / frequency / monetary customer rating
//!
//! SQLite has no `PERCENTILE_CONT`, so the quintile cut points and the
//! per-customer scores are computed here and written back through a temporary
//! table.

use chrono::NaiveDate;
use rusqlite::{params, Connection};
use tracing::info;

use crate::analytics::{materialize, DELIVERED_TOTALS_CTE, DELIVERED_STATUS};
use crate::db::Database;
use crate::error::Result;
use crate::models::Materialization;
use crate::schema::{FACTS_ORDER_ITEMS, MOST_VALUABLE_CUSTOMERS_RFM, ORDERS, ORDER_ITEMS};

/// Raw RFM inputs for one customer
#[derive(Debug, Clone, PartialEq)]
pub struct RfmMetrics {
    /// Customer the metrics belong to
    pub customer_id: String,
    /// Days from the last delivery to the analysis date
    pub recency_days: i64,
    /// Number of order items bought
    pub frequency: i64,
    /// Sum of item prices, exact to the cent
    pub monetary: f64,
}

/// Scores and final rating for one customer
#[derive(Debug, Clone, PartialEq)]
pub struct RfmScore {
    /// Customer the scores belong to
    pub customer_id: String,
    /// 5 for the most recent quintile, 1 for the least
    pub recency: u8,
    /// 1 for the fewest items bought, 5 for the most
    pub frequency: u8,
    /// 1 for the lowest spend, 5 for the highest
    pub monetary: u8,
    /// `(recency + frequency + monetary) / 15 * 10`, rounded to 2 decimals
    pub rating: f64,
}

/// Continuous percentile over ascending `sorted` values, as `PERCENTILE_CONT`.
#[must_use]
pub fn percentile_cont(sorted: &[f64], fraction: f64) -> Option<f64> {
    let last = sorted.len().checked_sub(1)?;
    let position = fraction.clamp(0.0, 1.0) * last as f64;
    let lower = position.floor() as usize;
    let upper = position.ceil() as usize;
    let (low, high) = (sorted[lower], sorted[upper]);
    Some((position - lower as f64).mul_add(high - low, low))
}

/// 20th/40th/60th/80th percentile cut points of one dimension
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Quintiles {
    cuts: [f64; 4],
}

impl Quintiles {
    /// `None` when there are no values
    pub fn from_values(values: impl IntoIterator<Item = f64>) -> Option<Self> {
        let mut sorted: Vec<f64> = values.into_iter().collect();
        sorted.sort_by(f64::total_cmp);
        Some(Self {
            cuts: [
                percentile_cont(&sorted, 0.2)?,
                percentile_cont(&sorted, 0.4)?,
                percentile_cont(&sorted, 0.6)?,
                percentile_cont(&sorted, 0.8)?,
            ],
        })
    }

    /// The four cut points, ascending
    #[must_use]
    pub const fn cuts(&self) -> [f64; 4] {
        self.cuts
    }

    /// 1 for the lowest quintile up to 5 for the highest
    #[must_use]
    pub fn score_higher_is_better(&self, value: f64) -> u8 {
        6 - self.score_lower_is_better(value)
    }

    /// 5 for the lowest quintile down to 1 for the highest
    #[must_use]
    pub fn score_lower_is_better(&self, value: f64) -> u8 {
        match self.cuts.iter().position(|cut| value <= *cut) {
            Some(bin) => 5 - bin as u8,
            None => 1,
        }
    }
}

/// Fold three 1-5 scores onto a 0-10 scale
#[must_use]
pub fn rating(recency: u8, frequency: u8, monetary: u8) -> f64 {
    let total = f64::from(recency) + f64::from(frequency) + f64::from(monetary);
    (total / 15.0 * 10.0 * 100.0).round() / 100.0
}

/// Score every customer against the quintiles of the whole population
#[must_use]
pub fn score_customers(metrics: &[RfmMetrics]) -> Vec<RfmScore> {
    let (Some(recency), Some(frequency), Some(monetary)) = (
        Quintiles::from_values(metrics.iter().map(|m| m.recency_days as f64)),
        Quintiles::from_values(metrics.iter().map(|m| m.frequency as f64)),
        Quintiles::from_values(metrics.iter().map(|m| m.monetary)),
    ) else {
        return Vec::new();
    };

    metrics
        .iter()
        .map(|m| {
            let r = recency.score_lower_is_better(m.recency_days as f64);
            let f = frequency.score_higher_is_better(m.frequency as f64);
            let mo = monetary.score_higher_is_better(m.monetary);
            RfmScore {
                customer_id: m.customer_id.clone(),
                recency: r,
                frequency: f,
                monetary: mo,
                rating: rating(r, f, mo),
            }
        })
        .collect()
}

/// Per-customer RFM inputs from orders joined to their items (all statuses)
///
/// Customers without any delivery date are left out.
pub fn customer_metrics(conn: &Connection, analysis_date: NaiveDate) -> Result<Vec<RfmMetrics>> {
    ORDERS.require_columns(&["order_id", "customer_id", "order_delivered_customer_date"])?;
    ORDER_ITEMS.require_columns(&["order_id", "price"])?;

    let sql = format!(
        "SELECT
            ord.customer_id,
            CAST(julianday(?1) - julianday(date(MAX(ord.order_delivered_customer_date))) AS INTEGER),
            COUNT(*),
            SUM(CAST(ROUND(ordi.price * 100) AS INTEGER)) / 100.0
        FROM {orders} AS ord
        JOIN {items} AS ordi ON ordi.order_id = ord.order_id
        GROUP BY ord.customer_id
        HAVING MAX(ord.order_delivered_customer_date) IS NOT NULL AND ord.customer_id IS NOT NULL
        ORDER BY ord.customer_id",
        orders = ORDERS.name,
        items = ORDER_ITEMS.name,
    );

    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(params![analysis_date], |row| {
        Ok(RfmMetrics {
            customer_id: row.get(0)?,
            recency_days: row.get(1)?,
            frequency: row.get(2)?,
            monetary: row.get::<_, Option<f64>>(3)?.unwrap_or_default(),
        })
    })?;

    let mut results = Vec::new();
    for metrics in rows {
        results.push(metrics?);
    }
    Ok(results)
}

/// Materialize `most_valuable_customers` with RFM ratings, if absent
pub fn build_rfm_ranking(db: &mut Database, analysis_date: NaiveDate) -> Result<Materialization> {
    FACTS_ORDER_ITEMS.require_columns(&["customer_id", "order_id", "price", "order_status"])?;

    materialize(db, &MOST_VALUABLE_CUSTOMERS_RFM, |tx| {
        let scores = score_customers(&customer_metrics(tx, analysis_date)?);
        info!(customers = scores.len(), %analysis_date, "Computed RFM scores");

        tx.execute_batch(
            "CREATE TEMP TABLE rfm_scores (customer_id TEXT PRIMARY KEY, customer_rating DOUBLE)",
        )?;
        {
            let mut insert = tx.prepare("INSERT INTO temp.rfm_scores VALUES (?1, ?2)")?;
            for score in &scores {
                insert.execute(params![score.customer_id, score.rating])?;
            }
        }

        let sql = format!(
            "{DELIVERED_TOTALS_CTE}
            INSERT INTO {target} (customer_id, total_spent, total_orders, last_order_date, customer_rating)
            SELECT dt.customer_id, dt.total_spent, dt.total_orders, dt.last_order_date, s.customer_rating
            FROM delivered_totals AS dt
            JOIN temp.rfm_scores AS s ON s.customer_id = dt.customer_id
            ORDER BY s.customer_rating DESC, dt.customer_id",
            target = MOST_VALUABLE_CUSTOMERS_RFM.name,
        );
        let rows = tx.execute(&sql, params![DELIVERED_STATUS])?;
        tx.execute_batch("DROP TABLE temp.rfm_scores")?;
        Ok(rows)
    })
}
