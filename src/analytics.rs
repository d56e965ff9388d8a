//! Analytic read models over `facts_order_items`
//!
//! Each builder creates its table only when absent; once materialized, later
//! runs leave it alone until it is dropped.

use chrono::NaiveDate;
use rusqlite::types::ValueRef;
use rusqlite::{params, Transaction};
use tracing::info;

use crate::db::Database;
use crate::error::{EtlError, Result};
use crate::models::{CustomerRating, CustomerValue, Materialization, RatingModel, RollingQuarter};
use crate::schema::{TableSchema, FACTS_ORDER_ITEMS, MOST_VALUABLE_CUSTOMERS, ROLLING_QUARTERS};

/// Order status counted as a completed purchase
pub const DELIVERED_STATUS: &str = "delivered";

/// Per-customer totals over delivered fact rows; binds the status to `?1`
///
/// Prices are summed in whole cents so equal spends compare equal.
pub(crate) const DELIVERED_TOTALS_CTE: &str = "WITH delivered_totals AS (
    SELECT
        foi.customer_id,
        SUM(CAST(ROUND(foi.price * 100) AS INTEGER)) / 100.0 AS total_spent,
        COUNT(DISTINCT foi.order_id) AS total_orders,
        MAX(foi.order_delivered_customer_date) AS last_order_date
    FROM facts_order_items AS foi
    WHERE foi.order_status = ?1
    GROUP BY foi.customer_id
)";

/// Create `schema`'s table and fill it inside one transaction, unless it exists
pub(crate) fn materialize<F>(db: &mut Database, schema: &TableSchema, fill: F) -> Result<Materialization>
where
    F: FnOnce(&Transaction<'_>) -> Result<usize>,
{
    if db.table_exists(schema.name)? {
        info!(table = schema.name, "Table already present, skipping");
        return Ok(Materialization::AlreadyPresent);
    }

    let tx = db.transaction()?;
    tx.execute_batch(&schema.create_table_sql())?;
    let rows = fill(&tx)?;
    tx.commit()?;

    info!(table = schema.name, rows, "Table materialized");
    Ok(Materialization::Created { rows })
}

/// Build `most_valuable_customers` with the chosen model
///
/// `today` is only used by the composite model; RFM carries its own date.
pub fn build_most_valuable_customers(
    db: &mut Database,
    model: RatingModel,
    today: NaiveDate,
) -> Result<Materialization> {
    match model {
        RatingModel::Composite => build_composite_ranking(db, today),
        RatingModel::Rfm { analysis_date } => crate::rfm::build_rfm_ranking(db, analysis_date),
    }
}

/// Rank delivered-order customers by `0.4 * spent + 0.4 * orders + recency bonus`
///
/// The bonus is 20, 10 or 5 when the last delivery falls within 30, 90 or 180
/// days of `as_of`. Ties share a rank and the next rank skips.
pub fn build_composite_ranking(db: &mut Database, as_of: NaiveDate) -> Result<Materialization> {
    FACTS_ORDER_ITEMS.require_columns(&[
        "customer_id",
        "order_id",
        "price",
        "order_status",
        "order_delivered_customer_date",
    ])?;

    let sql = format!(
        "{DELIVERED_TOTALS_CTE},
        scored AS (
            SELECT
                dt.*,
                dt.total_spent * 0.4 + dt.total_orders * 0.4 +
                CASE
                    WHEN dt.last_order_date >= date(?2, '-30 days') THEN 20
                    WHEN dt.last_order_date >= date(?2, '-90 days') THEN 10
                    WHEN dt.last_order_date >= date(?2, '-180 days') THEN 5
                    ELSE 0
                END AS composite_score
            FROM delivered_totals AS dt
        )
        INSERT INTO {target} (customer_id, total_spent, total_orders, last_order_date, customer_rating)
        SELECT
            customer_id,
            total_spent,
            total_orders,
            last_order_date,
            RANK() OVER (ORDER BY composite_score DESC) AS customer_rating
        FROM scored
        ORDER BY customer_rating, customer_id",
        target = MOST_VALUABLE_CUSTOMERS.name,
    );

    materialize(db, &MOST_VALUABLE_CUSTOMERS, |tx| {
        Ok(tx.execute(&sql, params![DELIVERED_STATUS, as_of])?)
    })
}

/// Monthly spend per customer with the average over that month and the two before it
pub fn build_rolling_quarters(db: &mut Database) -> Result<Materialization> {
    FACTS_ORDER_ITEMS.require_columns(&["customer_id", "price", "order_delivered_customer_date"])?;

    let sql = format!(
        "WITH monthly_totals AS (
            SELECT
                foi.customer_id AS customer_id,
                strftime('%Y-%m-01', foi.order_delivered_customer_date) AS month,
                SUM(CAST(ROUND(foi.price * 100) AS INTEGER)) / 100.0 AS monthly_total
            FROM {facts} AS foi
            GROUP BY 1, 2
        )
        INSERT INTO {target} (customer_id, month, monthly_total, rolling_quartal_avg)
        SELECT
            customer_id,
            month,
            monthly_total,
            AVG(monthly_total) OVER (
                PARTITION BY customer_id
                ORDER BY month
                ROWS BETWEEN 2 PRECEDING AND CURRENT ROW
            ) AS rolling_quartal_avg
        FROM monthly_totals
        ORDER BY customer_id, month",
        facts = FACTS_ORDER_ITEMS.name,
        target = ROLLING_QUARTERS.name,
    );

    materialize(db, &ROLLING_QUARTERS, |tx| Ok(tx.execute(&sql, [])?))
}

/// Read `most_valuable_customers` in stored order
pub fn most_valuable_customers(db: &Database) -> Result<Vec<CustomerValue>> {
    let mut stmt = db.connection().prepare(&format!(
        "SELECT customer_id, total_spent, total_orders, last_order_date, customer_rating
         FROM {} ORDER BY rowid",
        MOST_VALUABLE_CUSTOMERS.name
    ))?;
    let rows = stmt.query_map([], |row| {
        let customer_rating = match row.get_ref(4)? {
            ValueRef::Integer(rank) => CustomerRating::Rank(rank),
            ValueRef::Real(score) => CustomerRating::Score(score),
            other => {
                return Err(rusqlite::Error::FromSqlConversionFailure(
                    4,
                    other.data_type(),
                    "customer_rating is neither a rank nor a score".into(),
                ))
            }
        };
        Ok(CustomerValue {
            customer_id: row.get(0)?,
            total_spent: row.get(1)?,
            total_orders: row.get(2)?,
            last_order_date: row.get(3)?,
            customer_rating,
        })
    })?;

    rows.collect::<rusqlite::Result<Vec<_>>>().map_err(EtlError::from)
}

/// Read `rolling_quarters` in stored order
pub fn rolling_quarters(db: &Database) -> Result<Vec<RollingQuarter>> {
    let mut stmt = db.connection().prepare(&format!(
        "SELECT customer_id, month, monthly_total, rolling_quartal_avg FROM {} ORDER BY rowid",
        ROLLING_QUARTERS.name
    ))?;
    let rows = stmt.query_map([], |row| {
        Ok(RollingQuarter {
            customer_id: row.get(0)?,
            month: row.get(1)?,
            monthly_total: row.get(2)?,
            rolling_quartal_avg: row.get(3)?,
        })
    })?;

    rows.collect::<rusqlite::Result<Vec<_>>>().map_err(EtlError::from)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::facts::create_fact_table;

    fn facts(db: &Database, rows: &[(&str, &str, f64, &str, Option<&str>)]) {
        create_fact_table(db).unwrap();
        for (i, (order_id, customer_id, price, status, delivered)) in rows.iter().enumerate() {
            db.connection()
                .execute(
                    "INSERT INTO facts_order_items
                        (order_id, order_item_id, customer_id, price, order_status, order_delivered_customer_date)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                    params![order_id, i as i64 + 1, customer_id, price, status, delivered],
                )
                .unwrap();
        }
    }

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    #[test]
    fn test_recency_bonus_tiers() {
        let mut db = Database::open_in_memory().unwrap();
        // Identical spend and orders, only recency differs.
        facts(
            &db,
            &[
                ("o1", "recent", 10.0, "delivered", Some("2020-06-20")),
                ("o2", "quarter", 10.0, "delivered", Some("2020-04-15")),
                ("o3", "half", 10.0, "delivered", Some("2020-02-01")),
                ("o4", "old", 10.0, "delivered", Some("2019-01-01")),
            ],
        );

        build_composite_ranking(&mut db, date("2020-07-01")).unwrap();
        let ranked: Vec<_> = most_valuable_customers(&db)
            .unwrap()
            .into_iter()
            .map(|c| (c.customer_id.unwrap(), c.customer_rating))
            .collect();
        assert_eq!(
            ranked,
            vec![
                ("recent".to_string(), CustomerRating::Rank(1)),
                ("quarter".to_string(), CustomerRating::Rank(2)),
                ("half".to_string(), CustomerRating::Rank(3)),
                ("old".to_string(), CustomerRating::Rank(4)),
            ]
        );
    }

    #[test]
    fn test_recency_bonus_tier_edges_are_inclusive() {
        let mut db = Database::open_in_memory().unwrap();
        // as_of 2020-07-01: 30 days back is 2020-06-01, 90 is 2020-04-02,
        // 180 is 2020-01-03.
        facts(
            &db,
            &[
                ("o1", "a_at_30", 10.0, "delivered", Some("2020-06-01")),
                ("o2", "b_past_30", 10.0, "delivered", Some("2020-05-31")),
                ("o3", "c_at_90", 10.0, "delivered", Some("2020-04-02")),
                ("o4", "d_past_90", 10.0, "delivered", Some("2020-04-01")),
                ("o5", "e_at_180", 10.0, "delivered", Some("2020-01-03")),
                ("o6", "f_past_180", 10.0, "delivered", Some("2020-01-02")),
            ],
        );

        build_composite_ranking(&mut db, date("2020-07-01")).unwrap();
        let ranked: Vec<_> = most_valuable_customers(&db)
            .unwrap()
            .into_iter()
            .map(|c| (c.customer_id.unwrap(), c.customer_rating))
            .collect();
        // Bonuses 20, 10, 10, 5, 5, 0
        assert_eq!(
            ranked,
            vec![
                ("a_at_30".to_string(), CustomerRating::Rank(1)),
                ("b_past_30".to_string(), CustomerRating::Rank(2)),
                ("c_at_90".to_string(), CustomerRating::Rank(2)),
                ("d_past_90".to_string(), CustomerRating::Rank(4)),
                ("e_at_180".to_string(), CustomerRating::Rank(4)),
                ("f_past_180".to_string(), CustomerRating::Rank(6)),
            ]
        );
    }

    #[test]
    fn test_equal_spend_in_cents_ties_despite_binary_rounding() {
        let mut db = Database::open_in_memory().unwrap();
        // 100.1 + 200.2 != 300.3 in f64
        facts(
            &db,
            &[
                ("o1", "a", 100.1, "delivered", Some("2018-05-01")),
                ("o1", "a", 200.2, "delivered", Some("2018-05-01")),
                ("o2", "b", 300.3, "delivered", Some("2018-05-01")),
            ],
        );

        build_composite_ranking(&mut db, date("2020-01-01")).unwrap();
        let customers = most_valuable_customers(&db).unwrap();
        assert_eq!(customers.len(), 2);
        for customer in &customers {
            assert_eq!(customer.total_spent, 300.3);
            assert_eq!(customer.customer_rating, CustomerRating::Rank(1));
        }

        build_rolling_quarters(&mut db).unwrap();
        for quarter in rolling_quarters(&db).unwrap() {
            assert_eq!(quarter.monthly_total, 300.3);
        }
    }

    #[test]
    fn test_orphan_items_read_back_without_customer() {
        let mut db = Database::open_in_memory().unwrap();
        db.execute_batch(&crate::schema::ORDERS.create_table_sql()).unwrap();
        db.execute_batch(&crate::schema::ORDER_ITEMS.create_table_sql()).unwrap();
        db.execute_batch(
            "INSERT INTO orders (order_id, customer_id, order_status, order_delivered_customer_date)
             VALUES ('o1', 'a', 'delivered', '2018-01-05 10:00:00');
             INSERT INTO order_items (order_id, order_item_id, product_id, seller_id, price)
             VALUES ('o1', 1, 'p1', 's1', 10.0), ('ghost', 1, 'p1', 's1', 7.5);",
        )
        .unwrap();
        crate::facts::build_facts(&mut db).unwrap();

        assert_eq!(
            build_rolling_quarters(&mut db).unwrap(),
            Materialization::Created { rows: 2 }
        );
        let quarters = rolling_quarters(&db).unwrap();
        let orphan = quarters.iter().find(|q| q.customer_id.is_none()).unwrap();
        assert_eq!(orphan.month, None);
        assert!((orphan.monthly_total - 7.5).abs() < 1e-9);
        assert!(quarters.iter().any(|q| q.customer_id.as_deref() == Some("a")));

        build_composite_ranking(&mut db, date("2020-01-01")).unwrap();
        let customers = most_valuable_customers(&db).unwrap();
        assert_eq!(customers.len(), 1);
        assert_eq!(customers[0].customer_id.as_deref(), Some("a"));
    }

    #[test]
    fn test_ties_share_rank_and_next_rank_skips() {
        let mut db = Database::open_in_memory().unwrap();
        facts(
            &db,
            &[
                ("o1", "a", 100.0, "delivered", Some("2015-01-01")),
                ("o2", "b", 100.0, "delivered", Some("2015-02-01")),
                ("o3", "c", 50.0, "delivered", Some("2015-03-01")),
            ],
        );

        build_composite_ranking(&mut db, date("2020-01-01")).unwrap();
        let ranks: Vec<_> = most_valuable_customers(&db)
            .unwrap()
            .into_iter()
            .map(|c| c.customer_rating)
            .collect();
        assert_eq!(
            ranks,
            vec![CustomerRating::Rank(1), CustomerRating::Rank(1), CustomerRating::Rank(3)]
        );
    }

    #[test]
    fn test_only_delivered_rows_count() {
        let mut db = Database::open_in_memory().unwrap();
        facts(
            &db,
            &[
                ("o1", "a", 30.0, "delivered", Some("2018-01-05")),
                ("o1", "a", 20.0, "delivered", Some("2018-01-05")),
                ("o2", "a", 500.0, "canceled", None),
                ("o3", "b", 5.0, "processing", None),
            ],
        );

        build_composite_ranking(&mut db, date("2020-01-01")).unwrap();
        let customers = most_valuable_customers(&db).unwrap();
        assert_eq!(customers.len(), 1);
        assert_eq!(customers[0].customer_id.as_deref(), Some("a"));
        assert!((customers[0].total_spent - 50.0).abs() < 1e-9);
        assert_eq!(customers[0].total_orders, 1);
        assert_eq!(customers[0].last_order_date, Some(date("2018-01-05")));
    }

    #[test]
    fn test_existing_table_is_not_refreshed() {
        let mut db = Database::open_in_memory().unwrap();
        facts(&db, &[("o1", "a", 30.0, "delivered", Some("2018-01-05"))]);

        assert_eq!(
            build_composite_ranking(&mut db, date("2020-01-01")).unwrap(),
            Materialization::Created { rows: 1 }
        );
        facts(&db, &[("o2", "b", 30.0, "delivered", Some("2018-01-05"))]);
        assert_eq!(
            build_composite_ranking(&mut db, date("2020-01-01")).unwrap(),
            Materialization::AlreadyPresent
        );
        assert_eq!(db.row_count("most_valuable_customers").unwrap(), 1);
    }

    #[test]
    fn test_rolling_window_uses_partial_frames() {
        let mut db = Database::open_in_memory().unwrap();
        facts(
            &db,
            &[
                ("o1", "a", 10.0, "delivered", Some("2018-01-05")),
                ("o1", "a", 20.0, "delivered", Some("2018-01-20")),
                ("o2", "a", 60.0, "delivered", Some("2018-02-10")),
                ("o3", "a", 90.0, "delivered", Some("2018-03-01")),
                ("o4", "a", 120.0, "delivered", Some("2018-04-30")),
            ],
        );

        build_rolling_quarters(&mut db).unwrap();
        let quarters = rolling_quarters(&db).unwrap();
        let averages: Vec<_> = quarters.iter().map(|q| q.rolling_quartal_avg).collect();
        let expected = [30.0, 45.0, 60.0, 90.0];
        assert_eq!(averages.len(), expected.len());
        for (got, want) in averages.iter().zip(expected) {
            assert!((got - want).abs() < 1e-9, "got {got}, want {want}");
        }
        assert_eq!(quarters[0].month, Some(date("2018-01-01")));
        assert!((quarters[0].monthly_total - 30.0).abs() < 1e-9);
    }
}
