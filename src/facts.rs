//! Denormalized order-item fact table
//!
//! `facts_order_items` is append-only: filling it twice doubles every row.
//! The pipeline fills it exactly once per populated database.

use tracing::{info, warn};

use crate::db::Database;
use crate::error::Result;
use crate::schema::{FACTS_ORDER_ITEMS, ORDERS, ORDER_ITEMS};

/// Create `facts_order_items` if it does not exist
pub fn create_fact_table(db: &Database) -> Result<()> {
    db.execute_batch(&FACTS_ORDER_ITEMS.create_table_sql())
}

/// Append one fact row per order item, returning the number of rows added
///
/// Items whose order is missing keep NULL customer, status and delivery date.
pub fn fill_fact_table(db: &mut Database) -> Result<usize> {
    ORDER_ITEMS.require_columns(&["order_id", "order_item_id", "product_id", "seller_id", "price"])?;
    ORDERS.require_columns(&["order_id", "customer_id", "order_status", "order_delivered_customer_date"])?;

    let existing = db.row_count(FACTS_ORDER_ITEMS.name)?;
    if existing > 0 {
        warn!(
            table = FACTS_ORDER_ITEMS.name,
            existing, "Appending to a populated fact table; rows will be duplicated"
        );
    }

    let sql = format!(
        "INSERT INTO {facts} (
            order_id, order_item_id, product_id, seller_id,
            customer_id, price, order_status, order_delivered_customer_date
        )
        SELECT
            ordi.order_id,
            ordi.order_item_id,
            ordi.product_id,
            ordi.seller_id,
            ord.customer_id,
            ordi.price,
            ord.order_status,
            date(ord.order_delivered_customer_date)
        FROM {items} AS ordi
        LEFT JOIN {orders} AS ord
            ON ord.order_id = ordi.order_id",
        facts = FACTS_ORDER_ITEMS.name,
        items = ORDER_ITEMS.name,
        orders = ORDERS.name,
    );

    let tx = db.transaction()?;
    let inserted = tx.execute(&sql, [])?;
    tx.commit()?;

    info!(table = FACTS_ORDER_ITEMS.name, inserted, "Fact table filled");
    Ok(inserted)
}

/// Create and fill the fact table
pub fn build_facts(db: &mut Database) -> Result<usize> {
    create_fact_table(db)?;
    fill_fact_table(db)
}
