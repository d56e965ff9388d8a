//! Database schema definitions
//!
//! Every table the pipeline touches is described once here, as a static
//! [`TableSchema`]. The loader renders its DDL and insert statements from these
//! definitions, and the fact and analytics builders check the columns they
//! reference against them before running any SQL.

use std::collections::HashSet;
use std::fmt::Write as _;

use crate::error::{EtlError, Result};
use crate::validation::InputValidator;

/// A single column with its declared SQL type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Column {
    /// Column name
    pub name: &'static str,
    /// Declared SQL type, rendered verbatim into DDL
    pub sql_type: &'static str,
}

impl Column {
    /// Create a column definition.
    #[must_use]
    pub const fn new(name: &'static str, sql_type: &'static str) -> Self {
        Self { name, sql_type }
    }
}

/// Table-level uniqueness constraint on one or more columns.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Constraint {
    /// `PRIMARY KEY (...)`
    PrimaryKey(&'static [&'static str]),
    /// `UNIQUE (...)`
    Unique(&'static [&'static str]),
}

impl Constraint {
    /// Columns covered by the constraint.
    #[must_use]
    pub const fn columns(&self) -> &'static [&'static str] {
        match self {
            Self::PrimaryKey(columns) | Self::Unique(columns) => columns,
        }
    }

    fn keyword(&self) -> &'static str {
        match self {
            Self::PrimaryKey(_) => "PRIMARY KEY",
            Self::Unique(_) => "UNIQUE",
        }
    }
}

/// Static description of one table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TableSchema {
    /// Table name
    pub name: &'static str,
    /// CSV file under the dataset directory, for tables loaded from disk
    pub source_file: Option<&'static str>,
    /// Columns in load order
    pub columns: &'static [Column],
    /// Natural-key constraints
    pub constraints: &'static [Constraint],
}

impl TableSchema {
    /// Column names in declaration order.
    pub fn column_names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.columns.iter().map(|column| column.name)
    }

    /// True if the table declares a column with this name.
    #[must_use]
    pub fn has_column(&self, name: &str) -> bool {
        self.columns.iter().any(|column| column.name == name)
    }

    /// Fail with [`EtlError::UnknownColumn`] unless every name is a declared column.
    pub fn require_columns(&self, names: &[&str]) -> Result<()> {
        match names.iter().find(|name| !self.has_column(name)) {
            Some(missing) => Err(EtlError::UnknownColumn {
                table: self.name.to_string(),
                column: (*missing).to_string(),
            }),
            None => Ok(()),
        }
    }

    /// `CREATE TABLE IF NOT EXISTS` statement for this table.
    #[must_use]
    pub fn create_table_sql(&self) -> String {
        let mut lines: Vec<String> = self
            .columns
            .iter()
            .map(|column| format!("    {} {}", column.name, column.sql_type))
            .collect();
        for constraint in self.constraints {
            lines.push(format!(
                "    {} ({})",
                constraint.keyword(),
                constraint.columns().join(", ")
            ));
        }
        format!(
            "CREATE TABLE IF NOT EXISTS {} (\n{}\n)",
            self.name,
            lines.join(",\n")
        )
    }

    /// Parameterized insert that drops rows violating a uniqueness constraint.
    #[must_use]
    pub fn insert_or_ignore_sql(&self) -> String {
        let mut placeholders = String::new();
        for i in 1..=self.columns.len() {
            if i > 1 {
                placeholders.push_str(", ");
            }
            let _ = write!(placeholders, "?{i}");
        }
        format!(
            "INSERT INTO {} ({}) VALUES ({}) ON CONFLICT DO NOTHING",
            self.name,
            self.column_names().collect::<Vec<_>>().join(", "),
            placeholders
        )
    }

    fn validate(&self) -> Result<()> {
        InputValidator::validate_identifier(self.name)?;
        if self.columns.is_empty() {
            return Err(EtlError::InvalidSchema(format!(
                "table {} declares no columns",
                self.name
            )));
        }

        let mut seen = HashSet::new();
        for column in self.columns {
            InputValidator::validate_identifier(column.name)?;
            if !seen.insert(column.name) {
                return Err(EtlError::InvalidSchema(format!(
                    "duplicate column {} on table {}",
                    column.name, self.name
                )));
            }
        }

        for constraint in self.constraints {
            if constraint.columns().is_empty() {
                return Err(EtlError::InvalidSchema(format!(
                    "empty constraint on table {}",
                    self.name
                )));
            }
            self.require_columns(constraint.columns())?;
        }

        Ok(())
    }
}

// =============================================================================
// Base tables, loaded from the dataset directory
// =============================================================================

/// Customers; one row per order-level customer id.
pub static CUSTOMERS: TableSchema = TableSchema {
    name: "customers",
    source_file: Some("olist_customers_dataset.csv"),
    columns: &[
        Column::new("customer_id", "VARCHAR(100)"),
        Column::new("customer_unique_id", "VARCHAR(100)"),
        Column::new("customer_zip_code_prefix", "VARCHAR(10)"),
        Column::new("customer_city", "VARCHAR(100)"),
        Column::new("customer_state", "VARCHAR(5)"),
    ],
    constraints: &[Constraint::Unique(&["customer_unique_id"])],
};

/// Zip code prefix coordinates.
pub static GEOLOCATION: TableSchema = TableSchema {
    name: "geolocation",
    source_file: Some("olist_geolocation_dataset.csv"),
    columns: &[
        Column::new("geolocation_zip_code_prefix", "VARCHAR"),
        Column::new("geolocation_lat", "FLOAT"),
        Column::new("geolocation_lng", "FLOAT"),
        Column::new("geolocation_city", "VARCHAR"),
        Column::new("geolocation_state", "VARCHAR(5)"),
    ],
    constraints: &[Constraint::Unique(&["geolocation_lat", "geolocation_lng"])],
};

/// Order line items.
pub static ORDER_ITEMS: TableSchema = TableSchema {
    name: "order_items",
    source_file: Some("olist_order_items_dataset.csv"),
    columns: &[
        Column::new("order_id", "VARCHAR(100)"),
        Column::new("order_item_id", "INT"),
        Column::new("product_id", "VARCHAR(100)"),
        Column::new("seller_id", "VARCHAR(100)"),
        Column::new("shipping_limit_date", "TIMESTAMP"),
        Column::new("price", "FLOAT"),
        Column::new("freight_value", "FLOAT"),
    ],
    constraints: &[Constraint::Unique(&["order_id", "order_item_id"])],
};

/// Order payments. Only the first payment row per order is kept.
pub static ORDER_PAYMENTS: TableSchema = TableSchema {
    name: "order_payments",
    source_file: Some("olist_order_payments_dataset.csv"),
    columns: &[
        Column::new("order_id", "VARCHAR(100)"),
        Column::new("payment_sequential", "INT"),
        Column::new("payment_type", "VARCHAR(50)"),
        Column::new("payment_installments", "INT"),
        Column::new("payment_value", "FLOAT"),
    ],
    constraints: &[Constraint::Unique(&["order_id"])],
};

/// Customer reviews.
pub static ORDER_REVIEWS: TableSchema = TableSchema {
    name: "order_reviews",
    source_file: Some("olist_order_reviews_dataset.csv"),
    columns: &[
        Column::new("review_id", "VARCHAR(100)"),
        Column::new("order_id", "VARCHAR(100)"),
        Column::new("review_score", "INT"),
        Column::new("review_comment_title", "VARCHAR(255)"),
        Column::new("review_comment_message", "VARCHAR(5000)"),
        Column::new("review_creation_date", "TIMESTAMP"),
        Column::new("review_answer_timestamp", "TIMESTAMP"),
    ],
    constraints: &[Constraint::PrimaryKey(&["review_id"])],
};

/// Orders with their lifecycle timestamps.
pub static ORDERS: TableSchema = TableSchema {
    name: "orders",
    source_file: Some("olist_orders_dataset.csv"),
    columns: &[
        Column::new("order_id", "VARCHAR(100)"),
        Column::new("customer_id", "VARCHAR(100)"),
        Column::new("order_status", "VARCHAR(50)"),
        Column::new("order_purchase_timestamp", "TIMESTAMP"),
        Column::new("order_approved_at", "TIMESTAMP"),
        Column::new("order_delivered_carrier_date", "TIMESTAMP"),
        Column::new("order_delivered_customer_date", "TIMESTAMP"),
        Column::new("order_estimated_delivery_date", "TIMESTAMP"),
    ],
    constraints: &[Constraint::PrimaryKey(&["order_id"])],
};

/// Product catalogue. Column spelling follows the source extract.
pub static PRODUCTS: TableSchema = TableSchema {
    name: "products",
    source_file: Some("olist_products_dataset.csv"),
    columns: &[
        Column::new("product_id", "VARCHAR(100)"),
        Column::new("product_category_name", "VARCHAR(100)"),
        Column::new("product_name_lenght", "INT"),
        Column::new("product_description_lenght", "INT"),
        Column::new("product_photos_qty", "INT"),
        Column::new("product_weight_g", "FLOAT"),
        Column::new("product_length_cm", "FLOAT"),
        Column::new("product_height_cm", "FLOAT"),
        Column::new("product_width_cm", "FLOAT"),
    ],
    constraints: &[Constraint::PrimaryKey(&["product_id"])],
};

/// Sellers.
pub static SELLERS: TableSchema = TableSchema {
    name: "sellers",
    source_file: Some("olist_sellers_dataset.csv"),
    columns: &[
        Column::new("seller_id", "VARCHAR(100)"),
        Column::new("seller_zip_code_prefix", "VARCHAR(10)"),
        Column::new("seller_city", "VARCHAR(100)"),
        Column::new("seller_state", "VARCHAR(5)"),
    ],
    constraints: &[Constraint::PrimaryKey(&["seller_id"])],
};

/// Portuguese to English category names.
pub static PRODUCT_CATEGORY_NAME_TRANSLATION: TableSchema = TableSchema {
    name: "product_category_name_translation",
    source_file: Some("product_category_name_translation.csv"),
    columns: &[
        Column::new("product_category_name", "VARCHAR(100)"),
        Column::new("product_category_name_english", "VARCHAR(100)"),
    ],
    constraints: &[Constraint::Unique(&["product_category_name"])],
};

// =============================================================================
// Derived tables
// =============================================================================

/// One row per order item, denormalized with its order's customer and status.
pub static FACTS_ORDER_ITEMS: TableSchema = TableSchema {
    name: "facts_order_items",
    source_file: None,
    columns: &[
        Column::new("order_id", "VARCHAR(36)"),
        Column::new("order_item_id", "INT"),
        Column::new("product_id", "VARCHAR(36)"),
        Column::new("seller_id", "VARCHAR(36)"),
        Column::new("customer_id", "VARCHAR(36)"),
        Column::new("price", "DECIMAL(10, 2)"),
        Column::new("order_status", "VARCHAR(20)"),
        Column::new("order_delivered_customer_date", "DATE"),
    ],
    constraints: &[],
};

/// Customer ranking by composite score; `customer_rating` is a competition rank.
pub static MOST_VALUABLE_CUSTOMERS: TableSchema = TableSchema {
    name: "most_valuable_customers",
    source_file: None,
    columns: &[
        Column::new("customer_id", "VARCHAR(36)"),
        Column::new("total_spent", "DOUBLE"),
        Column::new("total_orders", "BIGINT"),
        Column::new("last_order_date", "DATE"),
        Column::new("customer_rating", "BIGINT"),
    ],
    constraints: &[],
};

/// Same table name, RFM variant; `customer_rating` is a 0-10 score.
pub static MOST_VALUABLE_CUSTOMERS_RFM: TableSchema = TableSchema {
    name: "most_valuable_customers",
    source_file: None,
    columns: &[
        Column::new("customer_id", "VARCHAR(36)"),
        Column::new("total_spent", "DOUBLE"),
        Column::new("total_orders", "BIGINT"),
        Column::new("last_order_date", "DATE"),
        Column::new("customer_rating", "DOUBLE"),
    ],
    constraints: &[],
};

/// Monthly spend per customer with a trailing three-month average.
pub static ROLLING_QUARTERS: TableSchema = TableSchema {
    name: "rolling_quarters",
    source_file: None,
    columns: &[
        Column::new("customer_id", "VARCHAR(36)"),
        Column::new("month", "DATE"),
        Column::new("monthly_total", "DOUBLE"),
        Column::new("rolling_quartal_avg", "DOUBLE"),
    ],
    constraints: &[],
};

/// Lookup over every table the pipeline knows about.
#[derive(Debug, Clone)]
pub struct SchemaRegistry {
    base_tables: Vec<&'static TableSchema>,
    derived_tables: Vec<&'static TableSchema>,
}

impl Default for SchemaRegistry {
    fn default() -> Self {
        Self {
            base_tables: vec![
                &CUSTOMERS,
                &GEOLOCATION,
                &ORDER_ITEMS,
                &ORDER_PAYMENTS,
                &ORDER_REVIEWS,
                &ORDERS,
                &PRODUCTS,
                &SELLERS,
                &PRODUCT_CATEGORY_NAME_TRANSLATION,
            ],
            derived_tables: vec![
                &FACTS_ORDER_ITEMS,
                &MOST_VALUABLE_CUSTOMERS,
                &MOST_VALUABLE_CUSTOMERS_RFM,
                &ROLLING_QUARTERS,
            ],
        }
    }
}

impl SchemaRegistry {
    /// Build the registry and validate every definition.
    pub fn load() -> Result<Self> {
        let registry = Self::default();
        registry.validate()?;
        Ok(registry)
    }

    /// Tables loaded from CSV, in load order.
    #[must_use]
    pub fn base_tables(&self) -> &[&'static TableSchema] {
        &self.base_tables
    }

    /// Look up a base table by name.
    pub fn base_table(&self, name: &str) -> Result<&'static TableSchema> {
        self.base_tables
            .iter()
            .find(|table| table.name == name)
            .copied()
            .ok_or_else(|| EtlError::UnknownTable(name.to_string()))
    }

    /// Check identifier syntax, column uniqueness, constraint coverage and
    /// that every base table names a source file.
    pub fn validate(&self) -> Result<()> {
        let mut base_names = HashSet::new();
        for table in &self.base_tables {
            table.validate()?;
            if table.source_file.is_none() {
                return Err(EtlError::InvalidSchema(format!(
                    "base table {} has no source file",
                    table.name
                )));
            }
            if !base_names.insert(table.name) {
                return Err(EtlError::InvalidSchema(format!(
                    "table {} registered twice",
                    table.name
                )));
            }
        }
        for table in &self.derived_tables {
            table.validate()?;
        }
        Ok(())
    }
}
