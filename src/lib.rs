//! Olist ETL - CSV ingestion and customer analytics
//!
//! Loads the Olist e-commerce CSV extracts into SQLite, builds a denormalized
//! order-item fact table and derives two analytic tables from it.
//!
//! # Features
//!
//! - Idempotent, insert-or-ignore loading with per-table load reports
//! - Append-only fact table joining order items to their orders
//! - Customer ranking by composite score or RFM rating
//! - Trailing three-month average of monthly customer spend

/// Analytic table builders and readers
pub mod analytics;
/// Configuration management
pub mod config;
/// Database connection ownership and helpers
pub mod db;
/// Error types
pub mod error;
/// Fact table construction
pub mod facts;
/// CSV loading into base tables
pub mod loader;
/// Logging setup and utilities
pub mod logging;
/// Metrics collection
pub mod metrics;
/// Data models and structures
pub mod models;
/// Pipeline orchestration
pub mod pipeline;
/// RFM scoring
pub mod rfm;
/// Database schema definitions
pub mod schema;
/// Input validation and sanitization
pub mod validation;

// Re-export key components for easier access
pub use db::Database;
pub use error::{EtlError, Result};
pub use models::{LoadReport, Materialization, PipelineReport, RatingModel};
pub use pipeline::Pipeline;
