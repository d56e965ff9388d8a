//! End-to-end run: load base tables, build facts, materialize analytics.

use std::path::PathBuf;

use chrono::{Local, NaiveDate};
use tracing::info;

use crate::analytics;
use crate::config::AppConfig;
use crate::db::Database;
use crate::error::Result;
use crate::facts;
use crate::loader::{TableLoader, TracingLoadObserver};
use crate::logging::OperationTimer;
use crate::models::{PipelineReport, RatingModel};
use crate::schema::SchemaRegistry;

/// Runs every stage in order over one connection
pub struct Pipeline {
    registry: SchemaRegistry,
    database_path: PathBuf,
    dataset_dir: PathBuf,
    rating_model: RatingModel,
    preview_rows: usize,
}

impl Pipeline {
    /// Validate the configuration and the schema registry
    pub fn new(config: &AppConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            registry: SchemaRegistry::load()?,
            database_path: config.database_path(),
            dataset_dir: config.dataset_dir(),
            rating_model: config.rating_model()?,
            preview_rows: config.loader.preview_rows as usize,
        })
    }

    /// Open the configured database, run every stage and close it
    pub fn run(&self) -> Result<PipelineReport> {
        let mut db = Database::open(&self.database_path)?;
        let report = self.run_on(&mut db)?;
        db.close()?;
        Ok(report)
    }

    /// Run every stage against an already open database
    pub fn run_on(&self, db: &mut Database) -> Result<PipelineReport> {
        info!(
            database = %self.database_path.display(),
            dataset = %self.dataset_dir.display(),
            rating_model = self.rating_model.name(),
            "Starting pipeline"
        );

        let timer = OperationTimer::new("load");
        let loads = TableLoader::new(db)
            .with_observer(Box::new(TracingLoadObserver::new(self.preview_rows)))
            .load_all(&self.registry, &self.dataset_dir)?;
        timer.finish();

        let timer = OperationTimer::new("facts");
        let facts_inserted = facts::build_facts(db)?;
        timer.finish();

        let timer = OperationTimer::new("analytics");
        let today = current_date();
        let most_valuable_customers = analytics::build_most_valuable_customers(db, self.rating_model, today)?;
        let rolling_quarters = analytics::build_rolling_quarters(db)?;
        timer.finish();

        Ok(PipelineReport {
            loads,
            facts_inserted,
            rating_model: self.rating_model.name().to_string(),
            most_valuable_customers,
            rolling_quarters,
        })
    }
}

/// Today's date in the local time zone; recency tiers count calendar days
fn current_date() -> NaiveDate {
    Local::now().date_naive()
}
