use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use tracing::info;

use olist_etl::config::AppConfig;
use olist_etl::logging::init_logging;
use olist_etl::Pipeline;

#[derive(Debug, Clone, Copy, ValueEnum)]
enum RatingModelArg {
    /// Weighted spend/orders with a recency bonus, ranked
    Composite,
    /// Recency/frequency/monetary quintile score on a 0-10 scale
    Rfm,
}

/// Load the Olist CSV extracts and build customer analytics
#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Extra configuration file, layered over the defaults
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Database file to create or extend
    #[arg(long)]
    database: Option<String>,

    /// Directory holding the source CSV files
    #[arg(long)]
    dataset_dir: Option<String>,

    /// Model used for most_valuable_customers
    #[arg(long, value_enum)]
    rating_model: Option<RatingModelArg>,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Load configuration
    let mut config = AppConfig::load_from(cli.config.as_deref()).context("Failed to load configuration")?;
    apply_overrides(&mut config, &cli);

    // Initialize logging
    let _guard = init_logging(
        Some(&config.get_log_level()),
        config.logging.file_path.as_deref().map(Path::new),
        &config.logging.format,
    )?;

    info!("Starting olist-etl");

    let pipeline = Pipeline::new(&config).context("Invalid pipeline configuration")?;
    let report = pipeline.run().context("Pipeline failed")?;

    info!(
        report = %serde_json::to_string(&report)?,
        "Pipeline complete"
    );
    Ok(())
}

fn apply_overrides(config: &mut AppConfig, cli: &Cli) {
    if let Some(database) = &cli.database {
        config.database.path.clone_from(database);
    }
    if let Some(dataset_dir) = &cli.dataset_dir {
        config.dataset.directory.clone_from(dataset_dir);
    }
    if let Some(model) = cli.rating_model {
        config.analytics.rating_model = match model {
            RatingModelArg::Composite => "composite",
            RatingModelArg::Rfm => "rfm",
        }
        .to_string();
    }
}
