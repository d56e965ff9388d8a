use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use config::{Config, Environment, File, Value};

use crate::error::{EtlError, Result};
use crate::models::RatingModel;
use crate::validation::InputValidator;

/// Application configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub database: DatabaseConfig,
    pub dataset: DatasetConfig,
    pub logging: LoggingConfig,
    pub loader: LoaderConfig,
    pub analytics: AnalyticsConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// SQLite database file, created if missing
    pub path: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatasetConfig {
    /// Directory holding the source CSV files
    pub directory: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    pub level: String,
    pub file_path: Option<String>,
    pub format: String, // "json" or "text"
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoaderConfig {
    /// Rows of each loaded table to log at debug level; 0 disables the preview
    pub preview_rows: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalyticsConfig {
    /// "composite" or "rfm"
    pub rating_model: String,
    /// Fixed analysis date used by the RFM model (YYYY-MM-DD)
    pub rfm_analysis_date: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            database: DatabaseConfig {
                path: "olist.db".to_string(),
            },
            dataset: DatasetConfig {
                directory: "dataset".to_string(),
            },
            logging: LoggingConfig {
                level: "info".to_string(),
                file_path: None,
                format: "text".to_string(),
            },
            loader: LoaderConfig { preview_rows: 0 },
            analytics: AnalyticsConfig {
                rating_model: "composite".to_string(),
                rfm_analysis_date: "2018-10-17".to_string(),
            },
        }
    }
}

impl AppConfig {
    /// Load configuration from multiple sources with precedence
    pub fn load() -> Result<Self> {
        Self::load_from(None)
    }

    /// Load configuration, layering an explicit file over the default sources
    pub fn load_from(explicit_file: Option<&Path>) -> Result<Self> {
        let mut builder = Config::builder();
        // Start with default values
        for (key, value) in Self::default().flatten() {
            builder = builder.set_default(key, value)?;
        }

        builder = builder
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name("config/local").required(false))
            .add_source(File::with_name("olist-etl").required(false));

        if let Some(path) = explicit_file {
            builder = builder.add_source(File::from(path).required(true));
        }

        let app_config: Self = builder
            // OLIST_ETL__DATABASE__PATH=...
            .add_source(Environment::with_prefix("OLIST_ETL").separator("__"))
            .build()?
            .try_deserialize()?;

        app_config.validate()?;

        Ok(app_config)
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<()> {
        InputValidator::validate_path_setting("database.path", &self.database.path)?;
        InputValidator::validate_path_setting("dataset.directory", &self.dataset.directory)?;

        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.logging.level.as_str()) {
            return Err(EtlError::InvalidConfig(format!(
                "Invalid log level: {}. Must be one of: {:?}",
                self.logging.level, valid_levels
            )));
        }

        let valid_formats = ["text", "json"];
        if !valid_formats.contains(&self.logging.format.as_str()) {
            return Err(EtlError::InvalidConfig(format!(
                "Invalid log format: {}. Must be one of: {:?}",
                self.logging.format, valid_formats
            )));
        }

        if let Some(file_path) = &self.logging.file_path {
            InputValidator::validate_path_setting("logging.file_path", file_path)?;
        }

        self.rating_model()?;

        Ok(())
    }

    /// Rating model selected for `most_valuable_customers`
    pub fn rating_model(&self) -> Result<RatingModel> {
        match self.analytics.rating_model.as_str() {
            "composite" => Ok(RatingModel::Composite),
            "rfm" => Ok(RatingModel::Rfm {
                analysis_date: InputValidator::parse_date(&self.analytics.rfm_analysis_date)?,
            }),
            other => Err(EtlError::InvalidConfig(format!(
                "Invalid rating model: {other}. Must be one of: [\"composite\", \"rfm\"]"
            ))),
        }
    }

    #[must_use]
    pub fn database_path(&self) -> PathBuf {
        PathBuf::from(&self.database.path)
    }

    #[must_use]
    pub fn dataset_dir(&self) -> PathBuf {
        PathBuf::from(&self.dataset.directory)
    }

    /// Get log level from environment or config
    #[must_use]
    pub fn get_log_level(&self) -> String {
        std::env::var("RUST_LOG").unwrap_or_else(|_| self.logging.level.clone())
    }

    /// Flatten the configuration into dotted key-value pairs
    fn flatten(self) -> Vec<(&'static str, Value)> {
        let mut pairs = vec![
            ("database.path", Value::from(self.database.path)),
            ("dataset.directory", Value::from(self.dataset.directory)),
            ("logging.level", Value::from(self.logging.level)),
            ("logging.format", Value::from(self.logging.format)),
            ("loader.preview_rows", Value::from(self.loader.preview_rows)),
            ("analytics.rating_model", Value::from(self.analytics.rating_model)),
            (
                "analytics.rfm_analysis_date",
                Value::from(self.analytics.rfm_analysis_date),
            ),
        ];
        if let Some(file_path) = self.logging.file_path {
            pairs.push(("logging.file_path", Value::from(file_path)));
        }
        pairs
    }
}
