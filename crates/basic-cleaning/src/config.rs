//! Configuration for a cleaning run.
//!
//! The six values supplied on the command line are required; the column
//! names, the local output file and the job type have defaults matching the
//! listings dataset this job was written for.

use crate::store::is_valid_artifact_name;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Default name of the numeric column the price cutoff applies to.
pub const DEFAULT_PRICE_COLUMN: &str = "price";

/// Default name of the date column that is coerced to date-time.
pub const DEFAULT_DATE_COLUMN: &str = "last_review";

/// Default local file the cleaned table is written to before publishing.
pub const DEFAULT_OUTPUT_FILE: &str = "clean_sample.csv";

/// Job type recorded on every run.
pub const DEFAULT_JOB_TYPE: &str = "basic_cleaning";

/// Configuration for one cleaning run.
///
/// Use [`CleaningConfig::builder()`] to create a validated configuration.
///
/// # Example
///
/// ```rust,ignore
/// use basic_cleaning::CleaningConfig;
///
/// let config = CleaningConfig::builder()
///     .input_artifact("sample.csv:latest")
///     .output_artifact("clean_sample.csv")
///     .output_type("clean_sample")
///     .output_description("Data with outliers and null values removed")
///     .price_range(10.0, 350.0)
///     .build()?;
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CleaningConfig {
    /// Reference of the raw dataset, e.g. `sample.csv:latest`.
    pub input_artifact: String,

    /// Name the cleaned dataset is published under.
    pub output_artifact: String,

    /// Type label of the published artifact.
    pub output_type: String,

    /// Free-text description of the published artifact.
    pub output_description: String,

    /// Inclusive lower price bound.
    pub min_price: f64,

    /// Inclusive upper price bound.
    pub max_price: f64,

    /// Column the price cutoff applies to.
    /// Default: "price"
    pub price_column: String,

    /// Column coerced to date-time.
    /// Default: "last_review"
    pub date_column: String,

    /// Local path the cleaned table is written to.
    /// Default: "clean_sample.csv"
    pub output_file: PathBuf,

    /// Job type recorded on the run.
    /// Default: "basic_cleaning"
    pub job_type: String,
}

impl CleaningConfig {
    /// Create a new configuration builder.
    pub fn builder() -> CleaningConfigBuilder {
        CleaningConfigBuilder::default()
    }

    /// Validate the configuration and return errors if invalid.
    pub fn validate(&self) -> Result<(), ConfigValidationError> {
        let required = [
            ("input_artifact", &self.input_artifact),
            ("output_artifact", &self.output_artifact),
            ("output_type", &self.output_type),
            ("price_column", &self.price_column),
            ("date_column", &self.date_column),
        ];
        for (field, value) in required {
            if value.trim().is_empty() {
                return Err(ConfigValidationError::MissingField(field.to_string()));
            }
        }

        if !is_valid_artifact_name(&self.output_artifact) {
            return Err(ConfigValidationError::InvalidArtifactName(
                self.output_artifact.clone(),
            ));
        }

        if !self.min_price.is_finite() {
            return Err(ConfigValidationError::NonFiniteBound {
                field: "min_price".to_string(),
                value: self.min_price,
            });
        }
        if !self.max_price.is_finite() {
            return Err(ConfigValidationError::NonFiniteBound {
                field: "max_price".to_string(),
                value: self.max_price,
            });
        }
        if self.min_price > self.max_price {
            return Err(ConfigValidationError::InvertedPriceRange {
                min: self.min_price,
                max: self.max_price,
            });
        }

        if self.output_file.as_os_str().is_empty() {
            return Err(ConfigValidationError::MissingField("output_file".to_string()));
        }

        Ok(())
    }
}

/// Errors that can occur during configuration validation.
#[derive(Debug, thiserror::Error)]
pub enum ConfigValidationError {
    #[error("Missing required value for '{0}'")]
    MissingField(String),

    #[error("Invalid artifact name '{0}' (allowed: letters, digits, '.', '_', '-')")]
    InvalidArtifactName(String),

    #[error("Invalid bound for '{field}': {value} (must be a finite number)")]
    NonFiniteBound { field: String, value: f64 },

    #[error("Invalid price range: min_price {min} is greater than max_price {max}")]
    InvertedPriceRange { min: f64, max: f64 },
}

/// Builder for [`CleaningConfig`] with fluent API.
#[derive(Debug, Default)]
pub struct CleaningConfigBuilder {
    input_artifact: Option<String>,
    output_artifact: Option<String>,
    output_type: Option<String>,
    output_description: Option<String>,
    min_price: Option<f64>,
    max_price: Option<f64>,
    price_column: Option<String>,
    date_column: Option<String>,
    output_file: Option<PathBuf>,
    job_type: Option<String>,
}

impl CleaningConfigBuilder {
    /// Set the reference of the raw dataset.
    pub fn input_artifact(mut self, reference: impl Into<String>) -> Self {
        self.input_artifact = Some(reference.into());
        self
    }

    /// Set the name of the published artifact.
    pub fn output_artifact(mut self, name: impl Into<String>) -> Self {
        self.output_artifact = Some(name.into());
        self
    }

    /// Set the type label of the published artifact.
    pub fn output_type(mut self, artifact_type: impl Into<String>) -> Self {
        self.output_type = Some(artifact_type.into());
        self
    }

    /// Set the description of the published artifact.
    pub fn output_description(mut self, description: impl Into<String>) -> Self {
        self.output_description = Some(description.into());
        self
    }

    pub fn min_price(mut self, min: f64) -> Self {
        self.min_price = Some(min);
        self
    }

    pub fn max_price(mut self, max: f64) -> Self {
        self.max_price = Some(max);
        self
    }

    /// Set both price bounds at once. Both bounds are inclusive.
    pub fn price_range(self, min: f64, max: f64) -> Self {
        self.min_price(min).max_price(max)
    }

    /// Override the column the price cutoff applies to.
    pub fn price_column(mut self, column: impl Into<String>) -> Self {
        self.price_column = Some(column.into());
        self
    }

    /// Override the column coerced to date-time.
    pub fn date_column(mut self, column: impl Into<String>) -> Self {
        self.date_column = Some(column.into());
        self
    }

    /// Set the local path the cleaned table is written to.
    pub fn output_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.output_file = Some(path.into());
        self
    }

    pub fn job_type(mut self, job_type: impl Into<String>) -> Self {
        self.job_type = Some(job_type.into());
        self
    }

    /// Build the configuration.
    ///
    /// Price bounds have no default: a missing bound is reported as
    /// [`ConfigValidationError::MissingField`].
    pub fn build(self) -> Result<CleaningConfig, ConfigValidationError> {
        let min_price = self
            .min_price
            .ok_or_else(|| ConfigValidationError::MissingField("min_price".to_string()))?;
        let max_price = self
            .max_price
            .ok_or_else(|| ConfigValidationError::MissingField("max_price".to_string()))?;

        let config = CleaningConfig {
            input_artifact: self.input_artifact.unwrap_or_default(),
            output_artifact: self.output_artifact.unwrap_or_default(),
            output_type: self.output_type.unwrap_or_default(),
            output_description: self.output_description.unwrap_or_default(),
            min_price,
            max_price,
            price_column: self
                .price_column
                .unwrap_or_else(|| DEFAULT_PRICE_COLUMN.to_string()),
            date_column: self
                .date_column
                .unwrap_or_else(|| DEFAULT_DATE_COLUMN.to_string()),
            output_file: self
                .output_file
                .unwrap_or_else(|| PathBuf::from(DEFAULT_OUTPUT_FILE)),
            job_type: self.job_type.unwrap_or_else(|| DEFAULT_JOB_TYPE.to_string()),
        };

        config.validate()?;
        Ok(config)
    }
}
