//! Error types for the cleaning pipeline.
//!
//! Every failure is fatal for the run: the pipeline stops at the failing
//! stage and nothing is published. The variants map onto the stages that
//! can fail (resolving the input, checking the schema, local I/O, and
//! publishing the output).

use crate::config::ConfigValidationError;
use thiserror::Error;

/// The main error type for the cleaning pipeline.
#[derive(Error, Debug)]
pub enum CleaningError {
    /// The input artifact reference could not be resolved by the store.
    #[error("Failed to resolve artifact '{reference}': {reason}")]
    Resolution { reference: String, reason: String },

    /// A column the transform depends on is absent from the loaded table.
    #[error("Column '{0}' not found in dataset")]
    MissingColumn(String),

    /// The store rejected the new artifact version.
    #[error("Failed to publish artifact '{name}': {reason}")]
    Publish { name: String, reason: String },

    /// An artifact was logged against a run that is no longer active.
    #[error("Run '{0}' is not active")]
    RunNotActive(String),

    /// Invalid configuration provided.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(#[from] ConfigValidationError),

    /// IO error wrapper.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Polars error wrapper.
    #[error("Polars error: {0}")]
    Polars(#[from] polars::error::PolarsError),

    /// JSON serialization/deserialization error (manifests and run records).
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Generic error with context.
    #[error("{context}: {source}")]
    WithContext {
        context: String,
        #[source]
        source: Box<CleaningError>,
    },
}

impl CleaningError {
    /// Build a resolution error for `reference`.
    pub fn resolution(reference: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Resolution {
            reference: reference.into(),
            reason: reason.into(),
        }
    }

    /// Build a publish error for the artifact `name`.
    pub fn publish(name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Publish {
            name: name.into(),
            reason: reason.into(),
        }
    }

    /// Add context to an error.
    pub fn with_context(self, context: impl Into<String>) -> Self {
        CleaningError::WithContext {
            context: context.into(),
            source: Box::new(self),
        }
    }

    /// Stable error code, recorded in the run record of a failed run.
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::Resolution { .. } => "RESOLUTION_ERROR",
            Self::MissingColumn(_) => "SCHEMA_ERROR",
            Self::Publish { .. } => "PUBLISH_ERROR",
            Self::RunNotActive(_) => "RUN_NOT_ACTIVE",
            Self::InvalidConfig(_) => "INVALID_CONFIG",
            Self::Io(_) => "IO_ERROR",
            Self::Polars(_) => "POLARS_ERROR",
            Self::Json(_) => "JSON_ERROR",
            Self::WithContext { source, .. } => source.error_code(),
        }
    }

    /// Check if the error was caused by the caller's input rather than the
    /// environment (bad reference, bad schema, bad flags).
    pub fn is_user_error(&self) -> bool {
        match self {
            Self::Resolution { .. } | Self::MissingColumn(_) | Self::InvalidConfig(_) => true,
            Self::WithContext { source, .. } => source.is_user_error(),
            _ => false,
        }
    }
}

/// Result type alias for cleaning operations.
pub type Result<T> = std::result::Result<T, CleaningError>;

/// Extension trait for adding context to Results.
pub trait ResultExt<T> {
    /// Add context to an error result.
    fn context(self, context: impl Into<String>) -> Result<T>;
}

impl<T> ResultExt<T> for Result<T> {
    fn context(self, context: impl Into<String>) -> Result<T> {
        self.map_err(|e| e.with_context(context))
    }
}

impl<T> ResultExt<T> for std::result::Result<T, polars::error::PolarsError> {
    fn context(self, context: impl Into<String>) -> Result<T> {
        self.map_err(|e| CleaningError::Polars(e).with_context(context))
    }
}

impl<T> ResultExt<T> for std::result::Result<T, std::io::Error> {
    fn context(self, context: impl Into<String>) -> Result<T> {
        self.map_err(|e| CleaningError::Io(e).with_context(context))
    }
}
