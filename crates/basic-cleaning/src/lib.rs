//! Basic Cleaning Library
//!
//! A single-step cleaning job for listing datasets, built with Rust and Polars.
//!
//! # Overview
//!
//! One run of the [`Pipeline`]:
//!
//! - **Fetch**: resolves an input artifact reference (`sample.csv:latest`)
//!   to a local file through an [`ArtifactStore`]
//! - **Filter**: keeps the rows whose `price` lies in `[min_price, max_price]`
//! - **Coerce**: converts `last_review` to date-times, unparseable values
//!   become null
//! - **Write**: saves the cleaned table as CSV
//! - **Publish**: registers the CSV as a new version of the output artifact
//!
//! Every run is tracked as a [`Run`] whose record holds the configuration,
//! the consumed and produced artifacts, and the outcome.
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use basic_cleaning::{CleaningConfig, LocalArtifactStore, Pipeline};
//! use std::sync::Arc;
//!
//! let store = Arc::new(LocalArtifactStore::new("./artifacts"));
//! store.import_file("sample.csv", "raw_data", "Raw listings", "sample.csv")?;
//!
//! let config = CleaningConfig::builder()
//!     .input_artifact("sample.csv:latest")
//!     .output_artifact("clean_sample.csv")
//!     .output_type("clean_sample")
//!     .output_description("Data with outliers and null values removed")
//!     .price_range(10.0, 350.0)
//!     .build()?;
//!
//! let summary = Pipeline::builder()
//!     .config(config)
//!     .store(store)
//!     .on_progress(|update| {
//!         println!("[{:.0}%] {}", update.progress * 100.0, update.message);
//!     })
//!     .build()?
//!     .run()?;
//!
//! println!("Published {}", summary.published);
//! ```
//!
//! # Artifact Stores
//!
//! The pipeline only talks to the store through the [`ArtifactStore`] trait.
//! [`LocalArtifactStore`] keeps versioned artifacts in a directory tree; see
//! the [`store`] module to implement another backend.

pub mod cleaner;
pub mod config;
pub mod dataset;
pub mod error;
pub mod pipeline;
pub mod run;
pub mod store;
pub mod types;

// Re-exports for convenient access
pub use cleaner::DataCleaner;
pub use config::{CleaningConfig, CleaningConfigBuilder, ConfigValidationError};
pub use dataset::{read_table, write_table};
pub use error::{CleaningError, Result as CleaningResult, ResultExt};
pub use pipeline::{
    CleaningStage, ClosureProgressReporter, Pipeline, PipelineBuilder, ProgressReporter,
    ProgressUpdate,
};
pub use run::{Run, RunFailure, RunRecord, RunStatus};
pub use store::{
    ArtifactRef, ArtifactStore, ArtifactVersion, LocalArtifactStore, PublishRequest,
    VersionSelector,
};
pub use types::{CleaningReport, CleaningSummary};
