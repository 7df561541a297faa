//! The cleaning pipeline and its builder.
//!
//! A run goes through six stages in a fixed order: fetch the input artifact,
//! load it, apply the price cutoff, convert the review dates, write the
//! cleaned CSV and publish it as a new artifact version. Any error aborts the
//! remaining stages and closes the run as failed.

use crate::cleaner::DataCleaner;
use crate::config::{CleaningConfig, ConfigValidationError};
use crate::dataset::{read_table, write_table};
use crate::error::Result;
use crate::pipeline::progress::{
    CleaningStage, ClosureProgressReporter, ProgressReporter, ProgressUpdate,
};
use crate::run::Run;
use crate::store::ArtifactStore;
use crate::types::{CleaningReport, CleaningSummary};
use std::sync::Arc;
use std::time::Instant;
use tracing::{error, info, warn};

/// The basic cleaning pipeline.
///
/// Use [`Pipeline::builder()`] to create one.
///
/// # Example
///
/// ```rust,ignore
/// use basic_cleaning::{CleaningConfig, LocalArtifactStore, Pipeline};
/// use std::sync::Arc;
///
/// let config = CleaningConfig::builder()
///     .input_artifact("sample.csv:latest")
///     .output_artifact("clean_sample.csv")
///     .output_type("clean_sample")
///     .output_description("Data with outliers and null values removed")
///     .price_range(10.0, 350.0)
///     .build()?;
///
/// let summary = Pipeline::builder()
///     .config(config)
///     .store(Arc::new(LocalArtifactStore::new("./artifacts")))
///     .build()?
///     .run()?;
/// println!("Published {}", summary.published);
/// ```
pub struct Pipeline {
    config: CleaningConfig,
    store: Arc<dyn ArtifactStore>,
    progress_reporter: Option<Arc<dyn ProgressReporter>>,
    cleaner: DataCleaner,
}

static_assertions::assert_impl_all!(Pipeline: Send);

impl Pipeline {
    /// Create a new pipeline builder.
    pub fn builder() -> PipelineBuilder {
        PipelineBuilder::default()
    }

    pub fn config(&self) -> &CleaningConfig {
        &self.config
    }

    /// Execute one cleaning run.
    ///
    /// Every call opens a new run on the store. On success the run is closed
    /// with the returned summary; on failure it is closed with the error,
    /// which is then returned unchanged.
    pub fn run(&self) -> Result<CleaningSummary> {
        let start_time = Instant::now();
        let mut run = Run::start(self.store.clone(), &self.config.job_type, &self.config)?;
        info!(
            "Started {} run {} on {} store",
            self.config.job_type,
            run.id(),
            self.store.name()
        );

        match self.run_internal(&mut run, start_time) {
            Ok(summary) => {
                run.finish(summary.clone())?;
                self.report_progress(ProgressUpdate::complete(format!(
                    "Published {}",
                    summary.published
                )));
                info!("Run {} finished in {} ms", run.id(), summary.duration_ms);
                Ok(summary)
            }
            Err(e) => {
                self.report_progress(ProgressUpdate::failed(e.to_string()));
                error!("Run {} failed: {}", run.id(), e);
                if let Err(close) = run.fail(&e) {
                    warn!("Could not close run {}: {}", run.id(), close);
                }
                Err(e)
            }
        }
    }

    /// Report progress if a reporter is configured.
    fn report_progress(&self, update: ProgressUpdate) {
        if let Some(reporter) = &self.progress_reporter {
            reporter.report(update);
        }
    }

    /// Report a stage as fully done.
    fn stage_done(&self, stage: CleaningStage, message: String) {
        self.report_progress(ProgressUpdate::new(stage, 1.0, message));
    }

    fn run_internal(&self, run: &mut Run, start_time: Instant) -> Result<CleaningSummary> {
        let config = &self.config;

        // Step 1: Fetch
        self.report_progress(ProgressUpdate::new(
            CleaningStage::Fetching,
            0.0,
            format!("Fetching {}", config.input_artifact),
        ));
        info!("Fetching artifact {}", config.input_artifact);
        let input_path = run.use_artifact(&config.input_artifact)?;
        self.stage_done(CleaningStage::Fetching, format!("Resolved {}", input_path.display()));

        // Step 2: Load
        self.report_progress(ProgressUpdate::new(
            CleaningStage::Loading,
            0.0,
            format!("Loading {}", input_path.display()),
        ));
        let df = read_table(&input_path)?;
        self.cleaner.check_schema(&df)?;
        self.stage_done(CleaningStage::Loading, format!("Loaded {} rows", df.height()));

        // Step 3: Price cutoff
        self.report_progress(ProgressUpdate::new(
            CleaningStage::Filtering,
            0.0,
            format!(
                "Keeping prices between {} and {}",
                config.min_price, config.max_price
            ),
        ));
        let mut report = CleaningReport::default();
        let df = self
            .cleaner
            .filter_price_range(&df, config.min_price, config.max_price, &mut report)?;
        info!(
            "Kept {} of {} rows ({} removed)",
            report.rows_after, report.rows_before, report.rows_removed
        );
        self.stage_done(CleaningStage::Filtering, format!("Kept {} rows", report.rows_after));

        // Step 4: Date coercion
        self.report_progress(ProgressUpdate::new(
            CleaningStage::Coercing,
            0.0,
            format!("Converting {} to datetime", config.date_column),
        ));
        let mut df = self.cleaner.coerce_dates(df, &mut report)?;
        self.stage_done(
            CleaningStage::Coercing,
            format!("{} dates set to null", report.dates_nulled),
        );

        // Step 5: Write
        self.report_progress(ProgressUpdate::new(
            CleaningStage::Writing,
            0.0,
            format!("Writing {}", config.output_file.display()),
        ));
        let output_bytes = write_table(&mut df, &config.output_file)?;
        self.stage_done(CleaningStage::Writing, format!("Wrote {} bytes", output_bytes));

        // Step 6: Publish
        self.report_progress(ProgressUpdate::new(
            CleaningStage::Publishing,
            0.0,
            format!("Publishing {}", config.output_artifact),
        ));
        info!("Logging artifact {}", config.output_artifact);
        let published = run.log_artifact(
            &config.output_artifact,
            &config.output_type,
            &config.output_description,
            &config.output_file,
        )?;
        info!("Published {}", published);
        self.stage_done(CleaningStage::Publishing, format!("Published {}", published));

        Ok(CleaningSummary {
            input_artifact: config.input_artifact.clone(),
            input_path,
            output_file: config.output_file.clone(),
            output_bytes,
            published,
            report,
            duration_ms: start_time.elapsed().as_millis() as u64,
        })
    }
}

/// Builder for creating a [`Pipeline`].
#[derive(Default)]
pub struct PipelineBuilder {
    config: Option<CleaningConfig>,
    store: Option<Arc<dyn ArtifactStore>>,
    progress_reporter: Option<Arc<dyn ProgressReporter>>,
}

impl PipelineBuilder {
    pub fn config(mut self, config: CleaningConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Set the artifact store inputs are fetched from and outputs published to.
    pub fn store(mut self, store: Arc<dyn ArtifactStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Set a progress reporter.
    pub fn progress_reporter(mut self, reporter: Arc<dyn ProgressReporter>) -> Self {
        self.progress_reporter = Some(reporter);
        self
    }

    /// Set a progress callback using a closure.
    ///
    /// # Example
    ///
    /// ```rust,ignore
    /// let pipeline = Pipeline::builder()
    ///     .config(config)
    ///     .store(store)
    ///     .on_progress(|update| {
    ///         println!("[{:.0}%] {:?}: {}",
    ///             update.progress * 100.0,
    ///             update.stage,
    ///             update.message
    ///         );
    ///     })
    ///     .build()?;
    /// ```
    pub fn on_progress<F>(mut self, callback: F) -> Self
    where
        F: Fn(ProgressUpdate) + Send + Sync + 'static,
    {
        self.progress_reporter = Some(Arc::new(ClosureProgressReporter::new(callback)));
        self
    }

    /// Build the pipeline.
    ///
    /// Both a configuration and a store are required, and the configuration
    /// must pass [`CleaningConfig::validate`].
    pub fn build(self) -> Result<Pipeline> {
        let config = self
            .config
            .ok_or_else(|| ConfigValidationError::MissingField("config".to_string()))?;
        config.validate()?;
        let store = self
            .store
            .ok_or_else(|| ConfigValidationError::MissingField("store".to_string()))?;

        let cleaner = DataCleaner::new(config.price_column.clone(), config.date_column.clone());

        Ok(Pipeline {
            config,
            store,
            progress_reporter: self.progress_reporter,
            cleaner,
        })
    }
}
