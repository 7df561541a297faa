//! Progress reporting for the cleaning pipeline.
//!
//! # Example
//!
//! ```rust,ignore
//! let summary = Pipeline::builder()
//!     .config(config)
//!     .store(store)
//!     .on_progress(|update| {
//!         println!("[{:.0}%] {}", update.progress * 100.0, update.message);
//!     })
//!     .build()?
//!     .run()?;
//! ```

use serde::{Deserialize, Serialize};

/// Stages of a cleaning run, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CleaningStage {
    /// Resolving the input artifact to a local file
    Fetching,
    /// Reading the CSV into a table
    Loading,
    /// Applying the price cutoff
    Filtering,
    /// Converting the review dates
    Coercing,
    /// Writing the cleaned CSV
    Writing,
    /// Publishing the output artifact
    Publishing,
    /// Run completed successfully
    Complete,
    /// Run failed with an error
    Failed,
}

impl CleaningStage {
    /// Returns a human-readable name for the stage.
    pub fn display_name(&self) -> &'static str {
        match self {
            Self::Fetching => "Fetching Artifact",
            Self::Loading => "Loading Table",
            Self::Filtering => "Filtering Prices",
            Self::Coercing => "Converting Dates",
            Self::Writing => "Writing Output",
            Self::Publishing => "Publishing Artifact",
            Self::Complete => "Complete",
            Self::Failed => "Failed",
        }
    }

    /// Share of the overall run taken by this stage (0.0 - 1.0).
    ///
    /// The working stages sum to 1.0; terminal states weigh nothing.
    pub fn weight(&self) -> f32 {
        match self {
            Self::Fetching => 0.10,
            Self::Loading => 0.25,
            Self::Filtering => 0.15,
            Self::Coercing => 0.20,
            Self::Writing => 0.20,
            Self::Publishing => 0.10,
            Self::Complete | Self::Failed => 0.0,
        }
    }

    /// Returns the cumulative progress at the start of this stage.
    pub fn base_progress(&self) -> f32 {
        match self {
            Self::Fetching => 0.0,
            Self::Loading => 0.10,
            Self::Filtering => 0.35,
            Self::Coercing => 0.50,
            Self::Writing => 0.70,
            Self::Publishing => 0.90,
            Self::Complete => 1.0,
            Self::Failed => 0.0,
        }
    }
}

/// A single progress notification.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProgressUpdate {
    /// Current stage
    pub stage: CleaningStage,

    /// Overall progress (0.0 - 1.0)
    pub progress: f32,

    /// Progress within current stage (0.0 - 1.0)
    pub stage_progress: f32,

    /// Human-readable message describing current activity
    pub message: String,
}

static_assertions::assert_impl_all!(ProgressUpdate: Send, Sync);

impl ProgressUpdate {
    pub fn new(stage: CleaningStage, stage_progress: f32, message: impl Into<String>) -> Self {
        let progress = stage.base_progress() + (stage.weight() * stage_progress);
        Self {
            stage,
            progress: progress.clamp(0.0, 1.0),
            stage_progress: stage_progress.clamp(0.0, 1.0),
            message: message.into(),
        }
    }

    /// Creates a completion progress update.
    pub fn complete(message: impl Into<String>) -> Self {
        Self {
            stage: CleaningStage::Complete,
            progress: 1.0,
            stage_progress: 1.0,
            message: message.into(),
        }
    }

    /// Creates a failed progress update.
    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            stage: CleaningStage::Failed,
            progress: 0.0,
            stage_progress: 0.0,
            message: message.into(),
        }
    }
}

/// Receives progress updates from a running pipeline.
///
/// Implementations must be `Send + Sync` so a pipeline can be driven from
/// a worker thread while reporting elsewhere.
///
/// # Example
///
/// ```rust,ignore
/// struct JsonLinesReporter;
///
/// impl ProgressReporter for JsonLinesReporter {
///     fn report(&self, update: ProgressUpdate) {
///         if let Ok(line) = serde_json::to_string(&update) {
///             println!("{line}");
///         }
///     }
/// }
/// ```
pub trait ProgressReporter: Send + Sync {
    fn report(&self, update: ProgressUpdate);
}

/// Wrapper that implements [`ProgressReporter`] using a closure.
pub struct ClosureProgressReporter<F>
where
    F: Fn(ProgressUpdate) + Send + Sync,
{
    callback: F,
}

impl<F> ClosureProgressReporter<F>
where
    F: Fn(ProgressUpdate) + Send + Sync,
{
    pub fn new(callback: F) -> Self {
        Self { callback }
    }
}

impl<F> ProgressReporter for ClosureProgressReporter<F>
where
    F: Fn(ProgressUpdate) + Send + Sync,
{
    fn report(&self, update: ProgressUpdate) {
        (self.callback)(update);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    const WORKING_STAGES: [CleaningStage; 6] = [
        CleaningStage::Fetching,
        CleaningStage::Loading,
        CleaningStage::Filtering,
        CleaningStage::Coercing,
        CleaningStage::Writing,
        CleaningStage::Publishing,
    ];

    #[test]
    fn test_progress_update_new() {
        let update = ProgressUpdate::new(CleaningStage::Filtering, 0.5, "Filtering...");
        assert_eq!(update.stage, CleaningStage::Filtering);
        assert_eq!(update.stage_progress, 0.5);
        assert!((update.progress - 0.425).abs() < 1e-6);
        assert_eq!(update.message, "Filtering...");
    }

    #[test]
    fn test_progress_update_clamps() {
        let update = ProgressUpdate::new(CleaningStage::Publishing, 3.0, "overshoot");
        assert_eq!(update.stage_progress, 1.0);
        assert!(update.progress <= 1.0);
    }

    #[test]
    fn test_progress_update_terminal_states() {
        let done = ProgressUpdate::complete("Done!");
        assert_eq!(done.stage, CleaningStage::Complete);
        assert_eq!(done.progress, 1.0);

        let failed = ProgressUpdate::failed("boom");
        assert_eq!(failed.stage, CleaningStage::Failed);
        assert_eq!(failed.progress, 0.0);
        assert_eq!(failed.message, "boom");
    }

    #[test]
    fn test_stage_weights_sum() {
        let total: f32 = WORKING_STAGES.iter().map(|s| s.weight()).sum();
        assert!((total - 1.0).abs() < 1e-6, "weights sum to {}", total);
    }

    #[test]
    fn test_stages_are_contiguous() {
        for pair in WORKING_STAGES.windows(2) {
            let end = pair[0].base_progress() + pair[0].weight();
            assert!(
                (end - pair[1].base_progress()).abs() < 1e-6,
                "{:?} ends at {} but {:?} starts at {}",
                pair[0],
                end,
                pair[1],
                pair[1].base_progress()
            );
        }
    }

    #[test]
    fn test_stage_display_name() {
        assert_eq!(CleaningStage::Filtering.display_name(), "Filtering Prices");
        assert_eq!(CleaningStage::Publishing.display_name(), "Publishing Artifact");
    }

    #[test]
    fn test_stage_json_values() {
        assert_eq!(
            serde_json::to_string(&CleaningStage::Coercing).unwrap(),
            "\"coercing\""
        );
        let update = ProgressUpdate::new(CleaningStage::Fetching, 0.0, "Fetching");
        let json = serde_json::to_value(&update).unwrap();
        assert_eq!(json["stage"], "fetching");
        assert_eq!(json["message"], "Fetching");
    }

    #[test]
    fn test_closure_progress_reporter() {
        let call_count = Arc::new(AtomicUsize::new(0));
        let call_count_clone = call_count.clone();

        let reporter = ClosureProgressReporter::new(move |_update| {
            call_count_clone.fetch_add(1, Ordering::SeqCst);
        });

        reporter.report(ProgressUpdate::new(CleaningStage::Loading, 0.5, "Test"));
        reporter.report(ProgressUpdate::complete("Done"));

        assert_eq!(call_count.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_progress_reporter_across_threads() {
        let call_count = Arc::new(AtomicUsize::new(0));
        let counter = call_count.clone();
        let reporter: Arc<dyn ProgressReporter> =
            Arc::new(ClosureProgressReporter::new(move |_| {
                counter.fetch_add(1, Ordering::SeqCst);
            }));

        let handles: Vec<_> = (0..4)
            .map(|_| {
                let reporter = reporter.clone();
                std::thread::spawn(move || {
                    reporter.report(ProgressUpdate::new(CleaningStage::Writing, 0.0, "tick"));
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(call_count.load(Ordering::SeqCst), 4);
    }
}
