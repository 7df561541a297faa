//! Run tracking.
//!
//! Every invocation opens a [`Run`] that records its configuration, the
//! artifacts it consumed and produced, and how it ended. Artifacts can only
//! be logged while the run is active. The store persists the record through
//! [`ArtifactStore::record_run`] when the run starts and when it closes.

use crate::error::{CleaningError, Result};
use crate::store::{ArtifactStore, ArtifactVersion, PublishRequest};
use crate::types::CleaningSummary;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, warn};

/// Lifecycle state of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Running,
    Finished,
    Failed,
}

/// Why a run failed, as stored in its record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunFailure {
    pub code: String,
    pub message: String,
}

impl From<&CleaningError> for RunFailure {
    fn from(error: &CleaningError) -> Self {
        Self {
            code: error.error_code().to_string(),
            message: error.to_string(),
        }
    }
}

/// Persisted metadata of a run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunRecord {
    pub id: String,
    pub job_type: String,
    pub status: RunStatus,
    pub config: serde_json::Value,
    pub started_at: String,
    pub finished_at: Option<String>,
    /// References of the artifacts the run consumed.
    pub used_artifacts: Vec<String>,
    /// Versions the run published, as `name:vN`.
    pub logged_artifacts: Vec<String>,
    pub summary: Option<CleaningSummary>,
    pub failure: Option<RunFailure>,
}

/// An active tracking context bound to an artifact store.
pub struct Run {
    record: RunRecord,
    store: Arc<dyn ArtifactStore>,
}

impl Run {
    /// Start a run and persist its initial record.
    pub fn start(
        store: Arc<dyn ArtifactStore>,
        job_type: &str,
        config: &impl Serialize,
    ) -> Result<Self> {
        let record = RunRecord {
            id: new_run_id(),
            job_type: job_type.to_string(),
            status: RunStatus::Running,
            config: serde_json::to_value(config)?,
            started_at: Utc::now().to_rfc3339(),
            finished_at: None,
            used_artifacts: Vec::new(),
            logged_artifacts: Vec::new(),
            summary: None,
            failure: None,
        };
        store.record_run(&record)?;
        debug!("Started run {} ({}) on {} store", record.id, job_type, store.name());

        Ok(Self { record, store })
    }

    pub fn id(&self) -> &str {
        &self.record.id
    }

    pub fn is_active(&self) -> bool {
        self.record.status == RunStatus::Running
    }

    pub fn record(&self) -> &RunRecord {
        &self.record
    }

    fn ensure_active(&self) -> Result<()> {
        if !self.is_active() {
            return Err(CleaningError::RunNotActive(self.record.id.clone()));
        }
        Ok(())
    }

    /// Resolve an input artifact and record it as consumed by this run.
    pub fn use_artifact(&mut self, reference: &str) -> Result<PathBuf> {
        self.ensure_active()?;
        let path = self.store.resolve(reference)?;
        self.record.used_artifacts.push(reference.to_string());
        Ok(path)
    }

    /// Publish a local file as a new artifact version produced by this run.
    pub fn log_artifact(
        &mut self,
        name: &str,
        artifact_type: &str,
        description: &str,
        file: &Path,
    ) -> Result<ArtifactVersion> {
        self.ensure_active()?;
        let version = self.store.publish(&PublishRequest {
            name: name.to_string(),
            artifact_type: artifact_type.to_string(),
            description: description.to_string(),
            file: file.to_path_buf(),
            run_id: Some(self.record.id.clone()),
        })?;
        self.record.logged_artifacts.push(version.to_string());
        Ok(version)
    }

    /// Close the run successfully.
    pub fn finish(&mut self, summary: CleaningSummary) -> Result<()> {
        self.ensure_active()?;
        self.record.status = RunStatus::Finished;
        self.record.summary = Some(summary);
        self.close();
        Ok(())
    }

    /// Close the run as failed with `error`.
    pub fn fail(&mut self, error: &CleaningError) -> Result<()> {
        self.ensure_active()?;
        self.record.status = RunStatus::Failed;
        self.record.failure = Some(RunFailure::from(error));
        self.close();
        Ok(())
    }

    // The outcome of the run is already decided here, so a failure to
    // persist the closing record is only logged.
    fn close(&mut self) {
        self.record.finished_at = Some(Utc::now().to_rfc3339());
        if let Err(e) = self.store.record_run(&self.record) {
            warn!("Failed to record run {}: {}", self.record.id, e);
        }
    }
}

fn new_run_id() -> String {
    format!(
        "{}-{:06x}",
        Utc::now().format("%Y%m%dT%H%M%S"),
        rand::random::<u32>() & 0x00ff_ffff
    )
}
