//! Filesystem-backed artifact store.
//!
//! Layout under the store root:
//!
//! ```text
//! <root>/artifacts/<name>/manifest.json
//! <root>/artifacts/<name>/v<N>/<file>
//! <root>/runs/<run id>.json
//! ```
//!
//! A new version is copied into a staging directory next to the version
//! directories and renamed into place, so a failed publish never leaves a
//! half-written `v<N>` behind. Manifests and run records are written to a
//! temporary file and renamed over the old one.

use super::{
    ArtifactRef, ArtifactStore, ArtifactVersion, LATEST_ALIAS, PublishRequest, VersionSelector,
    is_valid_artifact_name,
};
use crate::error::{CleaningError, Result, ResultExt};
use crate::run::RunRecord;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::fs::{self, OpenOptions};
use std::io::{self, ErrorKind};
use std::path::{Path, PathBuf};
use std::thread;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

const MANIFEST_FILE: &str = "manifest.json";
const LOCK_FILE: &str = ".lock";

/// How long a publisher waits for another one to release the manifest.
const LOCK_TIMEOUT: Duration = Duration::from_secs(30);
const LOCK_POLL_INTERVAL: Duration = Duration::from_millis(5);

/// Manifest describing every version of one artifact.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArtifactManifest {
    pub name: String,
    #[serde(rename = "type")]
    pub artifact_type: String,
    pub versions: Vec<VersionEntry>,
}

impl ArtifactManifest {
    /// Find the version a selector points at.
    pub fn find(&self, selector: &VersionSelector) -> Option<&VersionEntry> {
        match selector {
            VersionSelector::Version(version) => {
                self.versions.iter().find(|entry| entry.version == *version)
            }
            VersionSelector::Alias(alias) => self
                .versions
                .iter()
                .find(|entry| entry.aliases.iter().any(|a| a == alias)),
        }
    }

    fn next_version(&self) -> u32 {
        self.versions
            .iter()
            .map(|entry| entry.version + 1)
            .max()
            .unwrap_or(0)
    }
}

/// One published version of an artifact.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VersionEntry {
    pub version: u32,
    pub file_name: String,
    pub description: String,
    pub run_id: Option<String>,
    pub created_at: String,
    pub size_bytes: u64,
    pub aliases: Vec<String>,
}

/// Versioned artifact store kept in a local directory.
#[derive(Debug, Clone)]
pub struct LocalArtifactStore {
    root: PathBuf,
}

impl LocalArtifactStore {
    /// Open (or lazily create) a store rooted at `root`.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Publish a file that is not produced by a run, e.g. to seed the store
    /// with a raw dataset.
    pub fn import_file(
        &self,
        name: &str,
        artifact_type: &str,
        description: &str,
        file: impl Into<PathBuf>,
    ) -> Result<ArtifactVersion> {
        self.publish(&PublishRequest {
            name: name.to_string(),
            artifact_type: artifact_type.to_string(),
            description: description.to_string(),
            file: file.into(),
            run_id: None,
        })
    }

    /// Load the manifest of an artifact, if it has been published.
    pub fn manifest(&self, name: &str) -> Result<Option<ArtifactManifest>> {
        let path = self.artifact_dir(name).join(MANIFEST_FILE);
        if !path.exists() {
            return Ok(None);
        }
        let content = fs::read_to_string(&path)
            .context(format!("Reading manifest {}", path.display()))?;
        let manifest = serde_json::from_str(&content)?;
        Ok(Some(manifest))
    }

    /// Load a previously recorded run.
    pub fn load_run(&self, run_id: &str) -> Result<RunRecord> {
        let path = self.runs_dir().join(format!("{}.json", run_id));
        let content =
            fs::read_to_string(&path).context(format!("Reading run record {}", path.display()))?;
        Ok(serde_json::from_str(&content)?)
    }

    fn artifact_dir(&self, name: &str) -> PathBuf {
        self.root.join("artifacts").join(name)
    }

    fn runs_dir(&self) -> PathBuf {
        self.root.join("runs")
    }

    fn version_dir(&self, name: &str, version: u32) -> PathBuf {
        self.artifact_dir(name).join(format!("v{}", version))
    }

    fn staging_dir(&self, name: &str) -> PathBuf {
        self.artifact_dir(name)
            .join(format!(".staging-{:08x}", rand::random::<u32>()))
    }

    /// Copy the file into a fresh version directory and return its size.
    fn stage_version(&self, request: &PublishRequest, file_name: &str, version: u32) -> Result<u64> {
        let staging = self.staging_dir(&request.name);
        fs::create_dir_all(&staging)?;

        let staged = staging.join(file_name);
        let size = match fs::copy(&request.file, &staged) {
            Ok(size) => size,
            Err(e) => {
                let _ = fs::remove_dir_all(&staging);
                return Err(CleaningError::publish(
                    &request.name,
                    format!("failed to copy {}: {}", request.file.display(), e),
                ));
            }
        };

        let target = self.version_dir(&request.name, version);
        if let Err(e) = fs::rename(&staging, &target) {
            let _ = fs::remove_dir_all(&staging);
            return Err(CleaningError::publish(
                &request.name,
                format!("version v{} could not be created: {}", version, e),
            ));
        }

        Ok(size)
    }
}

/// Exclusive hold on one artifact's manifest, across threads and processes.
///
/// The lock is a file created with `create_new`, which fails while another
/// holder exists. It is removed when the guard is dropped.
struct ManifestLock {
    path: PathBuf,
}

impl ManifestLock {
    fn acquire(artifact_dir: &Path) -> Result<Self> {
        fs::create_dir_all(artifact_dir)
            .context(format!("Creating {}", artifact_dir.display()))?;
        let path = artifact_dir.join(LOCK_FILE);
        let started = Instant::now();

        loop {
            match OpenOptions::new().write(true).create_new(true).open(&path) {
                Ok(_) => return Ok(Self { path }),
                Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                    if started.elapsed() >= LOCK_TIMEOUT {
                        return Err(CleaningError::Io(io::Error::new(
                            ErrorKind::TimedOut,
                            format!(
                                "timed out after {:?} waiting for {} (remove it if no publish is running)",
                                LOCK_TIMEOUT,
                                path.display()
                            ),
                        )));
                    }
                    thread::sleep(LOCK_POLL_INTERVAL);
                }
                Err(e) => {
                    return Err(CleaningError::Io(e).with_context(format!("Locking {}", path.display())));
                }
            }
        }
    }
}

impl Drop for ManifestLock {
    fn drop(&mut self) {
        if let Err(e) = fs::remove_file(&self.path) {
            warn!("Failed to release lock {}: {}", self.path.display(), e);
        }
    }
}

/// Write `bytes` to `path` through a sibling temp file and a rename.
fn write_atomically(path: &Path, bytes: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let tmp = path.with_extension(format!("tmp-{:08x}", rand::random::<u32>()));
    fs::write(&tmp, bytes).context(format!("Writing {}", tmp.display()))?;
    if let Err(e) = fs::rename(&tmp, path) {
        let _ = fs::remove_file(&tmp);
        return Err(CleaningError::Io(e).with_context(format!("Replacing {}", path.display())));
    }
    Ok(())
}

impl ArtifactStore for LocalArtifactStore {
    fn resolve(&self, reference: &str) -> Result<PathBuf> {
        let artifact = ArtifactRef::parse(reference)?;

        let manifest = self
            .manifest(&artifact.name)
            .map_err(|e| CleaningError::resolution(reference, e.to_string()))?
            .ok_or_else(|| CleaningError::resolution(reference, "artifact does not exist"))?;

        let entry = manifest.find(&artifact.selector).ok_or_else(|| {
            CleaningError::resolution(
                reference,
                format!("no version matches '{}'", artifact.selector),
            )
        })?;

        let path = self
            .version_dir(&artifact.name, entry.version)
            .join(&entry.file_name);
        if !path.is_file() {
            return Err(CleaningError::resolution(
                reference,
                format!("stored file {} is missing", path.display()),
            ));
        }

        debug!("Resolved {} to {}", reference, path.display());
        Ok(path)
    }

    fn publish(&self, request: &PublishRequest) -> Result<ArtifactVersion> {
        if !is_valid_artifact_name(&request.name) {
            return Err(CleaningError::publish(&request.name, "invalid artifact name"));
        }
        if !request.file.is_file() {
            return Err(CleaningError::publish(
                &request.name,
                format!("local file {} does not exist", request.file.display()),
            ));
        }
        let file_name = request
            .file
            .file_name()
            .and_then(|s| s.to_str())
            .ok_or_else(|| CleaningError::publish(&request.name, "local file has no name"))?
            .to_string();

        // Held until the manifest is rewritten, so concurrent publishers
        // each read the previous one's versions.
        let _lock = ManifestLock::acquire(&self.artifact_dir(&request.name))
            .map_err(|e| CleaningError::publish(&request.name, e.to_string()))?;

        let mut manifest = match self.manifest(&request.name)? {
            Some(manifest) => {
                if manifest.artifact_type != request.artifact_type {
                    return Err(CleaningError::publish(
                        &request.name,
                        format!(
                            "artifact already exists with type '{}', not '{}'",
                            manifest.artifact_type, request.artifact_type
                        ),
                    ));
                }
                manifest
            }
            None => ArtifactManifest {
                name: request.name.clone(),
                artifact_type: request.artifact_type.clone(),
                versions: Vec::new(),
            },
        };

        let version = manifest.next_version();
        let size_bytes = self.stage_version(request, &file_name, version)?;

        for entry in &mut manifest.versions {
            entry.aliases.retain(|alias| alias != LATEST_ALIAS);
        }
        manifest.versions.push(VersionEntry {
            version,
            file_name,
            description: request.description.clone(),
            run_id: request.run_id.clone(),
            created_at: Utc::now().to_rfc3339(),
            size_bytes,
            aliases: vec![LATEST_ALIAS.to_string()],
        });

        let manifest_path = self.artifact_dir(&request.name).join(MANIFEST_FILE);
        let written = serde_json::to_vec_pretty(&manifest)
            .map_err(CleaningError::from)
            .and_then(|bytes| write_atomically(&manifest_path, &bytes));
        if let Err(e) = written {
            // Without a manifest entry the version is unreachable, drop it.
            if let Err(cleanup) = fs::remove_dir_all(self.version_dir(&request.name, version)) {
                warn!("Failed to remove orphaned version v{}: {}", version, cleanup);
            }
            return Err(CleaningError::publish(&request.name, e.to_string()));
        }

        let published = ArtifactVersion {
            name: request.name.clone(),
            version,
            artifact_type: request.artifact_type.clone(),
        };
        info!("Published {} ({} bytes)", published, size_bytes);
        Ok(published)
    }

    fn record_run(&self, record: &RunRecord) -> Result<()> {
        let path = self.runs_dir().join(format!("{}.json", record.id));
        let bytes = serde_json::to_vec_pretty(record)?;
        write_atomically(&path, &bytes)
    }

    fn name(&self) -> &str {
        "local"
    }
}
