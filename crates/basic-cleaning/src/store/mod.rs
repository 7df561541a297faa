//! Artifact store boundary.
//!
//! The pipeline talks to the store through the narrow [`ArtifactStore`]
//! trait: one call to turn an artifact reference into a local file, one call
//! to register a local file as a new artifact version, and an optional hook
//! to persist run metadata. The cleaning logic never sees the store's
//! internals, so tests can substitute an in-memory store.
//!
//! # References
//!
//! A reference has the form `<name>[:<selector>]`:
//!
//! - `sample.csv` or `sample.csv:latest` - the most recently published version
//! - `sample.csv:v3` - an explicit version number
//! - `sample.csv:reference` - any other alias attached to a version
//!
//! # Implementing a Store
//!
//! ```rust,ignore
//! use basic_cleaning::store::{ArtifactStore, ArtifactVersion, PublishRequest};
//!
//! struct MyStore;
//!
//! impl ArtifactStore for MyStore {
//!     fn resolve(&self, reference: &str) -> Result<PathBuf> { ... }
//!     fn publish(&self, request: &PublishRequest) -> Result<ArtifactVersion> { ... }
//!     fn name(&self) -> &str { "my-store" }
//! }
//! ```

mod local;

pub use local::{ArtifactManifest, LocalArtifactStore, VersionEntry};

use crate::error::{CleaningError, Result};
use crate::run::RunRecord;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// Alias that always points at the newest version of an artifact.
pub const LATEST_ALIAS: &str = "latest";

static ARTIFACT_NAME: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z0-9_.-]+$").expect("Invalid regex: artifact name"));

static VERSION_SELECTOR: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^v(\d+)$").expect("Invalid regex: version selector"));

/// Check whether `name` can be used as an artifact name (or alias).
///
/// Names are restricted to letters, digits, `.`, `_` and `-`, and cannot be
/// `.` or `..`, so a name is always a single safe path component.
pub fn is_valid_artifact_name(name: &str) -> bool {
    name != "." && name != ".." && ARTIFACT_NAME.is_match(name)
}

/// Trait for stores that hold versioned artifacts.
///
/// Implementations must be `Send + Sync` so a pipeline holding the store can
/// be moved across threads.
pub trait ArtifactStore: Send + Sync {
    /// Resolve an artifact reference to a readable local file.
    ///
    /// # Errors
    ///
    /// Returns [`CleaningError::Resolution`] if the reference is malformed,
    /// the artifact or version does not exist, or the store is unreachable.
    fn resolve(&self, reference: &str) -> Result<PathBuf>;

    /// Register a local file as a new version of the named artifact.
    ///
    /// # Errors
    ///
    /// Returns [`CleaningError::Publish`] if the store rejects the upload.
    fn publish(&self, request: &PublishRequest) -> Result<ArtifactVersion>;

    /// Persist the metadata of a run. Stores without run tracking ignore it.
    fn record_run(&self, _record: &RunRecord) -> Result<()> {
        Ok(())
    }

    /// Store name for logging.
    fn name(&self) -> &str;
}

/// Which version of an artifact a reference selects.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VersionSelector {
    /// An explicit version number (`v0`, `v1`, ...).
    Version(u32),
    /// A named alias such as `latest`.
    Alias(String),
}

impl fmt::Display for VersionSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Version(version) => write!(f, "v{}", version),
            Self::Alias(alias) => write!(f, "{}", alias),
        }
    }
}

/// A parsed artifact reference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactRef {
    pub name: String,
    pub selector: VersionSelector,
}

impl ArtifactRef {
    /// Parse `<name>[:<selector>]`. A bare name selects `latest`.
    pub fn parse(reference: &str) -> Result<Self> {
        let reference = reference.trim();
        let (name, selector) = match reference.rsplit_once(':') {
            Some((name, selector)) => (name, Some(selector)),
            None => (reference, None),
        };

        if !is_valid_artifact_name(name) {
            return Err(CleaningError::resolution(
                reference,
                format!("invalid artifact name '{}'", name),
            ));
        }

        let selector = match selector {
            None => VersionSelector::Alias(LATEST_ALIAS.to_string()),
            Some(selector) => {
                if let Some(caps) = VERSION_SELECTOR.captures(selector) {
                    let version = caps[1].parse::<u32>().map_err(|_| {
                        CleaningError::resolution(
                            reference,
                            format!("version '{}' is out of range", selector),
                        )
                    })?;
                    VersionSelector::Version(version)
                } else if is_valid_artifact_name(selector) {
                    VersionSelector::Alias(selector.to_string())
                } else {
                    return Err(CleaningError::resolution(
                        reference,
                        format!("invalid version or alias '{}'", selector),
                    ));
                }
            }
        };

        Ok(Self {
            name: name.to_string(),
            selector,
        })
    }
}

impl fmt::Display for ArtifactRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.name, self.selector)
    }
}

/// A request to publish a local file as a new artifact version.
#[derive(Debug, Clone)]
pub struct PublishRequest {
    pub name: String,
    pub artifact_type: String,
    pub description: String,
    pub file: PathBuf,
    /// Run that logged the artifact, if any.
    pub run_id: Option<String>,
}

/// Identifier of a published artifact version.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactVersion {
    pub name: String,
    pub version: u32,
    pub artifact_type: String,
}

impl fmt::Display for ArtifactVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:v{}", self.name, self.version)
    }
}
