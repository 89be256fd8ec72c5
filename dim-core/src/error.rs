//! Error taxonomy for the reconciliation engine.
//!
//! Every fallible engine operation returns [`DimError`]. The CLI maps any of
//! these to exit code 1. Runtime failures of `cmd` post-process steps are not
//! part of this enum; see [`crate::postprocess::CommandError`].

use std::path::{Path, PathBuf};
use thiserror::Error;

pub type Result<T, E = DimError> = std::result::Result<T, E>;

#[derive(Debug, Error)]
pub enum DimError {
    #[error("{} not found, run `dim init` first", .path.display())]
    NotInitialized { path: PathBuf },

    #[error("No content named '{0}'")]
    NotFound(String),

    #[error("Content named '{0}' already exists, use --force to overwrite")]
    DuplicateName(String),

    #[error("Invalid content name '{0}'")]
    InvalidName(String),

    #[error("Invalid URL '{url}': {source}")]
    InvalidUrl {
        url: String,
        #[source]
        source: url::ParseError,
    },

    #[error("Request to {url} failed with status {status}")]
    Transport { url: String, status: u16 },

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Invalid post-process '{entry}': {reason}")]
    PipelineValidation { entry: String, reason: String },

    #[error("Post-process '{step}' failed: {source:#}")]
    PostProcess {
        step: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("Integrity drift detected for: {}", .0.join(", "))]
    IntegrityDrift(Vec<String>),

    #[error("Malformed document {}: {source}", .path.display())]
    Document {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Failed to load remote manifest {url}: {source}")]
    RemoteManifest {
        url: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("I/O error on {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{} of {} contents failed to install", .failures.len(), .failures.len() + .installed.len())]
    BatchFailed {
        installed: Vec<String>,
        failures: Vec<ItemFailure>,
    },
}

impl DimError {
    pub fn io(path: impl AsRef<Path>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.as_ref().to_path_buf(),
            source,
        }
    }
}

/// One failed item of a batch install.
#[derive(Debug)]
pub struct ItemFailure {
    pub name: String,
    pub error: Box<DimError>,
}

impl std::fmt::Display for ItemFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.name, self.error)
    }
}
