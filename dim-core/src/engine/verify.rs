//! Verify engine: compare lock integrity against the files on disk or upstream.

use std::fmt;
use std::path::{Path, PathBuf};
use tracing::{info, warn};
use url::Url;

use super::Engine;
use crate::digest::digest_file;
use crate::error::{DimError, Result};
use crate::paths::ProjectPaths;
use crate::postprocess::Pipeline;
use crate::store::{Content, LockRecord};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum VerifyMode {
    /// Digest the installed file.
    #[default]
    Local,
    /// Download again into a scratch directory, replay the pipeline and digest that.
    Remote,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VerifyStatus {
    Latest,
    Outdated,
}

impl fmt::Display for VerifyStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Latest => write!(f, "latest"),
            Self::Outdated => write!(f, "outdated"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct VerifyEntry {
    pub name: String,
    pub path: PathBuf,
    pub status: VerifyStatus,
    /// Integrity stored in the lock.
    pub expected: String,
    /// Recomputed digest, `None` if the local file is missing or the
    /// upstream could not be fetched.
    pub actual: Option<String>,
    /// Why no digest could be computed in remote mode.
    pub error: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct VerifyReport {
    pub entries: Vec<VerifyEntry>,
}

impl VerifyReport {
    pub fn outdated(&self) -> impl Iterator<Item = &VerifyEntry> {
        self.entries
            .iter()
            .filter(|e| e.status == VerifyStatus::Outdated)
    }

    pub fn is_latest(&self) -> bool {
        self.outdated().next().is_none()
    }

    /// Turns drift into [`DimError::IntegrityDrift`].
    pub fn ensure_latest(&self) -> Result<()> {
        let names: Vec<String> = self.outdated().map(|e| e.name.clone()).collect();
        if names.is_empty() {
            Ok(())
        } else {
            Err(DimError::IntegrityDrift(names))
        }
    }
}

impl Engine {
    /// Recomputes the digest for every lock record. Never modifies the lock.
    ///
    /// A record whose upstream fails in remote mode is reported as outdated
    /// and the remaining records are still checked.
    pub async fn verify(&self, mode: VerifyMode) -> Result<VerifyReport> {
        let scratch = match mode {
            VerifyMode::Local => None,
            VerifyMode::Remote => {
                Some(tempfile::TempDir::new().map_err(|e| DimError::io(std::env::temp_dir(), e))?)
            }
        };

        let mut entries = Vec::with_capacity(self.lock.len());
        for record in self.lock.list() {
            let (actual, error) = match &scratch {
                None => (self.local_digest(record)?, None),
                Some(dir) => match self.remote_digest(dir.path(), record).await {
                    Ok(digest) => (Some(digest), None),
                    Err(e) => {
                        warn!("{}: remote check failed: {}", record.name, e);
                        (None, Some(e.to_string()))
                    }
                },
            };

            let status = if actual.as_deref() == Some(record.integrity.as_str()) {
                VerifyStatus::Latest
            } else {
                VerifyStatus::Outdated
            };
            match status {
                VerifyStatus::Latest => info!("{}: latest", record.name),
                VerifyStatus::Outdated => warn!("{}: outdated", record.name),
            }

            entries.push(VerifyEntry {
                name: record.name.clone(),
                path: record.path.clone(),
                status,
                expected: record.integrity.clone(),
                actual,
                error,
            });
        }

        Ok(VerifyReport { entries })
    }

    fn local_digest(&self, record: &LockRecord) -> Result<Option<String>> {
        let path = self.paths.resolve(&record.path);
        if !path.is_file() {
            warn!("{} is missing", path.display());
            return Ok(None);
        }
        digest_file(&path).map(Some)
    }

    async fn remote_digest(&self, scratch: &Path, record: &LockRecord) -> Result<String> {
        let url = Url::parse(&record.url).map_err(|source| DimError::InvalidUrl {
            url: record.url.clone(),
            source,
        })?;
        let pipeline = Pipeline::parse(&record.post_processes)?;
        let content = Content::from(record);
        let scratch = ProjectPaths::new(scratch);
        let fresh = self.install_into(&scratch, &content, &url, &pipeline).await?;
        Ok(fresh.integrity)
    }
}
