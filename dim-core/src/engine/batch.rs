//! Install-from-manifest: reconcile a whole manifest against the lock.

use futures::stream::{self, StreamExt};
use std::path::PathBuf;
use tracing::{error, info};
use url::Url;

use super::Engine;
use crate::error::{DimError, ItemFailure, Result};
use crate::store::{self, Content, LockRecord, ManifestDocument, ManifestStore};

/// Where the manifest for a batch install comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ManifestSource {
    /// The project's own `dim.json`, already loaded by the engine.
    Project,
    Local(PathBuf),
    Remote(Url),
}

impl ManifestSource {
    /// `http://` and `https://` strings are remote, anything else is a file path.
    pub fn parse(raw: &str) -> Result<Self> {
        let lower = raw.to_ascii_lowercase();
        if lower.starts_with("http://") || lower.starts_with("https://") {
            let url = Url::parse(raw).map_err(|source| DimError::InvalidUrl {
                url: raw.to_string(),
                source,
            })?;
            Ok(Self::Remote(url))
        } else {
            Ok(Self::Local(PathBuf::from(raw)))
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct BatchOptions {
    /// Reinstall everything, not only names missing from the lock.
    pub force: bool,
    /// Run fetch and pipeline for all items concurrently.
    pub parallel: bool,
}

#[derive(Debug, Clone, Default)]
pub struct BatchReport {
    /// Size of the install set.
    pub total: usize,
    pub installed: Vec<LockRecord>,
}

impl BatchReport {
    /// True when every content was already installed.
    pub fn is_noop(&self) -> bool {
        self.total == 0
    }
}

type Settled = (Vec<(Content, LockRecord)>, Vec<ItemFailure>);

impl Engine {
    /// Installs every content of `source` whose name has no lock record, or
    /// all of them with `force`.
    ///
    /// Successful items are merged into both stores and saved even when other
    /// items fail; the failures are then reported as [`DimError::BatchFailed`].
    pub async fn install_from_manifest(
        &mut self,
        source: ManifestSource,
        options: BatchOptions,
    ) -> Result<BatchReport> {
        let contents = self.load_source(&source).await?;
        let install_set: Vec<Content> = contents
            .into_iter()
            .filter(|c| options.force || !self.lock.contains(&c.name))
            .collect();

        if install_set.is_empty() {
            info!("All contents already installed");
            return Ok(BatchReport::default());
        }

        info!(
            "Installing {} contents ({})",
            install_set.len(),
            if options.parallel { "parallel" } else { "sequential" }
        );

        let (succeeded, failures) = if options.parallel {
            self.settle_parallel(&install_set).await
        } else {
            self.settle_sequential(&install_set).await
        };

        let installed: Vec<LockRecord> = succeeded.iter().map(|(_, r)| r.clone()).collect();
        self.commit(succeeded)?;

        if failures.is_empty() {
            Ok(BatchReport {
                total: install_set.len(),
                installed,
            })
        } else {
            for failure in &failures {
                error!("Failed to install {}", failure);
            }
            Err(DimError::BatchFailed {
                installed: installed.into_iter().map(|r| r.name).collect(),
                failures,
            })
        }
    }

    /// Forced reinstall of everything in the project manifest.
    pub async fn update_all(&mut self, parallel: bool) -> Result<BatchReport> {
        self.install_from_manifest(
            ManifestSource::Project,
            BatchOptions {
                force: true,
                parallel,
            },
        )
        .await
    }

    async fn load_source(&self, source: &ManifestSource) -> Result<Vec<Content>> {
        match source {
            ManifestSource::Project => Ok(self.manifest.list().to_vec()),
            ManifestSource::Local(path) => {
                let path = self.paths.resolve(path);
                if !path.is_file() {
                    let missing = std::io::Error::from(std::io::ErrorKind::NotFound);
                    return Err(DimError::io(&path, missing));
                }
                Ok(ManifestStore::open(path)?.list().to_vec())
            }
            ManifestSource::Remote(url) => {
                let document: ManifestDocument = self.fetcher.fetch_document(url).await?;
                Ok(store::dedup_by_name(document.contents, "remote manifest"))
            }
        }
    }

    /// One at a time; stops launching after the first failure.
    async fn settle_sequential(&self, items: &[Content]) -> Settled {
        let mut succeeded = Vec::with_capacity(items.len());
        for content in items {
            match self.install_content(content).await {
                Ok(record) => succeeded.push((content.clone(), record)),
                Err(error) => {
                    let failure = ItemFailure {
                        name: content.name.clone(),
                        error: Box::new(error),
                    };
                    return (succeeded, vec![failure]);
                }
            }
        }
        (succeeded, Vec::new())
    }

    /// All items in flight at once (bounded by `max_parallel`); every item
    /// settles before results are returned, in manifest order.
    async fn settle_parallel(&self, items: &[Content]) -> Settled {
        let limit = self.settings.parallel_limit(items.len());
        let results: Vec<_> = stream::iter(items)
            .map(|content| async move { (content, self.install_content(content).await) })
            .buffered(limit)
            .collect()
            .await;

        let mut succeeded = Vec::new();
        let mut failures = Vec::new();
        for (content, result) in results {
            match result {
                Ok(record) => succeeded.push((content.clone(), record)),
                Err(error) => failures.push(ItemFailure {
                    name: content.name.clone(),
                    error: Box::new(error),
                }),
            }
        }
        (succeeded, failures)
    }
}
