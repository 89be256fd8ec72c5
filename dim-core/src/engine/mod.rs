//! Install engine: reconciles the manifest with the lock.
//!
//! An [`Engine`] is opened once per command. It holds both stores in memory,
//! drives fetch, pipeline and digest for each content, and writes both
//! documents back once at the end of the call.

mod batch;
mod verify;

pub use batch::{BatchOptions, BatchReport, ManifestSource};
pub use verify::{VerifyEntry, VerifyMode, VerifyReport, VerifyStatus};

use chrono::Utc;
use std::sync::Arc;
use tracing::{debug, info, warn};
use url::Url;

use crate::config::Settings;
use crate::digest::digest_file;
use crate::error::{DimError, Result};
use crate::fetch::{Fetcher, HttpClient, ReqwestClient};
use crate::paths::{validate_name, ProjectPaths};
use crate::postprocess::{Converters, NativeConverters, Pipeline};
use crate::store::{Content, LockRecord, LockStore, ManifestStore};

pub struct Engine {
    paths: ProjectPaths,
    settings: Settings,
    manifest: ManifestStore,
    lock: LockStore,
    fetcher: Fetcher,
    converters: Arc<dyn Converters>,
}

impl Engine {
    /// Creates `data_files/`, `dim.json` and `dim-lock.json`. Existing documents are kept.
    pub fn init(paths: &ProjectPaths) -> Result<()> {
        paths.ensure_install_root()?;
        ManifestStore::open_or_create(paths.manifest_path())?;
        LockStore::open_or_create(paths.lock_path())?;
        info!("Initialized dim project in {}", paths.root().display());
        Ok(())
    }

    /// Opens the project. The manifest must exist; a missing lock is created.
    pub fn open(
        paths: ProjectPaths,
        settings: Settings,
        client: Arc<dyn HttpClient>,
        converters: Arc<dyn Converters>,
    ) -> Result<Self> {
        let manifest = ManifestStore::open(paths.manifest_path())?;
        let lock = LockStore::open_or_create(paths.lock_path())?;
        paths.ensure_install_root()?;
        debug!("Engine settings: {}", settings);

        Ok(Self {
            paths,
            settings,
            manifest,
            lock,
            fetcher: Fetcher::new(client),
            converters,
        })
    }

    /// Opens the project with the reqwest transport and native converters.
    pub fn open_default(paths: ProjectPaths, settings: Settings) -> Result<Self> {
        let client = Arc::new(ReqwestClient::new(&settings)?);
        Self::open(paths, settings, client, Arc::new(NativeConverters))
    }

    /// Installed records in insertion order.
    pub fn list(&self) -> &[LockRecord] {
        self.lock.list()
    }

    // ========================================================================
    // Install / Update
    // ========================================================================

    /// Installs one content. Fails with [`DimError::DuplicateName`] if the
    /// manifest already has the name and `force` is not set.
    pub async fn install(&mut self, content: Content, force: bool) -> Result<LockRecord> {
        if !force && self.manifest.contains(&content.name) {
            return Err(DimError::DuplicateName(content.name));
        }

        let record = self.install_content(&content).await?;
        self.commit(vec![(content, record.clone())])?;
        Ok(record)
    }

    /// Reinstalls an installed content from its lock record. The recorded
    /// post-processes are kept unless `post_processes` is given.
    pub async fn update(
        &mut self,
        name: &str,
        post_processes: Option<Vec<String>>,
    ) -> Result<LockRecord> {
        let record = self
            .lock
            .get(name)
            .ok_or_else(|| DimError::NotFound(name.to_string()))?;

        let mut content = Content::from(record);
        if let Some(post_processes) = post_processes {
            content.post_processes = post_processes;
        }
        self.install(content, true).await
    }

    /// Fetch, pipeline and digest for one content without touching the stores.
    pub(crate) async fn install_content(&self, content: &Content) -> Result<LockRecord> {
        validate_name(&content.name)?;
        let url = Url::parse(&content.url).map_err(|source| DimError::InvalidUrl {
            url: content.url.clone(),
            source,
        })?;
        let pipeline = Pipeline::parse(&content.post_processes)?;

        let record = self
            .install_into(&self.paths, content, &url, &pipeline)
            .await?;
        info!("Installed {} to {}", record.name, record.path.display());
        Ok(record)
    }

    /// Downloads into `data_files/<name>/` under `paths`, runs the pipeline and
    /// digests the resulting file. The record's path is relative to `paths`.
    async fn install_into(
        &self,
        paths: &ProjectPaths,
        content: &Content,
        url: &Url,
        pipeline: &Pipeline,
    ) -> Result<LockRecord> {
        let fetched = self
            .fetcher
            .fetch_into(paths.root(), url, &content.name, &content.headers)
            .await?;
        let outcome = pipeline
            .run(fetched.path.clone(), self.converters.as_ref())
            .await?;
        let integrity = digest_file(&outcome.final_path)?;

        let path = paths.relativize(&outcome.final_path);

        Ok(LockRecord {
            name: content.name.clone(),
            url: content.url.clone(),
            path,
            catalog_url: content.catalog_url.clone(),
            catalog_resource_id: content.catalog_resource_id.clone(),
            etag: fetched.etag,
            last_modified: fetched.last_modified,
            last_downloaded: Utc::now(),
            integrity,
            post_processes: content.post_processes.clone(),
            headers: content.headers.clone(),
        })
    }

    /// Merges installed items into both stores and writes both documents once.
    fn commit(&mut self, installed: Vec<(Content, LockRecord)>) -> Result<()> {
        if installed.is_empty() {
            return Ok(());
        }
        let (contents, records): (Vec<_>, Vec<_>) = installed.into_iter().unzip();
        self.manifest.upsert_many(contents);
        self.lock.upsert_many(records);
        self.save()
    }

    fn save(&self) -> Result<()> {
        self.manifest.save()?;
        self.lock.save()
    }

    // ========================================================================
    // Uninstall / Clean
    // ========================================================================

    /// Removes the content, its lock record and `data_files/<name>/`.
    pub fn uninstall(&mut self, name: &str) -> Result<()> {
        let content = self.manifest.remove(name).ok();
        let record = self.lock.remove(name).ok();
        if content.is_none() && record.is_none() {
            return Err(DimError::NotFound(name.to_string()));
        }
        if content.is_none() {
            warn!("'{}' was not in {}", name, self.manifest.path().display());
        }

        if let Some(record) = &record {
            let file = self.paths.resolve(&record.path);
            if file.is_file() {
                std::fs::remove_file(&file).map_err(|e| DimError::io(&file, e))?;
                info!("Removed {}", file.display());
            }
        }

        if validate_name(name).is_ok() {
            let dir = self.paths.install_dir(name);
            if dir.is_dir() {
                std::fs::remove_dir_all(&dir).map_err(|e| DimError::io(&dir, e))?;
                debug!("Removed {}", dir.display());
            }
        }

        self.save()
    }

    /// Empties both documents and recreates an empty `data_files/`.
    pub fn clean(&mut self) -> Result<()> {
        self.manifest.clear();
        self.lock.clear();
        self.save()?;

        let dir = self.paths.data_files_dir();
        if dir.exists() {
            std::fs::remove_dir_all(&dir).map_err(|e| DimError::io(&dir, e))?;
        }
        self.paths.ensure_install_root()?;
        info!("Cleaned {}", self.paths.root().display());
        Ok(())
    }
}
