//! Content Store: typed access to the manifest and lock documents.
//!
//! Both documents are JSON files holding a version tag and an ordered list of
//! records keyed by name. A [`Store`] is opened once per command, mutated in
//! memory and flushed with [`Store::save`], which rewrites the whole document
//! atomically (temp file in the same directory, then rename).

mod lock;
mod manifest;

pub use lock::{LockDocument, LockRecord, LOCK_FILE_VERSION};
pub use manifest::{Content, ManifestDocument, MANIFEST_FILE_VERSION};

use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use crate::error::{DimError, Result};

pub type ManifestStore = Store<ManifestDocument>;
pub type LockStore = Store<LockDocument>;

// ============================================================================
// Document traits
// ============================================================================

/// A record identified by its logical name.
pub trait Record: Clone + Serialize + DeserializeOwned + Send + Sync {
    fn name(&self) -> &str;
}

/// A persisted document: a version tag plus an ordered list of records.
pub trait Document: Serialize + DeserializeOwned {
    type Record: Record;

    /// Human-readable kind used in log lines.
    const KIND: &'static str;
    /// Version tag written on save.
    const VERSION: &'static str;

    fn new(records: Vec<Self::Record>) -> Self;
    fn version(&self) -> &str;
    fn into_records(self) -> Vec<Self::Record>;
}

// ============================================================================
// Store
// ============================================================================

#[derive(Debug, Clone)]
pub struct Store<D: Document> {
    path: PathBuf,
    records: Vec<D::Record>,
}

impl<D: Document> Store<D> {
    /// Loads the document at `path`.
    ///
    /// Fails with [`DimError::NotInitialized`] if the file does not exist. Records
    /// sharing a name are collapsed, keeping the last one.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        if !path.exists() {
            return Err(DimError::NotInitialized { path });
        }

        let raw = fs::read_to_string(&path).map_err(|e| DimError::io(&path, e))?;
        let document: D = serde_json::from_str(&raw).map_err(|source| DimError::Document {
            path: path.clone(),
            source,
        })?;

        if document.version() != D::VERSION {
            info!(
                "{} version {:?} differs from current {}, migrating on next save",
                D::KIND,
                document.version(),
                D::VERSION
            );
        }

        let records = dedup_by_name(document.into_records(), D::KIND);
        debug!("Loaded {} {} records from {}", records.len(), D::KIND, path.display());
        Ok(Self { path, records })
    }

    /// Writes an empty document at `path` and returns a handle to it.
    pub fn create(path: impl Into<PathBuf>) -> Result<Self> {
        let store = Self {
            path: path.into(),
            records: Vec::new(),
        };
        store.save()?;
        Ok(store)
    }

    /// Opens the document, creating an empty one if it does not exist yet.
    pub fn open_or_create(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        if path.exists() {
            Self::open(path)
        } else {
            debug!("{} not found at {}, creating", D::KIND, path.display());
            Self::create(path)
        }
    }

    /// An unsaved, empty store that is only written if [`Store::save`] is called.
    pub fn in_memory(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            records: Vec::new(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// All records in insertion order.
    pub fn list(&self) -> &[D::Record] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn get(&self, name: &str) -> Option<&D::Record> {
        self.records.iter().find(|r| r.name() == name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// Replaces the record with the same name in place, else appends.
    /// Returns the replaced record.
    pub fn upsert(&mut self, record: D::Record) -> Option<D::Record> {
        match self.records.iter_mut().find(|r| r.name() == record.name()) {
            Some(slot) => Some(std::mem::replace(slot, record)),
            None => {
                self.records.push(record);
                None
            }
        }
    }

    pub fn upsert_many(&mut self, records: impl IntoIterator<Item = D::Record>) {
        for record in records {
            self.upsert(record);
        }
    }

    pub fn remove(&mut self, name: &str) -> Result<D::Record> {
        let index = self
            .records
            .iter()
            .position(|r| r.name() == name)
            .ok_or_else(|| DimError::NotFound(name.to_string()))?;
        Ok(self.records.remove(index))
    }

    pub fn clear(&mut self) {
        self.records.clear();
    }

    /// Atomically rewrites the whole document with the current version tag.
    pub fn save(&self) -> Result<()> {
        let document = D::new(self.records.clone());
        let json = serde_json::to_string_pretty(&document).map_err(|source| DimError::Document {
            path: self.path.clone(),
            source,
        })?;

        let parent = match self.path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
            _ => PathBuf::from("."),
        };
        fs::create_dir_all(&parent).map_err(|e| DimError::io(&parent, e))?;

        let mut temp =
            tempfile::NamedTempFile::new_in(&parent).map_err(|e| DimError::io(&parent, e))?;
        writeln!(temp, "{}", json).map_err(|e| DimError::io(&self.path, e))?;
        temp.flush().map_err(|e| DimError::io(&self.path, e))?;
        // Temp files are created 0600; keep the document shareable.
        if let Some(permissions) = target_permissions(&self.path) {
            temp.as_file()
                .set_permissions(permissions)
                .map_err(|e| DimError::io(&self.path, e))?;
        }
        temp.persist(&self.path)
            .map_err(|e| DimError::io(&self.path, e.error))?;

        debug!("Saved {} records to {}", self.records.len(), self.path.display());
        Ok(())
    }
}

/// Permissions of the existing document, or `rw-r--r--` for a new one.
fn target_permissions(path: &Path) -> Option<fs::Permissions> {
    match fs::metadata(path) {
        Ok(meta) => Some(meta.permissions()),
        Err(_) => new_document_permissions(),
    }
}

#[cfg(unix)]
fn new_document_permissions() -> Option<fs::Permissions> {
    use std::os::unix::fs::PermissionsExt;
    Some(fs::Permissions::from_mode(0o644))
}

#[cfg(not(unix))]
fn new_document_permissions() -> Option<fs::Permissions> {
    None
}

pub(crate) fn dedup_by_name<R: Record>(records: Vec<R>, kind: &str) -> Vec<R> {
    let mut unique: Vec<R> = Vec::with_capacity(records.len());
    for record in records {
        if let Some(existing) = unique.iter_mut().find(|r| r.name() == record.name()) {
            warn!("Duplicate {} record '{}', keeping the last one", kind, record.name());
            *existing = record;
        } else {
            unique.push(record);
        }
    }
    unique
}
