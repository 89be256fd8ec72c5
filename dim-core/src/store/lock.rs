//! Lock document (`dim-lock.json`): what was installed and with what provenance.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;

use super::{Document, Record};

/// Version tag written to `lockFileVersion`.
pub const LOCK_FILE_VERSION: &str = "1.1";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LockRecord {
    pub name: String,
    pub url: String,
    /// Artifact path relative to the project root, after post-processing.
    pub path: PathBuf,
    #[serde(default)]
    pub catalog_url: Option<String>,
    #[serde(default)]
    pub catalog_resource_id: Option<String>,
    #[serde(rename = "eTag", default)]
    pub etag: Option<String>,
    #[serde(default)]
    pub last_modified: Option<DateTime<Utc>>,
    pub last_downloaded: DateTime<Utc>,
    /// Digest of the file at `path` right after the pipeline completed.
    pub integrity: String,
    #[serde(default)]
    pub post_processes: Vec<String>,
    #[serde(default)]
    pub headers: BTreeMap<String, String>,
}

impl Record for LockRecord {
    fn name(&self) -> &str {
        &self.name
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LockDocument {
    #[serde(default, alias = "lockfileVersion")]
    pub lock_file_version: String,
    #[serde(default)]
    pub contents: Vec<LockRecord>,
}

impl Document for LockDocument {
    type Record = LockRecord;

    const KIND: &'static str = "lock";
    const VERSION: &'static str = LOCK_FILE_VERSION;

    fn new(contents: Vec<LockRecord>) -> Self {
        Self {
            lock_file_version: LOCK_FILE_VERSION.to_string(),
            contents,
        }
    }

    fn version(&self) -> &str {
        &self.lock_file_version
    }

    fn into_records(self) -> Vec<LockRecord> {
        self.contents
    }
}
