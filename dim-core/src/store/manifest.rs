//! Manifest document (`dim.json`): the desired state.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::{Document, LockRecord, Record};

/// Version tag written to `fileVersion`.
pub const MANIFEST_FILE_VERSION: &str = "1.1";

/// One desired resource.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Content {
    pub name: String,
    pub url: String,
    #[serde(default)]
    pub catalog_url: Option<String>,
    #[serde(default)]
    pub catalog_resource_id: Option<String>,
    /// Pipeline entries, e.g. `"unzip"` or `"encode utf-8"`, applied in order.
    #[serde(default)]
    pub post_processes: Vec<String>,
    /// Extra request headers sent with the GET.
    #[serde(default)]
    pub headers: BTreeMap<String, String>,
}

impl Content {
    pub fn new(name: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            url: url.into(),
            catalog_url: None,
            catalog_resource_id: None,
            post_processes: Vec::new(),
            headers: BTreeMap::new(),
        }
    }

    pub fn with_post_processes(mut self, post_processes: Vec<String>) -> Self {
        self.post_processes = post_processes;
        self
    }

    pub fn with_headers(mut self, headers: BTreeMap<String, String>) -> Self {
        self.headers = headers;
        self
    }
}

impl Record for Content {
    fn name(&self) -> &str {
        &self.name
    }
}

/// The Content a lock record was installed from.
impl From<&LockRecord> for Content {
    fn from(record: &LockRecord) -> Self {
        Self {
            name: record.name.clone(),
            url: record.url.clone(),
            catalog_url: record.catalog_url.clone(),
            catalog_resource_id: record.catalog_resource_id.clone(),
            post_processes: record.post_processes.clone(),
            headers: record.headers.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ManifestDocument {
    #[serde(default)]
    pub file_version: String,
    #[serde(default)]
    pub contents: Vec<Content>,
}

impl Document for ManifestDocument {
    type Record = Content;

    const KIND: &'static str = "manifest";
    const VERSION: &'static str = MANIFEST_FILE_VERSION;

    fn new(contents: Vec<Content>) -> Self {
        Self {
            file_version: MANIFEST_FILE_VERSION.to_string(),
            contents,
        }
    }

    fn version(&self) -> &str {
        &self.file_version
    }

    fn into_records(self) -> Vec<Content> {
        self.contents
    }
}
