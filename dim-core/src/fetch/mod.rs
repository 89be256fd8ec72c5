//! Fetcher: one GET per content, body written to `data_files/<name>/<basename>`.
//!
//! No retries. A non-2xx status is a [`DimError::Transport`] carrying the code.

mod client;

pub use client::{HttpClient, HttpResponse, ReqwestClient};

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::de::DeserializeOwned;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};
use url::Url;

use crate::error::{DimError, Result};
use crate::paths::ProjectPaths;

/// Result of a successful fetch.
#[derive(Debug, Clone)]
pub struct FetchedFile {
    /// Absolute location of the written body.
    pub path: PathBuf,
    /// ETag with surrounding quotes removed.
    pub etag: Option<String>,
    pub last_modified: Option<DateTime<Utc>>,
    pub bytes: u64,
}

#[derive(Clone)]
pub struct Fetcher {
    client: Arc<dyn HttpClient>,
}

impl Fetcher {
    pub fn new(client: Arc<dyn HttpClient>) -> Self {
        Self { client }
    }

    /// Downloads `url` to `<root>/data_files/<name>/<basename>`, overwriting any
    /// existing file. The directory is created first.
    pub async fn fetch_into(
        &self,
        root: &Path,
        url: &Url,
        name: &str,
        headers: &BTreeMap<String, String>,
    ) -> Result<FetchedFile> {
        let path = root.join(ProjectPaths::install_path(name, url));
        info!("Downloading {} to {}", url, path.display());

        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| DimError::io(parent, e))?;
        }

        let response = self.get_success(url, headers).await?;

        tokio::fs::write(&path, &response.body)
            .await
            .map_err(|e| DimError::io(&path, e))?;

        let etag = response.header("etag").map(unquote_etag);
        let last_modified = response.header("last-modified").and_then(parse_http_date);
        debug!("etag={:?} last-modified={:?}", etag, last_modified);

        Ok(FetchedFile {
            path,
            etag,
            last_modified,
            bytes: response.body.len() as u64,
        })
    }

    /// Fetches and deserializes a JSON document, used for remote manifests.
    pub async fn fetch_document<T: DeserializeOwned>(&self, url: &Url) -> Result<T> {
        let response = self.get_success(url, &BTreeMap::new()).await?;
        serde_json::from_slice(&response.body).map_err(|source| DimError::RemoteManifest {
            url: url.to_string(),
            source,
        })
    }

    async fn get_success(
        &self,
        url: &Url,
        headers: &BTreeMap<String, String>,
    ) -> Result<HttpResponse> {
        let response = self.client.get(url, headers).await?;
        if !response.is_success() {
            return Err(DimError::Transport {
                url: url.to_string(),
                status: response.status,
            });
        }
        Ok(response)
    }
}

// ============================================================================
// Header helpers
// ============================================================================

/// Strips one pair of surrounding double quotes: `"abc"` -> `abc`.
pub fn unquote_etag(raw: &str) -> String {
    raw.strip_prefix('"')
        .and_then(|s| s.strip_suffix('"'))
        .unwrap_or(raw)
        .to_string()
}

/// Parses an HTTP date. A weekday that disagrees with the date is ignored.
pub fn parse_http_date(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(date) = DateTime::parse_from_rfc2822(raw) {
        return Some(date.with_timezone(&Utc));
    }

    let without_weekday = raw.split_once(',').map(|(_, rest)| rest).unwrap_or(raw).trim();
    NaiveDateTime::parse_from_str(without_weekday, "%d %b %Y %H:%M:%S GMT")
        .ok()
        .map(|naive| naive.and_utc())
}

/// Parses a `Key: Value` header argument. The value keeps inner colons.
pub fn parse_header(raw: &str) -> Option<(String, String)> {
    let (key, value) = raw.split_once(':')?;
    let key = key.trim();
    if key.is_empty() {
        return None;
    }
    Some((key.to_string(), value.trim_start().to_string()))
}
