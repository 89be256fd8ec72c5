//! Test doubles shared by unit tests.

use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::Barrier;
use url::Url;

use crate::error::Result;
use crate::fetch::{HttpClient, HttpResponse};
use crate::postprocess::{CommandError, Converters, TargetEncoding};

impl HttpResponse {
    pub fn ok(body: &[u8]) -> Self {
        Self {
            status: 200,
            headers: BTreeMap::new(),
            body: body.to_vec(),
        }
    }

    pub fn status(status: u16) -> Self {
        Self {
            status,
            ..Self::default()
        }
    }

    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        self.headers
            .insert(name.to_ascii_lowercase(), value.to_string());
        self
    }
}

// ============================================================================
// HTTP
// ============================================================================

/// Canned responses keyed by URL. Unknown URLs answer 404.
#[derive(Default)]
pub struct FakeClient {
    responses: Mutex<HashMap<String, HttpResponse>>,
    requests: Mutex<Vec<(String, BTreeMap<String, String>)>>,
}

impl FakeClient {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn respond(&self, url: &str, response: HttpResponse) {
        self.responses
            .lock()
            .unwrap()
            .insert(url.to_string(), response);
    }

    pub fn requests(&self) -> Vec<(String, BTreeMap<String, String>)> {
        self.requests.lock().unwrap().clone()
    }

    pub fn requested_urls(&self) -> Vec<String> {
        self.requests().into_iter().map(|(url, _)| url).collect()
    }
}

#[async_trait]
impl HttpClient for FakeClient {
    async fn get(&self, url: &Url, headers: &BTreeMap<String, String>) -> Result<HttpResponse> {
        self.requests
            .lock()
            .unwrap()
            .push((url.to_string(), headers.clone()));
        Ok(self
            .responses
            .lock()
            .unwrap()
            .get(url.as_str())
            .cloned()
            .unwrap_or_else(|| HttpResponse::status(404)))
    }
}

/// Holds every request until `parties` requests are waiting at once, then
/// answers from `inner`. A request left alone past the timeout gets a 408.
pub struct GatedClient {
    inner: Arc<FakeClient>,
    gate: Barrier,
}

impl GatedClient {
    pub const TIMEOUT: Duration = Duration::from_secs(2);

    pub fn new(inner: Arc<FakeClient>, parties: usize) -> Arc<Self> {
        Arc::new(Self {
            inner,
            gate: Barrier::new(parties),
        })
    }
}

#[async_trait]
impl HttpClient for GatedClient {
    async fn get(&self, url: &Url, headers: &BTreeMap<String, String>) -> Result<HttpResponse> {
        match tokio::time::timeout(Self::TIMEOUT, self.gate.wait()).await {
            Ok(_) => self.inner.get(url, headers).await,
            Err(_) => Ok(HttpResponse::status(408)),
        }
    }
}

// ============================================================================
// Converters
// ============================================================================

/// Records each call as a line of text. Spreadsheet and CSV conversions write
/// a small sibling file so later steps and the digest have something to read.
/// `cmd` succeeds only for `echo`.
#[derive(Default)]
pub struct RecordingConverters {
    calls: Mutex<Vec<String>>,
    fail_on: Option<String>,
}

impl RecordingConverters {
    pub fn failing(token: &str) -> Self {
        Self {
            fail_on: Some(token.to_string()),
            ..Self::default()
        }
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    fn record(&self, token: &str, line: String) -> anyhow::Result<()> {
        self.calls.lock().unwrap().push(line);
        if self.fail_on.as_deref() == Some(token) {
            anyhow::bail!("{} failed", token);
        }
        Ok(())
    }

    fn sibling(path: &Path, extension: &str) -> anyhow::Result<PathBuf> {
        let out = path.with_extension(extension);
        std::fs::write(&out, format!("{} from {}", extension, path.display()))?;
        Ok(out)
    }
}

#[async_trait]
impl Converters for RecordingConverters {
    async fn extract_archive(&self, path: &Path, dest_dir: &Path) -> anyhow::Result<()> {
        self.record(
            "unzip",
            format!("unzip {} -> {}", path.display(), dest_dir.display()),
        )
    }

    async fn spreadsheet_to_csv(&self, path: &Path) -> anyhow::Result<PathBuf> {
        self.record("xlsx-to-csv", format!("xlsx-to-csv {}", path.display()))?;
        Self::sibling(path, "csv")
    }

    async fn csv_to_json(&self, path: &Path) -> anyhow::Result<PathBuf> {
        self.record("csv-to-json", format!("csv-to-json {}", path.display()))?;
        Self::sibling(path, "json")
    }

    async fn convert_encoding(&self, path: &Path, target: TargetEncoding) -> anyhow::Result<()> {
        self.record("encode", format!("encode {} {}", target, path.display()))
    }

    async fn run_shell_command(
        &self,
        tokens: &[String],
        path: &Path,
    ) -> std::result::Result<String, CommandError> {
        self.calls
            .lock()
            .unwrap()
            .push(format!("cmd {} {}", tokens.join(" "), path.display()));
        match tokens.first().map(String::as_str) {
            None => Err(CommandError::Empty),
            Some("echo") => Ok(format!("{} {}", tokens[1..].join(" "), path.display())),
            Some(program) => Err(CommandError::NotFound(program.to_string())),
        }
    }
}
