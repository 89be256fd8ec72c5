//! Project path management.
//!
//! A dim project is a directory holding:
//!
//! - `dim.json` - the manifest (desired state)
//! - `dim-lock.json` - the lock (observed state)
//! - `data_files/<name>/<basename>` - installed artifacts
//!
//! Lock records store paths relative to the project root so a project can be
//! moved or checked into version control.

use percent_encoding::percent_decode_str;
use std::path::{Component, Path, PathBuf};
use url::Url;

use crate::error::{DimError, Result};

/// Manifest file name.
pub const MANIFEST_FILE: &str = "dim.json";

/// Lock file name.
pub const LOCK_FILE: &str = "dim-lock.json";

/// Directory holding installed artifacts.
pub const DATA_FILES_DIR: &str = "data_files";

/// File name used when the URL path has no usable final segment.
const FALLBACK_BASENAME: &str = "index";

// ============================================================================
// Project Paths
// ============================================================================

#[derive(Debug, Clone)]
pub struct ProjectPaths {
    root: PathBuf,
}

impl ProjectPaths {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Project rooted at the current working directory.
    pub fn current_dir() -> Result<Self> {
        let cwd = std::env::current_dir().map_err(|e| DimError::io(".", e))?;
        Ok(Self::new(cwd))
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Path: `<root>/dim.json`
    pub fn manifest_path(&self) -> PathBuf {
        self.root.join(MANIFEST_FILE)
    }

    /// Path: `<root>/dim-lock.json`
    pub fn lock_path(&self) -> PathBuf {
        self.root.join(LOCK_FILE)
    }

    /// Path: `<root>/data_files/`
    pub fn data_files_dir(&self) -> PathBuf {
        self.root.join(DATA_FILES_DIR)
    }

    /// Path: `<root>/data_files/<name>/`
    pub fn install_dir(&self, name: &str) -> PathBuf {
        self.data_files_dir().join(name)
    }

    /// Relative artifact path for a content: `data_files/<name>/<basename(url.path)>`.
    pub fn install_path(name: &str, url: &Url) -> PathBuf {
        Path::new(DATA_FILES_DIR).join(name).join(url_basename(url))
    }

    /// Resolves a path stored in a lock record against the project root.
    pub fn resolve(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.root.join(path)
        }
    }

    /// Strips the project root from an absolute path when possible.
    pub fn relativize(&self, path: &Path) -> PathBuf {
        path.strip_prefix(&self.root)
            .map(Path::to_path_buf)
            .unwrap_or_else(|_| path.to_path_buf())
    }

    /// Creates `data_files/` if missing. Run once per engine invocation.
    pub fn ensure_install_root(&self) -> Result<()> {
        let dir = self.data_files_dir();
        std::fs::create_dir_all(&dir).map_err(|e| DimError::io(&dir, e))
    }
}

// ============================================================================
// Name and URL helpers
// ============================================================================

/// Rejects names that would escape `data_files/` or collapse into it.
pub fn validate_name(name: &str) -> Result<()> {
    let mut components = Path::new(name).components();
    let single_normal = matches!(
        (components.next(), components.next()),
        (Some(Component::Normal(_)), None)
    );
    if name.trim().is_empty() || !single_normal || name.contains(['/', '\\']) {
        return Err(DimError::InvalidName(name.to_string()));
    }
    Ok(())
}

/// Percent-decoded final segment of the URL path.
pub fn url_basename(url: &Url) -> String {
    let segment = url
        .path_segments()
        .and_then(|mut segments| segments.next_back())
        .unwrap_or_default();

    let decoded = percent_decode_str(segment).decode_utf8_lossy();
    match decoded.as_ref() {
        "" | "." | ".." => FALLBACK_BASENAME.to_string(),
        s if s.contains(['/', '\\']) => FALLBACK_BASENAME.to_string(),
        s => s.to_string(),
    }
}
