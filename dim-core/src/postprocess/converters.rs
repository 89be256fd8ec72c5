//! Byte-level collaborators called by the pipeline.
//!
//! The pipeline only decides order, arguments and failure policy; the actual
//! file transformations live behind [`Converters`] so the engine can be tested
//! without touching archives or spreadsheets.

use anyhow::{Context, Result};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use thiserror::Error;
use tokio::process::Command;

use super::encoding::TargetEncoding;
use super::{archive, csv_json, encoding, spreadsheet};

/// Runtime failure of a `cmd` step. Logged by the pipeline, never fatal.
#[derive(Debug, Error)]
pub enum CommandError {
    #[error("no command given")]
    Empty,
    #[error("command not found: {0}")]
    NotFound(String),
    #[error("failed to run {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },
    #[error("{program} failed with {status}: {stderr}")]
    Failed {
        program: String,
        status: std::process::ExitStatus,
        stderr: String,
    },
}

#[async_trait]
pub trait Converters: Send + Sync {
    /// Unpacks the archive at `path` into `dest_dir`.
    async fn extract_archive(&self, path: &Path, dest_dir: &Path) -> Result<()>;

    /// Writes the first sheet as CSV and returns the CSV path.
    async fn spreadsheet_to_csv(&self, path: &Path) -> Result<PathBuf>;

    /// Writes a JSON rendition of the CSV and returns the JSON path.
    async fn csv_to_json(&self, path: &Path) -> Result<PathBuf>;

    /// Re-encodes the file in place.
    async fn convert_encoding(&self, path: &Path, target: TargetEncoding) -> Result<()>;

    /// Runs `tokens[0]` with `tokens[1..]` and `path` as arguments; returns stdout.
    async fn run_shell_command(
        &self,
        tokens: &[String],
        path: &Path,
    ) -> std::result::Result<String, CommandError>;
}

// ============================================================================
// Native implementation
// ============================================================================

/// Production converters: blocking file work on the blocking pool, commands
/// through `tokio::process`.
#[derive(Debug, Clone, Copy, Default)]
pub struct NativeConverters;

async fn blocking<T, F>(f: F) -> Result<T>
where
    F: FnOnce() -> Result<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .context("Post-process task panicked")?
}

#[async_trait]
impl Converters for NativeConverters {
    async fn extract_archive(&self, path: &Path, dest_dir: &Path) -> Result<()> {
        let (path, dest_dir) = (path.to_path_buf(), dest_dir.to_path_buf());
        blocking(move || archive::extract_archive(&path, &dest_dir)).await
    }

    async fn spreadsheet_to_csv(&self, path: &Path) -> Result<PathBuf> {
        let path = path.to_path_buf();
        blocking(move || spreadsheet::spreadsheet_to_csv(&path)).await
    }

    async fn csv_to_json(&self, path: &Path) -> Result<PathBuf> {
        let path = path.to_path_buf();
        blocking(move || csv_json::csv_to_json(&path)).await
    }

    async fn convert_encoding(&self, path: &Path, target: TargetEncoding) -> Result<()> {
        let path = path.to_path_buf();
        blocking(move || encoding::convert_file(&path, target)).await
    }

    async fn run_shell_command(
        &self,
        tokens: &[String],
        path: &Path,
    ) -> std::result::Result<String, CommandError> {
        let (program, args) = tokens.split_first().ok_or(CommandError::Empty)?;

        let output = Command::new(program)
            .args(args)
            .arg(path)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .await
            .map_err(|source| match source.kind() {
                std::io::ErrorKind::NotFound => CommandError::NotFound(program.clone()),
                _ => CommandError::Spawn {
                    program: program.clone(),
                    source,
                },
            })?;

        if !output.status.success() {
            return Err(CommandError::Failed {
                program: program.clone(),
                status: output.status,
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}
