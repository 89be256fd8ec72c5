//! Archive extraction for the `unzip` step.
//!
//! Entries are written next to the archive. Absolute paths, `..` components,
//! symlinks and hardlinks are skipped so nothing lands outside the directory.

use anyhow::{Context, Result};
use std::fs::{self, File};
use std::io::{self, BufReader, Read};
use std::path::{Component, Path, PathBuf};
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArchiveFormat {
    Zip,
    TarGz,
    TarXz,
}

impl ArchiveFormat {
    /// Guesses the format from the file name, defaulting to zip.
    pub fn from_path(path: &Path) -> Self {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_ascii_lowercase())
            .unwrap_or_default();

        if name.ends_with(".tar.gz") || name.ends_with(".tgz") {
            Self::TarGz
        } else if name.ends_with(".tar.xz") || name.ends_with(".txz") {
            Self::TarXz
        } else {
            Self::Zip
        }
    }
}

// ============================================================================
// Extraction
// ============================================================================

/// Extracts `archive_path` into `dest_dir`, creating it if needed.
pub fn extract_archive(archive_path: &Path, dest_dir: &Path) -> Result<()> {
    let format = ArchiveFormat::from_path(archive_path);
    info!(
        "Extracting {:?} archive {} to {}",
        format,
        archive_path.display(),
        dest_dir.display()
    );

    fs::create_dir_all(dest_dir)
        .with_context(|| format!("Failed to create directory: {}", dest_dir.display()))?;

    let file = File::open(archive_path)
        .with_context(|| format!("Failed to open archive: {}", archive_path.display()))?;

    let reader = BufReader::new(file);
    let result = match format {
        ArchiveFormat::Zip => extract_zip(reader, dest_dir),
        ArchiveFormat::TarGz => extract_tar(flate2::read::GzDecoder::new(reader), dest_dir),
        ArchiveFormat::TarXz => extract_tar(xz2::read::XzDecoder::new(reader), dest_dir),
    };
    result.with_context(|| format!("Failed to extract {}", archive_path.display()))
}

fn extract_zip(reader: BufReader<File>, dest_dir: &Path) -> Result<()> {
    let mut archive = zip::ZipArchive::new(reader).context("Not a readable zip archive")?;

    for i in 0..archive.len() {
        let mut entry = archive.by_index(i)?;
        let Some(relative) = entry.enclosed_name() else {
            warn!("Skipping unsafe path in zip: {}", entry.name());
            continue;
        };
        if entry.is_symlink() {
            warn!("Skipping symlink in zip: {}", relative.display());
            continue;
        }

        let dest_path = dest_dir.join(&relative);
        if entry.is_dir() {
            fs::create_dir_all(&dest_path)?;
        } else {
            write_entry(&mut entry, &dest_path)?;
        }
    }

    debug!("ZIP extraction complete");
    Ok(())
}

fn extract_tar<R: Read>(reader: R, dest_dir: &Path) -> Result<()> {
    let mut archive = tar::Archive::new(reader);

    for entry in archive.entries()? {
        let mut entry = entry?;
        let entry_type = entry.header().entry_type();
        if entry_type.is_symlink() || entry_type.is_hard_link() {
            warn!("Skipping link entry in tar archive");
            continue;
        }

        let path = entry.path()?.into_owned();
        let Some(relative) = enclosed(&path) else {
            warn!("Skipping unsafe path in tar: {}", path.display());
            continue;
        };

        let dest_path = dest_dir.join(relative);
        if entry_type.is_dir() {
            fs::create_dir_all(&dest_path)?;
        } else if entry_type.is_file() {
            write_entry(&mut entry, &dest_path)?;
        }
    }

    debug!("TAR extraction complete");
    Ok(())
}

/// Normal components only: no root, prefix or `..`.
fn enclosed(path: &Path) -> Option<PathBuf> {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::Normal(part) => out.push(part),
            Component::CurDir => {}
            _ => return None,
        }
    }
    (!out.as_os_str().is_empty()).then_some(out)
}

fn write_entry(reader: &mut impl Read, dest_path: &Path) -> Result<()> {
    if let Some(parent) = dest_path.parent() {
        fs::create_dir_all(parent)?;
    }
    let mut outfile = File::create(dest_path)
        .with_context(|| format!("Failed to create: {}", dest_path.display()))?;
    io::copy(reader, &mut outfile)?;
    Ok(())
}
