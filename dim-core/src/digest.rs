//! Content digest used for drift detection.
//!
//! SHA-256 rendered as lowercase hex. The value is only compared against
//! itself across runs; it is not a security boundary.

use sha2::{Digest, Sha256};
use std::fs::File;
use std::io;
use std::path::Path;

use crate::error::{DimError, Result};

/// Digest of an in-memory byte slice.
pub fn digest_bytes(bytes: &[u8]) -> String {
    format_hex(&Sha256::digest(bytes))
}

/// Streams the file through the hasher.
pub fn digest_file(path: &Path) -> Result<String> {
    let mut file = File::open(path).map_err(|e| DimError::io(path, e))?;
    let mut hasher = Sha256::new();
    io::copy(&mut file, &mut hasher).map_err(|e| DimError::io(path, e))?;
    Ok(format_hex(&hasher.finalize()))
}

fn format_hex(hash: &[u8]) -> String {
    hash.iter().map(|b| format!("{:02x}", b)).collect()
}
