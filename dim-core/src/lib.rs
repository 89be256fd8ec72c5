//! dim Core Library
//!
//! Manages local copies of remotely hosted open-data files under a declarative
//! manifest (`dim.json`), reconciled against a lock (`dim-lock.json`) the way a
//! package manager reconciles dependencies. It includes:
//!
//! - Content store for the manifest and lock documents
//! - Fetcher with ETag / Last-Modified capture
//! - Content digest for drift detection
//! - Post-process pipeline (unzip, xlsx-to-csv, csv-to-json, encode, cmd)
//! - Install, update, uninstall and verify engine

pub mod config;
pub mod digest;
pub mod engine;
pub mod error;
pub mod fetch;
pub mod paths;
pub mod postprocess;
pub mod store;

#[cfg(test)]
mod testing;

// Re-exports for convenience
pub use config::Settings;
pub use engine::{
    BatchOptions, BatchReport, Engine, ManifestSource, VerifyEntry, VerifyMode, VerifyReport,
    VerifyStatus,
};
pub use error::{DimError, ItemFailure, Result};
pub use fetch::{parse_header, Fetcher, HttpClient, HttpResponse, ReqwestClient};
pub use paths::ProjectPaths;
pub use postprocess::{Converters, NativeConverters, Pipeline, PostProcessKind};
pub use store::{Content, LockRecord, LockStore, ManifestStore};

/// Tool name.
pub const NAME: &str = "dim";

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
