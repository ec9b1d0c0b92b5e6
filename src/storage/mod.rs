//! Dump Storage Backends
//!
//! Uniform put/get of opaque blobs addressed by a relative, `/`-separated
//! path, plus the layout rules that turn a table name into a Dump Unit.

mod local;
mod memory;
#[cfg(feature = "aws")]
mod s3;

pub use local::{LocalStorage, LocalStorageConfig};
pub use memory::MemoryStorage;
#[cfg(feature = "aws")]
pub use s3::{S3Config, S3Storage};

use crate::error::{Error, Result};
use async_trait::async_trait;
use bytes::Bytes;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::sync::Arc;

// =============================================================================
// Constants
// =============================================================================

/// Name of the schema record inside a Dump Unit
pub const SCHEMA_FILE: &str = "schema.json";

/// Directory holding the page files of a Dump Unit
pub const DATA_DIR: &str = "data";

/// Extension of every page file
const PAGE_EXTENSION: &str = ".json";

// =============================================================================
// DumpStorage Trait
// =============================================================================

/// Trait for the blob store a dump is written to and read from
///
/// Paths are relative to the storage root. Directories are implicit: a
/// directory exists as long as some blob lives underneath it.
#[async_trait]
pub trait DumpStorage: Send + Sync {
    /// Human readable location of the storage root, for log lines
    fn location(&self) -> String;

    /// Store a blob, replacing any previous content
    async fn put(&self, path: &str, data: Bytes) -> Result<()>;

    /// Read a blob
    async fn get(&self, path: &str) -> Result<Option<Bytes>>;

    /// List the immediate children (files and directories) of `dir`, sorted
    ///
    /// An empty `dir` lists the storage root. A missing directory is empty.
    async fn list(&self, dir: &str) -> Result<Vec<String>>;

    /// Remove `dir` and everything underneath it
    async fn remove_all(&self, dir: &str) -> Result<()>;

    /// Check that the storage root is reachable and writable
    async fn health_check(&self) -> Result<bool>;
}

/// Type alias for shared dump storage
pub type DumpStorageRef = Arc<dyn DumpStorage>;

// =============================================================================
// Dump Unit Layout
// =============================================================================

/// Paths of one table's Dump Unit: `<table>/schema.json` and
/// `<table>/data/NNNN.json`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DumpUnit {
    table: String,
}

impl DumpUnit {
    pub fn new(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
        }
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    /// Directory of the whole unit
    pub fn dir(&self) -> &str {
        &self.table
    }

    pub fn schema_path(&self) -> String {
        format!("{}/{}", self.table, SCHEMA_FILE)
    }

    pub fn data_dir(&self) -> String {
        format!("{}/{}", self.table, DATA_DIR)
    }

    /// Path of page `number` (1-based, 4-digit zero padded)
    pub fn page_path(&self, number: u32) -> String {
        format!("{}/{}/{}", self.table, DATA_DIR, page_file_name(number))
    }

    /// Page file names under `data/`, in replay order
    pub async fn pages(&self, storage: &dyn DumpStorage) -> Result<Vec<String>> {
        let mut pages: Vec<(u32, String)> = storage
            .list(&self.data_dir())
            .await?
            .into_iter()
            .filter_map(|name| page_number(&name).map(|n| (n, name)))
            .collect();
        pages.sort();
        Ok(pages.into_iter().map(|(_, name)| name).collect())
    }
}

/// File name of page `number`
pub fn page_file_name(number: u32) -> String {
    format!("{:04}{}", number, PAGE_EXTENSION)
}

/// Parse the page number out of a page file name
pub fn page_number(file_name: &str) -> Option<u32> {
    file_name
        .strip_suffix(PAGE_EXTENSION)
        .filter(|stem| !stem.is_empty() && stem.bytes().all(|b| b.is_ascii_digit()))
        .and_then(|stem| stem.parse().ok())
}

// =============================================================================
// JSON Helpers
// =============================================================================

/// Serialize `value` pretty-printed (2-space indent) and store it at `path`
pub async fn put_json<T: Serialize + ?Sized>(
    storage: &dyn DumpStorage,
    path: &str,
    value: &T,
) -> Result<()> {
    let body = serde_json::to_vec_pretty(value)?;
    storage.put(path, Bytes::from(body)).await
}

/// Load and deserialize the blob at `path`, failing if it is missing
pub async fn get_json<T: DeserializeOwned>(storage: &dyn DumpStorage, path: &str) -> Result<T> {
    let body = storage.get(path).await?.ok_or_else(|| Error::DumpNotFound {
        path: format!("{}/{}", storage.location(), path),
    })?;
    Ok(serde_json::from_slice(&body)?)
}

/// Join two relative storage paths
pub(crate) fn join_path(dir: &str, name: &str) -> String {
    let dir = dir.trim_matches('/');
    if dir.is_empty() {
        name.trim_start_matches('/').to_string()
    } else {
        format!("{}/{}", dir, name.trim_start_matches('/'))
    }
}
