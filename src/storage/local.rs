//! Local Disk Dump Storage
//!
//! Directory-tree storage rooted at the configured dump path.

use crate::error::{Error, Result};
use crate::storage::DumpStorage;
use async_trait::async_trait;
use bytes::Bytes;
use std::io::ErrorKind;
use std::path::{Component, Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::debug;

// =============================================================================
// Local Storage Configuration
// =============================================================================

/// Configuration for local storage
#[derive(Debug, Clone)]
pub struct LocalStorageConfig {
    /// Root directory of the dump
    pub root_path: PathBuf,
    /// Create the root if it does not exist
    pub create_root: bool,
    /// Whether to sync writes to disk
    pub sync_writes: bool,
}

impl Default for LocalStorageConfig {
    fn default() -> Self {
        Self {
            root_path: PathBuf::from("dump"),
            create_root: false,
            sync_writes: false,
        }
    }
}

// =============================================================================
// Local Storage
// =============================================================================

/// Dump storage backed by a local directory tree
#[derive(Debug)]
pub struct LocalStorage {
    root_path: PathBuf,
    sync_writes: bool,
}

impl LocalStorage {
    /// Open storage for writing a backup, creating the root if needed
    pub async fn create(root_path: impl Into<PathBuf>) -> Result<Self> {
        Self::with_config(LocalStorageConfig {
            root_path: root_path.into(),
            create_root: true,
            ..Default::default()
        })
        .await
    }

    /// Open storage for reading a restore source; the root must exist
    pub async fn open(root_path: impl Into<PathBuf>) -> Result<Self> {
        Self::with_config(LocalStorageConfig {
            root_path: root_path.into(),
            ..Default::default()
        })
        .await
    }

    /// Open storage with full config
    pub async fn with_config(config: LocalStorageConfig) -> Result<Self> {
        if config.create_root {
            fs::create_dir_all(&config.root_path).await?;
        }

        match fs::metadata(&config.root_path).await {
            Ok(meta) if meta.is_dir() => {}
            Ok(_) => {
                return Err(Error::Configuration(format!(
                    "Dump path {} is not a directory",
                    config.root_path.display()
                )))
            }
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(Error::Configuration(format!(
                    "Cannot find {} directory containing dump files",
                    config.root_path.display()
                )))
            }
            Err(e) => return Err(e.into()),
        }

        Ok(Self {
            root_path: config.root_path,
            sync_writes: config.sync_writes,
        })
    }

    pub fn root_path(&self) -> &Path {
        &self.root_path
    }

    /// Map a relative storage path to a file system path under the root
    fn resolve(&self, path: &str) -> Result<PathBuf> {
        let relative = Path::new(path.trim_start_matches('/'));
        if relative
            .components()
            .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir))
        {
            return Err(Error::Storage {
                path: path.to_string(),
                reason: "path escapes the dump root".into(),
            });
        }
        Ok(self.root_path.join(relative))
    }
}

#[async_trait]
impl DumpStorage for LocalStorage {
    fn location(&self) -> String {
        self.root_path.display().to_string()
    }

    async fn put(&self, path: &str, data: Bytes) -> Result<()> {
        let file_path = self.resolve(path)?;
        if let Some(parent) = file_path.parent() {
            fs::create_dir_all(parent).await?;
        }

        debug!("Writing {}", file_path.display());
        let mut file = fs::File::create(&file_path).await?;
        file.write_all(&data).await?;
        if self.sync_writes {
            file.sync_all().await?;
        }
        file.flush().await?;

        Ok(())
    }

    async fn get(&self, path: &str) -> Result<Option<Bytes>> {
        let file_path = self.resolve(path)?;
        match fs::read(&file_path).await {
            Ok(data) => Ok(Some(Bytes::from(data))),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn list(&self, dir: &str) -> Result<Vec<String>> {
        let dir_path = self.resolve(dir)?;
        let mut entries = match fs::read_dir(&dir_path).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut names = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            if let Some(name) = entry.file_name().to_str() {
                names.push(name.to_string());
            }
        }
        names.sort();

        Ok(names)
    }

    async fn remove_all(&self, dir: &str) -> Result<()> {
        let dir_path = self.resolve(dir)?;
        if dir_path == self.root_path {
            return Err(Error::Storage {
                path: dir.to_string(),
                reason: "refusing to remove the dump root".into(),
            });
        }

        match fs::remove_dir_all(&dir_path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    async fn health_check(&self) -> Result<bool> {
        // Check that root directory exists and is writable
        let test_path = self.root_path.join(".health_check");
        match fs::write(&test_path, b"ok").await {
            Ok(_) => {
                let _ = fs::remove_file(&test_path).await;
                Ok(true)
            }
            Err(_) => Ok(false),
        }
    }
}
