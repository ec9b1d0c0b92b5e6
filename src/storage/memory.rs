//! In-Memory Dump Storage
//!
//! DashMap-backed blob store for tests and dry runs.

use crate::error::Result;
use crate::storage::DumpStorage;
use async_trait::async_trait;
use bytes::Bytes;
use dashmap::DashMap;
use std::collections::BTreeSet;

/// Dump storage that keeps every blob in memory
#[derive(Default)]
pub struct MemoryStorage {
    blobs: DashMap<String, Bytes>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored blobs
    pub fn blob_count(&self) -> usize {
        self.blobs.len()
    }

    /// All stored paths, sorted
    pub fn paths(&self) -> Vec<String> {
        let mut paths: Vec<String> = self.blobs.iter().map(|e| e.key().clone()).collect();
        paths.sort();
        paths
    }
}

fn normalize(path: &str) -> String {
    path.trim_matches('/').to_string()
}

#[async_trait]
impl DumpStorage for MemoryStorage {
    fn location(&self) -> String {
        "memory://".to_string()
    }

    async fn put(&self, path: &str, data: Bytes) -> Result<()> {
        self.blobs.insert(normalize(path), data);
        Ok(())
    }

    async fn get(&self, path: &str) -> Result<Option<Bytes>> {
        Ok(self.blobs.get(&normalize(path)).map(|e| e.value().clone()))
    }

    async fn list(&self, dir: &str) -> Result<Vec<String>> {
        let dir = normalize(dir);
        let prefix = if dir.is_empty() {
            String::new()
        } else {
            format!("{}/", dir)
        };

        let children: BTreeSet<String> = self
            .blobs
            .iter()
            .filter_map(|e| {
                e.key()
                    .strip_prefix(&prefix)
                    .and_then(|rest| rest.split('/').next())
                    .filter(|child| !child.is_empty())
                    .map(str::to_string)
            })
            .collect();

        Ok(children.into_iter().collect())
    }

    async fn remove_all(&self, dir: &str) -> Result<()> {
        let dir = normalize(dir);
        let prefix = format!("{}/", dir);
        self.blobs
            .retain(|key, _| key != &dir && !key.starts_with(&prefix));
        Ok(())
    }

    async fn health_check(&self) -> Result<bool> {
        Ok(true)
    }
}
