//! Import Pipeline
//!
//! Replays a Dump Unit's pages in numeric order through batch writes of at
//! most 25 items. Items the store leaves unprocessed are resubmitted up to
//! a bounded number of attempts; what is still left after that is dropped
//! and reported, or fails the import, depending on [`ExhaustedPolicy`].

use crate::config::{ExhaustedPolicy, MAX_BATCH_WRITE};
use crate::domain::model::{Item, ScanPage, SchemaRecord, TableDescription};
use crate::domain::ports::TableStoreRef;
use crate::error::{Error, Result};
use crate::storage::{get_json, join_path, DumpStorageRef, DumpUnit};
use std::time::Duration;
use tracing::{debug, info, warn};

// =============================================================================
// Configuration
// =============================================================================

#[derive(Debug, Clone)]
pub struct ImportConfig {
    /// Items per batch-write call
    pub batch_size: usize,
    /// Batch-write calls per batch, the first one included
    pub max_attempts: u32,
    /// Sleep between attempts
    pub sleep_interval: Duration,
    pub on_exhausted: ExhaustedPolicy,
}

impl Default for ImportConfig {
    fn default() -> Self {
        Self {
            batch_size: MAX_BATCH_WRITE,
            max_attempts: 6,
            sleep_interval: Duration::from_secs(1),
            on_exhausted: ExhaustedPolicy::Report,
        }
    }
}

// =============================================================================
// Outcomes
// =============================================================================

/// Result of writing one batch
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BatchWriteOutcome {
    /// Batch-write calls made
    pub attempts: u32,
    /// Items still unprocessed after the last attempt
    pub dropped: Vec<Item>,
}

impl BatchWriteOutcome {
    pub fn is_complete(&self) -> bool {
        self.dropped.is_empty()
    }
}

/// What one import wrote
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ImportSummary {
    pub pages: usize,
    pub items: usize,
    pub batches: usize,
    pub dropped: usize,
}

// =============================================================================
// Import Pipeline
// =============================================================================

#[derive(Clone)]
pub struct ImportPipeline {
    store: TableStoreRef,
    storage: DumpStorageRef,
    config: ImportConfig,
}

impl ImportPipeline {
    pub fn new(store: TableStoreRef, storage: DumpStorageRef, config: ImportConfig) -> Self {
        Self {
            store,
            storage,
            config,
        }
    }

    /// Load the unit's schema record
    pub async fn read_schema(&self, unit: &DumpUnit) -> Result<TableDescription> {
        let record: SchemaRecord = get_json(self.storage.as_ref(), &unit.schema_path()).await?;
        Ok(record.table)
    }

    /// Write every page of `unit` into `destination`
    pub async fn import(&self, unit: &DumpUnit, destination: &str) -> Result<ImportSummary> {
        info!("Restoring data for {} table..", destination);

        let mut summary = ImportSummary::default();
        let pages = unit.pages(self.storage.as_ref()).await?;
        let data_dir = unit.data_dir();
        let batch_size = self.config.batch_size.clamp(1, MAX_BATCH_WRITE);

        for name in pages {
            let page: ScanPage = get_json(self.storage.as_ref(), &join_path(&data_dir, &name)).await?;
            debug!("Restoring {} item(s) from {} into {}", page.items.len(), name, destination);

            for batch in page.items.chunks(batch_size) {
                let outcome = self.batch_write(destination, batch.to_vec()).await?;
                summary.batches += 1;
                summary.dropped += outcome.dropped.len();
            }

            summary.pages += 1;
            summary.items += page.items.len();
        }

        Ok(summary)
    }

    /// Submit one batch, resubmitting unprocessed items
    pub async fn batch_write(&self, table: &str, batch: Vec<Item>) -> Result<BatchWriteOutcome> {
        let max_attempts = self.config.max_attempts.max(1);
        let mut pending = batch;
        let mut attempts = 0;

        loop {
            attempts += 1;
            match self.store.batch_write(table, &pending).await {
                Ok(unprocessed) => pending = unprocessed,
                Err(e) if e.is_transient() => {
                    debug!("Batch write to {} throttled: {}", table, e);
                }
                Err(e) => return Err(e),
            }

            if pending.is_empty() {
                return Ok(BatchWriteOutcome {
                    attempts,
                    dropped: Vec::new(),
                });
            }
            if attempts >= max_attempts {
                break;
            }

            info!(
                "{} unprocessed item(s), retrying batch write to {}.. [attempt {}/{}]",
                pending.len(),
                table,
                attempts,
                max_attempts
            );
            tokio::time::sleep(self.config.sleep_interval).await;
        }

        warn!(
            "Max retries reached writing to {}, dropping {} unprocessed item(s): {}",
            table,
            pending.len(),
            serde_json::to_string(&pending)?
        );

        match self.config.on_exhausted {
            ExhaustedPolicy::Report => Ok(BatchWriteOutcome {
                attempts,
                dropped: pending,
            }),
            ExhaustedPolicy::Fail => Err(Error::BatchWriteExhausted {
                table: table.to_string(),
                attempts,
                unprocessed: pending.len(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::controlplane::backends::{MemoryTableStore, StoreOp};
    use crate::domain::model::{AttributeValue, ProvisionedThroughput, ScalarAttributeType};
    use crate::error::StoreErrorKind;
    use crate::storage::{put_json, MemoryStorage};
    use assert_matches::assert_matches;
    use std::sync::Arc;

    fn item(id: u32) -> Item {
        let mut item = Item::new();
        item.insert("id".into(), AttributeValue::N(id.to_string()));
        item
    }

    fn pipeline(store: &Arc<MemoryTableStore>, storage: &Arc<MemoryStorage>, policy: ExhaustedPolicy) -> ImportPipeline {
        ImportPipeline::new(
            store.clone(),
            storage.clone(),
            ImportConfig {
                sleep_interval: Duration::ZERO,
                on_exhausted: policy,
                ..Default::default()
            },
        )
    }

    fn store() -> Arc<MemoryTableStore> {
        let store = Arc::new(MemoryTableStore::new());
        store.insert_table(TableDescription::new(
            "orders",
            ("id", ScalarAttributeType::N),
            None,
            ProvisionedThroughput::new(5, 5),
        ));
        store
    }

    #[tokio::test]
    async fn test_fully_processed_batch_takes_one_call() {
        let store = store();
        let storage = Arc::new(MemoryStorage::new());

        let outcome = pipeline(&store, &storage, ExhaustedPolicy::Report)
            .batch_write("orders", (0..25).map(item).collect())
            .await
            .unwrap();

        assert_eq!(outcome.attempts, 1);
        assert!(outcome.is_complete());
        assert_eq!(store.calls(StoreOp::BatchWrite), 1);
    }

    #[tokio::test]
    async fn test_unprocessed_items_are_resubmitted() {
        let store = store();
        let storage = Arc::new(MemoryStorage::new());
        store.leave_unprocessed([3, 1]);

        let outcome = pipeline(&store, &storage, ExhaustedPolicy::Report)
            .batch_write("orders", (0..10).map(item).collect())
            .await
            .unwrap();

        assert_eq!(outcome.attempts, 3);
        assert!(outcome.is_complete());
        assert_eq!(store.items("orders").len(), 10);
    }

    #[tokio::test]
    async fn test_exhausted_batch_is_reported() {
        let store = store();
        let storage = Arc::new(MemoryStorage::new());
        store.leave_unprocessed([2; 6]);

        let outcome = pipeline(&store, &storage, ExhaustedPolicy::Report)
            .batch_write("orders", (0..5).map(item).collect())
            .await
            .unwrap();

        assert_eq!(outcome.attempts, 6);
        assert_eq!(outcome.dropped, vec![item(3), item(4)]);
        assert_eq!(store.calls(StoreOp::BatchWrite), 6);
        assert_eq!(store.items("orders").len(), 3);
    }

    #[tokio::test]
    async fn test_exhausted_batch_fails_under_fail_policy() {
        let store = store();
        let storage = Arc::new(MemoryStorage::new());
        store.leave_unprocessed([1; 6]);

        let result = pipeline(&store, &storage, ExhaustedPolicy::Fail)
            .batch_write("orders", (0..5).map(item).collect())
            .await;

        assert_matches!(
            result,
            Err(Error::BatchWriteExhausted { attempts: 6, unprocessed: 1, .. })
        );
    }

    #[tokio::test]
    async fn test_throttled_attempts_count_towards_the_bound() {
        let store = store();
        let storage = Arc::new(MemoryStorage::new());
        store.inject_errors(StoreOp::BatchWrite, StoreErrorKind::Throttling, 2);

        let outcome = pipeline(&store, &storage, ExhaustedPolicy::Report)
            .batch_write("orders", vec![item(1)])
            .await
            .unwrap();

        assert_eq!(outcome.attempts, 3);
        assert!(outcome.is_complete());
    }

    #[tokio::test]
    async fn test_import_chunks_pages_in_numeric_order() {
        let store = store();
        let storage = Arc::new(MemoryStorage::new());
        let unit = DumpUnit::new("orders");

        let page = |ids: std::ops::Range<u32>| ScanPage {
            count: ids.len() as i64,
            scanned_count: ids.len() as i64,
            items: ids.map(item).collect(),
            last_evaluated_key: None,
            extra: Default::default(),
        };
        put_json(storage.as_ref(), &unit.page_path(10000), &page(40..41)).await.unwrap();
        put_json(storage.as_ref(), &unit.page_path(2), &page(30..35)).await.unwrap();
        put_json(storage.as_ref(), &unit.page_path(1), &page(0..30)).await.unwrap();
        put_json(storage.as_ref(), &unit.page_path(9999), &page(35..40)).await.unwrap();

        let summary = pipeline(&store, &storage, ExhaustedPolicy::Report)
            .import(&unit, "orders")
            .await
            .unwrap();

        assert_eq!(
            summary,
            ImportSummary {
                pages: 4,
                items: 41,
                batches: 5,
                dropped: 0
            }
        );

        let written: Vec<Item> = store.written("orders");
        let expected: Vec<Item> = (0..41).map(item).collect();
        assert_eq!(written, expected);
    }

    #[tokio::test]
    async fn test_missing_schema_record() {
        let store = store();
        let storage = Arc::new(MemoryStorage::new());

        let result = pipeline(&store, &storage, ExhaustedPolicy::Report)
            .read_schema(&DumpUnit::new("ghost"))
            .await;
        assert_matches!(result, Err(Error::DumpNotFound { .. }));
    }
}
