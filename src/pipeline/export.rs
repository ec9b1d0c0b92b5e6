//! Export Pipeline
//!
//! Writes a table's schema record, then scans the table page by page and
//! stores every scan response verbatim as the next numbered page file.

use crate::domain::model::{SchemaRecord, TableDescription};
use crate::domain::ports::TableStoreRef;
use crate::error::Result;
use crate::storage::{put_json, DumpStorageRef, DumpUnit};
use tracing::{debug, info};

/// What one export wrote
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExportSummary {
    pub pages: u32,
    pub items: usize,
}

#[derive(Clone)]
pub struct ExportPipeline {
    store: TableStoreRef,
    storage: DumpStorageRef,
}

impl ExportPipeline {
    pub fn new(store: TableStoreRef, storage: DumpStorageRef) -> Self {
        Self { store, storage }
    }

    /// Remove any previous content of the unit
    pub async fn clear(&self, unit: &DumpUnit) -> Result<()> {
        debug!("Clearing {}/{}", self.storage.location(), unit.dir());
        self.storage.remove_all(unit.dir()).await
    }

    /// Describe the table and persist the response as the unit's schema record
    pub async fn write_schema(&self, table: &str, unit: &DumpUnit) -> Result<TableDescription> {
        info!("Dumping table schema for {}", table);
        let description = self.store.describe_table(table).await?;
        let record = SchemaRecord { table: description };
        put_json(self.storage.as_ref(), &unit.schema_path(), &record).await?;
        Ok(record.table)
    }

    /// Scan the whole table into `0001.json`, `0002.json`, ...
    pub async fn export_pages(&self, table: &str, unit: &DumpUnit) -> Result<ExportSummary> {
        info!("Dumping table items for {}", table);

        let mut summary = ExportSummary::default();
        let mut start_key = None;

        loop {
            let page = self.store.scan(table, start_key.as_ref()).await?;
            summary.pages += 1;
            summary.items += page.items.len();

            put_json(self.storage.as_ref(), &unit.page_path(summary.pages), &page).await?;
            debug!(
                "Wrote page {} of {} ({} item(s))",
                summary.pages,
                table,
                page.items.len()
            );

            match page.last_evaluated_key {
                Some(key) => start_key = Some(key),
                None => break,
            }
        }

        Ok(summary)
    }
}
