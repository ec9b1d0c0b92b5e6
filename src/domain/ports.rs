//! Domain Ports - Core trait definitions for the dump engine
//!
//! These traits define the boundary between the backup/restore logic and the
//! table-store collaborator. Adapters implement them and classify their
//! native failures into [`StoreErrorKind`](crate::error::StoreErrorKind).

use crate::domain::model::{
    CreateTableRequest, Item, ScanPage, TableDescription, TableNamePage, TableStatus,
    ThroughputUpdate,
};
use crate::error::Result;
use async_trait::async_trait;
use std::sync::Arc;

// =============================================================================
// Table Store Port
// =============================================================================

/// Port for the table store's control and data plane
///
/// Implementations must be safe for concurrent use: one handle is shared by
/// every worker of a run.
#[async_trait]
pub trait TableStore: Send + Sync {
    /// List one page of table names, starting after `exclusive_start`
    async fn list_tables(&self, exclusive_start: Option<&str>) -> Result<TableNamePage>;

    /// Describe a table
    async fn describe_table(&self, table: &str) -> Result<TableDescription>;

    /// Create a table
    async fn create_table(&self, request: &CreateTableRequest) -> Result<()>;

    /// Issue a table deletion, returning the status reported by the store
    async fn delete_table(&self, table: &str) -> Result<TableStatus>;

    /// Change provisioned capacity of a table and/or its global indexes
    async fn update_table(&self, table: &str, update: &ThroughputUpdate) -> Result<()>;

    /// Scan one page, starting after `exclusive_start_key`
    async fn scan(&self, table: &str, exclusive_start_key: Option<&Item>) -> Result<ScanPage>;

    /// Put a batch of items, returning the ones the store did not process
    async fn batch_write(&self, table: &str, items: &[Item]) -> Result<Vec<Item>>;

    /// Get adapter name
    fn store_name(&self) -> &str;
}

// =============================================================================
// Type Aliases for Arc'd Traits
// =============================================================================

pub type TableStoreRef = Arc<dyn TableStore>;
