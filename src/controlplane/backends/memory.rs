//! In-Memory Table Store
//!
//! A complete table store kept in process memory. Used for dry runs and as
//! the collaborator in tests: it can inject classified errors per operation,
//! leave batch items unprocessed, and hold tables in a transitional status
//! for a number of describe calls.

use crate::domain::model::{
    AttributeValue, CreateTableRequest, GlobalSecondaryIndex, Item, ScanPage, TableDescription,
    TableNamePage, TableStatus, ThroughputUpdate,
};
use crate::domain::ports::TableStore;
use crate::error::{Error, Result, StoreErrorKind};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::{BTreeMap, HashMap, VecDeque};
use std::ops::Bound;
use tracing::debug;

// =============================================================================
// Configuration
// =============================================================================

/// Configuration for the in-memory store
#[derive(Debug, Clone)]
pub struct MemoryStoreConfig {
    /// Table names per list-tables page
    pub list_page_size: usize,
    /// Items per scan page
    pub scan_page_size: usize,
    /// Describe calls a new table stays CREATING
    pub create_lag: u32,
    /// Describe calls an updated table stays UPDATING
    pub update_lag: u32,
    /// Describe calls a deleted table stays DELETING
    pub delete_lag: u32,
}

impl Default for MemoryStoreConfig {
    fn default() -> Self {
        Self {
            list_page_size: 100,
            scan_page_size: 100,
            create_lag: 0,
            update_lag: 0,
            delete_lag: 0,
        }
    }
}

/// Operations of the store, for call counting and fault injection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StoreOp {
    ListTables,
    Describe,
    Create,
    Delete,
    Update,
    Scan,
    BatchWrite,
}

// =============================================================================
// Table State
// =============================================================================

type PrimaryKey = Vec<AttributeValue>;

#[derive(Debug, Clone)]
struct MemoryTable {
    description: TableDescription,
    items: BTreeMap<PrimaryKey, Item>,
    /// Remaining describe calls in the current transitional status
    lag: u32,
}

impl MemoryTable {
    fn primary_key(&self, item: &Item) -> Option<PrimaryKey> {
        self.description
            .key_attribute_names()
            .into_iter()
            .map(|name| item.get(name).cloned())
            .collect()
    }

    fn key_item(&self, item: &Item) -> Item {
        self.description
            .key_attribute_names()
            .into_iter()
            .filter_map(|name| item.get(name).map(|v| (name.to_string(), v.clone())))
            .collect()
    }
}

#[derive(Default)]
struct StoreState {
    tables: BTreeMap<String, MemoryTable>,
    injected: HashMap<StoreOp, VecDeque<StoreErrorKind>>,
    unprocessed: VecDeque<usize>,
    calls: HashMap<StoreOp, u64>,
    throughput_log: Vec<(String, ThroughputUpdate)>,
    write_log: Vec<(String, Item)>,
}

impl StoreState {
    /// Count the call and pop an injected failure, if any
    fn enter(&mut self, op: StoreOp, table: &str) -> Result<()> {
        *self.calls.entry(op).or_insert(0) += 1;
        match self.injected.get_mut(&op).and_then(|q| q.pop_front()) {
            Some(kind) => Err(Error::store(kind, table, format!("injected {:?} failure", op))),
            None => Ok(()),
        }
    }

    fn table(&self, name: &str) -> Result<&MemoryTable> {
        self.tables.get(name).ok_or_else(|| not_found(name))
    }

    fn table_mut(&mut self, name: &str) -> Result<&mut MemoryTable> {
        self.tables.get_mut(name).ok_or_else(|| not_found(name))
    }
}

fn not_found(table: &str) -> Error {
    Error::store(
        StoreErrorKind::ResourceNotFound,
        table,
        format!("Requested resource not found: Table: {} not found", table),
    )
}

// =============================================================================
// Memory Table Store
// =============================================================================

/// Table store held entirely in memory
pub struct MemoryTableStore {
    config: MemoryStoreConfig,
    state: Mutex<StoreState>,
}

impl Default for MemoryTableStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryTableStore {
    pub fn new() -> Self {
        Self::with_config(MemoryStoreConfig::default())
    }

    pub fn with_config(config: MemoryStoreConfig) -> Self {
        Self {
            config,
            state: Mutex::new(StoreState::default()),
        }
    }

    /// Add an active table, replacing any previous one with the same name
    pub fn insert_table(&self, mut description: TableDescription) {
        description.table_status = TableStatus::Active;
        let table = MemoryTable {
            description,
            items: BTreeMap::new(),
            lag: 0,
        };
        self.state
            .lock()
            .tables
            .insert(table.description.table_name.clone(), table);
    }

    /// Insert items directly, bypassing batch limits and fault injection
    pub fn put_items(&self, table: &str, items: impl IntoIterator<Item = Item>) -> Result<()> {
        let mut state = self.state.lock();
        let table = state.table_mut(table)?;
        for item in items {
            let key = table.primary_key(&item).ok_or_else(|| {
                Error::store(
                    StoreErrorKind::Validation,
                    table.description.table_name.clone(),
                    "item is missing key attributes",
                )
            })?;
            table.items.insert(key, item);
        }
        Ok(())
    }

    /// All items of a table in key order
    pub fn items(&self, table: &str) -> Vec<Item> {
        self.state
            .lock()
            .tables
            .get(table)
            .map(|t| t.items.values().cloned().collect())
            .unwrap_or_default()
    }

    pub fn table_names(&self) -> Vec<String> {
        self.state.lock().tables.keys().cloned().collect()
    }

    /// Current description without consuming any status lag
    pub fn peek_table(&self, table: &str) -> Option<TableDescription> {
        self.state
            .lock()
            .tables
            .get(table)
            .map(|t| t.description.clone())
    }

    /// Make the next `count` calls of `op` fail with `kind`
    pub fn inject_errors(&self, op: StoreOp, kind: StoreErrorKind, count: usize) {
        let mut state = self.state.lock();
        let queue = state.injected.entry(op).or_default();
        queue.extend(std::iter::repeat(kind).take(count));
    }

    /// Leave the given number of trailing items unprocessed on successive
    /// batch-write calls
    pub fn leave_unprocessed(&self, counts: impl IntoIterator<Item = usize>) {
        self.state.lock().unprocessed.extend(counts);
    }

    /// Number of calls made to `op`
    pub fn calls(&self, op: StoreOp) -> u64 {
        self.state.lock().calls.get(&op).copied().unwrap_or(0)
    }

    /// Every update-table call that succeeded, in order
    pub fn throughput_log(&self) -> Vec<(String, ThroughputUpdate)> {
        self.state.lock().throughput_log.clone()
    }

    /// Items accepted by batch writes to `table`, in the order they were written
    pub fn written(&self, table: &str) -> Vec<Item> {
        self.state
            .lock()
            .write_log
            .iter()
            .filter(|(name, _)| name == table)
            .map(|(_, item)| item.clone())
            .collect()
    }
}

#[async_trait]
impl TableStore for MemoryTableStore {
    async fn list_tables(&self, exclusive_start: Option<&str>) -> Result<TableNamePage> {
        let mut state = self.state.lock();
        state.enter(StoreOp::ListTables, "*")?;

        let lower = match exclusive_start {
            Some(start) => Bound::Excluded(start.to_string()),
            None => Bound::Unbounded,
        };
        let mut names = state
            .tables
            .range((lower, Bound::Unbounded))
            .map(|(name, _)| name.clone());

        let table_names: Vec<String> = names.by_ref().take(self.config.list_page_size).collect();
        let more = names.next().is_some();

        Ok(TableNamePage {
            last_evaluated_table_name: if more { table_names.last().cloned() } else { None },
            table_names,
        })
    }

    async fn describe_table(&self, table: &str) -> Result<TableDescription> {
        let mut state = self.state.lock();
        state.enter(StoreOp::Describe, table)?;

        let entry = state.table_mut(table)?;
        if entry.lag > 0 {
            entry.lag -= 1;
            return Ok(entry.description.clone());
        }

        if entry.description.table_status == TableStatus::Deleting {
            state.tables.remove(table);
            return Err(not_found(table));
        }

        entry.description.table_status = TableStatus::Active;
        entry.description.item_count = Some(entry.items.len() as i64);
        Ok(entry.description.clone())
    }

    async fn create_table(&self, request: &CreateTableRequest) -> Result<()> {
        let mut state = self.state.lock();
        state.enter(StoreOp::Create, &request.table_name)?;

        if state.tables.contains_key(&request.table_name) {
            return Err(Error::store(
                StoreErrorKind::ResourceInUse,
                &request.table_name,
                format!("Table already exists: {}", request.table_name),
            ));
        }

        for key in &request.key_schema {
            if !request
                .attribute_definitions
                .iter()
                .any(|a| a.attribute_name == key.attribute_name)
            {
                return Err(Error::store(
                    StoreErrorKind::Validation,
                    &request.table_name,
                    format!("Key attribute {} is not defined", key.attribute_name),
                ));
            }
        }

        let global_secondary_indexes = request.global_secondary_indexes.clone().map(|gsis| {
            gsis.into_iter()
                .map(|gsi| GlobalSecondaryIndex {
                    index_status: Some("ACTIVE".to_string()),
                    ..gsi
                })
                .collect()
        });

        let lag = self.config.create_lag;
        let description = TableDescription {
            table_name: request.table_name.clone(),
            attribute_definitions: request.attribute_definitions.clone(),
            key_schema: request.key_schema.clone(),
            provisioned_throughput: request.provisioned_throughput.into(),
            table_status: if lag > 0 { TableStatus::Creating } else { TableStatus::Active },
            local_secondary_indexes: request.local_secondary_indexes.clone(),
            global_secondary_indexes,
            item_count: Some(0),
            table_size_bytes: Some(0),
            table_arn: None,
            extra: Default::default(),
        };

        debug!("Created in-memory table {}", request.table_name);
        state.tables.insert(
            request.table_name.clone(),
            MemoryTable {
                description,
                items: BTreeMap::new(),
                lag,
            },
        );

        Ok(())
    }

    async fn delete_table(&self, table: &str) -> Result<TableStatus> {
        let mut state = self.state.lock();
        state.enter(StoreOp::Delete, table)?;

        let lag = self.config.delete_lag;
        let entry = state.table_mut(table)?;
        match entry.description.table_status {
            TableStatus::Active => {}
            TableStatus::Deleting => {
                return Err(Error::store(
                    StoreErrorKind::ResourceInUse,
                    table,
                    format!("Table is being deleted: {}", table),
                ))
            }
            ref status => {
                return Err(Error::store(
                    StoreErrorKind::ResourceInUse,
                    table,
                    format!("Table {} is in use: {}", table, status),
                ))
            }
        }

        entry.description.table_status = TableStatus::Deleting;
        entry.lag = lag;
        if lag == 0 {
            state.tables.remove(table);
        }

        Ok(TableStatus::Deleting)
    }

    async fn update_table(&self, table: &str, update: &ThroughputUpdate) -> Result<()> {
        let mut state = self.state.lock();
        state.enter(StoreOp::Update, table)?;

        let lag = self.config.update_lag;
        let entry = state.table_mut(table)?;
        if entry.description.table_status != TableStatus::Active {
            return Err(Error::store(
                StoreErrorKind::ResourceInUse,
                table,
                format!("Table {} is {}", table, entry.description.table_status),
            ));
        }

        for index_update in &update.indexes {
            let gsi = entry
                .description
                .global_secondary_indexes
                .iter_mut()
                .flatten()
                .find(|g| g.index_name == index_update.index_name)
                .ok_or_else(|| {
                    Error::store(
                        StoreErrorKind::Validation,
                        table,
                        format!("Index {} does not exist", index_update.index_name),
                    )
                })?;
            let capacity = index_update.provisioned_throughput;
            gsi.provisioned_throughput
                .get_or_insert_with(|| capacity.into())
                .capacity = capacity;
        }
        if let Some(throughput) = update.table {
            entry.description.provisioned_throughput.capacity = throughput;
        }
        if lag > 0 {
            entry.description.table_status = TableStatus::Updating;
            entry.lag = lag;
        }

        state
            .throughput_log
            .push((table.to_string(), update.clone()));

        Ok(())
    }

    async fn scan(&self, table: &str, exclusive_start_key: Option<&Item>) -> Result<ScanPage> {
        let mut state = self.state.lock();
        state.enter(StoreOp::Scan, table)?;

        let entry = state.table(table)?;
        let lower = match exclusive_start_key {
            Some(start) => {
                let key = entry.primary_key(start).ok_or_else(|| {
                    Error::store(StoreErrorKind::Validation, table, "invalid ExclusiveStartKey")
                })?;
                Bound::Excluded(key)
            }
            None => Bound::Unbounded,
        };

        let mut remaining = entry.items.range((lower, Bound::Unbounded)).map(|(_, item)| item);
        let items: Vec<Item> = remaining
            .by_ref()
            .take(self.config.scan_page_size)
            .cloned()
            .collect();
        let more = remaining.next().is_some();

        let last_evaluated_key = if more {
            items.last().map(|item| entry.key_item(item))
        } else {
            None
        };

        Ok(ScanPage {
            count: items.len() as i64,
            scanned_count: items.len() as i64,
            items,
            last_evaluated_key,
            extra: Default::default(),
        })
    }

    async fn batch_write(&self, table: &str, items: &[Item]) -> Result<Vec<Item>> {
        let mut state = self.state.lock();
        state.enter(StoreOp::BatchWrite, table)?;

        if items.len() > crate::config::MAX_BATCH_WRITE {
            return Err(Error::store(
                StoreErrorKind::Validation,
                table,
                "Too many items requested for the batch write",
            ));
        }

        let skip = state.unprocessed.pop_front().unwrap_or(0).min(items.len());
        let split = items.len() - skip;

        let entry = state.table_mut(table)?;
        if !matches!(
            entry.description.table_status,
            TableStatus::Active | TableStatus::Updating
        ) {
            return Err(not_found(table));
        }

        for item in &items[..split] {
            let key = entry.primary_key(item).ok_or_else(|| {
                Error::store(
                    StoreErrorKind::Validation,
                    table,
                    "One of the required keys was not given a value",
                )
            })?;
            entry.items.insert(key, item.clone());
        }

        state
            .write_log
            .extend(items[..split].iter().map(|item| (table.to_string(), item.clone())));

        Ok(items[split..].to_vec())
    }

    fn store_name(&self) -> &str {
        "memory"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::model::{ProvisionedThroughput, ScalarAttributeType};
    use assert_matches::assert_matches;

    fn item(id: &str) -> Item {
        let mut item = Item::new();
        item.insert("id".into(), AttributeValue::S(id.into()));
        item.insert("payload".into(), AttributeValue::N("1".into()));
        item
    }

    fn store_with_table(config: MemoryStoreConfig) -> MemoryTableStore {
        let store = MemoryTableStore::with_config(config);
        store.insert_table(TableDescription::new(
            "orders",
            ("id", ScalarAttributeType::S),
            None,
            ProvisionedThroughput::new(5, 5),
        ));
        store
    }

    #[tokio::test]
    async fn test_scan_pagination() {
        let store = store_with_table(MemoryStoreConfig {
            scan_page_size: 2,
            ..Default::default()
        });
        store
            .put_items("orders", ["a", "b", "c"].iter().map(|id| item(id)))
            .unwrap();

        let first = store.scan("orders", None).await.unwrap();
        assert_eq!(first.items.len(), 2);
        let key = first.last_evaluated_key.clone().unwrap();
        assert_eq!(key.len(), 1);
        assert_eq!(key["id"], AttributeValue::S("b".into()));

        let second = store.scan("orders", Some(&key)).await.unwrap();
        assert_eq!(second.items, vec![item("c")]);
        assert!(second.last_evaluated_key.is_none());
    }

    #[tokio::test]
    async fn test_list_tables_pagination() {
        let store = MemoryTableStore::with_config(MemoryStoreConfig {
            list_page_size: 2,
            ..Default::default()
        });
        for name in ["a", "b", "c"] {
            store.insert_table(TableDescription::new(
                name,
                ("id", ScalarAttributeType::S),
                None,
                ProvisionedThroughput::new(1, 1),
            ));
        }

        let first = store.list_tables(None).await.unwrap();
        assert_eq!(first.table_names, vec!["a", "b"]);
        assert_eq!(first.last_evaluated_table_name.as_deref(), Some("b"));

        let second = store.list_tables(Some("b")).await.unwrap();
        assert_eq!(second.table_names, vec!["c"]);
        assert!(second.last_evaluated_table_name.is_none());
    }

    #[tokio::test]
    async fn test_delete_lag() {
        let store = store_with_table(MemoryStoreConfig {
            delete_lag: 1,
            ..Default::default()
        });

        assert_eq!(store.delete_table("orders").await.unwrap(), TableStatus::Deleting);
        assert_eq!(
            store.describe_table("orders").await.unwrap().table_status,
            TableStatus::Deleting
        );
        let err = store.describe_table("orders").await.unwrap_err();
        assert!(err.is_not_found());
        assert!(store.table_names().is_empty());
    }

    #[tokio::test]
    async fn test_batch_write_unprocessed_and_injection() {
        let store = store_with_table(MemoryStoreConfig::default());
        store.leave_unprocessed([1]);
        store.inject_errors(StoreOp::BatchWrite, StoreErrorKind::Throttling, 1);

        let batch = vec![item("a"), item("b")];
        let err = store.batch_write("orders", &batch).await.unwrap_err();
        assert_eq!(err.store_kind(), Some(StoreErrorKind::Throttling));

        let unprocessed = store.batch_write("orders", &batch).await.unwrap();
        assert_eq!(unprocessed, vec![item("b")]);
        assert_eq!(store.items("orders"), vec![item("a")]);
        assert_eq!(store.calls(StoreOp::BatchWrite), 2);
    }

    #[tokio::test]
    async fn test_create_existing_is_in_use() {
        let store = store_with_table(MemoryStoreConfig::default());
        let desc = store.peek_table("orders").unwrap();
        let request = CreateTableRequest {
            table_name: "orders".into(),
            attribute_definitions: desc.attribute_definitions,
            key_schema: desc.key_schema,
            provisioned_throughput: desc.provisioned_throughput.capacity,
            local_secondary_indexes: None,
            global_secondary_indexes: None,
        };

        let result = store.create_table(&request).await;
        assert_matches!(
            result,
            Err(Error::Store { kind: StoreErrorKind::ResourceInUse, .. })
        );
    }
}
