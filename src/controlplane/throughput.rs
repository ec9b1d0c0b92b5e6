//! Throughput Controller
//!
//! Raises a table's provisioned capacity for the duration of a bulk
//! operation and reverts it afterwards. The original values are recorded
//! before any change and are the only source for the revert.

use crate::controlplane::lifecycle::TableLifecycle;
use crate::controlplane::retry::{retry_control_plane, Attempt};
use crate::domain::model::{
    CreateTableRequest, IndexThroughputUpdate, ProvisionedThroughput, TableDescription,
    ThroughputUpdate,
};
use crate::domain::ports::TableStoreRef;
use crate::error::{ControlOp, Error, Result};
use tracing::info;

// =============================================================================
// Capacity Override
// =============================================================================

/// An ephemeral capacity change with its recorded original
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CapacityOverride {
    pub original: ProvisionedThroughput,
    pub effective: ProvisionedThroughput,
}

impl CapacityOverride {
    /// Read-capacity override for a backup, if it changes anything
    pub fn for_backup(original: ProvisionedThroughput, read_capacity: Option<i64>) -> Option<Self> {
        let read = read_capacity?;
        if read == original.read_capacity_units {
            return None;
        }
        Some(Self {
            original,
            effective: ProvisionedThroughput::new(read, original.write_capacity_units),
        })
    }
}

// =============================================================================
// Restore Capacity Plan
// =============================================================================

/// Original and temporary write capacity of one global secondary index
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexCapacity {
    pub index_name: String,
    pub original: ProvisionedThroughput,
    pub effective: ProvisionedThroughput,
}

/// Capacities a restored table is created with and reverted to
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RestoreCapacityPlan {
    pub table: CapacityOverride,
    pub indexes: Vec<IndexCapacity>,
}

impl RestoreCapacityPlan {
    /// Plan capacities for restoring `schema`
    ///
    /// The table's write capacity is `write_capacity` when given, otherwise
    /// the original raised to `floor`. Every global index with a write
    /// capacity below `floor` is raised to it.
    pub fn new(schema: &TableDescription, write_capacity: Option<i64>, floor: i64) -> Self {
        let original = schema.provisioned_throughput.capacity;
        let write = write_capacity.unwrap_or_else(|| original.write_capacity_units.max(floor));

        let indexes = schema
            .global_secondary_indexes
            .iter()
            .flatten()
            .filter_map(|gsi| {
                let original = gsi.provisioned_throughput.as_ref()?.capacity;
                Some(IndexCapacity {
                    index_name: gsi.index_name.clone(),
                    original,
                    effective: ProvisionedThroughput::new(
                        original.read_capacity_units,
                        original.write_capacity_units.max(floor),
                    ),
                })
            })
            .collect();

        Self {
            table: CapacityOverride {
                original,
                effective: ProvisionedThroughput::new(original.read_capacity_units, write),
            },
            indexes,
        }
    }

    /// Create request for `destination` using the temporary capacities
    pub fn create_request(&self, schema: &TableDescription, destination: &str) -> CreateTableRequest {
        let global_secondary_indexes = schema.global_secondary_indexes.clone().map(|gsis| {
            gsis.into_iter()
                .map(|mut gsi| {
                    if let Some(plan) = self.indexes.iter().find(|i| i.index_name == gsi.index_name) {
                        gsi.provisioned_throughput = Some(plan.effective.into());
                    }
                    gsi.index_status = None;
                    gsi
                })
                .collect()
        });

        CreateTableRequest {
            table_name: destination.to_string(),
            attribute_definitions: schema.attribute_definitions.clone(),
            key_schema: schema.key_schema.clone(),
            provisioned_throughput: self.table.effective,
            local_secondary_indexes: schema.local_secondary_indexes.clone(),
            global_secondary_indexes,
        }
    }

    /// Update that puts every changed capacity back to its original value
    pub fn revert_update(&self) -> ThroughputUpdate {
        ThroughputUpdate {
            table: (self.table.effective != self.table.original).then_some(self.table.original),
            indexes: self
                .indexes
                .iter()
                .filter(|i| i.effective != i.original)
                .map(|i| IndexThroughputUpdate {
                    index_name: i.index_name.clone(),
                    provisioned_throughput: i.original,
                })
                .collect(),
        }
    }
}

// =============================================================================
// Throughput Controller
// =============================================================================

/// Applies and reverts provisioned capacity changes
#[derive(Clone)]
pub struct ThroughputController {
    store: TableStoreRef,
    lifecycle: TableLifecycle,
}

impl ThroughputController {
    pub fn new(store: TableStoreRef, lifecycle: TableLifecycle) -> Self {
        Self { store, lifecycle }
    }

    /// Set the table's capacity, optionally waiting for it to become active
    pub async fn apply(
        &self,
        table: &str,
        throughput: ProvisionedThroughput,
        wait: bool,
    ) -> Result<()> {
        info!(
            "Updating {} table read capacity to: {}, write capacity to: {}",
            table, throughput.read_capacity_units, throughput.write_capacity_units
        );
        self.update(
            table,
            &ThroughputUpdate {
                table: Some(throughput),
                indexes: Vec::new(),
            },
            wait,
        )
        .await
    }

    /// Put a table back to its recorded capacity without waiting
    pub async fn revert(&self, table: &str, original: ProvisionedThroughput) -> Result<()> {
        self.apply(table, original, false).await
    }

    /// Apply a table and/or index update in one call
    pub async fn update(&self, table: &str, update: &ThroughputUpdate, wait: bool) -> Result<()> {
        if update.is_empty() {
            return Ok(());
        }

        for index in &update.indexes {
            info!(
                "Updating {} index {} write capacity to: {}",
                table, index.index_name, index.provisioned_throughput.write_capacity_units
            );
        }

        let attempt = retry_control_plane(
            ControlOp::Update,
            table,
            self.lifecycle.sleep_interval(),
            || self.store.update_table(table, update),
        )
        .await?;

        if attempt == Attempt::Completed {
            return Err(Error::Internal(format!(
                "throughput update of {} reported a terminal state",
                table
            )));
        }

        if wait {
            self.lifecycle.wait_for_active(table, "updated").await?;
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::controlplane::backends::{MemoryStoreConfig, MemoryTableStore, StoreOp};
    use crate::domain::model::{
        GlobalSecondaryIndex, KeySchemaElement, KeyType, Projection, ScalarAttributeType,
        TableStatus,
    };
    use crate::error::StoreErrorKind;
    use std::sync::Arc;
    use std::time::Duration;

    fn schema(write: i64, gsi_writes: &[i64]) -> TableDescription {
        let mut desc = TableDescription::new(
            "orders",
            ("id", ScalarAttributeType::S),
            None,
            ProvisionedThroughput::new(10, write),
        );
        if !gsi_writes.is_empty() {
            desc.global_secondary_indexes = Some(
                gsi_writes
                    .iter()
                    .enumerate()
                    .map(|(i, w)| GlobalSecondaryIndex {
                        index_name: format!("gsi-{}", i),
                        key_schema: vec![KeySchemaElement {
                            attribute_name: "id".into(),
                            key_type: KeyType::Hash,
                        }],
                        projection: Projection::default(),
                        provisioned_throughput: Some(ProvisionedThroughput::new(3, *w).into()),
                        index_status: Some("ACTIVE".into()),
                        extra: Default::default(),
                    })
                    .collect(),
            );
        }
        desc
    }

    #[test]
    fn test_backup_override_only_when_different() {
        let original = ProvisionedThroughput::new(5, 7);
        assert_eq!(CapacityOverride::for_backup(original, None), None);
        assert_eq!(CapacityOverride::for_backup(original, Some(5)), None);

        let raised = CapacityOverride::for_backup(original, Some(50)).unwrap();
        assert_eq!(raised.effective, ProvisionedThroughput::new(50, 7));
        assert_eq!(raised.original, original);
    }

    #[test]
    fn test_restore_plan_applies_floor() {
        let plan = RestoreCapacityPlan::new(&schema(5, &[1, 500]), None, 100);

        assert_eq!(plan.table.effective, ProvisionedThroughput::new(10, 100));
        assert_eq!(plan.indexes[0].effective, ProvisionedThroughput::new(3, 100));
        assert_eq!(plan.indexes[1].effective, ProvisionedThroughput::new(3, 500));

        let revert = plan.revert_update();
        assert_eq!(revert.table, Some(ProvisionedThroughput::new(10, 5)));
        assert_eq!(revert.indexes.len(), 1);
        assert_eq!(revert.indexes[0].index_name, "gsi-0");
        assert_eq!(
            revert.indexes[0].provisioned_throughput,
            ProvisionedThroughput::new(3, 1)
        );
    }

    #[test]
    fn test_restore_plan_keeps_high_capacity() {
        let plan = RestoreCapacityPlan::new(&schema(250, &[]), None, 100);
        assert_eq!(plan.table.effective, plan.table.original);
        assert!(plan.revert_update().is_empty());
    }

    #[test]
    fn test_restore_plan_explicit_write_capacity() {
        let plan = RestoreCapacityPlan::new(&schema(5, &[1]), Some(40), 100);
        assert_eq!(plan.table.effective.write_capacity_units, 40);
        assert_eq!(plan.indexes[0].effective.write_capacity_units, 100);
    }

    #[test]
    fn test_create_request_uses_temporary_capacity() {
        let desc = schema(5, &[1]);
        let plan = RestoreCapacityPlan::new(&desc, None, 100);
        let request = plan.create_request(&desc, "archive");

        assert_eq!(request.table_name, "archive");
        assert_eq!(request.provisioned_throughput.write_capacity_units, 100);
        let gsi = &request.global_secondary_indexes.unwrap()[0];
        assert_eq!(gsi.provisioned_throughput.as_ref().unwrap().capacity.write_capacity_units, 100);
        assert!(gsi.index_status.is_none());
    }

    #[tokio::test]
    async fn test_apply_waits_and_retries() {
        let store = Arc::new(MemoryTableStore::with_config(MemoryStoreConfig {
            update_lag: 2,
            ..Default::default()
        }));
        store.insert_table(schema(5, &[]));
        store.inject_errors(StoreOp::Update, StoreErrorKind::LimitExceeded, 2);

        let lifecycle = TableLifecycle::new(store.clone(), Duration::ZERO);
        let controller = ThroughputController::new(store.clone(), lifecycle);
        controller
            .apply("orders", ProvisionedThroughput::new(100, 5), true)
            .await
            .unwrap();

        assert_eq!(store.calls(StoreOp::Update), 3);
        assert_eq!(store.calls(StoreOp::Describe), 3);
        let desc = store.peek_table("orders").unwrap();
        assert_eq!(desc.table_status, TableStatus::Active);
        assert_eq!(desc.provisioned_throughput.capacity.read_capacity_units, 100);
    }

    #[tokio::test]
    async fn test_revert_does_not_wait() {
        let store = Arc::new(MemoryTableStore::with_config(MemoryStoreConfig {
            update_lag: 5,
            ..Default::default()
        }));
        store.insert_table(schema(5, &[]));

        let lifecycle = TableLifecycle::new(store.clone(), Duration::ZERO);
        let controller = ThroughputController::new(store.clone(), lifecycle);
        controller
            .revert("orders", ProvisionedThroughput::new(1, 1))
            .await
            .unwrap();

        assert_eq!(store.calls(StoreOp::Describe), 0);
        assert_eq!(store.throughput_log().len(), 1);
    }
}
