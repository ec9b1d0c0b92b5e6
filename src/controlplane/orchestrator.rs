//! Main Orchestrator
//!
//! Fans a backup or restore request out to one worker per matched table and
//! joins all of them into a [`RunReport`]:
//! - Backup: clear unit, schema record, optional read override, scan, revert
//! - Restore: delete destination, create with raised write capacity,
//!   replay pages, revert capacities

use crate::config::{DeploymentTarget, Settings};
use crate::controlplane::lifecycle::TableLifecycle;
use crate::controlplane::pool::{WorkerPool, WorkerResult};
use crate::controlplane::selector::{Separator, TablePattern, TableSelector};
use crate::controlplane::throughput::{CapacityOverride, RestoreCapacityPlan, ThroughputController};
use crate::domain::ports::TableStoreRef;
use crate::error::{Error, Result};
use crate::pipeline::{ExportPipeline, ImportConfig, ImportPipeline};
use crate::storage::{DumpStorageRef, DumpUnit};
use chrono::Utc;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

// =============================================================================
// Orchestrator Configuration
// =============================================================================

/// Configuration shared by every worker of a run
#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    /// Sleep between control-plane retries and status polls
    pub sleep_interval: Duration,
    /// Maximum number of table workers in flight
    pub max_concurrency: usize,
    /// Spacing between successive worker starts
    pub start_delay: Duration,
    /// Read capacity applied while backing up
    pub read_capacity: Option<i64>,
    /// Table write capacity applied while restoring, instead of the floor
    pub write_capacity: Option<i64>,
    /// Minimum write capacity while restoring
    pub restore_write_floor: i64,
    pub separator: Separator,
    pub import: ImportConfig,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self::from_settings(&Settings::default(), DeploymentTarget::Local)
    }
}

impl OrchestratorConfig {
    pub fn from_settings(settings: &Settings, target: DeploymentTarget) -> Self {
        let sleep_interval = settings.sleep_interval(target);
        Self {
            sleep_interval,
            max_concurrency: settings.max_concurrency,
            start_delay: settings.start_delay(),
            read_capacity: None,
            write_capacity: None,
            restore_write_floor: settings.restore_write_floor,
            separator: Separator::default(),
            import: ImportConfig {
                batch_size: settings.batch_size,
                max_attempts: settings.batch_max_attempts,
                sleep_interval,
                on_exhausted: settings.on_exhausted,
            },
        }
    }
}

// =============================================================================
// Run Report
// =============================================================================

/// Final state of one table in a run
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TableOutcome {
    Completed,
    /// Restored, but some items were dropped after exhausting batch retries
    Partial { dropped: usize },
    Failed { reason: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableReport {
    pub table: String,
    /// Dump Unit a restored table came from
    pub source: Option<String>,
    pub outcome: TableOutcome,
}

/// One entry per table touched by a run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunReport {
    pub tables: Vec<TableReport>,
}

impl RunReport {
    fn push(&mut self, table: impl Into<String>, source: Option<String>, outcome: TableOutcome) {
        self.tables.push(TableReport {
            table: table.into(),
            source,
            outcome,
        });
    }

    pub fn get(&self, table: &str) -> Option<&TableReport> {
        self.tables.iter().find(|t| t.table == table)
    }

    pub fn completed(&self) -> usize {
        self.count(|o| matches!(o, TableOutcome::Completed))
    }

    pub fn partial(&self) -> usize {
        self.count(|o| matches!(o, TableOutcome::Partial { .. }))
    }

    pub fn failed(&self) -> usize {
        self.count(|o| matches!(o, TableOutcome::Failed { .. }))
    }

    fn count(&self, f: impl Fn(&TableOutcome) -> bool) -> usize {
        self.tables.iter().filter(|t| f(&t.outcome)).count()
    }

    pub fn is_success(&self) -> bool {
        self.completed() == self.tables.len()
    }

    /// Process exit code: 0 only when every table completed
    pub fn exit_code(&self) -> i32 {
        if self.is_success() {
            0
        } else {
            1
        }
    }

    pub fn log_summary(&self) {
        for report in &self.tables {
            match &report.outcome {
                TableOutcome::Completed => {}
                TableOutcome::Partial { dropped } => {
                    warn!("{}: restored with {} dropped item(s)", report.table, dropped)
                }
                TableOutcome::Failed { reason } => error!("{}: failed: {}", report.table, reason),
            }
        }
        info!(
            "Run finished: {} completed, {} partial, {} failed",
            self.completed(),
            self.partial(),
            self.failed()
        );
    }
}

// =============================================================================
// Workers
// =============================================================================

/// Everything a table worker needs, shared by all workers of a run
struct WorkerContext {
    config: OrchestratorConfig,
    lifecycle: TableLifecycle,
    throughput: ThroughputController,
    export: ExportPipeline,
    import: ImportPipeline,
}

impl WorkerContext {
    async fn backup_table(&self, table: &str) -> Result<TableOutcome> {
        let started = Utc::now();
        let unit = DumpUnit::new(table);

        self.export.clear(&unit).await?;
        let description = self.export.write_schema(table, &unit).await?;

        let capacity = CapacityOverride::for_backup(
            description.provisioned_throughput.capacity,
            self.config.read_capacity,
        );
        if let Some(capacity) = capacity {
            self.throughput.apply(table, capacity.effective, true).await?;
        }

        let exported = self.export.export_pages(table, &unit).await;

        if let Some(capacity) = capacity {
            self.throughput.revert(table, capacity.original).await?;
        }
        let summary = exported?;

        info!(
            "Backup for {} table completed ({} page(s), {} item(s)). Time taken: {}",
            table,
            summary.pages,
            summary.items,
            format_elapsed(started)
        );
        Ok(TableOutcome::Completed)
    }

    async fn restore_table(
        &self,
        source: &str,
        destination: &str,
        delete_first: bool,
    ) -> Result<TableOutcome> {
        let started = Utc::now();
        let unit = DumpUnit::new(source);

        let schema = self.import.read_schema(&unit).await?;

        if delete_first {
            self.lifecycle.delete(destination).await?;
        }

        let plan = RestoreCapacityPlan::new(
            &schema,
            self.config.write_capacity,
            self.config.restore_write_floor,
        );
        info!(
            "Creating {} table with temporary write capacity of {}",
            destination, plan.table.effective.write_capacity_units
        );
        self.lifecycle
            .create(&plan.create_request(&schema, destination))
            .await?;

        let summary = self.import.import(&unit, destination).await?;

        self.throughput
            .update(destination, &plan.revert_update(), false)
            .await?;

        info!(
            "Restore for {} table completed ({} item(s) from {}). Time taken: {}",
            destination,
            summary.items,
            source,
            format_elapsed(started)
        );

        if summary.dropped > 0 {
            Ok(TableOutcome::Partial {
                dropped: summary.dropped,
            })
        } else {
            Ok(TableOutcome::Completed)
        }
    }
}

fn format_elapsed(started: chrono::DateTime<Utc>) -> String {
    let elapsed = Utc::now() - started;
    format!("{:.3}s", elapsed.num_milliseconds() as f64 / 1000.0)
}

fn outcome_of<T>(result: &Result<T>) -> Option<TableOutcome> {
    result.as_ref().err().map(|e| TableOutcome::Failed {
        reason: e.to_string(),
    })
}

// =============================================================================
// Orchestrator
// =============================================================================

/// Runs backups and restores over one or many tables
pub struct Orchestrator {
    context: Arc<WorkerContext>,
    store: TableStoreRef,
    storage: DumpStorageRef,
    selector: TableSelector,
    pool: WorkerPool,
}

impl Orchestrator {
    pub fn new(config: OrchestratorConfig, store: TableStoreRef, storage: DumpStorageRef) -> Self {
        let lifecycle = TableLifecycle::new(store.clone(), config.sleep_interval);
        let throughput = ThroughputController::new(store.clone(), lifecycle.clone());
        let export = ExportPipeline::new(store.clone(), storage.clone());
        let import = ImportPipeline::new(store.clone(), storage.clone(), config.import.clone());

        Self {
            selector: TableSelector::new(config.separator.clone()),
            pool: WorkerPool::new(config.max_concurrency, config.start_delay),
            context: Arc::new(WorkerContext {
                config,
                lifecycle,
                throughput,
                export,
                import,
            }),
            store,
            storage,
        }
    }

    /// Back up every table matching `source`
    pub async fn backup(&self, source: &str) -> Result<RunReport> {
        let pattern = TablePattern::parse(source);

        let tables = if pattern.is_wildcard() {
            let matches = self
                .selector
                .resolve_live(self.store.as_ref(), &pattern)
                .await?;
            info!(
                "Found {} table(s) in {} matching {} to backup: {}",
                matches.len(),
                self.store.store_name(),
                pattern,
                matches.join(", ")
            );
            matches
        } else {
            vec![source.to_string()]
        };

        info!("Writing dump to {}", self.storage.location());

        let context = self.context.clone();
        let results = self
            .pool
            .run(tables, move |table| {
                let context = context.clone();
                async move { context.backup_table(&table).await }
            })
            .await?;

        let mut report = RunReport::default();
        collect(&mut report, results);
        Ok(report)
    }

    /// Restore every Dump Unit matching `source` into the tables named by
    /// `destination`
    pub async fn restore(&self, source: &str, destination: &str) -> Result<RunReport> {
        let source_pattern = TablePattern::parse(source);
        let destination_pattern = TablePattern::parse(destination);
        let mut report = RunReport::default();

        // Clear every live destination match before any restore starts
        let mut failed_deletes = Vec::new();
        if destination_pattern.is_wildcard() {
            let matches = self
                .selector
                .resolve_live(self.store.as_ref(), &destination_pattern)
                .await?;
            info!(
                "Found {} table(s) in {} to delete: {}",
                matches.len(),
                self.store.store_name(),
                matches.join(", ")
            );

            let context = self.context.clone();
            let results = self
                .pool
                .run(matches, move |table| {
                    let context = context.clone();
                    async move { context.lifecycle.delete(&table).await }
                })
                .await?;

            for WorkerResult { table, result } in results {
                if let Some(outcome) = outcome_of(&result) {
                    error!("Deletion of {} failed, skipping its restore", table);
                    failed_deletes.push(table.clone());
                    report.push(table, None, outcome);
                }
            }
        }

        let sources = if source_pattern.is_wildcard() {
            let matches = self
                .selector
                .resolve_dump(self.storage.as_ref(), &source_pattern)
                .await?;
            info!(
                "Found {} table(s) in {} to restore: {}",
                matches.len(),
                self.storage.location(),
                matches.join(", ")
            );
            matches
        } else {
            vec![source.to_string()]
        };

        let mut pairs = BTreeMap::new();
        let mut order = Vec::new();
        for name in sources {
            match self
                .selector
                .destination_name(&name, &source_pattern, &destination_pattern)
            {
                Some(dest) if failed_deletes.contains(&dest) => {}
                Some(dest) => {
                    order.push(name.clone());
                    pairs.insert(name, dest);
                }
                None => {
                    let err = Error::PrefixMismatch {
                        source_table: name.clone(),
                        pattern: source_pattern.to_string(),
                    };
                    warn!("Skipping {}: {}", name, err);
                    report.push(name.clone(), Some(name), TableOutcome::Failed {
                        reason: err.to_string(),
                    });
                }
            }
        }

        let pairs = Arc::new(pairs);
        let delete_first = !destination_pattern.is_wildcard();
        let context = self.context.clone();
        let worker_pairs = pairs.clone();
        let results = self
            .pool
            .run(order, move |source| {
                let context = context.clone();
                let destination = worker_pairs.get(&source).cloned().unwrap_or_default();
                async move {
                    context
                        .restore_table(&source, &destination, delete_first)
                        .await
                }
            })
            .await?;

        for WorkerResult { table, result } in results {
            let destination = pairs.get(&table).cloned().unwrap_or_default();
            let outcome = match result {
                Ok(outcome) => outcome,
                Err(e) => {
                    error!("Restore of {} into {} failed: {}", table, destination, e);
                    TableOutcome::Failed {
                        reason: e.to_string(),
                    }
                }
            };
            report.push(destination, Some(table), outcome);
        }

        Ok(report)
    }
}

fn collect(report: &mut RunReport, results: Vec<WorkerResult<TableOutcome>>) {
    for WorkerResult { table, result } in results {
        let outcome = match result {
            Ok(outcome) => outcome,
            Err(e) => {
                error!("Worker for {} failed: {}", table, e);
                TableOutcome::Failed {
                    reason: e.to_string(),
                }
            }
        };
        report.push(table, None, outcome);
    }
}
