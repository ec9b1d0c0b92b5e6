//! Table Dump - Backup and Restore Orchestrator
//!
//! Copies whole tables of a provisioned document-table store into a dump
//! tree (local directory or S3 bucket) and replays such dumps back into
//! live tables, one worker per matched table.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────────┐
//! │                              Orchestrator                                    │
//! │        (table selection, bounded worker pool, per-table run report)          │
//! ├─────────────────────────────────────────────────────────────────────────────┤
//! │  ┌─────────────────┐  ┌─────────────────┐  ┌─────────────────────────────┐  │
//! │  │ Table Selector  │  │   Throughput    │  │     Table Lifecycle         │  │
//! │  │ (prefix rules)  │  │   Controller    │  │  (create/delete/wait)       │  │
//! │  └────────┬────────┘  └────────┬────────┘  └─────────────┬───────────────┘  │
//! │           │                    │                         │                   │
//! │           └────────────────────┼─────────────────────────┘                   │
//! │                                │                                             │
//! │              ┌─────────────────┴─────────────────┐                          │
//! │              │   Export Pipeline / Import Pipeline│                          │
//! │              └─────────────────┬─────────────────┘                          │
//! ├────────────────────────────────┼────────────────────────────────────────────┤
//! │  ┌─────────────────────────────┴───┐  ┌─────────────────────────────────┐   │
//! │  │      Table Store (port)          │  │     Dump Storage (port)          │   │
//! │  │   DynamoDB | in-memory           │  │   local dir | S3 | in-memory     │   │
//! │  └──────────────────────────────────┘  └─────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Modules
//!
//! - [`controlplane`]: Orchestrator, worker pool, table lifecycle and store adapters
//! - [`pipeline`]: Export and import of table items
//! - [`storage`]: Dump storage backends and dump layout
//! - [`domain`]: Core domain types and the table store port
//! - [`config`]: Run settings
//! - [`error`]: Error types and handling

pub mod config;
pub mod controlplane;
pub mod domain;
pub mod error;
pub mod pipeline;
pub mod storage;

// Re-export commonly used types
pub use config::{DeploymentTarget, ExhaustedPolicy, Settings, LOCAL_REGION};

pub use controlplane::{
    Orchestrator, OrchestratorConfig, RunReport, TableOutcome, TableReport,
    Separator, TablePattern, TableSelector,
};

pub use domain::{
    AttributeValue, Item, ScanPage, TableDescription, TableStore, TableStoreRef,
};

pub use error::{ControlOp, Error, ErrorAction, Result, StoreErrorKind};

pub use pipeline::{ExportPipeline, ImportConfig, ImportPipeline};

pub use storage::{DumpStorage, DumpStorageRef, DumpUnit, LocalStorage, MemoryStorage};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Library name
pub const NAME: &str = env!("CARGO_PKG_NAME");
