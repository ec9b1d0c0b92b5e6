//! Control Plane Module
//!
//! Everything that drives the table store: retry policy, table lifecycle,
//! throughput overrides, table selection, the worker pool and the
//! orchestrator tying them together.

pub mod backends;
pub mod lifecycle;
pub mod orchestrator;
pub mod pool;
pub mod retry;
pub mod selector;
pub mod throughput;

pub use lifecycle::{DeleteOutcome, TableLifecycle};
pub use orchestrator::{Orchestrator, OrchestratorConfig, RunReport, TableOutcome, TableReport};
pub use pool::{WorkerPool, WorkerResult};
pub use selector::{change_prefix, Separator, TablePattern, TableSelector};
pub use throughput::{CapacityOverride, RestoreCapacityPlan, ThroughputController};
