//! Data Pipelines
//!
//! Moves items between a live table and its Dump Unit:
//! - Export: paginated scan into numbered page files
//! - Import: page replay through bounded, retried batch writes

pub mod export;
pub mod import;

pub use export::{ExportPipeline, ExportSummary};
pub use import::{BatchWriteOutcome, ImportConfig, ImportPipeline, ImportSummary};
