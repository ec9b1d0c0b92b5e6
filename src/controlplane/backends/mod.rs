//! Table Store Adapters
//!
//! Provides adapters for the table-store collaborator:
//! - Memory: in-process store for dry runs and tests
//! - DynamoDB: the AWS service or a local endpoint (feature `aws`)

pub mod memory;
#[cfg(feature = "aws")]
pub mod dynamodb;

pub use memory::{MemoryStoreConfig, MemoryTableStore, StoreOp};
#[cfg(feature = "aws")]
pub use dynamodb::{DynamoDbConfig, DynamoDbStore};
