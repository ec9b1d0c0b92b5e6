//! Error types for the table dump engine
//!
//! Provides structured error types for the backup/restore orchestration,
//! including a typed classification of table-store failures so that the
//! retry policy never has to inspect error payload strings.

use std::fmt;
use thiserror::Error;

// =============================================================================
// Store Error Classification
// =============================================================================

/// Kind of failure reported by the table-store collaborator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StoreErrorKind {
    /// The table (or index) does not exist
    ResourceNotFound,
    /// The table is being created, updated or deleted
    ResourceInUse,
    /// Too many concurrent control-plane operations or capacity changes
    LimitExceeded,
    /// Request rate throttled by the control or data plane
    Throttling,
    /// The request was rejected as malformed
    Validation,
    /// Anything the adapter could not classify
    Other,
}

impl fmt::Display for StoreErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StoreErrorKind::ResourceNotFound => write!(f, "resource-not-found"),
            StoreErrorKind::ResourceInUse => write!(f, "resource-in-use"),
            StoreErrorKind::LimitExceeded => write!(f, "limit-exceeded"),
            StoreErrorKind::Throttling => write!(f, "throttling"),
            StoreErrorKind::Validation => write!(f, "validation"),
            StoreErrorKind::Other => write!(f, "other"),
        }
    }
}

/// Control-plane operation an error was raised by
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlOp {
    Create,
    Delete,
    Update,
    Describe,
}

impl fmt::Display for ControlOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ControlOp::Create => write!(f, "creation"),
            ControlOp::Delete => write!(f, "deletion"),
            ControlOp::Update => write!(f, "throughput update"),
            ControlOp::Describe => write!(f, "describe"),
        }
    }
}

// =============================================================================
// Error
// =============================================================================

/// Unified error type for the engine
#[derive(Error, Debug)]
pub enum Error {
    // =========================================================================
    // Internal Errors
    // =========================================================================
    #[error("Internal error: {0}")]
    Internal(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    // =========================================================================
    // Table Store Errors
    // =========================================================================
    #[error("Table store error on {table} ({kind}): {message}")]
    Store {
        kind: StoreErrorKind,
        table: String,
        message: String,
    },

    #[error("Table {table} reported an unexpected description: {reason}")]
    InvalidDescription { table: String, reason: String },

    #[error("Attribute {attribute} of an item in {table} has an unsupported type")]
    UnsupportedAttribute { table: String, attribute: String },

    // =========================================================================
    // Dump Storage Errors
    // =========================================================================
    #[error("Dump storage error at {path}: {reason}")]
    Storage { path: String, reason: String },

    #[error("Dump unit not found: {path}")]
    DumpNotFound { path: String },

    // =========================================================================
    // Pipeline Errors
    // =========================================================================
    #[error("Batch write to {table} gave up after {attempts} attempts with {unprocessed} unprocessed items")]
    BatchWriteExhausted {
        table: String,
        attempts: u32,
        unprocessed: usize,
    },

    #[error("Cannot derive destination name for {source_table} from pattern {pattern}")]
    PrefixMismatch {
        source_table: String,
        pattern: String,
    },

    #[error("Worker for {table} terminated abnormally: {reason}")]
    WorkerPanicked { table: String, reason: String },

    // =========================================================================
    // Parse Errors
    // =========================================================================
    #[error("JSON parse error: {0}")]
    JsonParse(#[from] serde_json::Error),

    #[error("YAML parse error: {0}")]
    YamlParse(#[from] serde_yaml::Error),

    // =========================================================================
    // IO Errors
    // =========================================================================
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Action to take when a control-plane call fails
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorAction {
    /// Sleep the configured interval and issue the call again
    Retry,
    /// The failure is the expected terminal state of the operation
    Complete,
    /// Give up on this worker
    Abort,
}

impl Error {
    /// Shorthand for a classified table-store error
    pub fn store(kind: StoreErrorKind, table: impl Into<String>, message: impl Into<String>) -> Self {
        Error::Store {
            kind,
            table: table.into(),
            message: message.into(),
        }
    }

    /// Store error kind, if this error came from the table store
    pub fn store_kind(&self) -> Option<StoreErrorKind> {
        match self {
            Error::Store { kind, .. } => Some(*kind),
            _ => None,
        }
    }

    /// Determine what action to take for this error during `op`
    pub fn action_for(&self, op: ControlOp) -> ErrorAction {
        let kind = match self.store_kind() {
            Some(kind) => kind,
            None => return ErrorAction::Abort,
        };

        match (op, kind) {
            (_, StoreErrorKind::LimitExceeded | StoreErrorKind::Throttling)
                if op != ControlOp::Describe =>
            {
                ErrorAction::Retry
            }
            (ControlOp::Delete | ControlOp::Update, StoreErrorKind::ResourceInUse) => {
                ErrorAction::Retry
            }
            (ControlOp::Delete | ControlOp::Describe, StoreErrorKind::ResourceNotFound) => {
                ErrorAction::Complete
            }
            _ => ErrorAction::Abort,
        }
    }

    /// Check if this error is transient for data-plane calls
    pub fn is_transient(&self) -> bool {
        matches!(
            self.store_kind(),
            Some(StoreErrorKind::LimitExceeded | StoreErrorKind::Throttling)
        )
    }

    /// Check if this error means the table does not exist
    pub fn is_not_found(&self) -> bool {
        self.store_kind() == Some(StoreErrorKind::ResourceNotFound)
    }
}

/// Result type alias for the engine
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    fn store_err(kind: StoreErrorKind) -> Error {
        Error::store(kind, "orders-eu", "boom")
    }

    #[test]
    fn test_delete_actions() {
        assert_eq!(
            store_err(StoreErrorKind::ResourceNotFound).action_for(ControlOp::Delete),
            ErrorAction::Complete
        );
        assert_eq!(
            store_err(StoreErrorKind::ResourceInUse).action_for(ControlOp::Delete),
            ErrorAction::Retry
        );
        assert_eq!(
            store_err(StoreErrorKind::Throttling).action_for(ControlOp::Delete),
            ErrorAction::Retry
        );
        assert_eq!(
            store_err(StoreErrorKind::Validation).action_for(ControlOp::Delete),
            ErrorAction::Abort
        );
    }

    #[test]
    fn test_create_actions() {
        assert_eq!(
            store_err(StoreErrorKind::LimitExceeded).action_for(ControlOp::Create),
            ErrorAction::Retry
        );
        assert_eq!(
            store_err(StoreErrorKind::ResourceInUse).action_for(ControlOp::Create),
            ErrorAction::Abort
        );
        assert_eq!(
            store_err(StoreErrorKind::ResourceNotFound).action_for(ControlOp::Create),
            ErrorAction::Abort
        );
    }

    #[test]
    fn test_describe_actions() {
        assert_eq!(
            store_err(StoreErrorKind::ResourceNotFound).action_for(ControlOp::Describe),
            ErrorAction::Complete
        );
        assert_eq!(
            store_err(StoreErrorKind::Throttling).action_for(ControlOp::Describe),
            ErrorAction::Abort
        );
    }

    #[test]
    fn test_non_store_errors_abort() {
        let err = Error::Configuration("bad root".into());
        assert_eq!(err.action_for(ControlOp::Update), ErrorAction::Abort);
        assert!(!err.is_transient());
        assert!(!err.is_not_found());
    }

    #[test]
    fn test_unsupported_attribute_aborts() {
        let err = Error::UnsupportedAttribute {
            table: "orders".into(),
            attribute: "payload".into(),
        };
        assert_eq!(err.action_for(ControlOp::Create), ErrorAction::Abort);
        assert!(!err.is_transient());
        assert_eq!(
            err.to_string(),
            "Attribute payload of an item in orders has an unsupported type"
        );
    }

    #[test]
    fn test_transient() {
        assert!(store_err(StoreErrorKind::Throttling).is_transient());
        assert!(store_err(StoreErrorKind::LimitExceeded).is_transient());
        assert!(!store_err(StoreErrorKind::ResourceInUse).is_transient());
    }
}
