//! Table Lifecycle Manager
//!
//! Creates and deletes tables and polls their status until the store
//! settles, absorbing the expected transient control-plane errors.
//!
//! Restore-side state machine per table:
//!
//! ```text
//! Absent -> Deleting -> Absent -> Creating -> Active
//! ```

use crate::controlplane::retry::{retry_control_plane, Attempt};
use crate::domain::model::{CreateTableRequest, TableStatus};
use crate::domain::ports::TableStoreRef;
use crate::error::{ControlOp, Error, ErrorAction, Result};
use std::time::Duration;
use tracing::info;

/// Result of a delete request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeleteOutcome {
    /// The table did not exist; nothing was waited for
    AlreadyAbsent,
    /// The table existed and is now gone
    Deleted {
        /// Describe calls that still saw the table
        polls: u32,
    },
}

/// Creates, deletes and waits on tables
#[derive(Clone)]
pub struct TableLifecycle {
    store: TableStoreRef,
    sleep_interval: Duration,
}

impl TableLifecycle {
    pub fn new(store: TableStoreRef, sleep_interval: Duration) -> Self {
        Self {
            store,
            sleep_interval,
        }
    }

    pub fn sleep_interval(&self) -> Duration {
        self.sleep_interval
    }

    /// Delete a table and wait until the store no longer knows it
    pub async fn delete(&self, table: &str) -> Result<DeleteOutcome> {
        let attempt = retry_control_plane(ControlOp::Delete, table, self.sleep_interval, || {
            self.store.delete_table(table)
        })
        .await?;

        match attempt {
            Attempt::Completed => {
                info!("{} table deleted!", table);
                Ok(DeleteOutcome::AlreadyAbsent)
            }
            Attempt::Done(status) => {
                info!("Deletion of {} issued [{}]", table, status);
                let polls = self.wait_for_deleted(table).await?;
                Ok(DeleteOutcome::Deleted { polls })
            }
        }
    }

    /// Poll describe-table until the store reports the table as not found
    async fn wait_for_deleted(&self, table: &str) -> Result<u32> {
        let mut polls = 0;
        loop {
            match self.store.describe_table(table).await {
                Ok(description) => {
                    polls += 1;
                    info!(
                        "Waiting for {} table to be deleted.. [{}]",
                        table, description.table_status
                    );
                    tokio::time::sleep(self.sleep_interval).await;
                }
                Err(e) if e.action_for(ControlOp::Describe) == ErrorAction::Complete => {
                    info!("{} table deleted.", table);
                    return Ok(polls);
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// Create a table and wait until it is active
    pub async fn create(&self, request: &CreateTableRequest) -> Result<()> {
        let table = request.table_name.as_str();
        let attempt = retry_control_plane(ControlOp::Create, table, self.sleep_interval, || {
            self.store.create_table(request)
        })
        .await?;

        if attempt == Attempt::Completed {
            return Err(Error::Internal(format!(
                "creation of {} reported a terminal state",
                table
            )));
        }

        self.wait_for_active(table, "created").await
    }

    /// Poll describe-table until the table reports ACTIVE
    pub async fn wait_for_active(&self, table: &str, verb: &str) -> Result<()> {
        loop {
            let description = self.store.describe_table(table).await?;
            if description.table_status == TableStatus::Active {
                info!("{} {}.", table, verb);
                return Ok(());
            }

            info!(
                "Waiting for {} table to be {}.. [{}]",
                table, verb, description.table_status
            );
            tokio::time::sleep(self.sleep_interval).await;
        }
    }
}
