//! Control-plane retry
//!
//! Control-plane calls are retried at a fixed interval, without an attempt
//! bound, for as long as the error classifies as [`ErrorAction::Retry`].

use crate::error::{ControlOp, Error, ErrorAction, Result};
use backoff::backoff::Constant;
use std::future::Future;
use std::time::Duration;
use tracing::info;

/// Outcome of a retried control-plane call
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Attempt<T> {
    /// The call succeeded
    Done(T),
    /// The call failed with the operation's expected terminal error
    Completed,
}

/// Run `call` until it succeeds, reaches its terminal state, or fails with
/// an error that is not retryable for `op`
pub async fn retry_control_plane<T, F, Fut>(
    op: ControlOp,
    table: &str,
    interval: Duration,
    mut call: F,
) -> Result<Attempt<T>>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let policy = Constant::new(interval);

    backoff::future::retry_notify(
        policy,
        || {
            let fut = call();
            async move {
                match fut.await {
                    Ok(value) => Ok(Attempt::Done(value)),
                    Err(e) => match e.action_for(op) {
                        ErrorAction::Retry => Err(backoff::Error::transient(e)),
                        ErrorAction::Complete => Ok(Attempt::Completed),
                        ErrorAction::Abort => Err(backoff::Error::permanent(e)),
                    },
                }
            }
        },
        |err: Error, _wait: Duration| {
            info!("{}, retrying {} of {}..", describe_retry(&err), op, table);
        },
    )
    .await
}

fn describe_retry(err: &Error) -> &'static str {
    use crate::error::StoreErrorKind;

    match err.store_kind() {
        Some(StoreErrorKind::LimitExceeded) => "Limit exceeded",
        Some(StoreErrorKind::Throttling) => "Control plane limit exceeded",
        Some(StoreErrorKind::ResourceInUse) => "Table in use",
        _ => "Transient failure",
    }
}
