//! Worker Pool
//!
//! Runs one worker per table with a bounded number of workers in flight and
//! a rate-limited start signal, then joins all of them. A failed or
//! panicked worker never cancels its siblings.

use crate::error::{Error, Result};
use futures::future::join_all;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info_span, Instrument};

/// Result of one worker, tagged with the table it ran for
#[derive(Debug)]
pub struct WorkerResult<T> {
    pub table: String,
    pub result: Result<T>,
}

/// Bounded pool of per-table workers
#[derive(Debug, Clone)]
pub struct WorkerPool {
    max_concurrency: usize,
    start_delay: Duration,
}

impl WorkerPool {
    pub fn new(max_concurrency: usize, start_delay: Duration) -> Self {
        Self {
            max_concurrency: max_concurrency.max(1),
            start_delay,
        }
    }

    pub fn max_concurrency(&self) -> usize {
        self.max_concurrency
    }

    /// Start `work` for every table in order and wait for all of them
    ///
    /// Results come back in submission order, one per table.
    pub async fn run<T, F, Fut>(&self, tables: Vec<String>, work: F) -> Result<Vec<WorkerResult<T>>>
    where
        F: Fn(String) -> Fut,
        Fut: Future<Output = Result<T>> + Send + 'static,
        T: Send + 'static,
    {
        let semaphore = Arc::new(Semaphore::new(self.max_concurrency));
        let mut start_signal = (!self.start_delay.is_zero()).then(|| {
            let mut interval = tokio::time::interval(self.start_delay);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            interval
        });

        let total = tables.len();
        let mut handles = Vec::with_capacity(total);

        for (index, table) in tables.into_iter().enumerate() {
            let permit = semaphore
                .clone()
                .acquire_owned()
                .await
                .map_err(|e| Error::Internal(format!("Worker pool closed: {}", e)))?;
            if let Some(interval) = start_signal.as_mut() {
                interval.tick().await;
            }

            debug!("Starting worker {}/{} for {}", index + 1, total, table);
            let span = info_span!("worker", table = %table);
            let fut = work(table.clone());
            let handle = tokio::spawn(
                async move {
                    let result = fut.await;
                    drop(permit);
                    result
                }
                .instrument(span),
            );
            handles.push((table, handle));
        }

        let results = join_all(handles.into_iter().map(|(table, handle)| async move {
            let result = match handle.await {
                Ok(result) => result,
                Err(e) => Err(Error::WorkerPanicked {
                    table: table.clone(),
                    reason: panic_reason(e),
                }),
            };
            WorkerResult { table, result }
        }))
        .await;

        Ok(results)
    }
}

/// Message carried by a panicked worker, or the join error itself
fn panic_reason(error: tokio::task::JoinError) -> String {
    if !error.is_panic() {
        return error.to_string();
    }
    let payload = error.into_panic();
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "worker panicked".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use parking_lot::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn names(n: usize) -> Vec<String> {
        (0..n).map(|i| format!("t{}", i)).collect()
    }

    #[tokio::test]
    async fn test_concurrency_is_bounded() {
        let active = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));
        let pool = WorkerPool::new(3, Duration::ZERO);

        let results = pool
            .run(names(10), |table| {
                let active = active.clone();
                let peak = peak.clone();
                async move {
                    let now = active.fetch_add(1, Ordering::SeqCst) + 1;
                    peak.fetch_max(now, Ordering::SeqCst);
                    tokio::time::sleep(Duration::from_millis(5)).await;
                    active.fetch_sub(1, Ordering::SeqCst);
                    Ok(table)
                }
            })
            .await
            .unwrap();

        assert_eq!(results.len(), 10);
        assert!(peak.load(Ordering::SeqCst) <= 3);
        for (i, r) in results.iter().enumerate() {
            assert_eq!(r.table, format!("t{}", i));
            assert_eq!(r.result.as_ref().unwrap(), &r.table);
        }
    }

    #[tokio::test]
    async fn test_starts_in_submission_order() {
        let started = Arc::new(Mutex::new(Vec::new()));
        let pool = WorkerPool::new(1, Duration::ZERO);

        pool.run(names(4), |table| {
            let started = started.clone();
            async move {
                started.lock().push(table);
                Ok(())
            }
        })
        .await
        .unwrap();

        assert_eq!(*started.lock(), names(4));
    }

    #[tokio::test]
    async fn test_failures_do_not_cancel_siblings() {
        let completed = Arc::new(AtomicUsize::new(0));
        let pool = WorkerPool::new(4, Duration::ZERO);

        let results = pool
            .run(names(4), |table| {
                let completed = completed.clone();
                async move {
                    if table == "t1" {
                        return Err(Error::Internal("boom".into()));
                    }
                    if table == "t2" {
                        panic!("worker panic");
                    }
                    tokio::time::sleep(Duration::from_millis(5)).await;
                    completed.fetch_add(1, Ordering::SeqCst);
                    Ok(())
                }
            })
            .await
            .unwrap();

        assert_eq!(completed.load(Ordering::SeqCst), 2);
        assert!(results[0].result.is_ok());
        assert_matches!(results[1].result, Err(Error::Internal(_)));
        assert_matches!(results[2].result, Err(Error::WorkerPanicked { .. }));
        assert!(results[3].result.is_ok());
    }

    #[tokio::test]
    async fn test_panicked_worker_reports_its_message() {
        let pool = WorkerPool::new(2, Duration::ZERO);

        let results = pool
            .run(names(2), |table| async move {
                if table == "t1" {
                    panic!("page {} is corrupt", 7);
                }
                Ok::<(), Error>(())
            })
            .await
            .unwrap();

        assert!(results[0].result.is_ok());
        assert_matches!(
            results[1].result,
            Err(Error::WorkerPanicked { ref table, ref reason })
                if table == "t1" && reason == "page 7 is corrupt"
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_start_signal_spaces_workers() {
        let started = Arc::new(Mutex::new(Vec::new()));
        let pool = WorkerPool::new(8, Duration::from_secs(1));
        let origin = tokio::time::Instant::now();

        pool.run(names(3), |_| {
            let started = started.clone();
            async move {
                started.lock().push(origin.elapsed());
                Ok(())
            }
        })
        .await
        .unwrap();

        let started = started.lock();
        assert_eq!(started.len(), 3);
        assert!(started[1] >= Duration::from_secs(1));
        assert!(started[2] >= Duration::from_secs(2));
    }
}
