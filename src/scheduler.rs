//! Bounded fan-out of independent tasks
//!
//! Every task is started at once but its body only runs after it acquires one
//! of `max_concurrency` semaphore permits. The permit is released when the
//! task finishes, successfully or not, and [`ConcurrencyScheduler::run_all`]
//! returns only after every task has completed. A failing task never cancels
//! its siblings; results come back in input order for the caller to judge.

use futures::future::join_all;
use std::future::Future;
use std::sync::Arc;
use tokio::sync::Semaphore;

use crate::constants::pages::DEFAULT_MAX_CONCURRENCY;
use crate::types::{Result, WikiError};

#[derive(Debug, Clone, Copy)]
pub struct ConcurrencyScheduler {
    max_concurrency: usize,
}

impl Default for ConcurrencyScheduler {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_CONCURRENCY)
    }
}

impl ConcurrencyScheduler {
    /// A ceiling of zero is treated as one
    pub fn new(max_concurrency: usize) -> Self {
        Self {
            max_concurrency: max_concurrency.max(1),
        }
    }

    pub fn max_concurrency(&self) -> usize {
        self.max_concurrency
    }

    /// Run all tasks with at most `max_concurrency` in flight
    pub async fn run_all<T, F>(&self, tasks: impl IntoIterator<Item = F>) -> Vec<Result<T>>
    where
        F: Future<Output = Result<T>>,
    {
        let gate = Arc::new(Semaphore::new(self.max_concurrency));
        let guarded = tasks.into_iter().map(|task| {
            let gate = Arc::clone(&gate);
            async move {
                let _permit = gate
                    .acquire_owned()
                    .await
                    .map_err(|e| WikiError::Config(format!("scheduler closed: {e}")))?;
                task.await
            }
        });
        join_all(guarded).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[tokio::test]
    async fn test_never_exceeds_ceiling_and_waits_for_all() {
        let running = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));
        let finished = Arc::new(AtomicUsize::new(0));

        let tasks = (0..10).map(|i| {
            let running = Arc::clone(&running);
            let peak = Arc::clone(&peak);
            let finished = Arc::clone(&finished);
            async move {
                let now = running.fetch_add(1, Ordering::SeqCst) + 1;
                peak.fetch_max(now, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(5 + (i % 3) * 5)).await;
                running.fetch_sub(1, Ordering::SeqCst);
                finished.fetch_add(1, Ordering::SeqCst);
                if i % 4 == 0 {
                    Err(WikiError::LlmApi(format!("task {i} failed")))
                } else {
                    Ok(i)
                }
            }
        });

        let results = ConcurrencyScheduler::new(3).run_all(tasks).await;

        assert_eq!(results.len(), 10);
        assert_eq!(finished.load(Ordering::SeqCst), 10);
        assert!(peak.load(Ordering::SeqCst) <= 3);
        assert_eq!(peak.load(Ordering::SeqCst), 3);
        assert_eq!(results.iter().filter(|r| r.is_err()).count(), 3);
        // input order is preserved
        assert_eq!(*results[1].as_ref().unwrap(), 1);
    }

    #[tokio::test]
    async fn test_zero_ceiling_still_makes_progress() {
        let scheduler = ConcurrencyScheduler::new(0);
        assert_eq!(scheduler.max_concurrency(), 1);
        let results = scheduler
            .run_all((0..3).map(|i| async move { Ok::<_, WikiError>(i * 2) }))
            .await;
        let values: Vec<_> = results.into_iter().map(|r| r.unwrap()).collect();
        assert_eq!(values, vec![0, 2, 4]);
    }

    #[tokio::test]
    async fn test_empty_input() {
        let results: Vec<Result<()>> = ConcurrencyScheduler::default()
            .run_all(Vec::<std::future::Ready<Result<()>>>::new())
            .await;
        assert!(results.is_empty());
    }
}
