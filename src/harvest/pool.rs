//! Bounded-concurrency fan-out over page-level work.

use std::future::Future;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::warn;

/// Default number of concurrent workers per batch.
pub const DEFAULT_MAX_WORKERS: usize = 5;

/// Run `worker` over every item with at most `max_workers` in flight.
///
/// Results are flattened in completion order, not submission order. A
/// worker failure is logged and its results excluded; one bad page never
/// aborts the batch.
pub async fn fetch_many<I, T, F, Fut>(items: Vec<I>, worker: F, max_workers: usize) -> Vec<T>
where
    T: Send + 'static,
    F: Fn(I) -> Fut,
    Fut: Future<Output = anyhow::Result<Vec<T>>> + Send + 'static,
{
    let semaphore = Arc::new(Semaphore::new(max_workers.max(1)));
    let mut tasks = JoinSet::new();

    for item in items {
        let work = worker(item);
        let semaphore = Arc::clone(&semaphore);
        tasks.spawn(async move {
            let Ok(_permit) = semaphore.acquire_owned().await else {
                return None;
            };
            match work.await {
                Ok(results) => Some(results),
                Err(e) => {
                    warn!("harvest worker failed: {e}");
                    None
                }
            }
        });
    }

    let mut aggregate = Vec::new();
    while let Some(joined) = tasks.join_next().await {
        match joined {
            Ok(Some(results)) => aggregate.extend(results),
            Ok(None) => {}
            Err(e) => warn!("harvest worker panicked: {e}"),
        }
    }
    aggregate
}
