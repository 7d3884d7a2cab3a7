//! Fixed-size batches of concurrent work.
//!
//! Items are split into chunks of `batch_size`; every task in a chunk runs
//! concurrently and the whole chunk is awaited before the next one starts.
//! A failing or panicking item yields an `Err` in its own slot and never
//! affects its siblings. Results are returned in input order.

use std::future::Future;
use std::sync::Arc;

use gitfam_core::FamError;
use tokio::task::JoinSet;
use tracing::debug;

/// Default number of per-file lookups in flight.
pub const DEFAULT_BATCH_SIZE: usize = 10;

/// Default number of users or reviewer candidates scored at once.
pub const USER_BATCH_SIZE: usize = 3;

/// Run a blocking `f` over `items`, `batch_size` at a time.
///
/// # Examples
///
/// ```
/// use gitfam_scoring::batch::run_blocking_batches;
///
/// let rt = tokio::runtime::Runtime::new().unwrap();
/// let out = rt.block_on(run_blocking_batches(vec![1, 2, 3], 2, |n| Ok(n * 10)));
/// let values: Vec<i32> = out.into_iter().map(Result::unwrap).collect();
/// assert_eq!(values, vec![10, 20, 30]);
/// ```
pub async fn run_blocking_batches<T, R, F>(
    items: Vec<T>,
    batch_size: usize,
    f: F,
) -> Vec<Result<R, FamError>>
where
    T: Send + 'static,
    R: Send + 'static,
    F: Fn(T) -> Result<R, FamError> + Send + Sync + 'static,
{
    let f = Arc::new(f);
    let total = items.len();
    let mut results = Vec::with_capacity(total);
    let mut items = items.into_iter().peekable();
    let batch_size = batch_size.max(1);

    while items.peek().is_some() {
        let mut set = JoinSet::new();
        let mut len = 0;
        for (idx, item) in items.by_ref().take(batch_size).enumerate() {
            let f = Arc::clone(&f);
            set.spawn_blocking(move || (idx, f(item)));
            len += 1;
        }
        results.extend(drain(set, len).await);
        debug!(done = results.len(), total, "blocking batch finished");
    }

    results
}

/// Run an async `f` over `items`, `batch_size` at a time.
pub async fn run_async_batches<T, R, F, Fut>(
    items: Vec<T>,
    batch_size: usize,
    f: F,
) -> Vec<Result<R, FamError>>
where
    T: Send + 'static,
    R: Send + 'static,
    F: Fn(T) -> Fut,
    Fut: Future<Output = Result<R, FamError>> + Send + 'static,
{
    let total = items.len();
    let mut results = Vec::with_capacity(total);
    let mut items = items.into_iter().peekable();
    let batch_size = batch_size.max(1);

    while items.peek().is_some() {
        let mut set = JoinSet::new();
        let mut len = 0;
        for (idx, item) in items.by_ref().take(batch_size).enumerate() {
            let fut = f(item);
            set.spawn(async move { (idx, fut.await) });
            len += 1;
        }
        results.extend(drain(set, len).await);
        debug!(done = results.len(), total, "async batch finished");
    }

    results
}

/// Await every task in `set`, placing results by batch index. Slots whose
/// task panicked stay empty and become [`FamError::Batch`].
async fn drain<R: Send + 'static>(
    mut set: JoinSet<(usize, Result<R, FamError>)>,
    len: usize,
) -> Vec<Result<R, FamError>> {
    let mut slots: Vec<Option<Result<R, FamError>>> = (0..len).map(|_| None).collect();
    while let Some(joined) = set.join_next().await {
        match joined {
            Ok((idx, result)) => slots[idx] = Some(result),
            Err(e) => debug!(error = %e, "batch task did not complete"),
        }
    }
    slots
        .into_iter()
        .map(|slot| slot.unwrap_or_else(|| Err(FamError::Batch("task panicked".into()))))
        .collect()
}
