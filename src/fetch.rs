//! Bounded concurrent fan-out helpers.
//!
//! Venue refreshes hit N independent, high-latency services; these helpers
//! run one future per work item with a fixed concurrency bound and hand
//! results back in the original item order, so callers can zip them against
//! their inputs.

use std::future::Future;

use futures_util::stream::{self, StreamExt};
use tokio_util::sync::CancellationToken;

/// Run `f` over every item with at most `workers` in flight.
///
/// Results are returned in input order regardless of completion order.
pub async fn fan_out<T, R, F, Fut>(items: Vec<T>, workers: usize, f: F) -> Vec<R>
where
    F: Fn(T) -> Fut,
    Fut: Future<Output = R>,
{
    stream::iter(items.into_iter().map(|item| {
        let fut = f(item);
        async move { fut.await }
    }))
    .buffered(workers.max(1))
    .collect()
    .await
}

/// Like [`fan_out`], but abandons outstanding work once `cancel` fires.
///
/// Items that were cancelled before completing yield `None`; items that
/// finished first keep their results, still in input order.
pub async fn fan_out_cancellable<T, R, F, Fut>(
    items: Vec<T>,
    workers: usize,
    cancel: &CancellationToken,
    f: F,
) -> Vec<Option<R>>
where
    F: Fn(T) -> Fut,
    Fut: Future<Output = R>,
{
    stream::iter(items.into_iter().map(|item| {
        let cancel = cancel.clone();
        let fut = f(item);
        async move {
            tokio::select! {
                _ = cancel.cancelled() => None,
                result = fut => Some(result),
            }
        }
    }))
    .buffered(workers.max(1))
    .collect()
    .await
}
