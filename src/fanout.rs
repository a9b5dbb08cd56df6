//! Fan-out/fan-in over tokio tasks
//!
//! Each item gets its own spawned task. Tasks report `(index, result)` on a
//! single channel and the caller places every result in the slot of the
//! item that produced it, so output order always matches input order.

use std::future::Future;
use tokio::sync::mpsc;
use tracing::warn;

/// Run `task` for every item concurrently
///
/// A `None` slot means that item's task panicked before reporting.
pub(crate) async fn fan_out<T, R, F, Fut>(items: Vec<T>, task: F) -> Vec<Option<R>>
where
    T: Send + 'static,
    R: Send + 'static,
    F: Fn(T) -> Fut,
    Fut: Future<Output = R> + Send + 'static,
{
    let count = items.len();
    let (tx, mut rx) = mpsc::unbounded_channel::<(usize, R)>();

    for (index, item) in items.into_iter().enumerate() {
        let tx = tx.clone();
        let work = task(item);
        tokio::spawn(async move {
            let result = work.await;
            // The receiver outlives every sender
            let _ = tx.send((index, result));
        });
    }
    drop(tx);

    let mut slots: Vec<Option<R>> = std::iter::repeat_with(|| None).take(count).collect();
    while let Some((index, result)) = rx.recv().await {
        slots[index] = Some(result);
    }

    let lost = slots.iter().filter(|s| s.is_none()).count();
    if lost > 0 {
        warn!(lost, "some tasks ended without reporting a result");
    }
    slots
}
