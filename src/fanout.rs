//! Concurrent map-then-join over index-owned slots.
//!
//! Both the dashboard (one task per instance) and the per-instance
//! aggregators (one task per query or repository) go through [`FanOut`].

use std::{future::Future, num::NonZeroUsize, sync::Arc};
use tokio::{sync::Semaphore, task::JoinSet};

/// Spawns one task per input and waits for all of them.
#[derive(Debug, Clone, Copy, Default)]
pub struct FanOut {
    limit: Option<NonZeroUsize>,
}

impl FanOut {
    /// One task per item, all in flight at once.
    #[must_use]
    pub fn unbounded() -> Self {
        Self { limit: None }
    }

    /// At most `limit` tasks in flight; `None` means unbounded.
    #[must_use]
    pub fn bounded(limit: Option<NonZeroUsize>) -> Self {
        Self { limit }
    }

    #[must_use]
    pub fn limit(&self) -> Option<NonZeroUsize> {
        self.limit
    }

    /// Runs every future on the runtime and returns their outputs in input order.
    ///
    /// Slot `i` holds the output of the `i`-th future, or `None` when that
    /// task panicked. The result always has one slot per input.
    pub async fn join_indexed<I, Fut, T>(&self, tasks: I) -> Vec<Option<T>>
    where
        I: IntoIterator<Item = Fut>,
        Fut: Future<Output = T> + Send + 'static,
        T: Send + 'static,
    {
        let permits = self.limit.map(|n| Arc::new(Semaphore::new(n.get())));

        let mut join_set = JoinSet::new();
        let mut count = 0usize;
        for (index, task) in tasks.into_iter().enumerate() {
            let permits = permits.clone();
            join_set.spawn(async move {
                let _permit = match &permits {
                    Some(semaphore) => semaphore.acquire().await.ok(),
                    None => None,
                };
                (index, task.await)
            });
            count += 1;
        }

        let mut slots: Vec<Option<T>> = std::iter::repeat_with(|| None).take(count).collect();
        while let Some(joined) = join_set.join_next().await {
            match joined {
                Ok((index, output)) => slots[index] = Some(output),
                Err(err) => tracing::error!(error = %err, "fan-out task did not complete"),
            }
        }
        slots
    }
}
