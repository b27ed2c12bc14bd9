//! In-flight request deduplication.
//!
//! Concurrent callers asking for the same key share one underlying
//! operation and all observe its outcome, success or failure. The operation
//! runs on a spawned task and its entry is dropped as soon as it settles,
//! so the next call after settlement always starts fresh, even if every
//! earlier caller gave up waiting. Must be used from within a tokio runtime.

use crate::{Error, Result};
use futures_util::future::{BoxFuture, FutureExt, Shared};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

type SharedResult<T> = Shared<BoxFuture<'static, Result<T>>>;

struct InFlight<T: Clone> {
    id: u64,
    future: SharedResult<T>,
}

type InFlightTable<T> = Arc<Mutex<HashMap<String, InFlight<T>>>>;

/// Merges concurrent operations that share a key.
///
/// # Examples
///
/// ```
/// use quire::dedup::Deduplicator;
///
/// # #[tokio::main]
/// # async fn main() -> Result<(), quire::Error> {
/// let dedup = Deduplicator::<u32>::new();
///
/// let (a, b) = tokio::join!(
///     dedup.dedupe("GET:/v1/projects", || async { Ok(7) }),
///     dedup.dedupe("GET:/v1/projects", || async { Ok(8) }),
/// );
///
/// // Both callers observe the first operation's result.
/// assert_eq!(a?, 7);
/// assert_eq!(b?, 7);
/// assert!(dedup.is_empty());
/// # Ok(())
/// # }
/// ```
pub struct Deduplicator<T: Clone> {
    inflight: InFlightTable<T>,
    next_id: AtomicU64,
}

impl<T> Deduplicator<T>
where
    T: Clone + Send + Sync + 'static,
{
    /// Creates an empty deduplicator.
    pub fn new() -> Self {
        Self {
            inflight: Arc::new(Mutex::new(HashMap::new())),
            next_id: AtomicU64::new(0),
        }
    }

    /// Runs `factory`'s operation, or joins one already running under `key`.
    ///
    /// `factory` is only invoked when no operation for `key` is in flight.
    pub async fn dedupe<F, Fut>(&self, key: impl Into<String>, factory: F) -> Result<T>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T>> + Send + 'static,
    {
        let key = key.into();

        let shared = {
            let mut inflight = self.inflight.lock();
            match inflight.get(&key) {
                Some(existing) => {
                    tracing::debug!(key = %key, "joining in-flight request");
                    existing.future.clone()
                }
                None => {
                    let id = self.next_id.fetch_add(1, Ordering::Relaxed);
                    // Spawned while the table lock is held, so the task
                    // cannot settle before its entry exists.
                    let task = tokio::spawn(settle_and_remove(
                        Arc::clone(&self.inflight),
                        key.clone(),
                        id,
                        factory(),
                    ));

                    let table = Arc::clone(&self.inflight);
                    let task_key = key.clone();
                    let future = async move {
                        task.await.unwrap_or_else(|err| {
                            remove_if_current(&table, &task_key, id);
                            Err(Error::unknown(
                                None,
                                format!("In-flight request task failed: {}", err),
                            ))
                        })
                    }
                    .boxed()
                    .shared();

                    inflight.insert(
                        key,
                        InFlight {
                            id,
                            future: future.clone(),
                        },
                    );
                    future
                }
            }
        };

        shared.await
    }

    /// Returns the number of operations currently in flight.
    pub fn len(&self) -> usize {
        self.inflight.lock().len()
    }

    /// Returns `true` when nothing is in flight.
    pub fn is_empty(&self) -> bool {
        self.inflight.lock().is_empty()
    }
}

impl<T> Default for Deduplicator<T>
where
    T: Clone + Send + Sync + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

// The operation runs on its own task, so it settles and leaves the table
// even when every waiter has been dropped. The id check keeps a late removal
// from dropping a newer operation registered under the same key.
async fn settle_and_remove<T, Fut>(
    table: InFlightTable<T>,
    key: String,
    id: u64,
    operation: Fut,
) -> Result<T>
where
    T: Clone,
    Fut: Future<Output = Result<T>>,
{
    let result = operation.await;
    remove_if_current(&table, &key, id);
    result
}

fn remove_if_current<T: Clone>(table: &InFlightTable<T>, key: &str, id: u64) {
    let mut inflight = table.lock();
    if inflight.get(key).is_some_and(|entry| entry.id == id) {
        inflight.remove(key);
    }
}
