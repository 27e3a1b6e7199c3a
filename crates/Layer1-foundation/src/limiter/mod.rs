//! Concurrency Limiter - 동시 실행 제한 큐
//!
//! Every outbound fetch goes through one shared limiter so the total number
//! of in-flight requests stays bounded no matter which resolver issued them.
//!
//! - FIFO queue of pending tasks plus an in-flight counter
//! - A task is dispatched only while `in_flight < limit`
//! - On completion (success, failure or panic) the next queued task starts
//! - No timeout or cancellation here; that belongs to the operation itself
//!
//! ## Example
//!
//! ```ignore
//! let limiter = ConcurrencyLimiter::new(4);
//! let body = limiter.schedule(move || async move { fetcher.fetch(request).await }).await?;
//! ```

use crate::{Error, Result};
use futures::future::BoxFuture;
use futures::FutureExt;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::future::Future;
use std::sync::Arc;
use tokio::sync::oneshot;
use tracing::trace;

/// Default maximum number of concurrent operations
pub const DEFAULT_MAX_CONCURRENT: usize = 4;

/// Point-in-time view of the limiter
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LimiterSnapshot {
    pub limit: usize,
    pub in_flight: usize,
    pub queued: usize,
}

/// Bounded-parallelism FIFO task queue
///
/// Cloning is cheap; clones share the same queue and counter.
#[derive(Clone)]
pub struct ConcurrencyLimiter {
    inner: Arc<LimiterInner>,
}

struct LimiterInner {
    limit: usize,
    state: Mutex<LimiterState>,
}

struct LimiterState {
    queue: VecDeque<BoxFuture<'static, ()>>,
    in_flight: usize,
}

impl ConcurrencyLimiter {
    /// Create a limiter; `max_concurrent` below 1 is clamped to 1
    pub fn new(max_concurrent: usize) -> Self {
        Self {
            inner: Arc::new(LimiterInner {
                limit: max_concurrent.max(1),
                state: Mutex::new(LimiterState {
                    queue: VecDeque::new(),
                    in_flight: 0,
                }),
            }),
        }
    }

    pub fn limit(&self) -> usize {
        self.inner.limit
    }

    pub fn snapshot(&self) -> LimiterSnapshot {
        let state = self.inner.state.lock();
        LimiterSnapshot {
            limit: self.inner.limit,
            in_flight: state.in_flight,
            queued: state.queue.len(),
        }
    }

    /// Queue an operation and return a future for its result
    ///
    /// The task is enqueued before this returns, so submission order is
    /// dispatch order even if the returned futures are polled out of order.
    /// Must be called from within a tokio runtime.
    pub fn schedule<F, Fut, T>(&self, operation: F) -> impl Future<Output = Result<T>> + Send + 'static
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Result<T>> + Send + 'static,
        T: Send + 'static,
    {
        let (tx, rx) = oneshot::channel();
        let task = async move {
            let result = operation().await;
            // Caller may have stopped waiting
            let _ = tx.send(result);
        }
        .boxed();

        self.inner.state.lock().queue.push_back(task);
        LimiterInner::dispatch(&self.inner);

        async move {
            rx.await.map_err(|_| {
                Error::Internal("limiter task ended without producing a result".to_string())
            })?
        }
    }
}

impl Default for ConcurrencyLimiter {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_CONCURRENT)
    }
}

impl LimiterInner {
    fn dispatch(this: &Arc<Self>) {
        loop {
            let task = {
                let mut state = this.state.lock();
                if state.in_flight >= this.limit {
                    return;
                }
                match state.queue.pop_front() {
                    Some(task) => {
                        state.in_flight += 1;
                        trace!(
                            "Dispatching task ({} in flight, {} queued)",
                            state.in_flight,
                            state.queue.len()
                        );
                        task
                    }
                    None => return,
                }
            };

            let guard = InFlightGuard {
                inner: Arc::clone(this),
            };
            tokio::spawn(async move {
                let _guard = guard;
                task.await;
            });
        }
    }
}

/// Releases the in-flight slot even if the task panics
struct InFlightGuard {
    inner: Arc<LimiterInner>,
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.inner.state.lock().in_flight -= 1;
        LimiterInner::dispatch(&self.inner);
    }
}
