//! Bounded concurrency for fan-out request paths.
//!
//! [`ConcurrencyLimiter`] is a counting semaphore built on
//! `tokio::sync::Semaphore`, whose waiters are served in FIFO order. A permit
//! is released when its guard drops, so every exit path of the guarded
//! operation (success, error, panic, or cancellation of the future) gives
//! the slot back.
//!
//! Author: kelexine (<https://github.com/kelexine>)

use futures::stream::{FuturesUnordered, StreamExt};
use std::future::Future;
use std::sync::Arc;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tracing::debug;

/// Caps how many requests may be in flight at once.
#[derive(Debug, Clone)]
pub struct ConcurrencyLimiter {
    semaphore: Arc<Semaphore>,
    limit: usize,
}

/// An acquired slot. Dropping it releases the slot to the longest waiter.
#[derive(Debug)]
pub struct LimiterPermit {
    _permit: OwnedSemaphorePermit,
}

impl ConcurrencyLimiter {
    /// Create a limiter allowing `limit` concurrent holders (minimum 1).
    pub fn new(limit: usize) -> Self {
        let limit = limit.max(1);
        Self {
            semaphore: Arc::new(Semaphore::new(limit)),
            limit,
        }
    }

    /// Wait for a free slot.
    pub async fn acquire(&self) -> LimiterPermit {
        // The semaphore is owned by this limiter and never closed.
        let permit = match self.semaphore.clone().acquire_owned().await {
            Ok(permit) => permit,
            Err(_) => unreachable!("limiter semaphore is never closed"),
        };
        LimiterPermit { _permit: permit }
    }

    /// Take a slot only if one is free right now.
    pub fn try_acquire(&self) -> Option<LimiterPermit> {
        self.semaphore
            .clone()
            .try_acquire_owned()
            .ok()
            .map(|permit| LimiterPermit { _permit: permit })
    }

    /// Run `operation` while holding a slot.
    pub async fn run<F, T>(&self, operation: F) -> T
    where
        F: Future<Output = T>,
    {
        let _permit = self.acquire().await;
        operation.await
    }

    /// Run `f` over every item with at most `limit` calls in flight and
    /// return the outputs in the original item order.
    pub async fn map_bounded<I, T, F, Fut, R>(&self, items: I, f: F) -> Vec<R>
    where
        I: IntoIterator<Item = T>,
        F: Fn(T) -> Fut,
        Fut: Future<Output = R>,
    {
        let tasks: FuturesUnordered<_> = items
            .into_iter()
            .enumerate()
            .map(|(index, item)| {
                let fut = f(item);
                async move {
                    let _permit = self.acquire().await;
                    (index, fut.await)
                }
            })
            .collect();

        let mut results: Vec<(usize, R)> = tasks.collect().await;
        results.sort_by_key(|(index, _)| *index);
        debug!("Bounded fan-out completed {} operations", results.len());
        results.into_iter().map(|(_, r)| r).collect()
    }

    pub fn limit(&self) -> usize {
        self.limit
    }

    /// Slots not currently held.
    pub fn available(&self) -> usize {
        self.semaphore.available_permits()
    }

    /// Slots currently held.
    pub fn in_flight(&self) -> usize {
        self.limit - self.available()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio_test::{assert_pending, assert_ready, task};

    #[tokio::test]
    async fn test_limit_plus_k_waiters_are_fifo() {
        let limiter = ConcurrencyLimiter::new(2);

        let held_a = limiter.acquire().await;
        let held_b = limiter.acquire().await;
        assert_eq!(limiter.in_flight(), 2);

        let mut waiter_1 = task::spawn(limiter.acquire());
        let mut waiter_2 = task::spawn(limiter.acquire());
        let mut waiter_3 = task::spawn(limiter.acquire());
        assert_pending!(waiter_1.poll());
        assert_pending!(waiter_2.poll());
        assert_pending!(waiter_3.poll());

        drop(held_a);
        assert!(waiter_1.is_woken());
        let permit_1 = assert_ready!(waiter_1.poll());
        assert_pending!(waiter_2.poll());
        assert_pending!(waiter_3.poll());

        drop(held_b);
        let permit_2 = assert_ready!(waiter_2.poll());
        assert_pending!(waiter_3.poll());

        drop(permit_1);
        let _permit_3 = assert_ready!(waiter_3.poll());
        drop(permit_2);
        assert_eq!(limiter.in_flight(), 1);
    }

    #[tokio::test]
    async fn test_permit_released_on_error_path() {
        let limiter = ConcurrencyLimiter::new(1);

        let result: std::result::Result<(), &str> = limiter.run(async { Err("boom") }).await;
        assert!(result.is_err());
        assert_eq!(limiter.available(), 1);
        assert!(limiter.try_acquire().is_some());
    }

    #[tokio::test]
    async fn test_map_bounded_respects_limit_and_order() {
        let limiter = ConcurrencyLimiter::new(3);
        let current = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));

        let outputs = limiter
            .map_bounded(0..10u64, |i| {
                let current = current.clone();
                let peak = peak.clone();
                async move {
                    let now = current.fetch_add(1, Ordering::SeqCst) + 1;
                    peak.fetch_max(now, Ordering::SeqCst);
                    tokio::time::sleep(std::time::Duration::from_millis(10 - i)).await;
                    current.fetch_sub(1, Ordering::SeqCst);
                    i * 2
                }
            })
            .await;

        assert_eq!(outputs, (0..10u64).map(|i| i * 2).collect::<Vec<_>>());
        assert!(peak.load(Ordering::SeqCst) <= 3);
    }

    #[test]
    fn test_zero_limit_clamped() {
        assert_eq!(ConcurrencyLimiter::new(0).limit(), 1);
    }
}
