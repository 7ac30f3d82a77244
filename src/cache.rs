//! Small TTL cache cells for rarely-changing remote reads.
//!
//! Each cell holds one value with the instant it was fetched. Reads within
//! the max-age return the cached copy; a refresh runs while the cell lock is
//! held, so concurrent identical reads coalesce onto a single in-flight
//! fetch instead of hammering the store. `force` skips the freshness check
//! (used right after a state-changing write). A failed refresh falls back to
//! the stale value when one exists.

use std::future::Future;
use std::time::{Duration, Instant};

use tokio::sync::Mutex;
use tracing::warn;

struct Slot<T> {
    fetched_at: Instant,
    value: T,
}

pub struct CacheCell<T> {
    name: &'static str,
    max_age: Duration,
    slot: Mutex<Option<Slot<T>>>,
}

impl<T: Clone> CacheCell<T> {
    pub fn new(name: &'static str, max_age: Duration) -> Self {
        Self { name, max_age, slot: Mutex::new(None) }
    }

    /// Return the cached value, refreshing through `fetch` when it is
    /// missing, older than the max-age, or `force` is set.
    pub async fn get_with<F, Fut>(&self, force: bool, fetch: F) -> Option<T>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, String>>,
    {
        // Callers queueing here while a refresh is in flight wake up to a
        // fresh slot and take the fast path below.
        let mut slot = self.slot.lock().await;

        if !force {
            if let Some(current) = slot.as_ref() {
                if current.fetched_at.elapsed() < self.max_age {
                    return Some(current.value.clone());
                }
            }
        }

        match fetch().await {
            Ok(value) => {
                *slot = Some(Slot { fetched_at: Instant::now(), value: value.clone() });
                Some(value)
            }
            Err(e) => {
                warn!(target: "korrika_backend", cell = self.name, error = %e, "Cache refresh failed; serving stale value if any");
                slot.as_ref().map(|s| s.value.clone())
            }
        }
    }

    /// Drop the cached value so the next read refreshes.
    pub async fn invalidate(&self) {
        *self.slot.lock().await = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn counting_fetch(
        counter: Arc<AtomicUsize>,
        result: Result<u32, String>,
    ) -> impl FnOnce() -> std::future::Ready<Result<u32, String>> {
        move || {
            counter.fetch_add(1, Ordering::SeqCst);
            std::future::ready(result)
        }
    }

    #[tokio::test]
    async fn second_read_within_max_age_does_not_refetch() {
        let cell = CacheCell::new("test", Duration::from_secs(30));
        let fetches = Arc::new(AtomicUsize::new(0));

        let v1 = cell.get_with(false, counting_fetch(fetches.clone(), Ok(1))).await;
        let v2 = cell.get_with(false, counting_fetch(fetches.clone(), Ok(2))).await;

        assert_eq!(v1, Some(1));
        assert_eq!(v2, Some(1));
        assert_eq!(fetches.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn force_bypasses_the_freshness_check() {
        let cell = CacheCell::new("test", Duration::from_secs(30));
        let fetches = Arc::new(AtomicUsize::new(0));

        cell.get_with(false, counting_fetch(fetches.clone(), Ok(1))).await;
        let forced = cell.get_with(true, counting_fetch(fetches.clone(), Ok(2))).await;

        assert_eq!(forced, Some(2));
        assert_eq!(fetches.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn failed_refresh_keeps_serving_the_stale_value() {
        let cell = CacheCell::new("test", Duration::from_millis(0));
        let fetches = Arc::new(AtomicUsize::new(0));

        cell.get_with(false, counting_fetch(fetches.clone(), Ok(7))).await;
        // max_age 0 forces a refresh attempt, which fails.
        let stale = cell
            .get_with(false, counting_fetch(fetches.clone(), Err("store down".into())))
            .await;

        assert_eq!(stale, Some(7));
    }

    #[tokio::test]
    async fn failed_refresh_with_no_prior_value_yields_none() {
        let cell: CacheCell<u32> = CacheCell::new("test", Duration::from_secs(30));
        let missing = cell.get_with(false, || std::future::ready(Err("boom".into()))).await;
        assert_eq!(missing, None);
    }

    #[tokio::test]
    async fn concurrent_reads_coalesce_into_one_fetch() {
        let cell = Arc::new(CacheCell::new("test", Duration::from_secs(30)));
        let fetches = Arc::new(AtomicUsize::new(0));

        let tasks: Vec<_> = (0..8)
            .map(|_| {
                let cell = cell.clone();
                let fetches = fetches.clone();
                tokio::spawn(async move {
                    cell.get_with(false, move || async move {
                        fetches.fetch_add(1, Ordering::SeqCst);
                        tokio::task::yield_now().await;
                        Ok(42u32)
                    })
                    .await
                })
            })
            .collect();

        for task in tasks {
            assert_eq!(task.await.unwrap(), Some(42));
        }
        assert_eq!(fetches.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn invalidate_forces_the_next_read_to_refresh() {
        let cell = CacheCell::new("test", Duration::from_secs(30));
        let fetches = Arc::new(AtomicUsize::new(0));

        cell.get_with(false, counting_fetch(fetches.clone(), Ok(1))).await;
        cell.invalidate().await;
        let v = cell.get_with(false, counting_fetch(fetches.clone(), Ok(2))).await;

        assert_eq!(v, Some(2));
        assert_eq!(fetches.load(Ordering::SeqCst), 2);
    }
}
