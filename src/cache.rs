//! Time-bounded cache with single-flight refresh.

use std::future::Future;
use std::time::Duration;

use tokio::sync::Mutex;
use tokio::time::Instant;

/// Staleness bound for cached epoch info.
pub const EPOCH_INFO_TTL: Duration = Duration::from_secs(30);

#[derive(Debug)]
struct CacheEntry<T> {
    value: T,
    fetched_at: Instant,
}

/// Holds one value for at most `ttl`.
///
/// The lock is held across a refresh, so concurrent callers that find the
/// entry stale wait for the in-flight fetch and then see its result instead
/// of issuing their own. A failed fetch leaves the previous entry in place
/// but is still returned to the caller as an error.
#[derive(Debug)]
pub struct TtlCache<T> {
    ttl: Duration,
    entry: Mutex<Option<CacheEntry<T>>>,
}

impl<T: Clone> TtlCache<T> {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entry: Mutex::new(None),
        }
    }

    /// Return the cached value if it is younger than the TTL, otherwise call
    /// `fetch` and store its result.
    pub async fn get_or_refresh<F, Fut, E>(&self, fetch: F) -> Result<T, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let mut entry = self.entry.lock().await;

        if let Some(cached) = entry.as_ref() {
            if cached.fetched_at.elapsed() < self.ttl {
                return Ok(cached.value.clone());
            }
        }

        let value = fetch().await?;
        *entry = Some(CacheEntry {
            value: value.clone(),
            fetched_at: Instant::now(),
        });
        Ok(value)
    }

    /// Current value regardless of age.
    pub async fn peek(&self) -> Option<T> {
        self.entry.lock().await.as_ref().map(|e| e.value.clone())
    }

    #[cfg(test)]
    pub(crate) async fn invalidate(&self) {
        *self.entry.lock().await = None;
    }
}

impl<T: Clone> Default for TtlCache<T> {
    fn default() -> Self {
        Self::new(EPOCH_INFO_TTL)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    async fn fetch_counted(calls: &AtomicUsize, value: u64) -> Result<u64, String> {
        calls.fetch_add(1, Ordering::SeqCst);
        Ok(value)
    }

    #[tokio::test(start_paused = true)]
    async fn test_hit_within_ttl() {
        let cache = TtlCache::default();
        let calls = AtomicUsize::new(0);

        assert_eq!(cache.get_or_refresh(|| fetch_counted(&calls, 7)).await, Ok(7));
        tokio::time::advance(Duration::from_secs(29)).await;
        assert_eq!(cache.get_or_refresh(|| fetch_counted(&calls, 8)).await, Ok(7));

        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_refresh_after_ttl() {
        let cache = TtlCache::new(Duration::from_secs(30));
        let calls = AtomicUsize::new(0);

        cache.get_or_refresh(|| fetch_counted(&calls, 1)).await.unwrap();
        tokio::time::advance(Duration::from_secs(30)).await;
        let v = cache.get_or_refresh(|| fetch_counted(&calls, 2)).await.unwrap();

        assert_eq!(v, 2);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_at_most_one_query_per_window() {
        let cache = TtlCache::default();
        let calls = AtomicUsize::new(0);

        // One lookup every 2s for 90s spans three 30s windows.
        for i in 0..45 {
            cache.get_or_refresh(|| fetch_counted(&calls, i)).await.unwrap();
            tokio::time::advance(Duration::from_secs(2)).await;
        }

        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_refresh_keeps_entry() {
        let cache = TtlCache::default();

        cache.get_or_refresh(|| async { Ok::<_, String>(5u64) }).await.unwrap();
        tokio::time::advance(Duration::from_secs(31)).await;

        let err = cache
            .get_or_refresh(|| async { Err::<u64, _>("timeout".to_string()) })
            .await;
        assert_eq!(err, Err("timeout".to_string()));
        assert_eq!(cache.peek().await, Some(5));
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrent_callers_share_one_fetch() {
        let cache = Arc::new(TtlCache::default());
        let calls = Arc::new(AtomicUsize::new(0));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let cache = cache.clone();
                let calls = calls.clone();
                tokio::spawn(async move {
                    cache
                        .get_or_refresh(|| async move {
                            calls.fetch_add(1, Ordering::SeqCst);
                            tokio::time::sleep(Duration::from_secs(1)).await;
                            Ok::<_, String>(42u64)
                        })
                        .await
                })
            })
            .collect();

        for handle in handles {
            assert_eq!(handle.await.unwrap(), Ok(42));
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_invalidate() {
        let cache = TtlCache::default();
        cache.get_or_refresh(|| async { Ok::<_, String>(1u64) }).await.unwrap();
        cache.invalidate().await;
        assert_eq!(cache.peek().await, None);
    }
}
