use std::future::Future;
use std::hash::Hash;
use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::OnceCell;

/// Process-lifetime memo with in-flight coalescing.
///
/// The first caller for a key runs the loader; concurrent callers for the same
/// key wait on that same cell. Errors are not memoised, so the next caller
/// retries. Entries are never evicted.
pub struct CoalescingCache<K, V> {
    cells: DashMap<K, Arc<OnceCell<V>>>,
}

impl<K, V> Default for CoalescingCache<K, V>
where
    K: Eq + Hash,
{
    fn default() -> Self {
        Self {
            cells: DashMap::new(),
        }
    }
}

impl<K, V> CoalescingCache<K, V>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    pub fn new() -> Self {
        Self {
            cells: DashMap::new(),
        }
    }

    /// Returns the cached value, whether it was already resolved.
    pub fn peek(&self, key: &K) -> Option<V> {
        self.cells.get(key).and_then(|cell| cell.get().cloned())
    }

    pub async fn get_or_try_populate<F, Fut, E>(&self, key: K, load: F) -> Result<V, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<V, E>>,
    {
        // Clone the cell out so the shard lock is not held across the await.
        let cell = self
            .cells
            .entry(key)
            .or_insert_with(|| Arc::new(OnceCell::new()))
            .clone();
        cell.get_or_try_init(load).await.cloned()
    }

    /// Drops a key so the next caller loads it again.
    pub fn forget(&self, key: &K) {
        self.cells.remove(key);
    }

    pub fn len(&self) -> usize {
        self.cells.iter().filter(|cell| cell.initialized()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[tokio::test]
    async fn concurrent_requests_share_one_load() {
        let cache: Arc<CoalescingCache<String, u64>> = Arc::new(CoalescingCache::new());
        let loads = Arc::new(AtomicUsize::new(0));

        let mut handles = Vec::new();
        for _ in 0..8 {
            let cache = cache.clone();
            let loads = loads.clone();
            handles.push(tokio::spawn(async move {
                cache
                    .get_or_try_populate("0xabc".to_string(), || async {
                        loads.fetch_add(1, Ordering::SeqCst);
                        tokio::time::sleep(Duration::from_millis(20)).await;
                        Ok::<_, String>(42)
                    })
                    .await
            }));
        }

        for handle in handles {
            assert_eq!(handle.await.unwrap(), Ok(42));
        }
        assert_eq!(loads.load(Ordering::SeqCst), 1);
        assert_eq!(cache.peek(&"0xabc".to_string()), Some(42));
    }

    #[tokio::test]
    async fn failures_are_not_memoised() {
        let cache: CoalescingCache<u64, u64> = CoalescingCache::new();
        let first = cache
            .get_or_try_populate(1, || async { Err::<u64, _>("down") })
            .await;
        assert_eq!(first, Err("down"));
        assert!(cache.is_empty());

        let second = cache
            .get_or_try_populate(1, || async { Ok::<_, &str>(7) })
            .await;
        assert_eq!(second, Ok(7));
        assert_eq!(cache.len(), 1);
    }

    #[tokio::test]
    async fn forgotten_key_loads_again() {
        let cache: CoalescingCache<u64, Option<u64>> = CoalescingCache::new();
        let first = cache.get_or_try_populate(1, || async { Ok::<_, ()>(None) }).await;
        assert_eq!(first, Ok(None));
        cache.forget(&1);
        assert_eq!(cache.peek(&1), None);

        let second = cache.get_or_try_populate(1, || async { Ok::<_, ()>(Some(3)) }).await;
        assert_eq!(second, Ok(Some(3)));
    }
}
