use std::hash::Hash;

use dashmap::DashMap;

/// Append-only memo table.
///
/// Values are computed outside any lock. When two threads race on the same
/// key both compute, the first insert wins and the other result is dropped,
/// so computations must be idempotent.
pub struct AppendOnlyCache<K, V> {
    entries: DashMap<K, V>,
}

impl<K, V> AppendOnlyCache<K, V>
where
    K: Eq + Hash,
    V: Clone,
{
    pub fn new() -> Self {
        Self {
            entries: DashMap::new(),
        }
    }

    pub fn get(&self, key: &K) -> Option<V> {
        self.entries.get(key).map(|v| v.clone())
    }

    pub fn get_or_compute(&self, key: K, compute: impl FnOnce(&K) -> V) -> V {
        if let Some(hit) = self.entries.get(&key) {
            return hit.clone();
        }
        let value = compute(&key);
        self.entries.entry(key).or_insert(value).clone()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<K, V> Default for AppendOnlyCache<K, V>
where
    K: Eq + Hash,
    V: Clone,
{
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[test]
    fn computes_once_per_key() {
        let cache: AppendOnlyCache<&str, usize> = AppendOnlyCache::new();
        let calls = AtomicUsize::new(0);
        for _ in 0..3 {
            let v = cache.get_or_compute("a", |k| {
                calls.fetch_add(1, Ordering::SeqCst);
                k.len()
            });
            assert_eq!(v, 1);
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn racing_threads_observe_one_value() {
        let cache: Arc<AppendOnlyCache<u32, Arc<String>>> = Arc::new(AppendOnlyCache::new());
        let handles: Vec<_> = (0..8)
            .map(|i| {
                let cache = cache.clone();
                std::thread::spawn(move || cache.get_or_compute(0, |_| Arc::new(format!("t{i}"))))
            })
            .collect();
        let results: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        let winner = cache.get(&0).unwrap();
        assert!(results.iter().all(|r| Arc::ptr_eq(r, &winner)));
    }
}
