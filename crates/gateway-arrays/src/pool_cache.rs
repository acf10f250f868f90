//! Bounded pool-id-to-pool-name cache for the scale-out block family
//! (`spec.md` §4.2, §5: "single lock; no external I/O performed under the
//! lock").

use lru::LruCache;
use std::num::NonZeroUsize;
use std::sync::Mutex;

const CAPACITY: usize = 512;

pub struct PoolNameCache {
    inner: Mutex<LruCache<String, String>>,
}

impl Default for PoolNameCache {
    fn default() -> Self {
        Self {
            inner: Mutex::new(LruCache::new(NonZeroUsize::new(CAPACITY).unwrap())),
        }
    }
}

impl PoolNameCache {
    /// Returns the cached pool name for `pool_id`, if present. The lock is
    /// held only long enough to copy the value.
    pub fn get(&self, pool_id: &str) -> Option<String> {
        self.inner.lock().unwrap().get(pool_id).cloned()
    }

    /// Inserts a freshly-resolved pool name. Called after the miss path's
    /// API call, with the lock dropped for the duration of that call; a
    /// late-arriving duplicate insert is harmless.
    pub fn insert(&self, pool_id: String, pool_name: String) {
        self.inner.lock().unwrap().put(pool_id, pool_name);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn miss_then_insert_then_hit() {
        let cache = PoolNameCache::default();
        assert_eq!(cache.get("p1"), None);
        cache.insert("p1".into(), "bronze".into());
        assert_eq!(cache.get("p1"), Some("bronze".into()));
    }
}
