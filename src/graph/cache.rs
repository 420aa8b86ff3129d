//! Bounded lookup cache for the symbol graph.
//!
//! Keys are strings with a discriminator prefix (`name:`, `fqn:`, `file:`,
//! `rel:`, `metrics:`) so writes can invalidate exactly the keyed space they
//! touch. Entries expire on a short TTL; when the byte budget overflows, the
//! least-recently-used entries go first. Single writer from the graph's
//! perspective; concurrent readers see a stable snapshot per request.

use dashmap::DashMap;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::time::{Duration, Instant};

/// Default TTL for cached lookups.
pub const CACHE_TTL: Duration = Duration::from_secs(180);

/// Default byte budget.
pub const CACHE_BUDGET_BYTES: usize = 4 * 1024 * 1024;

struct CacheEntry<V> {
    value: V,
    bytes: usize,
    inserted: Instant,
    last_access: AtomicU64,
}

/// TTL + LRU cache keyed by prefixed strings.
pub struct UnifiedCache<V> {
    entries: DashMap<String, CacheEntry<V>>,
    total_bytes: AtomicUsize,
    budget_bytes: usize,
    ttl: Duration,
    /// Logical clock driving the LRU ordering.
    tick: AtomicU64,
}

impl<V: Clone> UnifiedCache<V> {
    pub fn new() -> Self {
        Self::with_limits(CACHE_BUDGET_BYTES, CACHE_TTL)
    }

    pub fn with_limits(budget_bytes: usize, ttl: Duration) -> Self {
        Self {
            entries: DashMap::new(),
            total_bytes: AtomicUsize::new(0),
            budget_bytes,
            ttl,
            tick: AtomicU64::new(0),
        }
    }

    pub fn get(&self, key: &str) -> Option<V> {
        let now = self.tick.fetch_add(1, Ordering::Relaxed) + 1;
        let hit = self.entries.get(key)?;
        if hit.inserted.elapsed() > self.ttl {
            drop(hit);
            if let Some((_, old)) = self.entries.remove(key) {
                self.total_bytes.fetch_sub(old.bytes, Ordering::Relaxed);
            }
            return None;
        }
        hit.last_access.store(now, Ordering::Relaxed);
        Some(hit.value.clone())
    }

    pub fn insert(&self, key: impl Into<String>, value: V, bytes: usize) {
        let key = key.into();
        let now = self.tick.fetch_add(1, Ordering::Relaxed) + 1;
        let entry = CacheEntry {
            value,
            bytes,
            inserted: Instant::now(),
            last_access: AtomicU64::new(now),
        };
        if let Some(old) = self.entries.insert(key, entry) {
            self.total_bytes.fetch_sub(old.bytes, Ordering::Relaxed);
        }
        self.total_bytes.fetch_add(bytes, Ordering::Relaxed);
        if self.total_bytes.load(Ordering::Relaxed) > self.budget_bytes {
            self.evict_lru();
        }
    }

    /// Drop the least-recently-used entries until the budget holds again.
    fn evict_lru(&self) {
        let mut by_access: Vec<(String, u64, usize)> = self
            .entries
            .iter()
            .map(|e| {
                (
                    e.key().clone(),
                    e.value().last_access.load(Ordering::Relaxed),
                    e.value().bytes,
                )
            })
            .collect();
        by_access.sort_by_key(|(_, access, _)| *access);

        for (key, _, _) in by_access {
            if self.total_bytes.load(Ordering::Relaxed) <= self.budget_bytes {
                break;
            }
            if let Some((_, old)) = self.entries.remove(&key) {
                self.total_bytes.fetch_sub(old.bytes, Ordering::Relaxed);
            }
        }
    }

    /// Invalidate every key under a discriminator prefix.
    pub fn invalidate_prefix(&self, prefix: &str) {
        let doomed: Vec<String> = self
            .entries
            .iter()
            .filter(|e| e.key().starts_with(prefix))
            .map(|e| e.key().clone())
            .collect();
        for key in doomed {
            if let Some((_, old)) = self.entries.remove(&key) {
                self.total_bytes.fetch_sub(old.bytes, Ordering::Relaxed);
            }
        }
    }

    pub fn clear(&self) {
        self.entries.clear();
        self.total_bytes.store(0, Ordering::Relaxed);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<V: Clone> Default for UnifiedCache<V> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_get_after_insert() {
        let cache: UnifiedCache<u32> = UnifiedCache::new();
        cache.insert("name:foo", 7, 16);
        assert_eq!(cache.get("name:foo"), Some(7));
        assert_eq!(cache.get("name:bar"), None);
    }

    #[test]
    fn test_ttl_expiry() {
        let cache: UnifiedCache<u32> = UnifiedCache::with_limits(1024, Duration::from_millis(0));
        cache.insert("name:foo", 7, 16);
        std::thread::sleep(Duration::from_millis(2));
        assert_eq!(cache.get("name:foo"), None);
        assert!(cache.is_empty());
    }

    #[test]
    fn test_prefix_invalidation() {
        let cache: UnifiedCache<u32> = UnifiedCache::new();
        cache.insert("name:foo", 1, 8);
        cache.insert("name:bar", 2, 8);
        cache.insert("fqn:foo", 3, 8);
        cache.invalidate_prefix("name:");
        assert_eq!(cache.get("name:foo"), None);
        assert_eq!(cache.get("name:bar"), None);
        assert_eq!(cache.get("fqn:foo"), Some(3));
    }

    #[test]
    fn test_lru_eviction_under_budget_pressure() {
        let cache: UnifiedCache<u32> = UnifiedCache::with_limits(100, CACHE_TTL);
        cache.insert("rel:a", 1, 40);
        cache.insert("rel:b", 2, 40);
        // Touch `a` so `b` is the LRU victim.
        assert_eq!(cache.get("rel:a"), Some(1));
        cache.insert("rel:c", 3, 40);
        assert_eq!(cache.get("rel:b"), None);
        assert_eq!(cache.get("rel:a"), Some(1));
        assert_eq!(cache.get("rel:c"), Some(3));
    }
}
