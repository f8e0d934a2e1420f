//! In-memory tile cache with LRU eviction.
//!
//! Entries are handed out as `Arc<TileEntry>` so that tile sets and fetch jobs
//! can keep using a tile after it has been evicted. Eviction only drops the
//! cache's own reference and never touches an entry a fetch job still owns.

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{debug, warn};

use super::types::{TileEntry, TileKey, TileState};

/// Default number of entries kept in memory.
pub const DEFAULT_CACHE_CAPACITY: usize = 1024;

/// Cache statistics.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
    pub entries: usize,
}

impl CacheStats {
    /// Hit rate in `[0, 1]`, zero when nothing was looked up yet.
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

struct Slot {
    entry: Arc<TileEntry>,
    tick: u64,
}

#[derive(Default)]
struct CacheInner {
    slots: HashMap<TileKey, Slot>,
    /// Recency order: oldest tick first.
    recency: BTreeMap<u64, TileKey>,
    tick: u64,
}

impl CacheInner {
    fn touch(&mut self, key: &TileKey) -> Option<Arc<TileEntry>> {
        self.tick += 1;
        let tick = self.tick;
        let slot = self.slots.get_mut(key)?;
        self.recency.remove(&slot.tick);
        slot.tick = tick;
        self.recency.insert(tick, key.clone());
        Some(Arc::clone(&slot.entry))
    }

    fn insert(&mut self, key: TileKey, entry: Arc<TileEntry>) {
        self.tick += 1;
        let tick = self.tick;
        self.recency.insert(tick, key.clone());
        self.slots.insert(key, Slot { entry, tick });
    }

    fn remove(&mut self, key: &TileKey) -> Option<Arc<TileEntry>> {
        let slot = self.slots.remove(key)?;
        self.recency.remove(&slot.tick);
        Some(slot.entry)
    }

    /// Picks the least recently used idle entry, preferring finished ones.
    fn eviction_candidate(&self) -> Option<TileKey> {
        let mut idle_pending = None;
        for key in self.recency.values() {
            let Some(slot) = self.slots.get(key) else {
                continue;
            };
            if slot.entry.is_busy() {
                continue;
            }
            match slot.entry.state() {
                TileState::Loaded | TileState::Error => return Some(key.clone()),
                TileState::Pending if idle_pending.is_none() => idle_pending = Some(key.clone()),
                _ => {}
            }
        }
        idle_pending
    }
}

/// Shared tile cache.
///
/// Create one per collection run (or share one across runs) and hand it to
/// the tile sets that need it. All operations are thread-safe.
pub struct TileCache {
    inner: Mutex<CacheInner>,
    capacity: usize,
    hits: AtomicU64,
    misses: AtomicU64,
    evictions: AtomicU64,
}

impl TileCache {
    /// Create a cache holding at most `capacity` entries.
    ///
    /// A capacity of zero is treated as one.
    pub fn new(capacity: usize) -> Self {
        Self {
            inner: Mutex::new(CacheInner::default()),
            capacity: capacity.max(1),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            evictions: AtomicU64::new(0),
        }
    }

    /// Returns the entry for `key`, creating a `Pending` one if absent.
    ///
    /// At most one entry exists per key at any time.
    pub fn get_or_create(&self, key: &TileKey) -> Arc<TileEntry> {
        let mut inner = self.inner.lock();

        if let Some(entry) = inner.touch(key) {
            self.hits.fetch_add(1, Ordering::Relaxed);
            return entry;
        }
        self.misses.fetch_add(1, Ordering::Relaxed);

        while inner.slots.len() >= self.capacity {
            match inner.eviction_candidate() {
                Some(victim) => {
                    inner.remove(&victim);
                    self.evictions.fetch_add(1, Ordering::Relaxed);
                }
                None => {
                    warn!(
                        entries = inner.slots.len(),
                        capacity = self.capacity,
                        "Tile cache full of in-flight tiles, growing past capacity"
                    );
                    break;
                }
            }
        }

        let entry = Arc::new(TileEntry::new(key.clone()));
        inner.insert(key.clone(), Arc::clone(&entry));
        entry
    }

    /// Non-creating lookup.
    pub fn get(&self, key: &TileKey) -> Option<Arc<TileEntry>> {
        let entry = self.inner.lock().touch(key);
        match entry {
            Some(_) => self.hits.fetch_add(1, Ordering::Relaxed),
            None => self.misses.fetch_add(1, Ordering::Relaxed),
        };
        entry
    }

    /// Lookup that leaves recency order and hit/miss counters alone.
    pub fn peek(&self, key: &TileKey) -> Option<Arc<TileEntry>> {
        self.inner
            .lock()
            .slots
            .get(key)
            .map(|slot| Arc::clone(&slot.entry))
    }

    /// Evicts every entry no fetch job currently owns.
    ///
    /// Returns the number of entries removed.
    pub fn clear(&self) -> usize {
        let mut inner = self.inner.lock();
        let idle: Vec<TileKey> = inner
            .slots
            .iter()
            .filter(|(_, slot)| !slot.entry.is_busy())
            .map(|(key, _)| key.clone())
            .collect();

        for key in &idle {
            inner.remove(key);
        }

        let kept = inner.slots.len();
        if kept > 0 {
            debug!(kept, "Tile cache cleared, in-flight entries retained");
        }
        idle.len()
    }

    pub fn len(&self) -> usize {
        self.inner.lock().slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            evictions: self.evictions.load(Ordering::Relaxed),
            entries: self.len(),
        }
    }
}

impl Default for TileCache {
    fn default() -> Self {
        Self::new(DEFAULT_CACHE_CAPACITY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coord::TileCoord;
    use image::RgbaImage;

    fn key(x: u32) -> TileKey {
        TileKey::new(Arc::from("osm"), TileCoord::new(x, 0, 10))
    }

    fn load(entry: &TileEntry) {
        assert!(entry.try_claim(false));
        entry.begin_attempt();
        entry.finish_loaded(RgbaImage::new(1, 1));
    }

    #[test]
    fn test_get_or_create_returns_same_entry() {
        let cache = TileCache::new(10);
        let a = cache.get_or_create(&key(1));
        let b = cache.get_or_create(&key(1));

        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(cache.len(), 1);
        assert_eq!(a.state(), TileState::Pending);
    }

    #[test]
    fn test_get_does_not_create() {
        let cache = TileCache::new(10);
        assert!(cache.get(&key(1)).is_none());
        assert!(cache.is_empty());

        cache.get_or_create(&key(1));
        assert!(cache.get(&key(1)).is_some());
    }

    #[test]
    fn test_source_is_part_of_identity() {
        let cache = TileCache::new(10);
        let coord = TileCoord::new(1, 1, 5);
        let a = cache.get_or_create(&TileKey::new(Arc::from("a"), coord));
        let b = cache.get_or_create(&TileKey::new(Arc::from("b"), coord));

        assert!(!Arc::ptr_eq(&a, &b));
        assert_eq!(cache.len(), 2);
    }

    #[test]
    fn test_evicts_least_recently_used_finished_entry() {
        let cache = TileCache::new(3);
        for x in 0..3 {
            load(&cache.get_or_create(&key(x)));
        }
        // Touch 0 so 1 becomes the oldest
        cache.get(&key(0));

        cache.get_or_create(&key(3));

        assert_eq!(cache.len(), 3);
        assert!(cache.get(&key(1)).is_none());
        assert!(cache.get(&key(0)).is_some());
        assert_eq!(cache.stats().evictions, 1);
    }

    #[test]
    fn test_prefers_finished_over_pending() {
        let cache = TileCache::new(2);
        cache.get_or_create(&key(0)); // pending, oldest
        load(&cache.get_or_create(&key(1)));

        cache.get_or_create(&key(2));

        assert!(cache.get(&key(0)).is_some());
        assert!(cache.get(&key(1)).is_none());
    }

    #[test]
    fn test_never_evicts_busy_entry() {
        let cache = TileCache::new(1);
        let busy = cache.get_or_create(&key(0));
        assert!(busy.try_claim(false));
        busy.begin_attempt();

        cache.get_or_create(&key(1));

        // Over capacity rather than dropping the in-flight tile
        assert_eq!(cache.len(), 2);
        assert!(Arc::ptr_eq(&cache.get(&key(0)).unwrap(), &busy));
    }

    #[test]
    fn test_clear_keeps_busy_entries() {
        let cache = TileCache::new(10);
        load(&cache.get_or_create(&key(0)));
        cache.get_or_create(&key(1));
        let busy = cache.get_or_create(&key(2));
        assert!(busy.try_claim(false));

        assert_eq!(cache.clear(), 2);
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_stats_track_hits_and_misses() {
        let cache = TileCache::new(10);
        cache.get_or_create(&key(0)); // miss
        cache.get_or_create(&key(0)); // hit
        cache.get(&key(1)); // miss

        let stats = cache.stats();
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 2);
        assert_eq!(stats.entries, 1);
        assert!((stats.hit_rate() - 1.0 / 3.0).abs() < 1e-9);
    }

    #[test]
    fn test_peek_leaves_stats_untouched() {
        let cache = TileCache::new(4);
        assert!(cache.peek(&key(1)).is_none());
        let entry = cache.get_or_create(&key(1));
        let before = cache.stats();

        let peeked = cache.peek(&key(1)).unwrap();
        assert!(Arc::ptr_eq(&entry, &peeked));
        assert!(cache.peek(&key(2)).is_none());
        assert_eq!(cache.stats(), before);
    }

    #[test]
    fn test_concurrent_get_or_create_single_entry() {
        let cache = Arc::new(TileCache::new(100));
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let cache = Arc::clone(&cache);
                std::thread::spawn(move || cache.get_or_create(&key(42)))
            })
            .collect();

        let entries: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        assert!(entries.windows(2).all(|w| Arc::ptr_eq(&w[0], &w[1])));
        assert_eq!(cache.len(), 1);
    }
}
