use chrono::{DateTime, Utc};
use lru::LruCache;
use std::num::NonZeroUsize;

pub const DEFAULT_DEDUP_CAPACITY: usize = 10_000;

/// Bounded memory of recently delivered message ids.
///
/// Lookups use `peek`/`contains`, which leave recency untouched, and an id
/// is never pushed twice, so the LRU order is the insertion order and the
/// oldest insertion is evicted first. Owned by a single pipeline; callers
/// running several streams against one cache must put it behind a lock.
#[derive(Debug)]
pub struct DedupCache {
    seen: LruCache<String, DateTime<Utc>>,
}

impl DedupCache {
    pub fn new(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            seen: LruCache::new(capacity),
        }
    }

    pub fn contains(&self, id: &str) -> bool {
        self.seen.contains(id)
    }

    /// When `id` was recorded, if it is still cached.
    pub fn seen_at(&self, id: &str) -> Option<DateTime<Utc>> {
        self.seen.peek(id).copied()
    }

    /// Record `id`, returning the id evicted to make room.
    ///
    /// Inserting an id that is already present changes nothing.
    pub fn insert(&mut self, id: &str) -> Option<String> {
        if self.seen.contains(id) {
            return None;
        }
        self.seen
            .push(id.to_string(), Utc::now())
            .map(|(evicted, _)| evicted)
    }

    pub fn len(&self) -> usize {
        self.seen.len()
    }

    pub fn is_empty(&self) -> bool {
        self.seen.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.seen.cap().get()
    }
}

impl Default for DedupCache {
    fn default() -> Self {
        Self::new(DEFAULT_DEDUP_CAPACITY)
    }
}
