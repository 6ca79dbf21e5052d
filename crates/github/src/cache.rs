//! In-memory response cache.
//!
//! Maps a request [`Fingerprint`] to a validated response payload plus the
//! metadata needed to revalidate it. The cache is bounded by entry count
//! and evicts the least-recently-used entry when full. Every entry carries
//! its own time-to-live.
//!
//! An expired entry is never served as fresh. If it has an ETag it is kept
//! around as [`Lookup::Stale`] so the client can send a conditional request
//! (`If-None-Match`) and, on `304 Not Modified`, keep the stored payload
//! without spending quota on a full response.
//!
//! # Recency tracking
//!
//! Each touch stamps the entry with a new tick and appends `(key, tick)` to
//! a queue. Eviction pops from the front and skips pairs whose tick no
//! longer matches the entry (it was touched again later). The queue is
//! compacted when it grows past twice the live entry count, which keeps
//! every operation O(1) amortized.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use serde_json::Value;
use tokio::time::Instant;
use tracing::{debug, trace};

use crate::fingerprint::Fingerprint;

/// A stored response.
#[derive(Debug, Clone, PartialEq)]
pub struct CacheEntry {
    /// The validated payload.
    pub value: Arc<Value>,
    /// When the payload was stored or last revalidated.
    pub stored_at: Instant,
    /// When the payload stops being fresh.
    pub expires_at: Instant,
    /// The response ETag, for conditional requests.
    pub etag: Option<String>,
}

impl CacheEntry {
    /// Returns whether the entry is still fresh at `now`.
    #[must_use]
    pub fn is_fresh_at(&self, now: Instant) -> bool {
        now < self.expires_at
    }
}

/// Result of a cache lookup.
#[derive(Debug, Clone, PartialEq)]
pub enum Lookup {
    /// Fresh hit, serve directly.
    Fresh(Arc<Value>),
    /// Expired, but revalidatable with the given ETag.
    Stale {
        /// The previously stored payload, reused on `304 Not Modified`.
        value: Arc<Value>,
        /// The ETag to send as `If-None-Match`.
        etag: String,
    },
    /// Nothing usable.
    Miss,
}

/// Cache counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    /// Lookups answered with a fresh entry.
    pub hits: u64,
    /// Lookups that required the network (including stale entries).
    pub misses: u64,
    /// Entries currently stored.
    pub size: usize,
    /// Entries dropped to make room.
    pub evictions: u64,
}

#[derive(Debug)]
struct Slot {
    entry: CacheEntry,
    tick: u64,
}

#[derive(Debug, Default)]
struct Inner {
    slots: HashMap<Fingerprint, Slot>,
    recency: VecDeque<(Fingerprint, u64)>,
    next_tick: u64,
    hits: u64,
    misses: u64,
    evictions: u64,
}

impl Inner {
    fn touch(&mut self, key: &Fingerprint) {
        let tick = self.next_tick;
        self.next_tick += 1;
        if let Some(slot) = self.slots.get_mut(key) {
            slot.tick = tick;
            self.recency.push_back((key.clone(), tick));
        }
    }

    fn evict_to(&mut self, capacity: usize) {
        while self.slots.len() > capacity {
            let Some((key, tick)) = self.recency.pop_front() else {
                break;
            };
            if self.slots.get(&key).is_some_and(|slot| slot.tick == tick) {
                self.slots.remove(&key);
                self.evictions += 1;
                trace!(fingerprint = %key, "evicted least recently used entry");
            }
        }
    }

    fn compact(&mut self) {
        if self.recency.len() > self.slots.len() * 2 + 16 {
            let slots = &self.slots;
            self.recency
                .retain(|(key, tick)| slots.get(key).is_some_and(|slot| slot.tick == *tick));
        }
    }
}

/// Bounded, TTL-based response cache with LRU eviction.
///
/// # Examples
///
/// ```
/// use std::time::Duration;
/// use hubkit_github::{Fingerprint, ResponseCache};
/// use reqwest::Method;
/// use serde_json::json;
///
/// let cache = ResponseCache::new(16);
/// let key = Fingerprint::compute(&Method::GET, "repos.get", &json!({"repo": "demo"}));
///
/// cache.set(key.clone(), json!({"id": 1}), Duration::from_secs(60), None);
/// assert!(cache.get(&key).is_some());
/// assert_eq!(cache.stats().hits, 1);
/// ```
#[derive(Debug)]
pub struct ResponseCache {
    capacity: usize,
    inner: Mutex<Inner>,
}

impl ResponseCache {
    /// Creates a cache holding at most `capacity` entries (minimum 1).
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            inner: Mutex::new(Inner::default()),
        }
    }

    /// Returns the maximum number of entries.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Returns the entry for `key` if it is fresh.
    ///
    /// Counts as a hit or a miss.
    #[must_use]
    pub fn get(&self, key: &Fingerprint) -> Option<CacheEntry> {
        let now = Instant::now();
        let mut inner = self.inner.lock();
        let fresh = inner
            .slots
            .get(key)
            .filter(|slot| slot.entry.is_fresh_at(now))
            .map(|slot| slot.entry.clone());
        match fresh {
            Some(entry) => {
                inner.hits += 1;
                inner.touch(key);
                inner.compact();
                Some(entry)
            }
            None => {
                inner.misses += 1;
                None
            }
        }
    }

    /// Looks up `key`, distinguishing fresh, revalidatable, and missing
    /// entries.
    ///
    /// Expired entries without an ETag are dropped. Counts as a hit or a
    /// miss.
    #[must_use]
    pub fn lookup(&self, key: &Fingerprint) -> Lookup {
        let now = Instant::now();
        let mut inner = self.inner.lock();

        let (lookup, drop_entry) = match inner.slots.get(key) {
            None => (Lookup::Miss, false),
            Some(slot) if slot.entry.is_fresh_at(now) => {
                (Lookup::Fresh(Arc::clone(&slot.entry.value)), false)
            }
            Some(slot) => match &slot.entry.etag {
                Some(etag) => (
                    Lookup::Stale {
                        value: Arc::clone(&slot.entry.value),
                        etag: etag.clone(),
                    },
                    false,
                ),
                None => (Lookup::Miss, true),
            },
        };

        if drop_entry {
            inner.slots.remove(key);
        }

        match &lookup {
            Lookup::Fresh(_) => {
                inner.hits += 1;
                inner.touch(key);
                inner.compact();
                debug!(fingerprint = %key, "cache hit");
            }
            Lookup::Stale { .. } => {
                inner.misses += 1;
                debug!(fingerprint = %key, "cache entry expired, revalidating");
            }
            Lookup::Miss => {
                inner.misses += 1;
                debug!(fingerprint = %key, "cache miss");
            }
        }
        lookup
    }

    /// Returns the fresh payload for `key` without touching counters or
    /// recency.
    #[must_use]
    pub fn peek_fresh(&self, key: &Fingerprint) -> Option<Arc<Value>> {
        let now = Instant::now();
        self.inner
            .lock()
            .slots
            .get(key)
            .filter(|slot| slot.entry.is_fresh_at(now))
            .map(|slot| Arc::clone(&slot.entry.value))
    }

    /// Stores `value` under `key` for `ttl`, replacing any previous entry.
    pub fn set(&self, key: Fingerprint, value: Value, ttl: Duration, etag: Option<String>) {
        self.set_shared(key, Arc::new(value), ttl, etag);
    }

    /// Stores an already shared payload.
    pub fn set_shared(
        &self,
        key: Fingerprint,
        value: Arc<Value>,
        ttl: Duration,
        etag: Option<String>,
    ) {
        let now = Instant::now();
        let entry = CacheEntry {
            value,
            stored_at: now,
            expires_at: now + ttl,
            etag,
        };

        let mut inner = self.inner.lock();
        inner.slots.insert(key.clone(), Slot { entry, tick: 0 });
        inner.touch(&key);
        inner.evict_to(self.capacity);
        inner.compact();
        trace!(fingerprint = %key, ttl_ms = ttl.as_millis() as u64, "cached response");
    }

    /// Marks a stored entry as revalidated: it becomes fresh for another
    /// `ttl`, optionally with a new ETag.
    ///
    /// Returns the stored payload, or `None` if the entry was evicted in
    /// the meantime.
    pub fn revalidate(
        &self,
        key: &Fingerprint,
        ttl: Duration,
        etag: Option<String>,
    ) -> Option<Arc<Value>> {
        let now = Instant::now();
        let mut inner = self.inner.lock();
        let slot = inner.slots.get_mut(key)?;
        slot.entry.stored_at = now;
        slot.entry.expires_at = now + ttl;
        if etag.is_some() {
            slot.entry.etag = etag;
        }
        let value = Arc::clone(&slot.entry.value);
        inner.touch(key);
        inner.compact();
        Some(value)
    }

    /// Removes `key`, returning whether it was present.
    pub fn remove(&self, key: &Fingerprint) -> bool {
        self.inner.lock().slots.remove(key).is_some()
    }

    /// Removes every entry. Counters are kept.
    pub fn clear(&self) {
        let mut inner = self.inner.lock();
        inner.slots.clear();
        inner.recency.clear();
    }

    /// Returns the number of stored entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.lock().slots.len()
    }

    /// Returns whether the cache is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns a snapshot of the cache counters.
    #[must_use]
    pub fn stats(&self) -> CacheStats {
        let inner = self.inner.lock();
        CacheStats {
            hits: inner.hits,
            misses: inner.misses,
            size: inner.slots.len(),
            evictions: inner.evictions,
        }
    }
}
