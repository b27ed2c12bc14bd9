//! In-memory response cache with LRU eviction and per-entry TTL.
//!
//! Each [`Client`](crate::Client) owns its own cache. Entries store the last
//! payload seen for a logical resource together with its ETag, so later
//! reads can be made conditional.

use lru::LruCache;
use parking_lot::Mutex;
use regex::Regex;
use std::num::NonZeroUsize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

/// Default maximum number of entries.
pub const DEFAULT_MAX_SIZE: usize = 100;

/// Default time-to-live for entries stored without an explicit TTL.
pub const DEFAULT_TTL: Duration = Duration::from_secs(60);

/// A cached payload and its validator.
#[derive(Debug, Clone, PartialEq)]
pub struct CacheEntry {
    /// The cached payload.
    pub data: serde_json::Value,
    /// The ETag the server sent with the payload.
    pub etag: Option<String>,
    /// When the entry was stored.
    pub created_at: Instant,
    /// How long the entry stays valid.
    pub ttl: Duration,
}

impl CacheEntry {
    /// Returns `true` once the entry has outlived its TTL.
    pub fn is_expired(&self) -> bool {
        self.created_at.elapsed() > self.ttl
    }

    /// Returns how long the entry remains valid.
    pub fn ttl_remaining(&self) -> Duration {
        self.ttl.saturating_sub(self.created_at.elapsed())
    }
}

/// Options for [`ResponseCache::set`].
#[derive(Debug, Clone, Default)]
pub struct SetOptions {
    /// Validator to store alongside the payload.
    pub etag: Option<String>,
    /// Overrides the cache's default TTL.
    pub ttl: Option<Duration>,
}

impl SetOptions {
    /// Options carrying only an ETag.
    pub fn etag(etag: impl Into<String>) -> Self {
        Self {
            etag: Some(etag.into()),
            ttl: None,
        }
    }

    /// Sets the TTL.
    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = Some(ttl);
        self
    }
}

/// Counters describing cache effectiveness.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    /// Lookups that found a live entry.
    pub hits: u64,
    /// Lookups that found nothing, or only an expired entry.
    pub misses: u64,
    /// Entries dropped to make room for new ones.
    pub evictions: u64,
}

/// Bounded, time-aware key/value store for response payloads.
///
/// Recency is refreshed by [`get`](Self::get), [`get_entry`](Self::get_entry)
/// and [`set`](Self::set). Expiry is checked lazily: an expired entry is
/// removed the next time it is looked up.
///
/// # Examples
///
/// ```
/// use quire::cache::{ResponseCache, SetOptions};
/// use serde_json::json;
/// use std::time::Duration;
///
/// let cache = ResponseCache::new(2, Duration::from_secs(60));
/// cache.set("session:1", json!({"id": "1"}), SetOptions::etag("\"v1\""));
///
/// assert!(cache.has("session:1"));
/// assert_eq!(cache.get_entry("session:1").unwrap().etag.as_deref(), Some("\"v1\""));
/// ```
pub struct ResponseCache {
    entries: Mutex<LruCache<String, CacheEntry>>,
    default_ttl: Duration,
    hits: AtomicU64,
    misses: AtomicU64,
    evictions: AtomicU64,
}

impl ResponseCache {
    /// Creates a cache holding at most `max_size` entries (minimum 1).
    pub fn new(max_size: usize, default_ttl: Duration) -> Self {
        let capacity = NonZeroUsize::new(max_size).unwrap_or(NonZeroUsize::MIN);
        Self {
            entries: Mutex::new(LruCache::new(capacity)),
            default_ttl,
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            evictions: AtomicU64::new(0),
        }
    }

    /// Returns the cached payload for `key`.
    pub fn get(&self, key: &str) -> Option<serde_json::Value> {
        self.get_entry(key).map(|entry| entry.data)
    }

    /// Returns the full entry for `key`, including its ETag.
    pub fn get_entry(&self, key: &str) -> Option<CacheEntry> {
        let mut entries = self.entries.lock();
        let entry = match entries.get(key) {
            Some(entry) => entry.clone(),
            None => {
                self.misses.fetch_add(1, Ordering::Relaxed);
                return None;
            }
        };

        if entry.is_expired() {
            entries.pop(key);
            self.misses.fetch_add(1, Ordering::Relaxed);
            tracing::trace!(key = %key, "cache entry expired");
            return None;
        }

        self.hits.fetch_add(1, Ordering::Relaxed);
        Some(entry)
    }

    /// Stores `data` under `key`, replacing any previous entry.
    ///
    /// If the cache is full, the least recently used entry is evicted.
    pub fn set(&self, key: impl Into<String>, data: serde_json::Value, options: SetOptions) {
        let key = key.into();
        let entry = CacheEntry {
            data,
            etag: options.etag,
            created_at: Instant::now(),
            ttl: options.ttl.unwrap_or(self.default_ttl),
        };

        let mut entries = self.entries.lock();
        if let Some((evicted, _)) = entries.push(key.clone(), entry) {
            if evicted != key {
                self.evictions.fetch_add(1, Ordering::Relaxed);
                tracing::trace!(key = %evicted, "evicted least recently used cache entry");
            }
        }
    }

    /// Returns `true` if a live entry exists for `key`.
    ///
    /// Does not affect recency.
    pub fn has(&self, key: &str) -> bool {
        let mut entries = self.entries.lock();
        let expired = match entries.peek(key) {
            Some(entry) => entry.is_expired(),
            None => return false,
        };

        if expired {
            entries.pop(key);
        }
        !expired
    }

    /// Removes the entry for `key`. Returns `true` if one existed.
    pub fn delete(&self, key: &str) -> bool {
        self.entries.lock().pop(key).is_some()
    }

    /// Removes every entry.
    pub fn clear(&self) {
        self.entries.lock().clear();
    }

    /// Removes every entry whose key matches `pattern`. Returns how many were removed.
    ///
    /// # Examples
    ///
    /// ```
    /// use quire::cache::{ResponseCache, SetOptions};
    /// use regex::Regex;
    /// use serde_json::json;
    /// use std::time::Duration;
    ///
    /// let cache = ResponseCache::new(10, Duration::from_secs(60));
    /// cache.set("session:1", json!(1), SetOptions::default());
    /// cache.set("session:2", json!(2), SetOptions::default());
    /// cache.set("project:1", json!(3), SetOptions::default());
    ///
    /// let removed = cache.invalidate_pattern(&Regex::new("^session:").unwrap());
    /// assert_eq!(removed, 2);
    /// assert!(cache.has("project:1"));
    /// ```
    pub fn invalidate_pattern(&self, pattern: &Regex) -> usize {
        let mut entries = self.entries.lock();
        let doomed: Vec<String> = entries
            .iter()
            .filter(|(key, _)| pattern.is_match(key))
            .map(|(key, _)| key.clone())
            .collect();

        for key in &doomed {
            entries.pop(key);
        }
        doomed.len()
    }

    /// Returns the number of stored entries, including expired ones not yet swept.
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    /// Returns `true` if nothing is stored.
    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }

    /// Returns the maximum number of entries.
    pub fn capacity(&self) -> usize {
        self.entries.lock().cap().get()
    }

    /// Returns the TTL applied when [`SetOptions::ttl`] is not given.
    pub fn default_ttl(&self) -> Duration {
        self.default_ttl
    }

    /// Returns hit/miss/eviction counters.
    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            evictions: self.evictions.load(Ordering::Relaxed),
        }
    }
}

impl Default for ResponseCache {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_SIZE, DEFAULT_TTL)
    }
}

impl std::fmt::Debug for ResponseCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResponseCache")
            .field("len", &self.len())
            .field("capacity", &self.capacity())
            .field("default_ttl", &self.default_ttl)
            .field("stats", &self.stats())
            .finish()
    }
}
