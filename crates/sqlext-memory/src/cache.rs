//! In-process result cache.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use dashmap::DashMap;
use sqlext_model::Rows;
use sqlext_orm::ResponseCache;
use tracing::debug;

#[derive(Debug, Clone)]
struct CacheEntry {
    table: String,
    rows: Rows,
    stored: Instant,
}

/// A [`ResponseCache`] backed by a concurrent map.
///
/// Entries optionally expire after a time-to-live. Expired entries are
/// dropped lazily on lookup.
#[derive(Debug, Default)]
pub struct MemoryCache {
    entries: DashMap<String, CacheEntry>,
    ttl: Option<Duration>,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl MemoryCache {
    /// A cache whose entries never expire.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A cache whose entries expire after `ttl`.
    #[must_use]
    pub fn with_ttl(ttl: Duration) -> Self {
        Self {
            ttl: Some(ttl),
            ..Self::default()
        }
    }

    /// Number of live and not yet evicted entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the cache holds no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// `(hits, misses)` since creation.
    #[must_use]
    pub fn stats(&self) -> (u64, u64) {
        (
            self.hits.load(Ordering::Relaxed),
            self.misses.load(Ordering::Relaxed),
        )
    }

    fn expired(&self, entry: &CacheEntry) -> bool {
        self.ttl.is_some_and(|ttl| entry.stored.elapsed() >= ttl)
    }
}

impl ResponseCache for MemoryCache {
    fn get(&self, key: &str) -> Option<Rows> {
        let found = self
            .entries
            .get(key)
            .map(|entry| (!self.expired(&entry)).then(|| entry.rows.clone()));
        // The read guard is released before removal.
        let found = match found {
            Some(Some(rows)) => Some(rows),
            Some(None) => {
                self.entries.remove(key);
                None
            }
            None => None,
        };
        match &found {
            Some(_) => self.hits.fetch_add(1, Ordering::Relaxed),
            None => self.misses.fetch_add(1, Ordering::Relaxed),
        };
        found
    }

    fn set(&self, key: &str, table: &str, rows: Rows) {
        self.entries.insert(
            key.to_owned(),
            CacheEntry {
                table: table.to_owned(),
                rows,
                stored: Instant::now(),
            },
        );
    }

    fn invalidate_table(&self, table: &str) {
        let before = self.entries.len();
        self.entries.retain(|_, e| e.table != table);
        debug!(table = %table, dropped = before - self.entries.len(), "cache invalidated");
    }
}
