//! Table list cache
//!
//! Holds the unfiltered table list per database so repeated tree refreshes
//! do not hit the catalog. Entries expire after a TTL and are dropped
//! explicitly after any structural change.

use parking_lot::RwLock;
use sqlbridge_core::TableInfo;
use std::collections::HashMap;
use std::time::Duration;
use tokio::time::Instant;

struct CachedTables {
    tables: Vec<TableInfo>,
    cached_at: Instant,
}

/// Table lists keyed by `host:port:database`
pub struct TableListCache {
    entries: RwLock<HashMap<String, CachedTables>>,
    ttl: Duration,
}

impl TableListCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            ttl,
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Cached list for `key`, if one was stored within the TTL
    pub fn get(&self, key: &str) -> Option<Vec<TableInfo>> {
        let entries = self.entries.read();
        let result = entries
            .get(key)
            .filter(|entry| entry.cached_at.elapsed() < self.ttl)
            .map(|entry| entry.tables.clone());
        if result.is_some() {
            tracing::debug!(key = %key, "table list cache hit");
        } else {
            tracing::debug!(key = %key, "table list cache miss");
        }
        result
    }

    pub fn insert(&self, key: impl Into<String>, tables: Vec<TableInfo>) {
        self.entries.write().insert(
            key.into(),
            CachedTables {
                tables,
                cached_at: Instant::now(),
            },
        );
    }

    /// Returns whether an entry was present
    pub fn invalidate(&self, key: &str) -> bool {
        let removed = self.entries.write().remove(key).is_some();
        tracing::debug!(key = %key, removed, "table list cache invalidated");
        removed
    }

    pub fn clear(&self) {
        self.entries.write().clear();
    }

    /// Drop every expired entry, returning how many went
    pub fn purge_expired(&self) -> usize {
        let mut entries = self.entries.write();
        let before = entries.len();
        entries.retain(|_, entry| entry.cached_at.elapsed() < self.ttl);
        before - entries.len()
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}

impl Default for TableListCache {
    fn default() -> Self {
        Self::new(Duration::from_secs(60))
    }
}
