// src/storage/cache.rs
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

use crate::config::Config;
use crate::models::status::StatusSnapshot;

#[derive(Clone)]
struct CacheEntry {
    snapshot: Arc<StatusSnapshot>,
    stored_at: Instant,
}

/// Latest snapshot per server name.
///
/// Online snapshots stay fresh for `online_ttl`, failures for the shorter
/// `offline_ttl` so unreachable hosts are retried at a bounded rate. Entries
/// are only ever replaced, never evicted; the key space is the configured
/// server set.
pub struct StatusCache {
    entries: RwLock<HashMap<String, CacheEntry>>,
    online_ttl: Duration,
    offline_ttl: Duration,
}

impl StatusCache {
    pub fn new(online_ttl: Duration, offline_ttl: Duration) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            online_ttl,
            offline_ttl,
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(config.online_cache_ttl(), config.offline_cache_ttl())
    }

    fn freshness_window(&self, snapshot: &StatusSnapshot) -> Duration {
        if snapshot.online {
            self.online_ttl
        } else {
            self.offline_ttl
        }
    }

    /// Returns the cached snapshot if it is still fresh. Stale entries are
    /// reported as a miss and left in place.
    pub fn get(&self, server_name: &str) -> Option<Arc<StatusSnapshot>> {
        let entries = self.entries.read();
        let entry = entries.get(server_name)?;

        if entry.stored_at.elapsed() < self.freshness_window(&entry.snapshot) {
            Some(Arc::clone(&entry.snapshot))
        } else {
            None
        }
    }

    pub fn set(&self, server_name: &str, snapshot: Arc<StatusSnapshot>) {
        let entry = CacheEntry {
            snapshot,
            stored_at: Instant::now(),
        };
        self.entries.write().insert(server_name.to_string(), entry);
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }
}
