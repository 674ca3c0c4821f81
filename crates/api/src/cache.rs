//! Process-local response memoization.
//!
//! Each enrichment handler owns a `ResponseCache` instance with its own TTL and
//! sweep threshold. Entries are keyed by a semantic fingerprint of the request
//! rather than the raw body, so equivalent requests hit the same entry.
//!
//! This is best-effort, single-process caching: no invalidation protocol, no
//! background timer. Expired entries are dropped by an inline sweep on a write
//! that leaves the map above the threshold; if the map is still over the
//! threshold after the sweep, the oldest entries are evicted down to it.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use sha2::{Digest, Sha256};
use tokio::sync::RwLock;

use crate::clock::{Clock, SystemClock};

#[derive(Debug, Clone, Copy)]
pub struct CacheConfig {
    pub ttl: Duration,
    /// Map size above which a put triggers the inline sweep.
    pub sweep_threshold: usize,
}

struct CacheEntry<V> {
    value: V,
    stored_at: DateTime<Utc>,
}

pub struct ResponseCache<V> {
    entries: RwLock<HashMap<String, CacheEntry<V>>>,
    config: CacheConfig,
    clock: Arc<dyn Clock>,
}

impl<V: Clone> ResponseCache<V> {
    pub fn new(config: CacheConfig) -> Self {
        Self::with_clock(config, Arc::new(SystemClock))
    }

    pub fn with_clock(config: CacheConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            config,
            clock,
        }
    }

    /// Returns the cached value if present and younger than the TTL.
    /// An entry at exactly TTL age is a miss.
    pub async fn get(&self, key: &str) -> Option<V> {
        let now = self.clock.now();
        let entries = self.entries.read().await;

        entries
            .get(key)
            .filter(|entry| now - entry.stored_at < self.config.ttl)
            .map(|entry| entry.value.clone())
    }

    /// Stores a value. Callers only put after a successful upstream call;
    /// failures are never cached.
    pub async fn put(&self, key: impl Into<String>, value: V) {
        let now = self.clock.now();
        let mut entries = self.entries.write().await;

        entries.insert(
            key.into(),
            CacheEntry {
                value,
                stored_at: now,
            },
        );

        if entries.len() > self.config.sweep_threshold {
            let ttl = self.config.ttl;
            entries.retain(|_, entry| now - entry.stored_at < ttl);

            // Still over after dropping expired entries: evict oldest first.
            if entries.len() > self.config.sweep_threshold {
                let excess = entries.len() - self.config.sweep_threshold;
                let mut by_age: Vec<(String, DateTime<Utc>)> = entries
                    .iter()
                    .map(|(k, e)| (k.clone(), e.stored_at))
                    .collect();
                by_age.sort_by_key(|(_, stored_at)| *stored_at);

                for (key, _) in by_age.into_iter().take(excess) {
                    entries.remove(&key);
                }
            }
        }
    }

    #[cfg(test)]
    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }
}

/// Builds a stable cache key from the semantically relevant request fields.
/// Inputs are trimmed and lowercased so equivalent requests collide.
pub fn fingerprint(parts: &[&str]) -> String {
    let normalized: Vec<String> = parts
        .iter()
        .map(|p| p.trim().to_lowercase())
        .collect();

    let mut hasher = Sha256::new();
    hasher.update(normalized.join("|").as_bytes());
    hex::encode(hasher.finalize())
}
