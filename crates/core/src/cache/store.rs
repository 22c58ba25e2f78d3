//! Byte-bounded key/value store with per-entry expiry.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, VecDeque};
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::{debug, warn};

use super::{CacheError, CacheStats, PersistentCache};
use crate::metrics::CACHE_LOOKUPS;

/// Fixed bookkeeping overhead charged per entry on top of key and value bytes.
const ENTRY_OVERHEAD_BYTES: usize = 32;

/// Point-in-time dump of a cache, as written to disk.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheSnapshot<V> {
    pub name: String,
    pub saved_at: DateTime<Utc>,
    pub entries: Vec<SnapshotEntry<V>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SnapshotEntry<V> {
    pub key: String,
    pub value: V,
    pub expires_at: DateTime<Utc>,
}

struct Entry<V> {
    value: V,
    expires_at: DateTime<Utc>,
    size: usize,
    seq: u64,
}

struct Inner<V> {
    entries: HashMap<String, Entry<V>>,
    /// Insertion order; stale pairs (seq mismatch) are skipped on eviction.
    order: VecDeque<(String, u64)>,
    size_bytes: usize,
    next_seq: u64,
}

impl<V> Inner<V> {
    fn new() -> Self {
        Self {
            entries: HashMap::new(),
            order: VecDeque::new(),
            size_bytes: 0,
            next_seq: 0,
        }
    }

    fn remove(&mut self, key: &str) -> Option<Entry<V>> {
        let entry = self.entries.remove(key)?;
        self.size_bytes -= entry.size;
        Some(entry)
    }

    /// Insert, evicting the oldest entries until the new one fits.
    /// Returns the number of evicted entries.
    fn insert(
        &mut self,
        key: String,
        value: V,
        expires_at: DateTime<Utc>,
        size: usize,
        max_bytes: usize,
    ) -> u64 {
        self.remove(&key);

        let mut evicted = 0;
        while self.size_bytes + size > max_bytes {
            let Some((old_key, seq)) = self.order.pop_front() else {
                break;
            };
            let is_current = self
                .entries
                .get(&old_key)
                .map(|e| e.seq == seq)
                .unwrap_or(false);
            if is_current {
                self.remove(&old_key);
                evicted += 1;
            }
        }

        let seq = self.next_seq;
        self.next_seq += 1;
        self.order.push_back((key.clone(), seq));
        self.size_bytes += size;
        self.entries.insert(
            key,
            Entry {
                value,
                expires_at,
                size,
                seq,
            },
        );

        // Keep the order queue from growing without bound on overwrite-heavy keys.
        if self.order.len() > self.entries.len() * 2 + 64 {
            let entries = &self.entries;
            self.order
                .retain(|(k, s)| entries.get(k).map(|e| e.seq == *s).unwrap_or(false));
        }

        evicted
    }
}

/// A named in-memory cache with a byte-size ceiling and TTL semantics.
///
/// Expiry timestamps are wall-clock, so the remaining TTL of an entry
/// survives a snapshot/restore cycle across process restarts. When the
/// ceiling is reached, the oldest inserted entries are evicted first.
pub struct CacheStore<V> {
    name: String,
    max_bytes: usize,
    default_ttl: Duration,
    inner: RwLock<Inner<V>>,
    hits: AtomicU64,
    misses: AtomicU64,
    evictions: AtomicU64,
}

impl<V> CacheStore<V>
where
    V: Clone + Serialize + DeserializeOwned + Send + Sync + 'static,
{
    /// Create an empty cache.
    pub fn new(name: impl Into<String>, max_bytes: usize, default_ttl: Duration) -> Self {
        Self {
            name: name.into(),
            max_bytes,
            default_ttl,
            inner: RwLock::new(Inner::new()),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            evictions: AtomicU64::new(0),
        }
    }

    /// Build a cache from a snapshot, dropping entries that expired meanwhile.
    pub fn from_snapshot(
        name: impl Into<String>,
        max_bytes: usize,
        default_ttl: Duration,
        snapshot: CacheSnapshot<V>,
    ) -> Self {
        let now = Utc::now();
        let mut inner = Inner::new();
        let mut evictions = 0;
        for entry in snapshot.entries {
            if entry.expires_at <= now {
                continue;
            }
            let Some(size) = entry_size(&entry.key, &entry.value) else {
                continue;
            };
            if size > max_bytes {
                continue;
            }
            evictions += inner.insert(entry.key, entry.value, entry.expires_at, size, max_bytes);
        }

        Self {
            name: name.into(),
            max_bytes,
            default_ttl,
            inner: RwLock::new(inner),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            evictions: AtomicU64::new(evictions),
        }
    }

    /// Load a snapshot file, or start empty when it is missing or unreadable.
    pub async fn load_from_file_or_new(
        name: impl Into<String>,
        path: &Path,
        max_bytes: usize,
        default_ttl: Duration,
    ) -> Self {
        let name = name.into();
        let bytes = match tokio::fs::read(path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(cache = %name, path = %path.display(), "No snapshot found, starting empty");
                return Self::new(name, max_bytes, default_ttl);
            }
            Err(e) => {
                warn!(cache = %name, path = %path.display(), error = %e, "Couldn't read cache snapshot");
                return Self::new(name, max_bytes, default_ttl);
            }
        };

        match serde_json::from_slice::<CacheSnapshot<V>>(&bytes) {
            Ok(snapshot) => {
                let store = Self::from_snapshot(name, max_bytes, default_ttl, snapshot);
                debug!(cache = %store.name, entries = store.len().await, "Restored cache from snapshot");
                store
            }
            Err(e) => {
                warn!(cache = %name, path = %path.display(), error = %e, "Corrupt cache snapshot, starting empty");
                Self::new(name, max_bytes, default_ttl)
            }
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn default_ttl(&self) -> Duration {
        self.default_ttl
    }

    /// Get a live entry. Expired entries are removed and count as a miss.
    pub async fn get(&self, key: &str) -> Option<V> {
        let now = Utc::now();
        {
            let inner = self.inner.read().await;
            match inner.entries.get(key) {
                Some(entry) if entry.expires_at > now => {
                    self.record(true);
                    return Some(entry.value.clone());
                }
                Some(_) => {}
                None => {
                    self.record(false);
                    return None;
                }
            }
        }

        let mut inner = self.inner.write().await;
        if inner
            .entries
            .get(key)
            .map(|e| e.expires_at <= now)
            .unwrap_or(false)
        {
            inner.remove(key);
        }
        self.record(false);
        None
    }

    /// Remaining lifetime of a live entry.
    pub async fn ttl_remaining(&self, key: &str) -> Option<Duration> {
        let inner = self.inner.read().await;
        let entry = inner.entries.get(key)?;
        (entry.expires_at - Utc::now()).to_std().ok()
    }

    /// Insert with the cache's default TTL.
    pub async fn insert(&self, key: impl Into<String>, value: V) -> bool {
        self.insert_with_ttl(key, value, self.default_ttl).await
    }

    /// Insert with an explicit TTL. Returns false if the entry was rejected
    /// (unserializable or larger than the whole cache).
    pub async fn insert_with_ttl(&self, key: impl Into<String>, value: V, ttl: Duration) -> bool {
        let key = key.into();
        let Some(size) = entry_size(&key, &value) else {
            warn!(cache = %self.name, "Couldn't measure cache entry, not stored");
            return false;
        };
        if size > self.max_bytes {
            warn!(cache = %self.name, size, max_bytes = self.max_bytes, "Cache entry larger than cache, not stored");
            return false;
        }

        let ttl = chrono::Duration::from_std(ttl).unwrap_or_else(|_| chrono::Duration::days(36500));
        let expires_at = Utc::now() + ttl;

        let evicted = {
            let mut inner = self.inner.write().await;
            inner.insert(key, value, expires_at, size, self.max_bytes)
        };
        if evicted > 0 {
            self.evictions.fetch_add(evicted, Ordering::Relaxed);
            debug!(cache = %self.name, evicted, "Evicted entries to make room");
        }
        true
    }

    pub async fn remove(&self, key: &str) -> Option<V> {
        self.inner.write().await.remove(key).map(|e| e.value)
    }

    /// Number of stored entries (including ones that expired but were not yet purged).
    pub async fn len(&self) -> usize {
        self.inner.read().await.entries.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    pub async fn size_bytes(&self) -> usize {
        self.inner.read().await.size_bytes
    }

    /// Drop every expired entry. Returns how many were removed.
    pub async fn purge_expired(&self) -> usize {
        let now = Utc::now();
        let mut inner = self.inner.write().await;
        let expired: Vec<String> = inner
            .entries
            .iter()
            .filter(|(_, e)| e.expires_at <= now)
            .map(|(k, _)| k.clone())
            .collect();
        for key in &expired {
            inner.remove(key);
        }
        expired.len()
    }

    /// Consistent dump of all live entries in insertion order.
    ///
    /// Holds only the read lock, so traffic continues while it runs.
    pub async fn snapshot(&self) -> CacheSnapshot<V> {
        let now = Utc::now();
        let inner = self.inner.read().await;
        let entries = inner
            .order
            .iter()
            .filter_map(|(key, seq)| {
                let entry = inner.entries.get(key)?;
                (entry.seq == *seq && entry.expires_at > now).then(|| SnapshotEntry {
                    key: key.clone(),
                    value: entry.value.clone(),
                    expires_at: entry.expires_at,
                })
            })
            .collect();

        CacheSnapshot {
            name: self.name.clone(),
            saved_at: now,
            entries,
        }
    }

    /// Write a snapshot atomically (temp file + rename). Returns the entry count.
    pub async fn save_to_file(&self, path: &Path) -> Result<usize, CacheError> {
        let snapshot = self.snapshot().await;
        let count = snapshot.entries.len();
        let bytes = serde_json::to_vec(&snapshot)?;

        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let tmp_path = path.with_extension("tmp");
        tokio::fs::write(&tmp_path, &bytes).await?;
        tokio::fs::rename(&tmp_path, path).await?;

        Ok(count)
    }

    pub async fn stats(&self) -> CacheStats {
        let inner = self.inner.read().await;
        CacheStats {
            name: self.name.clone(),
            entries: inner.entries.len(),
            size_bytes: inner.size_bytes,
            max_bytes: self.max_bytes,
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            evictions: self.evictions.load(Ordering::Relaxed),
        }
    }

    fn record(&self, hit: bool) {
        let result = if hit {
            self.hits.fetch_add(1, Ordering::Relaxed);
            "hit"
        } else {
            self.misses.fetch_add(1, Ordering::Relaxed);
            "miss"
        };
        CACHE_LOOKUPS.with_label_values(&[&self.name, result]).inc();
    }
}

#[async_trait]
impl<V> PersistentCache for CacheStore<V>
where
    V: Clone + Serialize + DeserializeOwned + Send + Sync + 'static,
{
    fn name(&self) -> &str {
        &self.name
    }

    async fn save_to_file(&self, path: &Path) -> Result<usize, CacheError> {
        CacheStore::save_to_file(self, path).await
    }

    async fn purge_expired(&self) -> usize {
        CacheStore::purge_expired(self).await
    }

    async fn stats(&self) -> CacheStats {
        CacheStore::stats(self).await
    }
}

fn entry_size<V: Serialize>(key: &str, value: &V) -> Option<usize> {
    let value_len = serde_json::to_vec(value).ok()?.len();
    Some(key.len() + value_len + ENTRY_OVERHEAD_BYTES)
}
