//! Layered in-memory caches with TTLs, byte ceilings and disk snapshots.
//!
//! Four independent stores are used so that churn in one (e.g. many new
//! torrent listings) never pushes out entries of another (e.g. redirect
//! tickets a user is about to follow).

mod persistence;
mod store;

pub use persistence::CachePersistence;
pub use store::{CacheSnapshot, CacheStore, SnapshotEntry};

use async_trait::async_trait;
use serde::Serialize;
use std::path::Path;
use std::sync::Arc;
use thiserror::Error;

use crate::config::CacheConfig;
use crate::credential::CachedIdentity;
use crate::debrid::AvailabilityRecord;
use crate::redirect::RedirectEntry;
use crate::searcher::SearchOutcome;

pub const CREDENTIAL_CACHE: &str = "credential";
pub const AVAILABILITY_CACHE: &str = "availability";
pub const TORRENT_CACHE: &str = "torrent";
pub const REDIRECT_CACHE: &str = "redirect";

/// Credential digest -> validated account identity.
pub type CredentialCache = CacheStore<CachedIdentity>;
/// Info-hash -> instant availability.
pub type AvailabilityCache = CacheStore<AvailabilityRecord>;
/// Movie key -> merged, ordered search result and its partial flag.
pub type TorrentCache = CacheStore<SearchOutcome>;
/// Ticket id / stream key -> ticket or unlocked stream.
pub type RedirectCache = CacheStore<RedirectEntry>;

/// Errors for cache snapshot I/O.
#[derive(Debug, Error)]
pub enum CacheError {
    #[error("Cache I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Cache serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Point-in-time statistics for one cache.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct CacheStats {
    pub name: String,
    pub entries: usize,
    pub size_bytes: usize,
    pub max_bytes: usize,
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
}

/// Type-erased view of a cache used by [`CachePersistence`].
#[async_trait]
pub trait PersistentCache: Send + Sync {
    fn name(&self) -> &str;

    /// Write a snapshot to `path`, returning the number of entries written.
    async fn save_to_file(&self, path: &Path) -> Result<usize, CacheError>;

    async fn purge_expired(&self) -> usize;

    async fn stats(&self) -> CacheStats;
}

/// The four process-wide caches, constructed explicitly and shared by handle.
#[derive(Clone)]
pub struct CacheSet {
    pub credentials: Arc<CredentialCache>,
    pub availability: Arc<AvailabilityCache>,
    pub torrents: Arc<TorrentCache>,
    pub redirects: Arc<RedirectCache>,
}

impl CacheSet {
    /// Empty caches sized and timed from config.
    pub fn in_memory(config: &CacheConfig) -> Self {
        let max = config.per_store_max_bytes();
        Self {
            credentials: Arc::new(CacheStore::new(CREDENTIAL_CACHE, max, config.credential_ttl())),
            availability: Arc::new(CacheStore::new(
                AVAILABILITY_CACHE,
                max,
                config.availability_ttl(),
            )),
            torrents: Arc::new(CacheStore::new(TORRENT_CACHE, max, config.torrent_ttl())),
            redirects: Arc::new(CacheStore::new(REDIRECT_CACHE, max, config.redirect_ttl())),
        }
    }

    /// Restore each cache from its snapshot in `dir`, or start it empty.
    pub async fn load(config: &CacheConfig, dir: &Path) -> Self {
        let max = config.per_store_max_bytes();
        Self {
            credentials: Arc::new(
                CacheStore::load_from_file_or_new(
                    CREDENTIAL_CACHE,
                    &dir.join(CREDENTIAL_CACHE),
                    max,
                    config.credential_ttl(),
                )
                .await,
            ),
            availability: Arc::new(
                CacheStore::load_from_file_or_new(
                    AVAILABILITY_CACHE,
                    &dir.join(AVAILABILITY_CACHE),
                    max,
                    config.availability_ttl(),
                )
                .await,
            ),
            torrents: Arc::new(
                CacheStore::load_from_file_or_new(
                    TORRENT_CACHE,
                    &dir.join(TORRENT_CACHE),
                    max,
                    config.torrent_ttl(),
                )
                .await,
            ),
            redirects: Arc::new(
                CacheStore::load_from_file_or_new(
                    REDIRECT_CACHE,
                    &dir.join(REDIRECT_CACHE),
                    max,
                    config.redirect_ttl(),
                )
                .await,
            ),
        }
    }

    /// Type-erased handles, in snapshot order.
    pub fn persistent(&self) -> Vec<Arc<dyn PersistentCache>> {
        vec![
            Arc::clone(&self.credentials) as Arc<dyn PersistentCache>,
            Arc::clone(&self.availability) as Arc<dyn PersistentCache>,
            Arc::clone(&self.torrents) as Arc<dyn PersistentCache>,
            Arc::clone(&self.redirects) as Arc<dyn PersistentCache>,
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CacheConfig;

    #[tokio::test]
    async fn test_cache_set_splits_budget() {
        let config = CacheConfig {
            max_bytes: 8 * 1024 * 1024,
            ..Default::default()
        };
        let caches = CacheSet::in_memory(&config);

        let stats = caches.torrents.stats().await;
        assert_eq!(stats.max_bytes, 2 * 1024 * 1024);
        assert_eq!(stats.name, TORRENT_CACHE);
    }

    #[tokio::test]
    async fn test_cache_set_persistent_names() {
        let caches = CacheSet::in_memory(&CacheConfig::default());
        let names: Vec<_> = caches
            .persistent()
            .iter()
            .map(|c| c.name().to_string())
            .collect();
        assert_eq!(
            names,
            vec![CREDENTIAL_CACHE, AVAILABILITY_CACHE, TORRENT_CACHE, REDIRECT_CACHE]
        );
    }
}
