//! Periodic cache snapshots, interlocked with shutdown.

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{error, info};

use super::PersistentCache;

/// Writes every registered cache to `{dir}/{cache name}`.
///
/// Once [`shutdown`](Self::shutdown) has set the stopping flag, regular
/// snapshot cycles are skipped, and the final flush never overlaps a
/// running cycle.
pub struct CachePersistence {
    dir: PathBuf,
    caches: Vec<Arc<dyn PersistentCache>>,
    stopping: AtomicBool,
    write_lock: Mutex<()>,
}

impl CachePersistence {
    pub fn new(dir: impl Into<PathBuf>, caches: Vec<Arc<dyn PersistentCache>>) -> Self {
        Self {
            dir: dir.into(),
            caches,
            stopping: AtomicBool::new(false),
            write_lock: Mutex::new(()),
        }
    }

    pub fn is_stopping(&self) -> bool {
        self.stopping.load(Ordering::SeqCst)
    }

    /// Run one regular snapshot cycle. Returns false if skipped because the
    /// process is shutting down.
    pub async fn persist(&self) -> bool {
        if self.is_stopping() {
            info!("Regular cache persistence triggered, but server is shutting down");
            return false;
        }

        let _guard = self.write_lock.lock().await;
        // Shutdown may have won the lock and already flushed.
        if self.is_stopping() {
            info!("Regular cache persistence triggered, but server is shutting down");
            return false;
        }
        self.write_all().await;
        true
    }

    /// Set the stopping flag and perform the final flush.
    pub async fn shutdown(&self) {
        self.stopping.store(true, Ordering::SeqCst);
        let _guard = self.write_lock.lock().await;
        info!("Final cache flush");
        self.write_all().await;
    }

    async fn write_all(&self) {
        info!(dir = %self.dir.display(), "Persisting caches");
        for cache in &self.caches {
            let purged = cache.purge_expired().await;
            let path = self.dir.join(cache.name());
            match cache.save_to_file(&path).await {
                Ok(entries) => {
                    info!(cache = cache.name(), entries, purged, "Persisted cache");
                }
                Err(e) => {
                    error!(cache = cache.name(), error = %e, "Couldn't save cache to file");
                }
            }
        }
    }

    /// Log statistics of every cache.
    pub async fn log_stats(&self) {
        for cache in &self.caches {
            let stats = cache.stats().await;
            info!(
                cache = %stats.name,
                entries = stats.entries,
                size_bytes = stats.size_bytes,
                max_bytes = stats.max_bytes,
                hits = stats.hits,
                misses = stats.misses,
                evictions = stats.evictions,
                "Cache stats"
            );
        }
    }

    /// Spawn the periodic snapshot loop. The loop ends once stopping is set.
    pub fn spawn_periodic(self: &Arc<Self>, interval: Duration) -> JoinHandle<()> {
        let this = Arc::clone(self);
        tokio::spawn(async move {
            loop {
                tokio::time::sleep(interval).await;
                if !this.persist().await {
                    break;
                }
            }
        })
    }

    /// Spawn the periodic statistics logger.
    pub fn spawn_stats_logger(self: &Arc<Self>, interval: Duration) -> JoinHandle<()> {
        let this = Arc::clone(self);
        tokio::spawn(async move {
            loop {
                tokio::time::sleep(interval).await;
                if this.is_stopping() {
                    break;
                }
                this.log_stats().await;
            }
        })
    }
}
