use chrono::Utc;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::cache::AvailabilityCache;
use crate::credential::Session;
use crate::searcher::normalize_info_hash;

use super::{AvailabilityRecord, DebridError, DebridProvider, FileSelector, UnlockedStream};

/// Debrid provider access with availability caching and batching.
pub struct DebridClient {
    provider: Arc<dyn DebridProvider>,
    cache: Arc<AvailabilityCache>,
    batch_size: usize,
}

impl DebridClient {
    pub fn new(
        provider: Arc<dyn DebridProvider>,
        cache: Arc<AvailabilityCache>,
        batch_size: usize,
    ) -> Self {
        Self {
            provider,
            cache,
            batch_size: batch_size.max(1),
        }
    }

    pub fn provider_name(&self) -> &str {
        self.provider.name()
    }

    /// Instant availability for each (normalized) info-hash.
    ///
    /// Only hashes missing from the availability cache are sent to the
    /// provider, in batches. A failed batch reports its hashes as unavailable
    /// without caching them.
    pub async fn check_availability(
        &self,
        session: &Session,
        hashes: &[String],
    ) -> HashMap<String, bool> {
        let mut seen = HashSet::new();
        let hashes: Vec<String> = hashes
            .iter()
            .filter_map(|h| normalize_info_hash(h))
            .filter(|h| seen.insert(h.clone()))
            .collect();

        let mut result = HashMap::with_capacity(hashes.len());
        let mut misses = Vec::new();
        for hash in hashes {
            match self.cache.get(&hash).await {
                Some(record) => {
                    result.insert(hash, record.instant);
                }
                None => misses.push(hash),
            }
        }

        if misses.is_empty() {
            debug!(hashes = result.len(), "Availability fully cached");
            return result;
        }

        debug!(
            cached = result.len(),
            misses = misses.len(),
            batch_size = self.batch_size,
            "Checking instant availability"
        );

        for batch in misses.chunks(self.batch_size) {
            match self
                .provider
                .instant_availability(&session.credential, batch)
                .await
            {
                Ok(available) => {
                    let checked_at = Utc::now();
                    for hash in batch {
                        let instant = available.get(hash).copied().unwrap_or(false);
                        self.cache
                            .insert(hash.clone(), AvailabilityRecord { instant, checked_at })
                            .await;
                        result.insert(hash.clone(), instant);
                    }
                }
                Err(e) => {
                    warn!(
                        provider = self.provider.name(),
                        error = %e,
                        hashes = batch.len(),
                        "Availability check failed"
                    );
                    for hash in batch {
                        result.insert(hash.clone(), false);
                    }
                }
            }
        }

        result
    }

    /// Turn a cached torrent into a direct stream URL.
    pub async fn unlock(
        &self,
        session: &Session,
        info_hash: &str,
        selector: FileSelector,
    ) -> Result<UnlockedStream, DebridError> {
        let stream = self
            .provider
            .unlock(&session.credential, info_hash, selector)
            .await?;
        info!(
            account = %session.account,
            info_hash,
            selector = %selector,
            "Unlocked stream"
        );
        Ok(stream)
    }
}
