//! Concurrent fan-out over all indexers, merged into one ordered result.

use futures::StreamExt;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::cache::TorrentCache;
use crate::metrics::{INDEXER_SEARCHES, SEARCH_RESULTS};

use super::dedup::deduplicate_results;
use super::{IndexerAdapter, MovieId, RawTorrentResult, SearchError, SearchOutcome};

enum AdapterEvent {
    Result(RawTorrentResult),
    Finished { indexer: String, status: AdapterStatus },
}

enum AdapterStatus {
    Success,
    Failed(SearchError),
    TimedOut,
}

impl AdapterStatus {
    fn label(&self) -> &'static str {
        match self {
            AdapterStatus::Success => "success",
            AdapterStatus::Failed(_) => "error",
            AdapterStatus::TimedOut => "timeout",
        }
    }
}

/// Searches every configured indexer and merges their results.
///
/// Never fails: indexers that error or time out only mark the outcome as
/// partial. Results are cached per movie when at least one indexer finished
/// successfully; partial outcomes only for the shorter partial TTL.
pub struct SearchAggregator {
    adapters: Vec<Arc<dyn IndexerAdapter>>,
    cache: Arc<TorrentCache>,
    indexer_timeout: Duration,
    timeout: Duration,
    partial_ttl: Duration,
}

const DEFAULT_PARTIAL_TTL: Duration = Duration::from_secs(10 * 60);

impl SearchAggregator {
    pub fn new(
        adapters: Vec<Arc<dyn IndexerAdapter>>,
        cache: Arc<TorrentCache>,
        indexer_timeout: Duration,
        timeout: Duration,
    ) -> Self {
        Self {
            adapters,
            cache,
            indexer_timeout,
            timeout,
            partial_ttl: DEFAULT_PARTIAL_TTL,
        }
    }

    pub fn with_partial_ttl(mut self, ttl: Duration) -> Self {
        self.partial_ttl = ttl;
        self
    }

    pub async fn search(&self, movie: &MovieId) -> SearchOutcome {
        let key = movie.cache_key();
        if let Some(outcome) = self.cache.get(&key).await {
            debug!(
                movie = %movie,
                results = outcome.candidates.len(),
                partial = outcome.partial,
                "Torrent cache hit"
            );
            return outcome;
        }

        let start = Instant::now();
        let deadline = tokio::time::Instant::now() + self.timeout;
        let (tx, mut rx) = mpsc::channel::<AdapterEvent>(64);

        let handles: Vec<JoinHandle<()>> = self
            .adapters
            .iter()
            .map(|adapter| {
                let adapter = Arc::clone(adapter);
                let movie = movie.clone();
                let tx = tx.clone();
                let indexer_timeout = self.indexer_timeout;
                tokio::spawn(run_adapter(adapter, movie, tx, indexer_timeout))
            })
            .collect();
        drop(tx);

        let mut raw = Vec::new();
        let mut finished = 0;
        let mut succeeded = 0;
        let mut partial = false;

        while finished < handles.len() {
            match tokio::time::timeout_at(deadline, rx.recv()).await {
                Ok(Some(AdapterEvent::Result(r))) => raw.push(r),
                Ok(Some(AdapterEvent::Finished { indexer, status })) => {
                    finished += 1;
                    INDEXER_SEARCHES
                        .with_label_values(&[&indexer, status.label()])
                        .inc();
                    match status {
                        AdapterStatus::Success => succeeded += 1,
                        AdapterStatus::Failed(e) => {
                            warn!(indexer = %indexer, error = %e, "Indexer search failed");
                            partial = true;
                        }
                        AdapterStatus::TimedOut => {
                            warn!(indexer = %indexer, timeout_ms = self.indexer_timeout.as_millis() as u64, "Indexer search timed out");
                            partial = true;
                        }
                    }
                }
                // All senders gone: every task ended, possibly by panic.
                Ok(None) => {
                    if finished < handles.len() {
                        partial = true;
                    }
                    break;
                }
                Err(_) => {
                    warn!(
                        movie = %movie,
                        pending = handles.len() - finished,
                        "Search deadline reached, cancelling pending indexers"
                    );
                    partial = true;
                    break;
                }
            }
        }

        for handle in &handles {
            handle.abort();
        }

        let candidates = deduplicate_results(raw);
        SEARCH_RESULTS
            .with_label_values(&[])
            .observe(candidates.len() as f64);

        info!(
            movie = %movie,
            results = candidates.len(),
            indexers = handles.len(),
            succeeded,
            partial,
            duration_ms = start.elapsed().as_millis() as u64,
            "Search complete"
        );

        let outcome = SearchOutcome {
            candidates,
            partial,
        };
        if succeeded > 0 && partial {
            let ttl = self.partial_ttl.min(self.cache.default_ttl());
            self.cache.insert_with_ttl(key, outcome.clone(), ttl).await;
        } else if succeeded > 0 {
            self.cache.insert(key, outcome.clone()).await;
        }

        outcome
    }
}

/// Drain one adapter into the channel, bounded by its own deadline.
async fn run_adapter(
    adapter: Arc<dyn IndexerAdapter>,
    movie: MovieId,
    tx: mpsc::Sender<AdapterEvent>,
    timeout: Duration,
) {
    let drain = async {
        let mut stream = adapter.find(&movie).await?;
        while let Some(item) = stream.next().await {
            let raw = item?;
            if tx.send(AdapterEvent::Result(raw)).await.is_err() {
                break;
            }
        }
        Ok::<(), SearchError>(())
    };

    let status = match tokio::time::timeout(timeout, drain).await {
        Ok(Ok(())) => AdapterStatus::Success,
        Ok(Err(e)) => AdapterStatus::Failed(e),
        Err(_) => AdapterStatus::TimedOut,
    };

    let _ = tx
        .send(AdapterEvent::Finished {
            indexer: adapter.name().to_string(),
            status,
        })
        .await;
}
