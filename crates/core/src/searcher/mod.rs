//! Torrent discovery.
//!
//! Each external source implements `IndexerAdapter`; the `SearchAggregator`
//! queries all of them concurrently, deduplicates by info-hash and caches
//! the merged result per movie.

mod aggregator;
mod dedup;
mod jackett;
mod quality;
mod types;
mod yts;

pub use aggregator::SearchAggregator;
pub use dedup::{deduplicate_results, normalize_info_hash, sort_candidates};
pub use jackett::JackettIndexer;
pub use quality::Quality;
pub use types::*;
pub use yts::YtsIndexer;

use std::sync::Arc;

use crate::config::SearchConfig;

/// Build the adapters enabled in config.
pub fn create_indexers(config: &SearchConfig) -> Result<Vec<Arc<dyn IndexerAdapter>>, SearchError> {
    let mut adapters: Vec<Arc<dyn IndexerAdapter>> = Vec::new();
    let timeout = config.indexer_timeout();

    if config.yts.enabled {
        adapters.push(Arc::new(YtsIndexer::new(&config.yts, timeout)?));
    }
    if let Some(jackett) = &config.jackett {
        for indexer in JackettIndexer::from_config(jackett, timeout)? {
            adapters.push(Arc::new(indexer));
        }
    }

    Ok(adapters)
}
