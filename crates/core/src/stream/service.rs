use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info};

use crate::credential::Session;
use crate::debrid::{DebridClient, FileSelector};
use crate::redirect::RedirectResolver;
use crate::searcher::{MediaType, MovieId, SearchAggregator, TorrentCandidate};

/// One playable entry in a stream listing. `url` is always a ticket URL.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamOption {
    pub name: String,
    pub title: String,
    pub url: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamListing {
    pub streams: Vec<StreamOption>,
    pub partial: bool,
}

pub struct StreamService {
    aggregator: Arc<SearchAggregator>,
    debrid: Arc<DebridClient>,
    resolver: Arc<RedirectResolver>,
}

impl StreamService {
    pub fn new(
        aggregator: Arc<SearchAggregator>,
        debrid: Arc<DebridClient>,
        resolver: Arc<RedirectResolver>,
    ) -> Self {
        Self {
            aggregator,
            debrid,
            resolver,
        }
    }

    /// List instantly playable streams for a movie, in search order.
    pub async fn list_streams(
        &self,
        session: &Session,
        media_type: &MediaType,
        movie: &MovieId,
    ) -> StreamListing {
        if *media_type != MediaType::Movie {
            debug!(media_type = %media_type, "Unsupported media type, returning no streams");
            return StreamListing::default();
        }

        let outcome = self.aggregator.search(movie).await;
        if outcome.candidates.is_empty() {
            return StreamListing {
                streams: Vec::new(),
                partial: outcome.partial,
            };
        }

        let hashes: Vec<String> = outcome
            .candidates
            .iter()
            .map(|c| c.info_hash.clone())
            .collect();
        let availability = self.debrid.check_availability(session, &hashes).await;

        let mut streams = Vec::new();
        for candidate in &outcome.candidates {
            if !availability.get(&candidate.info_hash).copied().unwrap_or(false) {
                continue;
            }
            let url = self
                .resolver
                .issue_ticket(session, &candidate.info_hash, FileSelector::Largest)
                .await;
            streams.push(stream_option(self.debrid.provider_name(), candidate, url));
        }

        info!(
            movie = %movie,
            candidates = outcome.candidates.len(),
            streams = streams.len(),
            partial = outcome.partial,
            "Listed streams"
        );

        StreamListing {
            streams,
            partial: outcome.partial,
        }
    }
}

fn stream_option(provider: &str, candidate: &TorrentCandidate, url: String) -> StreamOption {
    StreamOption {
        name: format!("{}\n{}", provider, candidate.quality),
        title: format!(
            "{}\n{} | {}",
            candidate.title,
            format_size(candidate.size_bytes),
            candidate.sources.join(", ")
        ),
        url,
    }
}

fn format_size(bytes: u64) -> String {
    const GIB: f64 = 1024.0 * 1024.0 * 1024.0;
    const MIB: f64 = 1024.0 * 1024.0;
    let b = bytes as f64;
    if b >= GIB {
        format!("{:.2} GB", b / GIB)
    } else {
        format!("{:.0} MB", b / MIB)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::CacheStore;
    use crate::searcher::{IndexerAdapter, Quality};
    use crate::testing::{fixtures, MockDebridProvider, MockIndexer};
    use std::time::Duration;

    fn service(indexer: MockIndexer, provider: MockDebridProvider) -> StreamService {
        let adapters: Vec<Arc<dyn IndexerAdapter>> = vec![Arc::new(indexer)];
        let aggregator = Arc::new(SearchAggregator::new(
            adapters,
            Arc::new(CacheStore::new("torrent", 1024 * 1024, Duration::from_secs(60))),
            Duration::from_millis(500),
            Duration::from_secs(1),
        ));
        let debrid = Arc::new(DebridClient::new(
            Arc::new(provider),
            Arc::new(CacheStore::new("availability", 1024 * 1024, Duration::from_secs(60))),
            50,
        ));
        let resolver = Arc::new(RedirectResolver::new(
            Arc::clone(&debrid),
            Arc::new(CacheStore::new("redirect", 1024 * 1024, Duration::from_secs(60))),
            "http://gate.test",
            Duration::from_secs(60),
        ));
        StreamService::new(aggregator, debrid, resolver)
    }

    fn matrix() -> MovieId {
        MovieId::parse("tt0133093").unwrap()
    }

    #[tokio::test]
    async fn test_lists_only_available_candidates() {
        let indexer = MockIndexer::new("yts").with_results(vec![
            fixtures::raw("The Matrix 1080p", "yts", 'a', 2_000_000_000),
            fixtures::raw("The Matrix 720p", "yts", 'b', 1_000_000_000),
        ]);
        let provider = MockDebridProvider::new().with_available(&[&"b".repeat(40)]);

        let listing = service(indexer, provider)
            .list_streams(&fixtures::session(), &MediaType::Movie, &matrix())
            .await;

        assert!(!listing.partial);
        assert_eq!(listing.streams.len(), 1);
        assert!(listing.streams[0].title.starts_with("The Matrix 720p"));
        assert!(listing.streams[0].url.starts_with("http://gate.test/redirect/"));
    }

    #[tokio::test]
    async fn test_keeps_search_order() {
        let indexer = MockIndexer::new("yts").with_results(vec![
            fixtures::raw("Small 1080p", "yts", 'a', 1_000),
            fixtures::raw("Big 2160p", "yts", 'b', 9_000),
        ]);
        let provider =
            MockDebridProvider::new().with_available(&[&"a".repeat(40), &"b".repeat(40)]);

        let listing = service(indexer, provider)
            .list_streams(&fixtures::session(), &MediaType::Movie, &matrix())
            .await;

        let titles: Vec<_> = listing.streams.iter().map(|s| s.title.as_str()).collect();
        assert!(titles[0].starts_with("Big 2160p"));
        assert!(titles[1].starts_with("Small 1080p"));
        assert!(listing.streams[0].name.contains(&Quality::Uhd2160p.to_string()));
    }

    #[tokio::test]
    async fn test_non_movie_type_is_empty() {
        let indexer = MockIndexer::new("yts")
            .with_results(vec![fixtures::raw("Show 1080p", "yts", 'a', 1_000)]);
        let indexer_calls = indexer.clone();

        let listing = service(indexer, MockDebridProvider::new())
            .list_streams(&fixtures::session(), &MediaType::Series, &matrix())
            .await;

        assert_eq!(listing, StreamListing::default());
        assert_eq!(indexer_calls.call_count(), 0);
    }

    #[tokio::test]
    async fn test_failed_search_is_partial_and_empty() {
        let indexer = MockIndexer::new("yts").with_error("down");

        let listing = service(indexer, MockDebridProvider::new())
            .list_streams(&fixtures::session(), &MediaType::Movie, &matrix())
            .await;

        assert!(listing.partial);
        assert!(listing.streams.is_empty());
    }

    #[test]
    fn test_format_size() {
        assert_eq!(format_size(1024 * 1024 * 700), "700 MB");
        assert_eq!(format_size(1024 * 1024 * 1024 * 2), "2.00 GB");
    }
}
