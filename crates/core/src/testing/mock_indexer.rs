//! Mock indexer for testing.

use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crate::searcher::{IndexerAdapter, MovieId, RawTorrentResult, SearchError, TorrentStream};

/// Mock implementation of `IndexerAdapter`.
///
/// Clones share the call counter, so a clone can be kept for assertions
/// after the original is handed to an aggregator.
///
/// ```rust,ignore
/// let indexer = MockIndexer::new("yts")
///     .with_results(vec![fixtures::raw("The Matrix 1080p", "yts", 'a', 1_000)])
///     .with_item_delay(Duration::from_millis(50));
/// ```
#[derive(Debug, Clone)]
pub struct MockIndexer {
    name: String,
    results: Vec<RawTorrentResult>,
    /// Delay before the stream is returned.
    delay: Duration,
    /// Delay before each yielded item.
    item_delay: Duration,
    error: Option<String>,
    calls: Arc<AtomicUsize>,
}

impl MockIndexer {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            results: Vec::new(),
            delay: Duration::ZERO,
            item_delay: Duration::ZERO,
            error: None,
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn with_results(mut self, results: Vec<RawTorrentResult>) -> Self {
        self.results = results;
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn with_item_delay(mut self, delay: Duration) -> Self {
        self.item_delay = delay;
        self
    }

    /// Fail every lookup with an API error.
    pub fn with_error(mut self, message: &str) -> Self {
        self.error = Some(message.to_string());
        self
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl IndexerAdapter for MockIndexer {
    fn name(&self) -> &str {
        &self.name
    }

    async fn find(&self, _movie: &MovieId) -> Result<TorrentStream, SearchError> {
        self.calls.fetch_add(1, Ordering::SeqCst);

        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        if let Some(message) = &self.error {
            return Err(SearchError::ApiError(message.clone()));
        }

        let item_delay = self.item_delay;
        let items = stream::iter(self.results.clone()).then(move |item| async move {
            if !item_delay.is_zero() {
                tokio::time::sleep(item_delay).await;
            }
            Ok(item)
        });
        Ok(items.boxed())
    }
}
