use std::sync::Arc;

use streamgate_core::{
    CacheSet, Config, CredentialGate, DebridClient, DebridProvider, IndexerAdapter,
    RedirectResolver, SanitizedConfig, SearchAggregator, StreamService,
};

/// Shared application state
pub struct AppState {
    config: Config,
    caches: CacheSet,
    gate: Arc<CredentialGate>,
    resolver: Arc<RedirectResolver>,
    streams: Arc<StreamService>,
}

impl AppState {
    /// Wire the resolution pipeline around a provider and a set of indexers.
    pub fn new(
        config: Config,
        caches: CacheSet,
        provider: Arc<dyn DebridProvider>,
        adapters: Vec<Arc<dyn IndexerAdapter>>,
    ) -> Self {
        let gate = Arc::new(CredentialGate::new(
            Arc::clone(&provider),
            Arc::clone(&caches.credentials),
            config.debrid.timeout(),
        ));
        let aggregator = Arc::new(SearchAggregator::new(
            adapters,
            Arc::clone(&caches.torrents),
            config.search.indexer_timeout(),
            config.search.timeout(),
        )
        .with_partial_ttl(config.cache.partial_search_ttl()));
        let debrid = Arc::new(DebridClient::new(
            provider,
            Arc::clone(&caches.availability),
            config.debrid.availability_batch_size,
        ));
        let resolver = Arc::new(RedirectResolver::new(
            Arc::clone(&debrid),
            Arc::clone(&caches.redirects),
            &config.server.public_url,
            config.cache.redirect_ttl(),
        ));
        let streams = Arc::new(StreamService::new(
            aggregator,
            debrid,
            Arc::clone(&resolver),
        ));

        Self {
            config,
            caches,
            gate,
            resolver,
            streams,
        }
    }

    pub fn sanitized_config(&self) -> SanitizedConfig {
        SanitizedConfig::from(&self.config)
    }

    pub fn caches(&self) -> &CacheSet {
        &self.caches
    }

    pub fn gate(&self) -> &CredentialGate {
        &self.gate
    }

    pub fn resolver(&self) -> &RedirectResolver {
        &self.resolver
    }

    pub fn streams(&self) -> &StreamService {
        &self.streams
    }
}
