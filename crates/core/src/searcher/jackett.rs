//! Jackett indexer adapter.

use async_trait::async_trait;
use futures::StreamExt;
use reqwest::Client;
use serde::Deserialize;
use std::time::{Duration, Instant};
use tracing::debug;

use crate::config::JackettConfig;
use crate::metrics::observe_external_call;

use super::{IndexerAdapter, MovieId, RawTorrentResult, SearchError, TorrentStream};

/// Jackett movies category.
const MOVIES_CATEGORY: u32 = 2000;

/// One Jackett indexer, queried through Jackett's JSON results API.
///
/// Every configured Jackett indexer id becomes its own adapter, so a slow
/// tracker behind Jackett only costs its own results.
pub struct JackettIndexer {
    client: Client,
    url: String,
    api_key: String,
    indexer: String,
    name: String,
}

impl JackettIndexer {
    pub fn new(
        url: &str,
        api_key: &str,
        indexer: &str,
        timeout: Duration,
    ) -> Result<Self, SearchError> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            url: url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
            indexer: indexer.to_string(),
            name: format!("jackett:{}", indexer),
        })
    }

    /// One adapter per configured indexer id.
    pub fn from_config(config: &JackettConfig, timeout: Duration) -> Result<Vec<Self>, SearchError> {
        config
            .indexers
            .iter()
            .map(|indexer| Self::new(&config.url, &config.api_key, indexer, timeout))
            .collect()
    }

    /// Build the Jackett API URL for a search.
    fn build_search_url(&self, movie: &MovieId) -> String {
        format!(
            "{}/api/v2.0/indexers/{}/results?apikey={}&Query={}&Category[]={}",
            self.url,
            urlencoding::encode(&self.indexer),
            urlencoding::encode(&self.api_key),
            urlencoding::encode(movie.as_str()),
            MOVIES_CATEGORY
        )
    }

    async fn fetch(&self, movie: &MovieId) -> Result<JackettResponse, SearchError> {
        let url = self.build_search_url(movie);
        debug!(indexer = %self.name, movie = %movie, "Searching Jackett");

        let response = self.client.get(&url).send().await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(SearchError::ApiError(format!(
                "HTTP {}: {}",
                status,
                body.chars().take(200).collect::<String>()
            )));
        }

        response
            .json()
            .await
            .map_err(|e| SearchError::ApiError(format!("Failed to parse response: {}", e)))
    }
}

#[async_trait]
impl IndexerAdapter for JackettIndexer {
    fn name(&self) -> &str {
        &self.name
    }

    async fn find(&self, movie: &MovieId) -> Result<TorrentStream, SearchError> {
        let start = Instant::now();
        let result = self.fetch(movie).await;
        observe_external_call("jackett", "search", start.elapsed().as_secs_f64(), result.is_ok());
        let response = result?;

        debug!(
            indexer = %self.name,
            results = response.Results.len(),
            "Jackett search complete"
        );

        let name = self.name.clone();
        let results = response.Results.into_iter().map(move |r| {
            let info_hash = r
                .InfoHash
                .or_else(|| r.MagnetUri.as_deref().and_then(extract_hash_from_magnet));
            Ok(RawTorrentResult {
                title: r.Title,
                indexer: name.clone(),
                info_hash,
                quality: None,
                size_bytes: r.Size.unwrap_or(0).max(0) as u64,
            })
        });

        Ok(futures::stream::iter(results).boxed())
    }
}

/// Extract info hash from a magnet URI.
fn extract_hash_from_magnet(magnet: &str) -> Option<String> {
    let (_, query) = magnet.split_once('?')?;
    query
        .split('&')
        .find_map(|param| param.strip_prefix("xt=urn:btih:"))
        .map(|hash| hash.to_lowercase())
}

// Jackett API response types
#[derive(Debug, Deserialize)]
#[allow(non_snake_case)]
struct JackettResponse {
    Results: Vec<JackettResult>,
}

#[derive(Debug, Deserialize)]
#[allow(non_snake_case)]
struct JackettResult {
    Title: String,
    MagnetUri: Option<String>,
    InfoHash: Option<String>,
    Size: Option<i64>,
}
