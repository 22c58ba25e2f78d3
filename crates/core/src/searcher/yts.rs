//! YTS indexer adapter.

use async_trait::async_trait;
use futures::StreamExt;
use reqwest::Client;
use serde::Deserialize;
use std::time::{Duration, Instant};
use tracing::debug;

use crate::config::YtsConfig;
use crate::metrics::observe_external_call;

use super::{IndexerAdapter, MovieId, RawTorrentResult, SearchError, TorrentStream};

/// Queries the YTS list_movies API by IMDb id.
pub struct YtsIndexer {
    client: Client,
    base_url: String,
}

impl YtsIndexer {
    pub fn new(config: &YtsConfig, timeout: Duration) -> Result<Self, SearchError> {
        Self::with_base_url(&config.url, timeout)
    }

    pub fn with_base_url(base_url: &str, timeout: Duration) -> Result<Self, SearchError> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    fn build_search_url(&self, movie: &MovieId) -> String {
        format!(
            "{}/api/v2/list_movies.json?query_term={}",
            self.base_url,
            urlencoding::encode(movie.as_str())
        )
    }

    async fn fetch(&self, movie: &MovieId) -> Result<YtsResponse, SearchError> {
        let url = self.build_search_url(movie);
        debug!(indexer = "yts", movie = %movie, "Searching YTS");

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

        let parsed: YtsResponse = response
            .json()
            .await
            .map_err(|e| SearchError::ApiError(format!("Failed to parse response: {}", e)))?;
        if parsed.status != "ok" {
            return Err(SearchError::ApiError(
                parsed.status_message.unwrap_or(parsed.status),
            ));
        }
        Ok(parsed)
    }
}

#[async_trait]
impl IndexerAdapter for YtsIndexer {
    fn name(&self) -> &str {
        "yts"
    }

    async fn find(&self, movie: &MovieId) -> Result<TorrentStream, SearchError> {
        let start = Instant::now();
        let result = self.fetch(movie).await;
        observe_external_call("yts", "search", start.elapsed().as_secs_f64(), result.is_ok());
        let response = result?;

        // YTS does a fuzzy query; keep only the exact movie.
        let imdb_id = movie.as_str().to_string();
        let movies = response
            .data
            .and_then(|d| d.movies)
            .unwrap_or_default()
            .into_iter()
            .filter(move |m| m.imdb_code.eq_ignore_ascii_case(&imdb_id));

        let results = movies.flat_map(|m| {
            let title = m.title_long.clone();
            m.torrents.into_iter().map(move |t| {
                Ok(RawTorrentResult {
                    title: match &t.kind {
                        Some(kind) => format!("{} [{}] [{}]", title, t.quality, kind),
                        None => format!("{} [{}]", title, t.quality),
                    },
                    indexer: "yts".to_string(),
                    info_hash: Some(t.hash),
                    quality: Some(t.quality),
                    size_bytes: t.size_bytes,
                })
            })
        });

        Ok(futures::stream::iter(results).boxed())
    }
}

// YTS API response types
#[derive(Debug, Deserialize)]
struct YtsResponse {
    status: String,
    status_message: Option<String>,
    data: Option<YtsData>,
}

#[derive(Debug, Deserialize)]
struct YtsData {
    movies: Option<Vec<YtsMovie>>,
}

#[derive(Debug, Deserialize)]
struct YtsMovie {
    imdb_code: String,
    title_long: String,
    #[serde(default)]
    torrents: Vec<YtsTorrent>,
}

#[derive(Debug, Deserialize)]
struct YtsTorrent {
    hash: String,
    quality: String,
    #[serde(rename = "type")]
    kind: Option<String>,
    #[serde(default)]
    size_bytes: u64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::TryStreamExt;
    use mockito::{Matcher, Server};

    const MATRIX_RESPONSE: &str = r#"{
        "status": "ok",
        "status_message": "Query was successful",
        "data": {
            "movie_count": 2,
            "movies": [
                {
                    "imdb_code": "tt0133093",
                    "title_long": "The Matrix (1999)",
                    "torrents": [
                        {"hash": "AAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAA", "quality": "1080p", "type": "bluray", "size_bytes": 2000000000},
                        {"hash": "BBBBBBBBBBBBBBBBBBBBBBBBBBBBBBBBBBBBBBBB", "quality": "720p", "type": "web", "size_bytes": 900000000}
                    ]
                },
                {
                    "imdb_code": "tt0234215",
                    "title_long": "The Matrix Reloaded (2003)",
                    "torrents": [
                        {"hash": "CCCCCCCCCCCCCCCCCCCCCCCCCCCCCCCCCCCCCCCC", "quality": "1080p", "type": "bluray", "size_bytes": 2100000000}
                    ]
                }
            ]
        }
    }"#;

    #[test]
    fn test_build_search_url() {
        let yts = YtsIndexer::with_base_url("https://yts.example/", Duration::from_secs(5)).unwrap();
        let movie = MovieId::parse("tt0133093").unwrap();
        assert_eq!(
            yts.build_search_url(&movie),
            "https://yts.example/api/v2/list_movies.json?query_term=tt0133093"
        );
    }

    #[tokio::test]
    async fn test_find_yields_only_exact_movie() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("GET", "/api/v2/list_movies.json")
            .match_query(Matcher::UrlEncoded(
                "query_term".into(),
                "tt0133093".into(),
            ))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(MATRIX_RESPONSE)
            .create_async()
            .await;

        let yts = YtsIndexer::with_base_url(&server.url(), Duration::from_secs(5)).unwrap();
        let movie = MovieId::parse("tt0133093").unwrap();
        let results: Vec<_> = yts.find(&movie).await.unwrap().try_collect().await.unwrap();

        mock.assert_async().await;
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].title, "The Matrix (1999) [1080p] [bluray]");
        assert_eq!(results[0].quality.as_deref(), Some("1080p"));
        assert_eq!(results[0].size_bytes, 2_000_000_000);
        assert!(results.iter().all(|r| r.indexer == "yts"));
    }

    #[tokio::test]
    async fn test_find_no_movies() {
        let mut server = Server::new_async().await;
        server
            .mock("GET", "/api/v2/list_movies.json")
            .match_query(Matcher::Any)
            .with_status(200)
            .with_body(r#"{"status":"ok","data":{"movie_count":0}}"#)
            .create_async()
            .await;

        let yts = YtsIndexer::with_base_url(&server.url(), Duration::from_secs(5)).unwrap();
        let movie = MovieId::parse("tt0000001").unwrap();
        let results: Vec<_> = yts.find(&movie).await.unwrap().try_collect().await.unwrap();
        assert!(results.is_empty());
    }

    #[tokio::test]
    async fn test_find_http_error() {
        let mut server = Server::new_async().await;
        server
            .mock("GET", "/api/v2/list_movies.json")
            .match_query(Matcher::Any)
            .with_status(503)
            .with_body("maintenance")
            .create_async()
            .await;

        let yts = YtsIndexer::with_base_url(&server.url(), Duration::from_secs(5)).unwrap();
        let movie = MovieId::parse("tt0133093").unwrap();
        let err = yts.find(&movie).await.err().unwrap();
        assert!(matches!(err, SearchError::ApiError(msg) if msg.contains("503")));
    }

    #[tokio::test]
    async fn test_find_status_error() {
        let mut server = Server::new_async().await;
        server
            .mock("GET", "/api/v2/list_movies.json")
            .match_query(Matcher::Any)
            .with_status(200)
            .with_body(r#"{"status":"error","status_message":"Bad query"}"#)
            .create_async()
            .await;

        let yts = YtsIndexer::with_base_url(&server.url(), Duration::from_secs(5)).unwrap();
        let movie = MovieId::parse("tt0133093").unwrap();
        let err = yts.find(&movie).await.err().unwrap();
        assert!(matches!(err, SearchError::ApiError(msg) if msg == "Bad query"));
    }
}
