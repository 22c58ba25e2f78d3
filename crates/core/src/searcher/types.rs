//! Types for the torrent search system.

use async_trait::async_trait;
use futures::stream::BoxStream;
use once_cell::sync::Lazy;
use regex_lite::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

use super::quality::Quality;

static IMDB_ID: Lazy<Regex> = Lazy::new(|| Regex::new(r"^tt\d{1,10}$").unwrap());

/// Media type segment of a stream request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MediaType {
    Movie,
    Series,
    Other(String),
}

impl MediaType {
    pub fn parse(s: &str) -> Self {
        match s {
            "movie" => MediaType::Movie,
            "series" => MediaType::Series,
            other => MediaType::Other(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            MediaType::Movie => "movie",
            MediaType::Series => "series",
            MediaType::Other(s) => s,
        }
    }
}

impl fmt::Display for MediaType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Canonical IMDb movie id (`tt` + digits).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MovieId(String);

impl MovieId {
    pub fn parse(raw: &str) -> Result<Self, SearchError> {
        let id = raw.trim().to_ascii_lowercase();
        if IMDB_ID.is_match(&id) {
            Ok(Self(id))
        } else {
            Err(SearchError::InvalidMovieId(raw.to_string()))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Key of this movie's entry in the torrent cache.
    pub fn cache_key(&self) -> String {
        format!("{}:{}", MediaType::Movie, self.0)
    }
}

impl fmt::Display for MovieId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A torrent search result (deduplicated by info_hash).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TorrentCandidate {
    /// Torrent title (from first source).
    pub title: String,
    pub quality: Quality,
    /// 40 lowercase hex characters.
    pub info_hash: String,
    pub size_bytes: u64,
    /// Every indexer that listed this torrent, in discovery order.
    pub sources: Vec<String>,
}

/// Raw result from a single indexer (before deduplication).
#[derive(Debug, Clone)]
pub struct RawTorrentResult {
    pub title: String,
    pub indexer: String,
    pub info_hash: Option<String>,
    /// Quality label as reported by the indexer, if any.
    pub quality: Option<String>,
    pub size_bytes: u64,
}

/// Merged result of one aggregated search.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchOutcome {
    pub candidates: Vec<TorrentCandidate>,
    /// At least one indexer failed, timed out or was cut off.
    pub partial: bool,
}

/// Errors that can occur during search operations.
#[derive(Debug, Clone, Error)]
pub enum SearchError {
    #[error("Invalid movie id: {0}")]
    InvalidMovieId(String),

    #[error("Search backend connection failed: {0}")]
    ConnectionFailed(String),

    #[error("Search backend API error: {0}")]
    ApiError(String),

    #[error("Request timeout")]
    Timeout,
}

impl From<reqwest::Error> for SearchError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            SearchError::Timeout
        } else if e.is_connect() {
            SearchError::ConnectionFailed(e.to_string())
        } else {
            SearchError::ApiError(e.to_string())
        }
    }
}

/// Lazy, finite sequence of results from one indexer.
pub type TorrentStream = BoxStream<'static, Result<RawTorrentResult, SearchError>>;

/// One external torrent source.
#[async_trait]
pub trait IndexerAdapter: Send + Sync {
    /// Indexer name, recorded in candidate provenance and logs.
    fn name(&self) -> &str;

    /// Start a lookup. Items are yielded as they become available.
    async fn find(&self, movie: &MovieId) -> Result<TorrentStream, SearchError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_movie_id_parse() {
        assert_eq!(MovieId::parse("tt0133093").unwrap().as_str(), "tt0133093");
        assert_eq!(MovieId::parse(" TT0133093 ").unwrap().as_str(), "tt0133093");
        assert!(MovieId::parse("0133093").is_err());
        assert!(MovieId::parse("tt").is_err());
        assert!(MovieId::parse("tt0133093:1:2").is_err());
        assert!(matches!(
            MovieId::parse("nm123"),
            Err(SearchError::InvalidMovieId(_))
        ));
    }

    #[test]
    fn test_movie_cache_key() {
        let id = MovieId::parse("tt0133093").unwrap();
        assert_eq!(id.cache_key(), "movie:tt0133093");
    }

    #[test]
    fn test_media_type_parse() {
        assert_eq!(MediaType::parse("movie"), MediaType::Movie);
        assert_eq!(MediaType::parse("series"), MediaType::Series);
        assert_eq!(MediaType::parse("tv"), MediaType::Other("tv".to_string()));
        assert_eq!(MediaType::parse("tv").to_string(), "tv");
    }

    #[test]
    fn test_torrent_candidate_serialization() {
        let candidate = TorrentCandidate {
            title: "The Matrix 1999 1080p".to_string(),
            quality: Quality::Fhd1080p,
            info_hash: "a".repeat(40),
            size_bytes: 2_000_000_000,
            sources: vec!["yts".to_string()],
        };

        let json = serde_json::to_string(&candidate).unwrap();
        assert!(json.contains("\"quality\":\"1080p\""));
        let parsed: TorrentCandidate = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, candidate);
    }
}
