use serde::{Deserialize, Serialize};
use std::net::IpAddr;
use std::path::PathBuf;
use std::time::Duration;

/// Root configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub search: SearchConfig,
    #[serde(default)]
    pub debrid: DebridConfig,
}

/// Server configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: IpAddr,
    #[serde(default = "default_port")]
    pub port: u16,
    /// Public base URL used when building redirect links handed to clients.
    #[serde(default = "default_public_url")]
    pub public_url: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            public_url: default_public_url(),
        }
    }
}

fn default_host() -> IpAddr {
    IpAddr::from([0, 0, 0, 0])
}

fn default_port() -> u16 {
    8080
}

fn default_public_url() -> String {
    "http://localhost:8080".to_string()
}

/// In-memory cache configuration.
///
/// `max_bytes` is split evenly across the credential, availability,
/// torrent and redirect caches.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CacheConfig {
    /// Directory for cache snapshots (default: user cache dir + "/streamgate").
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,
    #[serde(default = "default_cache_max_bytes")]
    pub max_bytes: u64,
    #[serde(default = "default_persist_interval")]
    pub persist_interval_secs: u64,
    #[serde(default = "default_stats_interval")]
    pub stats_interval_secs: u64,
    #[serde(default = "default_credential_ttl")]
    pub credential_ttl_secs: u64,
    #[serde(default = "default_availability_ttl")]
    pub availability_ttl_secs: u64,
    #[serde(default = "default_torrent_ttl")]
    pub torrent_ttl_secs: u64,
    /// TTL for search results missing at least one indexer.
    #[serde(default = "default_partial_search_ttl")]
    pub partial_search_ttl_secs: u64,
    #[serde(default = "default_redirect_ttl")]
    pub redirect_ttl_secs: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            path: None,
            max_bytes: default_cache_max_bytes(),
            persist_interval_secs: default_persist_interval(),
            stats_interval_secs: default_stats_interval(),
            credential_ttl_secs: default_credential_ttl(),
            availability_ttl_secs: default_availability_ttl(),
            torrent_ttl_secs: default_torrent_ttl(),
            partial_search_ttl_secs: default_partial_search_ttl(),
            redirect_ttl_secs: default_redirect_ttl(),
        }
    }
}

impl CacheConfig {
    /// Directory holding the snapshot files.
    pub fn resolved_path(&self) -> PathBuf {
        match &self.path {
            Some(path) => path.clone(),
            None => dirs::cache_dir()
                .unwrap_or_else(std::env::temp_dir)
                .join("streamgate"),
        }
    }

    /// Directory the four snapshot files are written to.
    pub fn snapshot_dir(&self) -> PathBuf {
        self.resolved_path().join("cache")
    }

    /// Byte ceiling of a single cache store.
    pub fn per_store_max_bytes(&self) -> usize {
        (self.max_bytes / 4) as usize
    }

    pub fn credential_ttl(&self) -> Duration {
        Duration::from_secs(self.credential_ttl_secs)
    }

    pub fn availability_ttl(&self) -> Duration {
        Duration::from_secs(self.availability_ttl_secs)
    }

    pub fn torrent_ttl(&self) -> Duration {
        Duration::from_secs(self.torrent_ttl_secs)
    }

    pub fn partial_search_ttl(&self) -> Duration {
        Duration::from_secs(self.partial_search_ttl_secs)
    }

    pub fn redirect_ttl(&self) -> Duration {
        Duration::from_secs(self.redirect_ttl_secs)
    }
}

fn default_cache_max_bytes() -> u64 {
    128 * 1024 * 1024
}

fn default_persist_interval() -> u64 {
    3600
}

fn default_stats_interval() -> u64 {
    3600
}

fn default_credential_ttl() -> u64 {
    24 * 3600
}

fn default_availability_ttl() -> u64 {
    3600
}

fn default_torrent_ttl() -> u64 {
    6 * 3600
}

fn default_partial_search_ttl() -> u64 {
    10 * 60
}

fn default_redirect_ttl() -> u64 {
    3 * 3600
}

/// Torrent search configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SearchConfig {
    /// Overall deadline for one aggregated search.
    #[serde(default = "default_search_timeout")]
    pub timeout_secs: u64,
    /// Deadline for a single indexer.
    #[serde(default = "default_indexer_timeout")]
    pub indexer_timeout_secs: u64,
    #[serde(default)]
    pub yts: YtsConfig,
    /// Jackett backend (disabled when absent).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub jackett: Option<JackettConfig>,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_search_timeout(),
            indexer_timeout_secs: default_indexer_timeout(),
            yts: YtsConfig::default(),
            jackett: None,
        }
    }
}

impl SearchConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn indexer_timeout(&self) -> Duration {
        Duration::from_secs(self.indexer_timeout_secs)
    }
}

fn default_search_timeout() -> u64 {
    10
}

fn default_indexer_timeout() -> u64 {
    5
}

/// YTS indexer configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct YtsConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_yts_url")]
    pub url: String,
}

impl Default for YtsConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            url: default_yts_url(),
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_yts_url() -> String {
    "https://yts.mx".to_string()
}

/// Jackett search backend configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct JackettConfig {
    /// Jackett server URL (e.g., "http://localhost:9117")
    pub url: String,
    /// Jackett API key
    pub api_key: String,
    /// Jackett indexer ids to query, each as its own source (default: "all").
    #[serde(default = "default_jackett_indexers")]
    pub indexers: Vec<String>,
}

fn default_jackett_indexers() -> Vec<String> {
    vec!["all".to_string()]
}

/// Debrid provider configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DebridConfig {
    /// Base URL of the Real-Debrid REST API.
    #[serde(default = "default_debrid_url")]
    pub url: String,
    /// Per-request timeout in seconds.
    #[serde(default = "default_debrid_timeout")]
    pub timeout_secs: u64,
    /// Max info-hashes sent in one availability request.
    #[serde(default = "default_batch_size")]
    pub availability_batch_size: usize,
    /// Provider request-rate ceiling (requests per minute).
    #[serde(default = "default_rate_limit")]
    pub rate_limit_rpm: u32,
}

impl Default for DebridConfig {
    fn default() -> Self {
        Self {
            url: default_debrid_url(),
            timeout_secs: default_debrid_timeout(),
            availability_batch_size: default_batch_size(),
            rate_limit_rpm: default_rate_limit(),
        }
    }
}

impl DebridConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

fn default_debrid_url() -> String {
    "https://api.real-debrid.com/rest/1.0".to_string()
}

fn default_debrid_timeout() -> u64 {
    5
}

fn default_batch_size() -> usize {
    50
}

fn default_rate_limit() -> u32 {
    200
}

/// Sanitized config for API responses and logs (secrets redacted)
#[derive(Debug, Clone, Serialize)]
pub struct SanitizedConfig {
    pub server: ServerConfig,
    pub cache: CacheConfig,
    pub search: SanitizedSearchConfig,
    pub debrid: DebridConfig,
}

#[derive(Debug, Clone, Serialize)]
pub struct SanitizedSearchConfig {
    pub timeout_secs: u64,
    pub indexer_timeout_secs: u64,
    pub yts: YtsConfig,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub jackett: Option<SanitizedJackettConfig>,
}

/// Sanitized Jackett config (API key hidden)
#[derive(Debug, Clone, Serialize)]
pub struct SanitizedJackettConfig {
    pub url: String,
    pub api_key_configured: bool,
    pub indexers: Vec<String>,
}

impl From<&Config> for SanitizedConfig {
    fn from(config: &Config) -> Self {
        Self {
            server: config.server.clone(),
            cache: config.cache.clone(),
            search: SanitizedSearchConfig {
                timeout_secs: config.search.timeout_secs,
                indexer_timeout_secs: config.search.indexer_timeout_secs,
                yts: config.search.yts.clone(),
                jackett: config.search.jackett.as_ref().map(|j| SanitizedJackettConfig {
                    url: j.url.clone(),
                    api_key_configured: !j.api_key.is_empty(),
                    indexers: j.indexers.clone(),
                }),
            },
            debrid: config.debrid.clone(),
        }
    }
}
