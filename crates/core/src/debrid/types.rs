//! Types for the debrid provider integration.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use thiserror::Error;

use crate::credential::Credential;

/// Cached instant-availability of one info-hash.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AvailabilityRecord {
    pub instant: bool,
    pub checked_at: DateTime<Utc>,
}

/// A direct, provider-unlocked stream URL.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnlockedStream {
    pub url: String,
    pub expires_at: DateTime<Utc>,
}

impl UnlockedStream {
    pub fn is_valid(&self) -> bool {
        self.expires_at > Utc::now()
    }
}

/// Which file of a torrent to stream.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FileSelector {
    /// The biggest file, which for a movie torrent is the movie itself.
    #[default]
    Largest,
    /// Provider file id.
    Index(u32),
}

impl fmt::Display for FileSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FileSelector::Largest => f.write_str("largest"),
            FileSelector::Index(i) => write!(f, "{}", i),
        }
    }
}

/// Account behind a credential.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccountInfo {
    pub username: String,
    pub premium: bool,
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum DebridError {
    #[error("Invalid credential")]
    InvalidCredential,

    /// The torrent is not in the provider's cache; unlocking would need a
    /// real-time download.
    #[error("Torrent is not cached by the debrid provider")]
    NotCached,

    #[error("Debrid account limits exceeded")]
    QuotaExceeded,

    #[error("Debrid provider unavailable: {0}")]
    Unavailable(String),
}

impl From<reqwest::Error> for DebridError {
    fn from(e: reqwest::Error) -> Self {
        DebridError::Unavailable(e.to_string())
    }
}

/// External debrid HTTP API.
#[async_trait]
pub trait DebridProvider: Send + Sync {
    /// Provider name for logging/metrics.
    fn name(&self) -> &str;

    /// Identity check for a credential.
    async fn account_info(&self, credential: &Credential) -> Result<AccountInfo, DebridError>;

    /// Instant availability of a batch of normalized info-hashes.
    ///
    /// Hashes missing from the returned map are not instantly available.
    async fn instant_availability(
        &self,
        credential: &Credential,
        hashes: &[String],
    ) -> Result<HashMap<String, bool>, DebridError>;

    /// Turn a cached torrent into a direct stream URL.
    async fn unlock(
        &self,
        credential: &Credential,
        info_hash: &str,
        selector: FileSelector,
    ) -> Result<UnlockedStream, DebridError>;
}
