//! Real-Debrid REST API v1.0 client.

use async_trait::async_trait;
use chrono::Utc;
use reqwest::{Client, Method, RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::collections::HashMap;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

use crate::config::DebridConfig;
use crate::credential::Credential;
use crate::metrics::observe_external_call;

use super::rate_limiter::RateLimiter;
use super::{AccountInfo, DebridError, DebridProvider, FileSelector, UnlockedStream};

const SERVICE: &str = "realdebrid";

/// How long an unrestricted download link is treated as valid.
const LINK_VALIDITY: Duration = Duration::from_secs(3600);

// Real-Debrid error codes that mean the account is out of quota.
const QUOTA_ERROR_CODES: &[i64] = &[21, 23, 26, 29, 36];
const BAD_TOKEN_ERROR_CODE: i64 = 8;

pub struct RealDebridProvider {
    client: Client,
    base_url: String,
    limiter: RateLimiter,
    /// Longest wait for a rate-limit token before giving up.
    max_queue_wait: Duration,
}

impl RealDebridProvider {
    pub fn new(config: &DebridConfig) -> Result<Self, DebridError> {
        Self::with_base_url(&config.url, config.timeout(), config.rate_limit_rpm)
    }

    pub fn with_base_url(
        base_url: &str,
        timeout: Duration,
        rate_limit_rpm: u32,
    ) -> Result<Self, DebridError> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            limiter: RateLimiter::new(SERVICE, rate_limit_rpm),
            max_queue_wait: timeout,
        })
    }

    fn request(&self, method: Method, path: &str, credential: &Credential) -> RequestBuilder {
        self.client
            .request(method, format!("{}{}", self.base_url, path))
            .bearer_auth(credential.expose())
    }

    /// Send a request under the rate limit and decode a JSON body.
    async fn call<T: DeserializeOwned>(
        &self,
        operation: &'static str,
        request: RequestBuilder,
    ) -> Result<T, DebridError> {
        let body = self.send(operation, request).await?;
        serde_json::from_str(&body).map_err(|e| {
            DebridError::Unavailable(format!("Failed to parse {} response: {}", operation, e))
        })
    }

    /// Send a request under the rate limit and return the raw body.
    async fn send(&self, operation: &'static str, request: RequestBuilder) -> Result<String, DebridError> {
        if !self.limiter.acquire_within(self.max_queue_wait).await {
            warn!(
                operation,
                wait_ms = self.max_queue_wait.as_millis() as u64,
                "Gave up waiting for a rate limit token"
            );
            return Err(DebridError::Unavailable(format!(
                "Rate limit queue wait exceeded for {}",
                operation
            )));
        }

        let start = Instant::now();
        let result = async {
            let response = request.send().await?;
            let status = response.status();
            let body = response.text().await?;
            if status.is_success() {
                Ok(body)
            } else {
                Err(map_error_response(status, &body))
            }
        }
        .await;

        observe_external_call(
            SERVICE,
            operation,
            start.elapsed().as_secs_f64(),
            result.is_ok(),
        );
        result
    }

    async fn delete_torrent(&self, credential: &Credential, id: &str) {
        let request = self.request(
            Method::DELETE,
            &format!("/torrents/delete/{}", id),
            credential,
        );
        if let Err(e) = self.send("delete", request).await {
            warn!(torrent_id = %id, error = %e, "Couldn't delete torrent from debrid account");
        }
    }

    async fn torrent_info(&self, credential: &Credential, id: &str) -> Result<TorrentInfo, DebridError> {
        let request = self.request(Method::GET, &format!("/torrents/info/{}", id), credential);
        self.call("info", request).await
    }

    /// Steps after addMagnet. The caller deletes the torrent if this fails.
    async fn select_and_unrestrict(
        &self,
        credential: &Credential,
        id: &str,
        selector: FileSelector,
    ) -> Result<UnlockedStream, DebridError> {
        let file_id = match selector {
            FileSelector::Index(i) => i,
            FileSelector::Largest => {
                let info = self.torrent_info(credential, id).await?;
                info.files
                    .iter()
                    .max_by_key(|f| f.bytes)
                    .map(|f| f.id)
                    .ok_or(DebridError::NotCached)?
            }
        };

        let request = self
            .request(Method::POST, &format!("/torrents/selectFiles/{}", id), credential)
            .form(&[("files", file_id.to_string())]);
        self.send("select_files", request).await?;

        // A cached torrent is "downloaded" right away; anything else would
        // need a real-time download, which is never waited on.
        let info = self.torrent_info(credential, id).await?;
        let link = match (info.status.as_str(), info.links.first()) {
            ("downloaded", Some(link)) => link.clone(),
            (status, _) => {
                debug!(torrent_id = %id, status, "Torrent not instantly available");
                return Err(DebridError::NotCached);
            }
        };

        let request = self
            .request(Method::POST, "/unrestrict/link", credential)
            .form(&[("link", link)]);
        let unrestricted: UnrestrictResponse = self.call("unrestrict", request).await?;

        Ok(UnlockedStream {
            url: unrestricted.download,
            expires_at: Utc::now()
                + chrono::Duration::from_std(LINK_VALIDITY).unwrap_or(chrono::Duration::hours(1)),
        })
    }
}

#[async_trait]
impl DebridProvider for RealDebridProvider {
    fn name(&self) -> &str {
        SERVICE
    }

    async fn account_info(&self, credential: &Credential) -> Result<AccountInfo, DebridError> {
        let request = self.request(Method::GET, "/user", credential);
        let user: UserResponse = self.call("user", request).await?;
        Ok(AccountInfo {
            premium: user.kind == "premium",
            username: user.username,
        })
    }

    async fn instant_availability(
        &self,
        credential: &Credential,
        hashes: &[String],
    ) -> Result<HashMap<String, bool>, DebridError> {
        if hashes.is_empty() {
            return Ok(HashMap::new());
        }

        let path = format!("/torrents/instantAvailability/{}", hashes.join("/"));
        let request = self.request(Method::GET, &path, credential);
        let body: serde_json::Value = self.call("instant_availability", request).await?;

        Ok(parse_availability(&body))
    }

    async fn unlock(
        &self,
        credential: &Credential,
        info_hash: &str,
        selector: FileSelector,
    ) -> Result<UnlockedStream, DebridError> {
        let magnet = format!("magnet:?xt=urn:btih:{}", info_hash);
        let request = self
            .request(Method::POST, "/torrents/addMagnet", credential)
            .form(&[("magnet", magnet)]);
        let added: AddMagnetResponse = self.call("add_magnet", request).await?;

        let result = self.select_and_unrestrict(credential, &added.id, selector).await;
        if result.is_err() {
            self.delete_torrent(credential, &added.id).await;
        }
        result
    }
}

/// Map a non-success response to a `DebridError`.
fn map_error_response(status: StatusCode, body: &str) -> DebridError {
    let error: Option<ErrorResponse> = serde_json::from_str(body).ok();
    let code = error.as_ref().and_then(|e| e.error_code);

    if status == StatusCode::UNAUTHORIZED || code == Some(BAD_TOKEN_ERROR_CODE) {
        return DebridError::InvalidCredential;
    }
    if code.map(|c| QUOTA_ERROR_CODES.contains(&c)).unwrap_or(false) {
        return DebridError::QuotaExceeded;
    }

    let message = error
        .and_then(|e| e.error)
        .unwrap_or_else(|| body.chars().take(200).collect());
    DebridError::Unavailable(format!("HTTP {}: {}", status, message))
}

/// `{hash: {"rd": [variants...]}}`. An empty object, empty array or empty
/// `rd` list means not instantly available.
fn parse_availability(body: &serde_json::Value) -> HashMap<String, bool> {
    let Some(map) = body.as_object() else {
        return HashMap::new();
    };
    map.iter()
        .map(|(hash, entry)| {
            let instant = entry
                .get("rd")
                .and_then(|rd| rd.as_array())
                .map(|variants| !variants.is_empty())
                .unwrap_or(false);
            (hash.to_lowercase(), instant)
        })
        .collect()
}

// Real-Debrid API response types
#[derive(Debug, Deserialize)]
struct UserResponse {
    username: String,
    #[serde(rename = "type")]
    kind: String,
}

#[derive(Debug, Deserialize)]
struct AddMagnetResponse {
    id: String,
}

#[derive(Debug, Deserialize)]
struct TorrentInfo {
    status: String,
    #[serde(default)]
    files: Vec<TorrentFile>,
    #[serde(default)]
    links: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct TorrentFile {
    id: u32,
    bytes: u64,
}

#[derive(Debug, Deserialize)]
struct UnrestrictResponse {
    download: String,
}

#[derive(Debug, Deserialize)]
struct ErrorResponse {
    error: Option<String>,
    error_code: Option<i64>,
}
