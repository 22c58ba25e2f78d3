//! Mock debrid provider for testing.

use async_trait::async_trait;
use chrono::Utc;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::credential::Credential;
use crate::debrid::{AccountInfo, DebridError, DebridProvider, FileSelector, UnlockedStream};

/// Mock implementation of `DebridProvider`.
///
/// Tokens not registered with [`MockDebridProvider::with_account`] are
/// rejected by `account_info`. Availability and unlock do not check the
/// credential. Unlock succeeds for every hash unless an error was set.
#[derive(Debug, Clone, Default)]
pub struct MockDebridProvider {
    accounts: HashMap<String, AccountInfo>,
    available: HashSet<String>,
    unlock_errors: HashMap<String, DebridError>,
    failing: bool,
    delay: Duration,
    account_calls: Arc<AtomicUsize>,
    unlock_calls: Arc<AtomicUsize>,
    availability_calls: Arc<Mutex<Vec<Vec<String>>>>,
}

impl MockDebridProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_account(mut self, token: &str, username: &str, premium: bool) -> Self {
        self.accounts.insert(
            token.to_string(),
            AccountInfo {
                username: username.to_string(),
                premium,
            },
        );
        self
    }

    /// Mark hashes as instantly available.
    pub fn with_available(mut self, hashes: &[&str]) -> Self {
        self.available
            .extend(hashes.iter().map(|h| h.to_ascii_lowercase()));
        self
    }

    pub fn with_unlock_error(mut self, hash: &str, error: DebridError) -> Self {
        self.unlock_errors.insert(hash.to_ascii_lowercase(), error);
        self
    }

    /// Every call fails as if the provider were unreachable.
    pub fn with_failure(mut self) -> Self {
        self.failing = true;
        self
    }

    /// Delay applied to every call.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn account_calls(&self) -> usize {
        self.account_calls.load(Ordering::SeqCst)
    }

    pub fn unlock_calls(&self) -> usize {
        self.unlock_calls.load(Ordering::SeqCst)
    }

    /// Hash batches received by `instant_availability`, in call order.
    pub fn availability_calls(&self) -> Vec<Vec<String>> {
        self.availability_calls
            .lock()
            .map(|calls| calls.clone())
            .unwrap_or_default()
    }

    async fn simulate(&self) -> Result<(), DebridError> {
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        if self.failing {
            return Err(DebridError::Unavailable("mock provider is down".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl DebridProvider for MockDebridProvider {
    fn name(&self) -> &str {
        "mock-debrid"
    }

    async fn account_info(&self, credential: &Credential) -> Result<AccountInfo, DebridError> {
        self.account_calls.fetch_add(1, Ordering::SeqCst);
        self.simulate().await?;
        self.accounts
            .get(credential.expose())
            .cloned()
            .ok_or(DebridError::InvalidCredential)
    }

    async fn instant_availability(
        &self,
        _credential: &Credential,
        hashes: &[String],
    ) -> Result<HashMap<String, bool>, DebridError> {
        if let Ok(mut calls) = self.availability_calls.lock() {
            calls.push(hashes.to_vec());
        }
        self.simulate().await?;
        Ok(hashes
            .iter()
            .map(|h| (h.clone(), self.available.contains(h)))
            .collect())
    }

    async fn unlock(
        &self,
        _credential: &Credential,
        info_hash: &str,
        selector: FileSelector,
    ) -> Result<UnlockedStream, DebridError> {
        let call = self.unlock_calls.fetch_add(1, Ordering::SeqCst) + 1;
        self.simulate().await?;
        if let Some(error) = self.unlock_errors.get(info_hash) {
            return Err(error.clone());
        }
        Ok(UnlockedStream {
            url: format!(
                "https://download.mock-debrid.test/d/{}/{}?n={}",
                info_hash, selector, call
            ),
            expires_at: Utc::now() + chrono::Duration::hours(1),
        })
    }
}
