use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, warn};

use super::types::{Credential, Session};
use crate::cache::CredentialCache;
use crate::debrid::{DebridError, DebridProvider};

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CredentialError {
    /// The provider rejected the token (terminal).
    #[error("Invalid credential")]
    InvalidCredential,

    /// The provider could not be reached in time (retryable).
    #[error("Debrid provider unavailable: {0}")]
    ProviderUnavailable(String),
}

impl From<DebridError> for CredentialError {
    fn from(err: DebridError) -> Self {
        match err {
            DebridError::InvalidCredential => CredentialError::InvalidCredential,
            other => CredentialError::ProviderUnavailable(other.to_string()),
        }
    }
}

/// Validates inbound credentials against the debrid provider.
///
/// Successful validations are cached by credential digest. Rejections are
/// never cached, so a token fixed on the provider side works immediately.
pub struct CredentialGate {
    provider: Arc<dyn DebridProvider>,
    cache: Arc<CredentialCache>,
    timeout: Duration,
}

impl CredentialGate {
    pub fn new(
        provider: Arc<dyn DebridProvider>,
        cache: Arc<CredentialCache>,
        timeout: Duration,
    ) -> Self {
        Self {
            provider,
            cache,
            timeout,
        }
    }

    pub async fn validate(&self, raw: &str) -> Result<Session, CredentialError> {
        let credential = Credential::new(raw);
        if credential.is_empty() {
            return Err(CredentialError::InvalidCredential);
        }

        let digest = credential.digest();
        if let Some(identity) = self.cache.get(&digest).await {
            return Ok(Session::from_identity(credential, identity));
        }

        let account = tokio::time::timeout(self.timeout, self.provider.account_info(&credential))
            .await
            .map_err(|_| {
                warn!(provider = self.provider.name(), "Identity check timed out");
                CredentialError::ProviderUnavailable("identity check timed out".to_string())
            })?
            .map_err(|e| {
                if e != DebridError::InvalidCredential {
                    warn!(provider = self.provider.name(), error = %e, "Identity check failed");
                }
                CredentialError::from(e)
            })?;

        let session = Session {
            credential,
            account: account.username,
            premium: account.premium,
            validated_at: Utc::now(),
        };
        debug!(account = %session.account, premium = session.premium, "Credential validated");
        self.cache.insert(digest, session.identity()).await;

        Ok(session)
    }
}
