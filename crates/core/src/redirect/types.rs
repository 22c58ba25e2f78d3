use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::credential::{Credential, CredentialError};
use crate::debrid::{DebridError, FileSelector, UnlockedStream};

/// Opaque stand-in for a not-yet-resolved stream URL.
///
/// Carries the credential because the redirect URL handed to the client
/// does not contain it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RedirectTicket {
    pub id: String,
    pub info_hash: String,
    pub selector: FileSelector,
    pub credential: Credential,
    pub created_at: DateTime<Utc>,
}

/// Value type of the redirect cache.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RedirectEntry {
    Ticket(RedirectTicket),
    Stream(UnlockedStream),
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RedirectError {
    #[error("Redirect ticket expired or unknown")]
    TicketExpired,

    #[error("This torrent is not cached by the debrid provider. Please pick another stream.")]
    NotCached,

    #[error("Debrid account limits exceeded. Please try again later.")]
    QuotaExceeded,

    #[error("Invalid credential")]
    InvalidCredential,

    #[error("Debrid provider unavailable: {0}")]
    ProviderUnavailable(String),
}

impl From<DebridError> for RedirectError {
    fn from(err: DebridError) -> Self {
        match err {
            DebridError::NotCached => RedirectError::NotCached,
            DebridError::QuotaExceeded => RedirectError::QuotaExceeded,
            DebridError::InvalidCredential => RedirectError::InvalidCredential,
            DebridError::Unavailable(msg) => RedirectError::ProviderUnavailable(msg),
        }
    }
}

impl From<CredentialError> for RedirectError {
    fn from(err: CredentialError) -> Self {
        match err {
            CredentialError::InvalidCredential => RedirectError::InvalidCredential,
            CredentialError::ProviderUnavailable(msg) => RedirectError::ProviderUnavailable(msg),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_redirect_entry_is_tagged() {
        let entry = RedirectEntry::Stream(UnlockedStream {
            url: "https://cdn.example/a.mkv".to_string(),
            expires_at: Utc::now(),
        });
        let json = serde_json::to_value(&entry).unwrap();
        assert_eq!(json["kind"], "stream");

        let parsed: RedirectEntry = serde_json::from_value(json).unwrap();
        assert_eq!(parsed, entry);
    }

    #[test]
    fn test_debrid_error_mapping() {
        assert_eq!(
            RedirectError::from(DebridError::NotCached),
            RedirectError::NotCached
        );
        assert_eq!(
            RedirectError::from(DebridError::QuotaExceeded),
            RedirectError::QuotaExceeded
        );
        assert!(matches!(
            RedirectError::from(DebridError::Unavailable("x".into())),
            RedirectError::ProviderUnavailable(_)
        ));
    }
}
