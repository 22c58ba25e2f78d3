use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;

/// Opaque debrid API token supplied by the end user.
///
/// `Debug` and `Display` never print the token.
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Credential(String);

impl Credential {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    /// The raw token, for outbound provider calls only.
    pub fn expose(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.trim().is_empty()
    }

    /// SHA-256 hex digest, used as the credential cache key.
    pub fn digest(&self) -> String {
        format!("{:x}", Sha256::digest(self.0.as_bytes()))
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Credential(***)")
    }
}

impl fmt::Display for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("***")
    }
}

/// What the credential cache stores for a validated token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CachedIdentity {
    pub account: String,
    pub premium: bool,
    pub validated_at: DateTime<Utc>,
}

/// A validated provider session. Immutable once built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub credential: Credential,
    pub account: String,
    pub premium: bool,
    pub validated_at: DateTime<Utc>,
}

impl Session {
    pub fn from_identity(credential: Credential, identity: CachedIdentity) -> Self {
        Self {
            credential,
            account: identity.account,
            premium: identity.premium,
            validated_at: identity.validated_at,
        }
    }

    pub fn identity(&self) -> CachedIdentity {
        CachedIdentity {
            account: self.account.clone(),
            premium: self.premium,
            validated_at: self.validated_at,
        }
    }
}
