//! Testing utilities and mock implementations.
//!
//! Mocks for the two outbound seams, `IndexerAdapter` and `DebridProvider`,
//! so the whole pipeline can be exercised without network access.
//!
//! # Example
//!
//! ```rust,ignore
//! use streamgate_core::testing::{fixtures, MockDebridProvider, MockIndexer};
//!
//! let indexer = MockIndexer::new("yts")
//!     .with_results(vec![fixtures::raw("The Matrix 1080p", "yts", 'a', 2_000_000_000)]);
//! let provider = MockDebridProvider::new()
//!     .with_account("token", "neo", true)
//!     .with_available(&[&"a".repeat(40)]);
//! ```

mod mock_debrid;
mod mock_indexer;

pub use mock_debrid::MockDebridProvider;
pub use mock_indexer::MockIndexer;

/// Test fixtures and helper functions.
pub mod fixtures {
    use chrono::Utc;

    use crate::credential::{Credential, Session};
    use crate::searcher::RawTorrentResult;

    /// Raw indexer result whose info-hash is `hash_char` repeated 40 times.
    pub fn raw(title: &str, indexer: &str, hash_char: char, size_bytes: u64) -> RawTorrentResult {
        RawTorrentResult {
            title: title.to_string(),
            indexer: indexer.to_string(),
            info_hash: Some(hash_char.to_string().repeat(40)),
            quality: None,
            size_bytes,
        }
    }

    /// A premium session for account "neo".
    pub fn session() -> Session {
        session_for("neo")
    }

    /// A premium session for the given account, with a per-account token.
    pub fn session_for(account: &str) -> Session {
        Session {
            credential: Credential::new(format!("token-{}", account)),
            account: account.to_string(),
            premium: true,
            validated_at: Utc::now(),
        }
    }
}
