pub mod cache;
pub mod config;
pub mod credential;
pub mod debrid;
pub mod metrics;
pub mod redirect;
pub mod searcher;
pub mod stream;
pub mod testing;

pub use cache::{CacheError, CachePersistence, CacheSet, CacheStats, CacheStore, PersistentCache};
pub use config::{
    load_config, load_config_from_str, validate_config, Config, ConfigError, SanitizedConfig,
};
pub use credential::{Credential, CredentialError, CredentialGate, Session};
pub use debrid::{
    DebridClient, DebridError, DebridProvider, FileSelector, RealDebridProvider, UnlockedStream,
};
pub use redirect::{RedirectError, RedirectResolver, RedirectTicket};
pub use searcher::{
    create_indexers, IndexerAdapter, MediaType, MovieId, SearchAggregator, SearchError,
    SearchOutcome, TorrentCandidate,
};
pub use stream::{StreamListing, StreamOption, StreamService};
