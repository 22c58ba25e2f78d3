use chrono::Utc;
use futures::future::{BoxFuture, FutureExt, Shared};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::cache::RedirectCache;
use crate::credential::Session;
use crate::debrid::{DebridClient, DebridError, FileSelector, UnlockedStream};
use crate::metrics::{TICKETS_ISSUED, TICKET_RESOLUTIONS};

use super::{RedirectEntry, RedirectError, RedirectTicket};

type UnlockFlight = Shared<BoxFuture<'static, Result<UnlockedStream, DebridError>>>;
type FlightMap = Arc<Mutex<HashMap<String, UnlockFlight>>>;

fn ticket_key(id: &str) -> String {
    format!("ticket:{}", id)
}

/// Unlocked streams are scoped per account.
fn stream_key(account: &str, info_hash: &str, selector: FileSelector) -> String {
    format!("stream:{}:{}:{}", account, info_hash, selector)
}

/// Issues redirect tickets and resolves them to direct stream URLs.
///
/// Concurrent resolutions of the same (account, info-hash, file) share one
/// provider unlock, and the unlocked URL is reused until it expires. A
/// ticket that has expired never resolves, even if its stream is still
/// cached.
pub struct RedirectResolver {
    debrid: Arc<DebridClient>,
    cache: Arc<RedirectCache>,
    public_url: String,
    ticket_ttl: Duration,
    in_flight: FlightMap,
}

impl RedirectResolver {
    pub fn new(
        debrid: Arc<DebridClient>,
        cache: Arc<RedirectCache>,
        public_url: &str,
        ticket_ttl: Duration,
    ) -> Self {
        Self {
            debrid,
            cache,
            public_url: public_url.trim_end_matches('/').to_string(),
            ticket_ttl,
            in_flight: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Store a new ticket and return its redirect URL. No provider call.
    pub async fn issue_ticket(
        &self,
        session: &Session,
        info_hash: &str,
        selector: FileSelector,
    ) -> String {
        let ticket = RedirectTicket {
            id: Uuid::new_v4().to_string(),
            info_hash: info_hash.to_string(),
            selector,
            credential: session.credential.clone(),
            created_at: Utc::now(),
        };
        let url = format!("{}/redirect/{}", self.public_url, ticket.id);

        self.cache
            .insert_with_ttl(
                ticket_key(&ticket.id),
                RedirectEntry::Ticket(ticket),
                self.ticket_ttl,
            )
            .await;
        TICKETS_ISSUED.inc();

        url
    }

    /// Look up a live ticket.
    pub async fn ticket(&self, id: &str) -> Result<RedirectTicket, RedirectError> {
        match self.cache.get(&ticket_key(id)).await {
            Some(RedirectEntry::Ticket(ticket)) => Ok(ticket),
            _ => Err(RedirectError::TicketExpired),
        }
    }

    /// Resolve a ticket to a direct stream URL.
    pub async fn resolve(&self, session: &Session, id: &str) -> Result<String, RedirectError> {
        let ticket = match self.ticket(id).await {
            Ok(ticket) => ticket,
            Err(e) => {
                TICKET_RESOLUTIONS.with_label_values(&["expired"]).inc();
                return Err(e);
            }
        };

        let key = stream_key(&session.account, &ticket.info_hash, ticket.selector);
        if let Some(stream) = cached_stream(&self.cache, &key).await {
            debug!(ticket = %id, "Serving cached unlocked stream");
            TICKET_RESOLUTIONS.with_label_values(&["cached"]).inc();
            return Ok(stream.url);
        }

        let flight = self.join_or_start(key, session, &ticket).await;
        match flight.await {
            Ok(stream) => {
                TICKET_RESOLUTIONS.with_label_values(&["unlocked"]).inc();
                Ok(stream.url)
            }
            Err(e) => {
                let label = match e {
                    DebridError::NotCached => "not_cached",
                    DebridError::QuotaExceeded => "quota_exceeded",
                    _ => "error",
                };
                TICKET_RESOLUTIONS.with_label_values(&[label]).inc();
                warn!(ticket = %id, info_hash = %ticket.info_hash, error = %e, "Couldn't resolve ticket");
                Err(e.into())
            }
        }
    }

    /// Join the unlock in flight for `key`, or start one.
    async fn join_or_start(
        &self,
        key: String,
        session: &Session,
        ticket: &RedirectTicket,
    ) -> UnlockFlight {
        let mut in_flight = self.in_flight.lock().await;
        if let Some(flight) = in_flight.get(&key) {
            debug!(key = %key, "Joining unlock in flight");
            return flight.clone();
        }

        let debrid = Arc::clone(&self.debrid);
        let cache = Arc::clone(&self.cache);
        let flights = Arc::clone(&self.in_flight);
        let session = session.clone();
        let info_hash = ticket.info_hash.clone();
        let selector = ticket.selector;
        let flight_key = key.clone();

        // Runs to completion even if every waiter is dropped. The map lock
        // held here keeps the removal below ordered after the insert.
        let task = tokio::spawn(async move {
            // A flight that just finished may have stored the stream.
            let result = match cached_stream(&cache, &flight_key).await {
                Some(stream) => Ok(stream),
                None => {
                    let result = debrid.unlock(&session, &info_hash, selector).await;
                    if let Ok(stream) = &result {
                        store_stream(&cache, &flight_key, stream).await;
                    }
                    result
                }
            };
            flights.lock().await.remove(&flight_key);
            result
        });

        let flight = async move {
            task.await.unwrap_or_else(|e| {
                Err(DebridError::Unavailable(format!("unlock task failed: {}", e)))
            })
        }
        .boxed()
        .shared();

        in_flight.insert(key, flight.clone());
        flight
    }
}

async fn cached_stream(cache: &RedirectCache, key: &str) -> Option<UnlockedStream> {
    match cache.get(key).await {
        Some(RedirectEntry::Stream(stream)) if stream.is_valid() => Some(stream),
        _ => None,
    }
}

/// Cache a stream for as long as its URL stays valid.
async fn store_stream(cache: &RedirectCache, key: &str, stream: &UnlockedStream) {
    let Ok(ttl) = (stream.expires_at - Utc::now()).to_std() else {
        return;
    };
    if ttl.is_zero() {
        return;
    }
    cache
        .insert_with_ttl(key, RedirectEntry::Stream(stream.clone()), ttl)
        .await;
    info!(key = %key, ttl_secs = ttl.as_secs(), "Cached unlocked stream");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::CacheStore;
    use crate::testing::{fixtures, MockDebridProvider};

    struct Fixture {
        provider: Arc<MockDebridProvider>,
        cache: Arc<RedirectCache>,
        resolver: Arc<RedirectResolver>,
    }

    fn fixture(provider: MockDebridProvider, ticket_ttl: Duration) -> Fixture {
        let provider = Arc::new(provider);
        let availability = Arc::new(CacheStore::new(
            "availability",
            1024 * 1024,
            Duration::from_secs(60),
        ));
        let debrid = Arc::new(DebridClient::new(provider.clone(), availability, 50));
        let cache = Arc::new(CacheStore::new("redirect", 1024 * 1024, ticket_ttl));
        let resolver = Arc::new(RedirectResolver::new(
            debrid,
            Arc::clone(&cache),
            "http://localhost:8080/",
            ticket_ttl,
        ));
        Fixture {
            provider,
            cache,
            resolver,
        }
    }

    fn hash(c: char) -> String {
        c.to_string().repeat(40)
    }

    fn ticket_id(url: &str) -> &str {
        url.rsplit('/').next().unwrap()
    }

    #[tokio::test]
    async fn test_issue_ticket_builds_redirect_url() {
        let f = fixture(MockDebridProvider::new(), Duration::from_secs(60));
        let session = fixtures::session();

        let url = f
            .resolver
            .issue_ticket(&session, &hash('a'), FileSelector::Largest)
            .await;

        assert!(url.starts_with("http://localhost:8080/redirect/"));
        assert!(!url.contains(session.credential.expose()));
        let ticket = f.resolver.ticket(ticket_id(&url)).await.unwrap();
        assert_eq!(ticket.info_hash, hash('a'));
        assert_eq!(ticket.credential, session.credential);
        assert_eq!(f.provider.unlock_calls(), 0);
    }

    #[tokio::test]
    async fn test_tickets_are_unique() {
        let f = fixture(MockDebridProvider::new(), Duration::from_secs(60));
        let session = fixtures::session();
        let a = f.resolver.issue_ticket(&session, &hash('a'), FileSelector::Largest).await;
        let b = f.resolver.issue_ticket(&session, &hash('a'), FileSelector::Largest).await;
        assert_ne!(a, b);
    }

    #[tokio::test]
    async fn test_unknown_ticket_is_expired() {
        let f = fixture(MockDebridProvider::new(), Duration::from_secs(60));
        assert_eq!(
            f.resolver.resolve(&fixtures::session(), "nope").await,
            Err(RedirectError::TicketExpired)
        );
    }

    #[tokio::test]
    async fn test_resolve_unlocks_once_and_reuses_stream() {
        let f = fixture(MockDebridProvider::new(), Duration::from_secs(60));
        let session = fixtures::session();
        let url = f.resolver.issue_ticket(&session, &hash('a'), FileSelector::Largest).await;

        let first = f.resolver.resolve(&session, ticket_id(&url)).await.unwrap();
        let second = f.resolver.resolve(&session, ticket_id(&url)).await.unwrap();

        assert_eq!(first, second);
        assert!(first.contains(&hash('a')));
        assert_eq!(f.provider.unlock_calls(), 1);
    }

    #[tokio::test]
    async fn test_concurrent_resolves_share_one_unlock() {
        let f = fixture(
            MockDebridProvider::new().with_delay(Duration::from_millis(100)),
            Duration::from_secs(60),
        );
        let session = fixtures::session();
        let url = f.resolver.issue_ticket(&session, &hash('a'), FileSelector::Largest).await;
        let id = ticket_id(&url).to_string();

        let tasks: Vec<_> = (0..10)
            .map(|_| {
                let resolver = Arc::clone(&f.resolver);
                let session = session.clone();
                let id = id.clone();
                tokio::spawn(async move { resolver.resolve(&session, &id).await })
            })
            .collect();

        let results = futures::future::join_all(tasks).await;
        let urls: Vec<String> = results.into_iter().map(|r| r.unwrap().unwrap()).collect();

        assert!(urls.windows(2).all(|w| w[0] == w[1]));
        assert_eq!(f.provider.unlock_calls(), 1);
        assert!(f.resolver.in_flight.lock().await.is_empty());
    }

    #[tokio::test]
    async fn test_unlock_completes_when_only_waiter_is_dropped() {
        let f = fixture(
            MockDebridProvider::new().with_delay(Duration::from_millis(100)),
            Duration::from_secs(60),
        );
        let session = fixtures::session();
        let url = f.resolver.issue_ticket(&session, &hash('a'), FileSelector::Largest).await;
        let id = ticket_id(&url).to_string();

        let waiter = {
            let resolver = Arc::clone(&f.resolver);
            let session = session.clone();
            tokio::spawn(async move { resolver.resolve(&session, &id).await })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;
        waiter.abort();
        tokio::time::sleep(Duration::from_millis(500)).await;

        assert!(f.resolver.in_flight.lock().await.is_empty());
        assert_eq!(f.provider.unlock_calls(), 1);
        let key = stream_key(&session.account, &hash('a'), FileSelector::Largest);
        assert!(cached_stream(&f.cache, &key).await.is_some());

        // The next click reuses the stream the abandoned flight stored.
        f.resolver.resolve(&session, ticket_id(&url)).await.unwrap();
        assert_eq!(f.provider.unlock_calls(), 1);
    }

    #[tokio::test]
    async fn test_expired_ticket_wins_over_cached_stream() {
        let f = fixture(MockDebridProvider::new(), Duration::from_millis(100));
        let session = fixtures::session();
        let url = f.resolver.issue_ticket(&session, &hash('a'), FileSelector::Largest).await;

        f.resolver.resolve(&session, ticket_id(&url)).await.unwrap();
        tokio::time::sleep(Duration::from_millis(150)).await;

        // The stream itself is valid for an hour.
        let key = stream_key(&session.account, &hash('a'), FileSelector::Largest);
        assert!(f.cache.get(&key).await.is_some());

        assert_eq!(
            f.resolver.resolve(&session, ticket_id(&url)).await,
            Err(RedirectError::TicketExpired)
        );
    }

    #[tokio::test]
    async fn test_streams_are_scoped_per_account() {
        let f = fixture(MockDebridProvider::new(), Duration::from_secs(60));
        let alice = fixtures::session_for("alice");
        let bob = fixtures::session_for("bob");

        let a = f.resolver.issue_ticket(&alice, &hash('a'), FileSelector::Largest).await;
        let b = f.resolver.issue_ticket(&bob, &hash('a'), FileSelector::Largest).await;
        f.resolver.resolve(&alice, ticket_id(&a)).await.unwrap();
        f.resolver.resolve(&bob, ticket_id(&b)).await.unwrap();

        assert_eq!(f.provider.unlock_calls(), 2);
    }

    #[tokio::test]
    async fn test_not_cached_is_not_memoized() {
        let f = fixture(
            MockDebridProvider::new().with_unlock_error(&hash('a'), DebridError::NotCached),
            Duration::from_secs(60),
        );
        let session = fixtures::session();
        let url = f.resolver.issue_ticket(&session, &hash('a'), FileSelector::Largest).await;

        for _ in 0..2 {
            assert_eq!(
                f.resolver.resolve(&session, ticket_id(&url)).await,
                Err(RedirectError::NotCached)
            );
        }
        assert_eq!(f.provider.unlock_calls(), 2);
    }

    #[tokio::test]
    async fn test_quota_exceeded_surfaces() {
        let f = fixture(
            MockDebridProvider::new().with_unlock_error(&hash('a'), DebridError::QuotaExceeded),
            Duration::from_secs(60),
        );
        let session = fixtures::session();
        let url = f.resolver.issue_ticket(&session, &hash('a'), FileSelector::Largest).await;

        assert_eq!(
            f.resolver.resolve(&session, ticket_id(&url)).await,
            Err(RedirectError::QuotaExceeded)
        );
    }
}
