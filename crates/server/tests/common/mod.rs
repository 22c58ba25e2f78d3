//! Common test utilities for router-level tests with mocks.
//!
//! The fixture builds the real router around a `MockDebridProvider` and
//! `MockIndexer`s, so requests exercise the full pipeline in-process
//! without network access.

#![allow(dead_code)]

use std::sync::Arc;

use axum::body::Body;
use axum::http::{header, HeaderMap, Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use serde_json::Value;
use tower::ServiceExt;

use streamgate_core::{
    testing::{MockDebridProvider, MockIndexer},
    CacheSet, Config, IndexerAdapter,
};
use streamgate_server::state::AppState;

/// Re-export fixtures for test convenience
pub use streamgate_core::testing::fixtures;

/// Token accepted by the fixture's default provider.
pub const TOKEN: &str = "good-token";

/// Test fixture for in-process router tests.
///
/// ```rust,ignore
/// let fixture = TestFixture::builder()
///     .indexer(MockIndexer::new("yts").with_results(vec![...]))
///     .provider(MockDebridProvider::new().with_account(TOKEN, "neo", true))
///     .build();
///
/// let response = fixture.get(&format!("/{}/manifest.json", TOKEN)).await;
/// assert_status!(response, StatusCode::OK);
/// ```
pub struct TestFixture {
    pub router: Router,
    pub state: Arc<AppState>,
}

/// Response from a test request
#[derive(Debug)]
pub struct TestResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Value,
    pub text: String,
}

impl TestResponse {
    pub fn location(&self) -> Option<&str> {
        self.headers
            .get(header::LOCATION)
            .and_then(|v| v.to_str().ok())
    }
}

#[derive(Default)]
pub struct TestFixtureBuilder {
    indexers: Vec<MockIndexer>,
    provider: Option<MockDebridProvider>,
    config: Config,
}

impl TestFixtureBuilder {
    pub fn indexer(mut self, indexer: MockIndexer) -> Self {
        self.indexers.push(indexer);
        self
    }

    pub fn provider(mut self, provider: MockDebridProvider) -> Self {
        self.provider = Some(provider);
        self
    }

    pub fn build(self) -> TestFixture {
        let mut config = self.config;
        config.server.public_url = "http://streamgate.test".to_string();
        config.search.indexer_timeout_secs = 1;
        config.search.timeout_secs = 2;

        let provider = self
            .provider
            .unwrap_or_else(|| MockDebridProvider::new().with_account(TOKEN, "neo", true));
        let adapters: Vec<Arc<dyn IndexerAdapter>> = self
            .indexers
            .into_iter()
            .map(|i| Arc::new(i) as Arc<dyn IndexerAdapter>)
            .collect();

        let caches = CacheSet::in_memory(&config.cache);
        let state = Arc::new(AppState::new(config, caches, Arc::new(provider), adapters));
        let router = streamgate_server::api::create_router(Arc::clone(&state));

        TestFixture { router, state }
    }
}

impl TestFixture {
    pub fn builder() -> TestFixtureBuilder {
        TestFixtureBuilder::default()
    }

    /// Send a GET request to the test router, as a browser-based client would.
    pub async fn get(&self, path: &str) -> TestResponse {
        let request = Request::builder()
            .method("GET")
            .uri(path)
            .header(header::ORIGIN, "https://web.stremio.com")
            .body(Body::empty())
            .unwrap();

        let response = self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("Failed to send request");

        let status = response.status();
        let headers = response.headers().clone();
        let body_bytes = response
            .into_body()
            .collect()
            .await
            .expect("Failed to collect body")
            .to_bytes();

        let text = String::from_utf8_lossy(&body_bytes).into_owned();
        let body: Value = if body_bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&body_bytes).unwrap_or(Value::Null)
        };

        TestResponse {
            status,
            headers,
            body,
            text,
        }
    }

    /// Router path of a redirect URL handed to the client.
    pub fn redirect_path(url: &str) -> String {
        url.strip_prefix("http://streamgate.test")
            .expect("ticket url uses the public url")
            .to_string()
    }
}

/// Helper to assert a response has expected status.
#[macro_export]
macro_rules! assert_status {
    ($response:expr, $status:expr) => {
        assert_eq!(
            $response.status, $status,
            "Expected status {:?}, got {:?}. Body: {}",
            $status, $response.status, $response.text
        );
    };
}
