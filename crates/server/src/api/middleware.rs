//! Credential and metrics middleware for API routes.

use axum::{
    body::Body,
    extract::{FromRequestParts, Path},
    http::{request::Parts, Request},
    middleware::Next,
    response::Response,
};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;
use streamgate_core::{CredentialError, Session};
use tracing::Span;

use super::error::ApiError;
use crate::metrics::{
    normalize_path, redact_path, AUTH_FAILURES_TOTAL, HTTP_REQUESTS_IN_FLIGHT,
    HTTP_REQUESTS_TOTAL, HTTP_REQUEST_DURATION,
};
use crate::state::AppState;

/// Metrics middleware that tracks HTTP request duration and counts.
pub async fn metrics_middleware(request: Request<Body>, next: Next) -> Response {
    let start = Instant::now();
    let method = request.method().to_string();
    let path = normalize_path(request.uri().path());

    HTTP_REQUESTS_IN_FLIGHT.inc();

    let response = next.run(request).await;

    HTTP_REQUESTS_IN_FLIGHT.dec();

    let duration = start.elapsed().as_secs_f64();
    let status = response.status().as_u16().to_string();

    HTTP_REQUEST_DURATION
        .with_label_values(&[&method, &path, &status])
        .observe(duration);
    HTTP_REQUESTS_TOTAL
        .with_label_values(&[&method, &path, &status])
        .inc();

    response
}

/// Request span for `TraceLayer`. The credential path segment is redacted.
pub fn make_request_span(request: &Request<Body>) -> Span {
    tracing::info_span!(
        "request",
        method = %request.method(),
        path = %redact_path(request.uri().path()),
    )
}

/// Extractor for the session behind the `{credential}` path segment.
///
/// Validation goes through the credential gate, so a cached identity skips
/// the provider round trip.
#[derive(Debug, Clone)]
pub struct CredentialSession(pub Session);

impl FromRequestParts<Arc<AppState>> for CredentialSession {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let Path(params) = Path::<HashMap<String, String>>::from_request_parts(parts, state)
            .await
            .map_err(|_| ApiError::InvalidCredential)?;
        let raw = params.get("credential").map(String::as_str).unwrap_or("");

        match state.gate().validate(raw).await {
            Ok(session) => Ok(CredentialSession(session)),
            Err(err) => {
                let reason = match err {
                    CredentialError::InvalidCredential => "invalid_credential",
                    CredentialError::ProviderUnavailable(_) => "provider_unavailable",
                };
                AUTH_FAILURES_TOTAL.with_label_values(&[reason]).inc();
                Err(err.into())
            }
        }
    }
}
