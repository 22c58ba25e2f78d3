//! Mapping of pipeline errors onto HTTP responses.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use streamgate_core::{CredentialError, RedirectError, SearchError};

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

#[derive(Debug)]
pub enum ApiError {
    InvalidCredential,
    ProviderUnavailable(String),
    TicketExpired,
    NotCached,
    QuotaExceeded,
    BadRequest(String),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::InvalidCredential => StatusCode::UNAUTHORIZED,
            ApiError::ProviderUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            ApiError::TicketExpired => StatusCode::NOT_FOUND,
            ApiError::NotCached => StatusCode::CONFLICT,
            ApiError::QuotaExceeded => StatusCode::TOO_MANY_REQUESTS,
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
        }
    }

    fn message(&self) -> String {
        match self {
            ApiError::InvalidCredential => "Invalid debrid credential".to_string(),
            // Provider detail stays in the logs.
            ApiError::ProviderUnavailable(_) => {
                "Debrid provider is unavailable, please try again later".to_string()
            }
            ApiError::TicketExpired => RedirectError::TicketExpired.to_string(),
            ApiError::NotCached => RedirectError::NotCached.to_string(),
            ApiError::QuotaExceeded => RedirectError::QuotaExceeded.to_string(),
            ApiError::BadRequest(msg) => msg.clone(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        if let ApiError::ProviderUnavailable(detail) = &self {
            tracing::warn!(error = %detail, "Responding with provider unavailable");
        }
        (
            self.status(),
            Json(ErrorResponse {
                error: self.message(),
            }),
        )
            .into_response()
    }
}

impl From<CredentialError> for ApiError {
    fn from(err: CredentialError) -> Self {
        match err {
            CredentialError::InvalidCredential => ApiError::InvalidCredential,
            CredentialError::ProviderUnavailable(msg) => ApiError::ProviderUnavailable(msg),
        }
    }
}

impl From<RedirectError> for ApiError {
    fn from(err: RedirectError) -> Self {
        match err {
            RedirectError::TicketExpired => ApiError::TicketExpired,
            RedirectError::NotCached => ApiError::NotCached,
            RedirectError::QuotaExceeded => ApiError::QuotaExceeded,
            RedirectError::InvalidCredential => ApiError::InvalidCredential,
            RedirectError::ProviderUnavailable(msg) => ApiError::ProviderUnavailable(msg),
        }
    }
}

impl From<SearchError> for ApiError {
    fn from(err: SearchError) -> Self {
        ApiError::BadRequest(err.to_string())
    }
}
