//! Redirect endpoint: turns a ticket into the provider's direct URL.

use axum::{
    extract::{Path, State},
    response::Redirect,
};
use std::sync::Arc;
use tracing::info;

use super::error::ApiError;
use crate::state::AppState;

/// GET /redirect/{ticket_id}
///
/// The ticket carries the credential it was issued for, which is
/// re-validated (usually from cache) before unlocking.
pub async fn follow(
    State(state): State<Arc<AppState>>,
    Path(ticket_id): Path<String>,
) -> Result<Redirect, ApiError> {
    let ticket = state.resolver().ticket(&ticket_id).await?;
    let session = state.gate().validate(ticket.credential.expose()).await?;
    let url = state.resolver().resolve(&session, &ticket_id).await?;

    info!(ticket = %ticket_id, account = %session.account, "Redirecting to stream");
    Ok(Redirect::temporary(&url))
}
