//! Catalog-client (Stremio addon protocol) endpoints.

use axum::{
    extract::{Path, State},
    Json,
};
use serde::Serialize;
use std::sync::Arc;
use streamgate_core::{MediaType, MovieId, StreamOption};
use tracing::debug;

use super::error::ApiError;
use super::middleware::CredentialSession;
use crate::state::AppState;

const ADDON_ID: &str = "tv.streamgate.addon";
const ADDON_NAME: &str = "streamgate";
const ADDON_DESCRIPTION: &str =
    "Turns torrents into debrid-cached streams: high speed and no seeding.";

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Manifest {
    pub id: &'static str,
    pub name: &'static str,
    pub description: &'static str,
    pub version: &'static str,
    pub resources: Vec<&'static str>,
    pub types: Vec<&'static str>,
    pub id_prefixes: Vec<&'static str>,
    /// Always empty, but the client requires the key.
    pub catalogs: Vec<serde_json::Value>,
}

impl Manifest {
    fn current() -> Self {
        Self {
            id: ADDON_ID,
            name: ADDON_NAME,
            description: ADDON_DESCRIPTION,
            version: env!("CARGO_PKG_VERSION"),
            resources: vec!["stream"],
            types: vec!["movie"],
            id_prefixes: vec!["tt"],
            catalogs: Vec::new(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct StreamsResponse {
    pub streams: Vec<StreamOption>,
}

/// GET /{credential}/manifest.json
pub async fn manifest(CredentialSession(_session): CredentialSession) -> Json<Manifest> {
    Json(Manifest::current())
}

/// GET /{credential}/stream/{media_type}/{id}.json
pub async fn streams(
    State(state): State<Arc<AppState>>,
    Path((_credential, media_type, id)): Path<(String, String, String)>,
    CredentialSession(session): CredentialSession,
) -> Result<Json<StreamsResponse>, ApiError> {
    let media_type = MediaType::parse(&media_type);
    let id = id.strip_suffix(".json").unwrap_or(&id);

    if media_type != MediaType::Movie {
        debug!(media_type = %media_type, "Unsupported media type");
        return Ok(Json(StreamsResponse {
            streams: Vec::new(),
        }));
    }

    let movie = MovieId::parse(id)?;
    let listing = state
        .streams()
        .list_streams(&session, &media_type, &movie)
        .await;

    Ok(Json(StreamsResponse {
        streams: listing.streams,
    }))
}
