//! API Handlers
//!
//! HTTP request handlers for peer traffic and the user-facing endpoints.

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::header,
    response::{IntoResponse, Response},
    Json,
};
use prost::Message;
use tracing::info;

use crate::error::{CacheError, Result};
use crate::group::Group;
use crate::models::{GetResponse, HealthResponse, StatsResponse};
use crate::peers::{FetchResponse, HttpPool};
use crate::registry::GroupRegistry;

/// Application state shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    /// Groups served by this node
    pub registry: Arc<GroupRegistry>,
    /// This node's view of the peer mesh
    pub pool: Arc<HttpPool>,
}

impl AppState {
    /// Creates a new AppState.
    pub fn new(registry: Arc<GroupRegistry>, pool: Arc<HttpPool>) -> Self {
        Self { registry, pool }
    }

    fn group(&self, name: &str) -> Result<Arc<Group>> {
        self.registry
            .get_group(name)
            .ok_or_else(|| CacheError::GroupNotFound(name.to_string()))
    }
}

/// Handler for GET /_geecache/:group/:key
///
/// Serves another node's fetch: the body is an encoded [`FetchResponse`].
pub async fn peer_handler(
    State(state): State<AppState>,
    Path((group, key)): Path<(String, String)>,
) -> Result<Response> {
    info!("Peer request on {}: {}/{}", state.pool.self_addr(), group, key);

    let value = state.group(&group)?.get(&key).await?;

    Ok((
        [(header::CONTENT_TYPE, "application/octet-stream")],
        FetchResponse::from(value).encode_to_vec(),
    )
        .into_response())
}

/// Handler for GET /api/:group/:key
///
/// Looks a key up for an end user, going through the peer mesh as needed.
pub async fn api_handler(
    State(state): State<AppState>,
    Path((group, key)): Path<(String, String)>,
) -> Result<Json<GetResponse>> {
    let value = state.group(&group)?.get(&key).await?;

    Ok(Json(GetResponse::new(group, key, value.to_string())))
}

/// Handler for GET /stats
///
/// Returns counters of every registered group.
pub async fn stats_handler(State(state): State<AppState>) -> Json<StatsResponse> {
    let mut groups = Vec::new();
    for group in state.registry.groups() {
        groups.push(group.stats().await);
    }

    Json(StatsResponse {
        self_addr: state.pool.self_addr().to_string(),
        peers: state.pool.peers(),
        groups,
    })
}

/// Handler for GET /health
///
/// Returns health status of the node.
pub async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse::healthy())
}
