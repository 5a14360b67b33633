//! Error types for the cache node
//!
//! Provides unified error handling using thiserror.

use std::sync::Arc;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use thiserror::Error;

use crate::models::ErrorResponse;

// == Cache Error Enum ==
/// Unified error type for the cache node.
///
/// The type is `Clone` so one outcome of a deduplicated load can be handed to
/// every caller that waited on it.
#[derive(Error, Debug, Clone)]
pub enum CacheError {
    /// Lookup was attempted with an empty key
    #[error("key is required")]
    EmptyKey,

    /// No group is registered under the requested name
    #[error("no such group: {0}")]
    GroupNotFound(String),

    /// The group's loader failed; the source error is carried unchanged
    #[error("{0}")]
    Load(Arc<anyhow::Error>),

    /// A remote peer could not serve the request
    #[error("peer fetch failed: {0}")]
    Peer(String),

    /// `Group::register_peers` was called on a group that already has peers.
    /// Signals a wiring defect; callers avoid it rather than handle it.
    #[error("peers already registered for group {0}")]
    PeersAlreadyRegistered(String),
}

impl CacheError {
    /// Wraps a loader failure.
    pub fn load(err: anyhow::Error) -> Self {
        CacheError::Load(Arc::new(err))
    }
}

// == IntoResponse Implementation ==
impl IntoResponse for CacheError {
    fn into_response(self) -> Response {
        let status = match &self {
            CacheError::EmptyKey => StatusCode::BAD_REQUEST,
            CacheError::GroupNotFound(_) => StatusCode::NOT_FOUND,
            CacheError::Peer(_) => StatusCode::BAD_GATEWAY,
            CacheError::Load(_) | CacheError::PeersAlreadyRegistered(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };

        let body = Json(ErrorResponse::new(self.to_string()));

        (status, body).into_response()
    }
}

// == Result Type Alias ==
/// Convenience Result type for the cache node.
pub type Result<T> = std::result::Result<T, CacheError>;
