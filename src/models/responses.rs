//! Response DTOs for the node's HTTP API
//!
//! Defines the structure of outgoing JSON response bodies.

use serde::Serialize;

use crate::group::GroupStats;

/// Response body for a user lookup (GET /api/:group/:key)
#[derive(Debug, Clone, Serialize)]
pub struct GetResponse {
    /// Group the key was looked up in
    pub group: String,
    /// The requested key
    pub key: String,
    /// The value, rendered as UTF-8
    pub value: String,
}

impl GetResponse {
    /// Creates a new GetResponse
    pub fn new(
        group: impl Into<String>,
        key: impl Into<String>,
        value: impl Into<String>,
    ) -> Self {
        Self {
            group: group.into(),
            key: key.into(),
            value: value.into(),
        }
    }
}

/// Response body for the stats endpoint (GET /stats)
#[derive(Debug, Clone, Serialize)]
pub struct StatsResponse {
    /// This node's peer address
    pub self_addr: String,
    /// Known peers, this node included
    pub peers: Vec<String>,
    /// Per-group counters
    pub groups: Vec<GroupStats>,
}

/// Response body for the health endpoint (GET /health)
#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    /// Health status (e.g., "healthy")
    pub status: String,
    /// Current timestamp in ISO 8601 format
    pub timestamp: String,
}

impl HealthResponse {
    /// Creates a new HealthResponse with current timestamp
    pub fn healthy() -> Self {
        Self {
            status: "healthy".to_string(),
            timestamp: chrono::Utc::now().to_rfc3339(),
        }
    }
}

/// Error response body for all error conditions
#[derive(Debug, Clone, Serialize)]
pub struct ErrorResponse {
    /// Error message describing what went wrong
    pub error: String,
}

impl ErrorResponse {
    /// Creates a new ErrorResponse
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
        }
    }
}
