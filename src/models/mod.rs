//! Response models for the node's HTTP API
//!
//! This module defines the DTOs (Data Transfer Objects) serialized into
//! JSON response bodies. Peer responses carry raw bytes and have no model.

pub mod responses;

// Re-export commonly used types
pub use responses::{ErrorResponse, GetResponse, HealthResponse, StatsResponse};
