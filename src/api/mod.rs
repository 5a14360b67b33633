//! API Module
//!
//! HTTP handlers and routing for peer traffic and the node's REST API.
//!
//! # Endpoints
//! - `GET /_geecache/:group/:key` - Serve a value to another peer
//! - `GET /api/:group/:key` - Look a value up
//! - `GET /stats` - Get group statistics
//! - `GET /health` - Health check endpoint

pub mod handlers;
pub mod routes;

pub use handlers::*;
pub use routes::create_router;
