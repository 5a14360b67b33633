//! Configuration Module
//!
//! Handles loading and managing node configuration from environment variables.

use std::env;

use crate::ring::DEFAULT_REPLICAS;

/// Node configuration parameters.
///
/// All values can be configured via environment variables with sensible defaults.
#[derive(Debug, Clone)]
pub struct Config {
    /// HTTP server port
    pub server_port: u16,
    /// Address under which other peers reach this node
    pub self_addr: String,
    /// Every node of the mesh, this one included
    pub peers: Vec<String>,
    /// Byte budget of the group's local cache (0 = unlimited)
    pub cache_bytes: usize,
    /// Virtual nodes per peer on the hash ring
    pub replicas: usize,
    /// Name of the group served by this node
    pub group_name: String,
    /// Optional JSON file with the seed data served by the loader
    pub seed_file: Option<String>,
}

impl Config {
    /// Creates a new Config by loading values from environment variables.
    ///
    /// # Environment Variables
    /// - `SERVER_PORT` - HTTP server port (default: 8001)
    /// - `SELF_ADDR` - This node's peer address (default: `http://localhost:{SERVER_PORT}`)
    /// - `PEERS` - Comma-separated peer addresses (default: `SELF_ADDR` only)
    /// - `CACHE_BYTES` - Local cache budget in bytes (default: 2048)
    /// - `REPLICAS` - Virtual nodes per peer (default: 50)
    /// - `GROUP_NAME` - Group served by this node (default: scores)
    /// - `SEED_FILE` - JSON seed data for the loader (default: built-in sample)
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let server_port = parse_var("SERVER_PORT").unwrap_or(defaults.server_port);
        let self_addr = env::var("SELF_ADDR")
            .ok()
            .map(|v| v.trim().trim_end_matches('/').to_string())
            .filter(|v| !v.is_empty())
            .unwrap_or_else(|| format!("http://localhost:{}", server_port));
        let peers = env::var("PEERS")
            .ok()
            .map(|v| parse_peers(&v))
            .filter(|peers| !peers.is_empty())
            .unwrap_or_else(|| vec![self_addr.clone()]);

        Self {
            server_port,
            self_addr,
            peers,
            cache_bytes: parse_var("CACHE_BYTES").unwrap_or(defaults.cache_bytes),
            replicas: parse_var("REPLICAS").unwrap_or(defaults.replicas),
            group_name: env::var("GROUP_NAME").unwrap_or(defaults.group_name),
            seed_file: env::var("SEED_FILE").ok().filter(|v| !v.is_empty()),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        let self_addr = "http://localhost:8001".to_string();
        Self {
            server_port: 8001,
            peers: vec![self_addr.clone()],
            self_addr,
            cache_bytes: 2 << 10,
            replicas: DEFAULT_REPLICAS,
            group_name: "scores".to_string(),
            seed_file: None,
        }
    }
}

fn parse_var<T: std::str::FromStr>(name: &str) -> Option<T> {
    env::var(name).ok().and_then(|v| v.parse().ok())
}

/// Splits a comma-separated peer list, dropping blanks and trailing slashes.
fn parse_peers(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|peer| peer.trim().trim_end_matches('/'))
        .filter(|peer| !peer.is_empty())
        .map(str::to_string)
        .collect()
}
