//! HTTP Peer Pool
//!
//! Ring-backed peer selection and the reqwest client used to reach other nodes.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::RwLock;
use prost::Message;
use reqwest::Url;
use tracing::debug;

use crate::error::{CacheError, Result};
use crate::peers::{FetchRequest, FetchResponse, PeerGetter, PeerPicker};
use crate::ring::{HashRing, DEFAULT_REPLICAS};

/// Path prefix under which nodes answer peer requests.
pub const DEFAULT_BASE_PATH: &str = "/_geecache/";

#[derive(Default)]
struct PeerSet {
    ring: HashRing,
    getters: HashMap<String, Arc<HttpGetter>>,
}

// == HTTP Pool ==
/// The set of nodes in the mesh, as seen from this node.
///
/// `self_addr` must be spelled exactly as this node appears in the peer list
/// (e.g. `http://10.0.0.2:8001`); keys the ring assigns to it are handled
/// locally.
pub struct HttpPool {
    self_addr: String,
    base_path: String,
    replicas: usize,
    client: reqwest::Client,
    peers: RwLock<PeerSet>,
}

impl HttpPool {
    // == Constructor ==
    pub fn new(self_addr: impl Into<String>) -> Self {
        Self {
            self_addr: self_addr.into(),
            base_path: DEFAULT_BASE_PATH.to_string(),
            replicas: DEFAULT_REPLICAS,
            client: reqwest::Client::new(),
            peers: RwLock::new(PeerSet::default()),
        }
    }

    /// Overrides the number of virtual nodes per peer. Takes effect on the next `set`.
    pub fn with_replicas(mut self, replicas: usize) -> Self {
        self.replicas = replicas;
        self
    }

    pub fn self_addr(&self) -> &str {
        &self.self_addr
    }

    pub fn base_path(&self) -> &str {
        &self.base_path
    }

    // == Set ==
    /// Replaces the peer list, rebuilding the ring and one client per peer.
    pub fn set<I, S>(&self, peers: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let peers: Vec<String> = peers.into_iter().map(Into::into).collect();

        let mut ring = HashRing::new(self.replicas, None);
        ring.add(&peers);

        let getters = peers
            .iter()
            .map(|peer| {
                let getter = HttpGetter::new(
                    self.client.clone(),
                    format!("{}{}", peer, self.base_path),
                );
                (peer.clone(), Arc::new(getter))
            })
            .collect();

        debug!(
            "Peer set of {} updated: {:?} ({} virtual nodes each)",
            self.self_addr,
            peers,
            ring.replicas()
        );
        *self.peers.write() = PeerSet { ring, getters };
    }

    /// Returns the known peer addresses, sorted.
    pub fn peers(&self) -> Vec<String> {
        let mut peers: Vec<String> = self.peers.read().getters.keys().cloned().collect();
        peers.sort();
        peers
    }
}

impl PeerPicker for HttpPool {
    fn pick_peer(&self, key: &str) -> Option<Arc<dyn PeerGetter>> {
        let peers = self.peers.read();
        let peer = peers.ring.get(key).filter(|peer| *peer != self.self_addr)?;
        debug!("Picked peer {} for key {}", peer, key);
        let getter: Arc<dyn PeerGetter> = peers.getters.get(peer)?.clone();
        Some(getter)
    }
}

// == HTTP Getter ==
/// Fetches values from one peer over HTTP.
///
/// Requests go to `{base_url}{group}/{key}` with both segments percent-encoded;
/// the response body is an encoded [`FetchResponse`].
#[derive(Debug, Clone)]
pub struct HttpGetter {
    client: reqwest::Client,
    base_url: String,
}

impl HttpGetter {
    pub fn new(client: reqwest::Client, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into(),
        }
    }

    fn url_for(&self, request: &FetchRequest) -> Result<Url> {
        let mut url = Url::parse(&self.base_url)
            .map_err(|e| CacheError::Peer(format!("invalid peer url {}: {}", self.base_url, e)))?;
        url.path_segments_mut()
            .map_err(|_| CacheError::Peer(format!("invalid peer url {}", self.base_url)))?
            .pop_if_empty()
            .push(&request.group)
            .push(&request.key);
        Ok(url)
    }
}

#[async_trait]
impl PeerGetter for HttpGetter {
    async fn get(&self, request: &FetchRequest) -> Result<Vec<u8>> {
        let url = self.url_for(request)?;
        debug!("HttpGetter requesting {}", url);

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| CacheError::Peer(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(CacheError::Peer(format!("server returned: {}", status)));
        }

        let body = response
            .bytes()
            .await
            .map_err(|e| CacheError::Peer(format!("reading response body: {}", e)))?;
        let message = FetchResponse::decode(body)
            .map_err(|e| CacheError::Peer(format!("decoding response body: {}", e)))?;
        Ok(message.value)
    }
}
