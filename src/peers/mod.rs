//! Peers Module
//!
//! Capabilities a group uses to reach the node that owns a key.
//!
//! # Flow
//! ```text
//! pick_peer(key) -- remote owner --> PeerGetter::get --> ok --> value
//!       |                                  |
//!       | local owner / no ring            | error
//!       v                                  v
//!    loader <------------------------------+
//! ```

pub mod http;

use std::sync::Arc;

use async_trait::async_trait;

use crate::cache::ByteView;
use crate::error::Result;

pub use http::{HttpGetter, HttpPool, DEFAULT_BASE_PATH};

// == Fetch Request ==
/// Identifies a value on a remote node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchRequest {
    /// Name of the group (namespace) the key belongs to
    pub group: String,
    /// Key within the group
    pub key: String,
}

impl FetchRequest {
    pub fn new(group: impl Into<String>, key: impl Into<String>) -> Self {
        Self {
            group: group.into(),
            key: key.into(),
        }
    }
}

// == Fetch Response ==
/// Body of a peer response, protobuf-encoded on the wire.
#[derive(Clone, PartialEq, prost::Message)]
pub struct FetchResponse {
    /// The value bytes, as cached by the owning node
    #[prost(bytes = "vec", tag = "1")]
    pub value: Vec<u8>,
}

impl From<ByteView> for FetchResponse {
    fn from(value: ByteView) -> Self {
        Self {
            value: value.to_vec(),
        }
    }
}

// == Peer Picker ==
/// Chooses the peer that owns a key.
pub trait PeerPicker: Send + Sync {
    /// Returns the owning peer, or `None` when this node owns the key itself
    /// or no peers are known.
    fn pick_peer(&self, key: &str) -> Option<Arc<dyn PeerGetter>>;
}

// == Peer Getter ==
/// Fetches a value from one remote peer.
#[async_trait]
pub trait PeerGetter: Send + Sync {
    async fn get(&self, request: &FetchRequest) -> Result<Vec<u8>>;
}
