//! peercache - A distributed read-through cache node
//!
//! Each node keeps byte-budgeted LRU caches per group, asks the peer that owns a
//! key (by consistent hashing) on a miss, and computes values it owns itself
//! through a loader. Concurrent misses of one key share a single load.

pub mod api;
pub mod cache;
pub mod config;
pub mod error;
pub mod flight;
pub mod group;
pub mod loader;
pub mod models;
pub mod peers;
pub mod registry;
pub mod ring;

pub use api::AppState;
pub use cache::ByteView;
pub use config::Config;
pub use error::{CacheError, Result};
pub use group::Group;
pub use loader::{Loader, LoaderFn};
pub use peers::{HttpPool, PeerGetter, PeerPicker};
pub use registry::GroupRegistry;
