//! Cache Module
//!
//! Provides the byte-budgeted LRU cache and the per-group store built on it.

mod byteview;
mod lru;
mod stats;
mod store;


// Re-export public types
pub use byteview::ByteView;
pub use lru::{ByteSize, EvictionCallback, LruCache};
pub use stats::CacheStats;
pub use store::CacheStore;
