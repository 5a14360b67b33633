//! Byte View Module
//!
//! Immutable view over a cached value.

use std::fmt;
use std::sync::Arc;

use crate::cache::ByteSize;

// == Byte View ==
/// An immutable, cheaply clonable cached value.
///
/// The underlying buffer is never handed out: every byte accessor returns a
/// fresh copy, so nothing outside the cache can mutate cached state.
#[derive(Clone, PartialEq, Eq)]
pub struct ByteView {
    data: Arc<[u8]>,
}

impl ByteView {
    /// Returns the length of the value in bytes.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Returns a copy of the value's bytes.
    pub fn to_vec(&self) -> Vec<u8> {
        self.data.to_vec()
    }
}

impl Default for ByteView {
    fn default() -> Self {
        Self::from(Vec::new())
    }
}

impl From<Vec<u8>> for ByteView {
    fn from(data: Vec<u8>) -> Self {
        Self { data: data.into() }
    }
}

impl From<&[u8]> for ByteView {
    fn from(data: &[u8]) -> Self {
        Self { data: data.into() }
    }
}

impl From<&str> for ByteView {
    fn from(data: &str) -> Self {
        Self::from(data.as_bytes())
    }
}

impl ByteSize for ByteView {
    fn byte_len(&self) -> usize {
        self.len()
    }
}

/// Renders the value as UTF-8, replacing invalid sequences.
impl fmt::Display for ByteView {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&String::from_utf8_lossy(&self.data))
    }
}

impl fmt::Debug for ByteView {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ByteView").field("len", &self.len()).finish()
    }
}
