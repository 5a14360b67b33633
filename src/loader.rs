//! Loader Module
//!
//! The capability a group calls to compute values it owns, plus the seed-data
//! loader used by the node binary.

use std::collections::HashMap;
use std::path::Path;

use anyhow::{bail, Context};
use async_trait::async_trait;
use tracing::info;

// == Loader ==
/// Computes the value for a key on a cache miss.
///
/// Called at most once per key at a time per group; the call may perform
/// arbitrary I/O.
#[async_trait]
pub trait Loader: Send + Sync {
    async fn load(&self, key: &str) -> anyhow::Result<Vec<u8>>;
}

/// Adapts a synchronous closure into a [`Loader`].
pub struct LoaderFn<F>(pub F);

#[async_trait]
impl<F> Loader for LoaderFn<F>
where
    F: Fn(&str) -> anyhow::Result<Vec<u8>> + Send + Sync,
{
    async fn load(&self, key: &str) -> anyhow::Result<Vec<u8>> {
        (self.0)(key)
    }
}

// == Seed Loader ==
/// Serves values from a fixed key-value table, standing in for a slow database.
#[derive(Debug, Clone, Default)]
pub struct SeedLoader {
    data: HashMap<String, String>,
}

impl SeedLoader {
    pub fn new(data: HashMap<String, String>) -> Self {
        Self { data }
    }

    /// A small score table.
    pub fn sample() -> Self {
        let data = [("Tom", "630"), ("Jack", "589"), ("Sam", "567")]
            .into_iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Self::new(data)
    }

    /// Reads a JSON object of string keys to string values.
    pub fn from_file(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("reading seed file {}", path.display()))?;
        let data = serde_json::from_str(&raw)
            .with_context(|| format!("parsing seed file {}", path.display()))?;
        Ok(Self::new(data))
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

#[async_trait]
impl Loader for SeedLoader {
    async fn load(&self, key: &str) -> anyhow::Result<Vec<u8>> {
        info!("Seed lookup for key {}", key);
        match self.data.get(key) {
            Some(value) => Ok(value.clone().into_bytes()),
            None => bail!("{} not exist", key),
        }
    }
}
