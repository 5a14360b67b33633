//! Consistent Hash Ring
//!
//! Maps keys to the real node that owns them, using virtual nodes to even out
//! the distribution.

use std::collections::HashMap;
use std::fmt;

/// Hash function used to place virtual nodes and keys on the ring.
pub type HashFn = fn(&[u8]) -> u32;

/// Virtual nodes generated per real node unless configured otherwise.
pub const DEFAULT_REPLICAS: usize = 50;

// == Hash Ring ==
/// A consistent-hash ring over string node labels.
///
/// Each real node is placed on the ring `replicas` times, at the hashes of
/// `"{i}{node}"` for `i` in `0..replicas`. A key belongs to the first virtual
/// node at or after its own hash, wrapping around past the largest one.
#[derive(Clone)]
pub struct HashRing {
    hash: HashFn,
    replicas: usize,
    /// Sorted virtual node hashes
    keys: Vec<u32>,
    /// Virtual node hash -> real node label
    nodes: HashMap<u32, String>,
}

impl HashRing {
    // == Constructor ==
    /// Creates an empty ring. `hash` defaults to the CRC-32 (IEEE) checksum.
    pub fn new(replicas: usize, hash: Option<HashFn>) -> Self {
        Self {
            hash: hash.unwrap_or(crc32fast::hash),
            replicas,
            keys: Vec::new(),
            nodes: HashMap::new(),
        }
    }

    // == Add ==
    /// Places every node on the ring.
    ///
    /// Two virtual nodes hashing to the same value are not disambiguated: the
    /// node added last owns that position.
    pub fn add<I, S>(&mut self, nodes: I)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        for node in nodes {
            let node = node.as_ref();
            for i in 0..self.replicas {
                let hash = (self.hash)(format!("{}{}", i, node).as_bytes());
                if self.nodes.insert(hash, node.to_string()).is_none() {
                    self.keys.push(hash);
                }
            }
        }
        self.keys.sort_unstable();
    }

    // == Get ==
    /// Returns the node owning `key`, or `None` if the ring is empty.
    pub fn get(&self, key: &str) -> Option<&str> {
        if self.keys.is_empty() {
            return None;
        }
        let hash = (self.hash)(key.as_bytes());
        let idx = self.keys.partition_point(|&k| k < hash) % self.keys.len();
        self.nodes.get(&self.keys[idx]).map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// Returns the number of virtual nodes on the ring.
    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn replicas(&self) -> usize {
        self.replicas
    }
}

impl Default for HashRing {
    fn default() -> Self {
        Self::new(DEFAULT_REPLICAS, None)
    }
}

impl fmt::Debug for HashRing {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HashRing")
            .field("replicas", &self.replicas)
            .field("virtual_nodes", &self.keys.len())
            .finish()
    }
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;

    /// Interprets the bytes as a decimal number, so ring positions are predictable.
    fn identity_hash(data: &[u8]) -> u32 {
        std::str::from_utf8(data)
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(0)
    }

    #[test]
    fn test_ring_assigns_keys_with_wraparound() {
        let mut ring = HashRing::new(3, Some(identity_hash));

        // Virtual nodes: 2, 4, 6, 12, 14, 16, 22, 24, 26
        ring.add(["6", "4", "2"]);

        let cases = [("2", "2"), ("11", "2"), ("23", "4"), ("27", "2")];
        for (key, node) in cases {
            assert_eq!(ring.get(key), Some(node), "key {}", key);
        }

        // Adds 8, 18, 28
        ring.add(["8"]);

        // 27 should now map to 8
        assert_eq!(ring.get("27"), Some("8"));
        for (key, node) in [("2", "2"), ("11", "2"), ("23", "4")] {
            assert_eq!(ring.get(key), Some(node), "key {}", key);
        }
    }

    #[test]
    fn test_ring_empty() {
        let ring = HashRing::default();
        assert!(ring.is_empty());
        assert_eq!(ring.replicas(), DEFAULT_REPLICAS);
        assert_eq!(ring.get("anything"), None);
    }

    #[test]
    fn test_ring_keys_and_nodes_stay_consistent() {
        let mut ring = HashRing::new(3, Some(identity_hash));

        // "1" + "2" and "0" + "12" both hash to 12: the later node wins
        ring.add(["2"]);
        ring.add(["12"]);

        assert_eq!(ring.len(), ring.nodes.len());
        assert!(ring.keys.windows(2).all(|w| w[0] < w[1]));
        assert_eq!(ring.get("12"), Some("12"));
    }

    #[test]
    fn test_ring_default_hash_is_deterministic() {
        let peers = ["http://localhost:8001", "http://localhost:8002", "http://localhost:8003"];
        let mut a = HashRing::default();
        let mut b = HashRing::default();
        a.add(peers);
        b.add(peers.iter().rev());

        for key in ["Tom", "Jack", "Sam", "Kate", "Ann"] {
            let owner = a.get(key);
            assert!(owner.is_some());
            assert_eq!(owner, b.get(key));
        }
        assert_eq!(a.len(), 3 * DEFAULT_REPLICAS);
    }

    #[test]
    fn test_ring_spreads_keys_across_nodes() {
        let mut ring = HashRing::default();
        ring.add(["node-a", "node-b", "node-c"]);

        let mut owners = std::collections::HashSet::new();
        for i in 0..200 {
            if let Some(node) = ring.get(&format!("key{}", i)) {
                owners.insert(node.to_string());
            }
        }
        assert_eq!(owners.len(), 3);
    }
}
