//! LRU Cache Module
//!
//! Byte-budgeted Least Recently Used cache used as the storage engine of every group.

use std::collections::HashMap;
use std::fmt;

// == Byte Size ==
/// Values stored in an [`LruCache`] report how many bytes they occupy.
pub trait ByteSize {
    fn byte_len(&self) -> usize;
}

impl ByteSize for String {
    fn byte_len(&self) -> usize {
        self.len()
    }
}

impl ByteSize for Vec<u8> {
    fn byte_len(&self) -> usize {
        self.len()
    }
}

/// Callback invoked with every entry the cache evicts.
pub type EvictionCallback<V> = Box<dyn FnMut(&str, &V) + Send>;

struct Node<V> {
    key: String,
    value: V,
    prev: Option<usize>,
    next: Option<usize>,
}

// == LRU Cache ==
/// Bounded key-value store evicting least recently used entries.
///
/// Entries live in a contiguous slab and are chained into a doubly linked
/// list, with a hash index from key to slab position:
/// - `head` = Most recently used
/// - `tail` = Least recently used
///
/// Each entry is charged `key.len() + value.byte_len()` bytes. With a
/// `max_bytes` of zero the cache never evicts on its own.
pub struct LruCache<V> {
    /// Byte budget, 0 = unlimited
    max_bytes: usize,
    /// Bytes currently charged to live entries
    bytes: usize,
    nodes: Vec<Node<V>>,
    index: HashMap<String, usize>,
    head: Option<usize>,
    tail: Option<usize>,
    on_evicted: Option<EvictionCallback<V>>,
}

impl<V: ByteSize> LruCache<V> {
    // == Constructor ==
    /// Creates an empty cache with the given byte budget.
    pub fn new(max_bytes: usize) -> Self {
        Self {
            max_bytes,
            bytes: 0,
            nodes: Vec::new(),
            index: HashMap::new(),
            head: None,
            tail: None,
            on_evicted: None,
        }
    }

    /// Installs a callback that receives each evicted entry before it is dropped.
    pub fn with_eviction_callback<F>(mut self, callback: F) -> Self
    where
        F: FnMut(&str, &V) + Send + 'static,
    {
        self.on_evicted = Some(Box::new(callback));
        self
    }

    // == Add ==
    /// Inserts a new entry or refreshes an existing one.
    ///
    /// Afterwards, least recently used entries are evicted one at a time until
    /// the byte total fits the budget again. A single oversized value can
    /// therefore evict several entries, itself included.
    pub fn add(&mut self, key: String, value: V) {
        if let Some(&idx) = self.index.get(&key) {
            self.move_to_front(idx);
            let node = &mut self.nodes[idx];
            self.bytes = self.bytes - node.value.byte_len() + value.byte_len();
            node.value = value;
        } else {
            self.bytes += key.len() + value.byte_len();
            let idx = self.nodes.len();
            self.nodes.push(Node {
                key: key.clone(),
                value,
                prev: None,
                next: None,
            });
            self.index.insert(key, idx);
            self.push_front(idx);
        }

        while self.max_bytes != 0 && self.bytes > self.max_bytes {
            self.remove_oldest();
        }
    }

    // == Get ==
    /// Looks up a key, marking it as most recently used on a hit.
    pub fn get(&mut self, key: &str) -> Option<&V> {
        let idx = *self.index.get(key)?;
        self.move_to_front(idx);
        Some(&self.nodes[idx].value)
    }

    // == Remove Oldest ==
    /// Evicts the least recently used entry, if any, and returns it.
    pub fn remove_oldest(&mut self) -> Option<(String, V)> {
        let idx = self.tail?;
        let node = self.take(idx);
        self.bytes -= node.key.len() + node.value.byte_len();
        if let Some(callback) = self.on_evicted.as_mut() {
            callback(&node.key, &node.value);
        }
        Some((node.key, node.value))
    }

    // == Peek Oldest ==
    /// Returns the least recently used key without touching it.
    pub fn peek_oldest(&self) -> Option<&str> {
        self.tail.map(|idx| self.nodes[idx].key.as_str())
    }

    /// Checks for a key without changing its recency.
    pub fn contains(&self, key: &str) -> bool {
        self.index.contains_key(key)
    }

    // == Length ==
    /// Returns the number of entries.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Returns the bytes currently charged to entries.
    pub fn bytes(&self) -> usize {
        self.bytes
    }

    pub fn max_bytes(&self) -> usize {
        self.max_bytes
    }

    // == List Maintenance ==
    fn move_to_front(&mut self, idx: usize) {
        if self.head == Some(idx) {
            return;
        }
        self.unlink(idx);
        self.push_front(idx);
    }

    fn push_front(&mut self, idx: usize) {
        self.nodes[idx].prev = None;
        self.nodes[idx].next = self.head;
        if let Some(head) = self.head {
            self.nodes[head].prev = Some(idx);
        }
        self.head = Some(idx);
        if self.tail.is_none() {
            self.tail = Some(idx);
        }
    }

    fn unlink(&mut self, idx: usize) {
        let (prev, next) = (self.nodes[idx].prev, self.nodes[idx].next);
        match prev {
            Some(p) => self.nodes[p].next = next,
            None => self.head = next,
        }
        match next {
            Some(n) => self.nodes[n].prev = prev,
            None => self.tail = prev,
        }
    }

    /// Removes the node at `idx` from the list, the slab and the index.
    fn take(&mut self, idx: usize) -> Node<V> {
        self.unlink(idx);
        let node = self.nodes.swap_remove(idx);
        self.index.remove(&node.key);

        // The former last slot now lives at `idx`; repoint its neighbours.
        if idx < self.nodes.len() {
            let (prev, next) = (self.nodes[idx].prev, self.nodes[idx].next);
            match prev {
                Some(p) => self.nodes[p].next = Some(idx),
                None => self.head = Some(idx),
            }
            match next {
                Some(n) => self.nodes[n].prev = Some(idx),
                None => self.tail = Some(idx),
            }
            if let Some(slot) = self.index.get_mut(&self.nodes[idx].key) {
                *slot = idx;
            }
        }
        node
    }
}

impl<V> fmt::Debug for LruCache<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LruCache")
            .field("max_bytes", &self.max_bytes)
            .field("bytes", &self.bytes)
            .field("len", &self.nodes.len())
            .finish()
    }
}
