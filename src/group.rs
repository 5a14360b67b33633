//! Group Module
//!
//! A group is a named cache namespace: its own loader, local cache and
//! in-flight deduplication, optionally backed by a peer mesh.
//!
//! # Lookup Flow
//! ```text
//! get(key) --> cached locally? --yes--> value
//!                 | no
//!                 v
//!       owned by a remote peer? --yes--> fetch from peer --ok--> value (not cached)
//!                 | no                        | error
//!                 v                           v
//!       loader(key) --> populate cache --> value
//! ```

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, OnceLock};

use serde::Serialize;
use tracing::{debug, warn};

use crate::cache::{ByteView, CacheStats, CacheStore};
use crate::error::{CacheError, Result};
use crate::flight::Flight;
use crate::loader::Loader;
use crate::peers::{FetchRequest, PeerGetter, PeerPicker};

#[derive(Default)]
struct LoadCounters {
    gets: AtomicU64,
    cache_hits: AtomicU64,
    loads: AtomicU64,
    loads_deduped: AtomicU64,
    peer_loads: AtomicU64,
    peer_errors: AtomicU64,
    local_loads: AtomicU64,
    local_load_errs: AtomicU64,
}

fn bump(counter: &AtomicU64) {
    counter.fetch_add(1, Ordering::Relaxed);
}

// == Group Stats ==
/// Point-in-time counters of one group.
#[derive(Debug, Clone, Serialize)]
pub struct GroupStats {
    pub name: String,
    /// Non-empty lookups, hits included
    pub gets: u64,
    /// Lookups answered by the local cache
    pub cache_hits: u64,
    /// Lookups that missed and entered the load path
    pub loads: u64,
    /// Loads that actually ran, after deduplication
    pub loads_deduped: u64,
    /// Values fetched from remote peers
    pub peer_loads: u64,
    /// Remote fetches that failed and fell back to the loader
    pub peer_errors: u64,
    /// Successful loader calls
    pub local_loads: u64,
    /// Failed loader calls
    pub local_load_errs: u64,
    /// Fraction of local cache lookups that hit
    pub hit_rate: f64,
    /// Local cache statistics
    pub cache: CacheStats,
}

// == Group ==
pub struct Group {
    name: String,
    loader: Arc<dyn Loader>,
    main_cache: CacheStore,
    peers: OnceLock<Arc<dyn PeerPicker>>,
    flight: Flight<Result<ByteView>>,
    counters: LoadCounters,
}

impl Group {
    // == Constructor ==
    /// Creates a group whose local cache holds at most `cache_bytes` bytes.
    ///
    /// Most callers go through [`GroupRegistry::new_group`](crate::registry::GroupRegistry::new_group)
    /// so the group can be found by name.
    pub fn new(name: impl Into<String>, cache_bytes: usize, loader: Arc<dyn Loader>) -> Self {
        Self {
            name: name.into(),
            loader,
            main_cache: CacheStore::new(cache_bytes),
            peers: OnceLock::new(),
            flight: Flight::new(),
            counters: LoadCounters::default(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    // == Register Peers ==
    /// Binds the peer picker used to locate remote owners.
    ///
    /// May be called once. A second call is a wiring defect and yields
    /// [`CacheError::PeersAlreadyRegistered`], leaving the first picker in place.
    pub fn register_peers(&self, peers: Arc<dyn PeerPicker>) -> Result<()> {
        self.peers
            .set(peers)
            .map_err(|_| CacheError::PeersAlreadyRegistered(self.name.clone()))
    }

    // == Get ==
    /// Returns the value for `key`, loading it on a miss.
    pub async fn get(&self, key: &str) -> Result<ByteView> {
        if key.is_empty() {
            return Err(CacheError::EmptyKey);
        }
        bump(&self.counters.gets);

        if let Some(value) = self.main_cache.get(key).await {
            bump(&self.counters.cache_hits);
            debug!("Cache hit in group {} for key {}", self.name, key);
            return Ok(value);
        }

        self.load(key).await
    }

    /// Loads a missing key, sharing one load between concurrent callers.
    async fn load(&self, key: &str) -> Result<ByteView> {
        bump(&self.counters.loads);

        self.flight
            .run(key, || async {
                bump(&self.counters.loads_deduped);

                if let Some(peer) = self.peers.get().and_then(|peers| peers.pick_peer(key)) {
                    match self.get_from_peer(peer.as_ref(), key).await {
                        Ok(value) => {
                            bump(&self.counters.peer_loads);
                            return Ok(value);
                        }
                        Err(err) => {
                            bump(&self.counters.peer_errors);
                            warn!("Failed to get {} from peer, loading locally: {}", key, err);
                        }
                    }
                }

                self.get_locally(key).await
            })
            .await
    }

    async fn get_from_peer(&self, peer: &dyn PeerGetter, key: &str) -> Result<ByteView> {
        let request = FetchRequest::new(self.name.as_str(), key);
        let bytes = peer.get(&request).await?;
        Ok(ByteView::from(bytes))
    }

    async fn get_locally(&self, key: &str) -> Result<ByteView> {
        match self.loader.load(key).await {
            Ok(bytes) => {
                bump(&self.counters.local_loads);
                let value = ByteView::from(bytes);
                self.populate_cache(key, value.clone()).await;
                Ok(value)
            }
            Err(err) => {
                bump(&self.counters.local_load_errs);
                Err(CacheError::load(err))
            }
        }
    }

    async fn populate_cache(&self, key: &str, value: ByteView) {
        self.main_cache.add(key, value).await;
    }

    // == Stats ==
    pub async fn stats(&self) -> GroupStats {
        let load = |counter: &AtomicU64| counter.load(Ordering::Relaxed);
        let c = &self.counters;
        let cache = self.main_cache.stats().await;
        GroupStats {
            name: self.name.clone(),
            gets: load(&c.gets),
            cache_hits: load(&c.cache_hits),
            loads: load(&c.loads),
            loads_deduped: load(&c.loads_deduped),
            peer_loads: load(&c.peer_loads),
            peer_errors: load(&c.peer_errors),
            local_loads: load(&c.local_loads),
            local_load_errs: load(&c.local_load_errs),
            hit_rate: cache.hit_rate(),
            cache,
        }
    }
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;
    use crate::loader::LoaderFn;
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::atomic::AtomicUsize;
    use std::sync::Mutex;
    use std::time::Duration;

    fn db() -> HashMap<&'static str, &'static str> {
        HashMap::from([("Tom", "630"), ("Jack", "589"), ("Sam", "567")])
    }

    /// Loader over `db()` that counts calls per key.
    fn counting_loader() -> (Arc<dyn Loader>, Arc<Mutex<HashMap<String, usize>>>) {
        let counts = Arc::new(Mutex::new(HashMap::new()));
        let seen = counts.clone();
        let loader = LoaderFn(move |key: &str| -> anyhow::Result<Vec<u8>> {
            *seen.lock().unwrap().entry(key.to_string()).or_insert(0) += 1;
            match db().get(key) {
                Some(v) => Ok(v.as_bytes().to_vec()),
                None => anyhow::bail!("{} not exist", key),
            }
        });
        (Arc::new(loader), counts)
    }

    struct StubPeer {
        value: Option<&'static str>,
        requests: Mutex<Vec<FetchRequest>>,
    }

    #[async_trait]
    impl PeerGetter for StubPeer {
        async fn get(&self, request: &FetchRequest) -> Result<Vec<u8>> {
            self.requests.lock().unwrap().push(request.clone());
            match self.value {
                Some(v) => Ok(v.as_bytes().to_vec()),
                None => Err(CacheError::Peer("server returned: 503".to_string())),
            }
        }
    }

    /// Picks the stub for every key.
    struct StubPicker(Arc<StubPeer>);

    impl PeerPicker for StubPicker {
        fn pick_peer(&self, _key: &str) -> Option<Arc<dyn PeerGetter>> {
            Some(self.0.clone())
        }
    }

    /// Reports every key as locally owned.
    struct LocalPicker;

    impl PeerPicker for LocalPicker {
        fn pick_peer(&self, _key: &str) -> Option<Arc<dyn PeerGetter>> {
            None
        }
    }

    fn stub_peer(value: Option<&'static str>) -> Arc<StubPeer> {
        Arc::new(StubPeer {
            value,
            requests: Mutex::new(Vec::new()),
        })
    }

    #[tokio::test]
    async fn test_get_loads_once_then_hits_cache() {
        let (loader, counts) = counting_loader();
        let group = Group::new("scores", 2 << 10, loader);

        for (key, value) in db() {
            let view = group.get(key).await.unwrap();
            assert_eq!(view.to_string(), value);

            let view = group.get(key).await.unwrap();
            assert_eq!(view.to_string(), value);
            assert_eq!(counts.lock().unwrap()[key], 1, "cache {} miss", key);
        }

        let stats = group.stats().await;
        assert_eq!(stats.gets, 6);
        assert_eq!(stats.cache_hits, 3);
        assert_eq!(stats.local_loads, 3);
        assert_eq!(stats.cache.total_entries, 3);
    }

    #[tokio::test]
    async fn test_get_unknown_key_fails_and_is_not_cached() {
        let (loader, counts) = counting_loader();
        let group = Group::new("scores", 2 << 10, loader);

        let err = group.get("unknown").await.unwrap_err();
        assert!(matches!(err, CacheError::Load(_)));
        assert_eq!(err.to_string(), "unknown not exist");

        assert!(group.get("unknown").await.is_err());
        assert_eq!(counts.lock().unwrap()["unknown"], 2);
        assert_eq!(group.stats().await.cache.total_entries, 0);
    }

    #[tokio::test]
    async fn test_get_empty_key() {
        let (loader, counts) = counting_loader();
        let group = Group::new("scores", 2 << 10, loader);

        assert!(matches!(group.get("").await, Err(CacheError::EmptyKey)));

        assert!(counts.lock().unwrap().is_empty());
        let stats = group.stats().await;
        assert_eq!(stats.gets, 0);
        assert_eq!(stats.cache.hits + stats.cache.misses, 0);
    }

    #[tokio::test]
    async fn test_remote_hit_skips_loader_and_cache() {
        let (loader, counts) = counting_loader();
        let group = Group::new("scores", 2 << 10, loader);
        let peer = stub_peer(Some("remote"));
        group
            .register_peers(Arc::new(StubPicker(peer.clone())))
            .unwrap();

        let view = group.get("Tom").await.unwrap();

        assert_eq!(view.to_string(), "remote");
        assert!(counts.lock().unwrap().is_empty());
        assert_eq!(
            *peer.requests.lock().unwrap(),
            vec![FetchRequest::new("scores", "Tom")]
        );
        let stats = group.stats().await;
        assert_eq!(stats.peer_loads, 1);
        assert_eq!(stats.cache.total_entries, 0);

        // Not cached: the next lookup goes to the peer again
        group.get("Tom").await.unwrap();
        assert_eq!(peer.requests.lock().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_remote_failure_falls_back_to_loader() {
        let (loader, counts) = counting_loader();
        let group = Group::new("scores", 2 << 10, loader);
        let peer = stub_peer(None);
        group
            .register_peers(Arc::new(StubPicker(peer.clone())))
            .unwrap();

        let view = group.get("Jack").await.unwrap();

        assert_eq!(view.to_string(), "589");
        assert_eq!(counts.lock().unwrap()["Jack"], 1);
        assert_eq!(peer.requests.lock().unwrap().len(), 1);

        // Now cached locally: neither peer nor loader is consulted again
        group.get("Jack").await.unwrap();
        assert_eq!(counts.lock().unwrap()["Jack"], 1);
        assert_eq!(peer.requests.lock().unwrap().len(), 1);

        let stats = group.stats().await;
        assert_eq!(stats.peer_errors, 1);
        assert_eq!(stats.local_loads, 1);
        assert_eq!(stats.cache_hits, 1);
    }

    #[tokio::test]
    async fn test_locally_owned_key_uses_loader() {
        let (loader, counts) = counting_loader();
        let group = Group::new("scores", 2 << 10, loader);
        group.register_peers(Arc::new(LocalPicker)).unwrap();

        assert_eq!(group.get("Sam").await.unwrap().to_string(), "567");
        assert_eq!(counts.lock().unwrap()["Sam"], 1);
    }

    #[tokio::test]
    async fn test_register_peers_twice() {
        let (loader, _) = counting_loader();
        let group = Group::new("scores", 2 << 10, loader);

        assert!(group.register_peers(Arc::new(LocalPicker)).is_ok());
        let err = group.register_peers(Arc::new(LocalPicker)).unwrap_err();
        assert!(matches!(err, CacheError::PeersAlreadyRegistered(name) if name == "scores"));
    }

    struct SlowLoader {
        calls: AtomicUsize,
        fail: bool,
    }

    impl SlowLoader {
        fn new(fail: bool) -> Arc<Self> {
            Arc::new(Self {
                calls: AtomicUsize::new(0),
                fail,
            })
        }
    }

    #[async_trait]
    impl Loader for SlowLoader {
        async fn load(&self, key: &str) -> anyhow::Result<Vec<u8>> {
            self.calls.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(100)).await;
            if self.fail {
                anyhow::bail!("boom");
            }
            Ok(format!("value of {}", key).into_bytes())
        }
    }

    /// Remote owner that answers after a delay, counting requests.
    struct SlowPeer {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl PeerGetter for SlowPeer {
        async fn get(&self, request: &FetchRequest) -> Result<Vec<u8>> {
            self.calls.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(100)).await;
            Ok(format!("remote {}", request.key).into_bytes())
        }
    }

    struct SlowPicker(Arc<SlowPeer>);

    impl PeerPicker for SlowPicker {
        fn pick_peer(&self, _key: &str) -> Option<Arc<dyn PeerGetter>> {
            Some(self.0.clone())
        }
    }

    async fn get_concurrently(group: &Arc<Group>, key: &'static str, n: usize) -> Vec<Result<ByteView>> {
        let handles: Vec<_> = (0..n)
            .map(|_| {
                let group = group.clone();
                tokio::spawn(async move { group.get(key).await })
            })
            .collect();

        let mut results = Vec::with_capacity(n);
        for handle in handles {
            results.push(handle.await.unwrap());
        }
        results
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_misses_load_once() {
        let loader = SlowLoader::new(false);
        let group = Arc::new(Group::new("slow", 0, loader.clone()));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let group = group.clone();
                tokio::spawn(async move { group.get("k").await })
            })
            .collect();

        for handle in handles {
            let view = handle.await.unwrap().unwrap();
            assert_eq!(view.to_string(), "value of k");
        }
        assert_eq!(loader.calls.load(std::sync::atomic::Ordering::SeqCst), 1);

        let stats = group.stats().await;
        assert_eq!(stats.loads, 8);
        assert_eq!(stats.loads_deduped, 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_misses_share_loader_error() {
        let loader = SlowLoader::new(true);
        let group = Arc::new(Group::new("slow", 0, loader.clone()));

        for result in get_concurrently(&group, "k", 8).await {
            let err = result.unwrap_err();
            assert!(matches!(err, CacheError::Load(_)));
            assert_eq!(err.to_string(), "boom");
        }
        assert_eq!(loader.calls.load(std::sync::atomic::Ordering::SeqCst), 1);

        let stats = group.stats().await;
        assert_eq!(stats.local_load_errs, 1);
        assert_eq!(stats.cache.total_entries, 0);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_remote_misses_fetch_once() {
        let loader = SlowLoader::new(false);
        let group = Arc::new(Group::new("slow", 0, loader.clone()));
        let peer = Arc::new(SlowPeer {
            calls: AtomicUsize::new(0),
        });
        group
            .register_peers(Arc::new(SlowPicker(peer.clone())))
            .unwrap();

        for result in get_concurrently(&group, "k", 8).await {
            assert_eq!(result.unwrap().to_string(), "remote k");
        }
        assert_eq!(peer.calls.load(std::sync::atomic::Ordering::SeqCst), 1);
        assert_eq!(loader.calls.load(std::sync::atomic::Ordering::SeqCst), 0);
        assert_eq!(group.stats().await.peer_loads, 1);
    }
}
