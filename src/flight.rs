//! Request Deduplication
//!
//! Collapses concurrent lookups of the same key into a single computation.

use std::collections::HashMap;
use std::future::Future;

use parking_lot::Mutex;
use tokio::sync::watch;

/// Completion signal of one in-flight computation. Holds `None` until the
/// leading caller publishes the result.
type Call<T> = watch::Receiver<Option<T>>;

enum Join<T> {
    Leader(watch::Sender<Option<T>>),
    Follower(Call<T>),
}

// == Flight ==
/// Tracks in-flight computations by key.
///
/// The first caller for a key runs the computation; callers arriving while it
/// is running wait for it and receive a clone of its result. Once the result
/// is published the key is forgotten, so the next call starts afresh.
pub struct Flight<T> {
    calls: Mutex<HashMap<String, Call<T>>>,
}

impl<T: Clone + Send + Sync> Flight<T> {
    pub fn new() -> Self {
        Self {
            calls: Mutex::new(HashMap::new()),
        }
    }

    // == Run ==
    /// Runs `f` for `key` unless a run for the same key is already in flight,
    /// in which case the result of that run is awaited and returned instead.
    ///
    /// There is no timeout: followers wait for as long as the leader runs. If
    /// the leader is cancelled before finishing, the waiting callers compete
    /// again and one of them takes over.
    pub async fn run<F, Fut>(&self, key: &str, f: F) -> T
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = T>,
    {
        let tx = loop {
            match self.join(key) {
                Join::Leader(tx) => break tx,
                Join::Follower(mut rx) => {
                    let finished = match rx.wait_for(Option::is_some).await {
                        Ok(done) => (*done).clone(),
                        Err(_) => None,
                    };
                    if let Some(value) = finished {
                        return value;
                    }
                }
            }
        };

        let _call = CallGuard {
            calls: &self.calls,
            key,
        };
        let value = f().await;
        tx.send_replace(Some(value.clone()));
        value
    }

    /// Returns the number of keys currently in flight.
    pub fn in_flight(&self) -> usize {
        self.calls.lock().len()
    }

    fn join(&self, key: &str) -> Join<T> {
        let mut calls = self.calls.lock();
        if let Some(rx) = calls.get(key) {
            return Join::Follower(rx.clone());
        }
        let (tx, rx) = watch::channel(None);
        calls.insert(key.to_string(), rx);
        Join::Leader(tx)
    }
}

impl<T: Clone + Send + Sync> Default for Flight<T> {
    fn default() -> Self {
        Self::new()
    }
}

/// Forgets the call record when the leader finishes or is dropped.
struct CallGuard<'a, T> {
    calls: &'a Mutex<HashMap<String, Call<T>>>,
    key: &'a str,
}

impl<T> Drop for CallGuard<'_, T> {
    fn drop(&mut self) {
        self.calls.lock().remove(self.key);
    }
}
