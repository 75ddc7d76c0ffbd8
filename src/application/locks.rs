use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::{Mutex, OwnedMutexGuard};

use crate::domain::value_objects::ContentHash;

/// Per-content-hash mutual exclusion.
///
/// Every read-then-write sequence on one record (store, increment,
/// decrement, sweep) runs while holding the guard for its hash. Entries are
/// removed once no task holds or waits on them, so the map only grows with
/// the number of hashes in flight.
#[derive(Clone, Default)]
pub struct HashLocks {
    locks: Arc<DashMap<String, Arc<Mutex<()>>>>,
}

impl HashLocks {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn lock(&self, content_hash: &ContentHash) -> HashLockGuard {
        let key = content_hash.as_hex().to_string();
        let mutex = self
            .locks
            .entry(key.clone())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();

        let guard = mutex.lock_owned().await;

        HashLockGuard {
            guard: Some(guard),
            key,
            locks: Arc::clone(&self.locks),
        }
    }

    /// Number of hashes currently locked or awaited
    pub fn in_flight(&self) -> usize {
        self.locks.len()
    }
}

/// Releases the per-hash lock on drop
pub struct HashLockGuard {
    guard: Option<OwnedMutexGuard<()>>,
    key: String,
    locks: Arc<DashMap<String, Arc<Mutex<()>>>>,
}

impl Drop for HashLockGuard {
    fn drop(&mut self) {
        // The owned guard keeps its own Arc; release it before checking
        // whether the map holds the last reference.
        self.guard.take();
        self.locks
            .remove_if(&self.key, |_, mutex| Arc::strong_count(mutex) == 1);
    }
}
