//! Per-key async mutual exclusion.
//!
//! Read-mutate-write sequences on a single lobby (markers) or a single
//! chunk must not interleave, while sequences on different keys proceed
//! in parallel. [`KeyedLocks`] hands out one `tokio` mutex per live key and
//! forgets keys once nobody holds or waits on them.

use std::collections::HashMap;
use std::hash::Hash;
use std::sync::{Arc, Weak};

use tokio::sync::{Mutex, OwnedMutexGuard};

/// Registry of lazily created per-key mutexes.
#[derive(Debug)]
pub struct KeyedLocks<K> {
    slots: Mutex<HashMap<K, Weak<Mutex<()>>>>,
}

impl<K> Default for KeyedLocks<K> {
    fn default() -> Self {
        Self {
            slots: Mutex::new(HashMap::new()),
        }
    }
}

impl<K: Eq + Hash + Clone> KeyedLocks<K> {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for exclusive access to `key`. Released when the guard drops.
    pub async fn lock(&self, key: K) -> OwnedMutexGuard<()> {
        let slot = {
            let mut slots = self.slots.lock().await;
            if let Some(live) = slots.get(&key).and_then(Weak::upgrade) {
                live
            } else {
                slots.retain(|_, weak| weak.strong_count() > 0);
                let fresh = Arc::new(Mutex::new(()));
                slots.insert(key, Arc::downgrade(&fresh));
                fresh
            }
        };
        slot.lock_owned().await
    }

    /// Number of keys with a live mutex.
    pub async fn live_keys(&self) -> usize {
        self.slots
            .lock()
            .await
            .values()
            .filter(|weak| weak.strong_count() > 0)
            .count()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use super::*;

    #[tokio::test]
    async fn same_key_is_serialized() {
        let locks = Arc::new(KeyedLocks::<u32>::new());
        let inside = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));

        let mut tasks = Vec::new();
        for _ in 0..8 {
            let (locks, inside, peak) = (Arc::clone(&locks), Arc::clone(&inside), Arc::clone(&peak));
            tasks.push(tokio::spawn(async move {
                let _guard = locks.lock(1).await;
                let now = inside.fetch_add(1, Ordering::SeqCst) + 1;
                peak.fetch_max(now, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(2)).await;
                inside.fetch_sub(1, Ordering::SeqCst);
            }));
        }
        for task in tasks {
            task.await.unwrap();
        }
        assert_eq!(peak.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn different_keys_do_not_block() {
        let locks = KeyedLocks::<u32>::new();
        let _a = locks.lock(1).await;
        let b = tokio::time::timeout(Duration::from_millis(100), locks.lock(2)).await;
        assert!(b.is_ok());
    }

    #[tokio::test]
    async fn released_keys_are_forgotten() {
        let locks = KeyedLocks::<u32>::new();
        {
            let _a = locks.lock(1).await;
            assert_eq!(locks.live_keys().await, 1);
        }
        assert_eq!(locks.live_keys().await, 0);
    }
}
