// Copyright (c) The nextest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Generic per-key debounce used by [`crate::group_report`] and
//! [`crate::run_report`] (C5/C6, spec.md §4.4).
//!
//! Scheduling a write arms (or resets) a timer for that key; when the
//! timer fires with no intervening reset, the caller's write closure runs.
//! This is the mechanism that turns bursts of hundreds of thousands of
//! events into a small, bounded number of disk writes (spec.md §8, "write
//! coalescing").

use std::collections::HashMap;
use std::future::Future;
use std::hash::Hash;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;
use tokio::task::JoinHandle;

pub struct Debouncer<K> {
    delay: Duration,
    pending: Arc<Mutex<HashMap<K, JoinHandle<()>>>>,
}

impl<K> Debouncer<K>
where
    K: Eq + Hash + Clone + Send + Sync + 'static,
{
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            pending: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Arms (or resets, if already armed) the timer for `key`. When it
    /// fires, `on_fire(key)` runs exactly once.
    pub async fn schedule<F, Fut>(&self, key: K, on_fire: F)
    where
        F: FnOnce(K) -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let delay = self.delay;
        let key_for_task = key.clone();
        let pending = self.pending.clone();
        let handle = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            pending.lock().await.remove(&key_for_task);
            on_fire(key_for_task).await;
        });

        let mut guard = self.pending.lock().await;
        if let Some(old) = guard.insert(key, handle) {
            old.abort();
        }
    }

    /// Cancels every pending timer and returns the keys that were armed
    /// (the "dirty" targets), so the caller can render and write each one
    /// exactly once as part of finalization.
    pub async fn drain_pending(&self) -> Vec<K> {
        let mut guard = self.pending.lock().await;
        let keys: Vec<K> = guard.keys().cloned().collect();
        for (_, handle) in guard.drain() {
            handle.abort();
        }
        keys
    }

    #[cfg(test)]
    pub async fn pending_count(&self) -> usize {
        self.pending.lock().await.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test(start_paused = true)]
    async fn coalesces_bursts_into_one_fire() {
        let debouncer = Debouncer::<&'static str>::new(Duration::from_millis(100));
        let fires = Arc::new(AtomicUsize::new(0));

        for _ in 0..1000 {
            let fires = fires.clone();
            debouncer
                .schedule("group-a", move |_key| async move {
                    fires.fetch_add(1, Ordering::SeqCst);
                })
                .await;
            tokio::time::advance(Duration::from_micros(50)).await;
        }

        tokio::time::advance(Duration::from_millis(200)).await;
        tokio::task::yield_now().await;
        assert_eq!(fires.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn finalize_flushes_every_dirty_key_once() {
        let debouncer = Debouncer::<&'static str>::new(Duration::from_secs(10));
        debouncer.schedule("a", |_| async {}).await;
        debouncer.schedule("b", |_| async {}).await;

        let dirty = debouncer.drain_pending().await;
        assert_eq!(dirty.len(), 2);
        assert_eq!(debouncer.pending_count().await, 0);
    }
}
