//! Aggregation Cache.
//!
//! Holds the one [`DerivedFeed`] every consumer shares, so N subscribers
//! cost a single derivation. The feed is built on the first `get` under a
//! mutex-guarded slot, so two racing `get` calls always agree on it.
//!
//! `invalidate` drops the feed's live chain: the next list any subscriber
//! sees comes from fresh input subscriptions, with a fresh "now" for the
//! staleness window. Subscribers already attached stay attached and move
//! onto the new chain; no second chain is opened beside the old one.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use salesdesk_store::RecordStore;

use crate::clock::Clock;
use crate::derive::DeriveSettings;
use crate::pipeline::{DerivedFeed, DerivedStream};

/// Something whose cached view must be rebuilt after a write.
///
/// Single-record CRUD paths call this after every successful write so that
/// the derived view reflects the edit.
pub trait Invalidate: Send + Sync {
    /// Drop cached state. Idempotent; safe with no active subscribers.
    fn invalidate(&self);
}

pub struct AggregationCache {
    store: Arc<dyn RecordStore>,
    clock: Arc<dyn Clock>,
    settings: DeriveSettings,
    slot: Mutex<Option<Arc<DerivedFeed>>>,
    generation: AtomicU64,
}

impl AggregationCache {
    pub fn new(store: Arc<dyn RecordStore>, clock: Arc<dyn Clock>, settings: DeriveSettings) -> Self {
        Self {
            store,
            clock,
            settings,
            slot: Mutex::new(None),
            generation: AtomicU64::new(0),
        }
    }

    fn slot(&self) -> MutexGuard<'_, Option<Arc<DerivedFeed>>> {
        self.slot.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// The shared feed, built on first use.
    pub fn get(&self) -> Arc<DerivedFeed> {
        let mut slot = self.slot();
        if let Some(feed) = slot.as_ref() {
            return feed.clone();
        }
        let feed = Arc::new(DerivedFeed::new(
            self.store.clone(),
            self.clock.clone(),
            self.settings.clone(),
        ));
        tracing::debug!("aggregation cache filled");
        *slot = Some(feed.clone());
        feed
    }

    /// Subscribe through the shared feed.
    pub fn subscribe(&self) -> DerivedStream {
        self.get().subscribe()
    }

    /// How many times the cache has been invalidated.
    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::Relaxed)
    }
}

impl Invalidate for AggregationCache {
    fn invalidate(&self) {
        let generation = self.generation.fetch_add(1, Ordering::Relaxed) + 1;
        let feed = self.slot().clone();
        if let Some(feed) = &feed {
            feed.refresh();
        }
        tracing::debug!(generation, was_built = feed.is_some(), "aggregation cache invalidated");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::SystemClock;
    use salesdesk_store::MemoryStore;

    fn cache() -> AggregationCache {
        AggregationCache::new(
            Arc::new(MemoryStore::new()),
            Arc::new(SystemClock),
            DeriveSettings::default(),
        )
    }

    #[test]
    fn get_reuses_the_feed() {
        let cache = cache();
        let a = cache.get();
        let b = cache.get();
        assert!(Arc::ptr_eq(&a, &b));
    }

    #[test]
    fn invalidate_keeps_the_feed_and_counts() {
        let cache = cache();
        let before = cache.get();
        cache.invalidate();
        assert!(Arc::ptr_eq(&before, &cache.get()));
        assert_eq!(cache.generation(), 1);
        assert_eq!(before.chain_count(), 0);
    }

    #[test]
    fn invalidate_is_idempotent_without_subscribers() {
        let cache = cache();
        cache.invalidate();
        cache.invalidate();
        assert_eq!(cache.generation(), 2);
        assert!(!cache.get().is_live());
    }

    #[test]
    fn racing_gets_share_one_feed() {
        let cache = Arc::new(cache());
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let cache = cache.clone();
                std::thread::spawn(move || cache.get())
            })
            .collect();
        let feeds: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        assert!(feeds.iter().all(|f| Arc::ptr_eq(f, &feeds[0])));
    }
}
