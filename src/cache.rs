//! Deduplicating, block-invalidated cache for read calls.
//!
//! Many consumers observe the same call; one fetch per key is in flight at a
//! time, late subscribers get the cached state immediately, and every new
//! block re-fetches the keys someone is still watching.
//!
//! All bookkeeping lives behind one lock that is never held across an await.
//! Fetches run as spawned tasks and report back through the lock; a result
//! from a fetch that was superseded in the meantime is discarded.

pub mod dispatch;
pub mod invalidation;
pub mod key;
pub mod store;
pub mod subscription;

use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::time::Duration;

use futures::FutureExt;
use parking_lot::Mutex;
use tokio::runtime::Handle;
use tokio::sync::mpsc;
use tracing::{debug, trace};

pub use dispatch::{Fetcher, fetcher};
pub use invalidation::{BlockId, BlockListener};
pub use key::{CacheKey, CallArg, CallDescriptor, derive};
pub use store::CallState;
pub use subscription::Subscription;

use dispatch::{Outcome, PendingFetch};
use invalidation::BlockTracker;
use store::CallStore;
use subscription::Subscriber;

const DEFAULT_IDLE_CAPACITY: u64 = 10_000;
const DEFAULT_IDLE_TTL_SECS: u64 = 300;
const DEFAULT_PROCESSED_BLOCK_MEMORY: u64 = 256;

#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// Maximum number of unobserved entries kept around.
    pub idle_capacity: u64,
    /// Unobserved entries untouched for this long are dropped.
    pub idle_ttl: Duration,
    /// How many recent block ids are remembered for duplicate detection.
    pub processed_block_memory: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            idle_capacity: DEFAULT_IDLE_CAPACITY,
            idle_ttl: Duration::from_secs(DEFAULT_IDLE_TTL_SECS),
            processed_block_memory: DEFAULT_PROCESSED_BLOCK_MEMORY,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheStats {
    pub active_entries: usize,
    pub idle_entries: u64,
    pub subscribers: usize,
    pub in_flight: usize,
    pub last_block: Option<BlockId>,
}

/// Point-in-time view of one entry.
#[derive(Debug, Clone)]
pub struct EntryInfo<T, E> {
    pub key: CacheKey,
    pub subscribers: usize,
    pub version: u64,
    pub in_flight: bool,
    pub state: CallState<T, E>,
}

struct Shared<T, E> {
    store: CallStore<T, E>,
    blocks: BlockTracker,
    last_subscriber: u64,
}

struct Inner<T, E> {
    shared: Mutex<Shared<T, E>>,
    runtime: Handle,
}

impl<T, E> Inner<T, E>
where
    T: Clone + Send + Sync + 'static,
    E: Clone + Send + Sync + 'static,
{
    fn unsubscribe(&self, key: &CacheKey, id: u64) {
        let mut shared = self.shared.lock();
        let Some(entry) = shared.store.get_mut(key) else {
            return;
        };
        entry.subscribers.retain(|s| s.id != id);
        let remaining = entry.subscriber_count();
        shared.store.release(key);
        debug!(key = %key, subscriber = id, remaining, "unsubscribed");
    }

    fn complete(&self, key: &CacheKey, version: u64, outcome: Outcome<T, E>) {
        let mut shared = self.shared.lock();
        dispatch::complete(&mut shared.store, key, version, outcome);
    }
}

/// Process-wide read cache. Clones share the same state.
pub struct ReadCache<T, E> {
    inner: Arc<Inner<T, E>>,
}

impl<T, E> Clone for ReadCache<T, E> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<T, E> ReadCache<T, E>
where
    T: Clone + Send + Sync + 'static,
    E: Clone + Send + Sync + 'static,
{
    /// Creates the cache. Fetches are spawned on the current Tokio runtime.
    ///
    /// # Panics
    ///
    /// Panics when called outside a Tokio runtime.
    pub fn new(config: CacheConfig) -> Self {
        Self::with_runtime(config, Handle::current())
    }

    pub fn with_runtime(config: CacheConfig, runtime: Handle) -> Self {
        let shared = Shared {
            store: CallStore::new(config.idle_capacity, config.idle_ttl),
            blocks: BlockTracker::new(config.processed_block_memory),
            last_subscriber: 0,
        };

        Self {
            inner: Arc::new(Inner {
                shared: Mutex::new(shared),
                runtime,
            }),
        }
    }

    /// Observes `call`, fetching it with `fetcher` when needed.
    pub fn observe(&self, call: CallDescriptor, fetcher: Fetcher<T, E>) -> Subscription<T, E> {
        self.subscribe(call.key(), fetcher)
    }

    /// Registers a subscriber for `key`.
    ///
    /// The current state is queued on the subscription before this returns.
    /// A fetch is started when the key has never been fetched or was last
    /// fetched before the latest block.
    pub fn subscribe(&self, key: CacheKey, fetcher: Fetcher<T, E>) -> Subscription<T, E> {
        let (tx, rx) = mpsc::unbounded_channel();

        let (id, pending) = {
            let mut guard = self.inner.shared.lock();
            let shared = &mut *guard;
            shared.last_subscriber += 1;
            let id = shared.last_subscriber;
            let epoch = shared.blocks.epoch();

            let entry = shared.store.get_or_create(&key);
            let subscriber = Subscriber::new(id, tx);
            subscriber.send(entry.state.clone());
            entry.subscribers.push(subscriber);
            entry.fetcher = Some(fetcher.clone());
            let subscribers = entry.subscriber_count();

            let pending = if entry.is_stale(epoch) {
                dispatch::begin(&mut shared.store, &key, fetcher, epoch, false)
            } else {
                trace!(key = %key, "serving cached state");
                None
            };
            debug!(key = %key, subscriber = id, subscribers, "subscribed");
            (id, pending)
        };

        if let Some(pending) = pending {
            self.spawn_fetch(pending);
        }

        let inner = Arc::downgrade(&self.inner);
        let release_key = key.clone();
        let release = Box::new(move || {
            if let Some(inner) = inner.upgrade() {
                inner.unsubscribe(&release_key, id);
            }
        });
        Subscription::new(key, rx, release)
    }

    /// Starts a fetch unless one is already in flight for `key`.
    pub fn ensure_fetch(&self, key: &CacheKey, fetcher: Fetcher<T, E>) {
        self.dispatch(key, fetcher, false);
    }

    /// Starts a fetch, superseding any in-flight one for `key`.
    pub fn force_refresh(&self, key: &CacheKey, fetcher: Fetcher<T, E>) {
        self.dispatch(key, fetcher, true);
    }

    /// Handles a new-block heartbeat: every key with at least one subscriber
    /// is force-refreshed once per distinct block. Unobserved entries just
    /// become stale and refresh on their next subscribe.
    pub fn on_new_block(&self, block: BlockId) -> bool {
        let pending = {
            let mut guard = self.inner.shared.lock();
            let shared = &mut *guard;
            if !shared.blocks.observe(block) {
                trace!(block, "block already processed");
                return false;
            }
            let epoch = shared.blocks.epoch();

            let mut pending = Vec::new();
            for key in shared.store.subscribed_keys() {
                let Some(fetcher) = shared.store.get_mut(&key).and_then(|e| e.fetcher.clone()) else {
                    continue;
                };
                if let Some(fetch) = dispatch::begin(&mut shared.store, &key, fetcher, epoch, true) {
                    pending.push(fetch);
                }
            }
            pending
        };

        debug!(block, refreshed = pending.len(), "new block");
        for fetch in pending {
            self.spawn_fetch(fetch);
        }
        true
    }

    pub fn state(&self, key: &CacheKey) -> Option<CallState<T, E>> {
        self.inner.shared.lock().store.get(key).map(|entry| entry.state)
    }

    /// Drops an unobserved entry. Entries with subscribers or a fetch in
    /// flight are kept and `false` is returned.
    pub fn remove(&self, key: &CacheKey) -> bool {
        let mut shared = self.inner.shared.lock();
        if shared.store.is_active(key) {
            return false;
        }
        shared.store.remove(key).is_some()
    }

    pub fn stats(&self) -> CacheStats {
        let shared = self.inner.shared.lock();
        let mut subscribers = 0;
        let mut in_flight = 0;
        for (_, entry) in shared.store.active() {
            subscribers += entry.subscriber_count();
            in_flight += usize::from(entry.in_flight.is_some());
        }

        CacheStats {
            active_entries: shared.store.active_count(),
            idle_entries: shared.store.idle_count(),
            subscribers,
            in_flight,
            last_block: shared.blocks.last_block(),
        }
    }

    pub fn snapshot(&self) -> Vec<EntryInfo<T, E>> {
        let shared = self.inner.shared.lock();
        let active = shared
            .store
            .active()
            .map(|(key, entry)| (key.clone(), entry.clone()));
        active
            .chain(shared.store.idle())
            .map(|(key, entry)| EntryInfo {
                key,
                subscribers: entry.subscriber_count(),
                version: entry.version,
                in_flight: entry.in_flight.is_some(),
                state: entry.state,
            })
            .collect()
    }

    fn dispatch(&self, key: &CacheKey, fetcher: Fetcher<T, E>, force: bool) {
        let pending = {
            let mut guard = self.inner.shared.lock();
            let shared = &mut *guard;
            let epoch = shared.blocks.epoch();
            dispatch::begin(&mut shared.store, key, fetcher, epoch, force)
        };
        if let Some(pending) = pending {
            self.spawn_fetch(pending);
        }
    }

    fn spawn_fetch(&self, pending: PendingFetch<T, E>) {
        let PendingFetch {
            key,
            version,
            fetcher,
        } = pending;
        // The entry is already marked loading, so a fetcher that panics before
        // handing out its future still has to complete the fetch.
        let fetch = match panic::catch_unwind(AssertUnwindSafe(|| fetcher())) {
            Ok(fetch) => fetch,
            Err(_) => {
                self.inner.complete(&key, version, Outcome::Panicked);
                return;
            }
        };
        let inner = Arc::downgrade(&self.inner);

        self.inner.runtime.spawn(async move {
            let outcome = match AssertUnwindSafe(fetch).catch_unwind().await {
                Ok(Ok(value)) => Outcome::Value(value),
                Ok(Err(e)) => Outcome::Error(e),
                Err(_) => Outcome::Panicked,
            };
            if let Some(inner) = inner.upgrade() {
                inner.complete(&key, version, outcome);
            }
        });
    }
}

impl<T, E> BlockListener for ReadCache<T, E>
where
    T: Clone + Send + Sync + 'static,
    E: Clone + Send + Sync + 'static,
{
    fn on_new_block(&self, block: BlockId) -> bool {
        ReadCache::on_new_block(self, block)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_stats_track_subscribers() {
        let cache: ReadCache<u64, String> = ReadCache::new(CacheConfig::default());
        let key = derive("a", "m", vec![]);
        let fetch = fetcher(|| async { Ok(1) });

        let first = cache.subscribe(key.clone(), fetch.clone());
        let second = cache.subscribe(key.clone(), fetch);
        let stats = cache.stats();
        assert_eq!(stats.active_entries, 1);
        assert_eq!(stats.subscribers, 2);
        assert_eq!(stats.in_flight, 1);
        assert_eq!(stats.last_block, None);

        drop(first);
        assert_eq!(cache.stats().subscribers, 1);
        second.unsubscribe();
        assert_eq!(cache.stats().subscribers, 0);
    }

    #[tokio::test]
    async fn test_remove_refuses_observed_entries() {
        let cache: ReadCache<u64, String> = ReadCache::new(CacheConfig::default());
        let key = derive("a", "m", vec![]);
        let mut sub = cache.subscribe(key.clone(), fetcher(|| async { Ok(7) }));

        assert!(!cache.remove(&key));
        while sub.next_state().await.is_some_and(|s| s.loading || s.value.is_none()) {}
        drop(sub);

        assert!(cache.remove(&key));
        assert!(cache.state(&key).is_none());
    }
}
