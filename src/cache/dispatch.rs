use std::future::Future;
use std::sync::Arc;

use futures::FutureExt;
use futures::future::BoxFuture;
use tracing::{debug, error, trace};

use super::key::CacheKey;
use super::store::CallStore;

/// A re-runnable, side-effect free read.
pub type Fetcher<T, E> = Arc<dyn Fn() -> BoxFuture<'static, Result<T, E>> + Send + Sync>;

/// Wraps an async closure into a [`Fetcher`].
pub fn fetcher<T, E, F, Fut>(f: F) -> Fetcher<T, E>
where
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<T, E>> + Send + 'static,
{
    Arc::new(move || f().boxed())
}

/// A fetch registered on its entry that still has to be spawned.
pub(crate) struct PendingFetch<T, E> {
    pub(crate) key: CacheKey,
    pub(crate) version: u64,
    pub(crate) fetcher: Fetcher<T, E>,
}

pub(crate) enum Outcome<T, E> {
    Value(T),
    Error(E),
    Panicked,
}

/// Starts a fetch for `key` unless one is already in flight. With `force`
/// the in-flight fetch is superseded instead.
///
/// The entry remembers `fetcher` either way so invalidation can re-run it.
pub(crate) fn begin<T, E>(
    store: &mut CallStore<T, E>,
    key: &CacheKey,
    fetcher: Fetcher<T, E>,
    epoch: u64,
    force: bool,
) -> Option<PendingFetch<T, E>>
where
    T: Clone + Send + Sync + 'static,
    E: Clone + Send + Sync + 'static,
{
    let entry = store.get_or_create(key);
    entry.fetcher = Some(fetcher.clone());
    if !force && let Some(version) = entry.in_flight {
        trace!(key = %key, version, "attaching to in-flight fetch");
        return None;
    }

    let version = store.next_version();
    let entry = store.get_or_create(key);
    if let Some(superseded) = entry.in_flight {
        debug!(key = %key, superseded, version, "superseding in-flight fetch");
    }
    entry.version = version;
    entry.in_flight = Some(version);
    entry.fetched_epoch = Some(epoch);
    entry.state.loading = true;
    entry.state.error = None;
    entry.notify();
    debug!(key = %key, version, "fetch started");

    Some(PendingFetch {
        key: key.clone(),
        version,
        fetcher,
    })
}

/// Applies a finished fetch. Results of superseded fetches, and of fetches
/// whose entry no longer exists, are dropped. Returns whether it was applied.
pub(crate) fn complete<T, E>(
    store: &mut CallStore<T, E>,
    key: &CacheKey,
    version: u64,
    outcome: Outcome<T, E>,
) -> bool
where
    T: Clone + Send + Sync + 'static,
    E: Clone + Send + Sync + 'static,
{
    let Some(entry) = store.get_mut(key) else {
        debug!(key = %key, version, "entry gone, discarding fetch result");
        return false;
    };
    if entry.in_flight != Some(version) {
        debug!(key = %key, version, current = entry.version, "discarding superseded fetch result");
        return false;
    }

    entry.in_flight = None;
    entry.state.loading = false;
    match outcome {
        Outcome::Value(value) => {
            entry.state.value = Some(value);
            entry.state.error = None;
            debug!(key = %key, version, "fetch completed");
        }
        Outcome::Error(e) => {
            entry.state.error = Some(e);
            debug!(key = %key, version, "fetch failed");
        }
        Outcome::Panicked => {
            error!(key = %key, version, "fetch panicked");
        }
    }
    entry.notify();
    store.release(key);
    true
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::cache::key::derive;

    type Store = CallStore<u64, String>;

    fn store() -> Store {
        CallStore::new(100, Duration::from_secs(60))
    }

    fn constant(value: u64) -> Fetcher<u64, String> {
        fetcher(move || async move { Ok(value) })
    }

    #[test]
    fn test_begin_attaches_to_in_flight() {
        let mut store = store();
        let key = derive("a", "m", vec![]);

        let first = begin(&mut store, &key, constant(1), 0, false);
        assert!(first.is_some());
        assert!(begin(&mut store, &key, constant(1), 0, false).is_none());

        let entry = store.get_mut(&key).unwrap();
        assert!(entry.state.loading);
        assert_eq!(entry.in_flight, Some(first.unwrap().version));
    }

    #[test]
    fn test_force_supersedes() {
        let mut store = store();
        let key = derive("a", "m", vec![]);

        let old = begin(&mut store, &key, constant(1), 0, false).unwrap();
        let new = begin(&mut store, &key, constant(2), 0, true).unwrap();
        assert!(new.version > old.version);

        // the newer fetch lands first, the older one must not overwrite it
        assert!(complete(&mut store, &key, new.version, Outcome::Value(2)));
        assert!(!complete(&mut store, &key, old.version, Outcome::Value(1)));
        assert_eq!(store.get(&key).unwrap().state.value, Some(2));
    }

    #[test]
    fn test_error_keeps_last_value() {
        let mut store = store();
        let key = derive("a", "m", vec![]);

        let first = begin(&mut store, &key, constant(1), 0, false).unwrap();
        complete(&mut store, &key, first.version, Outcome::Value(100));
        let second = begin(&mut store, &key, constant(1), 1, true).unwrap();
        assert_eq!(store.get(&key).unwrap().state.error, None);
        complete(&mut store, &key, second.version, Outcome::Error("timeout".to_string()));

        let state = store.get(&key).unwrap().state;
        assert_eq!(state.value, Some(100));
        assert_eq!(state.error.as_deref(), Some("timeout"));
        assert!(!state.loading);
    }

    #[test]
    fn test_panic_clears_loading() {
        let mut store = store();
        let key = derive("a", "m", vec![]);

        let pending = begin(&mut store, &key, constant(1), 0, false).unwrap();
        assert!(complete(&mut store, &key, pending.version, Outcome::Panicked));

        let entry = store.get(&key).unwrap();
        assert!(!entry.state.loading);
        assert!(entry.in_flight.is_none());
    }

    #[test]
    fn test_completion_for_evicted_entry_is_dropped() {
        let mut store = store();
        let key = derive("a", "m", vec![]);

        let pending = begin(&mut store, &key, constant(1), 0, false).unwrap();
        store.remove(&key);
        assert!(!complete(&mut store, &key, pending.version, Outcome::Value(1)));

        // a re-created entry gets a fresh version and ignores the old result
        let fresh = begin(&mut store, &key, constant(1), 0, false).unwrap();
        assert_ne!(fresh.version, pending.version);
        assert!(!complete(&mut store, &key, pending.version, Outcome::Value(1)));
        assert!(store.get(&key).unwrap().state.loading);
    }
}
