use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::time::Duration;

use moka::sync::Cache;
use tracing::trace;

use super::dispatch::Fetcher;
use super::key::CacheKey;
use super::subscription::Subscriber;

/// What a consumer sees for one key.
///
/// `value` keeps the last good result while a refresh is loading, and after
/// a failed fetch. `error` is only set when `loading` is false.
#[derive(Debug, Clone, PartialEq)]
pub struct CallState<T, E> {
    pub value: Option<T>,
    pub loading: bool,
    pub error: Option<E>,
}

impl<T, E> Default for CallState<T, E> {
    fn default() -> Self {
        Self {
            value: None,
            loading: false,
            error: None,
        }
    }
}

#[derive(Clone)]
pub(crate) struct CallEntry<T, E> {
    pub(crate) state: CallState<T, E>,
    /// Version of the most recently started fetch.
    pub(crate) version: u64,
    pub(crate) in_flight: Option<u64>,
    /// Block epoch at which the last fetch started.
    pub(crate) fetched_epoch: Option<u64>,
    pub(crate) subscribers: Vec<Subscriber<T, E>>,
    /// Most recently supplied fetcher, re-run on invalidation.
    pub(crate) fetcher: Option<Fetcher<T, E>>,
}

impl<T: Clone, E: Clone> CallEntry<T, E> {
    fn new() -> Self {
        Self {
            state: CallState::default(),
            version: 0,
            in_flight: None,
            fetched_epoch: None,
            subscribers: Vec::new(),
            fetcher: None,
        }
    }

    pub(crate) fn subscriber_count(&self) -> usize {
        self.subscribers.len()
    }

    /// Never fetched, or last fetched before the given block epoch.
    pub(crate) fn is_stale(&self, epoch: u64) -> bool {
        self.fetched_epoch != Some(epoch)
    }

    pub(crate) fn notify(&self) {
        for subscriber in &self.subscribers {
            subscriber.send(self.state.clone());
        }
    }

    fn is_idle(&self) -> bool {
        self.subscribers.is_empty() && self.in_flight.is_none()
    }
}

/// Owns every entry. Entries that are observed or have a fetch in flight
/// live in `active` and are never evicted; the rest sit in `idle` where the
/// capacity and time-to-idle bounds may drop them.
pub(crate) struct CallStore<T, E> {
    active: HashMap<CacheKey, CallEntry<T, E>>,
    idle: Cache<CacheKey, CallEntry<T, E>>,
    last_version: u64,
}

impl<T, E> CallStore<T, E>
where
    T: Clone + Send + Sync + 'static,
    E: Clone + Send + Sync + 'static,
{
    pub(crate) fn new(idle_capacity: u64, idle_ttl: Duration) -> Self {
        let idle = Cache::builder()
            .max_capacity(idle_capacity)
            .time_to_idle(idle_ttl)
            .build();

        Self {
            active: HashMap::new(),
            idle,
            last_version: 0,
        }
    }

    /// Returns the entry for `key`, reviving it from the idle store or
    /// allocating a fresh one.
    pub(crate) fn get_or_create(&mut self, key: &CacheKey) -> &mut CallEntry<T, E> {
        match self.active.entry(key.clone()) {
            Entry::Occupied(occupied) => occupied.into_mut(),
            Entry::Vacant(vacant) => {
                let entry = match self.idle.remove(key) {
                    Some(entry) => {
                        trace!(key = %key, "reviving idle entry");
                        entry
                    }
                    None => {
                        trace!(key = %key, "creating entry");
                        CallEntry::new()
                    }
                };
                vacant.insert(entry)
            }
        }
    }

    pub(crate) fn get_mut(&mut self, key: &CacheKey) -> Option<&mut CallEntry<T, E>> {
        self.active.get_mut(key)
    }

    pub(crate) fn get(&self, key: &CacheKey) -> Option<CallEntry<T, E>> {
        match self.active.get(key) {
            Some(entry) => Some(entry.clone()),
            None => self.idle.get(key),
        }
    }

    pub(crate) fn remove(&mut self, key: &CacheKey) -> Option<CallEntry<T, E>> {
        self.active.remove(key).or_else(|| self.idle.remove(key))
    }

    pub(crate) fn is_active(&self, key: &CacheKey) -> bool {
        self.active.contains_key(key)
    }

    /// Moves the entry to the idle store once nobody observes it and no fetch
    /// is outstanding.
    pub(crate) fn release(&mut self, key: &CacheKey) {
        if !self.active.get(key).is_some_and(CallEntry::is_idle) {
            return;
        }
        if let Some(entry) = self.active.remove(key) {
            trace!(key = %key, "entry is now idle");
            self.idle.insert(key.clone(), entry);
        }
    }

    /// Versions are unique across the whole store, so an entry re-created
    /// after eviction can never match a completion meant for its predecessor.
    pub(crate) fn next_version(&mut self) -> u64 {
        self.last_version += 1;
        self.last_version
    }

    pub(crate) fn subscribed_keys(&self) -> Vec<CacheKey> {
        self.active
            .iter()
            .filter(|(_, entry)| entry.subscriber_count() > 0)
            .map(|(key, _)| key.clone())
            .collect()
    }

    pub(crate) fn active(&self) -> impl Iterator<Item = (&CacheKey, &CallEntry<T, E>)> {
        self.active.iter()
    }

    pub(crate) fn idle(&self) -> Vec<(CacheKey, CallEntry<T, E>)> {
        self.idle
            .iter()
            .map(|(key, entry)| ((*key).clone(), entry))
            .collect()
    }

    pub(crate) fn active_count(&self) -> usize {
        self.active.len()
    }

    pub(crate) fn idle_count(&self) -> u64 {
        self.idle.run_pending_tasks();
        self.idle.entry_count()
    }
}
