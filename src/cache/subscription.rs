use std::pin::Pin;
use std::task::{Context, Poll};

use futures::Stream;
use tokio::sync::mpsc;

use super::key::CacheKey;
use super::store::CallState;

/// The entry-side half of a subscription.
pub(crate) struct Subscriber<T, E> {
    pub(crate) id: u64,
    tx: mpsc::UnboundedSender<CallState<T, E>>,
}

impl<T, E> Clone for Subscriber<T, E> {
    fn clone(&self) -> Self {
        Self {
            id: self.id,
            tx: self.tx.clone(),
        }
    }
}

impl<T, E> Subscriber<T, E> {
    pub(crate) fn new(id: u64, tx: mpsc::UnboundedSender<CallState<T, E>>) -> Self {
        Self { id, tx }
    }

    pub(crate) fn send(&self, state: CallState<T, E>) {
        // A closed receiver means the handle is being dropped and is about to
        // unregister itself.
        let _ = self.tx.send(state);
    }
}

pub(crate) type Release = Box<dyn FnOnce() + Send + Sync>;

/// One consumer's interest in one key.
///
/// Yields every state transition of the key in order, starting with the state
/// it had when the subscription was made. Dropping the handle unsubscribes.
///
/// The queue is unbounded: every block queues two states per observed key,
/// and they stay queued until read. A holder that does not poll the stream
/// should call [`Subscription::latest`] now and then to drain it.
pub struct Subscription<T, E> {
    key: CacheKey,
    rx: mpsc::UnboundedReceiver<CallState<T, E>>,
    release: Option<Release>,
}

impl<T, E> Subscription<T, E> {
    pub(crate) fn new(
        key: CacheKey,
        rx: mpsc::UnboundedReceiver<CallState<T, E>>,
        release: Release,
    ) -> Self {
        Self {
            key,
            rx,
            release: Some(release),
        }
    }

    pub fn key(&self) -> &CacheKey {
        &self.key
    }

    /// Returns the next queued state without waiting.
    pub fn try_next_state(&mut self) -> Option<CallState<T, E>> {
        self.rx.try_recv().ok()
    }

    /// Waits for the next state. Returns `None` once the cache is gone.
    pub async fn next_state(&mut self) -> Option<CallState<T, E>> {
        self.rx.recv().await
    }

    /// Drains everything queued so far and returns the newest state.
    pub fn latest(&mut self) -> Option<CallState<T, E>> {
        let mut latest = None;
        while let Ok(state) = self.rx.try_recv() {
            latest = Some(state);
        }
        latest
    }

    /// Same as dropping the handle.
    pub fn unsubscribe(self) {}
}

impl<T, E> Drop for Subscription<T, E> {
    fn drop(&mut self) {
        if let Some(release) = self.release.take() {
            release();
        }
    }
}

impl<T, E> Unpin for Subscription<T, E> {}

impl<T, E> Stream for Subscription<T, E> {
    type Item = CallState<T, E>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.rx.poll_recv(cx)
    }
}

impl<T, E> std::fmt::Debug for Subscription<T, E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription").field("key", &self.key).finish()
    }
}
