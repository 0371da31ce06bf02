//! Live message feed and its cancellation handle.
//!
//! A [`MessageFeed`] is the pull form of a subscription: an async sequence of
//! full ordered snapshots. The push form drives a feed from a spawned task and
//! hands each snapshot to a callback. Both share a [`SubscriptionHandle`]:
//! - `cancel()` is idempotent and never blocks
//! - once `cancel()` returns, no callback starts and no snapshot is yielded,
//!   even one that was already buffered
//! - `cancel()` may be called from inside any callback, including on another
//!   subscription whose callback is running at the same time

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, Weak};

use dashmap::DashMap;
use futures::StreamExt;
use tokio::sync::Notify;
use tracing::debug;

use crate::chat::conversation::ConversationId;
use crate::common::errors::GearResult;
use crate::store::{Snapshot, SnapshotStream};

/// Callback receiving each snapshot, or the error that ended the feed.
pub type UpdateCallback = Box<dyn FnMut(GearResult<Snapshot>) + Send + 'static>;

/// Registry of live subscriptions, keyed by handle id.
pub(crate) type Registry = Arc<DashMap<u64, Weak<HandleState>>>;

pub(crate) struct HandleState {
    id: u64,
    conversation: ConversationId,
    cancelled: AtomicBool,
    wake: Notify,
    // Only locked to move the callback in or out, never while it runs.
    callback: Mutex<Option<UpdateCallback>>,
    registry: Registry,
}

impl Drop for HandleState {
    fn drop(&mut self) {
        self.registry.remove(&self.id);
    }
}

/// Cancellation handle of one subscription. Clones refer to the same
/// subscription.
#[derive(Clone)]
pub struct SubscriptionHandle {
    state: Arc<HandleState>,
}

impl std::fmt::Debug for SubscriptionHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SubscriptionHandle")
            .field("id", &self.state.id)
            .field("conversation", &self.state.conversation)
            .field("cancelled", &self.is_cancelled())
            .finish_non_exhaustive()
    }
}

impl SubscriptionHandle {
    pub(crate) fn register(
        id: u64,
        conversation: ConversationId,
        callback: Option<UpdateCallback>,
        registry: Registry,
    ) -> Self {
        let state = Arc::new(HandleState {
            id,
            conversation,
            cancelled: AtomicBool::new(false),
            wake: Notify::new(),
            callback: Mutex::new(callback),
            registry: Arc::clone(&registry),
        });
        registry.insert(id, Arc::downgrade(&state));
        Self { state }
    }

    /// Cancel every handle still in `registry`. Returns how many were live.
    pub(crate) fn cancel_registered(registry: &Registry) -> usize {
        let ids: Vec<u64> = registry.iter().map(|entry| *entry.key()).collect();
        ids.into_iter()
            .filter_map(|id| registry.remove(&id))
            .filter_map(|(_, state)| state.upgrade())
            .filter(|state| {
                Self {
                    state: Arc::clone(state),
                }
                .cancel()
            })
            .count()
    }

    /// Subscription id, unique per channel.
    #[must_use]
    pub fn id(&self) -> u64 {
        self.state.id
    }

    /// Conversation this subscription watches.
    #[must_use]
    pub fn conversation(&self) -> &ConversationId {
        &self.state.conversation
    }

    /// Whether `cancel()` has been called.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.state.cancelled.load(Ordering::SeqCst)
    }

    /// Stop delivery. Returns `true` for the call that actually cancelled,
    /// `false` for repeats.
    ///
    /// Does not wait for a callback that is already running on another
    /// thread; that call finishes, and no further call starts.
    pub fn cancel(&self) -> bool {
        let first = !self.state.cancelled.swap(true, Ordering::SeqCst);
        self.state.wake.notify_waiters();
        // Empty while the callback runs; the dispatcher drops it afterwards.
        drop(self.lock_callback().take());

        if first {
            self.retire();
            debug!(
                subscription = self.state.id,
                conversation = %self.state.conversation,
                "Subscription cancelled"
            );
        }
        first
    }

    /// Resolve once the subscription is cancelled.
    pub async fn cancelled(&self) {
        loop {
            let notified = self.state.wake.notified();
            if self.is_cancelled() {
                return;
            }
            notified.await;
        }
    }

    /// Leave the registry without cancelling, once the feed has ended.
    pub(crate) fn retire(&self) {
        self.state.registry.remove(&self.state.id);
    }

    pub(crate) fn dispatch(&self, update: GearResult<Snapshot>) {
        let mut callback = {
            let mut slot = self.lock_callback();
            if self.is_cancelled() {
                return;
            }
            match slot.take() {
                Some(callback) => callback,
                None => return,
            }
        };

        callback(update);

        let mut slot = self.lock_callback();
        if !self.is_cancelled() {
            *slot = Some(callback);
        }
    }

    fn lock_callback(&self) -> MutexGuard<'_, Option<UpdateCallback>> {
        self.state
            .callback
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}

/// Async sequence of full ordered snapshots for one conversation.
pub struct MessageFeed {
    stream: SnapshotStream,
    handle: SubscriptionHandle,
    finished: bool,
}

impl MessageFeed {
    pub(crate) fn new(stream: SnapshotStream, handle: SubscriptionHandle) -> Self {
        Self {
            stream,
            handle,
            finished: false,
        }
    }

    /// Handle controlling this feed.
    #[must_use]
    pub fn handle(&self) -> &SubscriptionHandle {
        &self.handle
    }

    /// Next snapshot.
    ///
    /// Returns `None` once cancelled or once the store stops the query. A
    /// store failure is yielded once as `Err` and ends the feed; it is not
    /// retried. An ended feed no longer counts as an active subscription.
    pub async fn next(&mut self) -> Option<GearResult<Snapshot>> {
        if self.finished || self.handle.is_cancelled() {
            return None;
        }

        let item = tokio::select! {
            biased;
            () = self.handle.cancelled() => None,
            item = self.stream.next() => item,
        };

        // Drop anything that raced with a cancel.
        if self.handle.is_cancelled() {
            self.finished = true;
            return None;
        }

        match item {
            None => {
                self.finish();
                None
            }
            Some(Err(err)) => {
                self.finish();
                Some(Err(err))
            }
            Some(Ok(snapshot)) => Some(Ok(snapshot)),
        }
    }

    fn finish(&mut self) {
        self.finished = true;
        self.handle.retire();
    }

    /// Drive the feed into the handle's callback until it ends.
    pub(crate) async fn pump(mut self) {
        while let Some(update) = self.next().await {
            self.handle.dispatch(update);
        }
        debug!(subscription = self.handle.id(), "Feed ended");
    }
}
