//! Per-type broadcast channel backed by a replay buffer.
//!
//! ```text
//! enqueue(event) ──► [pending] ──► flush()
//!                                    │   (pending lock, then topic lock)
//!     ├──► replay buffer (last R events)
//!     ├──► [feed 1 backlog] ──► listener 1
//!     ├──► [feed 2 backlog] ──► listener 2
//!     └──► [feed N backlog] ──► listener N
//! ```
//!
//! Each feed owns an unbounded backlog, so a slow listener never holds up
//! injection or its siblings. Attaching takes the same lock as injecting:
//! a sticky feed sees the replay snapshot followed by every later event with
//! no gap and no duplicate.
//!
//! Posts reach the topic through the pending queue. Whoever flushes it
//! injects everything queued so far, oldest first, so injection order is
//! enqueue order no matter which task ends up doing the flush.

use std::any::Any;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use tokio::sync::mpsc;
use tracing::trace;

use crate::event::{Event, EventType};
use crate::replay::ReplayBuffer;

/// Identifier of one attached feed within its topic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) struct FeedId(u64);

struct Listener<T> {
    id: FeedId,
    sender: mpsc::UnboundedSender<Arc<T>>,
}

struct TopicState<T> {
    replay: ReplayBuffer<Arc<T>>,
    listeners: Vec<Listener<T>>,
    closed: bool,
}

/// Broadcast channel for one event type.
pub(crate) struct Topic<T> {
    event_type: EventType,
    state: Mutex<TopicState<T>>,
    pending: Mutex<VecDeque<Arc<T>>>,
    next_feed: AtomicU64,
}

impl<T: Event> Topic<T> {
    pub(crate) fn new(replay_capacity: usize) -> Self {
        Self {
            event_type: EventType::of::<T>(),
            state: Mutex::new(TopicState {
                replay: ReplayBuffer::new(replay_capacity),
                listeners: Vec::new(),
                closed: false,
            }),
            pending: Mutex::new(VecDeque::new()),
            next_feed: AtomicU64::new(0),
        }
    }

    // No user code runs under this lock, so a poisoned guard is still consistent.
    fn state(&self) -> MutexGuard<'_, TopicState<T>> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn pending(&self) -> MutexGuard<'_, VecDeque<Arc<T>>> {
        self.pending.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Queue an event for the next [`Self::flush`].
    pub(crate) fn enqueue(&self, event: Arc<T>) {
        self.pending().push_back(event);
    }

    /// Inject every queued event, oldest first.
    ///
    /// Returns the number of events injected by this call; a concurrent
    /// flush may already have taken them.
    pub(crate) fn flush(&self) -> usize {
        let mut pending = self.pending();
        let mut flushed = 0_usize;
        while let Some(event) = pending.pop_front() {
            self.inject(event);
            flushed = flushed.saturating_add(1);
        }
        flushed
    }

    /// Inject `event` right away, after anything still queued.
    ///
    /// Returns the number of feeds that accepted `event`.
    pub(crate) fn inject_next(&self, event: Arc<T>) -> usize {
        let mut pending = self.pending();
        while let Some(queued) = pending.pop_front() {
            self.inject(queued);
        }
        self.inject(event)
    }

    /// Take a queued event back out. `false` if it was already injected.
    pub(crate) fn withdraw(&self, event: &Arc<T>) -> bool {
        let mut pending = self.pending();
        match pending.iter().position(|queued| Arc::ptr_eq(queued, event)) {
            Some(index) => pending.remove(index).is_some(),
            None => false,
        }
    }

    /// Buffer the event and hand it to every attached feed.
    ///
    /// Returns the number of feeds that accepted the event. Feeds whose
    /// receiving side is gone are pruned on the way.
    pub(crate) fn inject(&self, event: Arc<T>) -> usize {
        let mut state = self.state();
        if state.closed {
            trace!(event_type = %self.event_type, "Dropping event for cleared topic");
            return 0;
        }

        state.replay.append(Arc::clone(&event));
        state
            .listeners
            .retain(|listener| listener.sender.send(Arc::clone(&event)).is_ok());

        let receivers = state.listeners.len();
        trace!(event_type = %self.event_type, receivers, "Event injected");
        receivers
    }

    /// Attach a new feed.
    ///
    /// A sticky feed starts with the buffered history (oldest first); a
    /// non-sticky feed only sees events injected after this call. Attaching
    /// to a cleared topic yields a feed that is already finished.
    pub(crate) fn attach(self: &Arc<Self>, sticky: bool) -> Feed<T> {
        let id = FeedId(self.next_feed.fetch_add(1, Ordering::Relaxed));
        let (sender, receiver) = mpsc::unbounded_channel();

        let mut state = self.state();
        if !state.closed {
            if sticky {
                for event in state.replay.iter() {
                    // The receiver is still in hand, so this cannot fail.
                    let _ = sender.send(Arc::clone(event));
                }
            }
            state.listeners.push(Listener { id, sender });
        }
        drop(state);

        Feed {
            id,
            receiver,
            topic: Arc::downgrade(self),
        }
    }

    /// Stop delivering to a feed and release its backlog.
    pub(crate) fn detach(&self, id: FeedId) {
        self.state().listeners.retain(|listener| listener.id != id);
    }

    /// Copy of the replay buffer, oldest first.
    pub(crate) fn replayed(&self) -> Vec<Arc<T>> {
        self.state().replay.snapshot()
    }
}

/// Lazy, unbounded sequence of events for one subscription.
///
/// Dropping the feed detaches it from its topic.
pub(crate) struct Feed<T: Event> {
    id: FeedId,
    receiver: mpsc::UnboundedReceiver<Arc<T>>,
    topic: Weak<Topic<T>>,
}

impl<T: Event> Feed<T> {
    /// Next event, or `None` once the topic was cleared or dropped.
    pub(crate) async fn recv(&mut self) -> Option<Arc<T>> {
        self.receiver.recv().await
    }

    #[cfg(test)]
    fn try_recv(&mut self) -> Option<Arc<T>> {
        self.receiver.try_recv().ok()
    }
}

impl<T: Event> Drop for Feed<T> {
    fn drop(&mut self) {
        if let Some(topic) = self.topic.upgrade() {
            topic.detach(self.id);
        }
    }
}

/// Type-erased view of a [`Topic`] so topics of every type share one map.
pub(crate) trait ErasedTopic: Send + Sync {
    fn event_type(&self) -> EventType;

    fn replay_capacity(&self) -> usize;

    fn listener_count(&self) -> usize;

    /// Detach every feed, drop the history and refuse further injections.
    fn close(&self);

    fn into_any(self: Arc<Self>) -> Arc<dyn Any + Send + Sync>;
}

impl<T: Event> ErasedTopic for Topic<T> {
    fn event_type(&self) -> EventType {
        self.event_type
    }

    fn replay_capacity(&self) -> usize {
        self.state().replay.capacity()
    }

    fn listener_count(&self) -> usize {
        self.state().listeners.len()
    }

    fn close(&self) {
        self.pending().clear();
        let mut state = self.state();
        state.closed = true;
        state.listeners.clear();
        state.replay.clear();
    }

    fn into_any(self: Arc<Self>) -> Arc<dyn Any + Send + Sync> {
        self
    }
}
