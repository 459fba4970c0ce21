//! Event capture for subscriber tests.

use futures::future::{Ready, ready};
use std::error::Error;
use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::sync::Notify;

/// Result a bus callback returns.
pub type HandlerResult = Result<(), Box<dyn Error + Send + Sync>>;

/// Collects events delivered to a subscriber callback.
///
/// Clones share the same storage, so one clone can be moved into the
/// callback while the test keeps another for assertions.
pub struct EventRecorder<T> {
    events: Arc<Mutex<Vec<Arc<T>>>>,
    notify: Arc<Notify>,
}

impl<T> EventRecorder<T> {
    /// Create an empty recorder.
    #[must_use]
    pub fn new() -> Self {
        Self {
            events: Arc::new(Mutex::new(Vec::new())),
            notify: Arc::new(Notify::new()),
        }
    }

    /// Store one event and wake any waiter.
    pub fn record(&self, event: Arc<T>) {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(event);
        self.notify.notify_waiters();
    }

    /// Number of recorded events.
    #[must_use]
    pub fn len(&self) -> usize {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Whether nothing was recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Copy of the recorded events, in delivery order.
    #[must_use]
    pub fn snapshot(&self) -> Vec<Arc<T>> {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Forget everything recorded so far.
    pub fn clear(&self) {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }

    /// Wait until at least `n` events were recorded.
    ///
    /// Returns `false` if `limit` elapsed first.
    pub async fn wait_for_len(&self, n: usize, limit: Duration) -> bool {
        let wait = async {
            loop {
                let notified = self.notify.notified();
                tokio::pin!(notified);
                notified.as_mut().enable();
                if self.len() >= n {
                    return;
                }
                notified.await;
            }
        };
        tokio::time::timeout(limit, wait).await.is_ok()
    }
}

impl<T: Send + Sync + 'static> EventRecorder<T> {
    /// Callback that records every event it receives.
    #[must_use]
    pub fn handler(
        &self,
    ) -> impl Fn(Arc<T>) -> Ready<HandlerResult> + Send + Sync + 'static + use<T> {
        let recorder = self.clone();
        move |event: Arc<T>| {
            recorder.record(event);
            ready(Ok(()))
        }
    }
}

impl<T: Clone> EventRecorder<T> {
    /// Recorded events as owned values.
    #[must_use]
    pub fn values(&self) -> Vec<T> {
        self.snapshot().iter().map(|event| (**event).clone()).collect()
    }
}

impl<T> Clone for EventRecorder<T> {
    fn clone(&self) -> Self {
        Self {
            events: Arc::clone(&self.events),
            notify: Arc::clone(&self.notify),
        }
    }
}

impl<T> Default for EventRecorder<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> fmt::Debug for EventRecorder<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventRecorder")
            .field("len", &self.len())
            .finish()
    }
}

/// A fresh recorder together with a callback feeding it.
#[must_use]
pub fn recording_handler<T: Send + Sync + 'static>() -> (
    EventRecorder<T>,
    impl Fn(Arc<T>) -> Ready<HandlerResult> + Send + Sync + 'static,
) {
    let recorder = EventRecorder::new();
    let handler = recorder.handler();
    (recorder, handler)
}

/// Callback that records the event, then fails with `message`.
#[must_use]
pub fn failing_handler<T: Send + Sync + 'static>(
    recorder: &EventRecorder<T>,
    message: &'static str,
) -> impl Fn(Arc<T>) -> Ready<HandlerResult> + Send + Sync + 'static + use<T> {
    let recorder = recorder.clone();
    move |event: Arc<T>| {
        recorder.record(event);
        ready(Err(message.into()))
    }
}
