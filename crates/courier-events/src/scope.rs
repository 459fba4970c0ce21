//! Scoped subscriptions released together.

use std::future::Future;
use std::sync::Arc;
use tracing::debug;

use crate::bus::EventBus;
use crate::dispatch::JobResult;
use crate::error::BusResult;
use crate::event::Event;
use crate::key::SubscriberKey;
use crate::subscription::{SubscribeOptions, Subscription};

/// Owner of a set of subscriptions that share one key.
///
/// Every subscription made through the scope is registered under the
/// scope's key. Closing or dropping the scope calls
/// [`EventBus::unsubscribe_all`] for that key.
///
/// ```rust
/// use courier_events::{EventBus, SubscribeOptions, SubscriptionScope};
/// use std::sync::Arc;
///
/// struct Tick;
///
/// # #[tokio::main]
/// # async fn main() {
/// let bus = EventBus::new();
/// {
///     let scope = SubscriptionScope::unique(&bus);
///     scope
///         .subscribe::<Tick, _, _>(SubscribeOptions::new(), |_tick: Arc<Tick>| async { Ok(()) })
///         .unwrap();
///     assert_eq!(bus.subscription_count(), 1);
/// }
/// assert_eq!(bus.subscription_count(), 0);
/// # }
/// ```
#[derive(Debug)]
pub struct SubscriptionScope {
    bus: EventBus,
    key: SubscriberKey,
    closed: bool,
}

impl SubscriptionScope {
    /// Scope subscribing as `key`.
    #[must_use]
    pub fn new(bus: &EventBus, key: impl Into<SubscriberKey>) -> Self {
        Self {
            bus: bus.clone(),
            key: key.into(),
            closed: false,
        }
    }

    /// Scope with a freshly generated key.
    #[must_use]
    pub fn unique(bus: &EventBus) -> Self {
        Self::new(bus, SubscriberKey::unique())
    }

    /// Key shared by the scope's subscriptions.
    #[must_use]
    pub fn key(&self) -> &SubscriberKey {
        &self.key
    }

    /// Subscribe under the scope's key.
    ///
    /// # Errors
    ///
    /// Same as [`EventBus::subscribe`].
    pub fn subscribe<T, F, Fut>(
        &self,
        options: SubscribeOptions,
        callback: F,
    ) -> BusResult<Subscription>
    where
        T: Event,
        F: Fn(Arc<T>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = JobResult> + Send + 'static,
    {
        self.bus.subscribe(self.key.clone(), options, callback)
    }

    /// Cancel the scope's subscription to `T`, if any.
    pub fn unsubscribe<T: Event>(&self) -> bool {
        self.bus.unsubscribe::<T>(&self.key)
    }

    /// Cancel every subscription in the scope.
    ///
    /// Returns the number cancelled.
    pub fn close(mut self) -> usize {
        self.release()
    }

    fn release(&mut self) -> usize {
        if self.closed {
            return 0;
        }
        self.closed = true;
        let cancelled = self.bus.unsubscribe_all(&self.key);
        debug!(key = %self.key, cancelled, "Subscription scope released");
        cancelled
    }
}

impl Drop for SubscriptionScope {
    fn drop(&mut self) {
        self.release();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct A;
    struct B;

    fn noop<T>(_event: Arc<T>) -> futures::future::Ready<JobResult> {
        futures::future::ready(Ok(()))
    }

    #[tokio::test]
    async fn test_drop_releases_all_subscriptions() {
        let bus = EventBus::new();
        let key = {
            let scope = SubscriptionScope::new(&bus, "screen");
            scope.subscribe::<A, _, _>(SubscribeOptions::new(), noop).unwrap();
            scope.subscribe::<B, _, _>(SubscribeOptions::new(), noop).unwrap();
            assert_eq!(bus.subscription_count(), 2);
            scope.key().clone()
        };

        assert_eq!(bus.subscription_count(), 0);
        assert!(!bus.is_subscribed::<A>(&key));
    }

    #[tokio::test]
    async fn test_close_reports_count() {
        let bus = EventBus::new();
        let scope = SubscriptionScope::unique(&bus);
        scope.subscribe::<A, _, _>(SubscribeOptions::new(), noop).unwrap();
        assert_eq!(scope.close(), 1);
    }

    #[tokio::test]
    async fn test_scope_leaves_other_keys_alone() {
        let bus = EventBus::new();
        bus.subscribe::<A, _, _>("outsider", SubscribeOptions::new(), noop)
            .unwrap();
        {
            let scope = SubscriptionScope::new(&bus, "inner");
            scope.subscribe::<A, _, _>(SubscribeOptions::new(), noop).unwrap();
            assert!(scope.unsubscribe::<A>());
            assert!(!scope.unsubscribe::<A>());
        }
        assert!(bus.is_subscribed::<A>(&"outsider".into()));
    }
}
