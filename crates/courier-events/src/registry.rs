//! Subscription registry: one cancellable handle per (event type, key).

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::error::{BusError, BusResult};
use crate::event::EventType;
use crate::key::SubscriberKey;

/// Unique id of one subscription instance.
///
/// Re-subscribing under the same key yields a new id, which lets a stale
/// handle tell that the registry slot now belongs to someone else.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriptionId(u64);

impl fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "sub-{}", self.0)
    }
}

/// Cancellation handle stored in the registry.
#[derive(Debug, Clone)]
pub struct SubscriptionHandle {
    id: SubscriptionId,
    token: CancellationToken,
}

impl SubscriptionHandle {
    /// Wrap a cancellation token.
    #[must_use]
    pub fn new(id: SubscriptionId, token: CancellationToken) -> Self {
        Self { id, token }
    }

    /// Id of the subscription this handle controls.
    #[must_use]
    pub fn id(&self) -> SubscriptionId {
        self.id
    }

    /// Cancel the subscription. Idempotent.
    pub fn cancel(&self) {
        self.token.cancel();
    }

    /// Whether the subscription has been cancelled.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }
}

type Slot = (EventType, SubscriberKey);

/// Concurrent map of (event type, key) to live subscription handles.
///
/// Removal and cancellation always go together: a handle that leaves the
/// registry is cancelled, and cancelling through the registry removes it.
#[derive(Default)]
pub struct SubscriptionRegistry {
    entries: DashMap<Slot, SubscriptionHandle>,
    next_id: AtomicU64,
}

impl fmt::Debug for SubscriptionRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SubscriptionRegistry")
            .field("subscription_count", &self.entries.len())
            .finish_non_exhaustive()
    }
}

impl SubscriptionRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate a fresh subscription id.
    pub fn next_id(&self) -> SubscriptionId {
        SubscriptionId(self.next_id.fetch_add(1, Ordering::Relaxed))
    }

    /// Register a handle, refusing to overwrite a live one.
    ///
    /// # Errors
    ///
    /// Returns [`BusError::DuplicateSubscription`] if a handle is already
    /// registered for (`event_type`, `key`).
    pub fn register(
        &self,
        event_type: EventType,
        key: SubscriberKey,
        handle: SubscriptionHandle,
    ) -> BusResult<()> {
        match self.entries.entry((event_type, key)) {
            Entry::Occupied(entry) => Err(BusError::DuplicateSubscription {
                event_type,
                key: entry.key().1.clone(),
            }),
            Entry::Vacant(entry) => {
                entry.insert(handle);
                Ok(())
            },
        }
    }

    /// Register a handle, cancelling whatever held the slot before.
    ///
    /// Returns the id of the replaced subscription, if there was one.
    pub fn replace(
        &self,
        event_type: EventType,
        key: SubscriberKey,
        handle: SubscriptionHandle,
    ) -> Option<SubscriptionId> {
        let previous = self.entries.insert((event_type, key), handle)?;
        previous.cancel();
        Some(previous.id())
    }

    /// Cancel and remove the handle for (`event_type`, `key`).
    ///
    /// Returns `false` if nothing was registered; that is not an error.
    pub fn cancel(&self, event_type: EventType, key: &SubscriberKey) -> bool {
        let Some((_, handle)) = self.entries.remove(&(event_type, key.clone())) else {
            return false;
        };
        handle.cancel();
        debug!(
            event_type = %event_type,
            key = %key,
            subscription_id = %handle.id(),
            "Subscription cancelled"
        );
        true
    }

    /// Cancel and remove the handle only if it is still subscription `id`.
    pub fn cancel_if(&self, event_type: EventType, key: &SubscriberKey, id: SubscriptionId) -> bool {
        let Some((_, handle)) = self
            .entries
            .remove_if(&(event_type, key.clone()), |_, handle| handle.id() == id)
        else {
            return false;
        };
        handle.cancel();
        true
    }

    /// Cancel every subscription held by `key`, across all event types.
    ///
    /// Returns the number of subscriptions cancelled.
    pub fn cancel_all(&self, key: &SubscriberKey) -> usize {
        self.cancel_where(|(_, slot_key)| slot_key == key)
    }

    /// Cancel every subscription for `event_type`.
    ///
    /// Returns the number of subscriptions cancelled.
    pub fn cancel_type(&self, event_type: EventType) -> usize {
        self.cancel_where(|(slot_type, _)| *slot_type == event_type)
    }

    /// Cancel every subscription.
    pub fn cancel_everything(&self) -> usize {
        self.cancel_where(|_| true)
    }

    fn cancel_where(&self, matches: impl Fn(&Slot) -> bool) -> usize {
        // Each slot is checked and removed under its shard lock, so a handle
        // registered into a slot already visited is never touched.
        let mut cancelled: usize = 0;
        self.entries.retain(|slot, handle| {
            if matches(slot) {
                handle.cancel();
                cancelled = cancelled.saturating_add(1);
                false
            } else {
                true
            }
        });
        cancelled
    }

    /// Whether a live handle exists for (`event_type`, `key`).
    #[must_use]
    pub fn contains(&self, event_type: EventType, key: &SubscriberKey) -> bool {
        self.entries.contains_key(&(event_type, key.clone()))
    }

    /// Number of live subscriptions.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether there are no live subscriptions.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct A;
    struct B;

    fn handle(registry: &SubscriptionRegistry) -> SubscriptionHandle {
        SubscriptionHandle::new(registry.next_id(), CancellationToken::new())
    }

    #[test]
    fn test_bulk_cancel_keeps_map_and_tokens_consistent() {
        let registry = std::sync::Arc::new(SubscriptionRegistry::new());
        let event_type = EventType::of::<A>();

        let registered: Vec<SubscriptionHandle> = std::thread::scope(|scope| {
            let workers: Vec<_> = (0..4_u64)
                .map(|worker| {
                    let registry = std::sync::Arc::clone(&registry);
                    scope.spawn(move || {
                        let mut mine = Vec::new();
                        for round in 0..200_u64 {
                            let key =
                                SubscriberKey::Index(worker.wrapping_mul(1000).wrapping_add(round));
                            let fresh = handle(&registry);
                            if registry.register(event_type, key, fresh.clone()).is_ok() {
                                mine.push(fresh);
                            }
                        }
                        mine
                    })
                })
                .collect();

            for _ in 0..50 {
                registry.cancel_type(event_type);
            }

            workers
                .into_iter()
                .flat_map(|worker| worker.join().unwrap())
                .collect()
        });

        let live = registered.iter().filter(|h| !h.is_cancelled()).count();
        assert_eq!(registry.len(), live);
        assert_eq!(registry.cancel_type(event_type), live);
        assert!(registered.iter().all(SubscriptionHandle::is_cancelled));
        assert!(registry.is_empty());
    }

    #[test]
    fn test_register_and_contains() {
        let registry = SubscriptionRegistry::new();
        let key = SubscriberKey::from("x");
        assert!(registry.is_empty());

        registry
            .register(EventType::of::<A>(), key.clone(), handle(&registry))
            .unwrap();

        assert!(registry.contains(EventType::of::<A>(), &key));
        assert!(!registry.contains(EventType::of::<B>(), &key));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_duplicate_is_rejected_and_original_kept() {
        let registry = SubscriptionRegistry::new();
        let key = SubscriberKey::from("x");
        let first = handle(&registry);
        registry
            .register(EventType::of::<A>(), key.clone(), first.clone())
            .unwrap();

        let second = handle(&registry);
        let err = registry
            .register(EventType::of::<A>(), key.clone(), second.clone())
            .unwrap_err();

        assert!(matches!(err, BusError::DuplicateSubscription { .. }));
        assert!(!first.is_cancelled());
        assert!(!second.is_cancelled());
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_same_key_different_types_coexist() {
        let registry = SubscriptionRegistry::new();
        let key = SubscriberKey::from("x");
        registry
            .register(EventType::of::<A>(), key.clone(), handle(&registry))
            .unwrap();
        registry
            .register(EventType::of::<B>(), key, handle(&registry))
            .unwrap();
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn test_cancel_removes_and_cancels() {
        let registry = SubscriptionRegistry::new();
        let key = SubscriberKey::from("x");
        let h = handle(&registry);
        registry
            .register(EventType::of::<A>(), key.clone(), h.clone())
            .unwrap();

        assert!(registry.cancel(EventType::of::<A>(), &key));
        assert!(h.is_cancelled());
        assert!(!registry.contains(EventType::of::<A>(), &key));

        // Absent is a no-op.
        assert!(!registry.cancel(EventType::of::<A>(), &key));
    }

    #[test]
    fn test_cancel_if_ignores_newer_subscription() {
        let registry = SubscriptionRegistry::new();
        let key = SubscriberKey::from("x");
        let stale = handle(&registry);
        let current = handle(&registry);
        registry
            .register(EventType::of::<A>(), key.clone(), current.clone())
            .unwrap();

        assert!(!registry.cancel_if(EventType::of::<A>(), &key, stale.id()));
        assert!(registry.contains(EventType::of::<A>(), &key));
        assert!(!current.is_cancelled());

        assert!(registry.cancel_if(EventType::of::<A>(), &key, current.id()));
        assert!(current.is_cancelled());
    }

    #[test]
    fn test_replace_cancels_previous() {
        let registry = SubscriptionRegistry::new();
        let key = SubscriberKey::from("x");
        let first = handle(&registry);
        let second = handle(&registry);

        assert_eq!(
            registry.replace(EventType::of::<A>(), key.clone(), first.clone()),
            None
        );
        assert_eq!(
            registry.replace(EventType::of::<A>(), key.clone(), second.clone()),
            Some(first.id())
        );
        assert!(first.is_cancelled());
        assert!(!second.is_cancelled());
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_cancel_all_spans_types_for_one_key() {
        let registry = SubscriptionRegistry::new();
        let x = SubscriberKey::from("x");
        let y = SubscriberKey::from("y");
        let xa = handle(&registry);
        let xb = handle(&registry);
        let ya = handle(&registry);
        registry.register(EventType::of::<A>(), x.clone(), xa.clone()).unwrap();
        registry.register(EventType::of::<B>(), x.clone(), xb.clone()).unwrap();
        registry.register(EventType::of::<A>(), y.clone(), ya.clone()).unwrap();

        assert_eq!(registry.cancel_all(&x), 2);
        assert!(xa.is_cancelled() && xb.is_cancelled());
        assert!(!ya.is_cancelled());
        assert!(registry.contains(EventType::of::<A>(), &y));
    }

    #[test]
    fn test_cancel_type() {
        let registry = SubscriptionRegistry::new();
        registry
            .register(EventType::of::<A>(), "x".into(), handle(&registry))
            .unwrap();
        registry
            .register(EventType::of::<A>(), "y".into(), handle(&registry))
            .unwrap();
        registry
            .register(EventType::of::<B>(), "x".into(), handle(&registry))
            .unwrap();

        assert_eq!(registry.cancel_type(EventType::of::<A>()), 2);
        assert_eq!(registry.len(), 1);
        assert_eq!(registry.cancel_everything(), 1);
        assert!(registry.is_empty());
    }

    #[test]
    fn test_ids_are_unique() {
        let registry = SubscriptionRegistry::new();
        let first = registry.next_id();
        let second = registry.next_id();
        assert_ne!(first, second);
    }
}
