//! Lifecycle-driven subscriptions.
//!
//! A host component (a screen, a session, a plugin) reports its lifecycle
//! transitions to a [`LifecycleBinding`], which subscribes when the component
//! becomes active and unsubscribes when it becomes inactive. The binding
//! knows nothing about the host beyond the [`LifecycleEvent`]s it is fed.

use std::fmt;
use std::future::Future;
use std::sync::Arc;
use tracing::{debug, trace};

use crate::bus::{Callback, EventBus};
use crate::dispatch::{Job, JobResult};
use crate::error::BusResult;
use crate::event::{Event, EventType};
use crate::key::SubscriberKey;
use crate::subscription::{SubscribeOptions, Subscription};

/// Lifecycle transitions reported by a host component.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LifecycleEvent {
    /// The component was created.
    Created,
    /// The component became visible.
    Started,
    /// The component gained focus.
    Resumed,
    /// The component lost focus.
    Paused,
    /// The component is no longer visible.
    Stopped,
    /// The component was destroyed. Terminal.
    Destroyed,
}

/// What a binding did in response to a lifecycle event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    /// A subscription was created.
    Subscribed,
    /// The binding's subscription was cancelled.
    Unsubscribed,
    /// The binding was destroyed and ignores all further events.
    Detached,
    /// Nothing to do.
    Ignored,
}

/// Subscription of `T` tied to a host component's lifecycle.
///
/// By default it subscribes on [`LifecycleEvent::Created`] and unsubscribes
/// on [`LifecycleEvent::Destroyed`]. [`LifecycleEvent::Destroyed`] always
/// detaches the binding, whatever the configured pair.
pub struct LifecycleBinding<T: Event> {
    bus: EventBus,
    key: SubscriberKey,
    options: SubscribeOptions,
    callback: Callback<T>,
    activate_on: LifecycleEvent,
    deactivate_on: LifecycleEvent,
    current: Option<Subscription>,
    detached: bool,
}

impl<T: Event> LifecycleBinding<T> {
    /// Binding subscribing `key` with `callback`.
    pub fn new<F, Fut>(bus: &EventBus, key: impl Into<SubscriberKey>, callback: F) -> Self
    where
        F: Fn(Arc<T>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = JobResult> + Send + 'static,
    {
        Self {
            bus: bus.clone(),
            key: key.into(),
            options: SubscribeOptions::new(),
            callback: Arc::new(move |event: Arc<T>| Box::pin(callback(event)) as Job),
            activate_on: LifecycleEvent::Created,
            deactivate_on: LifecycleEvent::Destroyed,
            current: None,
            detached: false,
        }
    }

    /// Options used for every subscription the binding makes.
    #[must_use]
    pub fn with_options(mut self, options: SubscribeOptions) -> Self {
        self.options = options;
        self
    }

    /// Event that triggers subscribing.
    #[must_use]
    pub fn activate_on(mut self, event: LifecycleEvent) -> Self {
        self.activate_on = event;
        self
    }

    /// Event that triggers unsubscribing.
    #[must_use]
    pub fn deactivate_on(mut self, event: LifecycleEvent) -> Self {
        self.deactivate_on = event;
        self
    }

    /// Key the binding subscribes under.
    #[must_use]
    pub fn key(&self) -> &SubscriberKey {
        &self.key
    }

    /// Whether the binding currently holds an active subscription.
    #[must_use]
    pub fn is_subscribed(&self) -> bool {
        self.current.as_ref().is_some_and(Subscription::is_active)
    }

    /// Whether the binding has seen [`LifecycleEvent::Destroyed`].
    #[must_use]
    pub fn is_detached(&self) -> bool {
        self.detached
    }

    /// Feed one lifecycle transition to the binding.
    ///
    /// # Errors
    ///
    /// Returns the error of [`EventBus::subscribe`] when the activation event
    /// cannot subscribe (for example, because `key` already holds a
    /// subscription to `T` registered elsewhere).
    pub fn handle(&mut self, event: LifecycleEvent) -> BusResult<Transition> {
        if self.detached {
            trace!(key = %self.key, ?event, "Lifecycle binding already detached");
            return Ok(Transition::Ignored);
        }

        if event == LifecycleEvent::Destroyed {
            self.release();
            self.detached = true;
            debug!(
                event_type = %EventType::of::<T>(),
                key = %self.key,
                "Lifecycle binding detached"
            );
            return Ok(Transition::Detached);
        }

        if event == self.activate_on {
            if self.is_subscribed() {
                return Ok(Transition::Ignored);
            }
            let subscription = self.bus.subscribe_callback(
                self.key.clone(),
                self.options.clone(),
                Arc::clone(&self.callback),
            )?;
            self.current = Some(subscription);
            return Ok(Transition::Subscribed);
        }

        if event == self.deactivate_on && self.release() {
            return Ok(Transition::Unsubscribed);
        }

        Ok(Transition::Ignored)
    }

    fn release(&mut self) -> bool {
        match self.current.take() {
            Some(subscription) if subscription.is_active() => {
                subscription.cancel();
                true
            },
            _ => false,
        }
    }
}

impl<T: Event> fmt::Debug for LifecycleBinding<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LifecycleBinding")
            .field("event_type", &EventType::of::<T>())
            .field("key", &self.key)
            .field("activate_on", &self.activate_on)
            .field("deactivate_on", &self.deactivate_on)
            .field("subscribed", &self.is_subscribed())
            .field("detached", &self.detached)
            .finish_non_exhaustive()
    }
}
