//! Event bus façade: typed posting, keyed subscriptions, sticky replay.
//!
//! ```text
//! post(event) ──► post context ──► Topic<T>::inject ──┬──► replay buffer
//!                                                     ├──► feed 1 ──► listener 1 ──► callback context
//!                                                     └──► feed N ──► listener N ──► callback context
//! ```
//!
//! One [`Topic`] exists per payload type and is created lazily by the first
//! call that needs it. Each subscription owns a listener task that reads its
//! feed and hands every event to a [`DispatchContext`], waiting for the
//! callback to finish before taking the next one (FIFO per subscription).

use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::sync::Arc;
use tokio::runtime::Handle;
use tracing::{debug, error, trace, warn};

use crate::dispatch::{DispatchContext, Job, JobResult, SerialContext, TokioContext};
use crate::error::{BusError, BusResult};
use crate::event::{Event, EventType};
use crate::key::SubscriberKey;
use crate::registry::{SubscriptionHandle, SubscriptionRegistry};
use crate::subscription::{DuplicatePolicy, PostOptions, SubscribeOptions, Subscription};
use crate::topic::{ErasedTopic, Feed, Topic};

/// Default replay capacity for topics created without an explicit one.
pub const DEFAULT_REPLAY_CAPACITY: usize = 1;

/// Default thread name for a serial callback context.
pub const DEFAULT_SERIAL_THREAD_NAME: &str = "courier-serial";

/// Shared form of a subscriber callback.
pub(crate) type Callback<T> = Arc<dyn Fn(Arc<T>) -> Job + Send + Sync>;

/// Where callbacks run when a subscription does not pick a context.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CallbackContext {
    /// Tokio worker pool.
    #[default]
    Background,
    /// One dedicated thread, jobs run one at a time.
    Serial,
}

/// Bus-wide defaults.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BusSettings {
    /// Replay capacity for topics created without an explicit capacity.
    pub default_replay_capacity: usize,
    /// Behaviour on a second subscribe for a taken (type, key) slot.
    pub duplicate_policy: DuplicatePolicy,
    /// Default context for callbacks.
    pub callback_context: CallbackContext,
    /// Thread name used when `callback_context` is `Serial`.
    pub serial_thread_name: String,
}

impl Default for BusSettings {
    fn default() -> Self {
        Self {
            default_replay_capacity: DEFAULT_REPLAY_CAPACITY,
            duplicate_policy: DuplicatePolicy::Reject,
            callback_context: CallbackContext::Background,
            serial_thread_name: DEFAULT_SERIAL_THREAD_NAME.to_owned(),
        }
    }
}

struct BusInner {
    topics: DashMap<EventType, Arc<dyn ErasedTopic>>,
    registry: Arc<SubscriptionRegistry>,
    settings: BusSettings,
    post_context: Arc<dyn DispatchContext>,
    callback_context: Arc<dyn DispatchContext>,
    runtime: Option<Handle>,
}

/// Typed publish/subscribe bus.
///
/// Cloning is cheap and every clone shares the same topics and
/// subscriptions; pass the bus explicitly to whoever needs it.
///
/// Subscriber callbacks capturing a clone of the bus keep it alive for as
/// long as their subscription lives. Cancel those subscriptions (or clear
/// the bus) when tearing down.
#[derive(Clone)]
pub struct EventBus {
    inner: Arc<BusInner>,
}

impl EventBus {
    /// Bus with default settings and the ambient tokio runtime.
    #[must_use]
    pub fn new() -> Self {
        let settings = BusSettings::default();
        let background: Arc<dyn DispatchContext> = Arc::new(TokioContext::current());
        Self::from_parts(settings, Arc::clone(&background), background, None)
    }

    /// Start configuring a bus.
    #[must_use]
    pub fn builder() -> EventBusBuilder {
        EventBusBuilder::new()
    }

    fn from_parts(
        settings: BusSettings,
        post_context: Arc<dyn DispatchContext>,
        callback_context: Arc<dyn DispatchContext>,
        runtime: Option<Handle>,
    ) -> Self {
        Self {
            inner: Arc::new(BusInner {
                topics: DashMap::new(),
                registry: Arc::new(SubscriptionRegistry::new()),
                settings,
                post_context,
                callback_context,
                runtime,
            }),
        }
    }

    /// Bus-wide defaults in effect.
    #[must_use]
    pub fn settings(&self) -> &BusSettings {
        &self.inner.settings
    }

    /// Post an event without waiting for delivery.
    ///
    /// The event is queued on its topic right away and injected on the bus's
    /// post context; subscriber callbacks never run on the caller's stack.
    /// Events of one type are injected in the order they were posted.
    /// Posting to a type nobody listens to only fills its replay buffer.
    pub fn post<T: Event>(&self, event: T) {
        self.post_with(event, PostOptions::default());
    }

    /// Post with an explicit replay capacity and/or injection context.
    pub fn post_with<T: Event>(&self, event: T, options: PostOptions) {
        let event_type = EventType::of::<T>();
        let topic = match self.topic::<T>(options.replay_capacity) {
            Ok(topic) => topic,
            Err(err) => {
                error!(event_type = %event_type, error = %err, "Dropping posted event");
                return;
            },
        };

        let context = options
            .context
            .unwrap_or_else(|| Arc::clone(&self.inner.post_context));
        let event = Arc::new(event);
        topic.enqueue(Arc::clone(&event));
        let flusher = Arc::clone(&topic);
        let job: Job = Box::pin(async move {
            flusher.flush();
            Ok(())
        });

        // Fire and forget: the completion future is dropped, the job keeps running.
        if let Err(err) = context.submit(job) {
            // A flush triggered by another post may already have injected it.
            if topic.withdraw(&event) {
                warn!(
                    event_type = %event_type,
                    context = context.name(),
                    error = %err,
                    "Post context rejected event; event dropped"
                );
            }
        }
    }

    /// Inject an event on the caller's thread.
    ///
    /// Events still queued by earlier [`post`](Self::post) calls are injected
    /// first. Returns the number of subscriptions the event was queued for.
    /// Only the hand-off happens here; callbacks still run on their own
    /// contexts.
    pub fn post_now<T: Event>(&self, event: T) -> usize {
        match self.topic::<T>(None) {
            Ok(topic) => topic.inject_next(Arc::new(event)),
            Err(err) => {
                error!(event_type = %EventType::of::<T>(), error = %err, "Dropping posted event");
                0
            },
        }
    }

    /// Create the topic for `T` with a given replay capacity.
    ///
    /// Returns `false` if the topic already existed, in which case its
    /// capacity is unchanged.
    pub fn declare<T: Event>(&self, replay_capacity: usize) -> bool {
        let mut created = false;
        self.inner.topics.entry(EventType::of::<T>()).or_insert_with(|| {
            created = true;
            Self::new_topic::<T>(replay_capacity)
        });
        created
    }

    /// Subscribe `key` to events of type `T`.
    ///
    /// Registration is synchronous; events are delivered on a listener task
    /// and the callback runs on the subscription's dispatch context. A
    /// callback that returns an error or panics ends its own subscription
    /// only.
    ///
    /// # Errors
    ///
    /// - [`BusError::DuplicateSubscription`] if `key` already holds a live
    ///   subscription for `T` and the duplicate policy is `Reject`.
    /// - [`BusError::NoRuntime`] if no tokio runtime is available for the
    ///   listener task.
    pub fn subscribe<T, F, Fut>(
        &self,
        key: impl Into<SubscriberKey>,
        options: SubscribeOptions,
        callback: F,
    ) -> BusResult<Subscription>
    where
        T: Event,
        F: Fn(Arc<T>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = JobResult> + Send + 'static,
    {
        let callback: Callback<T> = Arc::new(move |event: Arc<T>| Box::pin(callback(event)) as Job);
        self.subscribe_callback(key.into(), options, callback)
    }

    pub(crate) fn subscribe_callback<T: Event>(
        &self,
        key: SubscriberKey,
        options: SubscribeOptions,
        callback: Callback<T>,
    ) -> BusResult<Subscription> {
        let event_type = EventType::of::<T>();
        let runtime = self.runtime()?;
        let topic = self.topic::<T>(options.replay_capacity)?;
        let registry = &self.inner.registry;

        let id = registry.next_id();
        let subscription = Subscription::new(
            id,
            event_type,
            key.clone(),
            tokio_util::sync::CancellationToken::new(),
            registry,
        );
        let handle = SubscriptionHandle::new(id, subscription.token().clone());

        let policy = options
            .duplicate_policy
            .unwrap_or(self.inner.settings.duplicate_policy);
        match policy {
            DuplicatePolicy::Reject => registry.register(event_type, key.clone(), handle)?,
            DuplicatePolicy::Replace => {
                if let Some(previous) = registry.replace(event_type, key.clone(), handle) {
                    debug!(
                        event_type = %event_type,
                        key = %key,
                        replaced = %previous,
                        "Replaced existing subscription"
                    );
                }
            },
        }

        let feed = topic.attach(options.sticky);
        let context = options
            .context
            .unwrap_or_else(|| Arc::clone(&self.inner.callback_context));

        debug!(
            event_type = %event_type,
            key = %key,
            subscription_id = %id,
            sticky = options.sticky,
            context = context.name(),
            "Subscribed"
        );

        runtime.spawn(listen(feed, subscription.clone(), callback, context));
        Ok(subscription)
    }

    /// Cancel `key`'s subscription to `T`. No-op if there is none.
    ///
    /// Returns whether a subscription was cancelled.
    pub fn unsubscribe<T: Event>(&self, key: &SubscriberKey) -> bool {
        self.inner.registry.cancel(EventType::of::<T>(), key)
    }

    /// Cancel every subscription held by `key`, across all event types.
    ///
    /// Returns the number of subscriptions cancelled.
    pub fn unsubscribe_all(&self, key: &SubscriberKey) -> usize {
        let cancelled = self.inner.registry.cancel_all(key);
        debug!(key = %key, cancelled, "Unsubscribed from all event types");
        cancelled
    }

    /// Whether `key` holds a live subscription to `T`.
    #[must_use]
    pub fn is_subscribed<T: Event>(&self, key: &SubscriberKey) -> bool {
        self.inner.registry.contains(EventType::of::<T>(), key)
    }

    /// Cancel every subscription to `T` and drop its topic and history.
    ///
    /// The next post or subscribe for `T` starts from a fresh topic.
    /// Returns the number of subscriptions cancelled.
    pub fn clear_event_type<T: Event>(&self) -> usize {
        self.clear_type(EventType::of::<T>())
    }

    fn clear_type(&self, event_type: EventType) -> usize {
        let cancelled = self.inner.registry.cancel_type(event_type);
        if let Some((_, topic)) = self.inner.topics.remove(&event_type) {
            topic.close();
        }
        debug!(event_type = %event_type, cancelled, "Event type cleared");
        cancelled
    }

    /// Clear every event type.
    pub fn clear(&self) {
        let event_types: Vec<EventType> = self
            .inner
            .topics
            .iter()
            .map(|entry| entry.value().event_type())
            .collect();
        for event_type in event_types {
            self.clear_type(event_type);
        }
        // Subscriptions can outlive a topic that was cleared concurrently.
        self.inner.registry.cancel_everything();
    }

    /// Number of live topics.
    #[must_use]
    pub fn topic_count(&self) -> usize {
        self.inner.topics.len()
    }

    /// Number of live subscriptions across all types.
    #[must_use]
    pub fn subscription_count(&self) -> usize {
        self.inner.registry.len()
    }

    /// Number of feeds attached to the topic for `T`.
    #[must_use]
    pub fn subscriber_count<T: Event>(&self) -> usize {
        self.inner
            .topics
            .get(&EventType::of::<T>())
            .map_or(0, |topic| topic.listener_count())
    }

    /// Replay capacity of the topic for `T`, if it exists.
    #[must_use]
    pub fn replay_capacity<T: Event>(&self) -> Option<usize> {
        self.inner
            .topics
            .get(&EventType::of::<T>())
            .map(|topic| topic.replay_capacity())
    }

    /// Events currently buffered for `T`, oldest first.
    #[must_use]
    pub fn replayed<T: Event>(&self) -> Vec<Arc<T>> {
        let Some(topic) = self
            .inner
            .topics
            .get(&EventType::of::<T>())
            .map(|entry| Arc::clone(entry.value()))
        else {
            return Vec::new();
        };
        topic
            .into_any()
            .downcast::<Topic<T>>()
            .map(|topic| topic.replayed())
            .unwrap_or_default()
    }

    fn runtime(&self) -> BusResult<Handle> {
        match &self.inner.runtime {
            Some(handle) => Ok(handle.clone()),
            None => Handle::try_current().map_err(|_| BusError::NoRuntime),
        }
    }

    fn new_topic<T: Event>(replay_capacity: usize) -> Arc<dyn ErasedTopic> {
        debug!(event_type = %EventType::of::<T>(), replay_capacity, "Topic created");
        Arc::new(Topic::<T>::new(replay_capacity))
    }

    /// Resolve or create the topic for `T`.
    fn topic<T: Event>(&self, replay_capacity: Option<usize>) -> BusResult<Arc<Topic<T>>> {
        let event_type = EventType::of::<T>();
        let erased = {
            let entry = self.inner.topics.entry(event_type).or_insert_with(|| {
                Self::new_topic::<T>(
                    replay_capacity.unwrap_or(self.inner.settings.default_replay_capacity),
                )
            });
            Arc::clone(entry.value())
        };

        if let Some(requested) = replay_capacity {
            let fixed = erased.replay_capacity();
            if requested != fixed {
                trace!(
                    event_type = %event_type,
                    requested,
                    fixed,
                    "Ignoring replay capacity; topic already exists"
                );
            }
        }

        erased
            .into_any()
            .downcast::<Topic<T>>()
            .map_err(|_| BusError::TopicTypeMismatch(event_type))
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBus")
            .field("topics", &self.inner.topics.len())
            .field("registry", &self.inner.registry)
            .field("settings", &self.inner.settings)
            .field("post_context", &self.inner.post_context.name())
            .field("callback_context", &self.inner.callback_context.name())
            .finish()
    }
}

/// Listener task for one subscription.
async fn listen<T: Event>(
    mut feed: Feed<T>,
    subscription: Subscription,
    callback: Callback<T>,
    context: Arc<dyn DispatchContext>,
) {
    let token = subscription.token().clone();
    loop {
        let event = tokio::select! {
            biased;
            () = token.cancelled() => break,
            next = feed.recv() => match next {
                Some(event) => event,
                None => {
                    trace!(
                        event_type = %subscription.event_type(),
                        key = %subscription.key(),
                        "Topic closed"
                    );
                    break;
                },
            },
        };

        // An unsubscribe may have landed while the event was in flight.
        if token.is_cancelled() {
            break;
        }

        // The whole callback, synchronous part included, runs on the context.
        let invoke = Arc::clone(&callback);
        let job: Job = Box::pin(async move { invoke(event).await });
        let completion = match context.submit(job) {
            Ok(completion) => completion,
            Err(err) => {
                warn!(
                    event_type = %subscription.event_type(),
                    key = %subscription.key(),
                    context = context.name(),
                    error = %err,
                    "Callback context rejected event; cancelling subscription"
                );
                break;
            },
        };

        // A callback already running may finish after cancellation; no new one starts.
        let outcome = tokio::select! {
            biased;
            () = token.cancelled() => break,
            outcome = completion => outcome,
        };

        if let Err(err) = outcome {
            warn!(
                event_type = %subscription.event_type(),
                key = %subscription.key(),
                subscription_id = %subscription.id(),
                error = %err,
                "Subscriber callback failed; cancelling subscription"
            );
            break;
        }
    }

    subscription.cancel();
    drop(feed);
    trace!(subscription_id = %subscription.id(), "Listener exited");
}

/// Builder for an [`EventBus`].
#[derive(Debug, Default)]
pub struct EventBusBuilder {
    settings: BusSettings,
    post_context: Option<Arc<dyn DispatchContext>>,
    callback_context: Option<Arc<dyn DispatchContext>>,
    runtime: Option<Handle>,
}

impl EventBusBuilder {
    /// Builder with default settings.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace all settings at once.
    #[must_use]
    pub fn with_settings(mut self, settings: BusSettings) -> Self {
        self.settings = settings;
        self
    }

    /// Replay capacity for topics created without an explicit one.
    #[must_use]
    pub fn default_replay_capacity(mut self, capacity: usize) -> Self {
        self.settings.default_replay_capacity = capacity;
        self
    }

    /// Bus-wide duplicate policy.
    #[must_use]
    pub fn duplicate_policy(mut self, policy: DuplicatePolicy) -> Self {
        self.settings.duplicate_policy = policy;
        self
    }

    /// Context that runs `post` injections.
    #[must_use]
    pub fn post_context(mut self, context: Arc<dyn DispatchContext>) -> Self {
        self.post_context = Some(context);
        self
    }

    /// Default context for callbacks; overrides `settings.callback_context`.
    #[must_use]
    pub fn callback_context(mut self, context: Arc<dyn DispatchContext>) -> Self {
        self.callback_context = Some(context);
        self
    }

    /// Runtime that hosts listener tasks and the default background context.
    #[must_use]
    pub fn runtime(mut self, handle: Handle) -> Self {
        self.runtime = Some(handle);
        self
    }

    /// Build the bus.
    ///
    /// # Errors
    ///
    /// Returns [`BusError::ContextInit`] if a serial callback context is
    /// requested and its thread cannot be started.
    pub fn build(self) -> BusResult<EventBus> {
        let background: Arc<dyn DispatchContext> = match &self.runtime {
            Some(handle) => Arc::new(TokioContext::with_handle(
                TokioContext::DEFAULT_NAME,
                handle.clone(),
            )),
            None => Arc::new(TokioContext::current()),
        };

        let callback_context = match (self.callback_context, self.settings.callback_context) {
            (Some(context), _) => context,
            (None, CallbackContext::Background) => Arc::clone(&background),
            (None, CallbackContext::Serial) => {
                Arc::new(SerialContext::spawn(self.settings.serial_thread_name.clone())?)
            },
        };
        let post_context = self.post_context.unwrap_or(background);

        Ok(EventBus::from_parts(
            self.settings,
            post_context,
            callback_context,
            self.runtime,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::HandlerError;
    use std::sync::Mutex;
    use std::time::Duration;
    use tokio::sync::mpsc;
    use tokio::time::timeout;

    #[derive(Debug, Clone, PartialEq)]
    struct A(u32);

    #[derive(Debug, Clone, PartialEq)]
    struct B(&'static str);

    const WAIT: Duration = Duration::from_secs(2);

    fn forward<T: Event + Clone>(
        tx: mpsc::UnboundedSender<T>,
    ) -> impl Fn(Arc<T>) -> futures::future::Ready<JobResult> + Send + Sync + 'static {
        move |event: Arc<T>| {
            let _ = tx.send((*event).clone());
            futures::future::ready(Ok(()))
        }
    }

    async fn next<T>(rx: &mut mpsc::UnboundedReceiver<T>) -> T {
        timeout(WAIT, rx.recv()).await.unwrap().unwrap()
    }

    async fn nothing_more<T: std::fmt::Debug>(rx: &mut mpsc::UnboundedReceiver<T>) {
        // A closed channel means the callback (and its sender) was dropped.
        let extra = timeout(Duration::from_millis(100), rx.recv()).await;
        assert!(
            !matches!(extra, Ok(Some(_))),
            "unexpected delivery: {extra:?}"
        );
    }

    #[tokio::test]
    async fn test_bus_creation() {
        let bus = EventBus::new();
        assert_eq!(bus.topic_count(), 0);
        assert_eq!(bus.subscription_count(), 0);
        assert_eq!(bus.settings().default_replay_capacity, DEFAULT_REPLAY_CAPACITY);
    }

    #[tokio::test]
    async fn test_post_then_receive() {
        let bus = EventBus::new();
        let (tx, mut rx) = mpsc::unbounded_channel();
        bus.subscribe::<A, _, _>("x", SubscribeOptions::new(), forward(tx))
            .unwrap();

        bus.post(A(1));
        assert_eq!(next(&mut rx).await, A(1));
    }

    #[tokio::test]
    async fn test_sticky_replays_last_r() {
        let bus = EventBus::new();
        bus.declare::<A>(2);
        for i in 1..=3 {
            bus.post_now(A(i));
        }

        let (tx, mut rx) = mpsc::unbounded_channel();
        bus.subscribe::<A, _, _>("x", SubscribeOptions::new().sticky(), forward(tx))
            .unwrap();
        bus.post_now(A(4));

        assert_eq!(next(&mut rx).await, A(2));
        assert_eq!(next(&mut rx).await, A(3));
        assert_eq!(next(&mut rx).await, A(4));
    }

    #[tokio::test]
    async fn test_non_sticky_skips_history() {
        let bus = EventBus::new();
        bus.post_now(A(1));

        let (tx, mut rx) = mpsc::unbounded_channel();
        bus.subscribe::<A, _, _>("y", SubscribeOptions::new(), forward(tx))
            .unwrap();
        bus.post_now(A(2));

        assert_eq!(next(&mut rx).await, A(2));
        nothing_more(&mut rx).await;
    }

    #[tokio::test]
    async fn test_duplicate_subscription_rejected() {
        let bus = EventBus::new();
        let (tx, _rx) = mpsc::unbounded_channel();
        bus.subscribe::<A, _, _>("y", SubscribeOptions::new(), forward(tx.clone()))
            .unwrap();

        let err = bus
            .subscribe::<A, _, _>("y", SubscribeOptions::new(), forward(tx))
            .unwrap_err();
        assert!(matches!(err, BusError::DuplicateSubscription { .. }));
        assert_eq!(bus.subscription_count(), 1);
    }

    #[tokio::test]
    async fn test_replace_policy_swaps_subscription() {
        let bus = EventBus::new();
        let (old_tx, mut old_rx) = mpsc::unbounded_channel();
        let (new_tx, mut new_rx) = mpsc::unbounded_channel();

        let old = bus
            .subscribe::<A, _, _>("k", SubscribeOptions::new(), forward(old_tx))
            .unwrap();
        let new = bus
            .subscribe::<A, _, _>(
                "k",
                SubscribeOptions::new().replace_existing(),
                forward(new_tx),
            )
            .unwrap();

        assert!(!old.is_active());
        assert!(new.is_active());
        old.cancelled().await;

        bus.post_now(A(7));
        assert_eq!(next(&mut new_rx).await, A(7));
        nothing_more(&mut old_rx).await;
        assert!(bus.is_subscribed::<A>(&"k".into()));
    }

    #[tokio::test]
    async fn test_unsubscribe_stops_delivery() {
        let bus = EventBus::new();
        let key = SubscriberKey::from("x");
        let (tx, mut rx) = mpsc::unbounded_channel();
        let sub = bus
            .subscribe::<A, _, _>(&key, SubscribeOptions::new(), forward(tx))
            .unwrap();

        assert!(bus.unsubscribe::<A>(&key));
        assert!(!bus.is_subscribed::<A>(&key));
        assert!(!bus.unsubscribe::<A>(&key));
        sub.cancelled().await;

        bus.post_now(A(1));
        nothing_more(&mut rx).await;
    }

    #[tokio::test]
    async fn test_unsubscribe_all_spans_types() {
        let bus = EventBus::new();
        let key = SubscriberKey::from("owner");
        let (tx_a, _rx_a) = mpsc::unbounded_channel();
        let (tx_b, _rx_b) = mpsc::unbounded_channel();
        bus.subscribe::<A, _, _>(&key, SubscribeOptions::new(), forward(tx_a))
            .unwrap();
        bus.subscribe::<B, _, _>(&key, SubscribeOptions::new(), forward(tx_b))
            .unwrap();

        assert_eq!(bus.unsubscribe_all(&key), 2);
        assert!(!bus.is_subscribed::<A>(&key));
        assert!(!bus.is_subscribed::<B>(&key));
    }

    #[tokio::test]
    async fn test_types_are_routed_separately() {
        let bus = EventBus::new();
        let (tx, mut rx) = mpsc::unbounded_channel();
        bus.subscribe::<B, _, _>("x", SubscribeOptions::new(), forward(tx))
            .unwrap();

        bus.post_now(A(1));
        bus.post_now(B("hello"));

        assert_eq!(next(&mut rx).await, B("hello"));
        nothing_more(&mut rx).await;
    }

    #[tokio::test]
    async fn test_failing_callback_ends_only_its_subscription() {
        let bus = EventBus::new();
        let failing = bus
            .subscribe::<A, _, _>("bad", SubscribeOptions::new(), |_event: Arc<A>| async {
                Err::<(), HandlerError>("callback failed".into())
            })
            .unwrap();
        let (tx, mut rx) = mpsc::unbounded_channel();
        bus.subscribe::<A, _, _>("good", SubscribeOptions::new(), forward(tx))
            .unwrap();

        bus.post_now(A(1));
        timeout(WAIT, failing.cancelled()).await.unwrap();
        assert!(!bus.is_subscribed::<A>(&"bad".into()));

        bus.post_now(A(2));
        assert_eq!(next(&mut rx).await, A(1));
        assert_eq!(next(&mut rx).await, A(2));
        assert!(bus.is_subscribed::<A>(&"good".into()));
    }

    #[tokio::test]
    async fn test_panicking_callback_is_isolated() {
        let bus = EventBus::new();
        let panicking = bus
            .subscribe::<A, _, _>("bad", SubscribeOptions::new(), |event: Arc<A>| async move {
                assert!(event.0 != 1, "refusing event {}", event.0);
                Ok(())
            })
            .unwrap();

        bus.post_now(A(1));
        timeout(WAIT, panicking.cancelled()).await.unwrap();
        assert!(!bus.is_subscribed::<A>(&"bad".into()));
    }

    #[tokio::test]
    async fn test_clear_event_type_resets_topic() {
        let bus = EventBus::new();
        bus.declare::<A>(4);
        bus.post_now(A(1));
        let (tx, _rx) = mpsc::unbounded_channel();
        let sub = bus
            .subscribe::<A, _, _>("x", SubscribeOptions::new(), forward(tx))
            .unwrap();

        assert_eq!(bus.clear_event_type::<A>(), 1);
        assert!(!bus.is_subscribed::<A>(&"x".into()));
        assert!(bus.replayed::<A>().is_empty());
        assert_eq!(bus.replay_capacity::<A>(), None);
        timeout(WAIT, sub.cancelled()).await.unwrap();
    }

    #[tokio::test]
    async fn test_first_creator_fixes_capacity() {
        let bus = EventBus::new();
        assert!(bus.declare::<A>(3));
        assert!(!bus.declare::<A>(10));
        bus.post_with(A(1), PostOptions::new().with_replay_capacity(0));
        assert_eq!(bus.replay_capacity::<A>(), Some(3));

        bus.post_now(B("x"));
        assert_eq!(bus.replay_capacity::<B>(), Some(DEFAULT_REPLAY_CAPACITY));
    }

    #[tokio::test]
    async fn test_replayed_snapshot() {
        let bus = EventBus::builder().default_replay_capacity(2).build().unwrap();
        for i in 0..5 {
            bus.post_now(A(i));
        }
        let replayed: Vec<u32> = bus.replayed::<A>().iter().map(|e| e.0).collect();
        assert_eq!(replayed, vec![3, 4]);
    }

    #[tokio::test]
    async fn test_callbacks_run_on_serial_context() {
        let bus = EventBus::builder()
            .with_settings(BusSettings {
                callback_context: CallbackContext::Serial,
                serial_thread_name: "bus-serial-test".to_owned(),
                ..BusSettings::default()
            })
            .build()
            .unwrap();

        let (tx, mut rx) = mpsc::unbounded_channel();
        bus.subscribe::<A, _, _>("ui", SubscribeOptions::new(), move |_event: Arc<A>| {
            let _ = tx.send(std::thread::current().name().map(str::to_owned));
            futures::future::ready(Ok(()))
        })
        .unwrap();

        bus.post_now(A(1));
        assert_eq!(next(&mut rx).await.as_deref(), Some("bus-serial-test"));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_posts_from_task_keep_post_order() {
        for _ in 0..20 {
            let bus = EventBus::builder().default_replay_capacity(2).build().unwrap();
            let (tx, mut rx) = mpsc::unbounded_channel();
            bus.subscribe::<A, _, _>("live", SubscribeOptions::new(), forward(tx))
                .unwrap();

            let poster = bus.clone();
            tokio::spawn(async move {
                poster.post(A(1));
                poster.post(A(2));
                poster.post(A(3));
            })
            .await
            .unwrap();

            let mut received = Vec::new();
            for _ in 0..3 {
                received.push(next(&mut rx).await.0);
            }
            assert_eq!(received, vec![1, 2, 3]);
            assert_eq!(bus.replayed::<A>(), vec![Arc::new(A(2)), Arc::new(A(3))]);

            let (tx, mut rx) = mpsc::unbounded_channel();
            bus.subscribe::<A, _, _>("late", SubscribeOptions::new().sticky(), forward(tx))
                .unwrap();
            assert_eq!(next(&mut rx).await, A(2));
            assert_eq!(next(&mut rx).await, A(3));
        }
    }

    #[tokio::test]
    async fn test_per_subscription_fifo() {
        let bus = EventBus::new();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let (done_tx, mut done_rx) = mpsc::unbounded_channel();
        bus.subscribe::<A, _, _>("fifo", SubscribeOptions::new(), move |event: Arc<A>| {
            let sink = Arc::clone(&sink);
            let done_tx = done_tx.clone();
            async move {
                tokio::task::yield_now().await;
                sink.lock().unwrap().push(event.0);
                if event.0 == 49 {
                    let _ = done_tx.send(());
                }
                Ok(())
            }
        })
        .unwrap();

        for i in 0..50 {
            bus.post_now(A(i));
        }
        next(&mut done_rx).await;
        assert_eq!(*seen.lock().unwrap(), (0..50).collect::<Vec<_>>());
    }

    #[test]
    fn test_subscribe_without_runtime_fails() {
        let bus = EventBus::new();
        let result = bus.subscribe::<A, _, _>("x", SubscribeOptions::new(), |_e: Arc<A>| {
            futures::future::ready(Ok(()))
        });
        assert!(matches!(result, Err(BusError::NoRuntime)));
        assert!(!bus.is_subscribed::<A>(&"x".into()));
    }

    #[test]
    fn test_post_without_runtime_is_dropped_quietly() {
        let bus = EventBus::new();
        bus.post(A(1));
        // The topic exists, but the injection never ran.
        assert!(bus.replayed::<A>().is_empty());

        // The rejected event does not resurface with a later post.
        bus.post_now(A(2));
        assert_eq!(bus.replayed::<A>(), vec![Arc::new(A(2))]);
    }
}
