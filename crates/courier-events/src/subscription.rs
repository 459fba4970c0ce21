//! Subscription handles and per-call options.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::{Arc, Weak};
use tokio_util::sync::CancellationToken;

use crate::dispatch::DispatchContext;
use crate::event::EventType;
use crate::key::SubscriberKey;
use crate::registry::{SubscriptionId, SubscriptionRegistry};

/// What `subscribe` does when the (event type, key) slot is already taken.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DuplicatePolicy {
    /// Fail with [`BusError::DuplicateSubscription`](crate::BusError::DuplicateSubscription).
    #[default]
    Reject,
    /// Cancel the existing subscription and install the new one.
    Replace,
}

impl FromStr for DuplicatePolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "reject" => Ok(Self::Reject),
            "replace" => Ok(Self::Replace),
            other => Err(format!(
                "unknown duplicate policy '{other}'; expected 'reject' or 'replace'"
            )),
        }
    }
}

/// Options for [`EventBus::subscribe`](crate::EventBus::subscribe).
#[derive(Debug, Clone, Default)]
pub struct SubscribeOptions {
    pub(crate) sticky: bool,
    pub(crate) replay_capacity: Option<usize>,
    pub(crate) context: Option<Arc<dyn DispatchContext>>,
    pub(crate) duplicate_policy: Option<DuplicatePolicy>,
}

impl SubscribeOptions {
    /// Non-sticky, bus defaults for everything else.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Receive the buffered history before live events.
    #[must_use]
    pub fn sticky(self) -> Self {
        self.with_sticky(true)
    }

    /// Set whether buffered history is replayed to this subscription.
    #[must_use]
    pub fn with_sticky(mut self, sticky: bool) -> Self {
        self.sticky = sticky;
        self
    }

    /// Replay capacity to use if this call creates the topic.
    ///
    /// Ignored when the topic already exists: the first caller fixes the
    /// capacity for the topic's lifetime.
    #[must_use]
    pub fn with_replay_capacity(mut self, capacity: usize) -> Self {
        self.replay_capacity = Some(capacity);
        self
    }

    /// Run the callback on this context instead of the bus default.
    #[must_use]
    pub fn on_context(mut self, context: Arc<dyn DispatchContext>) -> Self {
        self.context = Some(context);
        self
    }

    /// Cancel an existing subscription with the same key instead of failing.
    #[must_use]
    pub fn replace_existing(mut self) -> Self {
        self.duplicate_policy = Some(DuplicatePolicy::Replace);
        self
    }

    /// Override the bus-wide duplicate policy for this call.
    #[must_use]
    pub fn with_duplicate_policy(mut self, policy: DuplicatePolicy) -> Self {
        self.duplicate_policy = Some(policy);
        self
    }

    /// Whether history will be replayed.
    #[must_use]
    pub fn is_sticky(&self) -> bool {
        self.sticky
    }
}

/// Options for [`EventBus::post_with`](crate::EventBus::post_with).
#[derive(Debug, Clone, Default)]
pub struct PostOptions {
    pub(crate) replay_capacity: Option<usize>,
    pub(crate) context: Option<Arc<dyn DispatchContext>>,
}

impl PostOptions {
    /// Bus defaults.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Replay capacity to use if this post creates the topic.
    #[must_use]
    pub fn with_replay_capacity(mut self, capacity: usize) -> Self {
        self.replay_capacity = Some(capacity);
        self
    }

    /// Run the injection on this context instead of the bus default.
    #[must_use]
    pub fn on_context(mut self, context: Arc<dyn DispatchContext>) -> Self {
        self.context = Some(context);
        self
    }
}

/// Lifecycle state of a subscription. `Cancelled` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubscriptionState {
    /// Receiving events.
    Active,
    /// Unsubscribed, cleared, replaced, or stopped after a callback failure.
    Cancelled,
}

/// Handle to one subscription.
///
/// Dropping the handle does not unsubscribe; the bus keeps the subscription
/// alive until it is cancelled by key, by type, or through [`Self::cancel`].
#[derive(Clone)]
pub struct Subscription {
    id: SubscriptionId,
    event_type: EventType,
    key: SubscriberKey,
    token: CancellationToken,
    registry: Weak<SubscriptionRegistry>,
}

impl Subscription {
    pub(crate) fn new(
        id: SubscriptionId,
        event_type: EventType,
        key: SubscriberKey,
        token: CancellationToken,
        registry: &Arc<SubscriptionRegistry>,
    ) -> Self {
        Self {
            id,
            event_type,
            key,
            token,
            registry: Arc::downgrade(registry),
        }
    }

    /// Id of this subscription instance.
    #[must_use]
    pub fn id(&self) -> SubscriptionId {
        self.id
    }

    /// Event type this subscription listens to.
    #[must_use]
    pub fn event_type(&self) -> EventType {
        self.event_type
    }

    /// Key this subscription was registered under.
    #[must_use]
    pub fn key(&self) -> &SubscriberKey {
        &self.key
    }

    /// Current lifecycle state.
    #[must_use]
    pub fn state(&self) -> SubscriptionState {
        if self.token.is_cancelled() {
            SubscriptionState::Cancelled
        } else {
            SubscriptionState::Active
        }
    }

    /// Whether the subscription is still receiving events.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.state() == SubscriptionState::Active
    }

    /// Cancel this subscription. Idempotent.
    ///
    /// Only this instance's registry slot is released; a newer subscription
    /// registered under the same key is left alone.
    pub fn cancel(&self) {
        if let Some(registry) = self.registry.upgrade() {
            registry.cancel_if(self.event_type, &self.key, self.id);
        }
        self.token.cancel();
    }

    /// Resolves once the subscription has reached `Cancelled`.
    pub async fn cancelled(&self) {
        self.token.cancelled().await;
    }

    pub(crate) fn token(&self) -> &CancellationToken {
        &self.token
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("id", &self.id)
            .field("event_type", &self.event_type)
            .field("key", &self.key)
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}
