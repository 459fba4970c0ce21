//! Subscriber identity.

use std::fmt;
use std::sync::Arc;
use uuid::Uuid;

/// Caller-chosen identity of a subscriber.
///
/// At most one live subscription exists per (event type, key). Components
/// usually keep one key for their whole lifetime and use it for every event
/// type they listen to, so that [`EventBus::unsubscribe_all`] can tear them
/// down in one call.
///
/// [`EventBus::unsubscribe_all`]: crate::EventBus::unsubscribe_all
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum SubscriberKey {
    /// A human-readable name such as `"settings-screen"`.
    Name(Arc<str>),
    /// A generated or externally assigned UUID.
    Id(Uuid),
    /// A numeric handle, e.g. an entity or window id.
    Index(u64),
}

impl SubscriberKey {
    /// Create a named key.
    #[must_use]
    pub fn named(name: impl AsRef<str>) -> Self {
        Self::Name(Arc::from(name.as_ref()))
    }

    /// Create a fresh random key.
    #[must_use]
    pub fn unique() -> Self {
        Self::Id(Uuid::new_v4())
    }
}

impl fmt::Display for SubscriberKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Name(name) => f.write_str(name),
            Self::Id(id) => write!(f, "{id}"),
            Self::Index(index) => write!(f, "#{index}"),
        }
    }
}

impl From<&str> for SubscriberKey {
    fn from(name: &str) -> Self {
        Self::named(name)
    }
}

impl From<String> for SubscriberKey {
    fn from(name: String) -> Self {
        Self::Name(Arc::from(name))
    }
}

impl From<Uuid> for SubscriberKey {
    fn from(id: Uuid) -> Self {
        Self::Id(id)
    }
}

impl From<u64> for SubscriberKey {
    fn from(index: u64) -> Self {
        Self::Index(index)
    }
}

impl From<&SubscriberKey> for SubscriberKey {
    fn from(key: &SubscriberKey) -> Self {
        key.clone()
    }
}
