//! Event payloads and their runtime type tags.

use std::any::{TypeId, type_name};
use std::fmt;
use std::hash::{Hash, Hasher};

/// Marker for values that can travel through the bus.
///
/// Implemented for every `Send + Sync + 'static` type; routing is by the
/// concrete Rust type, never by content.
pub trait Event: Send + Sync + 'static {}

impl<T: Send + Sync + 'static> Event for T {}

/// Runtime routing key for an event payload type.
///
/// Equality and hashing use the [`TypeId`] only; the type name is kept for
/// logs and error messages.
#[derive(Clone, Copy)]
pub struct EventType {
    id: TypeId,
    name: &'static str,
}

impl EventType {
    /// Tag for the payload type `T`.
    #[must_use]
    pub fn of<T: Event>() -> Self {
        Self {
            id: TypeId::of::<T>(),
            name: type_name::<T>(),
        }
    }

    /// Underlying [`TypeId`].
    #[must_use]
    pub fn id(&self) -> TypeId {
        self.id
    }

    /// Fully qualified Rust type name of the payload.
    #[must_use]
    pub fn name(&self) -> &'static str {
        self.name
    }
}

impl PartialEq for EventType {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for EventType {}

impl Hash for EventType {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl fmt::Debug for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("EventType").field(&self.name).finish()
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    struct Alpha;
    struct Beta;

    #[test]
    fn test_same_type_same_tag() {
        assert_eq!(EventType::of::<Alpha>(), EventType::of::<Alpha>());
        assert_ne!(EventType::of::<Alpha>(), EventType::of::<Beta>());
    }

    #[test]
    fn test_tag_hashes_by_type() {
        let mut set = HashSet::new();
        set.insert(EventType::of::<Alpha>());
        set.insert(EventType::of::<Alpha>());
        set.insert(EventType::of::<Beta>());
        assert_eq!(set.len(), 2);
    }

    #[test]
    fn test_display_uses_type_name() {
        let ty = EventType::of::<Alpha>();
        assert!(ty.to_string().ends_with("Alpha"));
        assert_eq!(ty.name(), ty.to_string());
    }
}
