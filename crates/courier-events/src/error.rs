//! Error types for the event bus.

use thiserror::Error;

use crate::event::EventType;
use crate::key::SubscriberKey;

/// Error produced by a subscriber callback.
pub type HandlerError = Box<dyn std::error::Error + Send + Sync>;

/// Errors surfaced synchronously by bus operations.
#[derive(Debug, Error)]
pub enum BusError {
    /// A live subscription already exists for this (event type, key) pair.
    #[error("already subscribed to {event_type} with key '{key}'")]
    DuplicateSubscription {
        /// Event type of the existing subscription.
        event_type: EventType,
        /// Key of the existing subscription.
        key: SubscriberKey,
    },

    /// No tokio runtime is available to run subscription listeners.
    #[error("no tokio runtime available to run subscription listeners")]
    NoRuntime,

    /// A dispatch context could not be started.
    #[error("failed to start dispatch context '{context}': {source}")]
    ContextInit {
        /// Name of the context.
        context: String,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The topic registered for this event type holds another payload type.
    #[error("topic registered for {0} holds a different payload type")]
    TopicTypeMismatch(EventType),
}

/// Result type for bus operations.
pub type BusResult<T> = Result<T, BusError>;

/// Failure of a unit of work handed to a dispatch context.
///
/// For callbacks this is what ends a subscription; it is logged and never
/// reaches the poster.
#[derive(Debug, Error)]
pub enum DispatchError {
    /// The callback returned an error.
    #[error("handler failed: {0}")]
    Failed(#[source] HandlerError),

    /// The callback panicked.
    #[error("handler panicked: {0}")]
    Panicked(String),

    /// The context no longer accepts work.
    #[error("dispatch context '{context}' is closed")]
    Closed {
        /// Name of the context.
        context: String,
    },

    /// The context has no tokio runtime to spawn onto.
    #[error("dispatch context '{context}' has no tokio runtime")]
    NoRuntime {
        /// Name of the context.
        context: String,
    },

    /// The job was aborted before it finished.
    #[error("dispatched job was aborted")]
    Aborted,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_duplicate_message_names_type_and_key() {
        let err = BusError::DuplicateSubscription {
            event_type: EventType::of::<u32>(),
            key: SubscriberKey::from("x"),
        };
        assert_eq!(err.to_string(), "already subscribed to u32 with key 'x'");
    }

    #[test]
    fn test_failed_keeps_source() {
        use std::error::Error as _;

        let err = DispatchError::Failed("boom".into());
        assert_eq!(err.to_string(), "handler failed: boom");
        assert!(err.source().is_some());
    }
}
