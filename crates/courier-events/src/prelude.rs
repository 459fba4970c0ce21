//! Prelude module - commonly used types for convenient import.
//!
//! Use `use courier_events::prelude::*;` to import all essential types.
//!
//! # Example
//!
//! ```rust
//! use courier_events::prelude::*;
//! use std::sync::Arc;
//!
//! struct Saved {
//!     path: String,
//! }
//!
//! # #[tokio::main]
//! # async fn main() {
//! let bus = EventBus::new();
//! let key = SubscriberKey::from("autosave-indicator");
//!
//! bus.subscribe::<Saved, _, _>(&key, SubscribeOptions::new(), |saved: Arc<Saved>| async move {
//!     assert!(!saved.path.is_empty());
//!     Ok(())
//! })
//! .unwrap();
//!
//! assert!(bus.is_subscribed::<Saved>(&key));
//! bus.unsubscribe::<Saved>(&key);
//! assert!(!bus.is_subscribed::<Saved>(&key));
//! # }
//! ```

// Bus
pub use crate::{BusSettings, CallbackContext, EventBus, EventBusBuilder};

// Subscriptions
pub use crate::{
    DuplicatePolicy, PostOptions, SubscribeOptions, SubscriberKey, Subscription,
    SubscriptionScope, SubscriptionState,
};

// Lifecycle
pub use crate::{LifecycleBinding, LifecycleEvent, Transition};

// Dispatch
pub use crate::{DispatchContext, JobResult, SerialContext, TokioContext};

// Errors
pub use crate::{BusError, BusResult, DispatchError, HandlerError};

// Events
pub use crate::{Event, EventType};
