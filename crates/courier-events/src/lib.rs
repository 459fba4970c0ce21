//! Courier Events - typed in-process publish/subscribe bus.
//!
//! This crate provides:
//! - One broadcast topic per payload type, created on first use
//! - A bounded replay buffer per topic for sticky (late) subscribers
//! - Keyed subscriptions: at most one live subscription per (type, key)
//! - Pluggable dispatch contexts for injections and callbacks
//! - Scope and lifecycle adapters that unsubscribe in bulk
//!
//! # Architecture
//!
//! Events are routed by their Rust type. `post` hands the injection to the
//! bus's post context and returns immediately; the topic stores the event in
//! its replay buffer and queues it for every attached subscription. Each
//! subscription has its own listener task that runs the callback on the
//! subscription's dispatch context, one event at a time.
//!
//! A failing or panicking callback ends its own subscription and nothing
//! else. The only error subscribers must handle synchronously is
//! [`BusError::DuplicateSubscription`].
//!
//! # Example
//!
//! ```rust
//! use courier_events::{EventBus, SubscribeOptions};
//! use std::sync::Arc;
//! use tokio::sync::mpsc;
//!
//! #[derive(Debug, Clone, PartialEq)]
//! struct Temperature(i32);
//!
//! # #[tokio::main]
//! # async fn main() {
//! let bus = EventBus::new();
//!
//! // Posted before anyone listens: kept in the replay buffer.
//! bus.post_now(Temperature(21));
//!
//! let (tx, mut rx) = mpsc::unbounded_channel();
//! bus.subscribe::<Temperature, _, _>(
//!     "thermostat",
//!     SubscribeOptions::new().sticky(),
//!     move |reading: Arc<Temperature>| {
//!         let tx = tx.clone();
//!         async move {
//!             let _ = tx.send(reading.0);
//!             Ok(())
//!         }
//!     },
//! )
//! .unwrap();
//!
//! bus.post(Temperature(23));
//!
//! assert_eq!(rx.recv().await, Some(21));
//! assert_eq!(rx.recv().await, Some(23));
//! # }
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
#![deny(clippy::unwrap_used)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

pub mod prelude;

mod bus;
#[cfg(feature = "config")]
mod config;
mod dispatch;
mod error;
mod event;
mod key;
mod lifecycle;
mod registry;
mod replay;
mod scope;
mod subscription;
mod topic;

pub use bus::{
    BusSettings, CallbackContext, DEFAULT_REPLAY_CAPACITY, DEFAULT_SERIAL_THREAD_NAME, EventBus,
    EventBusBuilder,
};
#[cfg(feature = "config")]
pub use config::to_bus_settings;
pub use dispatch::{Completion, DispatchContext, Job, JobResult, SerialContext, TokioContext};
pub use error::{BusError, BusResult, DispatchError, HandlerError};
pub use event::{Event, EventType};
pub use key::SubscriberKey;
pub use lifecycle::{LifecycleBinding, LifecycleEvent, Transition};
pub use registry::{SubscriptionHandle, SubscriptionId, SubscriptionRegistry};
pub use replay::ReplayBuffer;
pub use scope::SubscriptionScope;
pub use subscription::{
    DuplicatePolicy, PostOptions, SubscribeOptions, Subscription, SubscriptionState,
};
