//! Courier Test - shared test utilities for the courier event bus.
//!
//! This crate provides event recorders, sample payloads and logging setup
//! that can be used across courier crates as a dev-dependency.
//!
//! # Usage
//!
//! Add to your crate's `Cargo.toml`:
//!
//! ```toml
//! [dev-dependencies]
//! courier-test.workspace = true
//! ```
//!
//! Then use in your tests:
//!
//! ```rust,ignore
//! use courier_events::{EventBus, SubscribeOptions};
//! use courier_test::{Ping, recording_handler};
//! use std::time::Duration;
//!
//! #[tokio::test]
//! async fn test_ping_delivery() {
//!     let bus = EventBus::new();
//!     let (recorder, handler) = recording_handler::<Ping>();
//!     bus.subscribe("probe", SubscribeOptions::new(), handler).unwrap();
//!
//!     bus.post(Ping::new(1));
//!     assert!(recorder.wait_for_len(1, Duration::from_secs(1)).await);
//! }
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]

pub mod prelude;

pub mod fixtures;
pub mod harness;
pub mod recorder;

pub use fixtures::*;
pub use harness::*;
pub use recorder::*;
