//! Prelude module - commonly used test helpers.
//!
//! Use `use courier_test::prelude::*;` in test modules.

// Recording
pub use crate::{EventRecorder, HandlerResult, failing_handler, recording_handler};

// Fixtures
pub use crate::{Notice, Ping, Reading, pings};

// Logging
pub use crate::{init_test_tracing, init_test_tracing_default};
