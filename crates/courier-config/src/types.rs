//! Configuration types for courier.
//!
//! These types have no dependency on the bus crate; values that map onto
//! bus enums are kept as validated strings and converted at the boundary.
//! Every struct implements [`Default`] with the same values as the embedded
//! `defaults.toml`, so a bare `[section]` header yields a working setup.

use serde::{Deserialize, Serialize};

/// Root configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Event bus defaults.
    pub bus: BusSection,
    /// Logging level, format, and per-crate directives.
    pub logging: LoggingSection,
}

/// Event bus defaults.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BusSection {
    /// Events kept per type for sticky subscribers (0 disables replay).
    /// Applies to topics created without an explicit capacity.
    pub replay_capacity: usize,
    /// `"reject"` or `"replace"`.
    pub duplicate_policy: String,
    /// `"background"` (tokio worker pool) or `"serial"` (one dedicated thread).
    pub callback_context: String,
    /// Thread name for the serial callback context.
    pub serial_thread_name: String,
}

impl Default for BusSection {
    fn default() -> Self {
        Self {
            replay_capacity: 1,
            duplicate_policy: "reject".to_owned(),
            callback_context: "background".to_owned(),
            serial_thread_name: "courier-serial".to_owned(),
        }
    }
}

/// Logging and tracing configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSection {
    /// Global log level filter (`"trace"`, `"debug"`, `"info"`, `"warn"`,
    /// `"error"`).
    pub level: String,
    /// Output format: `"pretty"` (human-friendly), `"compact"` (one-line),
    /// `"json"` (structured), or `"full"` (verbose).
    pub format: String,
    /// Per-crate tracing directives (e.g. `["courier_events=debug"]`).
    pub directives: Vec<String>,
}

impl Default for LoggingSection {
    fn default() -> Self {
        Self {
            level: "info".to_owned(),
            format: "compact".to_owned(),
            directives: Vec::new(),
        }
    }
}
