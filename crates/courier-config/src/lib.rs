#![deny(unsafe_code)]
#![warn(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
//! Layered configuration for the courier event bus.
//!
//! # Usage
//!
//! ```rust,no_run
//! use courier_config::Config;
//!
//! // defaults → courier.toml → COURIER_* env fallbacks
//! let config = Config::load(Some(std::path::Path::new("courier.toml"))).unwrap();
//! println!("replay capacity: {}", config.bus.replay_capacity);
//! ```
//!
//! # Configuration Precedence
//!
//! From highest to lowest priority:
//!
//! 1. **Config file** passed to [`Config::load`]
//! 2. **Environment variables** (`COURIER_*`), fallback only
//! 3. **Embedded defaults** (`defaults.toml` compiled into the binary)
//!
//! # Design
//!
//! This crate has **no dependencies on other courier crates**. Conversion
//! into bus settings happens in `courier-events` behind its `config`
//! feature.

/// Environment variable fallback resolution.
pub mod env;
/// Configuration error types.
pub mod error;
/// Configuration file loading.
pub mod loader;
/// Layered merging with source tracking.
pub mod merge;
/// Configuration struct definitions.
pub mod types;
/// Configuration validation rules.
pub mod validate;

use std::path::Path;

pub use error::{ConfigError, ConfigResult};
pub use loader::ResolvedConfig;
pub use merge::ConfigLayer;
pub use types::*;

impl Config {
    /// Load configuration: embedded defaults, then `path` (skipped if
    /// missing), then `COURIER_*` env fallbacks.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] if the file is malformed, an env var is
    /// invalid, or the final configuration fails validation.
    pub fn load(path: Option<&Path>) -> ConfigResult<Self> {
        Self::load_resolved(path).map(|resolved| resolved.config)
    }

    /// Like [`Config::load`], but also reports where each field came from.
    ///
    /// # Errors
    ///
    /// Same as [`Config::load`].
    pub fn load_resolved(path: Option<&Path>) -> ConfigResult<ResolvedConfig> {
        loader::load(path, &env::collect_env_vars())
    }

    /// Load configuration from a single file (no layering).
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] if the file cannot be read, parsed, or fails
    /// validation.
    pub fn load_file(path: &Path) -> ConfigResult<Self> {
        loader::load_file(path)
    }

    /// Parse configuration from a TOML string. Missing keys take defaults.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] if the string cannot be parsed or fails
    /// validation.
    pub fn from_toml_str(content: &str) -> ConfigResult<Self> {
        loader::parse_config(content, "<string>")
    }
}
