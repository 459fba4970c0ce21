//! Post-merge configuration validation.

use crate::error::{ConfigError, ConfigResult};
use crate::types::Config;

/// Upper bound for `bus.replay_capacity`.
pub const MAX_REPLAY_CAPACITY: usize = 1_000_000;

/// Validate a fully merged and deserialized configuration.
///
/// # Errors
///
/// Returns the first validation error found.
pub fn validate(config: &Config) -> ConfigResult<()> {
    validate_bus(config)?;
    validate_logging(config)?;
    Ok(())
}

fn validate_bus(config: &Config) -> ConfigResult<()> {
    let bus = &config.bus;

    if bus.replay_capacity > MAX_REPLAY_CAPACITY {
        return Err(ConfigError::ValidationError {
            field: "bus.replay_capacity".to_owned(),
            message: format!(
                "replay capacity {} exceeds the maximum of {MAX_REPLAY_CAPACITY}",
                bus.replay_capacity
            ),
        });
    }

    one_of("bus.duplicate_policy", &bus.duplicate_policy, &["reject", "replace"])?;
    one_of(
        "bus.callback_context",
        &bus.callback_context,
        &["background", "serial"],
    )?;

    if bus.serial_thread_name.trim().is_empty() {
        return Err(ConfigError::ValidationError {
            field: "bus.serial_thread_name".to_owned(),
            message: "thread name must not be empty".to_owned(),
        });
    }

    Ok(())
}

fn validate_logging(config: &Config) -> ConfigResult<()> {
    one_of(
        "logging.level",
        &config.logging.level,
        &["trace", "debug", "info", "warn", "error"],
    )?;
    one_of(
        "logging.format",
        &config.logging.format,
        &["pretty", "compact", "json", "full"],
    )?;

    if let Some(directive) = config.logging.directives.iter().find(|d| d.trim().is_empty()) {
        return Err(ConfigError::ValidationError {
            field: "logging.directives".to_owned(),
            message: format!("empty directive '{directive}'"),
        });
    }

    Ok(())
}

fn one_of(field: &str, value: &str, allowed: &[&str]) -> ConfigResult<()> {
    if allowed.contains(&value) {
        return Ok(());
    }
    Err(ConfigError::ValidationError {
        field: field.to_owned(),
        message: format!(
            "unsupported value '{value}'; expected one of: {}",
            allowed.join(", ")
        ),
    })
}
