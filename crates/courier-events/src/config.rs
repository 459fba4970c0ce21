//! Bridge from `courier_config::Config` to bus settings.
//!
//! The config crate has no dependency on the bus, so its values arrive as
//! validated strings and are mapped onto [`BusSettings`] here.

use courier_config::{BusSection, Config};

use crate::bus::{BusSettings, CallbackContext, EventBusBuilder};
use crate::subscription::DuplicatePolicy;

/// Convert the `[bus]` section to [`BusSettings`].
#[must_use]
pub fn to_bus_settings(section: &BusSection) -> BusSettings {
    let duplicate_policy = match section.duplicate_policy.as_str() {
        "replace" => DuplicatePolicy::Replace,
        _ => DuplicatePolicy::Reject,
    };

    let callback_context = match section.callback_context.as_str() {
        "serial" => CallbackContext::Serial,
        _ => CallbackContext::Background,
    };

    BusSettings {
        default_replay_capacity: section.replay_capacity,
        duplicate_policy,
        callback_context,
        serial_thread_name: section.serial_thread_name.clone(),
    }
}

impl EventBusBuilder {
    /// Builder seeded from a loaded configuration.
    #[must_use]
    pub fn from_config(cfg: &Config) -> Self {
        Self::new().with_settings(to_bus_settings(&cfg.bus))
    }
}
