//! Bridge from `courier_config::LoggingSection` to [`LogConfig`].

use courier_config::LoggingSection;

use crate::logging::{LogConfig, LogFormat};

/// Convert the `[logging]` section to a [`LogConfig`].
///
/// Output goes to stderr; adjust the target on the returned value if needed.
#[must_use]
pub fn to_log_config(section: &LoggingSection) -> LogConfig {
    let format = match section.format.as_str() {
        "pretty" => LogFormat::Pretty,
        "json" => LogFormat::Json,
        "full" => LogFormat::Full,
        _ => LogFormat::Compact,
    };

    let mut log_config = LogConfig::new(&section.level).with_format(format);

    for directive in &section.directives {
        log_config = log_config.with_directive(directive);
    }

    log_config
}
