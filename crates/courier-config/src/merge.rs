//! Deep merge of TOML values with per-field source tracking.
//!
//! The merge operates on raw [`toml::Value`] trees rather than deserialized
//! structs, so a key missing from a file does not override the layer below.

use std::collections::HashMap;
use std::fmt;

/// Which configuration layer a value came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigLayer {
    /// Compiled-in defaults (`defaults.toml`).
    Defaults,
    /// A config file passed to the loader.
    File(String),
    /// Environment variable fallback.
    Environment,
}

impl fmt::Display for ConfigLayer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Defaults => write!(f, "defaults"),
            Self::File(path) => write!(f, "file ({path})"),
            Self::Environment => write!(f, "environment variable"),
        }
    }
}

/// Tracks which layer set each dotted field path.
pub type FieldSources = HashMap<String, ConfigLayer>;

/// Recursively deep-merge `overlay` into `base`, recording `layer` for every
/// leaf the overlay sets.
///
/// - Tables merge recursively per-field.
/// - Scalars and arrays from the overlay **replace** the base value.
///
/// `prefix` is the dotted path of `base` within the root.
pub fn deep_merge_tracking(
    base: &mut toml::Value,
    overlay: &toml::Value,
    prefix: &str,
    layer: &ConfigLayer,
    sources: &mut FieldSources,
) {
    match (base, overlay) {
        (toml::Value::Table(base_table), toml::Value::Table(overlay_table)) => {
            for (key, overlay_val) in overlay_table {
                let path = join_path(prefix, key);
                if let Some(base_val) = base_table.get_mut(key) {
                    if overlay_val.is_table() {
                        deep_merge_tracking(base_val, overlay_val, &path, layer, sources);
                    } else {
                        *base_val = overlay_val.clone();
                        sources.insert(path, layer.clone());
                    }
                } else {
                    base_table.insert(key.clone(), overlay_val.clone());
                    record_leaves(overlay_val, &path, layer, sources);
                }
            }
        },
        (base, overlay) => {
            *base = overlay.clone();
            sources.insert(prefix.to_owned(), layer.clone());
        },
    }
}

/// Record every leaf path under `val` as coming from `layer`.
pub fn record_leaves(
    val: &toml::Value,
    prefix: &str,
    layer: &ConfigLayer,
    sources: &mut FieldSources,
) {
    if let toml::Value::Table(table) = val {
        for (key, child) in table {
            record_leaves(child, &join_path(prefix, key), layer, sources);
        }
    } else {
        sources.insert(prefix.to_owned(), layer.clone());
    }
}

fn join_path(prefix: &str, key: &str) -> String {
    if prefix.is_empty() {
        key.to_owned()
    } else {
        format!("{prefix}.{key}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(s: &str) -> toml::Value {
        toml::from_str(s).unwrap()
    }

    fn deep_merge(base: &mut toml::Value, overlay: &toml::Value) {
        let layer = ConfigLayer::File("overlay.toml".to_owned());
        deep_merge_tracking(base, overlay, "", &layer, &mut FieldSources::new());
    }

    #[test]
    fn test_deep_merge_keeps_unset_keys() {
        let mut base = parse("[bus]\nreplay_capacity = 1\nduplicate_policy = \"reject\"");
        let overlay = parse("[bus]\nreplay_capacity = 8");

        deep_merge(&mut base, &overlay);

        assert_eq!(base["bus"]["replay_capacity"].as_integer(), Some(8));
        assert_eq!(base["bus"]["duplicate_policy"].as_str(), Some("reject"));
    }

    #[test]
    fn test_arrays_are_replaced_not_appended() {
        let mut base = parse("[logging]\ndirectives = [\"a=debug\"]");
        let overlay = parse("[logging]\ndirectives = [\"b=trace\"]");

        deep_merge(&mut base, &overlay);

        let directives = base["logging"]["directives"].as_array().unwrap();
        assert_eq!(directives.len(), 1);
        assert_eq!(directives[0].as_str(), Some("b=trace"));
    }

    #[test]
    fn test_tracking_records_only_overlay_leaves() {
        let mut base = parse("[bus]\nreplay_capacity = 1\ncallback_context = \"background\"");
        let mut sources = FieldSources::new();
        record_leaves(&base, "", &ConfigLayer::Defaults, &mut sources);

        let file = ConfigLayer::File("courier.toml".to_owned());
        let overlay = parse("[bus]\nreplay_capacity = 4\n[logging]\nlevel = \"debug\"");
        deep_merge_tracking(&mut base, &overlay, "", &file, &mut sources);

        assert_eq!(sources.get("bus.replay_capacity"), Some(&file));
        assert_eq!(sources.get("logging.level"), Some(&file));
        assert_eq!(
            sources.get("bus.callback_context"),
            Some(&ConfigLayer::Defaults)
        );
    }

    #[test]
    fn test_layer_display() {
        assert_eq!(ConfigLayer::Defaults.to_string(), "defaults");
        assert_eq!(
            ConfigLayer::File("a.toml".to_owned()).to_string(),
            "file (a.toml)"
        );
    }
}
