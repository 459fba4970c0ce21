//! Environment variable fallbacks.
//!
//! Env vars are **fallback**, not override: they only fill fields that no
//! config file set. A value from `defaults.toml` still yields to them.

use std::collections::HashMap;
use std::hash::BuildHasher;

use tracing::debug;

use crate::error::{ConfigError, ConfigResult};
use crate::merge::{ConfigLayer, FieldSources};

/// Mapping from environment variable name to config field path.
struct EnvMapping {
    var_name: &'static str,
    field_path: &'static str,
    kind: ValueKind,
}

#[derive(Clone, Copy)]
enum ValueKind {
    Integer,
    String,
}

/// All supported `COURIER_*` env var mappings.
const ENV_MAPPINGS: &[EnvMapping] = &[
    EnvMapping {
        var_name: "COURIER_REPLAY_CAPACITY",
        field_path: "bus.replay_capacity",
        kind: ValueKind::Integer,
    },
    EnvMapping {
        var_name: "COURIER_DUPLICATE_POLICY",
        field_path: "bus.duplicate_policy",
        kind: ValueKind::String,
    },
    EnvMapping {
        var_name: "COURIER_CALLBACK_CONTEXT",
        field_path: "bus.callback_context",
        kind: ValueKind::String,
    },
    EnvMapping {
        var_name: "COURIER_LOG_LEVEL",
        field_path: "logging.level",
        kind: ValueKind::String,
    },
    EnvMapping {
        var_name: "COURIER_LOG_FORMAT",
        field_path: "logging.format",
        kind: ValueKind::String,
    },
];

/// Apply environment variable fallbacks to fields that were **not** set by
/// a config file.
///
/// Returns the number of env vars applied.
///
/// # Errors
///
/// Returns [`ConfigError::EnvError`] if a numeric variable does not parse.
pub fn apply_env_fallbacks<S: BuildHasher>(
    merged: &mut toml::Value,
    sources: &mut FieldSources,
    env_vars: &HashMap<String, String, S>,
) -> ConfigResult<usize> {
    let mut count: usize = 0;

    for mapping in ENV_MAPPINGS {
        if matches!(sources.get(mapping.field_path), Some(ConfigLayer::File(_))) {
            continue;
        }

        let Some(raw) = env_vars.get(mapping.var_name) else {
            continue;
        };

        debug!(
            var = mapping.var_name,
            field = mapping.field_path,
            "applying env var fallback"
        );

        let value = coerce(mapping, raw)?;
        set_field(merged, mapping.field_path, value);
        sources.insert(mapping.field_path.to_owned(), ConfigLayer::Environment);
        count = count.saturating_add(1);
    }

    Ok(count)
}

fn coerce(mapping: &EnvMapping, raw: &str) -> ConfigResult<toml::Value> {
    match mapping.kind {
        ValueKind::Integer => raw
            .trim()
            .parse::<i64>()
            .map(toml::Value::Integer)
            .map_err(|e| ConfigError::EnvError {
                var_name: mapping.var_name.to_owned(),
                message: format!("expected an integer, got '{raw}': {e}"),
            }),
        ValueKind::String => Ok(toml::Value::String(raw.trim().to_owned())),
    }
}

/// Set a dotted field path, creating intermediate tables as needed.
fn set_field(root: &mut toml::Value, path: &str, value: toml::Value) {
    let Some((parents, leaf)) = path.rsplit_once('.') else {
        if let Some(table) = root.as_table_mut() {
            table.insert(path.to_owned(), value);
        }
        return;
    };

    let mut current = root;
    for segment in parents.split('.') {
        let Some(table) = current.as_table_mut() else {
            return;
        };
        current = table
            .entry(segment.to_owned())
            .or_insert_with(|| toml::Value::Table(toml::map::Map::new()));
    }

    if let Some(table) = current.as_table_mut() {
        table.insert(leaf.to_owned(), value);
    }
}

/// Collect all current environment variables into a map.
#[must_use]
pub fn collect_env_vars() -> HashMap<String, String> {
    std::env::vars().collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_env(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| ((*k).to_owned(), (*v).to_owned()))
            .collect()
    }

    #[test]
    fn test_apply_env_fallbacks() {
        let mut merged: toml::Value = toml::from_str("[bus]\nreplay_capacity = 1").unwrap();
        let mut sources = FieldSources::new();
        sources.insert("bus.replay_capacity".to_owned(), ConfigLayer::Defaults);
        let env = make_env(&[("COURIER_REPLAY_CAPACITY", "32"), ("COURIER_LOG_LEVEL", "debug")]);

        let count = apply_env_fallbacks(&mut merged, &mut sources, &env).unwrap();

        assert_eq!(count, 2);
        assert_eq!(merged["bus"]["replay_capacity"].as_integer(), Some(32));
        assert_eq!(merged["logging"]["level"].as_str(), Some("debug"));
        assert_eq!(
            sources.get("logging.level"),
            Some(&ConfigLayer::Environment)
        );
    }

    #[test]
    fn test_env_fallback_skips_file_values() {
        let mut merged: toml::Value = toml::from_str("[logging]\nlevel = \"warn\"").unwrap();
        let mut sources = FieldSources::new();
        sources.insert(
            "logging.level".to_owned(),
            ConfigLayer::File("courier.toml".to_owned()),
        );

        let env = make_env(&[("COURIER_LOG_LEVEL", "debug")]);
        let count = apply_env_fallbacks(&mut merged, &mut sources, &env).unwrap();

        assert_eq!(count, 0);
        assert_eq!(merged["logging"]["level"].as_str(), Some("warn"));
    }

    #[test]
    fn test_bad_integer_is_env_error() {
        let mut merged = toml::Value::Table(toml::map::Map::new());
        let mut sources = FieldSources::new();
        let env = make_env(&[("COURIER_REPLAY_CAPACITY", "lots")]);

        let err = apply_env_fallbacks(&mut merged, &mut sources, &env).unwrap_err();
        assert!(
            matches!(err, ConfigError::EnvError { ref var_name, .. } if var_name == "COURIER_REPLAY_CAPACITY")
        );
    }

    #[test]
    fn test_unrelated_vars_are_ignored() {
        let mut merged = toml::Value::Table(toml::map::Map::new());
        let mut sources = FieldSources::new();
        let env = make_env(&[("HOME", "/root"), ("COURIER_UNKNOWN", "x")]);

        assert_eq!(apply_env_fallbacks(&mut merged, &mut sources, &env).unwrap(), 0);
        assert!(sources.is_empty());
    }
}
