//! Settings loading from configuration files.
//!
//! ## Loading Order
//!
//! 1. Start with default settings.
//! 2. Load from a TOML or JSON file (deep-merged over the defaults).
//! 3. Apply environment variable overrides (highest priority).
//!
//! Top-level keys that are not settings fields (`PAYMENT_METHODS = [...]`)
//! are moved into `extra`; an explicit `[extra]` entry with the same name
//! wins.
//!
//! ## Environment Variable Mapping
//!
//! | Env Var | Setting |
//! |---|---|
//! | `VQS_DEBUG` | `debug` |
//! | `VQS_ALLOWED_HOSTS` | `allowed_hosts` (comma-separated) |
//! | `VQS_LOG_LEVEL` | `log_level` |
//! | `VQS_TIME_ZONE` | `time_zone` |
//! | `VQS_API_CACHE_TIMEOUT` | `virtual_querysets.api_cache_timeout` |
//! | `VQS_CACHE_TIMEOUT` | `virtual_querysets.cache_timeout` |
//!
//! ## Examples
//!
//! ```rust,no_run
//! use virtualqueryset_core::settings_loader;
//!
//! let settings = settings_loader::from_toml_file_with_env("config/settings.toml").unwrap();
//! ```

use std::path::Path;

use crate::error::VirtualError;
use crate::settings::Settings;

/// Loads settings from a TOML string.
///
/// Any settings not present in the TOML keep their default values.
pub fn from_toml_str(toml_str: &str) -> Result<Settings, VirtualError> {
    let toml_value: toml::Value = toml::from_str(toml_str)
        .map_err(|e| VirtualError::ConfigurationError(format!("Failed to parse TOML: {e}")))?;
    merge_into_defaults(toml_to_json(toml_value), "TOML")
}

/// Loads settings from a TOML file.
pub fn from_toml_file(path: impl AsRef<Path>) -> Result<Settings, VirtualError> {
    from_toml_str(&read_config(path.as_ref(), "TOML")?)
}

/// Loads settings from a TOML file and then applies environment variable overrides.
pub fn from_toml_file_with_env(path: impl AsRef<Path>) -> Result<Settings, VirtualError> {
    let mut settings = from_toml_file(path)?;
    apply_env_overrides(&mut settings);
    Ok(settings)
}

/// Loads settings from a JSON string.
pub fn from_json_str(json_str: &str) -> Result<Settings, VirtualError> {
    let json_value: serde_json::Value = serde_json::from_str(json_str)
        .map_err(|e| VirtualError::ConfigurationError(format!("Failed to parse JSON: {e}")))?;
    merge_into_defaults(json_value, "JSON")
}

/// Loads settings from a JSON file.
pub fn from_json_file(path: impl AsRef<Path>) -> Result<Settings, VirtualError> {
    from_json_str(&read_config(path.as_ref(), "JSON")?)
}

/// Loads settings from a JSON file and then applies environment variable overrides.
pub fn from_json_file_with_env(path: impl AsRef<Path>) -> Result<Settings, VirtualError> {
    let mut settings = from_json_file(path)?;
    apply_env_overrides(&mut settings);
    Ok(settings)
}

/// Loads settings from just environment variables (starting from defaults).
pub fn from_env() -> Settings {
    let mut settings = Settings::default();
    apply_env_overrides(&mut settings);
    settings
}

/// Applies `VQS_*` environment variable overrides to a settings struct.
///
/// Unparseable numeric values are ignored.
pub fn apply_env_overrides(settings: &mut Settings) {
    if let Ok(val) = std::env::var("VQS_DEBUG") {
        settings.debug = matches!(val.to_lowercase().as_str(), "true" | "1" | "yes");
    }

    if let Ok(val) = std::env::var("VQS_ALLOWED_HOSTS") {
        settings.allowed_hosts = val
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();
    }

    if let Ok(val) = std::env::var("VQS_LOG_LEVEL") {
        settings.log_level = val;
    }

    if let Ok(val) = std::env::var("VQS_TIME_ZONE") {
        settings.time_zone = val;
    }

    if let Ok(val) = std::env::var("VQS_API_CACHE_TIMEOUT") {
        if let Ok(secs) = val.parse::<u64>() {
            settings.virtual_querysets.api_cache_timeout = secs;
        }
    }

    if let Ok(val) = std::env::var("VQS_CACHE_TIMEOUT") {
        if let Ok(secs) = val.parse::<u64>() {
            settings.virtual_querysets.cache_timeout = secs;
        }
    }
}

// ============================================================
// Helpers
// ============================================================

fn read_config(path: &Path, format: &str) -> Result<String, VirtualError> {
    std::fs::read_to_string(path).map_err(|e| {
        VirtualError::ConfigurationError(format!(
            "Failed to read {format} file '{}': {e}",
            path.display()
        ))
    })
}

fn merge_into_defaults(value: serde_json::Value, format: &str) -> Result<Settings, VirtualError> {
    let default_json = serde_json::to_value(Settings::default()).map_err(|e| {
        VirtualError::ConfigurationError(format!("Failed to serialize default settings: {e}"))
    })?;

    let value = move_unknown_into_extra(value, &default_json);
    let merged = merge_json(default_json, value);
    serde_json::from_value(merged).map_err(|e| {
        VirtualError::ConfigurationError(format!("Failed to deserialize settings from {format}: {e}"))
    })
}

/// Moves top-level keys of `value` that `defaults` does not know into its
/// `extra` table.
fn move_unknown_into_extra(
    value: serde_json::Value,
    defaults: &serde_json::Value,
) -> serde_json::Value {
    let mut map = match value {
        serde_json::Value::Object(map) => map,
        other => return other,
    };
    let unknown: Vec<String> = map
        .keys()
        .filter(|k| defaults.get(k.as_str()).is_none())
        .cloned()
        .collect();
    if unknown.is_empty() {
        return serde_json::Value::Object(map);
    }

    let moved: Vec<(String, serde_json::Value)> = unknown
        .iter()
        .filter_map(|k| map.remove_entry(k.as_str()))
        .collect();
    let extra = map
        .entry("extra")
        .or_insert_with(|| serde_json::Value::Object(serde_json::Map::new()));
    if let serde_json::Value::Object(extra) = extra {
        for (key, v) in moved {
            tracing::debug!(key = %key, "unknown top-level setting stored in extra");
            extra.entry(key).or_insert(v);
        }
    }
    serde_json::Value::Object(map)
}

/// Converts a TOML value to a `serde_json::Value`.
fn toml_to_json(value: toml::Value) -> serde_json::Value {
    match value {
        toml::Value::String(s) => serde_json::Value::String(s),
        toml::Value::Integer(i) => serde_json::json!(i),
        toml::Value::Float(f) => serde_json::json!(f),
        toml::Value::Boolean(b) => serde_json::Value::Bool(b),
        toml::Value::Datetime(dt) => serde_json::Value::String(dt.to_string()),
        toml::Value::Array(arr) => {
            serde_json::Value::Array(arr.into_iter().map(toml_to_json).collect())
        }
        toml::Value::Table(table) => {
            let map: serde_json::Map<String, serde_json::Value> = table
                .into_iter()
                .map(|(k, v)| (k, toml_to_json(v)))
                .collect();
            serde_json::Value::Object(map)
        }
    }
}

/// Deep-merges two JSON values. The `override_val` takes precedence.
fn merge_json(base: serde_json::Value, override_val: serde_json::Value) -> serde_json::Value {
    match (base, override_val) {
        (serde_json::Value::Object(mut base_map), serde_json::Value::Object(override_map)) => {
            for (key, override_v) in override_map {
                let merged = if let Some(base_v) = base_map.remove(&key) {
                    merge_json(base_v, override_v)
                } else {
                    override_v
                };
                base_map.insert(key, merged);
            }
            serde_json::Value::Object(base_map)
        }
        (_, override_val) => override_val,
    }
}
