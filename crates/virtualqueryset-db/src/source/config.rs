//! Items read from a named setting.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::Instrument;
use virtualqueryset_core::logging::source_span;
use virtualqueryset_core::settings::{Settings, SETTINGS};
use virtualqueryset_core::VirtualResult;

use super::{normalize_items, DataSource};

/// Exposes one setting as a list of items.
///
/// | Setting value | Items |
/// |---|---|
/// | missing, `null` | none |
/// | list | the list elements |
/// | map | `{"key": k, "value": v}` per entry, sorted by key |
/// | scalar | the scalar |
///
/// Without explicit settings the global [`SETTINGS`] are read; before they
/// are configured the source is empty.
#[derive(Debug, Clone)]
pub struct ConfigSource {
    setting_name: String,
    settings: Option<Arc<Settings>>,
}

impl ConfigSource {
    /// Reads `setting_name` from the global settings.
    pub fn new(setting_name: impl Into<String>) -> Self {
        Self {
            setting_name: setting_name.into(),
            settings: None,
        }
    }

    /// Reads `setting_name` from the given settings.
    pub fn with_settings(settings: Arc<Settings>, setting_name: impl Into<String>) -> Self {
        Self {
            setting_name: setting_name.into(),
            settings: Some(settings),
        }
    }

    /// The setting being exposed.
    pub fn setting_name(&self) -> &str {
        &self.setting_name
    }

    fn read(&self) -> Vec<serde_json::Value> {
        let settings = match self.settings.as_deref() {
            Some(settings) => settings,
            None => match SETTINGS.try_get() {
                Some(settings) => settings,
                None => {
                    tracing::debug!("settings not configured; no items");
                    return Vec::new();
                }
            },
        };

        match settings.lookup(&self.setting_name) {
            None => {
                tracing::debug!("setting not found");
                Vec::new()
            }
            Some(serde_json::Value::Object(map)) => {
                let mut entries: Vec<_> = map.into_iter().collect();
                entries.sort_by(|(a, _), (b, _)| a.cmp(b));
                entries
                    .into_iter()
                    .map(|(key, value)| serde_json::json!({"key": key, "value": value}))
                    .collect()
            }
            Some(value) => normalize_items(value),
        }
    }
}

#[async_trait]
impl DataSource for ConfigSource {
    async fn load(&self) -> VirtualResult<Vec<serde_json::Value>> {
        let span = source_span("config", &self.setting_name);
        let items = async { self.read() }.instrument(span).await;
        Ok(items)
    }

    fn describe(&self) -> String {
        format!("setting {}", self.setting_name)
    }
}
