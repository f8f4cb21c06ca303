//! Settings for virtualqueryset.
//!
//! [`Settings`] holds the application configuration that
//! configuration-backed querysets expose as virtual models, together with
//! the knobs of the library itself (cache backends, default timeouts, log
//! level). [`LazySettings`] is a globally-accessible, configure-once holder.

use std::collections::HashMap;
use std::sync::OnceLock;

use serde::{Deserialize, Serialize};

/// Cache backend configuration. Omitted fields take their defaults.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheSettings {
    /// The cache backend: `locmem`, `file`, or `dummy`.
    pub backend: String,
    /// The cache location (directory for the file backend).
    pub location: String,
    /// Default entry timeout in seconds.
    pub timeout: u64,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            backend: "locmem".to_string(),
            location: String::new(),
            timeout: 300,
        }
    }
}

/// Defaults applied by the virtual querysets themselves.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VirtualQuerySetSettings {
    /// Seconds an API-backed queryset reuses its last response.
    pub api_cache_timeout: u64,
    /// Seconds a cache-backed queryset keeps fetched data.
    pub cache_timeout: u64,
    /// Prefix prepended to generated cache keys.
    pub cache_key_prefix: String,
    /// The `caches` alias used by cache-backed querysets.
    pub cache_alias: String,
}

impl Default for VirtualQuerySetSettings {
    fn default() -> Self {
        Self {
            api_cache_timeout: 300,
            cache_timeout: 3600,
            cache_key_prefix: String::new(),
            cache_alias: "default".to_string(),
        }
    }
}

/// The complete set of settings.
///
/// Typed fields cover the common framework settings; anything else lives
/// in [`extra`](Settings::extra). Both are reachable by name through
/// [`Settings::lookup`]. The settings loader files unknown top-level keys
/// under `extra`.
///
/// # Examples
///
/// ```
/// use virtualqueryset_core::settings::Settings;
///
/// let settings = Settings::default();
/// assert!(settings.debug);
/// assert_eq!(settings.virtual_querysets.api_cache_timeout, 300);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    // ── Core ─────────────────────────────────────────────────────────

    /// Whether debug mode is enabled.
    pub debug: bool,
    /// Hostnames that this application can serve.
    pub allowed_hosts: Vec<String>,
    /// List of installed application dotted paths.
    pub installed_apps: Vec<String>,
    /// Ordered list of middleware dotted paths.
    pub middleware: Vec<String>,

    // ── Internationalization ─────────────────────────────────────────

    /// The language code (e.g. "en-us").
    pub language_code: String,
    /// The default time zone (e.g. "UTC").
    pub time_zone: String,

    // ── Logging ──────────────────────────────────────────────────────

    /// The log level filter (e.g. "info", "virtualqueryset_db=debug").
    pub log_level: String,

    // ── Cache ────────────────────────────────────────────────────────

    /// Cache backend configurations, keyed by alias (e.g. "default").
    pub caches: HashMap<String, CacheSettings>,

    // ── Virtual querysets ────────────────────────────────────────────

    /// Library defaults.
    pub virtual_querysets: VirtualQuerySetSettings,

    // ── Escape hatch ─────────────────────────────────────────────────

    /// Custom settings that don't fit into the above categories.
    pub extra: HashMap<String, serde_json::Value>,
}

impl Default for Settings {
    fn default() -> Self {
        let mut caches = HashMap::new();
        caches.insert("default".to_string(), CacheSettings::default());

        Self {
            debug: true,
            allowed_hosts: Vec::new(),
            installed_apps: Vec::new(),
            middleware: Vec::new(),
            language_code: "en-us".to_string(),
            time_zone: "UTC".to_string(),
            log_level: "info".to_string(),
            caches,
            virtual_querysets: VirtualQuerySetSettings::default(),
            extra: HashMap::new(),
        }
    }
}

impl Settings {
    /// Resolves a setting by name, the way `getattr(settings, NAME)` would.
    ///
    /// Keys of [`extra`](Self::extra) are matched exactly first; otherwise
    /// the lowercased name is looked up among the typed fields, so
    /// `"INSTALLED_APPS"` resolves to [`installed_apps`](Self::installed_apps).
    /// Returns `None` when nothing matches.
    pub fn lookup(&self, name: &str) -> Option<serde_json::Value> {
        if let Some(value) = self.extra.get(name) {
            return Some(value.clone());
        }

        let field = name.to_lowercase();
        if field == "extra" {
            return None;
        }
        match serde_json::to_value(self) {
            Ok(serde_json::Value::Object(mut map)) => map.remove(&field),
            _ => None,
        }
    }

    /// Returns the cache settings for `alias`, if configured.
    pub fn cache(&self, alias: &str) -> Option<&CacheSettings> {
        self.caches.get(alias)
    }
}

/// A lazily-initialized, globally-accessible settings container.
///
/// Call [`configure`](LazySettings::configure) once at startup, then use
/// [`get`](LazySettings::get) or [`try_get`](LazySettings::try_get).
pub struct LazySettings {
    inner: OnceLock<Settings>,
}

impl Default for LazySettings {
    fn default() -> Self {
        Self::new()
    }
}

impl LazySettings {
    /// Creates a new, unconfigured `LazySettings`.
    pub const fn new() -> Self {
        Self {
            inner: OnceLock::new(),
        }
    }

    /// Configures the settings. Must be called exactly once.
    ///
    /// # Panics
    ///
    /// Panics if settings have already been configured.
    pub fn configure(&self, settings: Settings) {
        self.inner
            .set(settings)
            .expect("Settings have already been configured");
    }

    /// Returns a reference to the configured settings.
    ///
    /// # Panics
    ///
    /// Panics if settings have not been configured.
    pub fn get(&self) -> &Settings {
        self.inner
            .get()
            .expect("Settings have not been configured. Call SETTINGS.configure() first.")
    }

    /// Returns the configured settings, or `None` before configuration.
    pub fn try_get(&self) -> Option<&Settings> {
        self.inner.get()
    }

    /// Returns `true` if settings have been configured.
    pub fn is_configured(&self) -> bool {
        self.inner.get().is_some()
    }
}

/// The global settings instance.
pub static SETTINGS: LazySettings = LazySettings::new();

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_settings() {
        let s = Settings::default();
        assert!(s.debug);
        assert_eq!(s.language_code, "en-us");
        assert_eq!(s.time_zone, "UTC");
        assert_eq!(s.log_level, "info");
        assert_eq!(s.virtual_querysets.api_cache_timeout, 300);
        assert_eq!(s.virtual_querysets.cache_timeout, 3600);
        assert_eq!(s.virtual_querysets.cache_alias, "default");
    }

    #[test]
    fn test_default_cache() {
        let s = Settings::default();
        let cache = s.cache("default").expect("default cache should exist");
        assert_eq!(cache.backend, "locmem");
        assert_eq!(cache.timeout, 300);
    }

    #[test]
    fn test_lookup_typed_field_by_upper_name() {
        let mut s = Settings::default();
        s.installed_apps = vec!["blog".into(), "shop".into()];
        assert_eq!(
            s.lookup("INSTALLED_APPS"),
            Some(serde_json::json!(["blog", "shop"]))
        );
        assert_eq!(s.lookup("TIME_ZONE"), Some(serde_json::json!("UTC")));
    }

    #[test]
    fn test_lookup_extra_takes_precedence() {
        let mut s = Settings::default();
        s.extra
            .insert("TIME_ZONE".into(), serde_json::json!("Europe/Paris"));
        assert_eq!(s.lookup("TIME_ZONE"), Some(serde_json::json!("Europe/Paris")));
    }

    #[test]
    fn test_partial_cache_settings_use_defaults() {
        let cache: CacheSettings =
            serde_json::from_value(serde_json::json!({"backend": "file"})).unwrap();
        assert_eq!(cache.backend, "file");
        assert_eq!(cache.timeout, 300);
        assert!(cache.location.is_empty());

        let vqs: VirtualQuerySetSettings =
            serde_json::from_value(serde_json::json!({"cache_alias": "files"})).unwrap();
        assert_eq!(vqs.cache_alias, "files");
        assert_eq!(vqs.cache_timeout, 3600);
    }

    #[test]
    fn test_lookup_missing() {
        let s = Settings::default();
        assert_eq!(s.lookup("NOPE"), None);
        assert_eq!(s.lookup("EXTRA"), None);
    }

    #[test]
    fn test_lazy_settings_configure_and_get() {
        let lazy = LazySettings::new();
        assert!(!lazy.is_configured());
        assert!(lazy.try_get().is_none());

        let mut settings = Settings::default();
        settings.debug = false;
        lazy.configure(settings);

        assert!(lazy.is_configured());
        assert!(!lazy.get().debug);
    }

    #[test]
    #[should_panic(expected = "already been configured")]
    fn test_lazy_settings_double_configure_panics() {
        let lazy = LazySettings::new();
        lazy.configure(Settings::default());
        lazy.configure(Settings::default());
    }

    #[test]
    #[should_panic(expected = "not been configured")]
    fn test_lazy_settings_get_before_configure_panics() {
        let lazy = LazySettings::new();
        let _ = lazy.get();
    }
}
