//! Fetched items kept in a [`CacheBackend`].

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::Instrument;
use virtualqueryset_core::logging::source_span;
use virtualqueryset_core::settings::SETTINGS;
use virtualqueryset_core::VirtualResult;

use super::{normalize_items, DataSource, Fetcher};
use crate::cache::{cache_from_settings, shared_memory_cache, CacheBackend, CacheValue};

/// Seconds fetched items stay fresh when settings do not say otherwise.
pub const DEFAULT_CACHE_TIMEOUT: u64 = 3600;

/// Cache key base used when no model name is given.
pub const DEFAULT_KEY_BASE: &str = "cached_qs";

/// What is stored under the cache key.
#[derive(Debug, Serialize, Deserialize)]
struct Envelope {
    items: Vec<serde_json::Value>,
    /// Unix milliseconds.
    fetched_at: i64,
}

/// Derives the default cache key: `{base}_{first 8 hex digits of sha256(description)}`.
///
/// ```
/// use virtualqueryset_db::source::cached::generate_cache_key;
///
/// let key = generate_cache_key(Some("Product"), "GET https://example.com/products");
/// assert!(key.starts_with("Product_"));
/// assert_eq!(key.len(), "Product_".len() + 8);
/// ```
pub fn generate_cache_key(model_name: Option<&str>, fetcher_description: &str) -> String {
    let digest = Sha256::digest(fetcher_description.as_bytes());
    let short: String = digest.iter().take(4).map(|b| format!("{b:02x}")).collect();
    format!("{}_{short}", model_name.unwrap_or(DEFAULT_KEY_BASE))
}

/// Wraps a [`Fetcher`] and stores its items in a cache backend.
///
/// Fresh entries (younger than `cache_timeout`) are served without
/// fetching. When a fetch fails, whatever entry is still in the backend is
/// served, expired or not; with no entry the source is empty.
///
/// By default the key is derived from the fetcher description, the
/// timeout comes from `virtual_querysets.cache_timeout`, and the backend is
/// the configured `cache_alias` (the shared in-memory cache when settings
/// are not configured).
#[derive(Clone)]
pub struct CachedSource {
    fetcher: Arc<dyn Fetcher>,
    key: String,
    cache_timeout: Duration,
    backend: Arc<dyn CacheBackend>,
}

impl CachedSource {
    /// Wraps `fetcher` with the default key, timeout and backend.
    pub fn new(fetcher: impl Fetcher + 'static) -> Self {
        let fetcher: Arc<dyn Fetcher> = Arc::new(fetcher);
        let settings = SETTINGS.try_get();
        let secs = settings.map_or(DEFAULT_CACHE_TIMEOUT, |s| s.virtual_querysets.cache_timeout);
        let prefix = settings.map_or("", |s| s.virtual_querysets.cache_key_prefix.as_str());
        let backend = settings
            .and_then(|s| s.cache(&s.virtual_querysets.cache_alias))
            .map_or_else(
                || Ok(shared_memory_cache()),
                cache_from_settings,
            )
            .unwrap_or_else(|e| {
                tracing::warn!(error = %e, "falling back to the shared memory cache");
                shared_memory_cache()
            });
        Self {
            key: format!("{prefix}{}", generate_cache_key(None, &fetcher.describe())),
            fetcher,
            cache_timeout: Duration::from_secs(secs),
            backend,
        }
    }

    /// Derives the key from `model_name` instead of the generic base.
    #[must_use]
    pub fn for_model(mut self, model_name: &str) -> Self {
        let prefix = SETTINGS
            .try_get()
            .map_or("", |s| s.virtual_querysets.cache_key_prefix.as_str());
        self.key = format!(
            "{prefix}{}",
            generate_cache_key(Some(model_name), &self.fetcher.describe())
        );
        self
    }

    /// Uses an explicit cache key, exactly as given: the configured
    /// `cache_key_prefix` only applies to derived keys.
    #[must_use]
    pub fn with_key(mut self, key: impl Into<String>) -> Self {
        self.key = key.into();
        self
    }

    /// Sets how long fetched items stay fresh.
    #[must_use]
    pub fn with_cache_timeout(mut self, timeout: Duration) -> Self {
        self.cache_timeout = timeout;
        self
    }

    /// Stores entries in `backend`.
    #[must_use]
    pub fn with_backend(mut self, backend: Arc<dyn CacheBackend>) -> Self {
        self.backend = backend;
        self
    }

    /// The cache key.
    pub fn key(&self) -> &str {
        &self.key
    }

    /// How long fetched items stay fresh.
    pub const fn cache_timeout(&self) -> Duration {
        self.cache_timeout
    }

    /// Removes the cached entry.
    ///
    /// # Errors
    ///
    /// Propagates backend errors.
    pub async fn invalidate(&self) -> VirtualResult<()> {
        self.backend.delete(&self.key).await?;
        Ok(())
    }

    /// Removes the cached entry and fetches again.
    ///
    /// # Errors
    ///
    /// Propagates backend errors from the invalidation.
    pub async fn refresh(&self) -> VirtualResult<Vec<serde_json::Value>> {
        self.invalidate().await?;
        self.load().await
    }

    async fn cached_envelope(&self) -> Option<Envelope> {
        match self.backend.get(&self.key).await {
            Ok(Some(CacheValue::Json(json))) => match serde_json::from_value(json) {
                Ok(envelope) => Some(envelope),
                Err(e) => {
                    tracing::warn!(error = %e, "ignoring malformed cache entry");
                    None
                }
            },
            Ok(_) => None,
            Err(e) => {
                tracing::warn!(error = %e, "cache read failed");
                None
            }
        }
    }

    fn is_fresh(&self, envelope: &Envelope, now_ms: i64) -> bool {
        let timeout_ms = i64::try_from(self.cache_timeout.as_millis()).unwrap_or(i64::MAX);
        now_ms.saturating_sub(envelope.fetched_at) < timeout_ms
    }

    async fn store(&self, items: &[serde_json::Value], now_ms: i64) {
        let envelope = serde_json::json!({"items": items, "fetched_at": now_ms});
        if let Err(e) = self
            .backend
            .set(&self.key, CacheValue::Json(envelope), None)
            .await
        {
            tracing::warn!(error = %e, "cache write failed");
        }
    }
}

#[async_trait]
impl DataSource for CachedSource {
    async fn load(&self) -> VirtualResult<Vec<serde_json::Value>> {
        let span = source_span("cached", &self.key);
        async {
            let now_ms = chrono::Utc::now().timestamp_millis();
            let cached = self.cached_envelope().await;
            if let Some(envelope) = cached.as_ref().filter(|e| self.is_fresh(e, now_ms)) {
                tracing::trace!("cache hit");
                return Ok(envelope.items.clone());
            }

            match self.fetcher.fetch().await {
                Ok(payload) => {
                    let items = normalize_items(payload);
                    tracing::debug!(count = items.len(), "fetched");
                    self.store(&items, now_ms).await;
                    Ok(items)
                }
                Err(e) => match cached {
                    Some(stale) => {
                        tracing::warn!(error = %e, "fetch failed; serving expired cache entry");
                        Ok(stale.items)
                    }
                    None => {
                        tracing::error!(error = %e, "fetch failed; nothing cached");
                        Ok(Vec::new())
                    }
                },
            }
        }
        .instrument(span)
        .await
    }

    async fn reload(&self) -> VirtualResult<Vec<serde_json::Value>> {
        self.refresh().await
    }

    fn describe(&self) -> String {
        format!("cached {}", self.key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::{DummyCache, InMemoryCache};
    use crate::source::named;
    use serde_json::json;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use virtualqueryset_core::VirtualError;

    struct Flaky {
        calls: Arc<AtomicUsize>,
        fail: Arc<AtomicBool>,
    }

    #[async_trait]
    impl Fetcher for Flaky {
        async fn fetch(&self) -> VirtualResult<serde_json::Value> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            if self.fail.load(Ordering::SeqCst) {
                return Err(VirtualError::FetchError("upstream down".into()));
            }
            Ok(json!([{"call": n}]))
        }

        fn describe(&self) -> String {
            "flaky".to_string()
        }
    }

    fn flaky(backend: Arc<dyn CacheBackend>) -> (CachedSource, Arc<AtomicUsize>, Arc<AtomicBool>) {
        let calls = Arc::new(AtomicUsize::new(0));
        let fail = Arc::new(AtomicBool::new(false));
        let source = CachedSource::new(Flaky {
            calls: calls.clone(),
            fail: fail.clone(),
        })
        .with_backend(backend);
        (source, calls, fail)
    }

    #[test]
    fn test_generate_cache_key() {
        let a = generate_cache_key(Some("Product"), "flaky");
        let b = generate_cache_key(Some("Product"), "flaky");
        let c = generate_cache_key(Some("Product"), "other");
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert!(generate_cache_key(None, "flaky").starts_with("cached_qs_"));
    }

    #[test]
    fn test_default_key_and_timeout() {
        let (source, _, _) = flaky(Arc::new(DummyCache));
        assert_eq!(source.key(), generate_cache_key(None, "flaky"));
        assert_eq!(source.cache_timeout(), Duration::from_secs(DEFAULT_CACHE_TIMEOUT));
        let source = source.for_model("Product");
        assert!(source.key().starts_with("Product_"));
        assert_eq!(source.with_key("custom").key(), "custom");
    }

    #[tokio::test]
    async fn test_closures_for_one_model_get_separate_entries() {
        let backend: Arc<dyn CacheBackend> = Arc::new(InMemoryCache::new());
        let products = CachedSource::new(|| async {
            Ok::<_, VirtualError>(json!([{"kind": "product"}]))
        })
        .for_model("Item")
        .with_backend(backend.clone());
        let users = CachedSource::new(|| async {
            Ok::<_, VirtualError>(json!([{"kind": "user"}]))
        })
        .for_model("Item")
        .with_backend(backend);

        assert_ne!(products.key(), users.key());
        assert!(users.key().starts_with("Item_"));
        assert_eq!(products.load().await.unwrap(), vec![json!({"kind": "product"})]);
        assert_eq!(users.load().await.unwrap(), vec![json!({"kind": "user"})]);
    }

    #[test]
    fn test_named_fetcher_key_is_stable() {
        let fetch = || async { Ok::<_, VirtualError>(json!([])) };
        let first = CachedSource::new(named("catalog", fetch)).for_model("Item");
        let second = CachedSource::new(named("catalog", fetch)).for_model("Item");
        assert_eq!(first.key(), second.key());
        assert_eq!(first.key(), generate_cache_key(Some("Item"), "catalog"));
    }

    #[tokio::test]
    async fn test_hit_within_timeout() {
        let (source, calls, _) = flaky(Arc::new(InMemoryCache::new()));
        source.load().await.unwrap();
        assert_eq!(source.load().await.unwrap(), vec![json!({"call": 1})]);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_sources_sharing_a_backend_share_entries() {
        let backend: Arc<dyn CacheBackend> = Arc::new(InMemoryCache::new());
        let (first, first_calls, _) = flaky(backend.clone());
        let (second, second_calls, _) = flaky(backend);
        first.load().await.unwrap();
        assert_eq!(second.load().await.unwrap(), vec![json!({"call": 1})]);
        assert_eq!(first_calls.load(Ordering::SeqCst), 1);
        assert_eq!(second_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_expired_entry_is_refetched() {
        let (source, calls, _) = flaky(Arc::new(InMemoryCache::new()));
        let source = source.with_cache_timeout(Duration::ZERO);
        source.load().await.unwrap();
        assert_eq!(source.load().await.unwrap(), vec![json!({"call": 2})]);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_failure_serves_expired_entry() {
        let (source, _, fail) = flaky(Arc::new(InMemoryCache::new()));
        let source = source.with_cache_timeout(Duration::ZERO);
        source.load().await.unwrap();
        fail.store(true, Ordering::SeqCst);
        assert_eq!(source.load().await.unwrap(), vec![json!({"call": 1})]);
    }

    #[tokio::test]
    async fn test_failure_without_entry_is_empty() {
        let (source, _, fail) = flaky(Arc::new(InMemoryCache::new()));
        fail.store(true, Ordering::SeqCst);
        assert!(source.load().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_invalidate_and_refresh() {
        let backend = InMemoryCache::new();
        let (source, calls, _) = flaky(Arc::new(backend.clone()));
        source.load().await.unwrap();
        source.invalidate().await.unwrap();
        assert!(!backend.has_key(source.key()).await.unwrap());

        assert_eq!(source.refresh().await.unwrap(), vec![json!({"call": 2})]);
        assert_eq!(source.reload().await.unwrap(), vec![json!({"call": 3})]);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_malformed_entry_is_ignored() {
        let backend = InMemoryCache::new();
        let (source, calls, _) = flaky(Arc::new(backend.clone()));
        backend
            .set(source.key(), CacheValue::String("garbage".into()), None)
            .await
            .unwrap();
        assert_eq!(source.load().await.unwrap(), vec![json!({"call": 1})]);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_envelope_shape() {
        let backend = InMemoryCache::new();
        let (source, _, _) = flaky(Arc::new(backend.clone()));
        source.load().await.unwrap();
        let stored = backend.get(source.key()).await.unwrap().unwrap();
        let stored = stored.into_json().unwrap();
        assert_eq!(stored["items"], json!([{"call": 1}]));
        assert!(stored["fetched_at"].is_i64());
    }
}
