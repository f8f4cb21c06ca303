//! Items fetched from an API, with a short-lived in-process cache.

use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::Instrument;
use virtualqueryset_core::logging::source_span;
use virtualqueryset_core::settings::SETTINGS;
use virtualqueryset_core::VirtualResult;

use super::{normalize_items, DataSource, Fetcher};

/// Seconds a response is reused when settings do not say otherwise.
pub const DEFAULT_API_CACHE_TIMEOUT: u64 = 300;

#[derive(Debug)]
struct CachedResponse {
    items: Vec<serde_json::Value>,
    fetched_at: Instant,
}

/// Wraps a [`Fetcher`] and reuses its last response for `cache_timeout`.
///
/// When a fetch fails the previous response is served even if it has
/// expired; with no previous response the source is empty. Failures are
/// logged, never returned. Clones share the cached response.
///
/// # Examples
///
/// ```
/// use std::time::Duration;
/// use virtualqueryset_core::VirtualError;
/// use virtualqueryset_db::source::{ApiSource, DataSource};
///
/// # tokio::runtime::Runtime::new().unwrap().block_on(async {
/// let source = ApiSource::new(|| async {
///     Ok::<_, VirtualError>(serde_json::json!([{"id": 1, "title": "hello"}]))
/// })
/// .with_cache_timeout(Duration::from_secs(60));
///
/// let items = source.load().await.unwrap();
/// assert_eq!(items.len(), 1);
/// # });
/// ```
#[derive(Clone)]
pub struct ApiSource {
    fetcher: Arc<dyn Fetcher>,
    cache_timeout: Duration,
    cache: Arc<RwLock<Option<CachedResponse>>>,
}

impl ApiSource {
    /// Wraps `fetcher` with the configured `api_cache_timeout`.
    pub fn new(fetcher: impl Fetcher + 'static) -> Self {
        Self::from_arc(Arc::new(fetcher))
    }

    /// Wraps an already shared fetcher.
    pub fn from_arc(fetcher: Arc<dyn Fetcher>) -> Self {
        let secs = SETTINGS
            .try_get()
            .map_or(DEFAULT_API_CACHE_TIMEOUT, |s| s.virtual_querysets.api_cache_timeout);
        Self {
            fetcher,
            cache_timeout: Duration::from_secs(secs),
            cache: Arc::new(RwLock::new(None)),
        }
    }

    /// Sets how long a response is reused. Zero disables reuse.
    #[must_use]
    pub fn with_cache_timeout(mut self, timeout: Duration) -> Self {
        self.cache_timeout = timeout;
        self
    }

    /// How long a response is reused.
    pub const fn cache_timeout(&self) -> Duration {
        self.cache_timeout
    }

    /// Drops the cached response and fetches again.
    ///
    /// # Errors
    ///
    /// Never fails; the signature matches [`DataSource::load`].
    pub async fn refresh(&self) -> VirtualResult<Vec<serde_json::Value>> {
        self.cache.write().await.take();
        self.load().await
    }

    async fn fresh_items(&self) -> Option<Vec<serde_json::Value>> {
        let cache = self.cache.read().await;
        cache
            .as_ref()
            .filter(|c| c.fetched_at.elapsed() < self.cache_timeout)
            .map(|c| c.items.clone())
    }

    async fn fetch_or_fallback(&self) -> Vec<serde_json::Value> {
        match self.fetcher.fetch().await {
            Ok(payload) => {
                let items = normalize_items(payload);
                tracing::debug!(count = items.len(), "fetched");
                *self.cache.write().await = Some(CachedResponse {
                    items: items.clone(),
                    fetched_at: Instant::now(),
                });
                items
            }
            Err(e) => {
                let cache = self.cache.read().await;
                if let Some(stale) = cache.as_ref() {
                    tracing::warn!(error = %e, "fetch failed; serving stale response");
                    stale.items.clone()
                } else {
                    tracing::error!(error = %e, "fetch failed; no cached response");
                    Vec::new()
                }
            }
        }
    }
}

#[async_trait]
impl DataSource for ApiSource {
    async fn load(&self) -> VirtualResult<Vec<serde_json::Value>> {
        let span = source_span("api", &self.fetcher.describe());
        async {
            if let Some(items) = self.fresh_items().await {
                tracing::trace!("serving cached response");
                return Ok(items);
            }
            Ok(self.fetch_or_fallback().await)
        }
        .instrument(span)
        .await
    }

    async fn reload(&self) -> VirtualResult<Vec<serde_json::Value>> {
        self.refresh().await
    }

    fn describe(&self) -> String {
        format!("api {}", self.fetcher.describe())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use virtualqueryset_core::VirtualError;

    /// Returns `[{"call": n}]`, failing when `fail` is set.
    struct CountingFetcher {
        calls: Arc<AtomicUsize>,
        fail: Arc<std::sync::atomic::AtomicBool>,
    }

    #[async_trait]
    impl Fetcher for CountingFetcher {
        async fn fetch(&self) -> VirtualResult<serde_json::Value> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            if self.fail.load(Ordering::SeqCst) {
                return Err(VirtualError::FetchError("boom".into()));
            }
            Ok(json!([{"call": n}]))
        }
    }

    fn counting() -> (ApiSource, Arc<AtomicUsize>, Arc<std::sync::atomic::AtomicBool>) {
        let calls = Arc::new(AtomicUsize::new(0));
        let fail = Arc::new(std::sync::atomic::AtomicBool::new(false));
        let source = ApiSource::new(CountingFetcher {
            calls: calls.clone(),
            fail: fail.clone(),
        })
        .with_cache_timeout(Duration::from_secs(60));
        (source, calls, fail)
    }

    #[tokio::test]
    async fn test_serves_cached_response_while_fresh() {
        let (source, calls, _) = counting();
        assert_eq!(source.load().await.unwrap(), vec![json!({"call": 1})]);
        assert_eq!(source.load().await.unwrap(), vec![json!({"call": 1})]);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_clones_share_cache() {
        let (source, calls, _) = counting();
        let clone = source.clone();
        source.load().await.unwrap();
        clone.load().await.unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_refresh_fetches_again() {
        let (source, calls, _) = counting();
        source.load().await.unwrap();
        assert_eq!(source.refresh().await.unwrap(), vec![json!({"call": 2})]);
        assert_eq!(source.reload().await.unwrap(), vec![json!({"call": 3})]);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_zero_timeout_always_fetches() {
        let (source, calls, _) = counting();
        let source = source.with_cache_timeout(Duration::ZERO);
        source.load().await.unwrap();
        source.load().await.unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_failure_serves_stale_copy() {
        let (source, _, fail) = counting();
        let source = source.with_cache_timeout(Duration::ZERO);
        source.load().await.unwrap();
        fail.store(true, Ordering::SeqCst);
        assert_eq!(source.load().await.unwrap(), vec![json!({"call": 1})]);
    }

    #[tokio::test]
    async fn test_failure_without_cache_is_empty() {
        let (source, _, fail) = counting();
        fail.store(true, Ordering::SeqCst);
        assert!(source.load().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_non_list_payload_is_one_item() {
        let source = ApiSource::new(|| async { Ok::<_, VirtualError>(json!({"status": "ok"})) });
        assert_eq!(source.load().await.unwrap(), vec![json!({"status": "ok"})]);
    }

    #[test]
    fn test_default_timeout() {
        let source = ApiSource::new(|| async { Ok::<_, VirtualError>(json!([])) });
        assert_eq!(source.cache_timeout(), Duration::from_secs(DEFAULT_API_CACHE_TIMEOUT));
    }
}
