//! Data sources that feed virtual querysets.
//!
//! A [`DataSource`] yields the raw JSON items behind a queryset. The
//! built-in sources are:
//!
//! - [`ConfigSource`]: a named setting.
//! - [`ApiSource`]: a [`Fetcher`] with a short-lived response cache.
//! - [`JsonSource`]: JSON text, a file, or an in-memory value.
//! - [`CachedSource`]: a [`Fetcher`] whose results go through a
//!   [`CacheBackend`](crate::cache::CacheBackend).
//! - [`StaticSource`]: a fixed list.
//!
//! Custom sources implement [`DataSource`] directly.

pub mod api;
pub mod cached;
pub mod config;
pub mod fixed;
#[cfg(feature = "http")]
pub mod http;
pub mod json;

use std::future::Future;

use async_trait::async_trait;
use virtualqueryset_core::VirtualResult;

pub use api::ApiSource;
pub use cached::CachedSource;
pub use config::ConfigSource;
pub use fixed::StaticSource;
#[cfg(feature = "http")]
pub use http::HttpFetcher;
pub use json::{JsonInput, JsonSource};

/// Something that produces the items of a virtual queryset.
#[async_trait]
pub trait DataSource: Send + Sync {
    /// Returns the current items.
    async fn load(&self) -> VirtualResult<Vec<serde_json::Value>>;

    /// Returns the items, bypassing any cached copy.
    async fn reload(&self) -> VirtualResult<Vec<serde_json::Value>> {
        self.load().await
    }

    /// A short human-readable description, used in logs.
    fn describe(&self) -> String;
}

/// An async producer of raw JSON, such as an HTTP call.
///
/// Any `Fn() -> impl Future<Output = VirtualResult<serde_json::Value>>`
/// closure is a fetcher. A closure describes itself by its type and its
/// address, so two closures never share a derived cache key; wrap it with
/// [`named`] when the key must be stable across instances and processes.
#[async_trait]
pub trait Fetcher: Send + Sync {
    /// Fetches the current payload.
    async fn fetch(&self) -> VirtualResult<serde_json::Value>;

    /// Identifies the fetcher; cache keys are derived from it.
    fn describe(&self) -> String {
        std::any::type_name::<Self>().to_string()
    }
}

#[async_trait]
impl<F, Fut> Fetcher for F
where
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = VirtualResult<serde_json::Value>> + Send + 'static,
{
    async fn fetch(&self) -> VirtualResult<serde_json::Value> {
        (self)().await
    }

    fn describe(&self) -> String {
        format!("{}@{:p}", std::any::type_name::<F>(), self)
    }
}

/// A [`Fetcher`] with a fixed description. See [`named`].
#[derive(Debug, Clone)]
pub struct Named<F> {
    label: String,
    inner: F,
}

/// Gives `fetcher` an explicit description, from which cache keys are
/// derived.
///
/// ```
/// use virtualqueryset_db::source::{named, Fetcher};
/// use virtualqueryset_core::VirtualError;
///
/// let fetcher = named("products", || async { Ok::<_, VirtualError>(serde_json::json!([])) });
/// assert_eq!(fetcher.describe(), "products");
/// ```
pub fn named<F: Fetcher>(label: impl Into<String>, fetcher: F) -> Named<F> {
    Named {
        label: label.into(),
        inner: fetcher,
    }
}

#[async_trait]
impl<F: Fetcher> Fetcher for Named<F> {
    async fn fetch(&self) -> VirtualResult<serde_json::Value> {
        self.inner.fetch().await
    }

    fn describe(&self) -> String {
        self.label.clone()
    }
}

/// Turns a fetched payload into items: arrays are taken as they are,
/// `null` is empty, and any other value becomes a single item.
pub fn normalize_items(payload: serde_json::Value) -> Vec<serde_json::Value> {
    match payload {
        serde_json::Value::Array(items) => items,
        serde_json::Value::Null => Vec::new(),
        other => vec![other],
    }
}
