//! Managers: the entry point from a virtual model to its queryset.
//!
//! A [`VirtualManager`] pairs a model type with a [`DataSource`]. Each call
//! to [`get_queryset`](VirtualManager::get_queryset) loads the source,
//! converts the items with [`VirtualModel::from_item`] and applies the
//! model's default ordering.
//!
//! # Examples
//!
//! ```
//! use virtualqueryset_db::manager::VirtualManager;
//! use virtualqueryset_db::query::Q;
//!
//! # tokio::runtime::Runtime::new().unwrap().block_on(async {
//! let objects: VirtualManager<serde_json::Value> = VirtualManager::from_items(vec![
//!     serde_json::json!({"id": 1, "name": "alpha"}),
//!     serde_json::json!({"id": 2, "name": "beta"}),
//! ]);
//!
//! let beta = objects.get(&Q::kwarg("name", "beta").unwrap()).await.unwrap();
//! assert_eq!(beta["id"], 2);
//! assert_eq!(objects.count().await.unwrap(), 2);
//! # });
//! ```

use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use virtualqueryset_core::VirtualResult;

use crate::model::{VirtualMeta, VirtualModel};
use crate::query::{InMemoryQuerySet, Q};
use crate::source::{
    ApiSource, CachedSource, ConfigSource, DataSource, Fetcher, JsonInput, JsonSource,
    StaticSource,
};

/// Loads querysets of `M` from a data source.
pub struct VirtualManager<M: VirtualModel> {
    source: Arc<dyn DataSource>,
    _model: PhantomData<fn() -> M>,
}

impl<M: VirtualModel> Clone for VirtualManager<M> {
    fn clone(&self) -> Self {
        Self {
            source: Arc::clone(&self.source),
            _model: PhantomData,
        }
    }
}

impl<M: VirtualModel> fmt::Debug for VirtualManager<M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VirtualManager")
            .field("model", &M::meta().object_name)
            .field("source", &self.source.describe())
            .finish()
    }
}

impl<M: VirtualModel> VirtualManager<M> {
    /// Uses a custom source.
    pub fn from_source(source: impl DataSource + 'static) -> Self {
        Self::from_arc(Arc::new(source))
    }

    /// Uses an already shared source.
    pub fn from_arc(source: Arc<dyn DataSource>) -> Self {
        Self {
            source,
            _model: PhantomData,
        }
    }

    /// Serves a fixed list of items.
    pub fn from_items(items: Vec<serde_json::Value>) -> Self {
        Self::from_source(StaticSource::new(items))
    }

    /// Exposes a setting (see [`ConfigSource`]).
    pub fn config(setting_name: impl Into<String>) -> Self {
        Self::from_source(ConfigSource::new(setting_name))
    }

    /// Fetches through `fetcher`, reusing responses for `cache_timeout`
    /// (see [`ApiSource`]).
    pub fn api(fetcher: impl Fetcher + 'static, cache_timeout: Duration) -> Self {
        Self::from_source(ApiSource::new(fetcher).with_cache_timeout(cache_timeout))
    }

    /// Reads JSON (see [`JsonSource`]).
    pub fn json(input: impl Into<JsonInput>, json_path: Option<&str>) -> Self {
        let source = JsonSource::new(input);
        let source = match json_path {
            Some(path) => source.with_json_path(path),
            None => source,
        };
        Self::from_source(source)
    }

    /// Fetches through `fetcher` and keeps the items in the configured
    /// cache (see [`CachedSource`]). Without an explicit key, the key is
    /// derived from the model name.
    pub fn cached(
        fetcher: impl Fetcher + 'static,
        cache_key: Option<String>,
        cache_timeout: Duration,
    ) -> Self {
        let source = CachedSource::new(fetcher)
            .for_model(&M::meta().object_name)
            .with_cache_timeout(cache_timeout);
        let source = match cache_key {
            Some(key) => source.with_key(key),
            None => source,
        };
        Self::from_source(source)
    }

    /// The source behind this manager.
    pub fn source(&self) -> &Arc<dyn DataSource> {
        &self.source
    }

    /// The model's metadata.
    pub fn meta(&self) -> &'static VirtualMeta {
        M::meta()
    }

    /// Loads a fresh queryset.
    ///
    /// # Errors
    ///
    /// Propagates source errors and item conversion errors.
    pub async fn get_queryset(&self) -> VirtualResult<InMemoryQuerySet<M>> {
        let items = self.source.load().await?;
        Self::build(items)
    }

    /// Re-reads the source, bypassing source-level caches, and returns a
    /// fresh queryset.
    ///
    /// # Errors
    ///
    /// Propagates source errors and item conversion errors.
    pub async fn reload(&self) -> VirtualResult<InMemoryQuerySet<M>> {
        let items = self.source.reload().await?;
        Self::build(items)
    }

    fn build(items: Vec<serde_json::Value>) -> VirtualResult<InMemoryQuerySet<M>> {
        let records = items
            .into_iter()
            .map(M::from_item)
            .collect::<VirtualResult<Vec<_>>>()?;
        let qs = InMemoryQuerySet::for_model(records);
        let ordering = &M::meta().ordering;
        Ok(if ordering.is_empty() {
            qs
        } else {
            qs.order_by(ordering.as_slice())
        })
    }

    // ── Shortcuts ───────────────────────────────────────────────────

    /// Every record.
    ///
    /// # Errors
    ///
    /// As [`get_queryset`](Self::get_queryset).
    pub async fn all(&self) -> VirtualResult<InMemoryQuerySet<M>> {
        self.get_queryset().await
    }

    /// The records matching `q`.
    ///
    /// # Errors
    ///
    /// As [`get_queryset`](Self::get_queryset).
    pub async fn filter(&self, q: &Q) -> VirtualResult<InMemoryQuerySet<M>> {
        Ok(self.get_queryset().await?.filter(q))
    }

    /// The records not matching `q`.
    ///
    /// # Errors
    ///
    /// As [`get_queryset`](Self::get_queryset).
    pub async fn exclude(&self, q: &Q) -> VirtualResult<InMemoryQuerySet<M>> {
        Ok(self.get_queryset().await?.exclude(q))
    }

    /// The single record matching `q`.
    ///
    /// # Errors
    ///
    /// As [`InMemoryQuerySet::get`], plus load errors.
    pub async fn get(&self, q: &Q) -> VirtualResult<M> {
        self.get_queryset().await?.get(q)
    }

    /// The number of records.
    ///
    /// # Errors
    ///
    /// As [`get_queryset`](Self::get_queryset).
    pub async fn count(&self) -> VirtualResult<usize> {
        Ok(self.get_queryset().await?.count())
    }

    /// Every record, sorted by `fields`.
    ///
    /// # Errors
    ///
    /// As [`get_queryset`](Self::get_queryset).
    pub async fn order_by<S: AsRef<str> + Sync>(
        &self,
        fields: &[S],
    ) -> VirtualResult<InMemoryQuerySet<M>> {
        Ok(self.get_queryset().await?.order_by(fields))
    }
}

/// A manager with its model type erased, as held by the admin.
///
/// Records come back as JSON objects of their public fields.
#[async_trait]
pub trait AdminSource: Send + Sync {
    /// The model's metadata.
    fn meta(&self) -> &'static VirtualMeta;

    /// Loads the records.
    async fn records(&self) -> VirtualResult<InMemoryQuerySet<serde_json::Value>>;
}

#[async_trait]
impl<M: VirtualModel> AdminSource for VirtualManager<M> {
    fn meta(&self) -> &'static VirtualMeta {
        M::meta()
    }

    async fn records(&self) -> VirtualResult<InMemoryQuerySet<serde_json::Value>> {
        self.get_queryset()
            .await?
            .map_items(|record| Ok(serde_json::Value::Object(record.to_fields())))
    }
}
