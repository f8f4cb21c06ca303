//! # virtualqueryset
//!
//! QuerySet-compatible collections for data that does not live in a
//! database: settings, REST APIs, JSON documents and cached fetches.
//!
//! This is the meta-crate that re-exports the sub-crates. Depend on it to
//! get everything, or on the individual crates for finer-grained control.
//!
//! ```
//! use virtualqueryset::prelude::*;
//!
//! # tokio::runtime::Runtime::new().unwrap().block_on(async {
//! let objects: VirtualManager<serde_json::Value> = VirtualManager::from_items(vec![
//!     serde_json::json!({"code": "card", "enabled": true}),
//!     serde_json::json!({"code": "cash", "enabled": false}),
//! ]);
//! let enabled = objects.filter(&Q::kwarg("enabled", true).unwrap()).await.unwrap();
//! assert_eq!(enabled.count(), 1);
//! # });
//! ```

/// Settings, error types, and logging setup.
pub use virtualqueryset_core as core;

/// Values, lookups, the in-memory queryset, data sources, caches, and managers.
#[cfg(feature = "db")]
pub use virtualqueryset_db as db;

/// Read-only admin API for virtual models.
#[cfg(feature = "admin")]
pub use virtualqueryset_admin as admin;

// Third-party re-exports
pub use async_trait;
pub use axum;
pub use serde;
pub use serde_json;
pub use tokio;
pub use tracing;

/// The types most programs need.
pub mod prelude {
    pub use virtualqueryset_core::{VirtualError, VirtualResult, SETTINGS};

    #[cfg(feature = "db")]
    pub use virtualqueryset_db::source::{
        named, ApiSource, CachedSource, ConfigSource, DataSource, Fetcher, JsonSource,
        StaticSource,
    };
    #[cfg(feature = "db")]
    pub use virtualqueryset_db::{
        InMemoryQuerySet, Lookup, OrderBy, Q, Record, Value, VirtualManager, VirtualMeta,
        VirtualModel,
    };
    #[cfg(all(feature = "db", feature = "http"))]
    pub use virtualqueryset_db::source::HttpFetcher;

    #[cfg(feature = "admin")]
    pub use virtualqueryset_admin::{ModelAdmin, VirtualAdminSite};
}
