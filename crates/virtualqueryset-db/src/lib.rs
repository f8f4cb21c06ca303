//! # virtualqueryset-db
//!
//! Querysets over data that does not live in a database. Items come from a
//! [`DataSource`](source::DataSource) (settings, a REST API, JSON, a cache)
//! and are filtered, ordered, and sliced in memory with the same lookup
//! vocabulary as a database-backed queryset.
//!
//! ## Architecture
//!
//! A [`VirtualManager`](manager::VirtualManager) loads its source, converts
//! every item into the model type with
//! [`VirtualModel::from_item`](model::VirtualModel::from_item), and wraps
//! the result in an [`InMemoryQuerySet`](query::InMemoryQuerySet). All
//! queryset operations are synchronous and return new querysets; only
//! loading touches the outside world.
//!
//! ## Module Overview
//!
//! - [`model`] - The [`VirtualModel`](model::VirtualModel) trait and [`VirtualMeta`](model::VirtualMeta)
//! - [`record`] - Field access on serializable records
//! - [`value`] - The [`Value`](value::Value) enum lookups compare against
//! - [`query`] - Lookups, Q objects, ordering, and the queryset
//! - [`source`] - Data sources and fetchers
//! - [`cache`] - Cache backends used by cached sources
//! - [`manager`] - Managers tying models to sources

// These clippy lints are intentionally allowed for the queryset crate:
// - needless_pass_by_value: builder and constructor signatures take owned values
// - missing_const_for_fn: builders that move owned fields are not const
// - return_self_not_must_use: builder pattern methods are self-documenting
// - module_name_repetitions: `CacheBackend` in `cache` reads better than `Backend`
// - float_cmp: lookups compare user-supplied floats exactly
// - cast_precision_loss: i64-to-f64 casts are acceptable for numeric lookups
// - doc_markdown: backtick requirements for documentation items are too strict
// - option_if_let_else: match reads better for fallbacks that log
// - match_same_arms: lookup tables keep one arm per lookup name
#![allow(clippy::needless_pass_by_value)]
#![allow(clippy::missing_const_for_fn)]
#![allow(clippy::return_self_not_must_use)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::float_cmp)]
#![allow(clippy::cast_precision_loss)]
#![allow(clippy::doc_markdown)]
#![allow(clippy::option_if_let_else)]
#![allow(clippy::match_same_arms)]
// significant_drop_tightening: false positives with async RwLock guards
#![allow(clippy::significant_drop_tightening)]

pub mod cache;
pub mod manager;
pub mod model;
pub mod query;
pub mod record;
pub mod source;
pub mod value;

pub use manager::{AdminSource, VirtualManager};
pub use model::{VirtualMeta, VirtualModel};
pub use query::{InMemoryQuerySet, Lookup, OrderBy, Q};
pub use record::Record;
pub use value::Value;
