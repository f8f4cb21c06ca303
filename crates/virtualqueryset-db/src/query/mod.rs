//! Filtering, ordering, and the in-memory queryset.
//!
//! - [`lookups`] - Q objects and lookup types for filtering
//! - [`ordering`] - Sort keys for `order_by`
//! - [`queryset`] - [`InMemoryQuerySet`], the list-backed queryset

pub mod lookups;
pub mod ordering;
pub mod queryset;

pub use lookups::{Lookup, Q, LOOKUP_NAMES};
pub use ordering::OrderBy;
pub use queryset::{InMemoryQuerySet, DEFAULT_MODEL_NAME};
