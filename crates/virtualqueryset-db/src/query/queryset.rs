//! The in-memory QuerySet.
//!
//! [`InMemoryQuerySet`] is a materialised list of records that answers the
//! QuerySet API (`filter`, `exclude`, `order_by`, `get`, `values`, ...) by
//! scanning and sorting in memory. Every chaining method returns a new
//! queryset and leaves the receiver untouched.
//!
//! # Examples
//!
//! ```
//! use virtualqueryset_db::query::{InMemoryQuerySet, Q};
//! use serde_json::json;
//!
//! let qs = InMemoryQuerySet::new(vec![
//!     json!({"name": "banana", "price": 3}),
//!     json!({"name": "Apple", "price": 5}),
//!     json!({"name": "cherry", "price": 1}),
//! ]);
//!
//! let cheap = qs.filter(&Q::kwarg("price__lt", 4).unwrap()).order_by(&["name"]);
//! let names = cheap.values_list_flat("name");
//! assert_eq!(names, vec!["banana".into(), "cherry".into()]);
//!
//! assert_eq!(qs.order_by(&["-price"]).first().unwrap()["name"], "Apple");
//! ```

use std::collections::HashSet;
use std::fmt;
use std::ops::{Bound, RangeBounds};

use virtualqueryset_core::{VirtualError, VirtualResult};

use super::lookups::Q;
use super::ordering::OrderBy;
use crate::model::VirtualModel;
use crate::record::Record;
use crate::value::Value;

/// Model name used in error messages when none is set.
pub const DEFAULT_MODEL_NAME: &str = "Object";

/// A list of records with QuerySet semantics.
#[derive(Clone)]
pub struct InMemoryQuerySet<R: Record> {
    items: Vec<R>,
    model_name: String,
    ordering: Vec<OrderBy>,
}

impl<R: Record> Default for InMemoryQuerySet<R> {
    fn default() -> Self {
        Self::new(Vec::new())
    }
}

impl<R: Record> fmt::Debug for InMemoryQuerySet<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InMemoryQuerySet")
            .field("model_name", &self.model_name)
            .field("len", &self.items.len())
            .field("ordering", &self.ordering)
            .finish()
    }
}

impl<R: Record> FromIterator<R> for InMemoryQuerySet<R> {
    fn from_iter<I: IntoIterator<Item = R>>(iter: I) -> Self {
        Self::new(iter.into_iter().collect())
    }
}

impl<M: VirtualModel> InMemoryQuerySet<M> {
    /// Creates a queryset whose errors name `M`.
    pub fn for_model(items: Vec<M>) -> Self {
        Self::new(items).with_model_name(M::meta().object_name.clone())
    }
}

impl<R: Record> InMemoryQuerySet<R> {
    /// Creates a queryset over `items`, in the given order.
    pub fn new(items: Vec<R>) -> Self {
        Self {
            items,
            model_name: DEFAULT_MODEL_NAME.to_string(),
            ordering: Vec::new(),
        }
    }

    /// Sets the model name used in `get()` error messages.
    #[must_use]
    pub fn with_model_name(mut self, name: impl Into<String>) -> Self {
        self.model_name = name.into();
        self
    }

    /// The model name used in error messages.
    pub fn model_name(&self) -> &str {
        &self.model_name
    }

    /// The ordering applied by the last `order_by`/`reverse`.
    pub fn ordering(&self) -> &[OrderBy] {
        &self.ordering
    }

    /// Returns `true` if an ordering has been applied.
    pub fn is_ordered(&self) -> bool {
        !self.ordering.is_empty()
    }

    // ── Inspection ──────────────────────────────────────────────────

    /// The number of records.
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Alias of [`len`](Self::len), following the QuerySet API.
    pub fn count(&self) -> usize {
        self.items.len()
    }

    /// Returns `true` if there are no records.
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Returns `true` if there is at least one record.
    pub fn exists(&self) -> bool {
        !self.items.is_empty()
    }

    /// The first record, if any.
    pub fn first(&self) -> Option<&R> {
        self.items.first()
    }

    /// The last record, if any.
    pub fn last(&self) -> Option<&R> {
        self.items.last()
    }

    /// The record at `index`, if in bounds.
    pub fn get_index(&self, index: usize) -> Option<&R> {
        self.items.get(index)
    }

    /// Iterates over the records.
    pub fn iter(&self) -> std::slice::Iter<'_, R> {
        self.items.iter()
    }

    /// The records as a slice.
    pub fn as_slice(&self) -> &[R] {
        &self.items
    }

    /// Consumes the queryset, returning its records.
    pub fn into_vec(self) -> Vec<R> {
        self.items
    }

    // ── Chaining ────────────────────────────────────────────────────

    /// A copy of this queryset.
    #[must_use]
    pub fn all(&self) -> Self {
        self.clone()
    }

    /// An empty queryset with the same model name and ordering.
    #[must_use]
    pub fn none(&self) -> Self {
        self.with_items(Vec::new())
    }

    /// The records within `range`. Out-of-range bounds are clamped.
    #[must_use]
    pub fn slice(&self, range: impl RangeBounds<usize>) -> Self {
        let len = self.items.len();
        let start = match range.start_bound() {
            Bound::Included(&s) => s,
            Bound::Excluded(&s) => s.saturating_add(1),
            Bound::Unbounded => 0,
        }
        .min(len);
        let end = match range.end_bound() {
            Bound::Included(&e) => e.saturating_add(1),
            Bound::Excluded(&e) => e,
            Bound::Unbounded => len,
        }
        .clamp(start, len);
        self.with_items(self.items[start..end].to_vec())
    }

    /// The records matching `q`.
    #[must_use]
    pub fn filter(&self, q: &Q) -> Self {
        self.retain(q, true)
    }

    /// The records not matching `q`.
    #[must_use]
    pub fn exclude(&self, q: &Q) -> Self {
        self.retain(q, false)
    }

    /// Keyword-style [`filter`](Self::filter): `&[("price__gte", 10.into())]`.
    ///
    /// # Errors
    ///
    /// Returns [`VirtualError::InvalidLookup`] for a malformed key or argument.
    pub fn filter_kwargs<K, V, I>(&self, kwargs: I) -> VirtualResult<Self>
    where
        K: AsRef<str>,
        V: Into<Value>,
        I: IntoIterator<Item = (K, V)>,
    {
        Ok(self.filter(&Q::kwargs(kwargs)?))
    }

    /// Keyword-style [`exclude`](Self::exclude). All keywords must match
    /// for a record to be dropped.
    ///
    /// # Errors
    ///
    /// Returns [`VirtualError::InvalidLookup`] for a malformed key or argument.
    pub fn exclude_kwargs<K, V, I>(&self, kwargs: I) -> VirtualResult<Self>
    where
        K: AsRef<str>,
        V: Into<Value>,
        I: IntoIterator<Item = (K, V)>,
    {
        Ok(self.exclude(&Q::kwargs(kwargs)?))
    }

    fn retain(&self, q: &Q, keep_matches: bool) -> Self {
        let hits = q.matches_all(&self.items);
        let items = self
            .items
            .iter()
            .zip(hits)
            .filter(|(_, hit)| *hit == keep_matches)
            .map(|(item, _)| item.clone())
            .collect();
        self.with_items(items)
    }

    /// Sorts by the given fields; a leading `-` sorts that field descending.
    ///
    /// The sort is stable, `Null` sorts as the empty string, and strings
    /// compare case-insensitively. Empty field names are ignored; an empty
    /// list clears the recorded ordering without moving anything.
    #[must_use]
    pub fn order_by<S: AsRef<str>>(&self, fields: &[S]) -> Self {
        let ordering: Vec<OrderBy> = fields
            .iter()
            .filter_map(|f| OrderBy::parse(f.as_ref()))
            .collect();
        let mut qs = self.clone();
        qs.ordering.clone_from(&ordering);
        if ordering.is_empty() {
            return qs;
        }

        let mut keyed: Vec<(Vec<Value>, R)> = qs
            .items
            .into_iter()
            .map(|item| {
                let key = ordering.iter().map(|o| item.field(&o.column)).collect();
                (key, item)
            })
            .collect();
        keyed.sort_by(|(a, _), (b, _)| {
            ordering
                .iter()
                .zip(a.iter().zip(b))
                .map(|(order, (x, y))| order.compare(x, y))
                .find(|ord| ord.is_ne())
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        qs.items = keyed.into_iter().map(|(_, item)| item).collect();
        qs
    }

    /// Reverses the records and flips the recorded ordering.
    #[must_use]
    pub fn reverse(&self) -> Self {
        let mut qs = self.clone();
        qs.items.reverse();
        qs.ordering = qs.ordering.iter().map(OrderBy::flipped).collect();
        qs
    }

    /// Keeps the first record for each distinct combination of `fields`
    /// (all public fields when `fields` is empty).
    #[must_use]
    pub fn distinct<S: AsRef<str>>(&self, fields: &[S]) -> Self {
        let mut seen = HashSet::new();
        let items = self
            .items
            .iter()
            .filter(|item| {
                let key = if fields.is_empty() {
                    serde_json::Value::Object(item.to_fields())
                } else {
                    fields
                        .iter()
                        .map(|f| item.field(f.as_ref()).to_json())
                        .collect()
                };
                seen.insert(distinct_key(key).to_string())
            })
            .cloned()
            .collect();
        self.with_items(items)
    }

    // ── Retrieval ───────────────────────────────────────────────────

    /// The single record matching `q`.
    ///
    /// # Errors
    ///
    /// Returns [`VirtualError::DoesNotExist`] when nothing matches and
    /// [`VirtualError::MultipleObjectsReturned`] when more than one does.
    pub fn get(&self, q: &Q) -> VirtualResult<R> {
        let mut matches = self.filter(q).items;
        match matches.len() {
            1 => Ok(matches.remove(0)),
            0 => Err(VirtualError::DoesNotExist(format!(
                "{} matching query does not exist.",
                self.model_name
            ))),
            n => Err(VirtualError::MultipleObjectsReturned(format!(
                "get() returned more than one {} -- it returned {n}!",
                self.model_name
            ))),
        }
    }

    /// Keyword-style [`get`](Self::get).
    ///
    /// # Errors
    ///
    /// As [`get`](Self::get), plus [`VirtualError::InvalidLookup`] for a
    /// malformed keyword.
    pub fn get_kwargs<K, V, I>(&self, kwargs: I) -> VirtualResult<R>
    where
        K: AsRef<str>,
        V: Into<Value>,
        I: IntoIterator<Item = (K, V)>,
    {
        self.get(&Q::kwargs(kwargs)?)
    }

    /// One JSON map per record with the requested fields, or every public
    /// field when `fields` is empty. Missing fields are `null`.
    pub fn values<S: AsRef<str>>(&self, fields: &[S]) -> Vec<serde_json::Map<String, serde_json::Value>> {
        self.items
            .iter()
            .map(|item| {
                if fields.is_empty() {
                    item.to_fields()
                } else {
                    fields
                        .iter()
                        .map(|f| (f.as_ref().to_string(), item.field(f.as_ref()).to_json()))
                        .collect()
                }
            })
            .collect()
    }

    /// One row of values per record, in field order. An empty `fields`
    /// selects every public field.
    pub fn values_list<S: AsRef<str>>(&self, fields: &[S]) -> Vec<Vec<Value>> {
        self.items
            .iter()
            .map(|item| {
                if fields.is_empty() {
                    item.to_fields().into_iter().map(|(_, v)| Value::from(v)).collect()
                } else {
                    fields.iter().map(|f| item.field(f.as_ref())).collect()
                }
            })
            .collect()
    }

    /// The values of a single field, one per record.
    pub fn values_list_flat(&self, field: &str) -> Vec<Value> {
        self.items.iter().map(|item| item.field(field)).collect()
    }

    // ── Conversion ──────────────────────────────────────────────────

    /// Converts every record, keeping model name and ordering.
    ///
    /// # Errors
    ///
    /// Returns the first error produced by `f`.
    pub fn map_items<T, F>(self, f: F) -> VirtualResult<InMemoryQuerySet<T>>
    where
        T: Record,
        F: FnMut(R) -> VirtualResult<T>,
    {
        let items = self.items.into_iter().map(f).collect::<VirtualResult<Vec<_>>>()?;
        Ok(InMemoryQuerySet {
            items,
            model_name: self.model_name,
            ordering: self.ordering,
        })
    }

    fn with_items(&self, items: Vec<R>) -> Self {
        Self {
            items,
            model_name: self.model_name.clone(),
            ordering: self.ordering.clone(),
        }
    }
}

impl<R: Record> IntoIterator for InMemoryQuerySet<R> {
    type Item = R;
    type IntoIter = std::vec::IntoIter<R>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.into_iter()
    }
}

impl<'a, R: Record> IntoIterator for &'a InMemoryQuerySet<R> {
    type Item = &'a R;
    type IntoIter = std::slice::Iter<'a, R>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.iter()
    }
}

/// Canonical form for `distinct`: integral floats become integers, so
/// `1` and `1.0` collapse the way [`Value::loose_eq`] treats them.
fn distinct_key(value: serde_json::Value) -> serde_json::Value {
    match value {
        serde_json::Value::Number(n) => match n.as_f64() {
            #[allow(clippy::cast_possible_truncation, clippy::float_cmp)]
            Some(f) if n.is_f64() && f.fract() == 0.0 && f.abs() < 9.0e15 => {
                serde_json::Value::from(f as i64)
            }
            _ => serde_json::Value::Number(n),
        },
        serde_json::Value::Array(items) => items.into_iter().map(distinct_key).collect(),
        serde_json::Value::Object(map) => serde_json::Value::Object(
            map.into_iter().map(|(k, v)| (k, distinct_key(v))).collect(),
        ),
        other => other,
    }
}
