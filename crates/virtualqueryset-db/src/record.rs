//! Field access for in-memory records.
//!
//! A [`Record`] is anything an [`InMemoryQuerySet`](crate::query::InMemoryQuerySet)
//! can hold. Fields are read by name; `__` separates the segments of a
//! path into nested objects (`owner__name`), and a purely numeric segment
//! indexes into an array (`tags__0`).
//!
//! Typed models get the default implementation, which goes through their
//! `Serialize` output. Raw `serde_json::Value` items implement the trait
//! directly.

use serde::Serialize;

use crate::value::Value;

/// The field under which scalar (non-object) items expose their value.
pub const SCALAR_FIELD: &str = "value";

/// An item held by an in-memory queryset.
pub trait Record: Serialize + Clone + Send + Sync + 'static {
    /// Returns this record as JSON.
    fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or(serde_json::Value::Null)
    }

    /// Reads the value at a `__`-separated field path.
    ///
    /// Missing fields read as [`Value::Null`].
    fn field(&self, path: &str) -> Value {
        field_of(&self.to_json(), path)
    }

    /// The public fields of this record: every top-level key that does not
    /// start with an underscore. Scalars appear under [`SCALAR_FIELD`].
    fn to_fields(&self) -> serde_json::Map<String, serde_json::Value> {
        fields_of(self.to_json())
    }
}

impl Record for serde_json::Value {
    fn to_json(&self) -> serde_json::Value {
        self.clone()
    }

    fn field(&self, path: &str) -> Value {
        field_of(self, path)
    }
}

/// Walks `segments` into `value`.
///
/// Object segments are keys; numeric segments index into arrays. Returns
/// `None` as soon as a segment cannot be resolved.
///
/// # Examples
///
/// ```
/// use virtualqueryset_db::record::walk_path;
///
/// let data = serde_json::json!({"data": {"items": [{"id": 1}, {"id": 2}]}});
/// let found = walk_path(&data, "data.items.1.id".split('.'));
/// assert_eq!(found, Some(&serde_json::json!(2)));
/// ```
pub fn walk_path<'a, 'p>(
    value: &'a serde_json::Value,
    segments: impl IntoIterator<Item = &'p str>,
) -> Option<&'a serde_json::Value> {
    let mut current = value;
    for segment in segments {
        current = match current {
            serde_json::Value::Object(map) => map.get(segment)?,
            serde_json::Value::Array(items) if is_index(segment) => {
                items.get(segment.parse::<usize>().ok()?)?
            }
            _ => return None,
        };
    }
    Some(current)
}

fn is_index(segment: &str) -> bool {
    !segment.is_empty() && segment.bytes().all(|b| b.is_ascii_digit())
}

fn field_of(json: &serde_json::Value, path: &str) -> Value {
    if !json.is_object() && path == SCALAR_FIELD {
        return Value::from(json);
    }
    walk_path(json, path.split("__")).map_or(Value::Null, Value::from)
}

fn fields_of(json: serde_json::Value) -> serde_json::Map<String, serde_json::Value> {
    match json {
        serde_json::Value::Object(map) => map
            .into_iter()
            .filter(|(key, _)| !key.starts_with('_'))
            .collect(),
        other => {
            let mut map = serde_json::Map::new();
            map.insert(SCALAR_FIELD.to_string(), other);
            map
        }
    }
}
