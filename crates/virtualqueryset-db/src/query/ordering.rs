//! Ordering clauses for `order_by`.

use std::cmp::Ordering;
use std::fmt;

use crate::value::Value;

/// A field to order by.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderBy {
    /// The field path (may use `__` to reach nested fields).
    pub column: String,
    /// Whether to sort in descending order.
    pub descending: bool,
}

impl OrderBy {
    /// Creates an ascending order.
    pub fn asc(column: impl Into<String>) -> Self {
        Self {
            column: column.into(),
            descending: false,
        }
    }

    /// Creates a descending order.
    pub fn desc(column: impl Into<String>) -> Self {
        Self {
            column: column.into(),
            descending: true,
        }
    }

    /// Parses `"name"` or `"-name"`. Returns `None` for an empty field.
    pub fn parse(spec: &str) -> Option<Self> {
        match spec.strip_prefix('-') {
            Some("") => None,
            Some(column) => Some(Self::desc(column)),
            None if spec.is_empty() => None,
            None => Some(Self::asc(spec)),
        }
    }

    /// The same field, sorted the other way.
    #[must_use]
    pub fn flipped(&self) -> Self {
        Self {
            column: self.column.clone(),
            descending: !self.descending,
        }
    }

    /// Compares two field values in this clause's direction.
    pub fn compare(&self, a: &Value, b: &Value) -> Ordering {
        let ord = a.sort_cmp(b);
        if self.descending {
            ord.reverse()
        } else {
            ord
        }
    }
}

impl fmt::Display for OrderBy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.descending {
            write!(f, "-{}", self.column)
        } else {
            write!(f, "{}", self.column)
        }
    }
}
