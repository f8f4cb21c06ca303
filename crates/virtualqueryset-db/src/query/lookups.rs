//! Field lookups and Q objects, evaluated against in-memory records.
//!
//! [`Lookup`] is a single field-level comparison; [`Q`] combines lookups
//! with AND, OR, and NOT. Keyword-style filters (`price__gte`) are parsed
//! with [`Q::kwarg`] / [`Q::kwargs`]: the part after the last `__` is the
//! lookup name when it is one of [`LOOKUP_NAMES`], otherwise the whole key
//! is a field path compared with `exact`.
//!
//! # Examples
//!
//! ```
//! use virtualqueryset_db::query::lookups::{Lookup, Q};
//! use virtualqueryset_db::value::Value;
//!
//! let item = serde_json::json!({"name": "Widget", "price": 30});
//!
//! let q = Q::filter("name", Lookup::IContains("widg".into()))
//!     & Q::kwarg("price__gte", 20).unwrap();
//! assert!(q.matches(&item));
//!
//! let either = Q::filter("name", Lookup::Exact(Value::from("Gadget")))
//!     | Q::filter("price", Lookup::Lt(Value::from(10)));
//! assert!(!either.matches(&item));
//! assert!((!either).matches(&item));
//! ```

use std::ops;

use regex::{Regex, RegexBuilder};
use virtualqueryset_core::{VirtualError, VirtualResult};

use crate::record::Record;
use crate::value::Value;

/// Every lookup name recognised after a `__` separator.
pub const LOOKUP_NAMES: &[&str] = &[
    "exact",
    "iexact",
    "contains",
    "icontains",
    "in",
    "gt",
    "gte",
    "lt",
    "lte",
    "startswith",
    "istartswith",
    "endswith",
    "iendswith",
    "range",
    "isnull",
    "regex",
    "iregex",
];

/// A field-level lookup operation.
///
/// Text lookups compare against the field's text form, where `Null` reads
/// as the empty string. Ordering lookups never match values that cannot be
/// compared (see [`Value::loose_cmp`]).
#[derive(Debug, Clone, PartialEq)]
pub enum Lookup {
    /// Equality (`Value::loose_eq`).
    Exact(Value),
    /// Case-insensitive equality of the text forms.
    IExact(Value),
    /// Substring match.
    Contains(String),
    /// Case-insensitive substring match.
    IContains(String),
    /// Membership test.
    In(Vec<Value>),
    /// Greater than.
    Gt(Value),
    /// Greater than or equal.
    Gte(Value),
    /// Less than.
    Lt(Value),
    /// Less than or equal.
    Lte(Value),
    /// Starts with.
    StartsWith(String),
    /// Case-insensitive starts with.
    IStartsWith(String),
    /// Ends with.
    EndsWith(String),
    /// Case-insensitive ends with.
    IEndsWith(String),
    /// Inclusive range test.
    Range(Value, Value),
    /// `true` matches `Null` and `""`; `false` matches everything else.
    IsNull(bool),
    /// Regular expression search.
    Regex(String),
    /// Case-insensitive regular expression search.
    IRegex(String),
}

impl Lookup {
    /// Builds a lookup from its name and argument.
    ///
    /// # Errors
    ///
    /// Returns [`VirtualError::InvalidLookup`] for an unknown name, an `in`
    /// or `range` argument that is not a list (of two, for `range`), an
    /// `isnull` argument that is not a boolean, or a regex that does not
    /// compile.
    pub fn parse(name: &str, value: impl Into<Value>) -> VirtualResult<Self> {
        let value = value.into();
        let lookup = match name {
            "exact" => Self::Exact(value),
            "iexact" => Self::IExact(value),
            "contains" => Self::Contains(value.as_text()),
            "icontains" => Self::IContains(value.as_text()),
            "startswith" => Self::StartsWith(value.as_text()),
            "istartswith" => Self::IStartsWith(value.as_text()),
            "endswith" => Self::EndsWith(value.as_text()),
            "iendswith" => Self::IEndsWith(value.as_text()),
            "gt" => Self::Gt(value),
            "gte" => Self::Gte(value),
            "lt" => Self::Lt(value),
            "lte" => Self::Lte(value),
            "in" => match value {
                Value::List(values) => Self::In(values),
                other => {
                    return Err(VirtualError::InvalidLookup(format!(
                        "'in' expects a list, got {other}"
                    )))
                }
            },
            "range" => match value {
                Value::List(mut bounds) if bounds.len() == 2 => {
                    let high = bounds.pop().unwrap_or(Value::Null);
                    let low = bounds.pop().unwrap_or(Value::Null);
                    Self::Range(low, high)
                }
                other => {
                    return Err(VirtualError::InvalidLookup(format!(
                        "'range' expects a list of two bounds, got {other}"
                    )))
                }
            },
            "isnull" => match value {
                Value::Bool(b) => Self::IsNull(b),
                other => {
                    return Err(VirtualError::InvalidLookup(format!(
                        "'isnull' expects a boolean, got {other}"
                    )))
                }
            },
            "regex" | "iregex" => {
                let pattern = value.as_text();
                build_regex(&pattern, name == "iregex").map_err(|e| {
                    VirtualError::InvalidLookup(format!("invalid regex '{pattern}': {e}"))
                })?;
                if name == "iregex" {
                    Self::IRegex(pattern)
                } else {
                    Self::Regex(pattern)
                }
            }
            other => return Err(VirtualError::InvalidLookup(other.to_string())),
        };
        Ok(lookup)
    }

    /// The lookup name, as written after `__`.
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Exact(_) => "exact",
            Self::IExact(_) => "iexact",
            Self::Contains(_) => "contains",
            Self::IContains(_) => "icontains",
            Self::In(_) => "in",
            Self::Gt(_) => "gt",
            Self::Gte(_) => "gte",
            Self::Lt(_) => "lt",
            Self::Lte(_) => "lte",
            Self::StartsWith(_) => "startswith",
            Self::IStartsWith(_) => "istartswith",
            Self::EndsWith(_) => "endswith",
            Self::IEndsWith(_) => "iendswith",
            Self::Range(..) => "range",
            Self::IsNull(_) => "isnull",
            Self::Regex(_) => "regex",
            Self::IRegex(_) => "iregex",
        }
    }

    /// Tests a field value against this lookup.
    ///
    /// Regex lookups compile their pattern on every call; filtering a whole
    /// queryset goes through [`Q::matches_all`], which compiles once.
    pub fn matches(&self, field: &Value) -> bool {
        Test::compile(self).matches(field)
    }
}

fn build_regex(pattern: &str, case_insensitive: bool) -> Result<Regex, regex::Error> {
    RegexBuilder::new(pattern)
        .case_insensitive(case_insensitive)
        .build()
}

/// A composable filter, equivalent to Django's `Q` object.
///
/// An empty `And` matches everything; an empty `Or` matches nothing.
#[derive(Debug, Clone, PartialEq)]
pub enum Q {
    /// A single field lookup.
    Filter {
        /// The field path (may use `__` to reach nested fields).
        field: String,
        /// The lookup operation.
        lookup: Lookup,
    },
    /// Logical AND of multiple conditions.
    And(Vec<Q>),
    /// Logical OR of multiple conditions.
    Or(Vec<Q>),
    /// Logical negation of a condition.
    Not(Box<Q>),
}

impl Q {
    /// Creates a new filter Q object.
    pub fn filter(field: impl Into<String>, lookup: Lookup) -> Self {
        Self::Filter {
            field: field.into(),
            lookup,
        }
    }

    /// Parses a keyword-style filter such as `("price__gte", 20)`.
    ///
    /// # Errors
    ///
    /// Returns [`VirtualError::InvalidLookup`] if the key has no field part
    /// or the lookup rejects its argument.
    pub fn kwarg(key: &str, value: impl Into<Value>) -> VirtualResult<Self> {
        let (field, lookup) = match key.rsplit_once("__") {
            Some((field, name)) if LOOKUP_NAMES.contains(&name) => {
                (field, Lookup::parse(name, value)?)
            }
            _ => (key, Lookup::Exact(value.into())),
        };
        if field.is_empty() || field.split("__").any(str::is_empty) {
            return Err(VirtualError::InvalidLookup(format!(
                "malformed field path in '{key}'"
            )));
        }
        Ok(Self::filter(field, lookup))
    }

    /// Parses several keyword-style filters and ANDs them together.
    ///
    /// # Errors
    ///
    /// Returns the first error from [`Q::kwarg`].
    pub fn kwargs<K, V, I>(pairs: I) -> VirtualResult<Self>
    where
        K: AsRef<str>,
        V: Into<Value>,
        I: IntoIterator<Item = (K, V)>,
    {
        pairs
            .into_iter()
            .map(|(key, value)| Self::kwarg(key.as_ref(), value))
            .collect::<VirtualResult<Vec<_>>>()
            .map(Self::And)
    }

    /// Returns `true` if this is an empty AND or OR.
    pub fn is_empty(&self) -> bool {
        match self {
            Self::And(children) | Self::Or(children) => children.is_empty(),
            _ => false,
        }
    }

    /// Evaluates this filter against one record.
    pub fn matches<R: Record>(&self, record: &R) -> bool {
        Predicate::compile(self).matches(record)
    }

    /// Returns, for each record, whether it matches. Regex patterns are
    /// compiled once for the whole slice.
    pub fn matches_all<R: Record>(&self, records: &[R]) -> Vec<bool> {
        let predicate = Predicate::compile(self);
        records.iter().map(|r| predicate.matches(r)).collect()
    }
}

impl Default for Q {
    fn default() -> Self {
        Self::And(Vec::new())
    }
}

impl ops::BitAnd for Q {
    type Output = Self;

    fn bitand(self, rhs: Self) -> Self::Output {
        match (self, rhs) {
            // Flatten nested ANDs
            (Self::And(mut left), Self::And(right)) => {
                left.extend(right);
                Self::And(left)
            }
            (Self::And(mut left), other) => {
                left.push(other);
                Self::And(left)
            }
            (other, Self::And(mut right)) => {
                right.insert(0, other);
                Self::And(right)
            }
            (left, right) => Self::And(vec![left, right]),
        }
    }
}

impl ops::BitOr for Q {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self::Output {
        match (self, rhs) {
            // Flatten nested ORs
            (Self::Or(mut left), Self::Or(right)) => {
                left.extend(right);
                Self::Or(left)
            }
            (Self::Or(mut left), other) => {
                left.push(other);
                Self::Or(left)
            }
            (other, Self::Or(mut right)) => {
                right.insert(0, other);
                Self::Or(right)
            }
            (left, right) => Self::Or(vec![left, right]),
        }
    }
}

impl ops::Not for Q {
    type Output = Self;

    fn not(self) -> Self::Output {
        // Double negation cancellation
        match self {
            Self::Not(inner) => *inner,
            other => Self::Not(Box::new(other)),
        }
    }
}

// ── Evaluation ───────────────────────────────────────────────────────

enum Predicate<'q> {
    Field { path: &'q str, test: Test<'q> },
    And(Vec<Predicate<'q>>),
    Or(Vec<Predicate<'q>>),
    Not(Box<Predicate<'q>>),
}

impl<'q> Predicate<'q> {
    fn compile(q: &'q Q) -> Self {
        match q {
            Q::Filter { field, lookup } => Self::Field {
                path: field,
                test: Test::compile(lookup),
            },
            Q::And(children) => Self::And(children.iter().map(Self::compile).collect()),
            Q::Or(children) => Self::Or(children.iter().map(Self::compile).collect()),
            Q::Not(inner) => Self::Not(Box::new(Self::compile(inner))),
        }
    }

    fn matches<R: Record>(&self, record: &R) -> bool {
        match self {
            Self::Field { path, test } => test.matches(&record.field(path)),
            Self::And(children) => children.iter().all(|c| c.matches(record)),
            Self::Or(children) => children.iter().any(|c| c.matches(record)),
            Self::Not(inner) => !inner.matches(record),
        }
    }
}

enum Test<'q> {
    Lookup(&'q Lookup),
    Pattern(Option<Regex>),
}

impl<'q> Test<'q> {
    fn compile(lookup: &'q Lookup) -> Self {
        match lookup {
            // An invalid pattern matches nothing.
            Lookup::Regex(p) => Self::Pattern(build_regex(p, false).ok()),
            Lookup::IRegex(p) => Self::Pattern(build_regex(p, true).ok()),
            other => Self::Lookup(other),
        }
    }

    fn matches(&self, field: &Value) -> bool {
        use std::cmp::Ordering::{Equal, Greater, Less};

        let lookup = match self {
            Self::Pattern(re) => {
                return re.as_ref().is_some_and(|re| re.is_match(&field.as_text()));
            }
            Self::Lookup(lookup) => lookup,
        };

        match lookup {
            Lookup::Exact(v) => field.loose_eq(v),
            Lookup::IExact(v) => field.as_text().to_lowercase() == v.as_text().to_lowercase(),
            Lookup::Contains(s) => field.as_text().contains(s.as_str()),
            Lookup::IContains(s) => field.as_text().to_lowercase().contains(&s.to_lowercase()),
            Lookup::In(values) => values.iter().any(|v| field.loose_eq(v)),
            Lookup::Gt(v) => field.loose_cmp(v) == Some(Greater),
            Lookup::Gte(v) => matches!(field.loose_cmp(v), Some(Greater | Equal)),
            Lookup::Lt(v) => field.loose_cmp(v) == Some(Less),
            Lookup::Lte(v) => matches!(field.loose_cmp(v), Some(Less | Equal)),
            Lookup::StartsWith(s) => field.as_text().starts_with(s.as_str()),
            Lookup::IStartsWith(s) => field
                .as_text()
                .to_lowercase()
                .starts_with(&s.to_lowercase()),
            Lookup::EndsWith(s) => field.as_text().ends_with(s.as_str()),
            Lookup::IEndsWith(s) => field.as_text().to_lowercase().ends_with(&s.to_lowercase()),
            Lookup::Range(low, high) => {
                matches!(field.loose_cmp(low), Some(Greater | Equal))
                    && matches!(field.loose_cmp(high), Some(Less | Equal))
            }
            Lookup::IsNull(expected) => field.is_blank() == *expected,
            Lookup::Regex(_) | Lookup::IRegex(_) => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn item() -> serde_json::Value {
        json!({
            "name": "Wireless Mouse",
            "price": 25.5,
            "stock": 0,
            "sku": null,
            "note": "",
            "owner": {"name": "Ada"}
        })
    }

    // ── Q construction ──────────────────────────────────────────────

    #[test]
    fn test_simple_filter() {
        let q = Q::filter("name", Lookup::Exact(Value::from("Alice")));
        match &q {
            Q::Filter { field, lookup } => {
                assert_eq!(field, "name");
                assert_eq!(*lookup, Lookup::Exact(Value::String("Alice".to_string())));
            }
            _ => panic!("Expected Filter"),
        }
    }

    #[test]
    fn test_and_flattens() {
        let q = Q::filter("a", Lookup::IsNull(true))
            & Q::filter("b", Lookup::IsNull(true))
            & Q::filter("c", Lookup::IsNull(true));
        match &q {
            Q::And(children) => assert_eq!(children.len(), 3),
            _ => panic!("Expected And"),
        }
    }

    #[test]
    fn test_or_flattens() {
        let q = Q::filter("a", Lookup::IsNull(true)) | Q::filter("b", Lookup::IsNull(true));
        match &q {
            Q::Or(children) => assert_eq!(children.len(), 2),
            _ => panic!("Expected Or"),
        }
    }

    #[test]
    fn test_double_negation_cancels() {
        let q = Q::filter("a", Lookup::IsNull(true));
        assert_eq!(!!q.clone(), q);
    }

    // ── kwarg parsing ───────────────────────────────────────────────

    #[test]
    fn test_kwarg_known_lookup() {
        let q = Q::kwarg("price__gte", 20).unwrap();
        assert_eq!(q, Q::filter("price", Lookup::Gte(Value::Int(20))));
    }

    #[test]
    fn test_kwarg_plain_field_is_exact() {
        let q = Q::kwarg("name", "x").unwrap();
        assert_eq!(q, Q::filter("name", Lookup::Exact(Value::from("x"))));
    }

    #[test]
    fn test_kwarg_nested_path() {
        let q = Q::kwarg("owner__name__icontains", "ad").unwrap();
        assert_eq!(q, Q::filter("owner__name", Lookup::IContains("ad".into())));
        assert!(q.matches(&item()));

        let q = Q::kwarg("owner__name", "Ada").unwrap();
        assert_eq!(q, Q::filter("owner__name", Lookup::Exact(Value::from("Ada"))));
        assert!(q.matches(&item()));
    }

    #[test]
    fn test_kwarg_malformed() {
        assert!(Q::kwarg("", 1).is_err());
        assert!(Q::kwarg("__gt", 1).is_err());
        assert!(Q::kwarg("a____b", 1).is_err());
    }

    #[test]
    fn test_kwargs_and() {
        let q = Q::kwargs([("price__gt", Value::from(20)), ("stock", Value::from(0))]).unwrap();
        assert!(q.matches(&item()));
        let q = Q::kwargs([("price__gt", Value::from(30)), ("stock", Value::from(0))]).unwrap();
        assert!(!q.matches(&item()));
    }

    // ── Lookup::parse ───────────────────────────────────────────────

    #[test]
    fn test_parse_rejects_unknown() {
        let err = Lookup::parse("fuzzy", 1).unwrap_err();
        assert!(matches!(err, VirtualError::InvalidLookup(_)));
    }

    #[test]
    fn test_parse_in_requires_list() {
        assert!(Lookup::parse("in", 1).is_err());
        let lookup = Lookup::parse("in", json!([1, 2])).unwrap();
        assert_eq!(lookup, Lookup::In(vec![Value::Int(1), Value::Int(2)]));
    }

    #[test]
    fn test_parse_range_requires_two() {
        assert!(Lookup::parse("range", json!([1])).is_err());
        assert_eq!(
            Lookup::parse("range", json!([1, 5])).unwrap(),
            Lookup::Range(Value::Int(1), Value::Int(5))
        );
    }

    #[test]
    fn test_parse_isnull_requires_bool() {
        assert!(Lookup::parse("isnull", "yes").is_err());
        assert_eq!(Lookup::parse("isnull", true).unwrap(), Lookup::IsNull(true));
    }

    #[test]
    fn test_parse_invalid_regex() {
        assert!(Lookup::parse("regex", "(unclosed").is_err());
    }

    #[test]
    fn test_name_round_trips_through_parse() {
        for name in LOOKUP_NAMES {
            let arg = match *name {
                "in" => json!([1]),
                "range" => json!([1, 2]),
                "isnull" => json!(true),
                _ => json!("x"),
            };
            assert_eq!(Lookup::parse(name, arg).unwrap().name(), *name);
        }
    }

    // ── Matching ────────────────────────────────────────────────────

    #[test]
    fn test_text_lookups() {
        let name = Value::from("Wireless Mouse");
        assert!(Lookup::Contains("less".into()).matches(&name));
        assert!(!Lookup::Contains("LESS".into()).matches(&name));
        assert!(Lookup::IContains("LESS".into()).matches(&name));
        assert!(Lookup::StartsWith("Wire".into()).matches(&name));
        assert!(Lookup::IStartsWith("wire".into()).matches(&name));
        assert!(Lookup::EndsWith("Mouse".into()).matches(&name));
        assert!(Lookup::IEndsWith("MOUSE".into()).matches(&name));
        assert!(Lookup::IExact(Value::from("wireless mouse")).matches(&name));
    }

    #[test]
    fn test_text_lookups_on_null_read_empty() {
        assert!(Lookup::Contains(String::new()).matches(&Value::Null));
        assert!(!Lookup::IContains("a".into()).matches(&Value::Null));
        assert!(Lookup::IExact(Value::from("")).matches(&Value::Null));
    }

    #[test]
    fn test_comparison_lookups() {
        let price = Value::Float(25.5);
        assert!(Lookup::Gt(Value::Int(25)).matches(&price));
        assert!(Lookup::Gte(Value::Float(25.5)).matches(&price));
        assert!(Lookup::Lt(Value::Int(26)).matches(&price));
        assert!(Lookup::Lte(Value::Float(25.5)).matches(&price));
        assert!(Lookup::Range(Value::Int(20), Value::Int(30)).matches(&price));
        assert!(!Lookup::Range(Value::Int(26), Value::Int(30)).matches(&price));
    }

    #[test]
    fn test_comparison_with_incomparable_never_matches() {
        assert!(!Lookup::Gt(Value::Int(1)).matches(&Value::Null));
        assert!(!Lookup::Lt(Value::Int(1)).matches(&Value::Null));
        assert!(!Lookup::Gt(Value::Int(1)).matches(&Value::from("5")));
    }

    #[test]
    fn test_in_lookup() {
        let lookup = Lookup::In(vec![Value::from("a"), Value::Int(2)]);
        assert!(lookup.matches(&Value::Float(2.0)));
        assert!(lookup.matches(&Value::from("a")));
        assert!(!lookup.matches(&Value::from("b")));
        assert!(!Lookup::In(vec![]).matches(&Value::from("a")));
    }

    #[test]
    fn test_isnull_treats_empty_string_as_null() {
        let record = item();
        assert!(Q::kwarg("sku__isnull", true).unwrap().matches(&record));
        assert!(Q::kwarg("note__isnull", true).unwrap().matches(&record));
        assert!(Q::kwarg("missing__isnull", true).unwrap().matches(&record));
        assert!(Q::kwarg("stock__isnull", false).unwrap().matches(&record));
    }

    #[test]
    fn test_regex_lookups() {
        let name = Value::from("Wireless Mouse");
        assert!(Lookup::Regex("^Wire.*e$".into()).matches(&name));
        assert!(!Lookup::Regex("^wire".into()).matches(&name));
        assert!(Lookup::IRegex("^wire".into()).matches(&name));
        assert!(!Lookup::Regex("(bad".into()).matches(&name));
    }

    #[test]
    fn test_empty_and_or() {
        let record = item();
        assert!(Q::And(vec![]).matches(&record));
        assert!(!Q::Or(vec![]).matches(&record));
        assert!(Q::default().is_empty());
    }

    #[test]
    fn test_matches_all() {
        let records = vec![json!({"n": 1}), json!({"n": 5}), json!({"n": 9})];
        let q = Q::kwarg("n__gt", 3).unwrap() & !Q::kwarg("n", 9).unwrap();
        assert_eq!(q.matches_all(&records), vec![false, true, false]);
    }
}
