//! Admin data access for virtual models.
//!
//! The [`AdminDbExecutor`] trait is what the admin endpoints call to list and
//! fetch objects. [`VirtualAdminDb`] implements it on top of registered
//! [`AdminSource`]s: every list request loads the source, then filters,
//! searches, orders and paginates in memory with the same lookups as
//! [`InMemoryQuerySet`](virtualqueryset_db::InMemoryQuerySet).
//!
//! Virtual models are read-only, so the write operations always fail with
//! [`VirtualError::ReadOnly`].

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use virtualqueryset_core::{VirtualError, VirtualResult};
use virtualqueryset_db::manager::AdminSource;
use virtualqueryset_db::query::{Lookup, Q, LOOKUP_NAMES};
use virtualqueryset_db::{Record, Value};

use crate::api::JsonListResponse;
use crate::model_admin::{FieldSchema, ModelAdmin};

/// Parameters for an admin list query.
///
/// Filter keys are field paths (`status`, `owner__login`), optionally with
/// a lookup suffix (`stars__gte`). A plain key matches the value's text
/// form; comma-separated values feed `in` and `range`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdminListParams {
    /// The page number (1-indexed).
    pub page: usize,
    /// The number of items per page. Zero means the admin's `list_per_page`.
    pub page_size: usize,
    /// Optional search query applied across `search_fields`.
    pub search: Option<String>,
    /// Optional comma-separated ordering (prefix with "-" for descending).
    pub ordering: Option<String>,
    /// Field filters to apply.
    pub filters: HashMap<String, String>,
}

impl Default for AdminListParams {
    fn default() -> Self {
        Self::new()
    }
}

impl AdminListParams {
    /// Creates list parameters for the first page at the admin's page size.
    pub fn new() -> Self {
        Self {
            page: 1,
            page_size: 0,
            search: None,
            ordering: None,
            filters: HashMap::new(),
        }
    }

    /// Sets the page number.
    #[must_use]
    pub const fn page(mut self, page: usize) -> Self {
        self.page = page;
        self
    }

    /// Sets the page size.
    #[must_use]
    pub const fn page_size(mut self, size: usize) -> Self {
        self.page_size = size;
        self
    }

    /// Sets the search query.
    #[must_use]
    pub fn search(mut self, query: impl Into<String>) -> Self {
        self.search = Some(query.into());
        self
    }

    /// Sets the ordering.
    #[must_use]
    pub fn ordering(mut self, field: impl Into<String>) -> Self {
        self.ordering = Some(field.into());
        self
    }

    /// Adds a filter.
    #[must_use]
    pub fn filter(mut self, field: impl Into<String>, value: impl Into<String>) -> Self {
        self.filters.insert(field.into(), value.into());
        self
    }
}

/// The result of an admin list query.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdminListResult {
    /// The page of objects with pagination metadata.
    #[serde(flatten)]
    pub response: JsonListResponse,
    /// Distinct values of each `list_filter` field over the unfiltered set.
    pub filter_choices: HashMap<String, Vec<String>>,
}

/// Admin data operations over JSON objects.
#[async_trait]
pub trait AdminDbExecutor: Send + Sync {
    /// Lists objects with pagination, search, ordering, and filtering.
    async fn list_objects(
        &self,
        admin: &ModelAdmin,
        params: &AdminListParams,
    ) -> VirtualResult<AdminListResult>;

    /// Fetches a single object by the text form of its primary key.
    async fn get_object(&self, admin: &ModelAdmin, pk: &str) -> VirtualResult<serde_json::Value>;

    /// Describes the model's fields.
    async fn field_schema(&self, admin: &ModelAdmin) -> VirtualResult<Vec<FieldSchema>> {
        Ok(admin.fields_schema.clone())
    }

    /// Creates a new object.
    async fn create_object(
        &self,
        admin: &ModelAdmin,
        data: &HashMap<String, serde_json::Value>,
    ) -> VirtualResult<serde_json::Value>;

    /// Updates an existing object.
    async fn update_object(
        &self,
        admin: &ModelAdmin,
        pk: &str,
        data: &HashMap<String, serde_json::Value>,
    ) -> VirtualResult<serde_json::Value>;

    /// Deletes an object.
    async fn delete_object(&self, admin: &ModelAdmin, pk: &str) -> VirtualResult<bool>;
}

/// [`AdminDbExecutor`] over registered virtual model sources.
///
/// # Example
///
/// ```
/// use std::sync::Arc;
/// use virtualqueryset_admin::db::VirtualAdminDb;
/// use virtualqueryset_db::VirtualManager;
///
/// let mut db = VirtualAdminDb::new();
/// let objects = VirtualManager::<serde_json::Value>::from_items(vec![serde_json::json!({"id": 1})]);
/// db.register("virtual.object", Arc::new(objects));
/// assert!(db.is_registered("virtual.object"));
/// ```
#[derive(Clone, Default)]
pub struct VirtualAdminDb {
    sources: HashMap<String, Arc<dyn AdminSource>>,
}

impl VirtualAdminDb {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `source` under `model_key` (`"app_label.model_name"`).
    pub fn register(&mut self, model_key: impl Into<String>, source: Arc<dyn AdminSource>) {
        self.sources.insert(model_key.into(), source);
    }

    /// Whether a source is registered under `model_key`.
    pub fn is_registered(&self, model_key: &str) -> bool {
        self.sources.contains_key(model_key)
    }

    fn source(&self, admin: &ModelAdmin) -> VirtualResult<&Arc<dyn AdminSource>> {
        let key = admin.model_key();
        self.sources
            .get(&key)
            .ok_or_else(|| VirtualError::NotFound(format!("model '{key}' is not registered")))
    }

    fn read_only(admin: &ModelAdmin) -> VirtualError {
        VirtualError::ReadOnly(format!(
            "{} is a virtual model and cannot be changed from the admin.",
            admin.verbose_name
        ))
    }
}

impl std::fmt::Debug for VirtualAdminDb {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut keys: Vec<_> = self.sources.keys().map(String::as_str).collect();
        keys.sort_unstable();
        f.debug_struct("VirtualAdminDb").field("models", &keys).finish()
    }
}

// ── List helpers ───────────────────────────────────────────────────

/// Interprets a query-string value: booleans, integers and floats become
/// typed values, everything else stays text.
fn param_value(raw: &str) -> Value {
    match raw {
        "true" | "True" => Value::Bool(true),
        "false" | "False" => Value::Bool(false),
        _ => raw
            .parse::<i64>()
            .map(Value::Int)
            .or_else(|_| raw.parse::<f64>().map(Value::Float))
            .unwrap_or_else(|_| Value::String(raw.to_string())),
    }
}

fn list_value(raw: &str) -> Value {
    Value::List(raw.split(',').map(|part| param_value(part.trim())).collect())
}

/// Builds the filter for one query parameter.
fn filter_q(key: &str, raw: &str) -> VirtualResult<Q> {
    let (field, lookup) = match key.rsplit_once("__") {
        Some((field, name)) if LOOKUP_NAMES.contains(&name) => (field, Some(name)),
        _ => (key, None),
    };
    if field.is_empty() || field.split("__").any(str::is_empty) {
        return Err(VirtualError::InvalidLookup(format!(
            "malformed field path in '{key}'"
        )));
    }

    match lookup {
        None | Some("exact") => {
            if raw.is_empty() || raw == "null" {
                return Ok(Q::filter(field, Lookup::IsNull(true)));
            }
            let typed = Q::filter(field, Lookup::Exact(param_value(raw)));
            let text = Q::filter(field, Lookup::Exact(Value::from(raw)));
            Ok(typed | text)
        }
        Some("isnull") => {
            let flag = match raw {
                "true" | "True" | "1" => true,
                "false" | "False" | "0" => false,
                other => {
                    return Err(VirtualError::InvalidLookup(format!(
                        "'isnull' expects true or false, got '{other}'"
                    )))
                }
            };
            Ok(Q::filter(field, Lookup::IsNull(flag)))
        }
        Some(name @ ("in" | "range")) => Ok(Q::filter(field, Lookup::parse(name, list_value(raw))?)),
        Some(name) => Ok(Q::filter(field, Lookup::parse(name, param_value(raw))?)),
    }
}

/// Every whitespace-separated term must appear in at least one search field.
fn search_q(search_fields: &[String], query: &str) -> Option<Q> {
    if search_fields.is_empty() {
        return None;
    }
    let terms: Vec<Q> = query
        .split_whitespace()
        .map(|term| {
            Q::Or(
                search_fields
                    .iter()
                    .map(|field| Q::filter(field.as_str(), Lookup::IContains(term.to_string())))
                    .collect(),
            )
        })
        .collect();
    (!terms.is_empty()).then_some(Q::And(terms))
}

/// Collects sorted distinct text values for the filter fields.
fn collect_filter_choices<R: Record>(
    records: &[R],
    filter_fields: &[String],
) -> HashMap<String, Vec<String>> {
    filter_fields
        .iter()
        .map(|field| {
            let values: BTreeSet<String> = records
                .iter()
                .map(|record| record.field(field))
                .filter(|value| {
                    matches!(
                        value,
                        Value::Bool(_) | Value::Int(_) | Value::Float(_) | Value::String(_)
                    )
                })
                .map(|value| value.as_text())
                .collect();
            (field.clone(), values.into_iter().collect())
        })
        .collect()
}

/// Restricts a record to the primary key and `list_display` columns.
fn display_fields(admin: &ModelAdmin, record: &serde_json::Value) -> serde_json::Value {
    if admin.list_display.is_empty() {
        return record.clone();
    }
    let mut row = serde_json::Map::new();
    let pk = record.field(&admin.pk_field);
    row.insert(admin.pk_field.clone(), pk.to_json());
    for field in &admin.list_display {
        row.insert(field.clone(), record.field(field).to_json());
    }
    serde_json::Value::Object(row)
}

#[async_trait]
impl AdminDbExecutor for VirtualAdminDb {
    async fn list_objects(
        &self,
        admin: &ModelAdmin,
        params: &AdminListParams,
    ) -> VirtualResult<AdminListResult> {
        let all = self.source(admin)?.records().await?;

        // Filter choices come from the unfiltered set
        let filter_choices = collect_filter_choices(all.as_slice(), &admin.list_filter);

        let mut conditions = params
            .filters
            .iter()
            .map(|(key, raw)| filter_q(key, raw))
            .collect::<VirtualResult<Vec<_>>>()?;
        if let Some(q) = params
            .search
            .as_deref()
            .and_then(|query| search_q(&admin.search_fields, query))
        {
            conditions.push(q);
        }
        let filtered = all.filter(&Q::And(conditions));

        let ordering: Vec<String> = match params.ordering.as_deref() {
            Some(ordering) if !ordering.trim().is_empty() => ordering
                .split(',')
                .map(str::trim)
                .filter(|f| !f.is_empty())
                .map(String::from)
                .collect(),
            _ => admin.ordering.clone(),
        };
        let ordered = if ordering.is_empty() {
            filtered
        } else {
            filtered.order_by(ordering.as_slice())
        };

        let rows: Vec<serde_json::Value> = ordered
            .iter()
            .map(|record| display_fields(admin, record))
            .collect();
        let page_size = if params.page_size > 0 {
            params.page_size
        } else {
            admin.list_per_page
        };
        tracing::debug!(
            model = %admin.model_key(),
            total = all.len(),
            matched = rows.len(),
            "admin list"
        );

        Ok(AdminListResult {
            response: JsonListResponse::paginate(&rows, params.page, page_size),
            filter_choices,
        })
    }

    async fn get_object(&self, admin: &ModelAdmin, pk: &str) -> VirtualResult<serde_json::Value> {
        let records = self.source(admin)?.records().await?;
        records
            .iter()
            .find(|record| record.field(&admin.pk_field).as_text() == pk)
            .cloned()
            .ok_or_else(|| {
                VirtualError::DoesNotExist(format!(
                    "{} with {} '{pk}' does not exist.",
                    admin.verbose_name, admin.pk_field
                ))
            })
    }

    async fn field_schema(&self, admin: &ModelAdmin) -> VirtualResult<Vec<FieldSchema>> {
        if !admin.fields_schema.is_empty() {
            return Ok(admin.fields_schema.clone());
        }
        let records = self.source(admin)?.records().await?;
        Ok(records
            .first()
            .and_then(serde_json::Value::as_object)
            .map(|sample| FieldSchema::infer(sample, &admin.pk_field))
            .unwrap_or_default())
    }

    async fn create_object(
        &self,
        admin: &ModelAdmin,
        _data: &HashMap<String, serde_json::Value>,
    ) -> VirtualResult<serde_json::Value> {
        self.source(admin)?;
        Err(Self::read_only(admin))
    }

    async fn update_object(
        &self,
        admin: &ModelAdmin,
        _pk: &str,
        _data: &HashMap<String, serde_json::Value>,
    ) -> VirtualResult<serde_json::Value> {
        self.source(admin)?;
        Err(Self::read_only(admin))
    }

    async fn delete_object(&self, admin: &ModelAdmin, _pk: &str) -> VirtualResult<bool> {
        self.source(admin)?;
        Err(Self::read_only(admin))
    }
}
