//! Admin site registry and router generation.
//!
//! [`VirtualAdminSite`] holds the registered virtual models with their
//! [`ModelAdmin`] configurations and builds an Axum router serving the
//! read-only admin JSON API.

use std::collections::HashMap;
use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::Router;
use virtualqueryset_core::VirtualError;
use virtualqueryset_db::manager::AdminSource;

use crate::api::{build_model_index, ModelSchemaResponse};
use crate::db::{AdminDbExecutor, AdminListParams, VirtualAdminDb};
use crate::model_admin::ModelAdmin;

/// The admin site: model registration and route generation.
///
/// # Examples
///
/// ```
/// use virtualqueryset_admin::site::VirtualAdminSite;
/// use virtualqueryset_db::VirtualManager;
///
/// let mut site = VirtualAdminSite::new("admin");
/// site.register_model(VirtualManager::<serde_json::Value>::config("INSTALLED_APPS"));
/// assert!(site.is_registered("virtual.object"));
/// let router = site.into_axum_router();
/// ```
pub struct VirtualAdminSite {
    /// The site name.
    name: String,
    /// The URL prefix used in index links.
    url_prefix: String,
    /// Registered model admin configurations, keyed by `"app.model"`.
    registered_models: HashMap<String, ModelAdmin>,
    /// The sources behind the registered models.
    db: VirtualAdminDb,
}

impl VirtualAdminSite {
    /// Creates a new admin site with the given name.
    ///
    /// The URL prefix defaults to `/api/admin`.
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            url_prefix: "/api/admin".to_string(),
            registered_models: HashMap::new(),
            db: VirtualAdminDb::new(),
        }
    }

    /// Sets the URL prefix used in index links.
    #[must_use]
    pub fn url_prefix(mut self, prefix: &str) -> Self {
        self.url_prefix = prefix.to_string();
        self
    }

    /// Returns the site name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Registers a model source with its admin configuration, under
    /// [`ModelAdmin::model_key`].
    pub fn register(&mut self, source: impl AdminSource + 'static, admin: ModelAdmin) {
        let key = admin.model_key();
        tracing::debug!(model = %key, "registered with admin");
        self.db.register(key.clone(), Arc::new(source));
        self.registered_models.insert(key, admin);
    }

    /// Registers a model source with a [`ModelAdmin`] derived from its
    /// metadata.
    pub fn register_model(&mut self, source: impl AdminSource + 'static) {
        let admin = ModelAdmin::for_meta(source.meta());
        self.register(source, admin);
    }

    /// Unregisters a model. Its source stays reachable only through
    /// existing routers.
    pub fn unregister(&mut self, model_key: &str) {
        self.registered_models.remove(model_key);
    }

    /// Returns the `ModelAdmin` for a registered model, if any.
    pub fn get_model_admin(&self, model_key: &str) -> Option<&ModelAdmin> {
        self.registered_models.get(model_key)
    }

    /// Returns the registered model keys, sorted.
    pub fn registered_models(&self) -> Vec<&str> {
        let mut keys: Vec<_> = self.registered_models.keys().map(String::as_str).collect();
        keys.sort_unstable();
        keys
    }

    /// Returns whether a model is registered.
    pub fn is_registered(&self, model_key: &str) -> bool {
        self.registered_models.contains_key(model_key)
    }

    /// Generates the Axum router.
    ///
    /// The generated routes are:
    ///
    /// - `GET /` - List all registered models
    /// - `GET /{app}/{model}/schema` - Model schema
    /// - `GET /{app}/{model}/` - List objects (`page`, `page_size`, `search`,
    ///   `ordering`; any other parameter is a filter)
    /// - `GET /{app}/{model}/{pk}/` - Get single object
    /// - `POST /{app}/{model}/`, `PUT` and `DELETE /{app}/{model}/{pk}/` -
    ///   always `405 Method Not Allowed`
    pub fn into_axum_router(self) -> Router {
        let shared = Arc::new(AdminSiteState {
            registered_models: self.registered_models,
            url_prefix: self.url_prefix,
            name: self.name,
            db: Arc::new(self.db),
        });

        Router::new()
            .route("/", get(handle_index))
            .route("/{app}/{model}/schema", get(handle_schema))
            .route("/{app}/{model}/", get(handle_list).post(handle_create))
            .route(
                "/{app}/{model}/{pk}/",
                get(handle_detail).put(handle_update).delete(handle_delete),
            )
            .with_state(shared)
    }
}

impl std::fmt::Debug for VirtualAdminSite {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VirtualAdminSite")
            .field("name", &self.name)
            .field("url_prefix", &self.url_prefix)
            .field("models", &self.registered_models().join(", "))
            .finish_non_exhaustive()
    }
}

/// Shared state for Axum handlers.
struct AdminSiteState {
    registered_models: HashMap<String, ModelAdmin>,
    url_prefix: String,
    name: String,
    db: Arc<dyn AdminDbExecutor>,
}

impl AdminSiteState {
    fn model_admin(&self, app: &str, model: &str) -> Result<&ModelAdmin, Response> {
        let key = format!("{app}.{model}");
        self.registered_models.get(&key).ok_or_else(|| {
            (
                StatusCode::NOT_FOUND,
                axum::Json(serde_json::json!({
                    "error": format!("Model '{key}' not found")
                })),
            )
                .into_response()
        })
    }
}

fn error_response(err: &VirtualError) -> Response {
    let status =
        StatusCode::from_u16(err.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    if status.is_server_error() {
        tracing::error!(error = %err, "admin request failed");
    }
    (status, axum::Json(serde_json::json!({"error": err.to_string()}))).into_response()
}

fn json_response<T: serde::Serialize>(value: &T) -> Response {
    match serde_json::to_value(value) {
        Ok(json) => axum::Json(json).into_response(),
        Err(e) => error_response(&VirtualError::from(e)),
    }
}

// ── Index ──────────────────────────────────────────────────────────

/// Handler for `GET /` - list all registered models.
async fn handle_index(State(state): State<Arc<AdminSiteState>>) -> impl IntoResponse {
    let index = build_model_index(state.registered_models.values(), &state.url_prefix);
    axum::Json(serde_json::json!({
        "site_name": state.name,
        "apps": index.apps,
    }))
}

// ── Schema / List / Detail ─────────────────────────────────────────

/// Handler for `GET /{app}/{model}/schema` - model schema introspection.
async fn handle_schema(
    State(state): State<Arc<AdminSiteState>>,
    Path((app, model)): Path<(String, String)>,
) -> Response {
    let admin = match state.model_admin(&app, &model) {
        Ok(admin) => admin,
        Err(response) => return response,
    };
    match state.db.field_schema(admin).await {
        Ok(fields) => json_response(&ModelSchemaResponse::from_model_admin(admin, fields)),
        Err(e) => error_response(&e),
    }
}

/// Splits the query string into list parameters; unknown keys are filters.
fn list_params(mut query: HashMap<String, String>) -> AdminListParams {
    let number = |value: Option<String>| value.and_then(|v| v.parse::<usize>().ok());
    AdminListParams {
        page: number(query.remove("page")).unwrap_or(1),
        page_size: number(query.remove("page_size")).unwrap_or(0),
        search: query.remove("search").filter(|s| !s.trim().is_empty()),
        ordering: query.remove("ordering"),
        filters: query,
    }
}

/// Handler for `GET /{app}/{model}/` - list objects (paginated).
async fn handle_list(
    State(state): State<Arc<AdminSiteState>>,
    Path((app, model)): Path<(String, String)>,
    Query(query): Query<HashMap<String, String>>,
) -> Response {
    let admin = match state.model_admin(&app, &model) {
        Ok(admin) => admin,
        Err(response) => return response,
    };
    match state.db.list_objects(admin, &list_params(query)).await {
        Ok(result) => json_response(&result),
        Err(e) => error_response(&e),
    }
}

/// Handler for `GET /{app}/{model}/{pk}/` - get single object.
async fn handle_detail(
    State(state): State<Arc<AdminSiteState>>,
    Path((app, model, pk)): Path<(String, String, String)>,
) -> Response {
    let admin = match state.model_admin(&app, &model) {
        Ok(admin) => admin,
        Err(response) => return response,
    };
    match state.db.get_object(admin, &pk).await {
        Ok(obj) => axum::Json(obj).into_response(),
        Err(e) => error_response(&e),
    }
}

// ── Writes (always rejected) ───────────────────────────────────────

fn request_data(body: &Bytes) -> HashMap<String, serde_json::Value> {
    serde_json::from_slice(body).unwrap_or_default()
}

/// Handler for `POST /{app}/{model}/`.
async fn handle_create(
    State(state): State<Arc<AdminSiteState>>,
    Path((app, model)): Path<(String, String)>,
    body: Bytes,
) -> Response {
    let admin = match state.model_admin(&app, &model) {
        Ok(admin) => admin,
        Err(response) => return response,
    };
    match state.db.create_object(admin, &request_data(&body)).await {
        Ok(obj) => (StatusCode::CREATED, axum::Json(obj)).into_response(),
        Err(e) => error_response(&e),
    }
}

/// Handler for `PUT /{app}/{model}/{pk}/`.
async fn handle_update(
    State(state): State<Arc<AdminSiteState>>,
    Path((app, model, pk)): Path<(String, String, String)>,
    body: Bytes,
) -> Response {
    let admin = match state.model_admin(&app, &model) {
        Ok(admin) => admin,
        Err(response) => return response,
    };
    match state.db.update_object(admin, &pk, &request_data(&body)).await {
        Ok(obj) => axum::Json(obj).into_response(),
        Err(e) => error_response(&e),
    }
}

/// Handler for `DELETE /{app}/{model}/{pk}/`.
async fn handle_delete(
    State(state): State<Arc<AdminSiteState>>,
    Path((app, model, pk)): Path<(String, String, String)>,
) -> Response {
    let admin = match state.model_admin(&app, &model) {
        Ok(admin) => admin,
        Err(response) => return response,
    };
    match state.db.delete_object(admin, &pk).await {
        Ok(true) => StatusCode::NO_CONTENT.into_response(),
        Ok(false) => (
            StatusCode::NOT_FOUND,
            axum::Json(serde_json::json!({"error": "Object not found"})),
        )
            .into_response(),
        Err(e) => error_response(&e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use virtualqueryset_db::VirtualManager;

    fn objects() -> VirtualManager<serde_json::Value> {
        VirtualManager::from_items(vec![serde_json::json!({"id": 1})])
    }

    #[test]
    fn test_site_new() {
        let site = VirtualAdminSite::new("admin").url_prefix("/custom/api");
        assert_eq!(site.name(), "admin");
        assert!(site.registered_models().is_empty());
        assert!(format!("{site:?}").contains("/custom/api"));
    }

    #[test]
    fn test_register_and_unregister() {
        let mut site = VirtualAdminSite::new("admin");
        site.register(objects(), ModelAdmin::new("shop", "product"));
        site.register_model(objects());
        assert_eq!(site.registered_models(), vec!["shop.product", "virtual.object"]);
        assert_eq!(
            site.get_model_admin("virtual.object").unwrap().verbose_name_plural,
            "objects"
        );

        site.unregister("shop.product");
        assert!(!site.is_registered("shop.product"));
    }

    #[test]
    fn test_list_params_split_filters() {
        let query = HashMap::from([
            ("page".to_string(), "2".to_string()),
            ("page_size".to_string(), "x".to_string()),
            ("search".to_string(), "  ".to_string()),
            ("ordering".to_string(), "-id".to_string()),
            ("status".to_string(), "draft".to_string()),
        ]);
        let params = list_params(query);
        assert_eq!(params.page, 2);
        assert_eq!(params.page_size, 0);
        assert!(params.search.is_none());
        assert_eq!(params.ordering.as_deref(), Some("-id"));
        assert_eq!(params.filters.len(), 1);
        assert_eq!(params.filters["status"], "draft");
    }
}
