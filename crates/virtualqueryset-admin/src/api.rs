//! Response types of the admin JSON API.
//!
//! These are the payloads served by [`VirtualAdminSite`](crate::site::VirtualAdminSite):
//! the model index, model schemas and paginated object lists.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::model_admin::{FieldSchema, ModelAdmin};

/// A paginated JSON response for list views.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonListResponse {
    /// The objects on the current page.
    pub results: Vec<serde_json::Value>,
    /// Total number of matching objects (across all pages).
    pub count: usize,
    /// The current page number (1-indexed).
    pub page: usize,
    /// The number of items per page.
    pub page_size: usize,
    /// Total number of pages.
    pub total_pages: usize,
    /// Whether there is a next page.
    pub has_next: bool,
    /// Whether there is a previous page.
    pub has_previous: bool,
}

impl JsonListResponse {
    /// Slices `all_results` to the requested page.
    ///
    /// A zero page size counts as one. Pages past the end are clamped to the
    /// last page, so an empty result set still has one (empty) page.
    pub fn paginate(all_results: &[serde_json::Value], page: usize, page_size: usize) -> Self {
        let count = all_results.len();
        let page_size = page_size.max(1);
        let total_pages = count.div_ceil(page_size).max(1);
        let page = page.clamp(1, total_pages);

        let start = (page - 1) * page_size;
        let end = (start + page_size).min(count);
        let results = if start < count {
            all_results[start..end].to_vec()
        } else {
            Vec::new()
        };

        Self {
            results,
            count,
            page,
            page_size,
            total_pages,
            has_next: page < total_pages,
            has_previous: page > 1,
        }
    }
}

/// Response for the model index endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelIndexResponse {
    /// The registered models grouped by app label, sorted by label.
    pub apps: Vec<AppModels>,
}

/// Models grouped under an application label.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppModels {
    /// The application label.
    pub app_label: String,
    /// The models registered under this app, sorted by name.
    pub models: Vec<ModelInfo>,
}

/// Summary information about a registered model.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelInfo {
    /// The model name.
    pub name: String,
    /// The human-readable name.
    pub verbose_name: String,
    /// The plural human-readable name.
    pub verbose_name_plural: String,
    /// The API URL for this model's list view.
    pub url: String,
    /// Always `true`: virtual models cannot be changed from the admin.
    pub read_only: bool,
}

/// Schema response for a model.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelSchemaResponse {
    /// The application label.
    pub app_label: String,
    /// The model name.
    pub model_name: String,
    /// Human-readable name.
    pub verbose_name: String,
    /// Plural human-readable name.
    pub verbose_name_plural: String,
    /// Field schema definitions.
    pub fields: Vec<FieldSchema>,
    /// Fields displayed in the list view.
    pub list_display: Vec<String>,
    /// Fields offered as filters.
    pub list_filter: Vec<String>,
    /// Fields that are searchable.
    pub search_fields: Vec<String>,
    /// Default ordering.
    pub ordering: Vec<String>,
    /// Number of items per page.
    pub list_per_page: usize,
    /// The primary key field.
    pub pk_field: String,
}

impl ModelSchemaResponse {
    /// Creates a schema response from a `ModelAdmin` and its field schema.
    pub fn from_model_admin(admin: &ModelAdmin, fields: Vec<FieldSchema>) -> Self {
        Self {
            app_label: admin.app_label.clone(),
            model_name: admin.model_name.clone(),
            verbose_name: admin.verbose_name.clone(),
            verbose_name_plural: admin.verbose_name_plural.clone(),
            fields,
            list_display: admin.list_display.clone(),
            list_filter: admin.list_filter.clone(),
            search_fields: admin.search_fields.clone(),
            ordering: admin.ordering.clone(),
            list_per_page: admin.list_per_page,
            pk_field: admin.pk_field.clone(),
        }
    }
}

/// Builds the model index response from registered model admins.
pub fn build_model_index<'a>(
    admins: impl IntoIterator<Item = &'a ModelAdmin>,
    url_prefix: &str,
) -> ModelIndexResponse {
    let mut apps_map: BTreeMap<String, Vec<ModelInfo>> = BTreeMap::new();

    for admin in admins {
        let info = ModelInfo {
            name: admin.model_name.clone(),
            verbose_name: admin.verbose_name.clone(),
            verbose_name_plural: admin.verbose_name_plural.clone(),
            url: format!("{}/{}/{}/", url_prefix, admin.app_label, admin.model_name),
            read_only: true,
        };
        apps_map
            .entry(admin.app_label.clone())
            .or_default()
            .push(info);
    }

    let apps = apps_map
        .into_iter()
        .map(|(app_label, mut models)| {
            models.sort_by(|a, b| a.name.cmp(&b.name));
            AppModels { app_label, models }
        })
        .collect();

    ModelIndexResponse { apps }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn items(n: usize) -> Vec<serde_json::Value> {
        (1..=n).map(|i| serde_json::json!({"id": i})).collect()
    }

    #[test]
    fn test_paginate_first_page() {
        let response = JsonListResponse::paginate(&items(25), 1, 10);
        assert_eq!(response.count, 25);
        assert_eq!(response.page, 1);
        assert_eq!(response.page_size, 10);
        assert_eq!(response.total_pages, 3);
        assert_eq!(response.results.len(), 10);
        assert!(response.has_next);
        assert!(!response.has_previous);
    }

    #[test]
    fn test_paginate_last_page() {
        let response = JsonListResponse::paginate(&items(25), 3, 10);
        assert_eq!(response.page, 3);
        assert_eq!(response.results.len(), 5);
        assert_eq!(response.results[0]["id"], 21);
        assert!(!response.has_next);
        assert!(response.has_previous);
    }

    #[test]
    fn test_paginate_empty() {
        let response = JsonListResponse::paginate(&[], 1, 10);
        assert_eq!(response.count, 0);
        assert_eq!(response.total_pages, 1);
        assert!(response.results.is_empty());
        assert!(!response.has_next);
        assert!(!response.has_previous);
    }

    #[test]
    fn test_paginate_clamps_page_and_size() {
        let response = JsonListResponse::paginate(&items(5), 100, 10);
        assert_eq!(response.page, 1);
        let response = JsonListResponse::paginate(&items(3), 0, 0);
        assert_eq!(response.page, 1);
        assert_eq!(response.page_size, 1);
        assert_eq!(response.total_pages, 3);
    }

    #[test]
    fn test_build_model_index_groups_and_sorts() {
        let admins = [
            ModelAdmin::new("shop", "product"),
            ModelAdmin::new("billing", "paymentmethod"),
            ModelAdmin::new("shop", "category"),
        ];
        let index = build_model_index(admins.iter(), "/admin");
        assert_eq!(index.apps.len(), 2);
        assert_eq!(index.apps[0].app_label, "billing");
        let shop: Vec<_> = index.apps[1].models.iter().map(|m| m.name.as_str()).collect();
        assert_eq!(shop, vec!["category", "product"]);
        assert_eq!(index.apps[1].models[1].url, "/admin/shop/product/");
        assert!(index.apps[0].models[0].read_only);
    }

    #[test]
    fn test_schema_response() {
        let admin = ModelAdmin::new("shop", "product")
            .search_fields(vec!["name"])
            .pk_field("sku");
        let schema = ModelSchemaResponse::from_model_admin(
            &admin,
            vec![FieldSchema::new("sku", "CharField").primary_key()],
        );
        assert_eq!(schema.pk_field, "sku");
        assert_eq!(schema.fields.len(), 1);
        assert_eq!(schema.search_fields, vec!["name"]);
    }
}
