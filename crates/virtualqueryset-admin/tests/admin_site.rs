//! Integration tests for the admin router: index, schema, list with
//! search/filter/ordering/pagination, detail, and rejected writes.

use std::collections::HashMap;
use std::sync::Arc;

use axum::body::Body;
use axum::Router;
use http::{Method, Request, StatusCode};
use http_body_util::BodyExt;
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tower::ServiceExt;
use virtualqueryset_admin::model_admin::ModelAdmin;
use virtualqueryset_admin::site::VirtualAdminSite;
use virtualqueryset_core::settings::Settings;
use virtualqueryset_db::source::ConfigSource;
use virtualqueryset_db::{Record, VirtualManager, VirtualMeta, VirtualModel};

// ── Helpers ─────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
struct Product {
    sku: String,
    name: String,
    price: f64,
    category: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    _etag: Option<String>,
}

impl Record for Product {}

impl VirtualModel for Product {
    fn meta() -> &'static VirtualMeta {
        static META: Lazy<VirtualMeta> = Lazy::new(|| {
            VirtualMeta::new("shop", "Product")
                .with_ordering(["name"])
                .with_pk_field("sku")
        });
        &META
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct Flag {
    key: String,
    value: serde_json::Value,
}

impl Record for Flag {}

impl VirtualModel for Flag {
    fn meta() -> &'static VirtualMeta {
        static META: Lazy<VirtualMeta> = Lazy::new(|| {
            VirtualMeta::new("config", "Flag")
                .with_pk_field("key")
                .with_verbose_name("feature flag", "feature flags")
        });
        &META
    }
}

fn products() -> Vec<serde_json::Value> {
    (1..=12)
        .map(|i| {
            json!({
                "sku": format!("SKU-{i:02}"),
                "name": format!("Product {i:02}"),
                "price": f64::from(i) * 10.0,
                "category": if i % 3 == 0 { "tools" } else { "garden" },
                "_etag": "abc",
            })
        })
        .collect()
}

fn router() -> Router {
    let mut settings = Settings::default();
    settings.extra = HashMap::from([(
        "FEATURE_FLAGS".to_string(),
        json!({"beta": false, "dark_mode": true}),
    )]);
    let flags = VirtualManager::<Flag>::from_source(ConfigSource::with_settings(
        Arc::new(settings),
        "FEATURE_FLAGS",
    ));

    let mut site = VirtualAdminSite::new("virtual admin");
    site.register(
        VirtualManager::<Product>::from_items(products()),
        ModelAdmin::for_meta(Product::meta())
            .search_fields(vec!["name", "sku"])
            .list_filter_fields(vec!["category"])
            .list_per_page(5),
    );
    site.register_model(flags);
    site.into_axum_router()
}

async fn send(method: Method, uri: &str) -> (StatusCode, serde_json::Value) {
    let request = Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from("{}"))
        .unwrap();
    let response = router().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let body = if bytes.is_empty() {
        serde_json::Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, body)
}

async fn get(uri: &str) -> (StatusCode, serde_json::Value) {
    send(Method::GET, uri).await
}

// ═════════════════════════════════════════════════════════════════════
// 1. Index and schema
// ═════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn test_index_lists_registered_models() {
    let (status, body) = get("/").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["site_name"], "virtual admin");
    assert_eq!(body["apps"][0]["app_label"], "config");
    assert_eq!(body["apps"][0]["models"][0]["verbose_name_plural"], "feature flags");
    assert_eq!(body["apps"][1]["models"][0]["url"], "/api/admin/shop/product/");
}

#[tokio::test]
async fn test_schema_is_inferred_from_records() {
    let (status, body) = get("/shop/product/schema").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["pk_field"], "sku");
    let fields: Vec<_> = body["fields"]
        .as_array()
        .unwrap()
        .iter()
        .map(|f| f["name"].as_str().unwrap().to_string())
        .collect();
    assert_eq!(fields, vec!["category", "name", "price", "sku"]);
}

#[tokio::test]
async fn test_unknown_model_is_404() {
    let (status, body) = get("/shop/missing/").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "Model 'shop.missing' not found");
}

// ═════════════════════════════════════════════════════════════════════
// 2. Listing
// ═════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn test_list_first_page() {
    let (status, body) = get("/shop/product/").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["count"], 12);
    assert_eq!(body["total_pages"], 3);
    assert_eq!(body["results"].as_array().unwrap().len(), 5);
    assert_eq!(body["results"][0]["sku"], "SKU-01");
    assert!(body["results"][0].get("_etag").is_none());
    assert_eq!(body["filter_choices"]["category"], json!(["garden", "tools"]));
}

#[tokio::test]
async fn test_list_filter_search_and_ordering() {
    let (_, body) = get("/shop/product/?category=tools&ordering=-price").await;
    let skus: Vec<_> = body["results"]
        .as_array()
        .unwrap()
        .iter()
        .map(|r| r["sku"].as_str().unwrap())
        .collect();
    assert_eq!(skus, vec!["SKU-12", "SKU-09", "SKU-06", "SKU-03"]);

    let (_, body) = get("/shop/product/?price__lt=30&page_size=10").await;
    assert_eq!(body["count"], 2);

    let (_, body) = get("/shop/product/?search=product+1").await;
    assert_eq!(body["count"], 4);
}

#[tokio::test]
async fn test_list_page_past_end_is_clamped() {
    let (_, body) = get("/shop/product/?page=9").await;
    assert_eq!(body["page"], 3);
    assert_eq!(body["has_next"], false);
    assert_eq!(body["results"].as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn test_invalid_lookup_is_400() {
    let (status, body) = get("/shop/product/?name__regex=(").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().starts_with("Invalid lookup"));
}

#[tokio::test]
async fn test_config_backed_model_lists_map_entries() {
    let (_, body) = get("/config/flag/?value=true").await;
    assert_eq!(body["count"], 1);
    assert_eq!(body["results"][0]["key"], "dark_mode");
}

// ═════════════════════════════════════════════════════════════════════
// 3. Detail and writes
// ═════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn test_detail_by_pk() {
    let (status, body) = get("/shop/product/SKU-07/").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["name"], "Product 07");

    let (status, _) = get("/shop/product/SKU-99/").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_writes_are_method_not_allowed() {
    let (status, body) = send(Method::POST, "/shop/product/").await;
    assert_eq!(status, StatusCode::METHOD_NOT_ALLOWED);
    assert!(body["error"].as_str().unwrap().starts_with("Read-only"));

    let (status, _) = send(Method::PUT, "/shop/product/SKU-01/").await;
    assert_eq!(status, StatusCode::METHOD_NOT_ALLOWED);

    let (status, _) = send(Method::DELETE, "/shop/product/SKU-01/").await;
    assert_eq!(status, StatusCode::METHOD_NOT_ALLOWED);
}
