//! Model administration configuration.
//!
//! [`ModelAdmin`] controls how a virtual model is listed in the admin:
//! which columns are shown, which fields are searchable or filterable, the
//! default ordering and the page size. Virtual models are never edited
//! through the admin, so there is no form configuration.

use serde::{Deserialize, Serialize};
use virtualqueryset_db::model::VirtualMeta;

/// Configuration for how a virtual model is displayed in the admin.
///
/// # Examples
///
/// ```
/// use virtualqueryset_admin::model_admin::ModelAdmin;
///
/// let admin = ModelAdmin::new("billing", "paymentmethod")
///     .list_display(vec!["code", "label", "fee"])
///     .list_filter_fields(vec!["enabled"])
///     .search_fields(vec!["code", "label"])
///     .ordering(vec!["label"])
///     .list_per_page(25);
/// assert_eq!(admin.model_key(), "billing.paymentmethod");
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelAdmin {
    /// The application label (e.g., "billing").
    pub app_label: String,
    /// The model name in lowercase (e.g., "paymentmethod").
    pub model_name: String,
    /// The human-readable verbose name.
    pub verbose_name: String,
    /// The human-readable plural verbose name.
    pub verbose_name_plural: String,
    /// Fields to display in the list view. Empty means every field.
    pub list_display: Vec<String>,
    /// Fields offered as sidebar filters.
    pub list_filter: Vec<String>,
    /// Fields searched when using the search box.
    pub search_fields: Vec<String>,
    /// Default ordering for the list view (prefix with "-" for descending).
    pub ordering: Vec<String>,
    /// Number of items per page in list view.
    pub list_per_page: usize,
    /// The field identifying an object in detail URLs.
    pub pk_field: String,
    /// Field descriptions. Empty means inferred from the data.
    pub fields_schema: Vec<FieldSchema>,
}

impl ModelAdmin {
    /// Creates a new `ModelAdmin` with default configuration.
    pub fn new(app_label: impl Into<String>, model_name: impl Into<String>) -> Self {
        let model = model_name.into();
        let verbose = model.replace('_', " ");
        let verbose_plural = format!("{verbose}s");
        Self {
            app_label: app_label.into(),
            model_name: model,
            verbose_name: verbose,
            verbose_name_plural: verbose_plural,
            list_display: Vec::new(),
            list_filter: Vec::new(),
            search_fields: Vec::new(),
            ordering: Vec::new(),
            list_per_page: 100,
            pk_field: "id".to_string(),
            fields_schema: Vec::new(),
        }
    }

    /// Creates a `ModelAdmin` from a model's metadata: names, verbose
    /// names, ordering and primary key field are taken from `meta`.
    pub fn for_meta(meta: &VirtualMeta) -> Self {
        Self {
            verbose_name: meta.verbose_name.clone(),
            verbose_name_plural: meta.verbose_name_plural.clone(),
            ordering: meta.ordering.clone(),
            pk_field: meta.pk_field.clone(),
            ..Self::new(meta.app_label.clone(), meta.model_name.clone())
        }
    }

    /// Sets the verbose name.
    #[must_use]
    pub fn verbose_name(mut self, name: impl Into<String>) -> Self {
        self.verbose_name = name.into();
        self
    }

    /// Sets the plural verbose name.
    #[must_use]
    pub fn verbose_name_plural(mut self, name: impl Into<String>) -> Self {
        self.verbose_name_plural = name.into();
        self
    }

    /// Sets the fields to display in the list view.
    #[must_use]
    pub fn list_display(mut self, fields: Vec<&str>) -> Self {
        self.list_display = fields.into_iter().map(String::from).collect();
        self
    }

    /// Sets the list filters from field names.
    #[must_use]
    pub fn list_filter_fields(mut self, fields: Vec<&str>) -> Self {
        self.list_filter = fields.into_iter().map(String::from).collect();
        self
    }

    /// Sets the fields to search over.
    #[must_use]
    pub fn search_fields(mut self, fields: Vec<&str>) -> Self {
        self.search_fields = fields.into_iter().map(String::from).collect();
        self
    }

    /// Sets the default ordering.
    #[must_use]
    pub fn ordering(mut self, fields: Vec<&str>) -> Self {
        self.ordering = fields.into_iter().map(String::from).collect();
        self
    }

    /// Sets the number of items per page.
    #[must_use]
    pub const fn list_per_page(mut self, count: usize) -> Self {
        self.list_per_page = count;
        self
    }

    /// Sets the primary key field.
    #[must_use]
    pub fn pk_field(mut self, field: impl Into<String>) -> Self {
        self.pk_field = field.into();
        self
    }

    /// Sets the field schema for introspection.
    #[must_use]
    pub fn fields_schema(mut self, schema: Vec<FieldSchema>) -> Self {
        self.fields_schema = schema;
        self
    }

    /// Returns the model key in `"app_label.model_name"` format.
    pub fn model_key(&self) -> String {
        format!("{}.{}", self.app_label, self.model_name)
    }
}

/// Schema information about a single field.
///
/// Every field of a virtual model is read-only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldSchema {
    /// The field name.
    pub name: String,
    /// The field type (e.g., "`CharField`", "`IntegerField`", "`JSONField`").
    pub field_type: String,
    /// Whether this field is the primary key.
    pub primary_key: bool,
    /// Human-readable label.
    pub label: String,
    /// Help text for the field.
    pub help_text: String,
}

impl FieldSchema {
    /// Creates a new field schema entry.
    pub fn new(name: impl Into<String>, field_type: impl Into<String>) -> Self {
        let n = name.into();
        let label = n.replace('_', " ");
        Self {
            name: n,
            field_type: field_type.into(),
            primary_key: false,
            label,
            help_text: String::new(),
        }
    }

    /// Marks this field as the primary key.
    #[must_use]
    pub const fn primary_key(mut self) -> Self {
        self.primary_key = true;
        self
    }

    /// Sets the human-readable label.
    #[must_use]
    pub fn label(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }

    /// Sets the help text.
    #[must_use]
    pub fn help_text(mut self, text: impl Into<String>) -> Self {
        self.help_text = text.into();
        self
    }

    /// Describes the fields of a sample record, in key order.
    pub fn infer(record: &serde_json::Map<String, serde_json::Value>, pk_field: &str) -> Vec<Self> {
        record
            .iter()
            .map(|(name, value)| {
                let field_type = match value {
                    serde_json::Value::Bool(_) => "BooleanField",
                    serde_json::Value::Number(n) if n.is_f64() => "FloatField",
                    serde_json::Value::Number(_) => "IntegerField",
                    serde_json::Value::String(_) | serde_json::Value::Null => "CharField",
                    serde_json::Value::Array(_) | serde_json::Value::Object(_) => "JSONField",
                };
                let schema = Self::new(name.clone(), field_type);
                if name == pk_field {
                    schema.primary_key()
                } else {
                    schema
                }
            })
            .collect()
    }
}
