//! Virtual models and their metadata.
//!
//! A [`VirtualModel`] is a typed record that is never persisted: it is built
//! from the JSON items a data source yields, and its `save`/`delete`
//! methods refuse to run unless overridden. [`VirtualMeta`] plays the part
//! of `class Meta`.
//!
//! # Examples
//!
//! ```
//! use once_cell::sync::Lazy;
//! use serde::{Deserialize, Serialize};
//! use virtualqueryset_db::model::{VirtualMeta, VirtualModel};
//! use virtualqueryset_db::record::Record;
//!
//! #[derive(Clone, Serialize, Deserialize)]
//! struct Product {
//!     id: i64,
//!     name: String,
//! }
//!
//! impl Record for Product {}
//!
//! impl VirtualModel for Product {
//!     fn meta() -> &'static VirtualMeta {
//!         static META: Lazy<VirtualMeta> =
//!             Lazy::new(|| VirtualMeta::new("shop", "Product").with_ordering(["name"]));
//!         &META
//!     }
//! }
//!
//! let mut p = Product::from_item(serde_json::json!({"id": 1, "name": "Widget"})).unwrap();
//! assert_eq!(Product::meta().model_key(), "shop.product");
//! assert!(p.save().is_err());
//! ```

use once_cell::sync::Lazy;
use serde::de::DeserializeOwned;
use virtualqueryset_core::{VirtualError, VirtualResult};

use crate::record::{Record, SCALAR_FIELD};
use crate::value::Value;

/// Model-level options, the equivalent of `class Meta`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VirtualMeta {
    /// The application this model belongs to.
    pub app_label: String,
    /// The model's type name, used in error messages (e.g. `"Product"`).
    pub object_name: String,
    /// The lowercased model name (e.g. `"product"`).
    pub model_name: String,
    /// Human-readable singular name.
    pub verbose_name: String,
    /// Human-readable plural name.
    pub verbose_name_plural: String,
    /// Default ordering applied by managers (`"-price"` for descending).
    pub ordering: Vec<String>,
    /// Read-only models use the read-only `save`/`delete` messages.
    pub read_only: bool,
    /// The field holding the primary key.
    pub pk_field: String,
}

impl VirtualMeta {
    /// Creates metadata with derived names: `model_name` and
    /// `verbose_name` are the lowercased object name, the plural adds `s`.
    pub fn new(app_label: impl Into<String>, object_name: impl Into<String>) -> Self {
        let object_name = object_name.into();
        let model_name = object_name.to_lowercase();
        Self {
            app_label: app_label.into(),
            verbose_name: model_name.clone(),
            verbose_name_plural: format!("{model_name}s"),
            object_name,
            model_name,
            ordering: Vec::new(),
            read_only: false,
            pk_field: "id".to_string(),
        }
    }

    /// Sets the default ordering.
    #[must_use]
    pub fn with_ordering<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.ordering = fields.into_iter().map(Into::into).collect();
        self
    }

    /// Sets the human-readable names.
    #[must_use]
    pub fn with_verbose_name(
        mut self,
        singular: impl Into<String>,
        plural: impl Into<String>,
    ) -> Self {
        self.verbose_name = singular.into();
        self.verbose_name_plural = plural.into();
        self
    }

    /// Sets the primary key field.
    #[must_use]
    pub fn with_pk_field(mut self, field: impl Into<String>) -> Self {
        self.pk_field = field.into();
        self
    }

    /// Marks the model read-only.
    #[must_use]
    pub fn read_only(mut self) -> Self {
        self.read_only = true;
        self
    }

    /// The `app_label.model_name` key used to register the model.
    pub fn model_key(&self) -> String {
        format!("{}.{}", self.app_label, self.model_name)
    }

    /// The error returned by the default `save()`.
    pub fn save_error(&self) -> VirtualError {
        let name = &self.object_name;
        VirtualError::NotSupported(if self.read_only {
            format!("{name} is read-only and cannot be modified.")
        } else {
            format!(
                "{name} is a virtual model and cannot be saved to database. \
                 Override save() if you want to implement custom persistence."
            )
        })
    }

    /// The error returned by the default `delete()`.
    pub fn delete_error(&self) -> VirtualError {
        let name = &self.object_name;
        VirtualError::NotSupported(if self.read_only {
            format!("{name} is read-only and cannot be deleted.")
        } else {
            format!(
                "{name} is a virtual model and cannot be deleted from database. \
                 Override delete() if you want to implement custom deletion."
            )
        })
    }
}

/// A typed, non-persisted model built from data-source items.
pub trait VirtualModel: Record + DeserializeOwned {
    /// Returns the static metadata for this model type.
    fn meta() -> &'static VirtualMeta;

    /// Builds an instance from one source item.
    ///
    /// Objects deserialize directly; scalar items are first wrapped as
    /// `{"value": item}`.
    ///
    /// # Errors
    ///
    /// Returns [`VirtualError::FieldError`] naming the model when the item
    /// does not fit.
    fn from_item(item: serde_json::Value) -> VirtualResult<Self> {
        let item = if item.is_object() {
            item
        } else {
            let mut wrapped = serde_json::Map::new();
            wrapped.insert(SCALAR_FIELD.to_string(), item);
            serde_json::Value::Object(wrapped)
        };
        serde_json::from_value(item).map_err(|e| {
            VirtualError::FieldError(format!(
                "cannot build {} from source item: {e}",
                Self::meta().object_name
            ))
        })
    }

    /// The primary key value.
    fn pk(&self) -> Value {
        self.field(&Self::meta().pk_field)
    }

    /// Virtual models cannot be saved unless this is overridden.
    ///
    /// # Errors
    ///
    /// The default implementation always returns [`VirtualError::NotSupported`].
    fn save(&mut self) -> VirtualResult<()> {
        Err(Self::meta().save_error())
    }

    /// Virtual models cannot be deleted unless this is overridden.
    ///
    /// # Errors
    ///
    /// The default implementation always returns [`VirtualError::NotSupported`].
    fn delete(&self) -> VirtualResult<()> {
        Err(Self::meta().delete_error())
    }
}

static UNTYPED_META: Lazy<VirtualMeta> = Lazy::new(|| VirtualMeta::new("virtual", "Object"));

/// Untyped items: any JSON value is a model named `Object`.
impl VirtualModel for serde_json::Value {
    fn meta() -> &'static VirtualMeta {
        &UNTYPED_META
    }

    fn from_item(item: serde_json::Value) -> VirtualResult<Self> {
        Ok(item)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::{Deserialize, Serialize};
    use serde_json::json;

    #[derive(Debug, Clone, Serialize, Deserialize)]
    struct Setting {
        key: String,
        value: serde_json::Value,
    }

    impl Record for Setting {}

    impl VirtualModel for Setting {
        fn meta() -> &'static VirtualMeta {
            static META: Lazy<VirtualMeta> = Lazy::new(|| {
                VirtualMeta::new("config", "Setting")
                    .with_pk_field("key")
                    .read_only()
            });
            &META
        }
    }

    #[derive(Debug, Clone, Serialize, Deserialize)]
    struct App {
        value: String,
    }

    impl Record for App {}

    impl VirtualModel for App {
        fn meta() -> &'static VirtualMeta {
            static META: Lazy<VirtualMeta> = Lazy::new(|| VirtualMeta::new("config", "App"));
            &META
        }
    }

    #[test]
    fn test_meta_derived_names() {
        let meta = VirtualMeta::new("shop", "Product");
        assert_eq!(meta.model_name, "product");
        assert_eq!(meta.verbose_name, "product");
        assert_eq!(meta.verbose_name_plural, "products");
        assert_eq!(meta.pk_field, "id");
        assert_eq!(meta.model_key(), "shop.product");
        assert!(!meta.read_only);
    }

    #[test]
    fn test_meta_builders() {
        let meta = VirtualMeta::new("shop", "Category")
            .with_verbose_name("category", "categories")
            .with_ordering(["-rank", "name"]);
        assert_eq!(meta.verbose_name_plural, "categories");
        assert_eq!(meta.ordering, vec!["-rank", "name"]);
    }

    #[test]
    fn test_from_item_object() {
        let s = Setting::from_item(json!({"key": "DEBUG", "value": true})).unwrap();
        assert_eq!(s.key, "DEBUG");
        assert_eq!(s.pk(), Value::from("DEBUG"));
    }

    #[test]
    fn test_from_item_scalar_is_wrapped() {
        let app = App::from_item(json!("blog")).unwrap();
        assert_eq!(app.value, "blog");
    }

    #[test]
    fn test_from_item_mismatch_names_model() {
        let err = Setting::from_item(json!({"nope": 1})).unwrap_err();
        assert!(matches!(err, VirtualError::FieldError(_)));
        assert!(err.to_string().contains("Setting"));
    }

    #[test]
    fn test_virtual_save_delete_messages() {
        let mut app = App::from_item(json!("blog")).unwrap();
        assert_eq!(
            app.save().unwrap_err().to_string(),
            "App is a virtual model and cannot be saved to database. \
             Override save() if you want to implement custom persistence."
        );
        assert_eq!(
            app.delete().unwrap_err().to_string(),
            "App is a virtual model and cannot be deleted from database. \
             Override delete() if you want to implement custom deletion."
        );
    }

    #[test]
    fn test_read_only_save_delete_messages() {
        let mut s = Setting::from_item(json!({"key": "A", "value": 1})).unwrap();
        assert_eq!(
            s.save().unwrap_err().to_string(),
            "Setting is read-only and cannot be modified."
        );
        assert_eq!(
            s.delete().unwrap_err().to_string(),
            "Setting is read-only and cannot be deleted."
        );
        assert_eq!(s.save().unwrap_err().status_code(), 405);
    }

    #[test]
    fn test_untyped_model() {
        assert_eq!(serde_json::Value::meta().object_name, "Object");
        let item = serde_json::Value::from_item(json!(3)).unwrap();
        assert_eq!(item, json!(3));
    }
}
