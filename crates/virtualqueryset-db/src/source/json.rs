//! Items read from JSON text, a JSON file, or an in-memory JSON value.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tracing::Instrument;
use virtualqueryset_core::logging::source_span;
use virtualqueryset_core::{VirtualError, VirtualResult};

use super::DataSource;
use crate::record::walk_path;

/// Where a [`JsonSource`] reads from.
#[derive(Debug, Clone, PartialEq)]
pub enum JsonInput {
    /// An already-parsed value.
    Value(serde_json::Value),
    /// A path to an existing file, or else JSON text.
    Text(String),
    /// A file path.
    File(PathBuf),
}

impl From<serde_json::Value> for JsonInput {
    fn from(value: serde_json::Value) -> Self {
        Self::Value(value)
    }
}

impl From<String> for JsonInput {
    fn from(text: String) -> Self {
        Self::Text(text)
    }
}

impl From<&str> for JsonInput {
    fn from(text: &str) -> Self {
        Self::Text(text.to_string())
    }
}

impl From<PathBuf> for JsonInput {
    fn from(path: PathBuf) -> Self {
        Self::File(path)
    }
}

impl From<&Path> for JsonInput {
    fn from(path: &Path) -> Self {
        Self::File(path.to_path_buf())
    }
}

/// Exposes a JSON document (or the part of it at `json_path`) as items.
///
/// A list yields its elements, an object yields itself, anything else
/// yields nothing. Unreadable files, invalid JSON and unresolvable paths
/// are logged and yield nothing.
///
/// # Examples
///
/// ```
/// use virtualqueryset_db::source::{DataSource, JsonSource};
///
/// # tokio::runtime::Runtime::new().unwrap().block_on(async {
/// let source = JsonSource::new(r#"{"data": {"rows": [{"id": 1}, {"id": 2}]}}"#)
///     .with_json_path("data.rows");
/// assert_eq!(source.load().await.unwrap().len(), 2);
/// # });
/// ```
#[derive(Debug, Clone)]
pub struct JsonSource {
    input: JsonInput,
    json_path: Option<String>,
}

impl JsonSource {
    /// Reads from `input`.
    pub fn new(input: impl Into<JsonInput>) -> Self {
        Self {
            input: input.into(),
            json_path: None,
        }
    }

    /// Selects a dot-separated path inside the document (`"results.items"`,
    /// `"pages.0.rows"`). An empty path selects the whole document.
    #[must_use]
    pub fn with_json_path(mut self, path: impl Into<String>) -> Self {
        let path = path.into();
        self.json_path = (!path.is_empty()).then_some(path);
        self
    }

    /// The input being read.
    pub const fn input(&self) -> &JsonInput {
        &self.input
    }

    async fn document(&self) -> VirtualResult<serde_json::Value> {
        match &self.input {
            JsonInput::Value(value) => Ok(value.clone()),
            JsonInput::File(path) => read_file(path).await,
            JsonInput::Text(text) if text.trim().is_empty() => Ok(serde_json::Value::Null),
            JsonInput::Text(text) => {
                let is_file = tokio::fs::metadata(text)
                    .await
                    .map(|m| m.is_file())
                    .unwrap_or(false);
                if is_file {
                    read_file(Path::new(text)).await
                } else {
                    Ok(serde_json::from_str(text)?)
                }
            }
        }
    }

    async fn read_items(&self) -> VirtualResult<Vec<serde_json::Value>> {
        let document = self.document().await?;
        let selected = match &self.json_path {
            None => &document,
            Some(path) => walk_path(&document, path.split('.')).ok_or_else(|| {
                VirtualError::NotFound(format!("json path '{path}'"))
            })?,
        };
        Ok(match selected {
            serde_json::Value::Array(items) => items.clone(),
            obj @ serde_json::Value::Object(_) => vec![obj.clone()],
            _ => Vec::new(),
        })
    }
}

async fn read_file(path: &Path) -> VirtualResult<serde_json::Value> {
    let bytes = tokio::fs::read(path).await?;
    Ok(serde_json::from_slice(&bytes)?)
}

#[async_trait]
impl DataSource for JsonSource {
    async fn load(&self) -> VirtualResult<Vec<serde_json::Value>> {
        let span = source_span("json", &self.describe());
        async {
            match self.read_items().await {
                Ok(items) => Ok(items),
                Err(e) => {
                    tracing::error!(error = %e, "could not read JSON items");
                    Ok(Vec::new())
                }
            }
        }
        .instrument(span)
        .await
    }

    fn describe(&self) -> String {
        match &self.input {
            JsonInput::Value(_) => "json value".to_string(),
            JsonInput::Text(text) if text.chars().count() > 40 => {
                let head: String = text.chars().take(40).collect();
                format!("json {head}...")
            }
            JsonInput::Text(text) => format!("json {text}"),
            JsonInput::File(path) => format!("json file {}", path.display()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_text_list() {
        let source = JsonSource::new(r#"[{"id": 1}, {"id": 2}]"#);
        assert_eq!(source.load().await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_text_object_is_single_item() {
        let source = JsonSource::new(r#"{"id": 1}"#);
        assert_eq!(source.load().await.unwrap(), vec![json!({"id": 1})]);
    }

    #[tokio::test]
    async fn test_scalar_document_is_empty() {
        assert!(JsonSource::new("42").load().await.unwrap().is_empty());
        assert!(JsonSource::new("").load().await.unwrap().is_empty());
        assert!(JsonSource::new(json!(null)).load().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_invalid_json_is_empty() {
        assert!(JsonSource::new("{not json").load().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_value_with_path_and_index() {
        let doc = json!({"pages": [{"rows": [1, 2, 3]}, {"rows": [4]}]});
        let source = JsonSource::new(doc.clone()).with_json_path("pages.1.rows");
        assert_eq!(source.load().await.unwrap(), vec![json!(4)]);

        let missing = JsonSource::new(doc.clone()).with_json_path("pages.7.rows");
        assert!(missing.load().await.unwrap().is_empty());

        let wrong_kind = JsonSource::new(doc).with_json_path("pages.rows");
        assert!(wrong_kind.load().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_file_input_and_reload() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("items.json");
        std::fs::write(&path, r#"{"results": [{"id": 1}]}"#).unwrap();

        let source = JsonSource::new(path.clone()).with_json_path("results");
        assert_eq!(source.load().await.unwrap(), vec![json!({"id": 1})]);

        std::fs::write(&path, r#"{"results": [{"id": 1}, {"id": 2}]}"#).unwrap();
        assert_eq!(source.reload().await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_text_that_names_a_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("items.json");
        std::fs::write(&path, "[1, 2]").unwrap();
        let source = JsonSource::new(path.to_string_lossy().to_string());
        assert_eq!(source.load().await.unwrap(), vec![json!(1), json!(2)]);
    }

    #[tokio::test]
    async fn test_missing_file_is_empty() {
        let source = JsonSource::new(PathBuf::from("/nonexistent/items.json"));
        assert!(source.load().await.unwrap().is_empty());
    }
}
