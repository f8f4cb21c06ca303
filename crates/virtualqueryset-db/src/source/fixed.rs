//! A fixed list of items.

use std::sync::Arc;

use async_trait::async_trait;
use virtualqueryset_core::VirtualResult;

use super::DataSource;

/// Serves the same items on every load.
#[derive(Debug, Clone, Default)]
pub struct StaticSource {
    items: Arc<Vec<serde_json::Value>>,
}

impl StaticSource {
    /// Serves `items`.
    pub fn new(items: Vec<serde_json::Value>) -> Self {
        Self {
            items: Arc::new(items),
        }
    }
}

impl FromIterator<serde_json::Value> for StaticSource {
    fn from_iter<I: IntoIterator<Item = serde_json::Value>>(iter: I) -> Self {
        Self::new(iter.into_iter().collect())
    }
}

#[async_trait]
impl DataSource for StaticSource {
    async fn load(&self) -> VirtualResult<Vec<serde_json::Value>> {
        Ok(self.items.as_ref().clone())
    }

    fn describe(&self) -> String {
        format!("{} static items", self.items.len())
    }
}
