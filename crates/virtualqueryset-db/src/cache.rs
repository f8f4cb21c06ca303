//! TTL cache backends for cache-backed querysets.
//!
//! - [`InMemoryCache`]: process-local, shared by clones; expired entries are
//!   skipped on read and pruned on write.
//! - [`FileCache`]: one JSON file per key, so several processes on one
//!   machine can share fetched data.
//! - [`DummyCache`]: stores nothing.
//!
//! [`shared_memory_cache`] returns the process-wide in-memory instance and
//! [`cache_from_settings`] builds a backend from a `caches` entry.
//!
//! ```rust,no_run
//! use virtualqueryset_db::cache::{CacheBackend, CacheValue, InMemoryCache};
//!
//! async fn example() {
//!     let cache = InMemoryCache::new();
//!     cache.set("greeting", CacheValue::String("hi".into()), None).await.unwrap();
//!     assert!(cache.has_key("greeting").await.unwrap());
//! }
//! ```

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tokio::sync::RwLock;
use virtualqueryset_core::settings::CacheSettings;
use virtualqueryset_core::{VirtualError, VirtualResult};

/// A value stored in a cache backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum CacheValue {
    /// A string value.
    String(String),
    /// A 64-bit integer value.
    Integer(i64),
    /// A 64-bit floating-point value.
    Float(f64),
    /// Raw bytes.
    Bytes(Vec<u8>),
    /// A JSON value; fetched querysets are stored this way.
    Json(serde_json::Value),
}

impl CacheValue {
    /// Returns the string, if this is a `String`.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    /// Returns the integer, if this is an `Integer`.
    pub const fn as_integer(&self) -> Option<i64> {
        match self {
            Self::Integer(i) => Some(*i),
            _ => None,
        }
    }

    /// Returns the JSON value, if this is `Json`.
    pub const fn as_json(&self) -> Option<&serde_json::Value> {
        match self {
            Self::Json(v) => Some(v),
            _ => None,
        }
    }

    /// Consumes the value, returning the JSON payload if this is `Json`.
    pub fn into_json(self) -> Option<serde_json::Value> {
        match self {
            Self::Json(v) => Some(v),
            _ => None,
        }
    }
}

/// A key-value store with optional per-entry expiry.
#[async_trait]
pub trait CacheBackend: Send + Sync {
    /// Returns the live value for `key`, or `None` if missing or expired.
    async fn get(&self, key: &str) -> VirtualResult<Option<CacheValue>>;

    /// Stores `value` under `key`. `None` means no expiry.
    async fn set(&self, key: &str, value: CacheValue, ttl: Option<Duration>) -> VirtualResult<()>;

    /// Removes `key`, returning whether it was present.
    async fn delete(&self, key: &str) -> VirtualResult<bool>;

    /// Removes every entry.
    async fn clear(&self) -> VirtualResult<()>;

    /// Returns the live values among `keys`.
    async fn get_many(&self, keys: &[&str]) -> VirtualResult<HashMap<String, CacheValue>> {
        let mut found = HashMap::new();
        for &key in keys {
            if let Some(value) = self.get(key).await? {
                found.insert(key.to_string(), value);
            }
        }
        Ok(found)
    }

    /// Stores every entry of `values` with the same `ttl`.
    async fn set_many(
        &self,
        values: &HashMap<String, CacheValue>,
        ttl: Option<Duration>,
    ) -> VirtualResult<()> {
        for (key, value) in values {
            self.set(key, value.clone(), ttl).await?;
        }
        Ok(())
    }

    /// Returns `true` if `key` holds a live value.
    async fn has_key(&self, key: &str) -> VirtualResult<bool> {
        Ok(self.get(key).await?.is_some())
    }

    /// Adds `delta` to an integer entry and returns the new value.
    ///
    /// The entry keeps no expiry afterwards.
    async fn incr(&self, key: &str, delta: i64) -> VirtualResult<i64> {
        let current = self
            .get(key)
            .await?
            .ok_or_else(|| VirtualError::NotFound(format!("cache key '{key}'")))?;
        let Some(current) = current.as_integer() else {
            return Err(VirtualError::CacheError(format!(
                "cache key '{key}' does not hold an integer"
            )));
        };
        let next = current.saturating_add(delta);
        self.set(key, CacheValue::Integer(next), None).await?;
        Ok(next)
    }
}

// ── In-memory ────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
struct MemoryEntry {
    value: CacheValue,
    expires_at: Option<Instant>,
}

impl MemoryEntry {
    fn is_live(&self, now: Instant) -> bool {
        self.expires_at.map_or(true, |at| now < at)
    }
}

/// A process-local cache. Clones share the same store.
#[derive(Debug, Clone, Default)]
pub struct InMemoryCache {
    store: Arc<RwLock<HashMap<String, MemoryEntry>>>,
}

impl InMemoryCache {
    /// Creates an empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// The number of stored entries, expired ones included.
    pub async fn len(&self) -> usize {
        self.store.read().await.len()
    }

    /// Returns `true` if nothing is stored.
    pub async fn is_empty(&self) -> bool {
        self.store.read().await.is_empty()
    }
}

#[async_trait]
impl CacheBackend for InMemoryCache {
    async fn get(&self, key: &str) -> VirtualResult<Option<CacheValue>> {
        let store = self.store.read().await;
        let now = Instant::now();
        Ok(store
            .get(key)
            .filter(|entry| entry.is_live(now))
            .map(|entry| entry.value.clone()))
    }

    async fn set(&self, key: &str, value: CacheValue, ttl: Option<Duration>) -> VirtualResult<()> {
        let now = Instant::now();
        let mut store = self.store.write().await;
        store.retain(|_, entry| entry.is_live(now));
        store.insert(
            key.to_string(),
            MemoryEntry {
                value,
                expires_at: ttl.map(|d| now + d),
            },
        );
        Ok(())
    }

    async fn delete(&self, key: &str) -> VirtualResult<bool> {
        Ok(self.store.write().await.remove(key).is_some())
    }

    async fn clear(&self) -> VirtualResult<()> {
        self.store.write().await.clear();
        Ok(())
    }

    async fn incr(&self, key: &str, delta: i64) -> VirtualResult<i64> {
        let now = Instant::now();
        let mut store = self.store.write().await;
        let entry = store
            .get_mut(key)
            .filter(|entry| entry.is_live(now))
            .ok_or_else(|| VirtualError::NotFound(format!("cache key '{key}'")))?;
        match entry.value {
            CacheValue::Integer(current) => {
                let next = current.saturating_add(delta);
                entry.value = CacheValue::Integer(next);
                Ok(next)
            }
            _ => Err(VirtualError::CacheError(format!(
                "cache key '{key}' does not hold an integer"
            ))),
        }
    }
}

static SHARED_MEMORY: Lazy<InMemoryCache> = Lazy::new(InMemoryCache::new);

/// The process-wide in-memory cache used by cache-backed querysets unless
/// another backend is configured.
pub fn shared_memory_cache() -> Arc<dyn CacheBackend> {
    Arc::new(SHARED_MEMORY.clone())
}

// ── File ─────────────────────────────────────────────────────────────

/// A cache that stores each entry as a JSON file under `dir`.
#[derive(Debug, Clone)]
pub struct FileCache {
    dir: PathBuf,
}

#[derive(Serialize, Deserialize)]
struct FileEntry {
    key: String,
    value: CacheValue,
    expires_at_ms: Option<i64>,
}

impl FileCache {
    /// Creates a cache rooted at `dir`. The directory is created on first write.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// The directory holding the entries.
    pub fn dir(&self) -> &std::path::Path {
        &self.dir
    }

    fn path_for(&self, key: &str) -> PathBuf {
        let digest = Sha256::digest(key.as_bytes());
        let name: String = digest.iter().map(|b| format!("{b:02x}")).collect();
        self.dir.join(format!("{name}.cache"))
    }
}

fn now_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

#[async_trait]
impl CacheBackend for FileCache {
    async fn get(&self, key: &str) -> VirtualResult<Option<CacheValue>> {
        let path = self.path_for(key);
        let bytes = match tokio::fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        let entry: FileEntry = serde_json::from_slice(&bytes)
            .map_err(|e| VirtualError::CacheError(format!("corrupt entry for '{key}': {e}")))?;
        if entry.expires_at_ms.is_some_and(|at| now_ms() >= at) {
            tokio::fs::remove_file(&path).await.ok();
            return Ok(None);
        }
        Ok(Some(entry.value))
    }

    async fn set(&self, key: &str, value: CacheValue, ttl: Option<Duration>) -> VirtualResult<()> {
        tokio::fs::create_dir_all(&self.dir).await?;
        let expires_at_ms = ttl.map(|d| {
            now_ms().saturating_add(i64::try_from(d.as_millis()).unwrap_or(i64::MAX))
        });
        let entry = FileEntry {
            key: key.to_string(),
            value,
            expires_at_ms,
        };
        let bytes = serde_json::to_vec(&entry)?;

        // Write then rename so readers never see a partial file.
        let path = self.path_for(key);
        let tmp = path.with_extension(format!("{}.tmp", uuid::Uuid::new_v4().simple()));
        if let Err(e) = tokio::fs::write(&tmp, &bytes).await {
            tokio::fs::remove_file(&tmp).await.ok();
            return Err(e.into());
        }
        tokio::fs::rename(&tmp, &path).await?;
        Ok(())
    }

    async fn delete(&self, key: &str) -> VirtualResult<bool> {
        match tokio::fs::remove_file(self.path_for(key)).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    async fn clear(&self) -> VirtualResult<()> {
        let mut entries = match tokio::fs::read_dir(&self.dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(()),
            Err(e) => return Err(e.into()),
        };
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().is_some_and(|ext| ext == "cache") {
                tokio::fs::remove_file(&path).await.ok();
            }
        }
        Ok(())
    }
}

// ── Dummy ────────────────────────────────────────────────────────────

/// A cache that never stores anything.
#[derive(Debug, Clone, Copy, Default)]
pub struct DummyCache;

#[async_trait]
impl CacheBackend for DummyCache {
    async fn get(&self, _key: &str) -> VirtualResult<Option<CacheValue>> {
        Ok(None)
    }

    async fn set(&self, _key: &str, _value: CacheValue, _ttl: Option<Duration>) -> VirtualResult<()> {
        Ok(())
    }

    async fn delete(&self, _key: &str) -> VirtualResult<bool> {
        Ok(false)
    }

    async fn clear(&self) -> VirtualResult<()> {
        Ok(())
    }
}

/// Builds the backend described by a `caches` entry.
///
/// `locmem` maps to the [shared](shared_memory_cache) in-memory cache so
/// every queryset in the process sees the same entries.
///
/// # Errors
///
/// Returns [`VirtualError::ImproperlyConfigured`] for an unknown backend or
/// a `file` backend without a location.
pub fn cache_from_settings(settings: &CacheSettings) -> VirtualResult<Arc<dyn CacheBackend>> {
    match settings.backend.as_str() {
        "locmem" | "memory" => Ok(shared_memory_cache()),
        "file" if settings.location.is_empty() => Err(VirtualError::ImproperlyConfigured(
            "the file cache backend needs a location".to_string(),
        )),
        "file" => Ok(Arc::new(FileCache::new(&settings.location))),
        "dummy" => Ok(Arc::new(DummyCache)),
        other => Err(VirtualError::ImproperlyConfigured(format!(
            "unknown cache backend '{other}'"
        ))),
    }
}
