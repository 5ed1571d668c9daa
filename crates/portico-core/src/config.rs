//! Host configuration store boundary.
//!
//! The registry only needs flat key/value access plus persist/reload; keys
//! are dotted paths (`extensions.<identifier>.<key>`). [`MemoryConfigStore`]
//! backs tests and embedded hosts, [`JsonConfigStore`] persists to a JSON
//! file.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use parking_lot::RwLock;
use serde_json::Value;

/// Errors from a config store backend.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("config io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("config serialization error: {0}")]
    Serialization(String),
}

/// Key/value settings store owned by the host.
pub trait ConfigStore: Send + Sync {
    fn get(&self, key: &str) -> Option<Value>;

    fn set(&self, key: &str, value: Value);

    /// Removes a key; `false` if it was absent.
    fn remove(&self, key: &str) -> bool;

    fn contains(&self, key: &str) -> bool;

    /// Persists pending changes.
    fn save(&self) -> Result<(), ConfigError>;

    /// Re-reads persisted state, discarding unpersisted changes.
    fn reload(&self) -> Result<(), ConfigError>;
}

/// In-memory store. `save`/`reload` are counted no-ops so tests can assert
/// sync idempotency.
#[derive(Default)]
pub struct MemoryConfigStore {
    entries: RwLock<BTreeMap<String, Value>>,
    saves: std::sync::atomic::AtomicUsize,
}

impl MemoryConfigStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of `save` calls so far.
    pub fn save_count(&self) -> usize {
        self.saves.load(std::sync::atomic::Ordering::SeqCst)
    }

    /// Snapshot of all keys, for assertions.
    pub fn keys(&self) -> Vec<String> {
        self.entries.read().keys().cloned().collect()
    }
}

impl ConfigStore for MemoryConfigStore {
    fn get(&self, key: &str) -> Option<Value> {
        self.entries.read().get(key).cloned()
    }

    fn set(&self, key: &str, value: Value) {
        self.entries.write().insert(key.to_string(), value);
    }

    fn remove(&self, key: &str) -> bool {
        self.entries.write().remove(key).is_some()
    }

    fn contains(&self, key: &str) -> bool {
        self.entries.read().contains_key(key)
    }

    fn save(&self) -> Result<(), ConfigError> {
        self.saves
            .fetch_add(1, std::sync::atomic::Ordering::SeqCst);
        Ok(())
    }

    fn reload(&self) -> Result<(), ConfigError> {
        Ok(())
    }
}

/// JSON-file-backed store: a flat object of dotted keys.
pub struct JsonConfigStore {
    path: PathBuf,
    entries: RwLock<BTreeMap<String, Value>>,
}

impl JsonConfigStore {
    /// Opens the store, reading the file if it exists. A missing or empty
    /// file starts the store empty.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, ConfigError> {
        let path = path.into();
        let entries = Self::read_file(&path)?;
        Ok(Self {
            path,
            entries: RwLock::new(entries),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_file(path: &Path) -> Result<BTreeMap<String, Value>, ConfigError> {
        if !path.exists() {
            return Ok(BTreeMap::new());
        }
        let raw = std::fs::read_to_string(path)?;
        if raw.trim().is_empty() {
            return Ok(BTreeMap::new());
        }
        serde_json::from_str(&raw).map_err(|err| ConfigError::Serialization(err.to_string()))
    }
}

impl ConfigStore for JsonConfigStore {
    fn get(&self, key: &str) -> Option<Value> {
        self.entries.read().get(key).cloned()
    }

    fn set(&self, key: &str, value: Value) {
        self.entries.write().insert(key.to_string(), value);
    }

    fn remove(&self, key: &str) -> bool {
        self.entries.write().remove(key).is_some()
    }

    fn contains(&self, key: &str) -> bool {
        self.entries.read().contains_key(key)
    }

    fn save(&self) -> Result<(), ConfigError> {
        let raw = serde_json::to_string_pretty(&*self.entries.read())
            .map_err(|err| ConfigError::Serialization(err.to_string()))?;
        std::fs::write(&self.path, raw)?;
        Ok(())
    }

    fn reload(&self) -> Result<(), ConfigError> {
        let entries = Self::read_file(&self.path)?;
        *self.entries.write() = entries;
        Ok(())
    }
}
