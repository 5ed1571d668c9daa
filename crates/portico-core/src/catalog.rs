//! Remote update catalog boundary.
//!
//! The catalog service knows, per identifier, the latest published version
//! of an extension. The registry marks which entries have a local copy and
//! whether an update is available; it never orders versions, only compares
//! them for inequality.

use std::collections::HashMap;

use parking_lot::RwLock;

/// One catalog record, keyed by lowercased identifier.
#[derive(Debug, Clone, Default)]
pub struct CatalogEntry {
    pub latest_version: String,
    pub has_local_copy: bool,
    pub update_available: bool,
}

/// Catalog interface the registry drives.
pub trait UpdateCatalog: Send + Sync {
    /// Latest published version for the identifier, if the catalog knows it.
    fn latest_version(&self, identifier: &str) -> Option<String>;

    fn set_local_copy(&self, identifier: &str, present: bool);

    fn set_update_available(&self, identifier: &str, available: bool);

    fn update_available(&self, identifier: &str) -> bool;
}

/// In-memory catalog, seeded by the host from its remote sync.
#[derive(Default)]
pub struct MemoryCatalog {
    entries: RwLock<HashMap<String, CatalogEntry>>,
}

impl MemoryCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seeds a catalog record.
    pub fn insert(&self, identifier: &str, latest_version: impl Into<String>) {
        self.entries.write().insert(
            identifier.to_lowercase(),
            CatalogEntry {
                latest_version: latest_version.into(),
                ..CatalogEntry::default()
            },
        );
    }

    /// Snapshot of one record, for assertions and status views.
    pub fn entry(&self, identifier: &str) -> Option<CatalogEntry> {
        self.entries.read().get(&identifier.to_lowercase()).cloned()
    }
}

impl UpdateCatalog for MemoryCatalog {
    fn latest_version(&self, identifier: &str) -> Option<String> {
        self.entries
            .read()
            .get(&identifier.to_lowercase())
            .map(|entry| entry.latest_version.clone())
    }

    fn set_local_copy(&self, identifier: &str, present: bool) {
        if let Some(entry) = self.entries.write().get_mut(&identifier.to_lowercase()) {
            entry.has_local_copy = present;
        }
    }

    fn set_update_available(&self, identifier: &str, available: bool) {
        if let Some(entry) = self.entries.write().get_mut(&identifier.to_lowercase()) {
            entry.update_available = available;
        }
    }

    fn update_available(&self, identifier: &str) -> bool {
        self.entries
            .read()
            .get(&identifier.to_lowercase())
            .map(|entry| entry.update_available)
            .unwrap_or(false)
    }
}
