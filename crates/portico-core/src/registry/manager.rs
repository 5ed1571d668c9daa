//! Extension manager: discovery, the registration protocol, and lifecycle
//! dispatch.
//!
//! ```text
//! ┌──────────────────────────────────────────────────────┐
//! │                   ExtensionManager                   │
//! │  discovery pass ──▶ validator ──▶ pending queue      │
//! │        │                              │ (first drain)│
//! │        ▼                              ▼              │
//! │  module loader              registration protocol    │
//! │                                       │              │
//! │                                       ▼              │
//! │                        registry map (id ──▶ module)  │
//! └──────────────────────────────────────────────────────┘
//! ```
//!
//! Every mutating lifecycle operation — registration, unregistration, the
//! queue drain, forced unregistration from host events — runs under one
//! operation mutex held for the whole logical step, so conflict checks and
//! map updates are atomic with respect to each other. The blocking scan and
//! library loading run on the blocking pool and hand their results back
//! before any host-visible mutation happens.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use portico_extension_sdk::{
    Cacheable, Cleanable, Configurable, EventFlow, Extension, HostEvent, Taskable, VersionGated,
};
use serde::Serialize;
use tokio::sync::Mutex;

use super::contract;
use super::loader::{is_extension_library, ModuleLoader, NativeModuleLoader};
use super::state::{Entry, LoadState, RegistryState};
use crate::catalog::UpdateCatalog;
use crate::config::ConfigStore;
use crate::error::{RegistryError, Result};
use crate::host::Host;

/// Subdirectory of the host data dir that holds extension libraries.
pub const EXTENSIONS_FOLDER: &str = "extensions";

/// Outcome of submitting an extension through [`ExtensionManager::submit`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    /// The extension reported it cannot register; nothing happened.
    Rejected,
    /// Queued until the first discovery drain.
    Queued,
    /// The registry was already loaded; the full registration protocol ran.
    Registered,
}

/// Tally of one discovery pass.
#[derive(Debug, Clone, Copy, Default)]
pub struct LoadSummary {
    pub registered: usize,
    pub updates_available: usize,
}

/// Snapshot describing one live extension.
#[derive(Debug, Clone, Serialize)]
pub struct ExtensionInfo {
    pub identifier: String,
    pub name: String,
    pub version: String,
    pub registered_at: DateTime<Utc>,
}

/// The extension registry and lifecycle manager.
pub struct ExtensionManager {
    host: Host,
    directory: PathBuf,
    loader: Arc<dyn ModuleLoader>,
    state: RwLock<RegistryState>,
    // Serializes every mutating lifecycle operation, including event
    // dispatch and capability hooks. Not reentrant: hooks and listeners
    // must not call back into mutating operations.
    ops: Mutex<()>,
}

impl ExtensionManager {
    /// Creates a manager rooted at `<data_dir>/extensions`, creating the
    /// directory if needed. Failure to create is logged, not fatal: the
    /// first discovery pass will simply find nothing.
    pub fn new(host: Host, data_dir: impl AsRef<Path>) -> Self {
        let directory = data_dir.as_ref().join(EXTENSIONS_FOLDER);
        if !directory.exists() {
            if let Err(err) = std::fs::create_dir_all(&directory) {
                tracing::warn!(
                    "failed to create extensions folder {}: {}",
                    directory.display(),
                    err
                );
            }
        }

        Self {
            host,
            directory,
            loader: Arc::new(NativeModuleLoader::new()),
            state: RwLock::new(RegistryState::new()),
            ops: Mutex::new(()),
        }
    }

    /// Replaces the module loader (tests use in-memory fakes).
    pub fn with_loader(mut self, loader: Arc<dyn ModuleLoader>) -> Self {
        self.loader = loader;
        self
    }

    pub fn host(&self) -> &Host {
        &self.host
    }

    pub fn directory(&self) -> &Path {
        &self.directory
    }

    pub fn load_state(&self) -> LoadState {
        self.state.read().load_state
    }

    // ------------------------------------------------------------------
    // Public reads (snapshots; never expose the live map)
    // ------------------------------------------------------------------

    /// All registered identifiers (lowercased), as an owned snapshot.
    pub fn identifiers(&self) -> Vec<String> {
        self.state.read().extensions.keys().cloned().collect()
    }

    /// All live extensions, as an owned snapshot.
    pub fn extensions(&self) -> Vec<Arc<dyn Extension>> {
        self.state
            .read()
            .extensions
            .values()
            .map(|entry| Arc::clone(&entry.extension))
            .collect()
    }

    /// Snapshot of descriptive info for every live extension.
    pub fn infos(&self) -> Vec<ExtensionInfo> {
        self.state
            .read()
            .extensions
            .iter()
            .map(|(identifier, entry)| ExtensionInfo {
                identifier: identifier.clone(),
                name: entry.extension.name().to_string(),
                version: entry.extension.version().to_string(),
                registered_at: entry.registered_at,
            })
            .collect()
    }

    /// Fetch by identifier, case-insensitively.
    pub fn get(&self, identifier: &str) -> Option<Arc<dyn Extension>> {
        self.state
            .read()
            .extensions
            .get(&identifier.to_lowercase())
            .map(|entry| Arc::clone(&entry.extension))
    }

    /// First extension whose display name matches, case-insensitively.
    /// Order is unspecified under concurrent mutation.
    pub fn find_by_name(&self, name: &str) -> Option<Arc<dyn Extension>> {
        self.state
            .read()
            .extensions
            .values()
            .find(|entry| entry.extension.name().eq_ignore_ascii_case(name))
            .map(|entry| Arc::clone(&entry.extension))
    }

    pub fn contains(&self, identifier: &str) -> bool {
        self.state
            .read()
            .extensions
            .contains_key(&identifier.to_lowercase())
    }

    pub fn count(&self) -> usize {
        self.state.read().extensions.len()
    }

    // ------------------------------------------------------------------
    // Admission
    // ------------------------------------------------------------------

    /// Submits an extension regardless of where the host is in its startup
    /// sequence: queued before the first drain, registered directly after.
    pub async fn submit(&self, extension: Arc<dyn Extension>) -> Result<Admission> {
        if !extension.can_register() {
            return Ok(Admission::Rejected);
        }

        let _guard = self.ops.lock().await;
        if self.state.read().load_state.is_loaded() {
            self.register_locked(extension).await?;
            return Ok(Admission::Registered);
        }

        tracing::info!(
            "queueing extension {} until the first load pass completes",
            extension.identifier()
        );
        self.state.write().queue.push(extension);
        Ok(Admission::Queued)
    }

    // ------------------------------------------------------------------
    // Registration protocol
    // ------------------------------------------------------------------

    /// Runs the full registration protocol for one extension.
    pub async fn register(&self, extension: Arc<dyn Extension>) -> Result<()> {
        let _guard = self.ops.lock().await;
        self.register_locked(extension).await
    }

    async fn register_locked(&self, extension: Arc<dyn Extension>) -> Result<()> {
        let identifier = extension.identifier().to_lowercase();

        if let Some(configurable) = extension.as_configurable() {
            self.sync_config_defaults(&identifier, configurable)?;
        }

        if let Some(gated) = extension.as_version_gated() {
            if !gated.is_compatible_with(self.host.version()) {
                tracing::warn!(
                    "extension {} is incompatible with host version {}",
                    identifier,
                    self.host.version()
                );
                return Err(RegistryError::IncompatibleHostVersion {
                    identifier,
                    host: self.host.version().as_str().to_string(),
                });
            }
        }

        if let Some(existing) = self.get(&identifier) {
            if !existing.on_unregister().await {
                tracing::warn!(
                    "extension {} could not be registered: the live instance refused to unload",
                    identifier
                );
                return Err(RegistryError::IdentifierConflict { identifier });
            }
            self.unregister_locked(&existing).await;
        }

        let flow = self
            .host
            .events()
            .emit(HostEvent::RegisterAttempt {
                identifier: identifier.clone(),
            })
            .await;
        if flow == EventFlow::Cancel {
            return Err(RegistryError::RegistrationCancelled { identifier });
        }

        self.state.write().extensions.insert(
            identifier.clone(),
            Entry {
                extension: Arc::clone(&extension),
                registered_at: Utc::now(),
            },
        );

        if let Some(listener) = Arc::clone(&extension).listener() {
            tracing::info!("extension {} registered as a host event listener", identifier);
            self.host.events().add_listener(&identifier, listener).await;
        }

        if let Some(taskable) = extension.as_taskable() {
            taskable.start().await;
        }

        if let Some(catalog) = self.host.catalog() {
            if let Some(latest) = catalog.latest_version(&identifier) {
                catalog.set_local_copy(&identifier, true);
                catalog.set_update_available(&identifier, latest != extension.version());
            }
        }

        tracing::info!(
            "registered extension {} [{}]",
            identifier,
            extension.version()
        );
        Ok(())
    }

    /// Syncs `Configurable` defaults under `extensions.<identifier>.`:
    /// absent key with a default value is written, present key with a
    /// `None` default is removed. Persist + reload only when something
    /// changed.
    fn sync_config_defaults(
        &self,
        identifier: &str,
        configurable: &dyn Configurable,
    ) -> Result<()> {
        let config = self.host.config();
        let prefix = format!("extensions.{identifier}.");
        let mut dirty = false;

        for (key, default) in configurable.config_defaults() {
            if key.is_empty() {
                continue;
            }
            let full = format!("{prefix}{key}");
            match default {
                Some(value) => {
                    if !config.contains(&full) {
                        config.set(&full, value);
                        dirty = true;
                    }
                }
                None => {
                    if config.remove(&full) {
                        dirty = true;
                    }
                }
            }
        }

        if dirty {
            config.save()?;
            config.reload()?;
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // Unregistration
    // ------------------------------------------------------------------

    /// Removes the extension from the registry. Returns `false` if its
    /// identifier was not registered (idempotent no-op, not an error).
    pub async fn unregister(&self, extension: &Arc<dyn Extension>) -> bool {
        let _guard = self.ops.lock().await;
        self.unregister_locked(extension).await
    }

    async fn unregister_locked(&self, extension: &Arc<dyn Extension>) -> bool {
        let identifier = extension.identifier().to_lowercase();
        if self
            .state
            .write()
            .extensions
            .remove(&identifier)
            .is_none()
        {
            return false;
        }

        self.host
            .events()
            .emit(HostEvent::Unregistered {
                identifier: identifier.clone(),
            })
            .await;
        self.host.events().remove_listeners(&identifier).await;

        if let Some(taskable) = extension.as_taskable() {
            taskable.stop().await;
        }
        if let Some(cacheable) = extension.as_cacheable() {
            cacheable.clear_cache().await;
        }

        if let Some(catalog) = self.host.catalog() {
            catalog.set_local_copy(&identifier, false);
            catalog.set_update_available(&identifier, false);
        }

        tracing::info!("unregistered extension {}", identifier);
        true
    }

    /// The extension's own unregister contract: asks it to release first,
    /// then tears it down. Returns `false` if it refused or was not
    /// registered.
    pub async fn request_unregister(&self, extension: &Arc<dyn Extension>) -> bool {
        let _guard = self.ops.lock().await;
        self.request_unregister_locked(extension).await
    }

    async fn request_unregister_locked(&self, extension: &Arc<dyn Extension>) -> bool {
        if !extension.on_unregister().await {
            return false;
        }
        self.unregister_locked(extension).await
    }

    /// Tears down every extension except those reporting `persist()`. Does
    /// not reset the load state; only a new discovery pass does that.
    pub async fn unregister_all(&self) {
        let _guard = self.ops.lock().await;
        for extension in self.extensions() {
            if extension.persist() {
                continue;
            }
            self.request_unregister_locked(&extension).await;
        }
    }

    /// Host teardown entry point.
    pub async fn shutdown(&self) {
        self.unregister_all().await;
    }

    // ------------------------------------------------------------------
    // Discovery pipeline
    // ------------------------------------------------------------------

    /// One full scan-load-validate-register cycle over the extension
    /// directory. The scan and library loading run on the blocking pool;
    /// the drain runs back here under the operation mutex. A second call
    /// while a pass is running fails with
    /// [`RegistryError::DiscoveryInProgress`].
    pub async fn collect_and_load(&self) -> Result<LoadSummary> {
        {
            let mut state = self.state.write();
            if state.load_state == LoadState::Discovering {
                return Err(RegistryError::DiscoveryInProgress);
            }
            state.load_state = LoadState::Discovering;
        }

        tracing::info!(
            "extension registration pass starting in {}",
            self.directory.display()
        );

        let files = self.candidate_files();
        let loader = Arc::clone(&self.loader);
        let discovered = match tokio::task::spawn_blocking(move || {
            files
                .iter()
                .filter_map(|path| load_candidate_file(loader.as_ref(), path))
                .collect::<Vec<_>>()
        })
        .await
        {
            Ok(discovered) => discovered,
            Err(err) => {
                tracing::error!("extension collection task failed: {}", err);
                Vec::new()
            }
        };

        // Hand-back: everything below runs on the registry's serialized
        // context.
        let _guard = self.ops.lock().await;
        let pending = {
            let mut state = self.state.write();
            state.load_state = LoadState::Loaded;
            std::mem::take(&mut state.queue)
        };

        let mut registered = Vec::new();
        for extension in pending.into_iter().chain(discovered) {
            let identifier = extension.identifier().to_lowercase();
            match self.register_locked(extension).await {
                Ok(()) => registered.push(identifier),
                Err(err) => tracing::warn!("skipping extension {}: {}", identifier, err),
            }
        }

        let updates_available = self
            .host
            .catalog()
            .map(|catalog| {
                registered
                    .iter()
                    .filter(|identifier| catalog.update_available(identifier))
                    .count()
            })
            .unwrap_or(0);

        tracing::info!(
            "{} extension(s) registered, {} update(s) available",
            registered.len(),
            updates_available
        );

        let summary = LoadSummary {
            registered: registered.len(),
            updates_available,
        };
        self.host
            .events()
            .emit(HostEvent::ExtensionsLoaded {
                identifiers: registered,
            })
            .await;

        Ok(summary)
    }

    /// Loads and validates a single file off-thread, without registering.
    /// Failures are logged and swallowed, matching the batch behavior.
    pub async fn load_file(&self, path: &Path) -> Option<Arc<dyn Extension>> {
        let loader = Arc::clone(&self.loader);
        let path = path.to_path_buf();
        tokio::task::spawn_blocking(move || load_candidate_file(loader.as_ref(), &path))
            .await
            .ok()
            .flatten()
    }

    fn candidate_files(&self) -> Vec<PathBuf> {
        let entries = match std::fs::read_dir(&self.directory) {
            Ok(entries) => entries,
            Err(err) => {
                tracing::warn!(
                    "failed to list extensions folder {}: {}",
                    self.directory.display(),
                    err
                );
                return Vec::new();
            }
        };

        let mut files: Vec<PathBuf> = entries
            .flatten()
            .map(|entry| entry.path())
            .filter(|path| is_extension_library(path))
            .collect();
        // Directory order is platform-dependent; sort for a stable pass.
        files.sort();
        files
    }

    // ------------------------------------------------------------------
    // Host event hooks
    // ------------------------------------------------------------------

    /// A host session ended: every live `Cleanable` cleans up after the
    /// actor.
    pub async fn on_session_end(&self, actor: &str) {
        let _guard = self.ops.lock().await;
        for extension in self.extensions() {
            if let Some(cleanable) = extension.as_cleanable() {
                cleanable.cleanup(actor).await;
            }
        }
    }

    /// A host plugin was disabled: force-unregister every live extension
    /// that requires it (case-insensitive match).
    pub async fn on_dependent_plugin_disabled(&self, plugin: &str) {
        let _guard = self.ops.lock().await;
        for extension in self.extensions() {
            let requires = extension
                .required_host_plugin()
                .is_some_and(|required| required.eq_ignore_ascii_case(plugin));
            if !requires {
                continue;
            }
            if self.request_unregister_locked(&extension).await {
                tracing::info!(
                    "unregistered extension {}: required host plugin {} was disabled",
                    extension.identifier(),
                    plugin
                );
            }
        }
    }

    /// Routes host-originated bus events into the hooks above. The bridge
    /// runs until the bus is dropped.
    pub fn spawn_event_bridge(self: Arc<Self>) -> tokio::task::JoinHandle<()> {
        let manager = self;
        let mut rx = manager.host.events().subscribe();
        tokio::spawn(async move {
            while let Some(event) = rx.recv().await {
                match event {
                    HostEvent::SessionEnded { actor } => manager.on_session_end(&actor).await,
                    HostEvent::PluginDisabled { plugin } => {
                        manager.on_dependent_plugin_disabled(&plugin).await
                    }
                    _ => {}
                }
            }
        })
    }
}

fn load_candidate_file(loader: &dyn ModuleLoader, path: &Path) -> Option<Arc<dyn Extension>> {
    let candidate = match loader.load_candidate(path) {
        Ok(candidate) => candidate,
        Err(err) => {
            tracing::error!("failed to load extension {}: {}", path.display(), err);
            return None;
        }
    };

    match contract::validate_and_instantiate(candidate.as_ref()) {
        Ok(extension) => Some(extension),
        Err(err) => {
            tracing::error!("failed to load extension: {}", err);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ConfigStore, MemoryConfigStore};
    use portico_extension_sdk::{ConfigDefaults, HostVersion};
    use serde_json::Value;
    use std::collections::BTreeMap;

    struct BareExt {
        identifier: &'static str,
        persist: bool,
        refuse_unregister: bool,
        defaults: Option<ConfigDefaults>,
    }

    impl BareExt {
        fn new(identifier: &'static str) -> Self {
            Self {
                identifier,
                persist: false,
                refuse_unregister: false,
                defaults: None,
            }
        }
    }

    #[async_trait::async_trait]
    impl Extension for BareExt {
        fn identifier(&self) -> &str {
            self.identifier
        }

        fn name(&self) -> &str {
            self.identifier
        }

        fn version(&self) -> &str {
            "1.0.0"
        }

        fn persist(&self) -> bool {
            self.persist
        }

        async fn on_unregister(&self) -> bool {
            !self.refuse_unregister
        }

        fn as_configurable(&self) -> Option<&dyn Configurable> {
            self.defaults.as_ref().map(|_| self as &dyn Configurable)
        }
    }

    impl Configurable for BareExt {
        fn config_defaults(&self) -> ConfigDefaults {
            self.defaults.clone().unwrap_or_default()
        }
    }

    fn manager_with(config: Arc<MemoryConfigStore>) -> (ExtensionManager, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let host = Host::new(HostVersion::new("1.0"), config);
        (ExtensionManager::new(host, dir.path()), dir)
    }

    #[tokio::test]
    async fn the_manager_creates_its_directory() {
        let config = Arc::new(MemoryConfigStore::new());
        let (manager, dir) = manager_with(config);
        assert_eq!(manager.directory(), dir.path().join(EXTENSIONS_FOLDER));
        assert!(manager.directory().is_dir());
    }

    #[tokio::test]
    async fn registration_is_visible_through_every_read() {
        let (manager, _dir) = manager_with(Arc::new(MemoryConfigStore::new()));
        let ext: Arc<dyn Extension> = Arc::new(BareExt::new("Weather"));

        manager.register(ext).await.unwrap();

        assert_eq!(manager.identifiers(), vec!["weather".to_string()]);
        assert!(manager.contains("WEATHER"));
        assert_eq!(manager.count(), 1);
        assert!(manager.get("Weather").is_some());
        assert!(manager.find_by_name("weather").is_some());
        assert_eq!(manager.infos()[0].version, "1.0.0");
    }

    #[tokio::test]
    async fn a_refusing_instance_blocks_its_replacement() {
        let (manager, _dir) = manager_with(Arc::new(MemoryConfigStore::new()));

        let mut first = BareExt::new("weather");
        first.refuse_unregister = true;
        let first: Arc<dyn Extension> = Arc::new(first);
        manager.register(Arc::clone(&first)).await.unwrap();

        let second: Arc<dyn Extension> = Arc::new(BareExt::new("weather"));
        let err = manager.register(second).await.unwrap_err();
        assert!(matches!(err, RegistryError::IdentifierConflict { .. }));

        // The original instance is still the registered one.
        assert!(Arc::ptr_eq(&manager.get("weather").unwrap(), &first));
    }

    #[tokio::test]
    async fn unregister_all_spares_persistent_extensions() {
        let (manager, _dir) = manager_with(Arc::new(MemoryConfigStore::new()));

        let mut keeper = BareExt::new("keeper");
        keeper.persist = true;
        manager
            .register(Arc::new(keeper) as Arc<dyn Extension>)
            .await
            .unwrap();
        manager
            .register(Arc::new(BareExt::new("goner")) as Arc<dyn Extension>)
            .await
            .unwrap();

        manager.unregister_all().await;

        assert!(manager.contains("keeper"));
        assert!(!manager.contains("goner"));
    }

    #[tokio::test]
    async fn config_defaults_sync_once() {
        let config = Arc::new(MemoryConfigStore::new());
        config.set("extensions.weather.legacy", Value::from("old"));
        let (manager, _dir) = manager_with(Arc::clone(&config));

        let mut defaults = BTreeMap::new();
        defaults.insert("interval".to_string(), Some(Value::from(60)));
        defaults.insert("legacy".to_string(), None);
        defaults.insert(String::new(), Some(Value::from("skipped")));

        let mut ext = BareExt::new("weather");
        ext.defaults = Some(defaults);
        let ext: Arc<dyn Extension> = Arc::new(ext);

        manager.register(Arc::clone(&ext)).await.unwrap();
        assert_eq!(
            config.get("extensions.weather.interval"),
            Some(Value::from(60))
        );
        assert!(!config.contains("extensions.weather.legacy"));
        assert_eq!(config.save_count(), 1);

        // Re-registering with an already-synced config writes nothing.
        manager.register(ext).await.unwrap();
        assert_eq!(config.save_count(), 1);
    }

    #[tokio::test]
    async fn unregister_is_an_idempotent_no_op_signal() {
        let (manager, _dir) = manager_with(Arc::new(MemoryConfigStore::new()));
        let ext: Arc<dyn Extension> = Arc::new(BareExt::new("weather"));

        assert!(!manager.unregister(&ext).await);
        manager.register(Arc::clone(&ext)).await.unwrap();
        assert!(manager.unregister(&ext).await);
        assert!(!manager.unregister(&ext).await);
    }
}
