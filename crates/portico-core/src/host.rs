//! Host collaborator bundle.

use std::sync::Arc;

use portico_extension_sdk::HostVersion;

use crate::catalog::UpdateCatalog;
use crate::config::ConfigStore;
use crate::eventbus::HostEventBus;

/// The host-side services the registry talks to: version, config store,
/// event bus, and (optionally) the remote update catalog.
#[derive(Clone)]
pub struct Host {
    version: HostVersion,
    config: Arc<dyn ConfigStore>,
    events: Arc<HostEventBus>,
    catalog: Option<Arc<dyn UpdateCatalog>>,
}

impl Host {
    pub fn new(version: HostVersion, config: Arc<dyn ConfigStore>) -> Self {
        Self {
            version,
            config,
            events: Arc::new(HostEventBus::new()),
            catalog: None,
        }
    }

    /// Uses a shared event bus instead of a private one.
    pub fn with_events(mut self, events: Arc<HostEventBus>) -> Self {
        self.events = events;
        self
    }

    /// Enables catalog bookkeeping. Hosts without a remote catalog simply
    /// skip this.
    pub fn with_catalog(mut self, catalog: Arc<dyn UpdateCatalog>) -> Self {
        self.catalog = Some(catalog);
        self
    }

    pub fn version(&self) -> &HostVersion {
        &self.version
    }

    pub fn config(&self) -> &dyn ConfigStore {
        self.config.as_ref()
    }

    pub fn events(&self) -> &HostEventBus {
        &self.events
    }

    pub fn catalog(&self) -> Option<&dyn UpdateCatalog> {
        self.catalog.as_deref()
    }
}
