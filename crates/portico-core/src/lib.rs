//! Portico core — extension registry and lifecycle management.
//!
//! Portico discovers externally-authored extension modules (dynamic
//! libraries dropped into a directory), validates each against the SDK
//! contract, instantiates them, and manages their registration state under
//! a shared namespace of identifiers. One module's failure never aborts a
//! discovery pass or destabilizes the host.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────┐
//! │                  ExtensionManager                   │
//! │  - discovery pipeline (scan, load, validate)        │
//! │  - registration protocol and conflict resolution    │
//! │  - capability dispatch (start/stop/clear/cleanup)   │
//! └─────────────────────────────────────────────────────┘
//!        │                │                  │
//!        ▼                ▼                  ▼
//!  ┌───────────┐   ┌────────────┐   ┌───────────────┐
//!  │ ConfigStore│  │HostEventBus│   │ UpdateCatalog │
//!  └───────────┘   └────────────┘   └───────────────┘
//! ```
//!
//! # Usage
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use portico_core::{ExtensionManager, Host, MemoryConfigStore};
//! use portico_core::sdk::HostVersion;
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let host = Host::new(HostVersion::new("5.1"), Arc::new(MemoryConfigStore::new()));
//! let manager = Arc::new(ExtensionManager::new(host, "/var/lib/myhost"));
//!
//! let bridge = manager.clone().spawn_event_bridge();
//! let summary = manager.collect_and_load().await?;
//! println!("{} extension(s) registered", summary.registered);
//! # drop(bridge);
//! # Ok(())
//! # }
//! ```

pub mod catalog;
pub mod config;
pub mod error;
pub mod eventbus;
pub mod host;
pub mod registry;

pub use catalog::{CatalogEntry, MemoryCatalog, UpdateCatalog};
pub use config::{ConfigError, ConfigStore, JsonConfigStore, MemoryConfigStore};
pub use error::{RegistryError, Result};
pub use eventbus::{HostEventBus, HostEventReceiver};
pub use host::Host;
pub use registry::{
    contract_descriptor, is_extension_library, Admission, Candidate, ExtensionInfo,
    ExtensionManager, InstantiateError, LoadState, LoadSummary, ModuleLoader, NativeModuleLoader,
    SymbolSignature,
};

// The SDK is re-exported so hosts depend on a single crate.
pub use portico_extension_sdk as sdk;
