//! Extension registry.
//!
//! The registry brings third-party modules from files on disk to live,
//! identifier-addressed instances:
//!
//! ```text
//! directory scan ──▶ module loader ──▶ candidate validator
//!                                             │
//!                          pending queue ◀────┘ (before first drain)
//!                                │
//!                                ▼
//!                     registration protocol ──▶ registry map
//! ```
//!
//! The loader is pluggable ([`loader::ModuleLoader`]) so the core protocol
//! is exercised with in-memory fakes; production hosts use the
//! `libloading`-backed [`loader::NativeModuleLoader`].

pub mod contract;
pub mod loader;
pub mod manager;
pub mod state;

pub use contract::{contract_descriptor, Candidate, InstantiateError, SymbolSignature};
pub use loader::{is_extension_library, ModuleLoader, NativeModuleLoader};
pub use manager::{Admission, ExtensionInfo, ExtensionManager, LoadSummary, EXTENSIONS_FOLDER};
pub use state::LoadState;
