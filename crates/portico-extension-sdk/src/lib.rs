//! Portico Extension SDK
//!
//! This SDK is the contract surface extension modules compile against. An
//! extension implements the [`Extension`] trait, opts into any subset of the
//! optional capability traits, and exports itself with [`declare_extension!`]
//! so the host registry can discover it inside a dynamic library.
//!
//! # Quick Start
//!
//! ```rust
//! use portico_extension_sdk::prelude::*;
//!
//! #[derive(Default)]
//! struct WeatherExtension;
//!
//! impl Extension for WeatherExtension {
//!     fn identifier(&self) -> &str {
//!         "weather"
//!     }
//!
//!     fn name(&self) -> &str {
//!         "Weather"
//!     }
//!
//!     fn version(&self) -> &str {
//!         "1.2.0"
//!     }
//! }
//!
//! declare_extension!(WeatherExtension::default());
//! ```

pub mod abi;
pub mod event;
pub mod extension;
#[macro_use]
pub mod macros;

pub use abi::{
    AbiVersionFn, CreateFn, DestroyFn, ExtensionHandle, EXTENSION_ABI_VERSION, SYM_ABI_VERSION,
    SYM_CREATE, SYM_DESTROY,
};
pub use event::{EventFlow, HostEvent, HostEventListener};
pub use extension::{
    Cacheable, Cleanable, ConfigDefaults, Configurable, Extension, HostVersion, Taskable,
    VersionGated,
};

/// Prelude module with the imports an extension module needs.
pub mod prelude {
    pub use crate::abi::{ExtensionHandle, EXTENSION_ABI_VERSION};
    pub use crate::declare_extension;
    pub use crate::event::{EventFlow, HostEvent, HostEventListener};
    pub use crate::extension::{
        Cacheable, Cleanable, ConfigDefaults, Configurable, Extension, HostVersion, Taskable,
        VersionGated,
    };
    pub use serde_json::Value;
}
