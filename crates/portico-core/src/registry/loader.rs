//! Module loader boundary and the native `libloading` implementation.
//!
//! The registry core only sees the [`ModuleLoader`] trait, so tests drive it
//! with in-memory fakes. [`NativeModuleLoader`] is the production
//! implementation: it opens dynamic libraries and keeps them resident for
//! the process lifetime so extension vtables never dangle.

use std::collections::BTreeSet;
use std::path::Path;
use std::sync::Arc;

use libloading::Library;
use parking_lot::Mutex;
use portico_extension_sdk::{
    AbiVersionFn, CreateFn, Extension, EXTENSION_ABI_VERSION, SYM_ABI_VERSION, SYM_CREATE,
};

use super::contract::{contract_descriptor, Candidate, InstantiateError, SymbolSignature};
use crate::error::RegistryError;

/// Loads one file into a validatable candidate.
pub trait ModuleLoader: Send + Sync {
    fn load_candidate(&self, path: &Path) -> Result<Box<dyn Candidate>, RegistryError>;
}

/// Whether the path looks like an extension library for this platform
/// family.
pub fn is_extension_library(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| matches!(ext, "so" | "dylib" | "dll"))
        .unwrap_or(false)
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .and_then(|name| name.to_str())
        .unwrap_or("<unnamed>")
        .to_string()
}

/// Production loader over `libloading`.
#[derive(Default)]
pub struct NativeModuleLoader {
    // Libraries stay resident; dropping one while an extension from it is
    // live would invalidate the extension's vtable.
    libraries: Mutex<Vec<Arc<Library>>>,
}

impl NativeModuleLoader {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ModuleLoader for NativeModuleLoader {
    fn load_candidate(&self, path: &Path) -> Result<Box<dyn Candidate>, RegistryError> {
        let source = file_name(path);

        // SAFETY: loading a library runs its initializers; that is the
        // deal with dynamic extension loading and is gated by the host
        // choosing the extensions directory.
        let library = unsafe { Library::new(path) }.map_err(|err| {
            RegistryError::InstantiationFailure {
                file: source.clone(),
                reason: format!("failed to open library (is a dependency missing?): {err}"),
            }
        })?;
        let library = Arc::new(library);

        let declared = probe_contract_symbols(&library);
        self.libraries.lock().push(Arc::clone(&library));

        Ok(Box::new(NativeCandidate {
            source,
            library,
            declared,
        }))
    }
}

/// Presence-probes every contract symbol. Typed lookups happen later at
/// instantiation; here only declaration matters.
fn probe_contract_symbols(library: &Library) -> BTreeSet<SymbolSignature> {
    contract_descriptor()
        .iter()
        .filter(|sym| {
            // SAFETY: the symbol is only checked for existence, never called.
            unsafe { library.get::<*const ()>(sym.name.as_bytes()).is_ok() }
        })
        .copied()
        .collect()
}

struct NativeCandidate {
    source: String,
    library: Arc<Library>,
    declared: BTreeSet<SymbolSignature>,
}

impl Candidate for NativeCandidate {
    fn source(&self) -> &str {
        &self.source
    }

    fn declared_symbols(&self) -> &BTreeSet<SymbolSignature> {
        &self.declared
    }

    fn instantiate(&self) -> Result<Arc<dyn Extension>, InstantiateError> {
        // SAFETY: validation established that the symbols exist; the types
        // are the SDK's published ABI signatures.
        let abi_version = unsafe {
            self.library
                .get::<AbiVersionFn>(SYM_ABI_VERSION.as_bytes())
                .map_err(|err| InstantiateError::Other(err.to_string()))?
        };
        let got = unsafe { abi_version() };
        if got != EXTENSION_ABI_VERSION {
            return Err(InstantiateError::AbiMismatch {
                expected: EXTENSION_ABI_VERSION,
                got,
            });
        }

        let create = unsafe {
            self.library
                .get::<CreateFn>(SYM_CREATE.as_bytes())
                .map_err(|err| InstantiateError::Other(err.to_string()))?
        };

        let raw = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| unsafe { create() }))
            .map_err(|_| InstantiateError::Panicked)?;
        if raw.is_null() {
            return Err(InstantiateError::NullInstance);
        }

        // SAFETY: the create symbol transfers ownership of the handle; the
        // library itself stays resident in the loader.
        let handle = unsafe { Box::from_raw(raw) };
        Ok(handle.0)
    }
}
