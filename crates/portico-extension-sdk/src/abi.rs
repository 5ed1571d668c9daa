//! FFI surface shared between extension modules and the host registry.
//!
//! An extension dynamic library must export three symbols, generated by
//! [`declare_extension!`](crate::declare_extension):
//!
//! - `portico_extension_abi_version() -> u32`
//! - `portico_extension_create() -> *mut ExtensionHandle`
//! - `portico_extension_destroy(*mut ExtensionHandle)`
//!
//! The host validates that a candidate library declares all three before it
//! ever calls into the module.

use std::sync::Arc;

use crate::extension::Extension;

/// ABI version. Incremented on breaking changes to the extension contract;
/// the host refuses to instantiate modules built against another version.
pub const EXTENSION_ABI_VERSION: u32 = 1;

/// Export symbol reporting the module's ABI version.
pub const SYM_ABI_VERSION: &str = "portico_extension_abi_version";

/// Export symbol running the module's zero-argument constructor.
pub const SYM_CREATE: &str = "portico_extension_create";

/// Export symbol releasing a handle produced by the create symbol.
pub const SYM_DESTROY: &str = "portico_extension_destroy";

/// Boxed handle passed across the FFI boundary.
///
/// The create symbol returns one of these (or null on constructor failure);
/// ownership transfers to the caller, which releases it either through the
/// destroy symbol or by taking the inner [`Extension`] out.
pub struct ExtensionHandle(pub Arc<dyn Extension>);

/// Signature of [`SYM_ABI_VERSION`].
pub type AbiVersionFn = unsafe extern "C" fn() -> u32;

/// Signature of [`SYM_CREATE`].
pub type CreateFn = unsafe extern "C" fn() -> *mut ExtensionHandle;

/// Signature of [`SYM_DESTROY`].
pub type DestroyFn = unsafe extern "C" fn(*mut ExtensionHandle);
