//! Export macro for extension modules.

/// Exports the FFI symbols the host registry requires from an extension
/// dynamic library.
///
/// The argument is the constructor expression for the module's extension
/// value. A panic in the constructor is contained and surfaces to the host
/// as a null handle, which the host reports as an instantiation failure.
///
/// # Example
///
/// ```rust
/// use portico_extension_sdk::prelude::*;
///
/// #[derive(Default)]
/// struct MyExtension;
///
/// impl Extension for MyExtension {
///     fn identifier(&self) -> &str {
///         "my-extension"
///     }
///
///     fn name(&self) -> &str {
///         "My Extension"
///     }
///
///     fn version(&self) -> &str {
///         "0.1.0"
///     }
/// }
///
/// declare_extension!(MyExtension::default());
/// ```
#[macro_export]
macro_rules! declare_extension {
    ($ctor:expr) => {
        #[no_mangle]
        pub extern "C" fn portico_extension_abi_version() -> u32 {
            $crate::EXTENSION_ABI_VERSION
        }

        #[no_mangle]
        pub extern "C" fn portico_extension_create() -> *mut $crate::ExtensionHandle {
            let built = ::std::panic::catch_unwind(::std::panic::AssertUnwindSafe(|| {
                let extension: ::std::sync::Arc<dyn $crate::Extension> =
                    ::std::sync::Arc::new($ctor);
                $crate::ExtensionHandle(extension)
            }));
            match built {
                Ok(handle) => ::std::boxed::Box::into_raw(::std::boxed::Box::new(handle)),
                Err(_) => ::std::ptr::null_mut(),
            }
        }

        /// # Safety
        ///
        /// `handle` must be null or a pointer returned by
        /// `portico_extension_create` that has not been released yet.
        #[no_mangle]
        pub unsafe extern "C" fn portico_extension_destroy(
            handle: *mut $crate::ExtensionHandle,
        ) {
            if !handle.is_null() {
                drop(unsafe { ::std::boxed::Box::from_raw(handle) });
            }
        }
    };
}
