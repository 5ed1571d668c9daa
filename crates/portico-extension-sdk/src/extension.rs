//! The extension contract and optional capability traits.
//!
//! [`Extension`] is the base contract every module implements. Optional
//! behaviors are exposed through capability queries (`as_configurable`,
//! `as_taskable`, ...) that default to `None`, so the registry dispatches
//! through interfaces instead of inspecting concrete types.

use std::collections::BTreeMap;
use std::sync::Arc;

use crate::event::HostEventListener;

/// Host version reported to version-gated extensions.
///
/// Versions are opaque strings compared for equality only.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostVersion(String);

impl HostVersion {
    pub fn new(version: impl Into<String>) -> Self {
        Self(version.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for HostVersion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Default configuration entries contributed by a [`Configurable`] extension.
///
/// A `Some` value is written when the key is absent from the host config; a
/// `None` value removes the key if it is present.
pub type ConfigDefaults = BTreeMap<String, Option<serde_json::Value>>;

/// Base contract for an extension module.
///
/// Required operations identify the module and report its lifecycle
/// preferences; everything else is an optional capability.
#[async_trait::async_trait]
pub trait Extension: Send + Sync {
    /// Unique registration key. Compared case-insensitively; the registry
    /// stores it lowercased.
    fn identifier(&self) -> &str;

    /// Human-readable display name.
    fn name(&self) -> &str;

    /// Version string. Compared for equality only, never ordered.
    fn version(&self) -> &str;

    /// Name of a host plugin this extension depends on, if any. When that
    /// plugin is disabled the registry force-unregisters the extension.
    fn required_host_plugin(&self) -> Option<&str> {
        None
    }

    /// Whether the extension is ready to be registered. Checked at queue
    /// admission; a `false` here keeps the module out of the pending queue.
    fn can_register(&self) -> bool {
        true
    }

    /// Whether the extension survives a full registry teardown.
    fn persist(&self) -> bool {
        false
    }

    /// Asks the extension to release its registration. Returning `false`
    /// refuses: the extension stays live and any newcomer with the same
    /// identifier is rejected.
    async fn on_unregister(&self) -> bool {
        true
    }

    /// Config-defaults capability.
    fn as_configurable(&self) -> Option<&dyn Configurable> {
        None
    }

    /// Host-version gating capability.
    fn as_version_gated(&self) -> Option<&dyn VersionGated> {
        None
    }

    /// Periodic-work capability (start/stop hooks).
    fn as_taskable(&self) -> Option<&dyn Taskable> {
        None
    }

    /// Cache-invalidation capability.
    fn as_cacheable(&self) -> Option<&dyn Cacheable> {
        None
    }

    /// Per-session cleanup capability.
    fn as_cleanable(&self) -> Option<&dyn Cleanable> {
        None
    }

    /// Host event listener half of this extension, if it has one. The
    /// registry subscribes it on registration and removes every
    /// subscription on unregistration.
    fn listener(self: Arc<Self>) -> Option<Arc<dyn HostEventListener>> {
        None
    }
}

/// Supplies default config key/value pairs, synced into the host config
/// under `extensions.<identifier>.<key>` on registration.
pub trait Configurable: Send + Sync {
    fn config_defaults(&self) -> ConfigDefaults;
}

/// Reports compatibility with a host version. Incompatible extensions are
/// rejected before any state is touched.
pub trait VersionGated: Send + Sync {
    fn is_compatible_with(&self, host: &HostVersion) -> bool;
}

/// Start/stop hooks for extensions that run periodic work.
#[async_trait::async_trait]
pub trait Taskable: Send + Sync {
    async fn start(&self);
    async fn stop(&self);
}

/// Clear hook for extensions that hold caches, invoked on unregistration.
#[async_trait::async_trait]
pub trait Cacheable: Send + Sync {
    async fn clear_cache(&self);
}

/// Per-session cleanup hook, invoked with the identity of the actor whose
/// session ended.
#[async_trait::async_trait]
pub trait Cleanable: Send + Sync {
    async fn cleanup(&self, actor: &str);
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};

    #[derive(Default)]
    struct Plain;

    impl Extension for Plain {
        fn identifier(&self) -> &str {
            "plain"
        }

        fn name(&self) -> &str {
            "Plain"
        }

        fn version(&self) -> &str {
            "1.0.0"
        }
    }

    #[derive(Default)]
    struct Gated {
        started: AtomicBool,
    }

    impl Extension for Gated {
        fn identifier(&self) -> &str {
            "gated"
        }

        fn name(&self) -> &str {
            "Gated"
        }

        fn version(&self) -> &str {
            "2.0.0"
        }

        fn as_version_gated(&self) -> Option<&dyn VersionGated> {
            Some(self)
        }

        fn as_taskable(&self) -> Option<&dyn Taskable> {
            Some(self)
        }
    }

    impl VersionGated for Gated {
        fn is_compatible_with(&self, host: &HostVersion) -> bool {
            host.as_str() == "5.0"
        }
    }

    #[async_trait::async_trait]
    impl Taskable for Gated {
        async fn start(&self) {
            self.started.store(true, Ordering::SeqCst);
        }

        async fn stop(&self) {
            self.started.store(false, Ordering::SeqCst);
        }
    }

    #[test]
    fn capabilities_default_to_none() {
        let ext = Plain;
        assert!(ext.as_configurable().is_none());
        assert!(ext.as_version_gated().is_none());
        assert!(ext.as_taskable().is_none());
        assert!(ext.as_cacheable().is_none());
        assert!(ext.as_cleanable().is_none());
        assert!(Arc::new(Plain).listener().is_none());
        assert!(ext.can_register());
        assert!(!ext.persist());
    }

    #[tokio::test]
    async fn unregister_defaults_to_consent() {
        assert!(Plain.on_unregister().await);
    }

    #[tokio::test]
    async fn capability_queries_dispatch_to_the_implementation() {
        let ext: Arc<dyn Extension> = Arc::new(Gated::default());

        let gated = ext.as_version_gated().expect("version gated");
        assert!(gated.is_compatible_with(&HostVersion::new("5.0")));
        assert!(!gated.is_compatible_with(&HostVersion::new("4.9")));

        let taskable = ext.as_taskable().expect("taskable");
        taskable.start().await;
        taskable.stop().await;
    }

    #[test]
    fn host_version_compares_by_equality() {
        assert_eq!(HostVersion::new("1.0"), HostVersion::new("1.0"));
        assert_ne!(HostVersion::new("1.0"), HostVersion::new("1.0.0"));
        assert_eq!(HostVersion::new("1.0").to_string(), "1.0");
    }
}
