//! Host lifecycle events and the listener contract.
//!
//! The registry emits [`HostEvent`]s on the host event bus; extensions (and
//! host-side components) can observe them through a broadcast subscription
//! or participate in dispatch as a [`HostEventListener`]. Only the
//! register-attempt event is cancellable.

use serde::{Deserialize, Serialize};

/// Events flowing over the host event bus.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum HostEvent {
    /// An extension is about to be registered. Cancellable: a listener
    /// returning [`EventFlow::Cancel`] vetoes the registration.
    RegisterAttempt { identifier: String },

    /// An extension was removed from the registry.
    Unregistered { identifier: String },

    /// A discovery pass finished; carries the identifiers that registered
    /// successfully, in registration order.
    ExtensionsLoaded { identifiers: Vec<String> },

    /// A host session ended for the named actor.
    SessionEnded { actor: String },

    /// A host plugin was disabled.
    PluginDisabled { plugin: String },
}

impl HostEvent {
    /// Whether listeners may veto this event.
    pub fn is_cancellable(&self) -> bool {
        matches!(self, Self::RegisterAttempt { .. })
    }

    /// Short name for logs and filtering.
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::RegisterAttempt { .. } => "RegisterAttempt",
            Self::Unregistered { .. } => "Unregistered",
            Self::ExtensionsLoaded { .. } => "ExtensionsLoaded",
            Self::SessionEnded { .. } => "SessionEnded",
            Self::PluginDisabled { .. } => "PluginDisabled",
        }
    }
}

/// Listener verdict. `Cancel` only has an effect on cancellable events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EventFlow {
    #[default]
    Continue,
    Cancel,
}

/// A participant in host event dispatch.
///
/// Listeners run in registration order before the event reaches broadcast
/// subscribers. They must not re-enter mutating registry operations; use a
/// broadcast subscription for reactive work.
#[async_trait::async_trait]
pub trait HostEventListener: Send + Sync {
    async fn on_host_event(&self, event: &HostEvent) -> EventFlow;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_register_attempt_is_cancellable() {
        let attempt = HostEvent::RegisterAttempt {
            identifier: "foo".into(),
        };
        let removed = HostEvent::Unregistered {
            identifier: "foo".into(),
        };
        assert!(attempt.is_cancellable());
        assert!(!removed.is_cancellable());
    }

    #[test]
    fn type_names_are_stable() {
        let loaded = HostEvent::ExtensionsLoaded {
            identifiers: vec!["a".into()],
        };
        assert_eq!(loaded.type_name(), "ExtensionsLoaded");

        let ended = HostEvent::SessionEnded {
            actor: "steve".into(),
        };
        assert_eq!(ended.type_name(), "SessionEnded");
    }

    #[test]
    fn events_round_trip_through_json() {
        let event = HostEvent::PluginDisabled {
            plugin: "Economy".into(),
        };
        let raw = serde_json::to_string(&event).unwrap();
        let back: HostEvent = serde_json::from_str(&raw).unwrap();
        assert_eq!(back.type_name(), "PluginDisabled");
    }
}
