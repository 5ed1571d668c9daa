//! Registry error taxonomy.
//!
//! Every per-module failure is isolated: batch operations log these and keep
//! going, reporting counts and success lists instead of propagating.

use crate::config::ConfigError;

/// Errors produced by registration and discovery operations.
#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    /// The candidate does not declare every symbol the contract requires.
    #[error("{file}: missing required contract symbols")]
    ContractViolation { file: String },

    /// The candidate's constructor failed (panicked, returned no instance,
    /// or the library could not be loaded — often a missing dependency).
    #[error("{file}: failed to instantiate extension: {reason}")]
    InstantiationFailure { file: String, reason: String },

    /// A version-gated extension reported incompatibility with the host.
    #[error("extension {identifier} is incompatible with host version {host}")]
    IncompatibleHostVersion { identifier: String, host: String },

    /// A live extension owns the identifier and refused to unregister.
    #[error("extension {identifier} is already registered and would not yield")]
    IdentifierConflict { identifier: String },

    /// A host event listener vetoed the registration.
    #[error("registration of {identifier} was cancelled by a host listener")]
    RegistrationCancelled { identifier: String },

    /// A discovery pass is already running; the queue drain is not
    /// re-entrant.
    #[error("a discovery pass is already in progress")]
    DiscoveryInProgress,

    /// The host config store failed while syncing defaults.
    #[error(transparent)]
    Config(#[from] ConfigError),
}

pub type Result<T> = std::result::Result<T, RegistryError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn errors_carry_the_originating_source() {
        let err = RegistryError::ContractViolation {
            file: "broken.so".into(),
        };
        assert!(err.to_string().contains("broken.so"));

        let err = RegistryError::InstantiationFailure {
            file: "weather.so".into(),
            reason: "constructor panicked".into(),
        };
        assert!(err.to_string().contains("weather.so"));
        assert!(err.to_string().contains("constructor panicked"));
    }
}
