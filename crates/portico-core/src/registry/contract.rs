//! Contract descriptor and candidate validation.
//!
//! A candidate library is never called into before it passes validation: its
//! declared export symbols must be a superset of the contract descriptor.
//! Only then does the validator run the module's zero-argument constructor,
//! and any failure there is caught and reported, never propagated into the
//! discovery batch.

use std::collections::BTreeSet;
use std::sync::Arc;

use once_cell::sync::Lazy;
use portico_extension_sdk::{Extension, SYM_ABI_VERSION, SYM_CREATE, SYM_DESTROY};

use crate::error::RegistryError;

/// A required export symbol and its type signature.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SymbolSignature {
    pub name: &'static str,
    pub signature: &'static str,
}

impl SymbolSignature {
    pub const fn new(name: &'static str, signature: &'static str) -> Self {
        Self { name, signature }
    }
}

impl std::fmt::Display for SymbolSignature {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.name, self.signature)
    }
}

// Computed once; the SDK's ABI surface is fixed for the process lifetime.
static CONTRACT: Lazy<BTreeSet<SymbolSignature>> = Lazy::new(|| {
    [
        SymbolSignature::new(SYM_ABI_VERSION, "fn() -> u32"),
        SymbolSignature::new(SYM_CREATE, "fn() -> *mut ExtensionHandle"),
        SymbolSignature::new(SYM_DESTROY, "fn(*mut ExtensionHandle)"),
    ]
    .into_iter()
    .collect()
});

/// The symbols every candidate must declare.
pub fn contract_descriptor() -> &'static BTreeSet<SymbolSignature> {
    &CONTRACT
}

/// Failure inside a candidate's constructor path.
#[derive(Debug, thiserror::Error)]
pub enum InstantiateError {
    #[error("constructor panicked")]
    Panicked,

    #[error("constructor returned no instance")]
    NullInstance,

    #[error("extension ABI {got} does not match host ABI {expected}")]
    AbiMismatch { expected: u32, got: u32 },

    #[error("{0}")]
    Other(String),
}

/// A loaded-but-not-yet-instantiated module, as produced by a
/// [`ModuleLoader`](super::loader::ModuleLoader).
pub trait Candidate: Send {
    /// Short source name for diagnostics, usually the file name.
    fn source(&self) -> &str;

    /// Export symbols the candidate declares.
    fn declared_symbols(&self) -> &BTreeSet<SymbolSignature>;

    /// Runs the module's zero-argument constructor.
    fn instantiate(&self) -> Result<Arc<dyn Extension>, InstantiateError>;
}

/// Checks the candidate against the contract descriptor.
pub fn validate(candidate: &dyn Candidate) -> Result<(), RegistryError> {
    let declared = candidate.declared_symbols();
    if contract_descriptor().iter().all(|sym| declared.contains(sym)) {
        Ok(())
    } else {
        Err(RegistryError::ContractViolation {
            file: candidate.source().to_string(),
        })
    }
}

/// Validates, then instantiates. Constructor failures are folded into
/// [`RegistryError::InstantiationFailure`] with the cause's short
/// description.
pub fn validate_and_instantiate(
    candidate: &dyn Candidate,
) -> Result<Arc<dyn Extension>, RegistryError> {
    validate(candidate)?;
    candidate
        .instantiate()
        .map_err(|err| RegistryError::InstantiationFailure {
            file: candidate.source().to_string(),
            reason: err.to_string(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    struct StubCandidate {
        source: String,
        symbols: BTreeSet<SymbolSignature>,
        fail_constructor: bool,
    }

    impl StubCandidate {
        fn complete() -> Self {
            Self {
                source: "complete.so".into(),
                symbols: contract_descriptor().clone(),
                fail_constructor: false,
            }
        }

        fn missing_one() -> Self {
            let mut symbols = contract_descriptor().clone();
            let dropped = *symbols.iter().next().unwrap();
            symbols.remove(&dropped);
            Self {
                source: "partial.so".into(),
                symbols,
                fail_constructor: false,
            }
        }
    }

    struct StubExtension;

    impl Extension for StubExtension {
        fn identifier(&self) -> &str {
            "stub"
        }

        fn name(&self) -> &str {
            "Stub"
        }

        fn version(&self) -> &str {
            "1.0.0"
        }
    }

    impl Candidate for StubCandidate {
        fn source(&self) -> &str {
            &self.source
        }

        fn declared_symbols(&self) -> &BTreeSet<SymbolSignature> {
            &self.symbols
        }

        fn instantiate(&self) -> Result<Arc<dyn Extension>, InstantiateError> {
            if self.fail_constructor {
                Err(InstantiateError::Panicked)
            } else {
                Ok(Arc::new(StubExtension))
            }
        }
    }

    #[test]
    fn descriptor_lists_the_three_required_symbols() {
        let descriptor = contract_descriptor();
        assert_eq!(descriptor.len(), 3);
        assert!(descriptor.iter().any(|sym| sym.name == SYM_CREATE));
    }

    #[test]
    fn a_complete_candidate_validates_and_instantiates() {
        let candidate = StubCandidate::complete();
        assert!(validate(&candidate).is_ok());
        let ext = validate_and_instantiate(&candidate).unwrap();
        assert_eq!(ext.identifier(), "stub");
    }

    #[test]
    fn a_candidate_missing_a_symbol_is_never_instantiated() {
        let candidate = StubCandidate::missing_one();
        let err = match validate_and_instantiate(&candidate) {
            Ok(_) => panic!("expected error"),
            Err(e) => e,
        };
        assert!(matches!(err, RegistryError::ContractViolation { ref file } if file == "partial.so"));
    }

    #[test]
    fn extra_symbols_beyond_the_contract_are_fine() {
        let mut candidate = StubCandidate::complete();
        candidate
            .symbols
            .insert(SymbolSignature::new("extension_extra_hook", "fn()"));
        assert!(validate(&candidate).is_ok());
    }

    #[test]
    fn constructor_failures_become_instantiation_failures() {
        let mut candidate = StubCandidate::complete();
        candidate.fail_constructor = true;
        let err = match validate_and_instantiate(&candidate) {
            Ok(_) => panic!("expected error"),
            Err(e) => e,
        };
        assert!(
            matches!(err, RegistryError::InstantiationFailure { ref file, .. } if file == "complete.so")
        );
    }
}
