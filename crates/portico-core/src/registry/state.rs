//! Load-cycle state and the pending queue.
//!
//! The state machine is owned by the manager instance; there is no ambient
//! "loaded" flag. The pending queue only fills before the first drain and is
//! consumed exactly once, in submission order.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use portico_extension_sdk::Extension;

/// Where the registry is in its load cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LoadState {
    /// No discovery pass has started; submissions are queued.
    #[default]
    Uninitialized,
    /// A discovery pass is scanning and loading off-thread; submissions are
    /// still queued and will be drained by that pass.
    Discovering,
    /// The drain completed; submissions register directly.
    Loaded,
}

impl LoadState {
    pub fn is_loaded(&self) -> bool {
        matches!(self, Self::Loaded)
    }
}

impl std::fmt::Display for LoadState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Uninitialized => write!(f, "uninitialized"),
            Self::Discovering => write!(f, "discovering"),
            Self::Loaded => write!(f, "loaded"),
        }
    }
}

/// A live registry entry.
pub(crate) struct Entry {
    pub extension: Arc<dyn Extension>,
    pub registered_at: DateTime<Utc>,
}

/// Registry map, pending queue, and load state, guarded together so
/// snapshots never observe a torn view.
pub(crate) struct RegistryState {
    pub extensions: HashMap<String, Entry>,
    pub queue: Vec<Arc<dyn Extension>>,
    pub load_state: LoadState,
}

impl RegistryState {
    pub fn new() -> Self {
        Self {
            extensions: HashMap::new(),
            queue: Vec::new(),
            load_state: LoadState::default(),
        }
    }
}
