//! Session memory of narration keys that have already been spoken.

use parking_lot::Mutex;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::debug;

/// Set of dedup keys recorded during the current session.
///
/// Clones share the same set, so every caller handed the same memory (or
/// the same engine) suppresses every other caller using that key.
#[derive(Debug, Clone, Default)]
pub struct SessionMemory {
    keys: Arc<Mutex<HashSet<String>>>,
}

impl SessionMemory {
    /// Create an empty session memory
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether `key` was already recorded
    #[must_use]
    pub fn has(&self, key: &str) -> bool {
        self.keys.lock().contains(key)
    }

    /// Record `key`, returning `true` if it was not recorded before
    pub fn add(&self, key: &str) -> bool {
        self.keys.lock().insert(key.to_string())
    }

    /// Forget every recorded key
    pub fn clear(&self) {
        let mut keys = self.keys.lock();
        debug!(count = keys.len(), "Clearing session narration memory");
        keys.clear();
    }

    /// Number of recorded keys
    #[must_use]
    pub fn len(&self) -> usize {
        self.keys.lock().len()
    }

    /// Whether no key is recorded
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.keys.lock().is_empty()
    }
}
