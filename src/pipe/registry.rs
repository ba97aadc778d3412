//! Pipe registry: live pipes owned by this node
//!
//! Populated by the pipe-creation side, consumed by the relay's local read
//! path. The lock only ever guards the map itself; nothing holds it while
//! bytes are moving.

use std::collections::HashMap;

use parking_lot::RwLock;

use super::Pipe;

/// Thread-safe registry of in-flight pipes keyed by pipe ID
pub struct PipeRegistry {
    pipes: RwLock<HashMap<String, Pipe>>,
}

impl PipeRegistry {
    /// Create a new empty registry
    pub fn new() -> Self {
        Self {
            pipes: RwLock::new(HashMap::new()),
        }
    }

    /// Register a pipe under `id`; the creator guarantees the ID is fresh
    pub fn insert(&self, id: impl Into<String>, pipe: Pipe) {
        self.pipes.write().insert(id.into(), pipe);
    }

    /// Get a handle to a pipe without removing it
    pub fn lookup(&self, id: &str) -> Option<Pipe> {
        self.pipes.read().get(id).cloned()
    }

    /// Remove a pipe; removing an unknown ID is a no-op
    pub fn remove(&self, id: &str) {
        self.pipes.write().remove(id);
    }

    /// Whether a pipe is registered under `id`
    pub fn contains(&self, id: &str) -> bool {
        self.pipes.read().contains_key(id)
    }

    /// Number of live pipes
    pub fn len(&self) -> usize {
        self.pipes.read().len()
    }

    /// Whether no pipes are registered
    pub fn is_empty(&self) -> bool {
        self.pipes.read().is_empty()
    }
}

impl Default for PipeRegistry {
    fn default() -> Self {
        Self::new()
    }
}

// ─────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────
