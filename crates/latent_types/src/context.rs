// Context Types - The objects and worlds tasks are started against

use std::fmt;

use serde::{Deserialize, Serialize};

/// Generation-checked, non-owning reference to an owning context
///
/// A context is any object or world that can initiate tasks. Holding a
/// `ContextId` never keeps the context alive; once the context is destroyed
/// its slot may be reused with a higher generation, so stale ids are detected
/// by a single comparison.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ContextId {
    pub slot: u32,
    pub generation: u32,
}

impl ContextId {
    pub const fn new(slot: u32, generation: u32) -> Self {
        Self { slot, generation }
    }
}

impl fmt::Display for ContextId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ctx-{}v{}", self.slot, self.generation)
    }
}

/// Lifecycle phase of a context
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContextPhase {
    /// Accepting tasks and resumptions
    Active,
    /// Destruction has begun; pending tasks are being cancelled
    TearingDown,
    /// Destroyed
    Gone,
}

impl ContextPhase {
    pub fn is_active(&self) -> bool {
        *self == ContextPhase::Active
    }
}

impl fmt::Display for ContextPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ContextPhase::Active => write!(f, "active"),
            ContextPhase::TearingDown => write!(f, "tearing_down"),
            ContextPhase::Gone => write!(f, "gone"),
        }
    }
}
