// Context Table - Generation-checked liveness of owning contexts
//
// Tasks and resumptions only hold `ContextId`s. Whether the context behind an
// id is still alive is answered here with one slot lookup and a generation
// compare.

use parking_lot::RwLock;

use latent_types::{ContextId, ContextPhase};

struct Slot {
    generation: u32,
    phase: ContextPhase,
    name: String,
}

#[derive(Default)]
struct Slots {
    slots: Vec<Slot>,
    free: Vec<u32>,
    closed: bool,
}

/// Table of the contexts (objects, worlds) that can own tasks
#[derive(Default)]
pub struct ContextTable {
    inner: RwLock<Slots>,
}

impl ContextTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a new active context
    ///
    /// Returns `None` once the table has been closed.
    pub fn spawn(&self, name: impl Into<String>) -> Option<ContextId> {
        let name = name.into();
        let mut inner = self.inner.write();
        if inner.closed {
            return None;
        }

        if let Some(slot) = inner.free.pop() {
            let entry = &mut inner.slots[slot as usize];
            entry.phase = ContextPhase::Active;
            entry.name = name;
            return Some(ContextId::new(slot, entry.generation));
        }

        let slot = inner.slots.len() as u32;
        inner.slots.push(Slot {
            generation: 0,
            phase: ContextPhase::Active,
            name,
        });
        Some(ContextId::new(slot, 0))
    }

    /// Refuse every later `spawn`. Existing contexts are unaffected.
    pub(crate) fn close(&self) {
        self.inner.write().closed = true;
    }

    pub fn is_closed(&self) -> bool {
        self.inner.read().closed
    }

    /// Current phase; stale or unknown ids are `Gone`
    pub fn phase(&self, id: ContextId) -> ContextPhase {
        let inner = self.inner.read();
        match inner.slots.get(id.slot as usize) {
            Some(slot) if slot.generation == id.generation => slot.phase,
            _ => ContextPhase::Gone,
        }
    }

    pub fn is_active(&self, id: ContextId) -> bool {
        self.phase(id).is_active()
    }

    /// Display name of a live context
    pub fn name(&self, id: ContextId) -> Option<String> {
        let inner = self.inner.read();
        inner
            .slots
            .get(id.slot as usize)
            .filter(|slot| slot.generation == id.generation && slot.phase != ContextPhase::Gone)
            .map(|slot| slot.name.clone())
    }

    /// Active -> TearingDown. Returns false if the context was not active.
    pub(crate) fn begin_teardown(&self, id: ContextId) -> bool {
        let mut inner = self.inner.write();
        match inner.slots.get_mut(id.slot as usize) {
            Some(slot) if slot.generation == id.generation && slot.phase.is_active() => {
                slot.phase = ContextPhase::TearingDown;
                true
            }
            _ => false,
        }
    }

    /// TearingDown -> Gone. The slot becomes reusable under a new generation.
    pub(crate) fn finish_teardown(&self, id: ContextId) -> bool {
        let mut inner = self.inner.write();
        let Some(slot) = inner.slots.get_mut(id.slot as usize) else {
            return false;
        };
        if slot.generation != id.generation || slot.phase != ContextPhase::TearingDown {
            return false;
        }
        slot.phase = ContextPhase::Gone;
        slot.generation = slot.generation.wrapping_add(1);
        slot.name.clear();
        inner.free.push(id.slot);
        true
    }

    /// Ids of every context that has not started tearing down
    pub fn active(&self) -> Vec<ContextId> {
        let inner = self.inner.read();
        inner
            .slots
            .iter()
            .enumerate()
            .filter(|(_, slot)| slot.phase.is_active())
            .map(|(i, slot)| ContextId::new(i as u32, slot.generation))
            .collect()
    }

    /// Number of active contexts
    pub fn active_count(&self) -> usize {
        self.inner
            .read()
            .slots
            .iter()
            .filter(|slot| slot.phase.is_active())
            .count()
    }
}
