use std::sync::{Mutex, MutexGuard};

use log::warn;

use crate::RawHandle;

use super::{SimError, SimResult, objects::Object};

struct Slot {
    generation: u32,
    object: Option<Object>,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
/// Counters describing how handles have been used.
pub struct Stats {
    /// Objects currently alive.
    pub live: usize,

    /// Successful destroy calls.
    pub destroyed: u64,

    /// Destroy calls on handles that were already released or never existed.
    /// A correct binding never produces one.
    pub invalid_destroys: u64,

    /// Destroy calls on a binary-gate context owned by a CKKS context.
    /// A correct binding never produces one.
    pub borrowed_destroys: u64,
}

/// The handle table: an arena of slots whose tokens embed a generation, so a
/// released handle can never alias a newer object in a recycled slot.
pub(crate) struct Table {
    slots: Vec<Slot>,
    free: Vec<u32>,
    pub(crate) stats: Stats,
}

impl Table {
    fn new() -> Self {
        Self {
            slots: vec![],
            free: vec![],
            stats: Stats::default(),
        }
    }

    fn token(index: u32, generation: u32) -> Option<RawHandle> {
        RawHandle::new(((generation as u64) << 32) | (index as u64 + 1))
    }

    fn locate(&self, handle: RawHandle) -> Option<usize> {
        let token = handle.get();
        let index = (token & 0xFFFF_FFFF).checked_sub(1)? as usize;
        let generation = (token >> 32) as u32;
        let slot = self.slots.get(index)?;

        (slot.generation == generation && slot.object.is_some()).then_some(index)
    }

    /// A random identifier for engine-level identities (contexts, keys). Random
    /// rather than sequential so identities stay distinct across engines, as
    /// they do for blobs moved between processes.
    pub(crate) fn fresh_id(&mut self) -> u64 {
        rand::random::<u64>() | 1
    }

    pub(crate) fn insert(&mut self, object: Object) -> SimResult<RawHandle> {
        let index = match self.free.pop() {
            Some(index) => {
                let slot = &mut self.slots[index as usize];
                slot.generation = slot.generation.wrapping_add(1).max(1);
                slot.object = Some(object);
                index
            }
            None => {
                let index = u32::try_from(self.slots.len())
                    .map_err(|_| SimError::new("handle table exhausted"))?;
                self.slots.push(Slot {
                    generation: 1,
                    object: Some(object),
                });
                index
            }
        };

        self.stats.live += 1;

        let generation = self.slots[index as usize].generation;
        Self::token(index, generation).ok_or_else(|| SimError::new("handle table exhausted"))
    }

    pub(crate) fn get(&self, handle: RawHandle) -> Option<&Object> {
        let index = self.locate(handle)?;
        self.slots[index].object.as_ref()
    }

    pub(crate) fn get_mut(&mut self, handle: RawHandle) -> Option<&mut Object> {
        let index = self.locate(handle)?;
        self.slots[index].object.as_mut()
    }

    /// Frees the slot, returning the object it held.
    pub(crate) fn remove(&mut self, handle: RawHandle) -> Option<Object> {
        let Some(index) = self.locate(handle) else {
            warn!("destroy called on a stale or unknown handle {handle:?}");
            self.stats.invalid_destroys += 1;
            return None;
        };

        let object = self.slots[index].object.take();
        self.free.push(index as u32);
        self.stats.live -= 1;
        self.stats.destroyed += 1;

        object
    }

    /// Frees a slot the engine owns internally. Not counted as a caller destroy.
    pub(crate) fn remove_internal(&mut self, handle: RawHandle) -> Option<Object> {
        let index = self.locate(handle)?;
        let object = self.slots[index].object.take();
        self.free.push(index as u32);
        self.stats.live -= 1;

        object
    }
}

/// The table behind a mutex, shared by both engine subsystems.
pub(crate) struct Store {
    table: Mutex<Table>,
}

impl Store {
    pub(crate) fn new() -> Self {
        Self {
            table: Mutex::new(Table::new()),
        }
    }

    pub(crate) fn lock(&self) -> MutexGuard<'_, Table> {
        // A panic while holding the lock leaves the table consistent: every
        // mutation is a single slot assignment.
        self.table.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::objects::{Object, SchSwchObj};

    fn object() -> Object {
        Object::SchSwchParams(SchSwchObj::default())
    }

    #[test]
    fn stale_handles_do_not_alias_recycled_slots() {
        let mut table = Table::new();
        let first = table.insert(object()).unwrap();
        assert!(table.remove(first).is_some());

        let second = table.insert(object()).unwrap();

        assert_ne!(first, second);
        assert!(table.get(first).is_none());
        assert!(table.get(second).is_some());
    }

    #[test]
    fn double_destroy_is_counted() {
        let mut table = Table::new();
        let handle = table.insert(object()).unwrap();

        table.remove(handle);
        table.remove(handle);

        assert_eq!(table.stats.destroyed, 1);
        assert_eq!(table.stats.invalid_destroys, 1);
        assert_eq!(table.stats.live, 0);
    }
}
