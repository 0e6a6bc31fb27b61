//! Operation pool - generational slots recycled per operation kind
//!
//! Reclaiming a slot bumps its version, which invalidates every handle issued
//! against the previous use without tracking the handles themselves.

use std::collections::BTreeMap;

use crate::handle::UntypedHandle;
use crate::operation::{OperationKind, OperationKindTag, OperationSlot};

/// Pool statistics
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PoolStats {
    /// Slots currently in use
    pub live: usize,
    /// Slots waiting to be reused
    pub free: usize,
    /// Total slots ever allocated
    pub capacity: usize,
    /// Free slots per operation kind
    pub free_by_kind: BTreeMap<OperationKindTag, usize>,
}

/// Arena of operation slots
pub(crate) struct OperationPool {
    slots: Vec<OperationSlot>,
    free: BTreeMap<OperationKindTag, Vec<u32>>,
    live: usize,
}

impl OperationPool {
    /// Maximum number of slots
    pub const MAX_INDEX: u32 = u32::MAX - 1;

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            slots: Vec::with_capacity(capacity),
            free: BTreeMap::new(),
            live: 0,
        }
    }

    /// Take a slot for `kind`, reusing a free slot of the same kind first
    pub fn acquire(&mut self, kind: OperationKind) -> UntypedHandle {
        let tag = kind.tag();
        self.live += 1;

        if let Some(index) = self.free.get_mut(&tag).and_then(Vec::pop) {
            let slot = &mut self.slots[index as usize];
            slot.reuse(kind);
            return UntypedHandle::new(index, slot.version);
        }

        let index = self.slots.len() as u32;
        assert!(index <= Self::MAX_INDEX, "operation pool exhausted");
        self.slots.push(OperationSlot::new(1, kind));
        UntypedHandle::new(index, 1)
    }

    /// Return a slot to its kind's free list and bump its version
    pub fn reclaim(&mut self, handle: UntypedHandle) -> bool {
        let Some(slot) = self.slots.get_mut(handle.index() as usize) else {
            return false;
        };
        if !slot.in_use || slot.version != handle.version() {
            return false;
        }

        slot.clear();
        // Version 0 is never issued
        slot.version = slot.version.wrapping_add(1).max(1);
        self.free.entry(slot.tag).or_default().push(handle.index());
        self.live -= 1;
        true
    }

    /// Slot for a handle whose version still matches
    pub fn get(&self, handle: UntypedHandle) -> Option<&OperationSlot> {
        self.slots
            .get(handle.index() as usize)
            .filter(|slot| slot.in_use && slot.version == handle.version())
    }

    /// Mutable slot for a handle whose version still matches
    pub fn get_mut(&mut self, handle: UntypedHandle) -> Option<&mut OperationSlot> {
        self.slots
            .get_mut(handle.index() as usize)
            .filter(|slot| slot.in_use && slot.version == handle.version())
    }

    /// Slot for a handle that is live (matching version, refcount above zero)
    pub fn live(&self, handle: UntypedHandle) -> Option<&OperationSlot> {
        self.get(handle).filter(|slot| slot.is_live())
    }

    pub fn stats(&self) -> PoolStats {
        let free_by_kind: BTreeMap<_, _> = self
            .free
            .iter()
            .map(|(tag, list)| (*tag, list.len()))
            .collect();
        PoolStats {
            live: self.live,
            free: free_by_kind.values().sum(),
            capacity: self.slots.len(),
            free_by_kind,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reclaim_bumps_version() {
        let mut pool = OperationPool::with_capacity(4);
        let h = pool.acquire(OperationKind::Manual);
        assert!(pool.get(h).is_some());

        assert!(pool.reclaim(h));
        assert!(pool.get(h).is_none());
        // Double reclaim is rejected
        assert!(!pool.reclaim(h));

        let reused = pool.acquire(OperationKind::Manual);
        assert_eq!(reused.index(), h.index());
        assert_eq!(reused.version(), h.version() + 1);
        assert!(pool.get(h).is_none());
        assert!(pool.get(reused).is_some());
    }

    #[test]
    fn test_free_lists_are_per_kind() {
        let mut pool = OperationPool::with_capacity(4);
        let manual = pool.acquire(OperationKind::Manual);
        pool.reclaim(manual);

        let completed = pool.acquire(OperationKind::Completed);
        assert_ne!(completed.index(), manual.index());

        let stats = pool.stats();
        assert_eq!(stats.live, 1);
        assert_eq!(stats.free, 1);
        assert_eq!(stats.capacity, 2);
        assert_eq!(stats.free_by_kind.get(&OperationKindTag::Manual), Some(&1));
    }
}
