use crate::{
    AmqResult, amq_error::malformed, commands::data_structure::CachedValue,
};
use std::collections::HashMap;

// A cache slot holds "some identity" or the marshalled null, which the
// protocol caches like any other value.
type SlotContent = Option<CachedValue>;

// Outbound slot table. Slots are assigned round-robin; an overwritten slot's
// previous occupant simply loses its binding, exactly as the reference
// implementation rotates its marshal cache.
#[derive(Debug, Default)]
pub(crate) struct MarshalCache {
    map: HashMap<SlotContent, i16>,
    ring: Vec<Option<SlotContent>>,
    next_slot: usize,
}

impl MarshalCache {
    pub fn resize(&mut self, capacity: usize) {
        self.map.clear();
        self.ring = vec![None; capacity];
        self.next_slot = 0;
    }

    pub fn lookup(&self, value: &SlotContent) -> Option<i16> {
        self.map.get(value).copied()
    }

    #[allow(clippy::cast_possible_truncation)]
    #[allow(clippy::cast_possible_wrap)]
    pub fn insert(&mut self, value: SlotContent) -> AmqResult<i16> {
        if self.ring.is_empty() {
            return Err(malformed!("cached object written while caching is off"));
        }
        let slot = self.next_slot;
        self.next_slot = (self.next_slot + 1) % self.ring.len();
        if let Some(old) = self.ring[slot].take() {
            self.map.remove(&old);
        }
        self.ring[slot] = Some(value.clone());
        self.map.insert(value, slot as i16);
        Ok(slot as i16)
    }
}

// Inbound slot table, written under the peer's slot assignment.
#[derive(Debug, Default)]
pub(crate) struct UnmarshalCache {
    slots: HashMap<i16, SlotContent>,
}

impl UnmarshalCache {
    pub fn clear(&mut self) {
        self.slots.clear();
    }

    pub fn store(&mut self, slot: i16, value: SlotContent) {
        self.slots.insert(slot, value);
    }

    pub fn load(&self, slot: i16) -> AmqResult<SlotContent> {
        self.slots
            .get(&slot)
            .cloned()
            .ok_or_else(|| malformed!("reference to unassigned cache slot {slot}"))
    }
}
