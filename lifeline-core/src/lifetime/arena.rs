//! Generational slot storage for lifetime records.
//!
//! Keys carry a generation counter, so a key whose slot was vacated (and
//! possibly re-used) never aliases the new occupant. Lookups through a
//! stale key simply miss, which is how an ended lifetime is recognised.

use std::fmt;

/// Index plus generation. Stale keys miss on lookup.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub(crate) struct SlotKey {
    index: usize,
    generation: u32,
}

impl SlotKey {
    /// A key that never resolves; no slot lives at `usize::MAX`.
    pub(crate) const DANGLING: SlotKey = SlotKey {
        index: usize::MAX,
        generation: u32::MAX,
    };

    #[cfg(test)]
    pub(crate) fn index(self) -> usize {
        self.index
    }

    #[cfg(test)]
    pub(crate) fn generation(self) -> u32 {
        self.generation
    }
}

impl fmt::Debug for SlotKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.index, self.generation)
    }
}

enum Slot<T> {
    Occupied { value: T, generation: u32 },
    Vacant { next_free: Option<usize>, generation: u32 },
}

/// A vector of slots with an intrusive free list.
pub(crate) struct Arena<T> {
    slots: Vec<Slot<T>>,
    free_head: Option<usize>,
    len: usize,
}

impl<T> Arena<T> {
    pub(crate) const fn new() -> Self {
        Self {
            slots: Vec::new(),
            free_head: None,
            len: 0,
        }
    }

    /// Number of occupied slots.
    pub(crate) fn len(&self) -> usize {
        self.len
    }

    pub(crate) fn insert(&mut self, value: T) -> SlotKey {
        self.len += 1;

        if let Some(index) = self.free_head {
            if let Slot::Vacant {
                next_free,
                generation,
            } = self.slots[index]
            {
                self.free_head = next_free;
                self.slots[index] = Slot::Occupied { value, generation };
                return SlotKey { index, generation };
            }
            // The free list only ever links vacant slots; fall through and
            // append if that ever stops holding.
            self.free_head = None;
        }

        let index = self.slots.len();
        self.slots.push(Slot::Occupied {
            value,
            generation: 0,
        });
        SlotKey {
            index,
            generation: 0,
        }
    }

    /// Vacates the slot and bumps its generation. Returns `None` for a
    /// stale or unknown key.
    pub(crate) fn remove(&mut self, key: SlotKey) -> Option<T> {
        let slot = self.slots.get_mut(key.index)?;
        match slot {
            Slot::Occupied { generation, .. } if *generation == key.generation => {
                let vacant = Slot::Vacant {
                    next_free: self.free_head,
                    generation: generation.wrapping_add(1),
                };
                let old = std::mem::replace(slot, vacant);
                self.free_head = Some(key.index);
                self.len -= 1;
                match old {
                    Slot::Occupied { value, .. } => Some(value),
                    Slot::Vacant { .. } => None,
                }
            }
            _ => None,
        }
    }

    pub(crate) fn get(&self, key: SlotKey) -> Option<&T> {
        match self.slots.get(key.index)? {
            Slot::Occupied { value, generation } if *generation == key.generation => Some(value),
            _ => None,
        }
    }

    pub(crate) fn get_mut(&mut self, key: SlotKey) -> Option<&mut T> {
        match self.slots.get_mut(key.index)? {
            Slot::Occupied { value, generation } if *generation == key.generation => Some(value),
            _ => None,
        }
    }

    pub(crate) fn contains(&self, key: SlotKey) -> bool {
        self.get(key).is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insert_and_remove() {
        let mut arena = Arena::new();
        let a = arena.insert("a");
        let b = arena.insert("b");
        assert_eq!(arena.len(), 2);

        assert_eq!(arena.remove(a), Some("a"));
        assert_eq!(arena.len(), 1);
        assert!(!arena.contains(a));
        assert_eq!(arena.get(b), Some(&"b"));
    }

    #[test]
    fn reused_slot_does_not_alias_stale_key() {
        let mut arena = Arena::new();
        let old = arena.insert(1);
        arena.remove(old);

        let new = arena.insert(2);
        assert_eq!(new.index(), old.index());
        assert_ne!(new.generation(), old.generation());
        assert!(arena.get(old).is_none());
        assert_eq!(arena.get(new), Some(&2));
        assert!(arena.remove(old).is_none());
    }

    #[test]
    fn dangling_key_never_resolves() {
        let mut arena = Arena::new();
        arena.insert(());
        assert!(!arena.contains(SlotKey::DANGLING));
    }
}
