//! Lifetime Registry
//!
//! Every live lifetime owns one record in a thread-local arena. The record
//! holds its ordered teardown list, the keys of the lifetimes that hold it
//! as a dependent, and its optional cleanup hook.
//!
//! # Borrowing discipline
//!
//! The arena sits behind a `RefCell`. Every entry point borrows it for the
//! duration of a single bookkeeping step and releases it before any user
//! closure runs, so teardown actions and callbacks may freely create, link
//! or end other lifetimes.

use std::cell::RefCell;

use smallvec::SmallVec;

use super::arena::{Arena, SlotKey};
use super::Teardown;

/// Record backing one live lifetime.
pub(crate) struct Node {
    /// Teardown actions in registration order.
    pub(crate) teardown: Vec<Teardown>,
    /// Lifetimes that list this one as a dependent.
    pub(crate) owners: SmallVec<[SlotKey; 2]>,
    /// Runs once, after the teardown list.
    pub(crate) cleanup: Option<Box<dyn FnOnce()>>,
}

/// Outcome of linking a dependent under an owner.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Link {
    Linked,
    AlreadyLinked,
    OwnerEnded,
    DependentEnded,
}

thread_local! {
    static REGISTRY: RefCell<Arena<Node>> = const { RefCell::new(Arena::new()) };
}

/// Entry points into the thread-local registry.
pub(crate) struct Runtime;

impl Runtime {
    fn with<R>(f: impl FnOnce(&mut Arena<Node>) -> R) -> Option<R> {
        // `try_with` keeps handles usable (as ended) while thread-locals are
        // being destroyed.
        REGISTRY
            .try_with(|arena| {
                let mut arena = arena.borrow_mut();
                f(&mut *arena)
            })
            .ok()
    }

    /// Allocate a record for a new lifetime.
    pub(crate) fn alloc(cleanup: Option<Box<dyn FnOnce()>>) -> SlotKey {
        Self::with(|arena| {
            arena.insert(Node {
                teardown: Vec::new(),
                owners: SmallVec::new(),
                cleanup,
            })
        })
        .unwrap_or(SlotKey::DANGLING)
    }

    pub(crate) fn is_live(key: SlotKey) -> bool {
        Self::with(|arena| arena.contains(key)).unwrap_or(false)
    }

    /// Vacate the slot and hand back its record.
    ///
    /// Owners are unlinked here, so once this returns no other record refers
    /// to `key` as a dependent.
    pub(crate) fn take(key: SlotKey) -> Option<Node> {
        Self::with(|arena| {
            let node = arena.remove(key)?;
            for owner in &node.owners {
                if let Some(owner) = arena.get_mut(*owner) {
                    owner
                        .teardown
                        .retain(|entry| !matches!(entry, Teardown::Dependent(dep) if dep.key() == key));
                }
            }
            Some(node)
        })
        .flatten()
    }

    /// Append a teardown action. Hands the action back if `key` has ended.
    pub(crate) fn push_action(key: SlotKey, action: Teardown) -> Result<(), Teardown> {
        let mut action = Some(action);
        Self::with(|arena| {
            if let Some(node) = arena.get_mut(key) {
                if let Some(entry) = action.take() {
                    node.teardown.push(entry);
                }
            }
        });
        match action {
            Some(action) => Err(action),
            None => Ok(()),
        }
    }

    /// Register `dependent` in `owner`'s teardown list and record the back
    /// edge. Linking the same pair twice is a no-op.
    pub(crate) fn link(owner: SlotKey, dependent: super::Lifetime) -> Link {
        Self::with(|arena| {
            let dep_key = dependent.key();
            if !arena.contains(dep_key) {
                return Link::DependentEnded;
            }
            let Some(node) = arena.get_mut(owner) else {
                return Link::OwnerEnded;
            };
            if node
                .teardown
                .iter()
                .any(|entry| matches!(entry, Teardown::Dependent(dep) if dep.key() == dep_key))
            {
                return Link::AlreadyLinked;
            }
            node.teardown.push(Teardown::Dependent(dependent));
            if let Some(dep) = arena.get_mut(dep_key) {
                dep.owners.push(owner);
            }
            Link::Linked
        })
        .unwrap_or(Link::OwnerEnded)
    }

    /// Whether `owner` currently lists `dependent` in its teardown list.
    pub(crate) fn is_linked(owner: SlotKey, dependent: SlotKey) -> bool {
        Self::with(|arena| {
            arena
                .get(dependent)
                .map_or(false, |dep| dep.owners.contains(&owner))
        })
        .unwrap_or(false)
    }

    /// Number of live lifetimes on this thread.
    pub(crate) fn live_count() -> usize {
        Self::with(|arena| arena.len()).unwrap_or(0)
    }
}
