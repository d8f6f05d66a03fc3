//! Set-of-lifetimes memory signal.

use std::cell::RefCell;
use std::fmt;
use std::rc::{Rc, Weak};

use indexmap::IndexMap;

use crate::lifetime::Lifetime;
use crate::signal::{Callback, MemorySignal, SharedList, Signal, SignalFlags, SignalKind, SubscriberList, TmpsSignal};

/// Member lifetime mapped to the listener that evicts it on end.
type Members = IndexMap<Lifetime, Lifetime>;

/// Memory signal holding any number of active lifetimes.
///
/// Each member leaves the set when it ends. New subscribers are replayed
/// every active member in insertion order.
pub struct LifetimeSet {
    members: Rc<RefCell<Members>>,
    subscribers: SharedList<Lifetime>,
}

impl LifetimeSet {
    pub fn new() -> Self {
        Self {
            members: Rc::new(RefCell::new(IndexMap::new())),
            subscribers: SubscriberList::shared(),
        }
    }

    /// Add and publish `lifetime`.
    ///
    /// Ended lifetimes and current members are ignored. Returns whether the
    /// lifetime was added.
    pub fn insert(&self, lifetime: Lifetime) -> bool {
        if lifetime.is_ended() || self.contains(lifetime) {
            return false;
        }

        let members: Weak<RefCell<Members>> = Rc::downgrade(&self.members);
        let listener = lifetime.on_end(move || {
            if let Some(members) = members.upgrade() {
                members.borrow_mut().shift_remove(&lifetime);
            }
        });
        self.members.borrow_mut().insert(lifetime, listener);

        SubscriberList::notify(&self.subscribers, &lifetime);
        true
    }

    /// Drop `lifetime` from the set without ending it.
    pub fn remove(&self, lifetime: Lifetime) -> bool {
        let listener = self.members.borrow_mut().shift_remove(&lifetime);
        match listener {
            Some(listener) => {
                listener.end();
                true
            }
            None => false,
        }
    }

    pub fn contains(&self, lifetime: Lifetime) -> bool {
        self.members.borrow().contains_key(&lifetime)
    }

    pub fn len(&self) -> usize {
        self.members.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.borrow().is_empty()
    }

    /// Snapshot of the members in insertion order.
    pub fn members(&self) -> Vec<Lifetime> {
        self.members.borrow().keys().copied().collect()
    }

    /// End every member.
    pub fn end_all(&self) {
        for member in self.members() {
            member.end();
        }
    }

    /// Forget every member and detach from their ends, without ending them.
    pub fn cleanup(&self) {
        let members = std::mem::take(&mut *self.members.borrow_mut());
        for listener in members.values() {
            listener.end();
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.borrow().len()
    }
}

impl Signal for LifetimeSet {
    type Item = Lifetime;

    fn subscribe_with(&self, callback: Callback<Lifetime>) -> Lifetime {
        let subscription = SubscriberList::attach(&self.subscribers, Rc::clone(&callback));
        for member in self.members() {
            if subscription.is_ended() {
                break;
            }
            if member.is_active() {
                callback(&member);
            }
        }
        subscription
    }
}

impl SignalKind for LifetimeSet {
    const FLAGS: SignalFlags = SignalFlags {
        memory: true,
        multi: true,
        tmps_only: true,
    };
}

impl MemorySignal for LifetimeSet {
    fn replay(&self, callback: &dyn Fn(&Lifetime)) {
        for member in self.members() {
            if member.is_active() {
                callback(&member);
            }
        }
    }
}

impl TmpsSignal for LifetimeSet {}

impl Default for LifetimeSet {
    fn default() -> Self {
        Self::new()
    }
}

impl Clone for LifetimeSet {
    fn clone(&self) -> Self {
        Self {
            members: Rc::clone(&self.members),
            subscribers: Rc::clone(&self.subscribers),
        }
    }
}

impl fmt::Debug for LifetimeSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LifetimeSet")
            .field("members", &self.members())
            .field("subscribers", &self.subscribers.borrow())
            .finish()
    }
}
