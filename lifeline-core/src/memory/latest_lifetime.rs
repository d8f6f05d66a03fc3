//! Latest-lifetime memory signal.

use std::cell::Cell;
use std::fmt;
use std::rc::{Rc, Weak};

use crate::lifetime::Lifetime;
use crate::signal::{Callback, MemorySignal, SharedList, Signal, SignalFlags, SignalKind, SubscriberList, TmpsSignal};

#[derive(Debug, Clone, Copy)]
struct Held {
    lifetime: Lifetime,
    /// Created by [`LatestLifetime::open`]; ended when replaced.
    owned: bool,
    /// Clears the slot when `lifetime` ends.
    listener: Lifetime,
}

/// Memory signal holding at most one active lifetime.
///
/// Setting a new lifetime releases the previous one first, ending it if the
/// signal created it. Setting the retained instance again is a no-op, and
/// an ended lifetime is normalized to "no value". When the retained lifetime
/// ends the slot empties on its own.
pub struct LatestLifetime {
    held: Rc<Cell<Option<Held>>>,
    subscribers: SharedList<Lifetime>,
}

impl LatestLifetime {
    pub fn new() -> Self {
        Self {
            held: Rc::new(Cell::new(None)),
            subscribers: SubscriberList::shared(),
        }
    }

    /// Retain and publish an externally owned lifetime.
    ///
    /// The signal never ends `lifetime` itself. Returns whether a new value
    /// was published.
    pub fn set(&self, lifetime: Lifetime) -> bool {
        self.replace(lifetime, false)
    }

    /// Create, retain and publish a lifetime owned by this signal.
    pub fn open(&self) -> Lifetime {
        let lifetime = Lifetime::new();
        self.replace(lifetime, true);
        lifetime
    }

    fn replace(&self, lifetime: Lifetime, owned: bool) -> bool {
        if self.current() == Some(lifetime) {
            return false;
        }

        // Ending the released value may store another one; release until empty.
        while self.release(true).is_some() {}

        if lifetime.is_ended() {
            return false;
        }

        let slot: Weak<Cell<Option<Held>>> = Rc::downgrade(&self.held);
        let listener = lifetime.on_end(move || {
            if let Some(slot) = slot.upgrade() {
                if slot.get().map_or(false, |held| held.lifetime == lifetime) {
                    slot.set(None);
                }
            }
        });
        self.held.set(Some(Held {
            lifetime,
            owned,
            listener,
        }));

        SubscriberList::notify(&self.subscribers, &lifetime);
        true
    }

    /// Empty the slot, ending the retained lifetime if this signal owns it.
    pub fn clear(&self) -> Option<Lifetime> {
        self.release(true)
    }

    /// Null the retained reference and detach from its end, without ending
    /// it even when owned.
    pub fn cleanup(&self) -> Option<Lifetime> {
        self.release(false)
    }

    fn release(&self, end_owned: bool) -> Option<Lifetime> {
        let held = self.held.take()?;
        held.listener.end();
        if end_owned && held.owned {
            held.lifetime.end();
        }
        Some(held.lifetime)
    }

    /// The retained lifetime, if it is still active.
    pub fn current(&self) -> Option<Lifetime> {
        self.held
            .get()
            .map(|held| held.lifetime)
            .filter(Lifetime::is_active)
    }

    /// Whether the retained lifetime was created by [`LatestLifetime::open`].
    pub fn holds_owned(&self) -> bool {
        self.held.get().map_or(false, |held| held.owned && held.lifetime.is_active())
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.borrow().len()
    }
}

impl Signal for LatestLifetime {
    type Item = Lifetime;

    fn subscribe_with(&self, callback: Callback<Lifetime>) -> Lifetime {
        let subscription = SubscriberList::attach(&self.subscribers, Rc::clone(&callback));
        if let Some(lifetime) = self.current() {
            callback(&lifetime);
        }
        subscription
    }
}

impl SignalKind for LatestLifetime {
    const FLAGS: SignalFlags = SignalFlags {
        memory: true,
        multi: false,
        tmps_only: true,
    };
}

impl MemorySignal for LatestLifetime {
    fn replay(&self, callback: &dyn Fn(&Lifetime)) {
        if let Some(lifetime) = self.current() {
            callback(&lifetime);
        }
    }
}

impl TmpsSignal for LatestLifetime {}

impl Default for LatestLifetime {
    fn default() -> Self {
        Self::new()
    }
}

impl Clone for LatestLifetime {
    fn clone(&self) -> Self {
        Self {
            held: Rc::clone(&self.held),
            subscribers: Rc::clone(&self.subscribers),
        }
    }
}

impl fmt::Debug for LatestLifetime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LatestLifetime")
            .field("held", &self.held.get())
            .field("subscribers", &self.subscribers.borrow())
            .finish()
    }
}
