//! Append-only memory signal.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use crate::lifetime::Lifetime;
use crate::signal::{Callback, MemorySignal, SharedList, Signal, SignalFlags, SignalKind, SubscriberList};

/// Memory signal that retains every published value.
///
/// New subscribers receive the whole log, oldest first, before any live
/// value. There is no deduplication.
pub struct LatestValueMulti<T: 'static> {
    log: Rc<RefCell<Vec<T>>>,
    subscribers: SharedList<T>,
}

impl<T: Clone + 'static> LatestValueMulti<T> {
    pub fn new() -> Self {
        Self {
            log: Rc::new(RefCell::new(Vec::new())),
            subscribers: SubscriberList::shared(),
        }
    }

    /// Append `value` to the log and publish it.
    pub fn push(&self, value: T) {
        self.log.borrow_mut().push(value.clone());
        SubscriberList::notify(&self.subscribers, &value);
    }

    /// Snapshot of the log.
    pub fn values(&self) -> Vec<T> {
        self.log.borrow().clone()
    }

    pub fn len(&self) -> usize {
        self.log.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.log.borrow().is_empty()
    }

    /// Drop the log without notifying.
    pub fn clear(&self) {
        self.log.borrow_mut().clear();
    }
}

impl<T: Clone + 'static> Signal for LatestValueMulti<T> {
    type Item = T;

    fn subscribe_with(&self, callback: Callback<T>) -> Lifetime {
        let subscription = SubscriberList::attach(&self.subscribers, Rc::clone(&callback));
        for value in self.values() {
            if subscription.is_ended() {
                break;
            }
            callback(&value);
        }
        subscription
    }
}

impl<T: Clone + 'static> SignalKind for LatestValueMulti<T> {
    const FLAGS: SignalFlags = SignalFlags {
        memory: true,
        multi: true,
        tmps_only: false,
    };
}

impl<T: Clone + 'static> MemorySignal for LatestValueMulti<T> {
    fn replay(&self, callback: &dyn Fn(&T)) {
        for value in self.values() {
            callback(&value);
        }
    }
}

impl<T: Clone + 'static> Default for LatestValueMulti<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: 'static> Clone for LatestValueMulti<T> {
    fn clone(&self) -> Self {
        Self {
            log: Rc::clone(&self.log),
            subscribers: Rc::clone(&self.subscribers),
        }
    }
}

impl<T: fmt::Debug + 'static> fmt::Debug for LatestValueMulti<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LatestValueMulti")
            .field("log", &self.log.borrow())
            .field("subscribers", &self.subscribers.borrow())
            .finish()
    }
}
