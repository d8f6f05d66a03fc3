//! Subscriber bookkeeping shared by every signal kind.
//!
//! A subscriber is a callback paired with the lifetime that represents its
//! subscription. The list is notified from a snapshot, so callbacks may
//! subscribe, unsubscribe or publish again while a notification is running.

use std::cell::RefCell;
use std::fmt;
use std::rc::{Rc, Weak};

use crate::lifetime::Lifetime;

use super::Callback;

/// A callback registered on a signal.
pub(crate) struct Subscriber<T: 'static> {
    subscription: Lifetime,
    callback: Callback<T>,
}

impl<T: 'static> Subscriber<T> {
    /// Invoke the callback, unless the subscription ended in the meantime.
    pub(crate) fn notify(&self, value: &T) {
        if self.subscription.is_active() {
            (self.callback)(value);
        }
    }
}

impl<T: 'static> Clone for Subscriber<T> {
    fn clone(&self) -> Self {
        Self {
            subscription: self.subscription,
            callback: Rc::clone(&self.callback),
        }
    }
}

/// Ordered list of active subscribers.
pub(crate) struct SubscriberList<T: 'static> {
    entries: Vec<Subscriber<T>>,
}

/// Shared handle to a subscriber list.
pub(crate) type SharedList<T> = Rc<RefCell<SubscriberList<T>>>;

impl<T: 'static> SubscriberList<T> {
    pub(crate) fn shared() -> SharedList<T> {
        Rc::new(RefCell::new(Self {
            entries: Vec::new(),
        }))
    }

    /// Append `callback` and return its subscription.
    ///
    /// Ending the subscription removes the entry. If the list itself is gone
    /// by then, ending it is a no-op.
    pub(crate) fn attach(list: &SharedList<T>, callback: Callback<T>) -> Lifetime {
        let subscription = Lifetime::new();
        list.borrow_mut().entries.push(Subscriber {
            subscription,
            callback,
        });

        let weak: Weak<RefCell<Self>> = Rc::downgrade(list);
        subscription.end_with(move || {
            if let Some(list) = weak.upgrade() {
                list.borrow_mut()
                    .entries
                    .retain(|entry| entry.subscription != subscription);
            }
        });
        subscription
    }

    /// Notify every subscriber in subscription order.
    ///
    /// Entries added during the walk are not notified; entries whose
    /// subscription ends during the walk are skipped.
    pub(crate) fn notify(list: &SharedList<T>, value: &T) {
        Self::notify_while(list, value, || true);
    }

    /// Like [`SubscriberList::notify`], stopping before the next subscriber
    /// once `proceed` returns `false`.
    pub(crate) fn notify_while(list: &SharedList<T>, value: &T, proceed: impl Fn() -> bool) {
        let snapshot = list.borrow().entries.clone();
        for subscriber in &snapshot {
            if !proceed() {
                break;
            }
            subscriber.notify(value);
        }
    }

    /// End every current subscription.
    pub(crate) fn close(list: &SharedList<T>) {
        let entries = std::mem::take(&mut list.borrow_mut().entries);
        for entry in entries {
            entry.subscription.end();
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }
}

impl<T: 'static> fmt::Debug for SubscriberList<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list()
            .entries(self.entries.iter().map(|entry| entry.subscription))
            .finish()
    }
}
