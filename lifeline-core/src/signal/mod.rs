//! Push Signals
//!
//! A signal is a push notification source. Consumers subscribe with a
//! callback and get back a [`Lifetime`] that represents the subscription;
//! ending it stops further invocations.
//!
//! # Delivery
//!
//! Publishing is synchronous and re-entrant. Callbacks run on the caller's
//! stack in subscription order; a publish triggered from inside a callback
//! is delivered depth-first before the outer publish continues. The
//! subscriber list is snapshotted before each walk, and a subscription that
//! ends mid-walk is not invoked again in that walk.
//!
//! # Capabilities
//!
//! What a signal promises beyond plain delivery is fixed per type and
//! described at compile time:
//!
//! - [`SignalKind::FLAGS`] carries the `memory` / `multi` / `tmps_only` bits.
//! - [`MemorySignal`] marks signals that replay retained state to new
//!   subscribers.
//! - [`TmpsSignal`] marks signals whose every value is a [`Lifetime`] whose
//!   end the signal tracks.
//!
//! # Panics in callbacks
//!
//! A panicking callback unwinds out of `publish` to the publisher. No borrow
//! is held across callbacks, so the signal stays usable afterwards.

mod ext;
mod once;
mod subscriber;

use std::fmt;
use std::rc::Rc;

use crate::lifetime::Lifetime;

pub use ext::{Filter, Map, SignalExt};
pub use once::Once;
pub(crate) use subscriber::{SharedList, SubscriberList};

/// Callback type stored by signals.
pub type Callback<T> = Rc<dyn Fn(&T)>;

/// Static capability bits of a signal type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct SignalFlags {
    /// Replays retained state to new subscribers.
    pub memory: bool,
    /// May retain more than one value at a time.
    pub multi: bool,
    /// Every value is a lifetime whose end the signal tracks.
    pub tmps_only: bool,
}

impl SignalFlags {
    /// No capabilities: plain push delivery.
    pub const PLAIN: SignalFlags = SignalFlags {
        memory: false,
        multi: false,
        tmps_only: false,
    };
}

/// A push notification source.
pub trait Signal {
    /// Type of the values delivered to subscribers.
    type Item: 'static;

    /// Subscribe a shared callback.
    ///
    /// The returned lifetime is the subscription. Ending it is always safe,
    /// including after the signal itself is gone.
    fn subscribe_with(&self, callback: Callback<Self::Item>) -> Lifetime;

    /// Subscribe a closure.
    fn subscribe<F>(&self, callback: F) -> Lifetime
    where
        F: Fn(&Self::Item) + 'static,
        Self: Sized,
    {
        self.subscribe_with(Rc::new(callback))
    }
}

/// Compile-time capability description of a signal type.
pub trait SignalKind: Signal {
    /// Capability bits shared by every value of the type.
    const FLAGS: SignalFlags;
}

/// A signal that catches new subscribers up with retained state.
pub trait MemorySignal: SignalKind {
    /// Feed the currently retained value(s) to `callback`.
    ///
    /// Subscribing does this automatically; `replay` exists for callers that
    /// want a read of the retained state in delivery form.
    fn replay(&self, callback: &dyn Fn(&Self::Item));
}

/// A signal whose values are lifetimes tracked by the signal.
pub trait TmpsSignal: SignalKind + Signal<Item = Lifetime> {}

/// Plain push signal without memory.
///
/// # Example
///
/// ```rust
/// use std::cell::Cell;
/// use std::rc::Rc;
/// use lifeline_core::signal::{Emitter, Signal};
///
/// let clicks = Emitter::<u32>::new();
/// let total = Rc::new(Cell::new(0));
/// let sink = total.clone();
/// let subscription = clicks.subscribe(move |n| sink.set(sink.get() + n));
///
/// clicks.publish(&2);
/// subscription.end();
/// clicks.publish(&5);
/// assert_eq!(total.get(), 2);
/// ```
pub struct Emitter<T: 'static> {
    subscribers: SharedList<T>,
}

impl<T: 'static> Emitter<T> {
    /// Create a signal with no subscribers.
    pub fn new() -> Self {
        Self {
            subscribers: SubscriberList::shared(),
        }
    }

    /// Deliver `value` to every active subscriber.
    pub fn publish(&self, value: &T) {
        SubscriberList::notify(&self.subscribers, value);
    }

    /// Number of active subscriptions.
    pub fn subscriber_count(&self) -> usize {
        self.subscribers.borrow().len()
    }

    /// End every current subscription.
    pub fn close(&self) {
        SubscriberList::close(&self.subscribers);
    }
}

impl<T: 'static> Signal for Emitter<T> {
    type Item = T;

    fn subscribe_with(&self, callback: Callback<T>) -> Lifetime {
        SubscriberList::attach(&self.subscribers, callback)
    }
}

impl<T: 'static> SignalKind for Emitter<T> {
    const FLAGS: SignalFlags = SignalFlags::PLAIN;
}

impl<T: 'static> Default for Emitter<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: 'static> Clone for Emitter<T> {
    fn clone(&self) -> Self {
        Self {
            subscribers: Rc::clone(&self.subscribers),
        }
    }
}

impl<T: 'static> fmt::Debug for Emitter<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Emitter")
            .field("subscriber_count", &self.subscriber_count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::{Cell, RefCell};

    #[test]
    fn publish_reaches_subscribers_in_order() {
        let signal = Emitter::new();
        let log = Rc::new(RefCell::new(Vec::new()));

        let first = log.clone();
        let _a = signal.subscribe(move |v: &i32| first.borrow_mut().push(("a", *v)));
        let second = log.clone();
        let _b = signal.subscribe(move |v: &i32| second.borrow_mut().push(("b", *v)));

        signal.publish(&1);
        assert_eq!(*log.borrow(), vec![("a", 1), ("b", 1)]);
    }

    #[test]
    fn unsubscribed_callback_is_not_invoked() {
        let signal = Emitter::new();
        let hits = Rc::new(Cell::new(0));
        let counter = hits.clone();
        let subscription = signal.subscribe(move |_: &()| counter.set(counter.get() + 1));

        signal.publish(&());
        subscription.end();
        signal.publish(&());

        assert_eq!(hits.get(), 1);
        assert_eq!(signal.subscriber_count(), 0);
    }

    #[test]
    fn callback_ending_a_later_subscription_skips_it() {
        let signal = Emitter::new();
        let hits = Rc::new(Cell::new(0));
        let later: Rc<Cell<Option<Lifetime>>> = Rc::new(Cell::new(None));

        let target = later.clone();
        let _killer = signal.subscribe(move |_: &()| {
            if let Some(lifetime) = target.get() {
                lifetime.end();
            }
        });
        let counter = hits.clone();
        later.set(Some(signal.subscribe(move |_: &()| counter.set(counter.get() + 1))));

        signal.publish(&());
        assert_eq!(hits.get(), 0);
    }

    #[test]
    fn callback_ending_its_own_subscription() {
        let signal = Emitter::new();
        let hits = Rc::new(Cell::new(0));
        let own: Rc<Cell<Option<Lifetime>>> = Rc::new(Cell::new(None));

        let counter = hits.clone();
        let handle = own.clone();
        own.set(Some(signal.subscribe(move |_: &()| {
            counter.set(counter.get() + 1);
            if let Some(lifetime) = handle.get() {
                lifetime.end();
            }
        })));

        signal.publish(&());
        signal.publish(&());
        assert_eq!(hits.get(), 1);
    }

    #[test]
    fn nested_publish_is_depth_first() {
        let signal = Emitter::<u32>::new();
        let log = Rc::new(RefCell::new(Vec::new()));

        let inner = signal.clone();
        let first = log.clone();
        let _a = signal.subscribe(move |v| {
            first.borrow_mut().push(format!("a{v}"));
            if *v == 0 {
                inner.publish(&1);
            }
        });
        let second = log.clone();
        let _b = signal.subscribe(move |v| second.borrow_mut().push(format!("b{v}")));

        signal.publish(&0);
        assert_eq!(*log.borrow(), vec!["a0", "a1", "b1", "b0"]);
    }

    #[test]
    fn subscription_added_during_publish_waits_for_next_publish() {
        let signal = Emitter::<()>::new();
        let hits = Rc::new(Cell::new(0));

        let source = signal.clone();
        let counter = hits.clone();
        let _adder = signal.subscribe(move |_| {
            let counter = counter.clone();
            let _ = source.subscribe(move |_| counter.set(counter.get() + 1));
        });

        signal.publish(&());
        assert_eq!(hits.get(), 0);
        signal.publish(&());
        assert_eq!(hits.get(), 1);
    }

    #[test]
    fn close_ends_subscriptions() {
        let signal = Emitter::<()>::new();
        let subscription = signal.subscribe(|_| {});
        signal.close();
        assert!(subscription.is_ended());
        assert_eq!(signal.subscriber_count(), 0);
    }

    #[test]
    fn panicking_callback_leaves_signal_usable() {
        let signal = Emitter::<bool>::new();
        let hits = Rc::new(Cell::new(0));
        let counter = hits.clone();
        let _sub = signal.subscribe(move |explode| {
            counter.set(counter.get() + 1);
            if *explode {
                panic!("subscriber failure");
            }
        });

        let outcome = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| signal.publish(&true)));
        assert!(outcome.is_err());

        signal.publish(&false);
        assert_eq!(hits.get(), 2);
    }

    #[test]
    fn emitter_is_plain() {
        assert_eq!(<Emitter<()> as SignalKind>::FLAGS, SignalFlags::PLAIN);
    }
}
