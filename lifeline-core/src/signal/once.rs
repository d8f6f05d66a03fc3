//! One-shot signal.

use std::fmt;

use crate::lifetime::Lifetime;

use super::{Callback, Emitter, Signal, SignalFlags, SignalKind};

/// A signal that fires at most once and then ends itself.
///
/// This is the shape of a timer or a one-off external trigger: after
/// [`Once::fire`] returns, or unwinds because a subscriber panicked, the
/// signal's lifetime has ended and so has every subscription.
pub struct Once<T: 'static> {
    emitter: Emitter<T>,
    lifetime: Lifetime,
}

impl<T: 'static> Once<T> {
    pub fn new() -> Self {
        Self {
            emitter: Emitter::new(),
            lifetime: Lifetime::new(),
        }
    }

    /// Publish `value` unless already fired. Returns whether it published.
    pub fn fire(&self, value: &T) -> bool {
        if self.lifetime.is_ended() {
            return false;
        }
        let _ending = self.lifetime.guard();
        self.emitter.publish(value);
        true
    }

    /// Whether the signal has fired (or been cancelled).
    pub fn is_spent(&self) -> bool {
        self.lifetime.is_ended()
    }

    /// Cancel without firing.
    pub fn cancel(&self) -> bool {
        self.lifetime.end()
    }

    /// The signal's own lifetime; it ends on fire or cancel.
    pub fn lifetime(&self) -> Lifetime {
        self.lifetime
    }
}

impl<T: 'static> Signal for Once<T> {
    type Item = T;

    fn subscribe_with(&self, callback: Callback<T>) -> Lifetime {
        if self.lifetime.is_ended() {
            return Lifetime::ended();
        }
        let subscription = self.emitter.subscribe_with(callback);
        self.lifetime.end_with(subscription);
        subscription
    }
}

impl<T: 'static> SignalKind for Once<T> {
    const FLAGS: SignalFlags = SignalFlags::PLAIN;
}

impl<T: 'static> Default for Once<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: 'static> fmt::Debug for Once<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Once")
            .field("lifetime", &self.lifetime)
            .field("spent", &self.is_spent())
            .finish()
    }
}
