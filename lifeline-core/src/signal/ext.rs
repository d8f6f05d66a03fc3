//! Derived pass-through signals.
//!
//! [`Map`] and [`Filter`] hold no state of their own: each downstream
//! subscription becomes one upstream subscription, so replay from a memory
//! source passes straight through and ending the downstream subscription
//! ends the upstream one.

use std::marker::PhantomData;
use std::rc::Rc;

use crate::lifetime::Lifetime;

use super::{Callback, Signal, SignalFlags, SignalKind};

/// Combinators available on every sized signal.
pub trait SignalExt: Signal + Sized {
    /// Transform every value with `f`.
    fn map<U, F>(self, f: F) -> Map<Self, F, U>
    where
        U: 'static,
        F: Fn(&Self::Item) -> U + 'static,
    {
        Map {
            source: self,
            f: Rc::new(f),
            _output: PhantomData,
        }
    }

    /// Forward only the values for which `predicate` holds.
    fn filter<P>(self, predicate: P) -> Filter<Self, P>
    where
        P: Fn(&Self::Item) -> bool + 'static,
    {
        Filter {
            source: self,
            predicate: Rc::new(predicate),
        }
    }
}

impl<S: Signal> SignalExt for S {}

/// Signal returned by [`SignalExt::map`].
pub struct Map<S, F, U> {
    source: S,
    f: Rc<F>,
    _output: PhantomData<fn() -> U>,
}

impl<S, F, U> Signal for Map<S, F, U>
where
    S: Signal,
    U: 'static,
    F: Fn(&S::Item) -> U + 'static,
{
    type Item = U;

    fn subscribe_with(&self, callback: Callback<U>) -> Lifetime {
        let f = Rc::clone(&self.f);
        self.source
            .subscribe_with(Rc::new(move |value: &S::Item| callback(&f(value))))
    }
}

impl<S, F, U> SignalKind for Map<S, F, U>
where
    S: SignalKind,
    U: 'static,
    F: Fn(&S::Item) -> U + 'static,
{
    const FLAGS: SignalFlags = SignalFlags {
        tmps_only: false,
        ..S::FLAGS
    };
}

/// Signal returned by [`SignalExt::filter`].
pub struct Filter<S, P> {
    source: S,
    predicate: Rc<P>,
}

impl<S, P> Signal for Filter<S, P>
where
    S: Signal,
    P: Fn(&S::Item) -> bool + 'static,
{
    type Item = S::Item;

    fn subscribe_with(&self, callback: Callback<S::Item>) -> Lifetime {
        let predicate = Rc::clone(&self.predicate);
        self.source.subscribe_with(Rc::new(move |value: &S::Item| {
            if predicate(value) {
                callback(value);
            }
        }))
    }
}

impl<S, P> SignalKind for Filter<S, P>
where
    S: SignalKind,
    P: Fn(&S::Item) -> bool + 'static,
{
    const FLAGS: SignalFlags = SignalFlags {
        tmps_only: false,
        ..S::FLAGS
    };
}
