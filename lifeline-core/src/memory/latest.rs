//! Latest-value memory signal.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use crate::lifetime::Lifetime;
use crate::signal::{Callback, MemorySignal, SharedList, Signal, SignalFlags, SignalKind, SubscriberList};

/// Equality used by [`LatestValue`] to suppress repeated values.
///
/// Only value-like types compare equal. The default method answers `false`,
/// which is what compound types should keep: a compound value may be the
/// same data mutated behind shared ownership, so a repeat must still notify.
///
/// ```rust
/// use lifeline_core::memory::Dedup;
///
/// #[derive(Clone)]
/// struct Settings { volume: u8 }
/// impl Dedup for Settings {}
/// ```
pub trait Dedup {
    /// Whether `other` is a repeat that need not be published.
    fn dedup_eq(&self, _other: &Self) -> bool {
        false
    }
}

macro_rules! dedup_by_value {
    ($($ty:ty),* $(,)?) => {
        $(
            impl Dedup for $ty {
                fn dedup_eq(&self, other: &Self) -> bool {
                    self == other
                }
            }
        )*
    };
}

dedup_by_value!(
    (), bool, char, u8, u16, u32, u64, u128, usize, i8, i16, i32, i64, i128, isize, f32, f64,
    String, &'static str, Rc<str>,
);

impl<T: Dedup> Dedup for Option<T> {
    fn dedup_eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Some(a), Some(b)) => a.dedup_eq(b),
            (None, None) => true,
            _ => false,
        }
    }
}

impl<T> Dedup for Rc<T> {}
impl<T> Dedup for Vec<T> {}

/// Memory signal holding the most recent value.
///
/// # Example
///
/// ```rust
/// use std::cell::RefCell;
/// use std::rc::Rc;
/// use lifeline_core::memory::LatestValue;
/// use lifeline_core::signal::Signal;
///
/// let volume = LatestValue::new();
/// volume.set(5u8);
/// volume.set(5u8);
///
/// let seen = Rc::new(RefCell::new(Vec::new()));
/// let sink = seen.clone();
/// let _sub = volume.subscribe(move |v| sink.borrow_mut().push(*v));
/// volume.set(7);
///
/// assert_eq!(*seen.borrow(), vec![5, 7]);
/// ```
pub struct LatestValue<T: 'static> {
    value: Rc<RefCell<Option<T>>>,
    subscribers: SharedList<T>,
}

impl<T> LatestValue<T>
where
    T: Clone + Dedup + 'static,
{
    /// Create an empty signal.
    pub fn new() -> Self {
        Self {
            value: Rc::new(RefCell::new(None)),
            subscribers: SubscriberList::shared(),
        }
    }

    /// Create a signal already holding `value`.
    pub fn with_value(value: T) -> Self {
        let signal = Self::new();
        *signal.value.borrow_mut() = Some(value);
        signal
    }

    /// Retain and publish `value`.
    ///
    /// Returns `false` without notifying when `value` is a [`Dedup`] repeat
    /// of the retained value.
    pub fn set(&self, value: T) -> bool {
        {
            let mut current = self.value.borrow_mut();
            if current.as_ref().map_or(false, |held| held.dedup_eq(&value)) {
                return false;
            }
            *current = Some(value.clone());
        }
        SubscriberList::notify(&self.subscribers, &value);
        true
    }

    /// The retained value.
    pub fn get(&self) -> Option<T> {
        self.value.borrow().clone()
    }

    /// Forget the retained value without notifying.
    pub fn clear(&self) -> Option<T> {
        self.value.borrow_mut().take()
    }

    /// Number of active subscriptions.
    pub fn subscriber_count(&self) -> usize {
        self.subscribers.borrow().len()
    }
}

impl<T> Signal for LatestValue<T>
where
    T: Clone + Dedup + 'static,
{
    type Item = T;

    fn subscribe_with(&self, callback: Callback<T>) -> Lifetime {
        let subscription = SubscriberList::attach(&self.subscribers, Rc::clone(&callback));
        if let Some(value) = self.get() {
            callback(&value);
        }
        subscription
    }
}

impl<T> SignalKind for LatestValue<T>
where
    T: Clone + Dedup + 'static,
{
    const FLAGS: SignalFlags = SignalFlags {
        memory: true,
        multi: false,
        tmps_only: false,
    };
}

impl<T> MemorySignal for LatestValue<T>
where
    T: Clone + Dedup + 'static,
{
    fn replay(&self, callback: &dyn Fn(&T)) {
        if let Some(value) = self.get() {
            callback(&value);
        }
    }
}

impl<T> Default for LatestValue<T>
where
    T: Clone + Dedup + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<T: 'static> Clone for LatestValue<T> {
    fn clone(&self) -> Self {
        Self {
            value: Rc::clone(&self.value),
            subscribers: Rc::clone(&self.subscribers),
        }
    }
}

impl<T: fmt::Debug + 'static> fmt::Debug for LatestValue<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LatestValue")
            .field("value", &self.value.borrow())
            .field("subscribers", &self.subscribers.borrow())
            .finish()
    }
}
