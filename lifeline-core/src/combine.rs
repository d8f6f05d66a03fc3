//! Combine Signal
//!
//! A combine signal derives one output stream from an ordered list of input
//! signals.
//!
//! # How It Works
//!
//! 1. Every input owns a slot, initially unset.
//!
//! 2. While warming up, an emission fills its slot. Repeated emissions on
//!    an already-filled slot only replace the value; readiness counts
//!    distinct filled slots.
//!
//! 3. The emission that fills the last slot switches the signal to the
//!    steady phase and is itself mapped and published.
//!
//! 4. In the steady phase every emission stores its value, runs the mapping
//!    over all slots and publishes the result, unless the mapping returns
//!    `None`.
//!
//! Inputs with memory replay into their slots as soon as the combine signal
//! subscribes to them, so a combine built over memory signals that already
//! hold values starts out warm.
//!
//! # Teardown
//!
//! The combine signal owns a lifetime. Every input subscription is a
//! dependent of it, so ending it unsubscribes from each input exactly once
//! and ends the combine signal's own subscribers.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::Rc;

use tracing::debug;

use crate::error::{Error, Result};
use crate::lifetime::Lifetime;
use crate::signal::{Callback, Emitter, Signal, SignalFlags, SignalKind};

/// Phase of a combine signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CombinePhase {
    /// Some input has not emitted yet. Nothing is published.
    WarmingUp,

    /// Every input has emitted. Each emission is mapped and published.
    Steady,
}

type Mapper<T, O> = Box<dyn Fn(&[T]) -> Option<O>>;

struct CombineState<T: 'static, O: 'static> {
    slots: RefCell<Vec<Option<T>>>,
    ready: Cell<usize>,
    phase: Cell<CombinePhase>,
    map: Mapper<T, O>,
    output: Emitter<O>,
    lifetime: Lifetime,
}

impl<T: Clone + 'static, O: 'static> CombineState<T, O> {
    fn receive(&self, slot: usize, value: &T) {
        if self.lifetime.is_ended() {
            return;
        }

        let values: Vec<T> = {
            let mut slots = self.slots.borrow_mut();
            let Some(entry) = slots.get_mut(slot) else {
                return;
            };
            let first_fill = entry.is_none();
            *entry = Some(value.clone());

            if self.phase.get() == CombinePhase::WarmingUp {
                if first_fill {
                    self.ready.set(self.ready.get() + 1);
                }
                if self.ready.get() < slots.len() {
                    return;
                }
                self.phase.set(CombinePhase::Steady);
                debug!(target: "lifeline::combine", inputs = slots.len(), "combine signal warmed up");
            }

            slots.iter().flatten().cloned().collect()
        };

        if let Some(result) = (self.map)(&values) {
            self.output.publish(&result);
        }
    }
}

/// Signal derived from N inputs with warm-up semantics.
///
/// Every input carries the same item type `T`. Inputs of different types
/// are brought to a common type first, e.g. with [`SignalExt::map`] into an
/// enum.
///
/// [`SignalExt::map`]: crate::signal::SignalExt::map
///
/// # Example
///
/// ```rust
/// use std::cell::RefCell;
/// use std::rc::Rc;
/// use lifeline_core::combine::CombineSignal;
/// use lifeline_core::signal::{Emitter, Signal};
///
/// let x = Emitter::<i32>::new();
/// let y = Emitter::<i32>::new();
/// let sum = CombineSignal::new(&[&x, &y], |v| Some(v[0] + v[1])).unwrap();
///
/// let seen = Rc::new(RefCell::new(Vec::new()));
/// let sink = seen.clone();
/// let _sub = sum.subscribe(move |s| sink.borrow_mut().push(*s));
///
/// x.publish(&2);
/// assert!(seen.borrow().is_empty());
/// y.publish(&3);
/// assert_eq!(*seen.borrow(), vec![5]);
/// ```
pub struct CombineSignal<T: 'static, O: 'static> {
    state: Rc<CombineState<T, O>>,
}

impl<T: Clone + 'static, O: 'static> CombineSignal<T, O> {
    /// Subscribe to `inputs` and derive values with `map`.
    ///
    /// `map` receives the latest value of every input, in input order. It
    /// returns `None` to skip publishing for that emission.
    ///
    /// # Errors
    ///
    /// [`Error::EmptyCombine`] if `inputs` is empty.
    pub fn new<F>(inputs: &[&dyn Signal<Item = T>], map: F) -> Result<Self>
    where
        F: Fn(&[T]) -> Option<O> + 'static,
    {
        if inputs.is_empty() {
            return Err(Error::EmptyCombine);
        }

        let output = Emitter::new();
        let lifetime = Lifetime::new();
        let closer = output.clone();
        lifetime.end_with(move || closer.close());

        let state = Rc::new(CombineState {
            slots: RefCell::new(vec![None; inputs.len()]),
            ready: Cell::new(0),
            phase: Cell::new(CombinePhase::WarmingUp),
            map: Box::new(map),
            output,
            lifetime,
        });

        for (slot, input) in inputs.iter().enumerate() {
            let receiver = Rc::clone(&state);
            let subscription = input.subscribe_with(Rc::new(move |value: &T| receiver.receive(slot, value)));
            lifetime.end_with(subscription);
        }

        Ok(Self { state })
    }

    /// Current phase.
    pub fn phase(&self) -> CombinePhase {
        self.state.phase.get()
    }

    /// Whether every input has emitted at least once.
    pub fn is_ready(&self) -> bool {
        self.phase() == CombinePhase::Steady
    }

    /// Number of inputs.
    pub fn arity(&self) -> usize {
        self.state.slots.borrow().len()
    }

    /// The combine signal's own lifetime.
    pub fn lifetime(&self) -> Lifetime {
        self.state.lifetime
    }

    /// Unsubscribe from every input and end every subscriber.
    pub fn end(&self) -> bool {
        self.state.lifetime.end()
    }
}

impl<T: Clone + 'static, O: 'static> Signal for CombineSignal<T, O> {
    type Item = O;

    fn subscribe_with(&self, callback: Callback<O>) -> Lifetime {
        if self.state.lifetime.is_ended() {
            return Lifetime::ended();
        }
        self.state.output.subscribe_with(callback)
    }
}

impl<T: Clone + 'static, O: 'static> SignalKind for CombineSignal<T, O> {
    const FLAGS: SignalFlags = SignalFlags::PLAIN;
}

impl<T: 'static, O: 'static> Clone for CombineSignal<T, O> {
    fn clone(&self) -> Self {
        Self {
            state: Rc::clone(&self.state),
        }
    }
}

impl<T: 'static, O: 'static> fmt::Debug for CombineSignal<T, O> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CombineSignal")
            .field("phase", &self.state.phase.get())
            .field("ready", &self.state.ready.get())
            .field("lifetime", &self.state.lifetime)
            .finish()
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
