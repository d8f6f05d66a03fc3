//! Lifetimes
//!
//! A [`Lifetime`] is a cancellable handle. It starts active, ends exactly
//! once, and on ending runs its teardown actions in registration order
//! followed by its cleanup hook.
//!
//! # Joint ownership
//!
//! A lifetime registered on another through [`Lifetime::end_with`] is a
//! *dependent*: it ends when its owner ends, but it may also end first, in
//! which case it unlinks itself from every owner's teardown list. Nothing
//! is torn down twice and owners do not accumulate dead entries.
//!
//! # Representation
//!
//! Handles are `Copy` keys into a thread-local generational arena. A handle
//! whose slot has been vacated is ended, so teardown lists store handles
//! rather than owning pointers and a cycle of `end_with` registrations
//! cannot leak or recurse forever. Handles are `!Send`: a lifetime belongs
//! to the thread that created it.
//!
//! # Re-entrancy
//!
//! Ending a lifetime from inside one of its own teardown actions is not
//! supported. It is not guarded against either: the inner `end()` finds the
//! slot already vacated and returns `false`.

mod arena;
mod runtime;

use std::fmt;
use std::marker::PhantomData;

use arena::SlotKey;
use runtime::{Link, Runtime};

/// A cancellable handle with idempotent end and ordered teardown.
///
/// # Example
///
/// ```rust
/// use lifeline_core::lifetime::Lifetime;
///
/// let parent = Lifetime::new();
/// let child = parent.child();
/// parent.end_with(|| println!("parent ended"));
///
/// assert!(parent.end());
/// assert!(child.is_ended());
/// assert!(!parent.end());
/// ```
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Lifetime {
    key: SlotKey,
    _local: PhantomData<*const ()>,
}

/// One entry in a lifetime's teardown list.
pub enum Teardown {
    /// A closure run once when the owner ends.
    Action(Box<dyn FnOnce()>),
    /// A jointly owned lifetime ended when the owner ends.
    Dependent(Lifetime),
}

impl From<Lifetime> for Teardown {
    fn from(lifetime: Lifetime) -> Self {
        Teardown::Dependent(lifetime)
    }
}

impl<F> From<F> for Teardown
where
    F: FnOnce() + 'static,
{
    fn from(action: F) -> Self {
        Teardown::Action(Box::new(action))
    }
}

impl fmt::Debug for Teardown {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Teardown::Action(_) => f.write_str("Teardown::Action(..)"),
            Teardown::Dependent(lifetime) => f.debug_tuple("Teardown::Dependent").field(lifetime).finish(),
        }
    }
}

impl Lifetime {
    fn from_key(key: SlotKey) -> Self {
        Self {
            key,
            _local: PhantomData,
        }
    }

    pub(crate) fn key(&self) -> SlotKey {
        self.key
    }

    /// Create a new active lifetime.
    pub fn new() -> Self {
        Self::from_key(Runtime::alloc(None))
    }

    /// A lifetime that is already ended.
    pub fn ended() -> Self {
        Self::from_key(SlotKey::DANGLING)
    }

    /// Create a new active lifetime whose cleanup hook is `cleanup`.
    ///
    /// The hook runs once, after every registered teardown action.
    pub fn from_fn<F>(cleanup: F) -> Self
    where
        F: FnOnce() + 'static,
    {
        Self::from_key(Runtime::alloc(Some(Box::new(cleanup))))
    }

    /// Create a new lifetime that ends when this one ends.
    pub fn child(&self) -> Lifetime {
        let child = Lifetime::new();
        self.end_with(child);
        child
    }

    /// Whether the lifetime has not ended yet.
    pub fn is_active(&self) -> bool {
        Runtime::is_live(self.key)
    }

    /// Whether the lifetime has ended.
    pub fn is_ended(&self) -> bool {
        !self.is_active()
    }

    /// End the lifetime.
    ///
    /// Returns `true` if this call performed the transition and `false` if
    /// the lifetime had already ended. By the time this returns every
    /// teardown action (including the teardown of dependents, recursively)
    /// has run.
    ///
    /// If a teardown action panics the panic propagates. The lifetime is
    /// already ended at that point; the actions registered after the
    /// panicking one do not run.
    pub fn end(&self) -> bool {
        let Some(node) = Runtime::take(self.key) else {
            return false;
        };

        for entry in node.teardown {
            match entry {
                Teardown::Action(action) => action(),
                Teardown::Dependent(dependent) => {
                    dependent.end();
                }
            }
        }

        if let Some(cleanup) = node.cleanup {
            cleanup();
        }

        true
    }

    /// Register a teardown action or a dependent lifetime.
    ///
    /// If this lifetime has already ended the teardown runs immediately.
    /// Registering an ended dependent, the same dependent twice, or a
    /// lifetime on itself does nothing.
    pub fn end_with<T>(&self, teardown: T)
    where
        T: Into<Teardown>,
    {
        match teardown.into() {
            Teardown::Dependent(dependent) => {
                if dependent == *self {
                    return;
                }
                if Runtime::link(self.key, dependent) == Link::OwnerEnded {
                    dependent.end();
                }
            }
            action @ Teardown::Action(_) => {
                if let Err(Teardown::Action(action)) = Runtime::push_action(self.key, action) {
                    action();
                }
            }
        }
    }

    /// Register `action` and return a listener lifetime for it.
    ///
    /// Ending the listener detaches `action` without running it. If this
    /// lifetime has already ended, `action` runs immediately and the
    /// returned listener is ended.
    pub fn on_end<F>(&self, action: F) -> Lifetime
    where
        F: FnOnce() + 'static,
    {
        if self.is_ended() {
            action();
            return Lifetime::ended();
        }

        let owner = *self;
        let listener = Lifetime::from_fn(move || {
            if owner.is_ended() {
                action();
            }
        });
        self.end_with(listener);
        listener
    }

    /// Whether `dependent` is currently registered on this lifetime.
    pub fn owns(&self, dependent: Lifetime) -> bool {
        Runtime::is_linked(self.key, dependent.key)
    }

    /// Wrap the lifetime in a guard that ends it on drop.
    pub fn guard(self) -> EndOnDrop {
        EndOnDrop {
            lifetime: self,
            armed: true,
        }
    }

    /// Number of active lifetimes on the current thread.
    pub fn live_count() -> usize {
        Runtime::live_count()
    }
}

impl Default for Lifetime {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Lifetime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Lifetime({:?})", self.key)
    }
}

/// Ends the wrapped lifetime when dropped.
#[must_use = "dropping the guard ends the lifetime immediately"]
pub struct EndOnDrop {
    lifetime: Lifetime,
    armed: bool,
}

impl EndOnDrop {
    /// The guarded lifetime.
    pub fn lifetime(&self) -> Lifetime {
        self.lifetime
    }

    /// Give up the guard without ending the lifetime.
    pub fn disarm(mut self) -> Lifetime {
        self.armed = false;
        self.lifetime
    }
}

impl Drop for EndOnDrop {
    fn drop(&mut self) {
        if self.armed {
            self.lifetime.end();
        }
    }
}

impl fmt::Debug for EndOnDrop {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EndOnDrop")
            .field("lifetime", &self.lifetime)
            .field("armed", &self.armed)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    fn recorder() -> (Rc<RefCell<Vec<&'static str>>>, impl Fn(&'static str) -> Box<dyn FnOnce()>) {
        let log = Rc::new(RefCell::new(Vec::new()));
        let sink = log.clone();
        let make = move |tag: &'static str| {
            let sink = sink.clone();
            Box::new(move || sink.borrow_mut().push(tag)) as Box<dyn FnOnce()>
        };
        (log, make)
    }

    #[test]
    fn end_is_idempotent() {
        let (log, action) = recorder();
        let lifetime = Lifetime::new();
        lifetime.end_with(action("a"));

        assert!(lifetime.is_active());
        assert!(lifetime.end());
        assert!(!lifetime.end());
        assert!(lifetime.is_ended());
        assert_eq!(*log.borrow(), vec!["a"]);
    }

    #[test]
    fn teardown_runs_in_registration_order_then_cleanup() {
        let (log, action) = recorder();
        let lifetime = Lifetime::from_fn(action("cleanup"));
        lifetime.end_with(action("first"));
        lifetime.end_with(action("second"));
        lifetime.end_with(action("third"));

        lifetime.end();
        assert_eq!(*log.borrow(), vec!["first", "second", "third", "cleanup"]);
    }

    #[test]
    fn end_with_on_ended_lifetime_runs_immediately() {
        let (log, action) = recorder();
        let lifetime = Lifetime::new();
        lifetime.end();

        lifetime.end_with(action("late"));
        assert_eq!(*log.borrow(), vec!["late"]);

        let dependent = Lifetime::new();
        lifetime.end_with(dependent);
        assert!(dependent.is_ended());
    }

    #[test]
    fn dependent_ends_with_owner() {
        let owner = Lifetime::new();
        let dependent = owner.child();
        let grandchild = dependent.child();

        owner.end();
        assert!(dependent.is_ended());
        assert!(grandchild.is_ended());
    }

    #[test]
    fn dependent_ending_first_unlinks_from_owner() {
        let (log, action) = recorder();
        let owner = Lifetime::new();
        let dependent = Lifetime::from_fn(action("dependent"));
        owner.end_with(dependent);
        assert!(owner.owns(dependent));

        dependent.end();
        assert!(!owner.owns(dependent));

        owner.end();
        assert_eq!(*log.borrow(), vec!["dependent"]);
    }

    #[test]
    fn duplicate_dependent_registration_is_ignored() {
        let (log, action) = recorder();
        let owner = Lifetime::new();
        let dependent = Lifetime::from_fn(action("once"));
        owner.end_with(dependent);
        owner.end_with(dependent);

        owner.end();
        assert_eq!(*log.borrow(), vec!["once"]);
    }

    #[test]
    fn jointly_owned_dependent_ends_with_either_owner() {
        let a = Lifetime::new();
        let b = Lifetime::new();
        let shared = Lifetime::new();
        a.end_with(shared);
        b.end_with(shared);

        b.end();
        assert!(shared.is_ended());
        assert!(!a.owns(shared));
        assert!(a.is_active());
    }

    #[test]
    fn cycles_terminate() {
        let a = Lifetime::new();
        let b = Lifetime::new();
        a.end_with(b);
        b.end_with(a);

        assert!(a.end());
        assert!(b.is_ended());
        assert!(!b.end());
    }

    #[test]
    fn on_end_listener_detaches() {
        let (log, action) = recorder();
        let lifetime = Lifetime::new();
        let kept = lifetime.on_end(action("kept"));
        let dropped = lifetime.on_end(action("dropped"));

        dropped.end();
        lifetime.end();
        assert!(kept.is_ended());
        assert_eq!(*log.borrow(), vec!["kept"]);
    }

    #[test]
    fn on_end_of_ended_lifetime_runs_now() {
        let (log, action) = recorder();
        let listener = Lifetime::ended().on_end(action("now"));
        assert!(listener.is_ended());
        assert_eq!(*log.borrow(), vec!["now"]);
    }

    #[test]
    fn teardown_may_create_and_end_lifetimes() {
        let owner = Lifetime::new();
        let spawned = Rc::new(RefCell::new(None));
        let slot = spawned.clone();
        owner.end_with(move || {
            let fresh = Lifetime::new();
            fresh.end_with(Lifetime::new());
            *slot.borrow_mut() = Some(fresh);
        });

        owner.end();
        let fresh = spawned.borrow().expect("teardown ran");
        assert!(fresh.is_active());
        assert!(fresh.end());
    }

    #[test]
    fn guard_ends_on_drop_unless_disarmed() {
        let lifetime = Lifetime::new();
        {
            let _guard = lifetime.guard();
        }
        assert!(lifetime.is_ended());

        let kept = Lifetime::new();
        let released = kept.guard().disarm();
        assert_eq!(released, kept);
        assert!(kept.is_active());
        kept.end();
    }

    #[test]
    fn ended_handles_are_distinct_from_reused_slots() {
        let first = Lifetime::new();
        first.end();
        let second = Lifetime::new();

        assert!(first.is_ended());
        assert!(second.is_active());
        assert_ne!(first, second);
        second.end();
    }

    #[test]
    fn live_count_tracks_active_lifetimes() {
        let before = Lifetime::live_count();
        let owner = Lifetime::new();
        let _child = owner.child();
        assert_eq!(Lifetime::live_count(), before + 2);

        owner.end();
        assert_eq!(Lifetime::live_count(), before);
    }
}
