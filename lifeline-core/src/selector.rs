//! Exclusive Selector
//!
//! A fixed, ordered list of named categories of which exactly one is active
//! at a time. Each category is backed by a [`LatestLifetime`]; the active
//! category holds the lifetime of the current activation and every other
//! category holds nothing.
//!
//! # Transitions
//!
//! `choose(name, payload)`:
//!
//! 1. Choosing the active category again, with no payload or with the
//!    payload it already holds, does nothing.
//! 2. The previously active category is emptied. Its lifetime is ended only
//!    if the selector created it; a caller-supplied payload is released but
//!    left running.
//! 3. The new category receives `payload`, or a fresh lifetime owned by the
//!    selector.
//! 4. The name of the new category is published on the selector itself.
//!
//! # Re-triggering
//!
//! Choosing the active category with a *different* payload supersedes the
//! current activation: the old payload is ended, the selector passes through
//! its first category (the resting state, `"off"` in the boolean form) and
//! comes back. Observers therefore see the resting category fire and clear
//! once per distinct activation, and the selector publishes two names.
//! This holds for any number of categories: in `["idle", "editing",
//! "saving"]`, re-choosing `"editing"` with a new payload makes `"idle"`
//! fire and clear in between.
//!
//! # Nested choices
//!
//! A teardown or subscriber may call `choose` while a transition is in
//! progress. The nested choice takes effect and the interrupted one stops
//! without opening its category or publishing its name to the subscribers
//! it has not reached yet. At most one category holds a lifetime at any
//! point a caller can observe, and the last name every subscriber receives
//! is the active one.
//!
//! # Boolean form
//!
//! [`ExclusiveSelector::driven_by`] builds an `"off"`/`"on"` selector fed by
//! a lifetime-bearing signal: each received lifetime activates `"on"`, its
//! end returns the selector to `"off"`. Activations that arrive while one is
//! still being processed are queued and applied afterwards, latest wins.

use std::cell::Cell;
use std::fmt;
use std::rc::Rc;

use tracing::debug;

use crate::error::{Error, Result};
use crate::lifetime::Lifetime;
use crate::memory::LatestLifetime;
use crate::signal::{Callback, MemorySignal, SharedList, Signal, SignalFlags, SignalKind, SubscriberList, TmpsSignal};

const OFF: usize = 0;
const ON: usize = 1;

struct SelectorState {
    names: Vec<Rc<str>>,
    categories: Vec<LatestLifetime>,
    active: Cell<Option<usize>>,
    choices: SharedList<Rc<str>>,
    lifetime: Lifetime,
    /// Set while a driven activation is being applied.
    driving: Cell<bool>,
    /// Activation received while `driving` was set.
    pending: Cell<Option<Lifetime>>,
    /// Lifetime of the current driven activation.
    driven: Cell<Option<Lifetime>>,
    /// Bumped by every transition.
    epoch: Cell<u64>,
}

/// Clears the driving flag and any queued activation, also on unwind.
struct DriveGuard<'a> {
    state: &'a SelectorState,
}

impl Drop for DriveGuard<'_> {
    fn drop(&mut self) {
        self.state.driving.set(false);
        self.state.pending.set(None);
    }
}

impl SelectorState {
    fn index_of(&self, name: &str) -> Result<usize> {
        self.names
            .iter()
            .position(|candidate| &**candidate == name)
            .ok_or_else(|| Error::UnknownCategory { name: name.to_owned() })
    }

    fn choose(&self, index: usize, payload: Option<Lifetime>) -> Lifetime {
        if self.active.get() != Some(index) {
            return self.transition(index, payload).unwrap_or_else(|| self.settled(index));
        }

        let held = self.categories[index].current();
        match payload {
            Some(next) if next.is_active() && held != Some(next) => self.retrigger(index, next),
            _ => held.unwrap_or_else(Lifetime::ended),
        }
    }

    fn retrigger(&self, index: usize, next: Lifetime) -> Lifetime {
        debug!(target: "lifeline::selector", category = %self.names[index], "selector re-triggered");

        let epoch = self.epoch.get();
        if let Some(superseded) = self.categories[index].clear() {
            superseded.end();
        }
        if self.epoch.get() != epoch {
            return self.settled(index);
        }
        if index != OFF && self.transition(OFF, None).is_none() {
            return self.settled(index);
        }
        self.transition(index, Some(next)).unwrap_or_else(|| self.settled(index))
    }

    /// Move to `index`. Returns `None` if a teardown or subscriber chose
    /// again before this transition finished; the nested choice stands and
    /// this one stops where it was.
    fn transition(&self, index: usize, payload: Option<Lifetime>) -> Option<Lifetime> {
        let epoch = self.epoch.get().wrapping_add(1);
        self.epoch.set(epoch);

        let previous = self.active.replace(Some(index));
        if let Some(previous) = previous.filter(|previous| *previous != index) {
            self.categories[previous].clear();
            if self.epoch.get() != epoch {
                return None;
            }
        }

        debug!(
            target: "lifeline::selector",
            from = previous.map(|i| &*self.names[i]),
            to = %self.names[index],
            "selector transition"
        );

        let category = &self.categories[index];
        let lifetime = match payload {
            Some(payload) => {
                category.set(payload);
                payload
            }
            None => category.open(),
        };
        if self.epoch.get() != epoch {
            return None;
        }

        let name = Rc::clone(&self.names[index]);
        SubscriberList::notify_while(&self.choices, &name, || self.epoch.get() == epoch);
        (self.epoch.get() == epoch).then_some(lifetime)
    }

    /// What `choose(index)` returns after a nested choice overtook it.
    fn settled(&self, index: usize) -> Lifetime {
        match self.active.get() {
            Some(active) if active == index => {
                self.categories[index].current().unwrap_or_else(Lifetime::ended)
            }
            _ => Lifetime::ended(),
        }
    }

    fn activate(self: &Rc<Self>, activation: Lifetime) {
        if activation.is_ended() || self.lifetime.is_ended() {
            return;
        }
        if self.driving.get() {
            self.pending.set(Some(activation));
            return;
        }

        self.driving.set(true);
        let _guard = DriveGuard { state: self };

        let mut next = Some(activation);
        while let Some(activation) = next.take() {
            if activation.is_active() {
                self.driven.set(Some(activation));
                self.choose(ON, Some(activation));

                let state = Rc::clone(self);
                let listener = activation.on_end(move || state.deactivate(activation));
                self.lifetime.end_with(listener);
            }
            next = self.pending.take();
        }
    }

    fn deactivate(&self, activation: Lifetime) {
        if self.driven.get() != Some(activation) || self.lifetime.is_ended() {
            return;
        }
        self.driven.set(None);
        if self.active.get() == Some(ON) {
            self.transition(OFF, None);
        }
    }
}

/// Named-category state machine with at most one active category.
///
/// The selector is itself a memory signal of category names: subscribers
/// receive the active name on subscribe and every subsequent choice.
///
/// # Example
///
/// ```rust
/// use lifeline_core::lifetime::Lifetime;
/// use lifeline_core::selector::ExclusiveSelector;
///
/// let mode = ExclusiveSelector::new(&["idle", "editing", "saving"]).unwrap();
/// let editing = mode.choose("editing", None).unwrap();
/// mode.choose("saving", None).unwrap();
///
/// assert!(editing.is_ended());
/// assert_eq!(mode.active().as_deref(), Some("saving"));
/// ```
pub struct ExclusiveSelector {
    state: Rc<SelectorState>,
}

impl ExclusiveSelector {
    /// Build a selector over `names`. No category is active yet.
    ///
    /// # Errors
    ///
    /// [`Error::TooFewCategories`] for fewer than two names and
    /// [`Error::DuplicateCategory`] for a repeated name.
    pub fn new(names: &[&str]) -> Result<Self> {
        if names.len() < 2 {
            return Err(Error::TooFewCategories { given: names.len() });
        }
        for (i, name) in names.iter().enumerate() {
            if names[..i].contains(name) {
                return Err(Error::DuplicateCategory {
                    name: (*name).to_owned(),
                });
            }
        }

        let categories: Vec<LatestLifetime> = names.iter().map(|_| LatestLifetime::new()).collect();
        let choices = SubscriberList::shared();
        let lifetime = Lifetime::new();

        let owned = categories.clone();
        let observers = Rc::clone(&choices);
        lifetime.end_with(move || {
            for category in &owned {
                category.clear();
            }
            SubscriberList::close(&observers);
        });

        Ok(Self {
            state: Rc::new(SelectorState {
                names: names.iter().map(|name| Rc::from(*name)).collect(),
                categories,
                active: Cell::new(None),
                choices,
                lifetime,
                driving: Cell::new(false),
                pending: Cell::new(None),
                driven: Cell::new(None),
                epoch: Cell::new(0),
            }),
        })
    }

    /// Build an `"off"`/`"on"` selector driven by `signal`.
    ///
    /// The selector starts in `"off"`. Every lifetime `signal` publishes
    /// activates `"on"` with that lifetime as payload; when it ends the
    /// selector returns to `"off"`. A new activation while `"on"` re-triggers
    /// through `"off"`.
    pub fn driven_by<S>(signal: &S) -> Result<Self>
    where
        S: TmpsSignal + ?Sized,
    {
        let selector = Self::new(&["off", "on"])?;
        selector.state.transition(OFF, None);

        let state = Rc::clone(&selector.state);
        let subscription = signal.subscribe_with(Rc::new(move |activation: &Lifetime| state.activate(*activation)));
        selector.state.lifetime.end_with(subscription);

        Ok(selector)
    }

    /// Make `name` the active category.
    ///
    /// Returns the lifetime now held by the category: `payload` if given,
    /// otherwise a lifetime created and owned by the selector.
    ///
    /// # Errors
    ///
    /// [`Error::UnknownCategory`] if `name` is not a category and
    /// [`Error::SelectorEnded`] once the selector has ended.
    pub fn choose(&self, name: &str, payload: Option<Lifetime>) -> Result<Lifetime> {
        if self.state.lifetime.is_ended() {
            return Err(Error::SelectorEnded);
        }
        let index = self.state.index_of(name)?;
        Ok(self.state.choose(index, payload))
    }

    /// The memory signal backing category `name`.
    pub fn category(&self, name: &str) -> Option<LatestLifetime> {
        let index = self.state.index_of(name).ok()?;
        Some(self.state.categories[index].clone())
    }

    /// Name of the active category.
    pub fn active(&self) -> Option<Rc<str>> {
        self.state.active.get().map(|index| Rc::clone(&self.state.names[index]))
    }

    /// Category names in declaration order.
    pub fn names(&self) -> &[Rc<str>] {
        &self.state.names
    }

    /// The selector's own lifetime.
    pub fn lifetime(&self) -> Lifetime {
        self.state.lifetime
    }

    /// Stop the selector: detach from a driving signal, end the lifetime
    /// held by the active category if the selector created it, and end
    /// every name subscription.
    pub fn end(&self) -> bool {
        self.state.lifetime.end()
    }
}

impl Signal for ExclusiveSelector {
    type Item = Rc<str>;

    fn subscribe_with(&self, callback: Callback<Rc<str>>) -> Lifetime {
        if self.state.lifetime.is_ended() {
            return Lifetime::ended();
        }
        let subscription = SubscriberList::attach(&self.state.choices, Rc::clone(&callback));
        if let Some(name) = self.active() {
            callback(&name);
        }
        subscription
    }
}

impl SignalKind for ExclusiveSelector {
    const FLAGS: SignalFlags = SignalFlags {
        memory: true,
        multi: false,
        tmps_only: false,
    };
}

impl MemorySignal for ExclusiveSelector {
    fn replay(&self, callback: &dyn Fn(&Rc<str>)) {
        if let Some(name) = self.active() {
            callback(&name);
        }
    }
}

impl Clone for ExclusiveSelector {
    fn clone(&self) -> Self {
        Self {
            state: Rc::clone(&self.state),
        }
    }
}

impl fmt::Debug for ExclusiveSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExclusiveSelector")
            .field("names", &self.state.names)
            .field("active", &self.active())
            .field("lifetime", &self.state.lifetime)
            .finish()
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::{LatestLifetime, LifetimeSet};
    use std::cell::RefCell;

    fn names_seen(selector: &ExclusiveSelector) -> (Rc<RefCell<Vec<String>>>, Lifetime) {
        let seen = Rc::new(RefCell::new(Vec::new()));
        let sink = seen.clone();
        let subscription = selector.subscribe(move |name| sink.borrow_mut().push(name.to_string()));
        (seen, subscription)
    }

    fn holders(selector: &ExclusiveSelector) -> usize {
        selector
            .names()
            .iter()
            .filter(|name| selector.category(name).and_then(|c| c.current()).is_some())
            .count()
    }

    #[test]
    fn construction_contracts() {
        assert_eq!(
            ExclusiveSelector::new(&["only"]).err(),
            Some(Error::TooFewCategories { given: 1 })
        );
        assert_eq!(
            ExclusiveSelector::new(&["a", "b", "a"]).err(),
            Some(Error::DuplicateCategory { name: "a".into() })
        );
        let selector = ExclusiveSelector::new(&["a", "b"]).unwrap();
        assert_eq!(
            selector.choose("c", None).err(),
            Some(Error::UnknownCategory { name: "c".into() })
        );
        assert!(selector.active().is_none());
    }

    #[test]
    fn choosing_ends_selector_created_lifetime() {
        let selector = ExclusiveSelector::new(&["a", "b", "c"]).unwrap();
        let a = selector.choose("a", None).unwrap();
        let b = selector.choose("b", None).unwrap();

        assert!(a.is_ended());
        assert!(b.is_active());
        assert_eq!(holders(&selector), 1);
    }

    #[test]
    fn external_payload_is_released_not_ended() {
        let selector = ExclusiveSelector::new(&["off", "on"]).unwrap();
        let external = Lifetime::new();
        selector.choose("on", Some(external)).unwrap();
        selector.choose("off", None).unwrap();

        assert!(external.is_active());
        assert_eq!(selector.category("on").unwrap().current(), None);
        external.end();
    }

    #[test]
    fn choosing_active_category_is_a_noop() {
        let selector = ExclusiveSelector::new(&["a", "b"]).unwrap();
        let (seen, _sub) = names_seen(&selector);
        let first = selector.choose("a", None).unwrap();
        let again = selector.choose("a", None).unwrap();

        assert_eq!(first, again);
        assert!(first.is_active());
        assert_eq!(*seen.borrow(), vec!["a"]);

        let payload = Lifetime::new();
        selector.choose("b", Some(payload)).unwrap();
        selector.choose("b", Some(payload)).unwrap();
        assert_eq!(*seen.borrow(), vec!["a", "b"]);
    }

    #[test]
    fn retrigger_passes_through_off() {
        let selector = ExclusiveSelector::new(&["off", "on"]).unwrap();
        let off_fired = Rc::new(RefCell::new(Vec::new()));
        let sink = off_fired.clone();
        let _off = selector
            .category("off")
            .unwrap()
            .subscribe(move |lt| sink.borrow_mut().push(*lt));

        let a = Lifetime::new();
        let b = Lifetime::new();
        selector.choose("on", Some(a)).unwrap();
        let (seen, _sub) = names_seen(&selector);
        selector.choose("on", Some(b)).unwrap();

        assert!(a.is_ended());
        assert!(b.is_active());
        assert_eq!(off_fired.borrow().len(), 1);
        assert!(off_fired.borrow()[0].is_ended());
        assert_eq!(*seen.borrow(), vec!["on", "off", "on"]);
        assert_eq!(selector.category("on").unwrap().current(), Some(b));
        b.end();
    }

    #[test]
    fn at_most_one_category_holds_a_lifetime() {
        let selector = ExclusiveSelector::new(&["a", "b", "c"]).unwrap();
        let external = Lifetime::new();
        let script: [(&str, Option<Lifetime>); 6] = [
            ("a", None),
            ("b", Some(external)),
            ("b", None),
            ("c", None),
            ("a", None),
            ("b", Some(Lifetime::new())),
        ];
        for (name, payload) in script {
            selector.choose(name, payload).unwrap();
            assert!(holders(&selector) <= 1);
        }
    }

    #[test]
    fn choosing_from_a_teardown_leaves_one_holder() {
        let selector = ExclusiveSelector::new(&["a", "b", "c"]).unwrap();
        let a = selector.choose("a", None).unwrap();
        let nested = selector.clone();
        a.end_with(move || {
            nested.choose("c", None).unwrap();
        });

        let b = selector.choose("b", None).unwrap();

        assert_eq!(selector.active().as_deref(), Some("c"));
        assert_eq!(holders(&selector), 1);
        assert!(b.is_ended());
        assert_eq!(selector.category("b").unwrap().current(), None);
        assert!(selector.category("c").unwrap().current().is_some());
    }

    #[test]
    fn choosing_from_a_name_subscriber_wins() {
        let selector = ExclusiveSelector::new(&["idle", "busy"]).unwrap();
        let redirect = selector.clone();
        let _guard = selector.subscribe(move |name| {
            if &**name == "busy" {
                redirect.choose("idle", None).unwrap();
            }
        });
        let (seen, _sub) = names_seen(&selector);

        let busy = selector.choose("busy", None).unwrap();

        assert!(busy.is_ended());
        assert_eq!(selector.active().as_deref(), Some("idle"));
        assert_eq!(holders(&selector), 1);
        assert_eq!(*seen.borrow(), vec!["idle"]);
    }

    #[test]
    fn retrigger_in_wider_selector_passes_through_first_category() {
        let selector = ExclusiveSelector::new(&["idle", "editing", "saving"]).unwrap();
        let idle_fired = Rc::new(Cell::new(0));
        let counter = idle_fired.clone();
        let _idle = selector
            .category("idle")
            .unwrap()
            .subscribe(move |_| counter.set(counter.get() + 1));

        let first = Lifetime::new();
        let second = Lifetime::new();
        selector.choose("editing", Some(first)).unwrap();
        assert_eq!(idle_fired.get(), 0);

        selector.choose("editing", Some(second)).unwrap();
        assert!(first.is_ended());
        assert_eq!(idle_fired.get(), 1);
        assert_eq!(selector.category("idle").unwrap().current(), None);
        assert_eq!(selector.active().as_deref(), Some("editing"));
        second.end();
    }

    #[test]
    fn late_subscriber_gets_active_name() {
        let selector = ExclusiveSelector::new(&["a", "b"]).unwrap();
        selector.choose("b", None).unwrap();
        let (seen, _sub) = names_seen(&selector);
        assert_eq!(*seen.borrow(), vec!["b"]);
    }

    #[test]
    fn end_releases_everything() {
        let selector = ExclusiveSelector::new(&["a", "b"]).unwrap();
        let owned = selector.choose("a", None).unwrap();
        let (_seen, subscription) = names_seen(&selector);

        assert!(selector.end());
        assert!(owned.is_ended());
        assert!(subscription.is_ended());
        assert_eq!(selector.choose("b", None).err(), Some(Error::SelectorEnded));
    }

    #[test]
    fn driven_selector_follows_activations() {
        let source = LatestLifetime::new();
        let selector = ExclusiveSelector::driven_by(&source).unwrap();
        let (seen, _sub) = names_seen(&selector);
        assert_eq!(selector.active().as_deref(), Some("off"));

        let first = source.open();
        assert_eq!(selector.active().as_deref(), Some("on"));

        first.end();
        assert_eq!(selector.active().as_deref(), Some("off"));
        assert_eq!(*seen.borrow(), vec!["off", "on", "off"]);
    }

    #[test]
    fn driven_selector_retriggers_on_overlapping_activation() {
        let source = LifetimeSet::new();
        let selector = ExclusiveSelector::driven_by(&source).unwrap();
        let (seen, _sub) = names_seen(&selector);

        let first = Lifetime::new();
        let second = Lifetime::new();
        source.insert(first);
        source.insert(second);

        assert!(first.is_ended());
        assert_eq!(selector.category("on").unwrap().current(), Some(second));
        assert_eq!(*seen.borrow(), vec!["off", "on", "off", "on"]);

        second.end();
        assert_eq!(selector.active().as_deref(), Some("off"));
    }

    #[test]
    fn activation_from_inside_a_transition_is_queued() {
        let source = LifetimeSet::new();
        let selector = ExclusiveSelector::driven_by(&source).unwrap();
        let nested = Lifetime::new();

        let feeder = source.clone();
        let fired = Rc::new(Cell::new(false));
        let once = fired.clone();
        let _hook = selector.category("on").unwrap().subscribe(move |_| {
            if !once.replace(true) {
                feeder.insert(nested);
            }
        });

        let outer = Lifetime::new();
        source.insert(outer);

        assert_eq!(selector.category("on").unwrap().current(), Some(nested));
        assert!(outer.is_ended());
        nested.end();
        assert_eq!(selector.active().as_deref(), Some("off"));
    }

    #[test]
    fn ending_driven_selector_detaches_from_source() {
        let source = LatestLifetime::new();
        let selector = ExclusiveSelector::driven_by(&source).unwrap();
        assert_eq!(source.subscriber_count(), 1);

        selector.end();
        assert_eq!(source.subscriber_count(), 0);
        source.open();
        assert_eq!(selector.active().as_deref(), Some("off"));
    }
}
