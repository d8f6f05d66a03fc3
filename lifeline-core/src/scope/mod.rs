//! Scope Trees
//!
//! A [`ScopeTree`] binds an upstream signal of *frame* lifetimes to a body.
//! Each frame gets its own dependency set, and everything registered in it
//! is torn down together when the frame ends or the tree ends, whichever
//! comes first.
//!
//! # Frame Lifecycle
//!
//! ```text
//! frame arrives ──► on_frame hook ──► deps allocated ──► transform_args ──► body
//!                                          │
//!                 frame ends / tree ends ──┴──► every dependency ended
//! ```
//!
//! The dependency set is itself a [`Lifetime`], registered as a dependent of
//! both the frame and the tree. Registering on it after it has ended ends the
//! registration on the spot, so a body that outlives its frame cannot leak.
//!
//! # Nesting
//!
//! [`Scope::nest`] builds a child tree that runs with the parent's policy
//! merged with its own, and registers the child tree as a dependency of the
//! current frame. Tearing down a frame therefore tears down every tree
//! nested under it, depth-first.

mod policy;

use std::cell::Cell;
use std::fmt;
use std::rc::Rc;

use tracing::{debug, trace};

use crate::lifetime::{Lifetime, Teardown};
use crate::signal::Signal;

pub use policy::{ArgsHook, FrameHook, ScopePolicy};

type Body = Rc<dyn Fn(Lifetime, &Scope)>;

struct TreeState {
    lifetime: Lifetime,
    policy: ScopePolicy,
    frames: Cell<u64>,
}

impl TreeState {
    fn enter(&self, frame: Lifetime, body: &Body) {
        if self.lifetime.is_ended() || frame.is_ended() {
            return;
        }

        let upstream = frame;
        let frame = self.policy.apply_on_frame(upstream);
        if frame.is_ended() {
            return;
        }

        let deps = Lifetime::new();
        upstream.end_with(deps);
        frame.end_with(deps);
        self.lifetime.end_with(deps);

        let seq = self.frames.get() + 1;
        self.frames.set(seq);
        debug!(
            target: "lifeline::scope",
            label = self.policy.label(),
            depth = self.policy.depth(),
            frame = ?frame,
            seq,
            "scope frame entered"
        );

        let label = self.policy.label().map(str::to_owned);
        deps.end_with(move || {
            debug!(target: "lifeline::scope", label = label.as_deref(), seq, "scope frame torn down");
        });

        let scope = Scope {
            frame,
            deps,
            policy: self.policy.clone(),
        };
        let args = self.policy.apply_transform_args(frame, &scope);
        body(args, &scope);
    }
}

/// Per-frame dependency manager bound to an upstream signal of lifetimes.
///
/// # Example
///
/// ```rust
/// use std::cell::Cell;
/// use std::rc::Rc;
/// use lifeline_core::memory::LatestLifetime;
/// use lifeline_core::scope::ScopeTree;
///
/// let mounted = LatestLifetime::new();
/// let released = Rc::new(Cell::new(0));
///
/// let counter = released.clone();
/// let tree = ScopeTree::new(&mounted, move |_frame, scope| {
///     let counter = counter.clone();
///     scope.add(move || counter.set(counter.get() + 1));
/// });
///
/// mounted.open();
/// mounted.open();
/// assert_eq!(released.get(), 1);
///
/// tree.end();
/// assert_eq!(released.get(), 2);
/// ```
pub struct ScopeTree {
    state: Rc<TreeState>,
}

impl ScopeTree {
    /// Bind `body` to every frame `upstream` publishes, with the default
    /// policy.
    pub fn new<S, F>(upstream: &S, body: F) -> Self
    where
        S: Signal<Item = Lifetime> + ?Sized,
        F: Fn(Lifetime, &Scope) + 'static,
    {
        Self::with_policy(upstream, ScopePolicy::default(), body)
    }

    /// Bind `body` to every frame `upstream` publishes, under `policy`.
    ///
    /// A memory upstream that already holds a frame runs the body before
    /// this returns.
    pub fn with_policy<S, F>(upstream: &S, policy: ScopePolicy, body: F) -> Self
    where
        S: Signal<Item = Lifetime> + ?Sized,
        F: Fn(Lifetime, &Scope) + 'static,
    {
        let state = Rc::new(TreeState {
            lifetime: Lifetime::new(),
            policy,
            frames: Cell::new(0),
        });

        let body: Body = Rc::new(body);
        let receiver = Rc::clone(&state);
        let subscription = upstream.subscribe_with(Rc::new(move |frame: &Lifetime| receiver.enter(*frame, &body)));
        state.lifetime.end_with(subscription);

        trace!(target: "lifeline::scope", label = state.policy.label(), "scope tree bound");
        Self { state }
    }

    /// The tree's own lifetime.
    pub fn lifetime(&self) -> Lifetime {
        self.state.lifetime
    }

    pub fn policy(&self) -> &ScopePolicy {
        &self.state.policy
    }

    /// Number of frames the body has been run for.
    pub fn frame_count(&self) -> u64 {
        self.state.frames.get()
    }

    pub fn is_active(&self) -> bool {
        self.state.lifetime.is_active()
    }

    /// Unsubscribe from upstream and tear down the current frame.
    pub fn end(&self) -> bool {
        self.state.lifetime.end()
    }
}

impl Clone for ScopeTree {
    fn clone(&self) -> Self {
        Self {
            state: Rc::clone(&self.state),
        }
    }
}

impl fmt::Debug for ScopeTree {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScopeTree")
            .field("policy", &self.state.policy)
            .field("frames", &self.state.frames.get())
            .field("lifetime", &self.state.lifetime)
            .finish()
    }
}

/// Dependency registration handle for one frame.
pub struct Scope {
    frame: Lifetime,
    deps: Lifetime,
    policy: ScopePolicy,
}

impl Scope {
    /// The frame this scope belongs to, after the `on_frame` hook.
    pub fn frame(&self) -> Lifetime {
        self.frame
    }

    /// Lifetime of the dependency set. Ends when the frame is torn down.
    pub fn lifetime(&self) -> Lifetime {
        self.deps
    }

    pub fn policy(&self) -> &ScopePolicy {
        &self.policy
    }

    /// Whether the frame has not been torn down yet.
    pub fn is_active(&self) -> bool {
        self.deps.is_active()
    }

    /// Register a dependency: a teardown closure or a lifetime.
    ///
    /// Closures are wrapped in a lifetime, which is returned so the caller
    /// can end it early; a lifetime is returned as-is. Ended lifetimes and
    /// repeat registrations are ignored. If the frame has already been torn
    /// down the dependency is ended immediately.
    pub fn add<T>(&self, dependency: T) -> Lifetime
    where
        T: Into<Teardown>,
    {
        let lifetime = match dependency.into() {
            Teardown::Dependent(lifetime) => lifetime,
            Teardown::Action(action) => Lifetime::from_fn(action),
        };
        self.deps.end_with(lifetime);
        lifetime
    }

    /// Subscribe to `signal` for the duration of the frame.
    pub fn subscribe<S, F>(&self, signal: &S, callback: F) -> Lifetime
    where
        S: Signal + ?Sized,
        F: Fn(&S::Item) + 'static,
    {
        if !self.is_active() {
            return Lifetime::ended();
        }
        self.add(signal.subscribe_with(Rc::new(callback)))
    }

    /// Build a child tree over `upstream` that lives as long as this frame.
    pub fn nest<S, F>(&self, upstream: &S, body: F) -> ScopeTree
    where
        S: Signal<Item = Lifetime> + ?Sized,
        F: Fn(Lifetime, &Scope) + 'static,
    {
        self.nest_with(upstream, ScopePolicy::default(), body)
    }

    /// Like [`Scope::nest`], merging `policy` under this scope's policy.
    pub fn nest_with<S, F>(&self, upstream: &S, policy: ScopePolicy, body: F) -> ScopeTree
    where
        S: Signal<Item = Lifetime> + ?Sized,
        F: Fn(Lifetime, &Scope) + 'static,
    {
        let tree = ScopeTree::with_policy(upstream, self.policy.merge(&policy), body);
        self.add(tree.lifetime());
        tree
    }
}

impl fmt::Debug for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Scope")
            .field("frame", &self.frame)
            .field("deps", &self.deps)
            .field("label", &self.policy.label())
            .finish()
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
