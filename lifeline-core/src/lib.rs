//! Lifeline Core
//!
//! This crate provides the single-threaded kernel of the Lifeline runtime.
//! It implements:
//!
//! - Lifetimes: cancellable handles with ordered teardown and joint ownership
//! - Push signals and their memory-bearing variants
//! - A two-phase combine signal
//! - An exclusive selector state machine
//! - Scope trees binding per-frame dependency sets to a frame signal
//!
//! Everything runs on the caller's thread. Publishing is synchronous and
//! re-entrant; nothing is buffered or scheduled.
//!
//! # Architecture
//!
//! The crate is organized into several modules:
//!
//! - `lifetime`: the arena-backed [`Lifetime`] handle
//! - `signal`: the [`Signal`] trait, capability flags and the plain [`Emitter`]
//! - `memory`: signals that retain values or lifetimes for late subscribers
//! - `combine`: [`CombineSignal`], N inputs with warm-up
//! - `selector`: [`ExclusiveSelector`], one active category at a time
//! - `scope`: [`ScopeTree`] and the [`ScopePolicy`] threaded through it
//! - `error`: construction-time contract violations
//!
//! # Example
//!
//! ```rust
//! use std::cell::Cell;
//! use std::rc::Rc;
//! use lifeline_core::{LatestLifetime, LatestValue, ScopeTree};
//!
//! let session = LatestLifetime::new();
//! let title = LatestValue::with_value(String::from("untitled"));
//! let renders = Rc::new(Cell::new(0));
//!
//! // Per session: follow the title until the session ends.
//! let (source, counter) = (title.clone(), renders.clone());
//! let _tree = ScopeTree::new(&session, move |_frame, scope| {
//!     let counter = counter.clone();
//!     scope.subscribe(&source, move |_| counter.set(counter.get() + 1));
//! });
//!
//! let login = session.open();
//! title.set(String::from("draft"));
//! login.end();
//! title.set(String::from("ignored"));
//!
//! // One replay on subscribe, one update.
//! assert_eq!(renders.get(), 2);
//! ```

pub mod combine;
pub mod error;
pub mod lifetime;
pub mod memory;
pub mod scope;
pub mod selector;
pub mod signal;

pub use combine::{CombinePhase, CombineSignal};
pub use error::{Error, Result};
pub use lifetime::{EndOnDrop, Lifetime, Teardown};
pub use memory::{Dedup, LatestLifetime, LatestValue, LatestValueMulti, LifetimeSet};
pub use scope::{Scope, ScopePolicy, ScopeTree};
pub use selector::ExclusiveSelector;
pub use signal::{Callback, Emitter, MemorySignal, Once, Signal, SignalExt, SignalFlags, SignalKind, TmpsSignal};
