//! Scope policy: the immutable configuration threaded down a scope tree.

use std::fmt;
use std::rc::Rc;

use crate::lifetime::Lifetime;

use super::Scope;

/// Hook applied to every frame before its scope is built.
pub type FrameHook = Rc<dyn Fn(Lifetime) -> Lifetime>;

/// Hook applied to the frame handed to the body, after the scope is built.
pub type ArgsHook = Rc<dyn Fn(Lifetime, &Scope) -> Lifetime>;

/// Configuration of a scope tree and every tree nested inside it.
///
/// A policy is a value: builders and [`ScopePolicy::merge`] return new
/// policies and never modify the receiver. Nested trees run with the merge
/// of their parent's policy and their own, parent hooks first.
#[derive(Clone, Default)]
pub struct ScopePolicy {
    label: Option<Rc<str>>,
    depth: usize,
    on_frame: Option<FrameHook>,
    transform_args: Option<ArgsHook>,
}

impl ScopePolicy {
    pub fn new() -> Self {
        Self::default()
    }

    /// Policy with `label` and no hooks.
    pub fn labelled(label: &str) -> Self {
        Self::default().with_label(label)
    }

    pub fn with_label(mut self, label: &str) -> Self {
        self.label = Some(Rc::from(label));
        self
    }

    /// Substitute each incoming frame, e.g. with a narrower child lifetime.
    ///
    /// A hook that returns an ended lifetime drops the frame.
    pub fn with_on_frame<F>(mut self, hook: F) -> Self
    where
        F: Fn(Lifetime) -> Lifetime + 'static,
    {
        self.on_frame = Some(Rc::new(hook));
        self
    }

    /// Rewrite the frame the body receives, with access to the frame's
    /// scope for registering what the substitute needs.
    pub fn with_transform_args<F>(mut self, hook: F) -> Self
    where
        F: Fn(Lifetime, &Scope) -> Lifetime + 'static,
    {
        self.transform_args = Some(Rc::new(hook));
        self
    }

    /// Label path from the root, segments joined with `/`.
    pub fn label(&self) -> Option<&str> {
        self.label.as_deref()
    }

    /// Nesting depth; a root tree has depth 0.
    pub fn depth(&self) -> usize {
        self.depth
    }

    pub fn has_hooks(&self) -> bool {
        self.on_frame.is_some() || self.transform_args.is_some()
    }

    /// Policy for a tree nested one level below `self`.
    ///
    /// Labels join as `parent/child`. Each hook composes as "parent, then
    /// child"; a missing hook on either side is the identity.
    pub fn merge(&self, child: &ScopePolicy) -> ScopePolicy {
        let label = match (&self.label, &child.label) {
            (Some(parent), Some(own)) => Some(Rc::from(format!("{parent}/{own}"))),
            (parent, own) => own.clone().or_else(|| parent.clone()),
        };

        let on_frame = match (&self.on_frame, &child.on_frame) {
            (Some(parent), Some(own)) => {
                let (parent, own) = (Rc::clone(parent), Rc::clone(own));
                Some(Rc::new(move |frame: Lifetime| own(parent(frame))) as FrameHook)
            }
            (parent, own) => own.clone().or_else(|| parent.clone()),
        };

        let transform_args = match (&self.transform_args, &child.transform_args) {
            (Some(parent), Some(own)) => {
                let (parent, own) = (Rc::clone(parent), Rc::clone(own));
                Some(Rc::new(move |frame: Lifetime, scope: &Scope| own(parent(frame, scope), scope)) as ArgsHook)
            }
            (parent, own) => own.clone().or_else(|| parent.clone()),
        };

        ScopePolicy {
            label,
            depth: self.depth + 1,
            on_frame,
            transform_args,
        }
    }

    pub(crate) fn apply_on_frame(&self, frame: Lifetime) -> Lifetime {
        match &self.on_frame {
            Some(hook) => hook(frame),
            None => frame,
        }
    }

    pub(crate) fn apply_transform_args(&self, frame: Lifetime, scope: &Scope) -> Lifetime {
        match &self.transform_args {
            Some(hook) => hook(frame, scope),
            None => frame,
        }
    }
}

impl fmt::Debug for ScopePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScopePolicy")
            .field("label", &self.label)
            .field("depth", &self.depth)
            .field("on_frame", &self.on_frame.is_some())
            .field("transform_args", &self.transform_args.is_some())
            .finish()
    }
}
