//! Variable environments.
//!
//! [`Bindings`] is the read-only base a caller hands to a render: named
//! values stored eagerly ("static") or recomputed on every lookup
//! ("dynamic").  [`Scope`] decorates any [`Environment`] with the shadowing
//! stack used for let-bindings and loop variables.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::value::Value;

/// Read-only name → value resolution.
pub trait Environment {
    fn lookup(&self, name: &str) -> Option<Value>;
}

// ── Bindings ──────────────────────────────────────────────────────────────────

type Supplier = Arc<dyn Fn() -> Value + Send + Sync>;

#[derive(Clone)]
enum Binding {
    Static(Value),
    Dynamic(Supplier),
}

/// Base variable store.
///
/// A name holds either a static or a dynamic binding, never both:
/// registering one kind replaces the other.
#[derive(Clone, Default)]
pub struct Bindings {
    vars: HashMap<String, Binding>,
}

impl fmt::Debug for Bindings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<_> = self.vars.keys().collect();
        names.sort();
        f.debug_struct("Bindings").field("names", &names).finish()
    }
}

impl Bindings {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind `name` to a stored value.
    pub fn set_static(&mut self, name: impl Into<String>, value: impl Into<Value>) {
        self.vars.insert(name.into(), Binding::Static(value.into()));
    }

    /// Bind `name` to a supplier invoked on every lookup.
    pub fn set_dynamic<F>(&mut self, name: impl Into<String>, supplier: F)
    where
        F: Fn() -> Value + Send + Sync + 'static,
    {
        self.vars.insert(name.into(), Binding::Dynamic(Arc::new(supplier)));
    }

    /// Builder form of [`Bindings::set_static`].
    pub fn with(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.set_static(name, value);
        self
    }

    /// Remove a binding.  Returns `true` if it existed.
    pub fn remove(&mut self, name: &str) -> bool {
        self.vars.remove(name).is_some()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.vars.contains_key(name)
    }

    /// Returns `true` if `name` is bound to a supplier.
    pub fn is_dynamic(&self, name: &str) -> bool {
        matches!(self.vars.get(name), Some(Binding::Dynamic(_)))
    }

    /// Copy every binding of `other` over this store.
    pub fn extend(&mut self, other: &Bindings) {
        for (name, binding) in &other.vars {
            self.vars.insert(name.clone(), binding.clone());
        }
    }

    pub fn len(&self) -> usize {
        self.vars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vars.is_empty()
    }
}

impl Environment for Bindings {
    fn lookup(&self, name: &str) -> Option<Value> {
        match self.vars.get(name)? {
            Binding::Static(v) => Some(v.clone()),
            Binding::Dynamic(supplier) => Some(supplier()),
        }
    }
}

/// Two environments stacked: `top` wins, `base` fills in.
#[derive(Clone, Copy)]
pub struct Layered<'a> {
    pub top: &'a dyn Environment,
    pub base: &'a dyn Environment,
}

impl Environment for Layered<'_> {
    fn lookup(&self, name: &str) -> Option<Value> {
        self.top.lookup(name).or_else(|| self.base.lookup(name))
    }
}

// ── Scope ─────────────────────────────────────────────────────────────────────

/// Position in a [`Scope`]'s frame arena, for bulk rollback.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Mark(usize);

/// Shadowing stack over a base environment.
///
/// Frames live in one arena, newest last.  A lookup takes the newest frame
/// for the name, so each name behaves as its own stack; a name with no
/// frame falls through to the base.
pub struct Scope<'a> {
    base: &'a dyn Environment,
    frames: Vec<(String, Value)>,
}

impl fmt::Debug for Scope<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Scope").field("frames", &self.frames).finish()
    }
}

impl<'a> Scope<'a> {
    pub fn new(base: &'a dyn Environment) -> Self {
        Self {
            base,
            frames: Vec::new(),
        }
    }

    /// Shadow `name` with a new frame.
    pub fn push(&mut self, name: &str, value: Value) {
        self.frames.push((name.to_owned(), value));
    }

    /// Replace the value in `name`'s newest frame, pushing one if the name
    /// has no active frame.
    pub fn update(&mut self, name: &str, value: Value) {
        match self.frames.iter_mut().rev().find(|(n, _)| n == name) {
            Some((_, slot)) => *slot = value,
            None => self.push(name, value),
        }
    }

    /// Remove `name`'s newest frame, returning its value.
    pub fn pop(&mut self, name: &str) -> Option<Value> {
        let idx = self.frames.iter().rposition(|(n, _)| n == name)?;
        if idx + 1 != self.frames.len() {
            tracing::debug!(name, "scope frame popped out of order");
        }
        Some(self.frames.remove(idx).1)
    }

    /// Current arena height.
    pub fn mark(&self) -> Mark {
        Mark(self.frames.len())
    }

    /// Drop every frame pushed since `mark`.
    pub fn rollback(&mut self, mark: Mark) {
        self.frames.truncate(mark.0);
    }

    /// Number of live frames.
    pub fn depth(&self) -> usize {
        self.frames.len()
    }

    /// Returns `true` if `name` has at least one local frame.
    pub fn is_shadowed(&self, name: &str) -> bool {
        self.frames.iter().any(|(n, _)| n == name)
    }
}

impl Environment for Scope<'_> {
    fn lookup(&self, name: &str) -> Option<Value> {
        match self.frames.iter().rev().find(|(n, _)| n == name) {
            Some((_, v)) => Some(v.clone()),
            None => self.base.lookup(name),
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
