//! Interceptor (middleware) protocol.
//!
//! A node may carry an [`Interceptor`].  While that node is being visited the
//! interceptor is *active*: every node visited underneath it, the carrier
//! included, is first offered to all active interceptors, outermost first.
//!
//! Each active interceptor answers with a [`Decision`]:
//!
//! - [`Decision::Continue`]: no further interest in this node.
//! - [`Decision::ContinueWithAfter`]: call [`Interceptor::after`] once the
//!   node is done.  After-calls run innermost first.
//! - [`Decision::Veto`]: drop the node.  Interceptors further in than the
//!   vetoing one are never asked and receive [`Interceptor::skipped`]
//!   instead; earlier ones that asked for an after-call still get it.
//!
//! Every active interceptor therefore sees exactly one notification (or
//! one balanced before/after pair) per node.

use std::fmt;
use std::sync::Arc;

use crate::expr::EvalContext;
use crate::markup::Node;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Continue,
    ContinueWithAfter,
    Veto,
}

pub trait Interceptor: Send + Sync + fmt::Debug {
    fn before(&self, node: &Node, ctx: &dyn EvalContext) -> Decision;

    fn after(&self, _node: &Node, _ctx: &dyn EvalContext) {}

    /// `node` was vetoed by an interceptor registered before this one.
    fn skipped(&self, _node: &Node) {}
}

pub type InterceptorRef = Arc<dyn Interceptor>;

/// Result of offering a node to the active interceptors.
pub enum Verdict {
    /// Visit the node, then hand the token back to [`InterceptorStack::finish`].
    Proceed(PendingAfter),
    Vetoed,
}

/// Interceptors owed an after-call, outermost first.
#[must_use]
pub struct PendingAfter(Vec<InterceptorRef>);

impl PendingAfter {
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Position in an [`InterceptorStack`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StackMark(usize);

#[derive(Default)]
pub struct InterceptorStack {
    active: Vec<InterceptorRef>,
}

impl InterceptorStack {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn mark(&self) -> StackMark {
        StackMark(self.active.len())
    }

    pub fn register(&mut self, interceptor: InterceptorRef) {
        self.active.push(interceptor);
    }

    /// Remove everything registered since `mark`.
    pub fn unregister_to(&mut self, mark: StackMark) {
        self.active.truncate(mark.0);
    }

    pub fn len(&self) -> usize {
        self.active.len()
    }

    pub fn is_empty(&self) -> bool {
        self.active.is_empty()
    }

    /// Offer `node` to every active interceptor.
    pub fn classify(&self, node: &Node, ctx: &dyn EvalContext) -> Verdict {
        let mut pending = Vec::new();
        for (j, interceptor) in self.active.iter().enumerate() {
            match interceptor.before(node, ctx) {
                Decision::Continue => {}
                Decision::ContinueWithAfter => pending.push(Arc::clone(interceptor)),
                Decision::Veto => {
                    tracing::trace!(depth = j, "node vetoed");
                    for inner in &self.active[j + 1..] {
                        inner.skipped(node);
                    }
                    Self::finish(PendingAfter(pending), node, ctx);
                    return Verdict::Vetoed;
                }
            }
        }
        Verdict::Proceed(PendingAfter(pending))
    }

    /// Deliver owed after-calls, innermost first.
    pub fn finish(pending: PendingAfter, node: &Node, ctx: &dyn EvalContext) {
        for interceptor in pending.0.iter().rev() {
            interceptor.after(node, ctx);
        }
    }
}

impl fmt::Debug for InterceptorStack {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(&self.active).finish()
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
