//! Markup AST.
//!
//! Trees arrive pre-validated from a tag parser.  Every [`Node`] carries the
//! same optional decorations (use-gate, if-predicate, let-bindings, style,
//! interceptor) around a closed [`NodeKind`].

use crate::expr::Expr;
use crate::intercept::InterceptorRef;
use crate::value::Value;

pub use crate::style::StyleDelta;

// ── Node ──────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct Node {
    pub kind: NodeKind,
    /// Falsy skips the node and its subtree without touching interceptors.
    pub use_when: Option<Expr>,
    /// Branch predicate inside a [`NodeKind::Conditional`]; elsewhere a
    /// plain gate that still runs this node's interceptor hooks.
    pub if_cond: Option<Expr>,
    /// Evaluated in declaration order against the scope outside this node.
    pub lets: Vec<(String, Expr)>,
    pub style: Option<StyleDelta>,
    pub interceptor: Option<InterceptorRef>,
}

#[derive(Debug, Clone)]
pub enum NodeKind {
    Container(Vec<Node>),
    /// if / else-if chain.  Each branch's `if_cond` is its predicate.
    Conditional {
        branches: Vec<Node>,
        fallback: Option<Box<Node>>,
    },
    /// when / is / other.  Labels match case-insensitively.
    Match {
        input: Expr,
        cases: Vec<(String, Node)>,
        fallback: Option<Box<Node>>,
    },
    For(Box<ForLoop>),
    Break,
    Interpolation(Expr),
    Terminal(Terminal),
}

#[derive(Debug, Clone)]
pub struct ForLoop {
    pub iterable: Expr,
    /// Iteration variable; `None` iterates anonymously.
    pub var: Option<String>,
    /// Truthy walks the sequence back to front.
    pub reversed: Option<Expr>,
    /// Rendered between iterations.
    pub separator: Option<Box<Node>>,
    /// Re-evaluated at the top of every iteration.
    pub lets: Vec<(String, Expr)>,
    pub body: Vec<Node>,
}

/// Where a structured-data reference reads from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NbtSource {
    Block(String),
    Entity(String),
    Storage(String),
}

/// Leaf content.
#[derive(Debug, Clone)]
pub enum Terminal {
    Text(String),
    /// Keybind name, e.g. `key.jump`.
    Key(String),
    Translate {
        key: String,
        fallback: Option<String>,
        args: Vec<Expr>,
    },
    Score {
        name: String,
        objective: String,
    },
    Selector {
        pattern: String,
        separator: Option<String>,
    },
    Nbt {
        path: String,
        source: NbtSource,
        interpret: bool,
        separator: Option<String>,
    },
}

impl Node {
    pub fn new(kind: NodeKind) -> Self {
        Self {
            kind,
            use_when: None,
            if_cond: None,
            lets: Vec::new(),
            style: None,
            interceptor: None,
        }
    }

    pub fn text(s: impl Into<String>) -> Self {
        Self::new(NodeKind::Terminal(Terminal::Text(s.into())))
    }

    pub fn terminal(t: Terminal) -> Self {
        Self::new(NodeKind::Terminal(t))
    }

    pub fn container(children: Vec<Node>) -> Self {
        Self::new(NodeKind::Container(children))
    }

    pub fn conditional(branches: Vec<Node>, fallback: Option<Node>) -> Self {
        Self::new(NodeKind::Conditional {
            branches,
            fallback: fallback.map(Box::new),
        })
    }

    pub fn matching(input: Expr, cases: Vec<(String, Node)>, fallback: Option<Node>) -> Self {
        Self::new(NodeKind::Match {
            input,
            cases,
            fallback: fallback.map(Box::new),
        })
    }

    pub fn for_each(l: ForLoop) -> Self {
        Self::new(NodeKind::For(Box::new(l)))
    }

    pub fn line_break() -> Self {
        Self::new(NodeKind::Break)
    }

    pub fn interpolate(e: Expr) -> Self {
        Self::new(NodeKind::Interpolation(e))
    }

    pub fn styled(mut self, delta: StyleDelta) -> Self {
        self.style = Some(delta);
        self
    }

    pub fn use_when(mut self, e: Expr) -> Self {
        self.use_when = Some(e);
        self
    }

    pub fn only_if(mut self, e: Expr) -> Self {
        self.if_cond = Some(e);
        self
    }

    pub fn bind(mut self, name: impl Into<String>, e: Expr) -> Self {
        self.lets.push((name.into(), e));
        self
    }

    pub fn intercept(mut self, interceptor: InterceptorRef) -> Self {
        self.interceptor = Some(interceptor);
        self
    }

    /// Leaves: terminals and breaks.
    pub fn is_terminal(&self) -> bool {
        matches!(self.kind, NodeKind::Terminal(_) | NodeKind::Break)
    }

    /// Wrap this tree as a value an interpolation can splice back in.
    pub fn into_value(self) -> Value {
        Value::native(self)
    }

    /// The markup tree inside `v`, if it holds one.
    pub fn from_value(v: &Value) -> Option<&Node> {
        match v {
            Value::Native(n) => n.downcast_ref::<Node>(),
            _ => None,
        }
    }
}

impl Value {
    /// A value holding a markup subtree.
    pub fn markup(node: Node) -> Value {
        node.into_value()
    }
}

impl ForLoop {
    pub fn new(iterable: Expr) -> Self {
        Self {
            iterable,
            var: None,
            reversed: None,
            separator: None,
            lets: Vec::new(),
            body: Vec::new(),
        }
    }

    pub fn var(mut self, name: impl Into<String>) -> Self {
        self.var = Some(name.into());
        self
    }

    pub fn reversed(mut self, e: Expr) -> Self {
        self.reversed = Some(e);
        self
    }

    pub fn separator(mut self, node: Node) -> Self {
        self.separator = Some(Box::new(node));
        self
    }

    pub fn bind(mut self, name: impl Into<String>, e: Expr) -> Self {
        self.lets.push((name.into(), e));
        self
    }

    pub fn body(mut self, nodes: Vec<Node>) -> Self {
        self.body = nodes;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builders_attach_decorations() {
        let n = Node::text("hi")
            .use_when(Expr::bool(true))
            .only_if(Expr::ident("x"))
            .bind("a", Expr::int(1))
            .bind("b", Expr::int(2));
        assert!(n.use_when.is_some());
        assert!(n.if_cond.is_some());
        assert_eq!(n.lets.len(), 2);
        assert!(n.is_terminal());
        assert!(!Node::container(vec![]).is_terminal());
    }

    #[test]
    fn markup_value_round_trip() {
        let v = Value::markup(Node::text("inner"));
        let node = Node::from_value(&v).map(|n| matches!(&n.kind, NodeKind::Terminal(Terminal::Text(s)) if s == "inner"));
        assert_eq!(node, Some(true));
        assert!(Node::from_value(&Value::from("inner")).is_none());
    }
}
