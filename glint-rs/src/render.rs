//! Markup interpreter.
//!
//! The [`Interpreter`] walks one markup tree depth-first and feeds an
//! [`OutputBuilder`].  It holds the per-render state (scope frames, the
//! style stack, active interceptors) and implements [`EvalContext`] so every
//! expression it evaluates sees the current scope.
//!
//! Per node, in order:
//!
//! 1. use-gate: falsy skips the node outright;
//! 2. the node's own interceptor is registered and every active interceptor
//!    classifies the node (see [`intercept`](crate::intercept));
//! 3. outside a conditional chain, a falsy if-gate skips the content but
//!    still runs the interceptor hooks;
//! 4. let-bindings are evaluated against the outer scope, then pushed;
//! 5. the style delta is folded over the parent's style;
//! 6. the node kind is dispatched;
//! 7. bindings and style are popped and pending after-hooks delivered.
//!
//! An interpreter is single-use and never shared between renders.

use std::collections::HashSet;
use std::sync::Arc;

use thiserror::Error;

use crate::access::FieldAccessors;
use crate::component::ComponentFactory;
use crate::env::{Environment, Scope};
use crate::expr::{eval_expr, EvalContext, Expr};
use crate::intercept::{InterceptorStack, Verdict};
use crate::markup::{ForLoop, Node, NodeKind, Terminal};
use crate::output::{OutputBuilder, Slot};
use crate::style::Style;
use crate::value::{Coercion, NativeRef, Value};

/// Binding that holds the loop record inside a loop body.
pub const LOOP_VAR: &str = "loop";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RenderError {
    #[error("duplicate let-binding `{name}` on one node")]
    DuplicateBinding { name: String },
}

pub struct Interpreter<'a, F: ComponentFactory> {
    scope: Scope<'a>,
    coercion: &'a dyn Coercion,
    accessors: &'a FieldAccessors,
    interceptors: InterceptorStack,
    /// Resolved style per open styled node; `styles[0]` is the slot base.
    styles: Vec<Style>,
    out: OutputBuilder<'a, F>,
}

impl<'a, F: ComponentFactory> Interpreter<'a, F> {
    pub fn new(
        env: &'a dyn Environment,
        coercion: &'a dyn Coercion,
        accessors: &'a FieldAccessors,
        factory: &'a F,
        slot: Slot,
    ) -> Self {
        let base = slot.base.clone();
        Self {
            scope: Scope::new(env),
            coercion,
            accessors,
            interceptors: InterceptorStack::new(),
            styles: vec![base],
            out: OutputBuilder::new(factory, slot),
        }
    }

    /// Interpret `root` and flush the output.
    pub fn run(mut self, root: &Node) -> Result<Vec<F::Component>, RenderError> {
        self.visit(root, false)?;
        debug_assert_eq!(self.scope.depth(), 0);
        let out = self.out.finish();
        tracing::debug!(entries = out.len(), "render finished");
        Ok(out)
    }

    fn eval(&self, e: &Expr) -> Value {
        eval_expr(e, self)
    }

    fn truthy(&self, e: &Expr) -> bool {
        self.coercion.as_bool(&self.eval(e))
    }

    fn style(&self) -> &Style {
        // styles[0] is never popped.
        &self.styles[self.styles.len() - 1]
    }

    // ── Node visit ────────────────────────────────────────────────────────

    fn visit(&mut self, node: &Node, in_chain: bool) -> Result<(), RenderError> {
        if let Some(gate) = &node.use_when {
            if !self.truthy(gate) {
                tracing::trace!("use-gate closed");
                return Ok(());
            }
        }

        let mark = self.interceptors.mark();
        if let Some(interceptor) = &node.interceptor {
            self.interceptors.register(Arc::clone(interceptor));
        }

        let pending = match self.interceptors.classify(node, &*self) {
            Verdict::Proceed(pending) => pending,
            Verdict::Vetoed => {
                self.interceptors.unregister_to(mark);
                return Ok(());
            }
        };

        let gated = !in_chain && node.if_cond.as_ref().is_some_and(|c| !self.truthy(c));
        let result = if gated { Ok(()) } else { self.visit_body(node) };

        InterceptorStack::finish(pending, node, &*self);
        self.interceptors.unregister_to(mark);
        result
    }

    fn visit_body(&mut self, node: &Node) -> Result<(), RenderError> {
        let scope_mark = self.scope.mark();
        for (name, value) in self.eval_lets(&node.lets)? {
            self.scope.push(name, value);
        }

        let styled = match &node.style {
            Some(delta) => {
                let style = delta.apply(self.style(), &self.styles[0], &*self);
                self.styles.push(style);
                true
            }
            None => false,
        };

        let nested = !node.is_terminal();
        if nested {
            self.out.enter();
        }
        let result = self.dispatch(node);
        if nested {
            self.out.exit();
        }

        if styled {
            self.styles.pop();
        }
        self.scope.rollback(scope_mark);
        result
    }

    /// Evaluate a node's bindings against the scope as it stands before
    /// any of them is pushed.  A repeated name is a hard error.
    fn eval_lets<'n>(&self, lets: &'n [(String, Expr)]) -> Result<Vec<(&'n str, Value)>, RenderError> {
        let mut seen = HashSet::with_capacity(lets.len());
        let mut out = Vec::with_capacity(lets.len());
        for (name, e) in lets {
            if !seen.insert(name.as_str()) {
                return Err(RenderError::DuplicateBinding { name: name.clone() });
            }
            out.push((name.as_str(), self.eval(e)));
        }
        Ok(out)
    }

    fn dispatch(&mut self, node: &Node) -> Result<(), RenderError> {
        match &node.kind {
            NodeKind::Container(children) => {
                for child in children {
                    self.visit(child, false)?;
                }
                Ok(())
            }

            NodeKind::Conditional { branches, fallback } => {
                for branch in branches {
                    let taken = branch.if_cond.as_ref().map_or(true, |c| self.truthy(c));
                    if taken {
                        return self.visit(branch, true);
                    }
                }
                match fallback {
                    Some(f) => self.visit(f, true),
                    None => Ok(()),
                }
            }

            NodeKind::Match {
                input,
                cases,
                fallback,
            } => {
                if cases.is_empty() {
                    tracing::warn!("pattern match declares no cases");
                }
                let v = self.eval(input);
                if !v.is_null() {
                    let key = self.coercion.as_str(&v).to_lowercase();
                    if let Some((_, case)) = cases.iter().find(|(label, _)| label.to_lowercase() == key) {
                        return self.visit(case, false);
                    }
                }
                match fallback {
                    Some(f) => self.visit(f, false),
                    None => Ok(()),
                }
            }

            NodeKind::For(l) => self.visit_loop(l),

            NodeKind::Break => {
                let style = self.style().clone();
                self.out.line_break(&style);
                Ok(())
            }

            NodeKind::Interpolation(e) => {
                let v = self.eval(e);
                match Node::from_value(&v) {
                    Some(inner) => self.visit(inner, false),
                    None => {
                        let text = self.coercion.as_str(&v);
                        let style = self.style().clone();
                        self.out.push_text(&text, &style);
                        Ok(())
                    }
                }
            }

            NodeKind::Terminal(t) => {
                self.emit(t);
                Ok(())
            }
        }
    }

    fn emit(&mut self, terminal: &Terminal) {
        let style = self.style().clone();
        let factory = self.out.factory();
        let component = match terminal {
            Terminal::Text(s) => {
                self.out.push_text(s, &style);
                return;
            }
            Terminal::Key(k) => factory.keybind(k),
            Terminal::Translate { key, fallback, args } => {
                let args = args
                    .iter()
                    .map(|a| factory.text(&self.coercion.as_str(&self.eval(a))))
                    .collect();
                factory.translatable(key, fallback.as_deref(), args)
            }
            Terminal::Score { name, objective } => factory.score(name, objective),
            Terminal::Selector { pattern, separator } => factory.selector(pattern, separator.as_deref()),
            Terminal::Nbt {
                path,
                source,
                interpret,
                separator,
            } => factory.nbt(path, source, *interpret, separator.as_deref()),
        };
        self.out.push_component(component, &style);
    }

    // ── Loops ─────────────────────────────────────────────────────────────

    fn visit_loop(&mut self, l: &ForLoop) -> Result<(), RenderError> {
        let mut items = self.coercion.as_list(&self.eval(&l.iterable));
        if l.reversed.as_ref().is_some_and(|e| self.truthy(e)) {
            items.reverse();
        }
        let count = items.len();
        tracing::trace!(count, "loop");

        if let Some(var) = &l.var {
            self.scope.push(var, Value::Null);
        }
        self.scope.push(LOOP_VAR, Value::Null);

        let mut result = Ok(());
        for (index, item) in items.into_iter().enumerate() {
            if index > 0 {
                if let Some(sep) = &l.separator {
                    result = self.visit(sep, false);
                    if result.is_err() {
                        break;
                    }
                }
            }
            if let Some(var) = &l.var {
                self.scope.update(var, item);
            }
            self.scope.update(LOOP_VAR, loop_record(index, count));

            let mark = self.scope.mark();
            for (name, value) in self.eval_iteration_lets(&l.lets) {
                self.scope.push(name, value);
            }
            result = l.body.iter().try_for_each(|child| self.visit(child, false));
            self.scope.rollback(mark);
            if result.is_err() {
                break;
            }
        }

        self.scope.pop(LOOP_VAR);
        if let Some(var) = &l.var {
            self.scope.pop(var);
        }
        result
    }

    /// Loop-body bindings.  A repeated name overwrites the earlier value.
    fn eval_iteration_lets<'n>(&self, lets: &'n [(String, Expr)]) -> Vec<(&'n str, Value)> {
        let mut out: Vec<(&str, Value)> = Vec::with_capacity(lets.len());
        for (name, e) in lets {
            let value = self.eval(e);
            match out.iter_mut().find(|(n, _)| *n == name.as_str()) {
                Some(slot) => {
                    tracing::warn!(name = name.as_str(), "duplicate loop binding; overwriting");
                    slot.1 = value;
                }
                None => out.push((name.as_str(), value)),
            }
        }
        out
    }
}

/// The per-iteration record bound to [`LOOP_VAR`].
fn loop_record(index: usize, count: usize) -> Value {
    let i = index as i64;
    Value::Map(
        [
            ("index", Value::Int(i)),
            ("isFirst", Value::Bool(index == 0)),
            ("isLast", Value::Bool(index + 1 == count)),
            ("isEven", Value::Bool(index % 2 == 0)),
            ("isOdd", Value::Bool(index % 2 == 1)),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_owned(), v))
        .collect(),
    )
}

impl<F: ComponentFactory> EvalContext for Interpreter<'_, F> {
    fn get_var(&self, name: &str) -> Option<Value> {
        self.scope.lookup(name)
    }

    fn coercion(&self) -> &dyn Coercion {
        self.coercion
    }

    fn read_field(&self, target: &NativeRef, field: &str) -> Value {
        self.accessors.read(target, field)
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use parking_lot::Mutex;

    use super::*;
    use crate::component::{Component, TreeFactory};
    use crate::env::Bindings;
    use crate::expr::Op;
    use crate::intercept::{Decision, Interceptor};
    use crate::value::DefaultCoercion;

    fn render_in(node: &Node, env: &Bindings, slot: Slot) -> Result<Vec<Component>, RenderError> {
        let acc = FieldAccessors::new();
        Interpreter::new(env, &DefaultCoercion, &acc, &TreeFactory, slot).run(node)
    }

    fn plain(node: &Node, env: &Bindings) -> String {
        let out = render_in(node, env, Slot::chat()).unwrap_or_default();
        out.iter().map(Component::plain_text).collect::<Vec<_>>().join("|")
    }

    #[test]
    fn container_of_text() {
        let n = Node::container(vec![Node::text("a"), Node::text("b")]);
        assert_eq!(plain(&n, &Bindings::new()), "ab");
    }

    #[test]
    fn interpolation_stringifies() {
        let env = Bindings::new().with("name", "Alex").with("n", 3i64);
        let n = Node::container(vec![
            Node::interpolate(Expr::ident("name")),
            Node::text(" x"),
            Node::interpolate(Expr::ident("n")),
        ]);
        assert_eq!(plain(&n, &env), "Alex x3");
    }

    #[test]
    fn interpolation_splices_markup() {
        let env = Bindings::new().with("frag", Value::markup(Node::text("inner")));
        let n = Node::container(vec![Node::text("<"), Node::interpolate(Expr::ident("frag")), Node::text(">")]);
        assert_eq!(plain(&n, &env), "<inner>");
    }

    #[test]
    fn conditional_chain_takes_first_truthy() {
        let env = Bindings::new().with("x", 2i64);
        let chain = Node::conditional(
            vec![
                Node::text("one").only_if(Expr::infix(Op::Eq, Expr::ident("x"), Expr::int(1))),
                Node::text("two").only_if(Expr::infix(Op::Eq, Expr::ident("x"), Expr::int(2))),
                Node::text("also-two").only_if(Expr::infix(Op::Ge, Expr::ident("x"), Expr::int(2))),
            ],
            Some(Node::text("other")),
        );
        assert_eq!(plain(&chain, &env), "two");
        let env = Bindings::new().with("x", 9i64);
        assert_eq!(plain(&chain, &env), "also-two");
        let env = Bindings::new().with("x", 0i64);
        assert_eq!(plain(&chain, &env), "other");
    }

    #[test]
    fn pattern_match_is_case_insensitive() {
        let m = Node::matching(
            Expr::ident("mode"),
            vec![
                ("Creative".into(), Node::text("C")),
                ("survival".into(), Node::text("S")),
            ],
            Some(Node::text("?")),
        );
        assert_eq!(plain(&m, &Bindings::new().with("mode", "CREATIVE")), "C");
        assert_eq!(plain(&m, &Bindings::new().with("mode", "Survival")), "S");
        assert_eq!(plain(&m, &Bindings::new().with("mode", "spectator")), "?");
        assert_eq!(plain(&m, &Bindings::new()), "?");
    }

    #[test]
    fn zero_case_match_uses_fallback() {
        let m = Node::matching(Expr::str("x"), vec![], Some(Node::text("fallback")));
        assert_eq!(plain(&m, &Bindings::new()), "fallback");
    }

    #[test]
    fn use_gate_and_if_gate() {
        let n = Node::container(vec![
            Node::text("a").use_when(Expr::bool(false)),
            Node::text("b").only_if(Expr::bool(false)),
            Node::text("c").only_if(Expr::bool(true)),
        ]);
        assert_eq!(plain(&n, &Bindings::new()), "c");
    }

    #[test]
    fn lets_see_only_outer_scope() {
        let env = Bindings::new().with("x", 1i64);
        let n = Node::container(vec![
            Node::interpolate(Expr::ident("x")),
            Node::interpolate(Expr::ident("y")),
        ])
        .bind("x", Expr::int(10))
        .bind("y", Expr::infix(Op::Add, Expr::ident("x"), Expr::int(1)));
        assert_eq!(plain(&n, &env), "102");
    }

    #[test]
    fn duplicate_let_is_an_error() {
        let n = Node::text("x").bind("a", Expr::int(1)).bind("a", Expr::int(2));
        assert_eq!(
            render_in(&n, &Bindings::new(), Slot::chat()),
            Err(RenderError::DuplicateBinding { name: "a".into() })
        );
    }

    #[test]
    fn let_does_not_leak_to_siblings() {
        let n = Node::container(vec![
            Node::interpolate(Expr::ident("v")).bind("v", Expr::str("in")),
            Node::interpolate(Expr::ident("v")),
        ]);
        assert_eq!(plain(&n, &Bindings::new().with("v", "out")), "inout");
    }

    fn loop_over(items: Expr) -> ForLoop {
        ForLoop::new(items).var("it")
    }

    #[test]
    fn loop_with_separator() {
        let l = loop_over(Expr::array(vec![Expr::str("a"), Expr::str("b"), Expr::str("c")]))
            .separator(Node::text(", "))
            .body(vec![Node::interpolate(Expr::ident("it"))]);
        assert_eq!(plain(&Node::for_each(l), &Bindings::new()), "a, b, c");
    }

    #[test]
    fn loop_reversed() {
        let l = loop_over(Expr::infix(Op::Range, Expr::int(1), Expr::int(3)))
            .reversed(Expr::bool(true))
            .body(vec![Node::interpolate(Expr::ident("it"))]);
        assert_eq!(plain(&Node::for_each(l), &Bindings::new()), "321");
    }

    #[test]
    fn loop_record_per_iteration() {
        let field = |f: &str| Node::interpolate(Expr::member(Expr::ident(LOOP_VAR), f));
        let l = loop_over(Expr::array(vec![Expr::int(0), Expr::int(0), Expr::int(0)]))
            .separator(Node::text("|"))
            .body(vec![
                field("index"),
                field("isFirst"),
                field("isLast"),
                field("isEven"),
                field("isOdd"),
            ]);
        let n = Node::container(vec![Node::for_each(l), Node::interpolate(Expr::ident(LOOP_VAR))]);
        assert_eq!(
            plain(&n, &Bindings::new()),
            "0truefalsetruefalse|1falsefalsefalsetrue|2falsetruetruefalsenull"
        );
    }

    #[test]
    fn nested_loops_reusing_a_name_restore_outer() {
        let inner = loop_over(Expr::array(vec![Expr::str("x"), Expr::str("y")]))
            .body(vec![Node::interpolate(Expr::ident("it"))]);
        let outer = loop_over(Expr::array(vec![Expr::int(1), Expr::int(2)])).body(vec![
            Node::for_each(inner),
            Node::interpolate(Expr::ident("it")),
        ]);
        let n = Node::container(vec![Node::for_each(outer), Node::interpolate(Expr::ident("it"))]);
        assert_eq!(plain(&n, &Bindings::new().with("it", "end")), "xy1xy2end");
    }

    #[test]
    fn loop_lets_reevaluated_and_overwrite() {
        let l = loop_over(Expr::array(vec![Expr::int(1), Expr::int(2)]))
            .bind("d", Expr::infix(Op::Mul, Expr::ident("it"), Expr::int(10)))
            .bind("d", Expr::infix(Op::Mul, Expr::ident("it"), Expr::int(100)))
            .body(vec![Node::interpolate(Expr::ident("d"))]);
        assert_eq!(plain(&Node::for_each(l), &Bindings::new()), "100200");
    }

    #[derive(Debug)]
    struct Log {
        name: &'static str,
        veto_text: Option<&'static str>,
        events: Arc<Mutex<Vec<String>>>,
    }

    fn label(node: &Node) -> String {
        match &node.kind {
            NodeKind::Terminal(Terminal::Text(s)) => s.clone(),
            _ => "#".into(),
        }
    }

    impl Interceptor for Log {
        fn before(&self, node: &Node, _ctx: &dyn EvalContext) -> Decision {
            let l = label(node);
            self.events.lock().push(format!("{}>{}", self.name, l));
            if self.veto_text == Some(l.as_str()) {
                Decision::Veto
            } else {
                Decision::ContinueWithAfter
            }
        }

        fn after(&self, node: &Node, _ctx: &dyn EvalContext) {
            self.events.lock().push(format!("{}<{}", self.name, label(node)));
        }

        fn skipped(&self, node: &Node) {
            self.events.lock().push(format!("{}~{}", self.name, label(node)));
        }
    }

    #[test]
    fn interceptor_brackets_descendants() {
        let events = Arc::new(Mutex::new(Vec::new()));
        let log = Arc::new(Log {
            name: "L",
            veto_text: Some("hidden"),
            events: Arc::clone(&events),
        });
        let n = Node::container(vec![Node::text("a"), Node::text("hidden")]).intercept(log);
        assert_eq!(plain(&n, &Bindings::new()), "a");
        assert_eq!(*events.lock(), ["L>#", "L>a", "L<a", "L>hidden", "L<#"]);
    }

    #[test]
    fn outer_veto_skips_inner_interceptor() {
        let events = Arc::new(Mutex::new(Vec::new()));
        let outer = Arc::new(Log {
            name: "O",
            veto_text: Some("x"),
            events: Arc::clone(&events),
        });
        let inner = Arc::new(Log {
            name: "I",
            veto_text: None,
            events: Arc::clone(&events),
        });
        let n = Node::container(vec![Node::container(vec![Node::text("x")]).intercept(inner)]).intercept(outer);
        assert_eq!(plain(&n, &Bindings::new()), "");
        let ev = events.lock();
        assert!(!ev.iter().any(|e| e == "I>x"));
        assert_eq!(ev.iter().filter(|e| *e == "I~x").count(), 1);
    }

    #[test]
    fn use_gate_skips_interceptor_but_if_gate_runs_it() {
        let events = Arc::new(Mutex::new(Vec::new()));
        let mk = |name| {
            Arc::new(Log {
                name,
                veto_text: None,
                events: Arc::clone(&events),
            })
        };
        let n = Node::container(vec![
            Node::text("u").use_when(Expr::bool(false)).intercept(mk("U")),
            Node::text("i").only_if(Expr::bool(false)).intercept(mk("F")),
        ]);
        assert_eq!(plain(&n, &Bindings::new()), "");
        assert_eq!(*events.lock(), ["F>i", "F<i"]);
    }

    #[test]
    fn paragraph_break_splits_entries() {
        let n = Node::container(vec![Node::text("one"), Node::line_break(), Node::text("two")]);
        let out = render_in(&n, &Bindings::new(), Slot::lore()).unwrap_or_default();
        assert_eq!(out.len(), 2);
        assert_eq!(out[0].plain_text(), "one");
        assert_eq!(out[1].plain_text(), "two");
        let out = render_in(&n, &Bindings::new(), Slot::chat()).unwrap_or_default();
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].plain_text(), "one\ntwo");
    }
}
