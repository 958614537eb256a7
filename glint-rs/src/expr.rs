//! Expression AST and evaluator.
//!
//! Expressions arrive already parsed.  Evaluation is a pure tree walk that
//! never fails: unsupported operator/position combinations log a warning and
//! produce null, out-of-range subscripts produce null, and coercions fall
//! back to their defaults.
//!
//! Two operators deliberately differ from most languages:
//!
//! - `&&` and `||` evaluate both operands before combining them, so side
//!   effects of the right operand (dynamic bindings, field reads) always run.
//! - `/` and `%` by zero return the left operand unchanged.

use std::cmp::Ordering;

use crate::access::FieldAccessors;
use crate::env::Environment;
use crate::value::{Coercion, DefaultCoercion, NativeRef, Number, Value};

/// Longest list a `..` range produces; longer spans are cut at this length.
pub const MAX_RANGE_LEN: usize = 1 << 16;

// ── EvalContext ───────────────────────────────────────────────────────────────

/// What the evaluator needs from its surroundings.
pub trait EvalContext {
    /// Resolve an identifier.
    fn get_var(&self, name: &str) -> Option<Value>;

    /// Coercion rules used for every operator.
    fn coercion(&self) -> &dyn Coercion {
        &DefaultCoercion
    }

    /// Read a field from a native object.
    fn read_field(&self, target: &NativeRef, field: &str) -> Value {
        tracing::warn!(type_name = target.type_name(), field, "no field accessors available");
        Value::Null
    }
}

/// [`EvalContext`] over an [`Environment`], with optional coercion override
/// and accessor table.
pub struct EnvContext<'a> {
    env: &'a dyn Environment,
    coercion: &'a dyn Coercion,
    accessors: Option<&'a FieldAccessors>,
}

impl<'a> EnvContext<'a> {
    pub fn new(env: &'a dyn Environment) -> Self {
        Self {
            env,
            coercion: &DefaultCoercion,
            accessors: None,
        }
    }

    pub fn with_coercion(mut self, coercion: &'a dyn Coercion) -> Self {
        self.coercion = coercion;
        self
    }

    pub fn with_accessors(mut self, accessors: &'a FieldAccessors) -> Self {
        self.accessors = Some(accessors);
        self
    }
}

impl EvalContext for EnvContext<'_> {
    fn get_var(&self, name: &str) -> Option<Value> {
        self.env.lookup(name)
    }

    fn coercion(&self) -> &dyn Coercion {
        self.coercion
    }

    fn read_field(&self, target: &NativeRef, field: &str) -> Value {
        match self.accessors {
            Some(acc) => acc.read(target, field),
            None => {
                tracing::warn!(type_name = target.type_name(), field, "no field accessors available");
                Value::Null
            }
        }
    }
}

// ── AST ───────────────────────────────────────────────────────────────────────

/// Leaf of an expression tree.
#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    Null,
    Int(i64),
    Float(f64),
    Bool(bool),
    Str(String),
    /// Variable reference.
    Ident(String),
}

/// Operator tokens.  Prefix and infix nodes share this set; a token used in
/// a position it has no meaning for evaluates to null.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Op {
    /// `!x`
    Negate,
    /// `-x`
    FlipSign,
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    /// `^`
    Pow,
    /// `~`
    Concat,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    And,
    Or,
    /// `??`
    Coalesce,
    /// `..`
    Range,
    /// `.`
    Member,
}

impl Op {
    pub fn symbol(self) -> &'static str {
        match self {
            Op::Negate => "!",
            Op::FlipSign => "-",
            Op::Add => "+",
            Op::Sub => "-",
            Op::Mul => "*",
            Op::Div => "/",
            Op::Mod => "%",
            Op::Pow => "^",
            Op::Concat => "~",
            Op::Eq => "==",
            Op::Ne => "!=",
            Op::Lt => "<",
            Op::Le => "<=",
            Op::Gt => ">",
            Op::Ge => ">=",
            Op::And => "&&",
            Op::Or => "||",
            Op::Coalesce => "??",
            Op::Range => "..",
            Op::Member => ".",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Terminal(Literal),
    Prefix(Op, Box<Expr>),
    Infix(Op, Box<Expr>, Box<Expr>),
    Subscript(Box<Expr>, Box<Expr>),
    IfElse(Box<Expr>, Box<Expr>, Box<Expr>),
    Substring {
        operand: Box<Expr>,
        lower: Option<Box<Expr>>,
        upper: Option<Box<Expr>>,
    },
    Array(Vec<Expr>),
}

impl Expr {
    pub fn null() -> Self {
        Expr::Terminal(Literal::Null)
    }

    pub fn int(n: i64) -> Self {
        Expr::Terminal(Literal::Int(n))
    }

    pub fn float(x: f64) -> Self {
        Expr::Terminal(Literal::Float(x))
    }

    pub fn bool(b: bool) -> Self {
        Expr::Terminal(Literal::Bool(b))
    }

    pub fn str(s: impl Into<String>) -> Self {
        Expr::Terminal(Literal::Str(s.into()))
    }

    pub fn ident(name: impl Into<String>) -> Self {
        Expr::Terminal(Literal::Ident(name.into()))
    }

    pub fn prefix(op: Op, operand: Expr) -> Self {
        Expr::Prefix(op, Box::new(operand))
    }

    pub fn infix(op: Op, lhs: Expr, rhs: Expr) -> Self {
        Expr::Infix(op, Box::new(lhs), Box::new(rhs))
    }

    /// `target.field`
    pub fn member(target: Expr, field: impl Into<String>) -> Self {
        Expr::infix(Op::Member, target, Expr::ident(field))
    }

    pub fn subscript(target: Expr, key: Expr) -> Self {
        Expr::Subscript(Box::new(target), Box::new(key))
    }

    pub fn if_else(cond: Expr, then: Expr, else_: Expr) -> Self {
        Expr::IfElse(Box::new(cond), Box::new(then), Box::new(else_))
    }

    pub fn substring(operand: Expr, lower: Option<Expr>, upper: Option<Expr>) -> Self {
        Expr::Substring {
            operand: Box::new(operand),
            lower: lower.map(Box::new),
            upper: upper.map(Box::new),
        }
    }

    pub fn array(items: Vec<Expr>) -> Self {
        Expr::Array(items)
    }
}

// ── Evaluator ─────────────────────────────────────────────────────────────────

/// Evaluate `expr` against a plain environment with default coercions.
pub fn evaluate(expr: &Expr, env: &dyn Environment) -> Value {
    eval_expr(expr, &EnvContext::new(env))
}

/// Evaluate an [`Expr`] AST node against the given context.
pub fn eval_expr(expr: &Expr, ctx: &dyn EvalContext) -> Value {
    match expr {
        Expr::Terminal(lit) => match lit {
            Literal::Null => Value::Null,
            Literal::Int(n) => Value::Int(*n),
            Literal::Float(x) => Value::Float(*x),
            Literal::Bool(b) => Value::Bool(*b),
            Literal::Str(s) => Value::Str(s.clone()),
            Literal::Ident(name) => ctx.get_var(name).unwrap_or_default(),
        },

        Expr::Prefix(op, operand) => {
            let v = eval_expr(operand, ctx);
            match op {
                Op::Negate if v.is_null() => Value::Null,
                Op::Negate => Value::Bool(!ctx.coercion().as_bool(&v)),
                Op::FlipSign => match ctx.coercion().as_number(&v) {
                    Number::Int(n) => Value::Int(n.wrapping_neg()),
                    Number::Float(x) => Value::Float(-x),
                },
                other => {
                    tracing::warn!(op = other.symbol(), "operator is not a prefix operator");
                    Value::Null
                }
            }
        }

        Expr::Infix(op, lhs, rhs) => match op {
            Op::Coalesce => {
                let l = eval_expr(lhs, ctx);
                if l.is_null() {
                    eval_expr(rhs, ctx)
                } else {
                    l
                }
            }
            Op::Member => {
                let target = eval_expr(lhs, ctx);
                let key = match &**rhs {
                    Expr::Terminal(Literal::Ident(name)) => Value::Str(name.clone()),
                    other => eval_expr(other, ctx),
                };
                subscript(&target, &key, ctx)
            }
            _ => {
                // Both sides always run, including for && and ||.
                let l = eval_expr(lhs, ctx);
                let r = eval_expr(rhs, ctx);
                apply_infix(*op, &l, &r, ctx)
            }
        },

        Expr::Subscript(target, key) => {
            let target = eval_expr(target, ctx);
            let key = eval_expr(key, ctx);
            subscript(&target, &key, ctx)
        }

        Expr::IfElse(cond, then, else_) => {
            let c = eval_expr(cond, ctx);
            if ctx.coercion().as_bool(&c) {
                eval_expr(then, ctx)
            } else {
                eval_expr(else_, ctx)
            }
        }

        Expr::Substring {
            operand,
            lower,
            upper,
        } => {
            let s = ctx.coercion().as_str(&eval_expr(operand, ctx));
            let lower = lower
                .as_deref()
                .map(|e| ctx.coercion().as_int(&eval_expr(e, ctx)));
            let upper = upper
                .as_deref()
                .map(|e| ctx.coercion().as_int(&eval_expr(e, ctx)));
            Value::Str(substring(&s, lower, upper))
        }

        Expr::Array(items) => Value::List(items.iter().map(|e| eval_expr(e, ctx)).collect()),
    }
}

#[derive(Clone, Copy)]
enum Arith {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Pow,
}

/// Apply an infix operator to two already-evaluated operands.
pub fn apply_infix(op: Op, l: &Value, r: &Value, ctx: &dyn EvalContext) -> Value {
    let cx = ctx.coercion();
    let arith = |kind| arithmetic(kind, cx.as_number(l), cx.as_number(r));
    match op {
        Op::Add => arith(Arith::Add),
        Op::Sub => arith(Arith::Sub),
        Op::Mul => arith(Arith::Mul),
        Op::Div => arith(Arith::Div),
        Op::Mod => arith(Arith::Mod),
        Op::Pow => arith(Arith::Pow),

        Op::Concat => Value::Str(cx.as_str(l) + &cx.as_str(r)),

        Op::Eq => Value::Bool(values_equal(l, r)),
        Op::Ne => Value::Bool(!values_equal(l, r)),
        Op::Lt => Value::Bool(compare(l, r, cx) == Some(Ordering::Less)),
        Op::Gt => Value::Bool(compare(l, r, cx) == Some(Ordering::Greater)),
        Op::Le => Value::Bool(
            equal_or_absent(l, r) || compare(l, r, cx) == Some(Ordering::Less),
        ),
        Op::Ge => Value::Bool(
            equal_or_absent(l, r) || compare(l, r, cx) == Some(Ordering::Greater),
        ),

        Op::And => Value::Bool(cx.as_bool(l) && cx.as_bool(r)),
        Op::Or => Value::Bool(cx.as_bool(l) || cx.as_bool(r)),

        Op::Coalesce => {
            if l.is_null() {
                r.clone()
            } else {
                l.clone()
            }
        }

        Op::Range => {
            let (a, b) = (cx.as_int(l), cx.as_int(r));
            if b <= a {
                return Value::List(Vec::new());
            }
            let span = i128::from(b) - i128::from(a) + 1;
            let len = if span > MAX_RANGE_LEN as i128 {
                tracing::warn!(from = a, to = b, cap = MAX_RANGE_LEN, "range truncated");
                MAX_RANGE_LEN
            } else {
                span as usize
            };
            Value::List((a..=b).take(len).map(Value::Int).collect())
        }

        Op::Member => subscript(l, r, ctx),

        Op::Negate | Op::FlipSign => {
            tracing::warn!(op = op.symbol(), "operator is not an infix operator");
            Value::Null
        }
    }
}

fn arithmetic(kind: Arith, a: Number, b: Number) -> Value {
    match (a, b) {
        (Number::Int(x), Number::Int(y)) => Value::Int(match kind {
            Arith::Add => x.wrapping_add(y),
            Arith::Sub => x.wrapping_sub(y),
            Arith::Mul => x.wrapping_mul(y),
            Arith::Div if y == 0 => x,
            Arith::Div => x.wrapping_div(y),
            Arith::Mod if y == 0 => x,
            Arith::Mod => x.wrapping_rem(y),
            Arith::Pow => int_pow(x, y),
        }),
        _ => {
            let (x, y) = (a.as_f64(), b.as_f64());
            Value::Float(match kind {
                Arith::Add => x + y,
                Arith::Sub => x - y,
                Arith::Mul => x * y,
                Arith::Div if y == 0.0 => x,
                Arith::Div => x / y,
                Arith::Mod if y == 0.0 => x,
                Arith::Mod => x % y,
                Arith::Pow => x.powf(y),
            })
        }
    }
}

fn int_pow(base: i64, exp: i64) -> i64 {
    match u32::try_from(exp) {
        Ok(e) => base.wrapping_pow(e),
        Err(_) if exp < 0 => (base as f64).powf(exp as f64) as i64,
        Err(_) => base.wrapping_pow(u32::MAX),
    }
}

/// `==`: two nulls are equal, a single null is not, otherwise structural
/// equality (an integer never equals a float).
pub fn values_equal(l: &Value, r: &Value) -> bool {
    match (l, r) {
        (Value::Null, Value::Null) => true,
        (Value::Null, _) | (_, Value::Null) => false,
        _ => l == r,
    }
}

/// Shortcut taken by `<=` and `>=` before ordering: equal operands, or a
/// null on either side, satisfy the comparison.
fn equal_or_absent(l: &Value, r: &Value) -> bool {
    l.is_null() || r.is_null() || values_equal(l, r)
}

fn compare(l: &Value, r: &Value, cx: &dyn Coercion) -> Option<Ordering> {
    match (cx.as_number(l), cx.as_number(r)) {
        (Number::Int(a), Number::Int(b)) => Some(a.cmp(&b)),
        (a, b) => a.as_f64().partial_cmp(&b.as_f64()),
    }
}

/// Resolve `target[key]`.
///
/// Maps look the key up directly; lists and strings index by integer with
/// negative indices counting from the end; native objects read the field
/// named by the key.  Everything else, and any miss, is null.
pub fn subscript(target: &Value, key: &Value, ctx: &dyn EvalContext) -> Value {
    let cx = ctx.coercion();
    match target {
        Value::Map(map) => map.get(&cx.as_str(key)).cloned().unwrap_or_default(),
        Value::List(items) => wrap_index(items.len(), cx.as_int(key))
            .map(|i| items[i].clone())
            .unwrap_or_default(),
        Value::Str(s) => {
            let chars: Vec<char> = s.chars().collect();
            wrap_index(chars.len(), cx.as_int(key))
                .map(|i| Value::Str(chars[i].to_string()))
                .unwrap_or_default()
        }
        Value::Native(obj) => ctx.read_field(obj, &cx.as_str(key)),
        Value::Null => Value::Null,
        other => {
            tracing::debug!(kind = other.type_name(), "subscript on a scalar value");
            Value::Null
        }
    }
}

/// Map a possibly-negative index into `0..len`.
fn wrap_index(len: usize, idx: i64) -> Option<usize> {
    let len = i64::try_from(len).ok()?;
    let i = if idx < 0 { len + idx } else { idx };
    if (0..len).contains(&i) {
        usize::try_from(i).ok()
    } else {
        None
    }
}

/// The substring rule, applied in this fixed order:
///
/// 1. a negative lower bound `-k` appends the last `k` characters, reversed;
/// 2. a negative upper bound `-k` appends the first `k` characters;
/// 3. when both bounds (defaulting to `0` and `len - 1`) are non-negative and
///    ordered, appends the inclusive range `[lower, upper]`.
///
/// Every count and index is clamped to the string length.
pub fn substring(s: &str, lower: Option<i64>, upper: Option<i64>) -> String {
    let chars: Vec<char> = s.chars().collect();
    let n = chars.len();
    let clamp = |k: u64| usize::try_from(k).map_or(n, |k| k.min(n));
    let mut out = String::new();

    if let Some(lo) = lower.filter(|&lo| lo < 0) {
        let k = clamp(lo.unsigned_abs());
        out.extend(chars[n - k..].iter().rev());
    }
    if let Some(hi) = upper.filter(|&hi| hi < 0) {
        let k = clamp(hi.unsigned_abs());
        out.extend(&chars[..k]);
    }

    let start = lower.unwrap_or(0);
    let end = upper.unwrap_or(n as i64 - 1);
    if start >= 0 && end >= 0 && start <= end {
        let start = clamp(start.unsigned_abs());
        let end = clamp(end.unsigned_abs());
        if start < n {
            out.extend(&chars[start..=end.min(n - 1)]);
        }
    }
    out
}

// ── Tests ─────────────────────────────────────────────────────────────────────
