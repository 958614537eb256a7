//! Runtime value type for template expressions.
//!
//! Values are dynamically typed.  Every coercion is total: a value of any
//! kind converts to an integer, float, boolean, string or sequence without
//! failing, falling back to a fixed default when the input makes no sense
//! for the target kind.

use std::any::{Any, TypeId};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

// ── Native objects ────────────────────────────────────────────────────────────

/// A host object carried through expressions without the evaluator knowing
/// its shape.  Fields are read through [`FieldAccessors`](crate::access::FieldAccessors).
pub trait NativeObject: Any + Send + Sync + fmt::Debug {
    fn as_any(&self) -> &dyn Any;
}

impl<T: Any + Send + Sync + fmt::Debug> NativeObject for T {
    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Shared handle to a [`NativeObject`].
///
/// Cloning is a reference-count increment.  Equality is identity.
#[derive(Clone)]
pub struct NativeRef {
    obj: Arc<dyn NativeObject>,
    type_name: &'static str,
}

impl NativeRef {
    pub fn new<T: NativeObject>(obj: T) -> Self {
        Self {
            obj: Arc::new(obj),
            type_name: std::any::type_name::<T>(),
        }
    }

    /// The concrete type of the wrapped object.
    pub fn type_id(&self) -> TypeId {
        NativeObject::as_any(&*self.obj).type_id()
    }

    /// Rust type name of the wrapped object, for diagnostics.
    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        NativeObject::as_any(&*self.obj).downcast_ref::<T>()
    }

    pub fn as_any(&self) -> &dyn Any {
        NativeObject::as_any(&*self.obj)
    }
}

impl fmt::Debug for NativeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Native<{}>", self.type_name)
    }
}

impl PartialEq for NativeRef {
    fn eq(&self, other: &Self) -> bool {
        std::ptr::addr_eq(Arc::as_ptr(&self.obj), Arc::as_ptr(&other.obj))
    }
}

// ── Value ─────────────────────────────────────────────────────────────────────

/// A template runtime value.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Int(i64),
    Float(f64),
    Bool(bool),
    Str(String),
    List(Vec<Value>),
    Map(BTreeMap<String, Value>),
    Native(NativeRef),
}

impl Default for Value {
    fn default() -> Self {
        Value::Null
    }
}

/// Result of numeric coercion: arithmetic keeps integer semantics only when
/// both operands coerce to [`Number::Int`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Number {
    Int(i64),
    Float(f64),
}

impl Number {
    pub fn as_f64(self) -> f64 {
        match self {
            Number::Int(n) => n as f64,
            Number::Float(x) => x,
        }
    }
}

impl From<Number> for Value {
    fn from(n: Number) -> Self {
        match n {
            Number::Int(n) => Value::Int(n),
            Number::Float(x) => Value::Float(x),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => f.write_str("null"),
            Value::Int(n) => write!(f, "{n}"),
            Value::Float(x) => {
                if x.fract() == 0.0 && x.abs() < 1e15 {
                    write!(f, "{x:.1}")
                } else {
                    write!(f, "{x}")
                }
            }
            Value::Bool(b) => write!(f, "{b}"),
            Value::Str(s) => f.write_str(s),
            Value::List(items) => {
                f.write_str("[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{item}")?;
                }
                f.write_str("]")
            }
            Value::Map(map) => {
                f.write_str("{")?;
                for (i, (k, v)) in map.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{k}={v}")?;
                }
                f.write_str("}")
            }
            Value::Native(n) => write!(f, "{:?}", n.obj),
        }
    }
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Wrap a host object.
    pub fn native<T: NativeObject>(obj: T) -> Self {
        Value::Native(NativeRef::new(obj))
    }

    /// Coerce to `i64`: null is 0, numbers pass through (floats truncate),
    /// anything else is stringified and parsed as an integer, then as a
    /// float, else 0.
    pub fn as_int(&self) -> i64 {
        match self {
            Value::Null => 0,
            Value::Int(n) => *n,
            Value::Float(x) => *x as i64,
            other => {
                let s = other.as_str();
                let s = s.trim();
                s.parse::<i64>()
                    .ok()
                    .or_else(|| parse_float(s).map(|x| x as i64))
                    .unwrap_or(0)
            }
        }
    }

    /// Coerce to `f64`, same fallback chain as [`Value::as_int`].
    pub fn as_float(&self) -> f64 {
        match self {
            Value::Null => 0.0,
            Value::Int(n) => *n as f64,
            Value::Float(x) => *x,
            other => {
                let s = other.as_str();
                let s = s.trim();
                s.parse::<i64>()
                    .ok()
                    .map(|n| n as f64)
                    .or_else(|| parse_float(s))
                    .unwrap_or(0.0)
            }
        }
    }

    /// Coerce to an integer-or-float for arithmetic.
    pub fn as_number(&self) -> Number {
        match self {
            Value::Null => Number::Int(0),
            Value::Int(n) => Number::Int(*n),
            Value::Float(x) => Number::Float(*x),
            other => {
                let s = other.as_str();
                let s = s.trim();
                if let Ok(n) = s.parse::<i64>() {
                    Number::Int(n)
                } else if let Some(x) = parse_float(s) {
                    Number::Float(x)
                } else {
                    Number::Int(0)
                }
            }
        }
    }

    /// Coerce to boolean.
    ///
    /// Strings follow their own rule: `"true"` and the empty string are
    /// true, `"false"` and every other string are false.
    pub fn as_bool(&self) -> bool {
        match self {
            Value::Null => false,
            Value::Int(n) => *n != 0,
            Value::Float(x) => *x != 0.0,
            Value::Bool(b) => *b,
            Value::Str(s) => str_truth(s),
            other => str_truth(&other.as_str()),
        }
    }

    /// Coerce to a string.  Containers stringify their first element
    /// (first key for maps); an empty container, like null, becomes `"null"`.
    pub fn as_str(&self) -> String {
        match self {
            Value::Str(s) => s.clone(),
            Value::List(items) => match items.first() {
                Some(first) => first.as_str(),
                None => Value::Null.to_string(),
            },
            Value::Map(map) => match map.keys().next() {
                Some(key) => key.clone(),
                None => Value::Null.to_string(),
            },
            other => other.to_string(),
        }
    }

    /// Coerce to a sequence: lists copy, maps yield their keys, anything
    /// else becomes a one-element list.
    pub fn as_list(&self) -> Vec<Value> {
        match self {
            Value::List(items) => items.clone(),
            Value::Map(map) => map.keys().cloned().map(Value::Str).collect(),
            other => vec![other.clone()],
        }
    }

    /// Name of the value's kind, for diagnostics.
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Int(_) => "integer",
            Value::Float(_) => "float",
            Value::Bool(_) => "boolean",
            Value::Str(_) => "string",
            Value::List(_) => "list",
            Value::Map(_) => "map",
            Value::Native(n) => n.type_name(),
        }
    }
}

fn str_truth(s: &str) -> bool {
    match s {
        "true" | "" => true,
        _ => false,
    }
}

/// Float parse that rejects the word forms (`inf`, `NaN`) Rust accepts.
fn parse_float(s: &str) -> Option<f64> {
    if s.is_empty() || s.chars().any(|c| c.is_ascii_alphabetic() && !matches!(c, 'e' | 'E')) {
        return None;
    }
    s.parse().ok()
}

// ── Coercion ──────────────────────────────────────────────────────────────────

/// Pluggable value interpreter.
///
/// The evaluator routes every coercion through this trait so embedders can
/// change, say, boolean truthiness without touching the evaluator.  The
/// default methods delegate to the inherent [`Value`] coercions.
pub trait Coercion: Send + Sync {
    fn as_int(&self, v: &Value) -> i64 {
        v.as_int()
    }

    fn as_float(&self, v: &Value) -> f64 {
        v.as_float()
    }

    fn as_number(&self, v: &Value) -> Number {
        v.as_number()
    }

    fn as_bool(&self, v: &Value) -> bool {
        v.as_bool()
    }

    fn as_str(&self, v: &Value) -> String {
        v.as_str()
    }

    fn as_list(&self, v: &Value) -> Vec<Value> {
        v.as_list()
    }
}

/// The stock coercion rules.
#[derive(Debug, Default, Clone, Copy)]
pub struct DefaultCoercion;

impl Coercion for DefaultCoercion {}

// ── Conversions ───────────────────────────────────────────────────────────────

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Int(n)
    }
}

impl From<f64> for Value {
    fn from(x: f64) -> Self {
        Value::Float(x)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Str(s)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Str(s.to_owned())
    }
}

impl From<Vec<Value>> for Value {
    fn from(items: Vec<Value>) -> Self {
        Value::List(items)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map_or(Value::Null, Into::into)
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn map(pairs: &[(&str, Value)]) -> Value {
        Value::Map(pairs.iter().map(|(k, v)| ((*k).to_owned(), v.clone())).collect())
    }

    #[test]
    fn display_scalars() {
        assert_eq!(Value::Int(-7).to_string(), "-7");
        assert_eq!(Value::Float(1.0).to_string(), "1.0");
        assert_eq!(Value::Float(2.5).to_string(), "2.5");
        assert_eq!(Value::Bool(true).to_string(), "true");
        assert_eq!(Value::Null.to_string(), "null");
    }

    #[test]
    fn display_containers() {
        let list = Value::List(vec![Value::Int(1), "a".into()]);
        assert_eq!(list.to_string(), "[1, a]");
        assert_eq!(map(&[("k", Value::Int(2))]).to_string(), "{k=2}");
    }

    #[test]
    fn as_int_coercions() {
        assert_eq!(Value::Null.as_int(), 0);
        assert_eq!(Value::Float(3.9).as_int(), 3);
        assert_eq!(Value::from("42").as_int(), 42);
        assert_eq!(Value::from("4.5").as_int(), 4);
        assert_eq!(Value::from("abc").as_int(), 0);
        assert_eq!(Value::Bool(true).as_int(), 0);
        assert_eq!(Value::from("inf").as_int(), 0);
    }

    #[test]
    fn as_float_coercions() {
        assert_eq!(Value::Int(2).as_float(), 2.0);
        assert_eq!(Value::from("1e3").as_float(), 1000.0);
        assert_eq!(Value::from("NaN").as_float(), 0.0);
    }

    #[test]
    fn as_number_keeps_kind() {
        assert_eq!(Value::from("7").as_number(), Number::Int(7));
        assert_eq!(Value::from("7.0").as_number(), Number::Float(7.0));
        assert_eq!(Value::Null.as_number(), Number::Int(0));
    }

    #[test]
    fn as_bool_string_rule() {
        assert!(Value::from("true").as_bool());
        assert!(!Value::from("false").as_bool());
        assert!(Value::from("").as_bool());
        assert!(!Value::from("yes").as_bool());
        assert!(!Value::from("1").as_bool());
    }

    #[test]
    fn as_bool_scalars() {
        assert!(!Value::Null.as_bool());
        assert!(Value::Int(-1).as_bool());
        assert!(!Value::Float(0.0).as_bool());
        assert!(Value::Bool(true).as_bool());
    }

    #[test]
    fn as_str_drills_into_first_element() {
        let nested = Value::List(vec![Value::List(vec!["inner".into(), "x".into()])]);
        assert_eq!(nested.as_str(), "inner");
        assert_eq!(Value::List(vec![]).as_str(), "null");
        assert_eq!(map(&[("b", Value::Int(1)), ("a", Value::Int(2))]).as_str(), "a");
    }

    #[test]
    fn as_list_shapes() {
        assert_eq!(Value::Int(3).as_list(), vec![Value::Int(3)]);
        assert_eq!(
            map(&[("x", Value::Null), ("y", Value::Null)]).as_list(),
            vec![Value::from("x"), Value::from("y")]
        );
        let list = Value::List(vec![Value::Int(1)]);
        assert_eq!(list.as_list(), vec![Value::Int(1)]);
    }

    #[derive(Debug)]
    struct Player {
        name: &'static str,
    }

    #[test]
    fn native_downcast_and_identity() {
        let v = Value::native(Player { name: "Alex" });
        let Value::Native(n) = &v else { panic!("not native") };
        assert_eq!(n.downcast_ref::<Player>().map(|p| p.name), Some("Alex"));
        assert_eq!(n.type_id(), TypeId::of::<Player>());
        assert_eq!(v.clone(), v);
        assert_ne!(v, Value::native(Player { name: "Alex" }));
    }

    #[test]
    fn custom_coercion_overrides_default() {
        struct Truthy;
        impl Coercion for Truthy {
            fn as_bool(&self, v: &Value) -> bool {
                !v.as_str().is_empty()
            }
        }
        assert!(Truthy.as_bool(&Value::from("yes")));
        assert_eq!(Truthy.as_int(&Value::from("9")), 9);
        assert!(!DefaultCoercion.as_bool(&Value::from("yes")));
    }

    #[test]
    fn from_impls() {
        let v: Value = 42i64.into();
        assert_eq!(v, Value::Int(42));
        let v: Value = None::<i64>.into();
        assert_eq!(v, Value::Null);
        let v: Value = true.into();
        assert_eq!(v, Value::Bool(true));
    }
}
