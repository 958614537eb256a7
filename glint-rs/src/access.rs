//! Per-native-type field accessor table.
//!
//! Expressions such as `player.name` on a [`Value::Native`] resolve the field
//! through accessors registered up front for the concrete Rust type.  There
//! is no reflection: an unregistered field reads as null.
//!
//! The table lives behind a [`parking_lot::RwLock`] so one [`Engine`]
//! (and its table) can serve renders on many threads.
//!
//! [`Engine`]: crate::engine::Engine

use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;
use thiserror::Error;

use crate::value::{NativeRef, Value};

/// Failure reading a field from a native object.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AccessError {
    #[error("accessor registered for `{expected}` received another type")]
    TypeMismatch { expected: &'static str },
    #[error("field `{field}` unavailable: {message}")]
    Unavailable { field: String, message: String },
}

type Accessor = Arc<dyn Fn(&dyn Any) -> Result<Value, AccessError> + Send + Sync>;

/// Registered field readers, keyed by concrete type then field name.
#[derive(Default)]
pub struct FieldAccessors {
    table: RwLock<HashMap<TypeId, HashMap<String, Accessor>>>,
}

impl std::fmt::Debug for FieldAccessors {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let table = self.table.read();
        f.debug_struct("FieldAccessors")
            .field("types", &table.len())
            .finish()
    }
}

impl FieldAccessors {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register (or replace) the reader for `field` on values of type `T`.
    pub fn register<T, F>(&self, field: &str, read: F)
    where
        T: Any,
        F: Fn(&T) -> Result<Value, AccessError> + Send + Sync + 'static,
    {
        let accessor: Accessor = Arc::new(move |obj: &dyn Any| match obj.downcast_ref::<T>() {
            Some(target) => read(target),
            None => Err(AccessError::TypeMismatch {
                expected: std::any::type_name::<T>(),
            }),
        });
        self.table
            .write()
            .entry(TypeId::of::<T>())
            .or_default()
            .insert(field.to_owned(), accessor);
    }

    /// Returns `true` if `T` has a reader for `field`.
    pub fn contains<T: Any>(&self, field: &str) -> bool {
        self.table
            .read()
            .get(&TypeId::of::<T>())
            .is_some_and(|fields| fields.contains_key(field))
    }

    /// Read `field` from `target`.  Missing accessors and read failures are
    /// logged and yield [`Value::Null`].
    pub fn read(&self, target: &NativeRef, field: &str) -> Value {
        // Clone the accessor out so the lock is not held while user code runs.
        let accessor = self
            .table
            .read()
            .get(&target.type_id())
            .and_then(|fields| fields.get(field))
            .cloned();
        let Some(accessor) = accessor else {
            tracing::warn!(
                type_name = target.type_name(),
                field,
                "no accessor registered; reading as null"
            );
            return Value::Null;
        };
        match accessor(target.as_any()) {
            Ok(v) => v,
            Err(e) => {
                tracing::error!(type_name = target.type_name(), field, error = %e, "field read failed");
                Value::Null
            }
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug)]
    struct Player {
        name: String,
        level: i64,
    }

    fn accessors() -> FieldAccessors {
        let acc = FieldAccessors::new();
        acc.register::<Player, _>("name", |p| Ok(Value::Str(p.name.clone())));
        acc.register::<Player, _>("level", |p| Ok(Value::Int(p.level)));
        acc.register::<Player, _>("secret", |_| {
            Err(AccessError::Unavailable {
                field: "secret".into(),
                message: "offline".into(),
            })
        });
        acc
    }

    fn steve() -> NativeRef {
        NativeRef::new(Player {
            name: "Steve".into(),
            level: 30,
        })
    }

    #[test]
    fn reads_registered_fields() {
        let acc = accessors();
        assert_eq!(acc.read(&steve(), "name"), Value::from("Steve"));
        assert_eq!(acc.read(&steve(), "level"), Value::Int(30));
    }

    #[test]
    fn missing_field_is_null() {
        assert_eq!(accessors().read(&steve(), "health"), Value::Null);
    }

    #[test]
    fn failing_accessor_is_null() {
        assert_eq!(accessors().read(&steve(), "secret"), Value::Null);
    }

    #[test]
    fn unregistered_type_is_null() {
        let other = NativeRef::new(42u8);
        assert_eq!(accessors().read(&other, "name"), Value::Null);
    }

    #[test]
    fn register_replaces() {
        let acc = accessors();
        acc.register::<Player, _>("name", |_| Ok(Value::from("anon")));
        assert_eq!(acc.read(&steve(), "name"), Value::from("anon"));
        assert!(acc.contains::<Player>("level"));
        assert!(!acc.contains::<Player>("mana"));
    }

    #[test]
    fn shared_across_threads() {
        let acc = Arc::new(accessors());
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let acc = Arc::clone(&acc);
                std::thread::spawn(move || acc.read(&steve(), "level"))
            })
            .collect();
        for h in handles {
            assert_eq!(h.join().unwrap(), Value::Int(30));
        }
    }
}
