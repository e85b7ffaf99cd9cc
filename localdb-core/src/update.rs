// src/update.rs
//! Update operators and patches
//!
//! A [`Patch`] maps field names to [`UpdateOperator`]s. Applying it
//! replaces each named field with the operator's result; fields the patch
//! does not name are never read or written.

use std::fmt;
use std::sync::Arc;

use indexmap::IndexMap;
use serde_json::Value;

use crate::document::Document;
use crate::error::{LocalDbError, Result};
use crate::value_utils::{arith, Arith};

/// Per-field transform.
pub trait UpdateOperator: Send + Sync + fmt::Debug {
    /// Operator name (e.g. "set", "inc")
    fn name(&self) -> &'static str;

    /// New value for a field given its current value. `None` on either
    /// side means the field is absent.
    fn apply(&self, current: Option<Value>) -> Option<Value>;
}

/// Literal replacement. The stored value is a copy of the operand.
#[derive(Debug, Clone)]
pub struct SetOperator(pub Value);

impl UpdateOperator for SetOperator {
    fn name(&self) -> &'static str {
        "set"
    }

    fn apply(&self, _current: Option<Value>) -> Option<Value> {
        Some(self.0.clone())
    }
}

/// Drops the field.
#[derive(Debug, Clone)]
pub struct RemoveOperator;

impl UpdateOperator for RemoveOperator {
    fn name(&self) -> &'static str {
        "remove"
    }

    fn apply(&self, _current: Option<Value>) -> Option<Value> {
        None
    }
}

/// `current + operand`, see [`arith`] for coercion.
#[derive(Debug, Clone)]
pub struct IncOperator(pub Value);

impl UpdateOperator for IncOperator {
    fn name(&self) -> &'static str {
        "inc"
    }

    fn apply(&self, current: Option<Value>) -> Option<Value> {
        Some(arith(current.as_ref(), &self.0, Arith::Add))
    }
}

/// `current * operand`, see [`arith`] for coercion.
#[derive(Debug, Clone)]
pub struct MulOperator(pub Value);

impl UpdateOperator for MulOperator {
    fn name(&self) -> &'static str {
        "mul"
    }

    fn apply(&self, current: Option<Value>) -> Option<Value> {
        Some(arith(current.as_ref(), &self.0, Arith::Mul))
    }
}

// Array operators: an absent field starts as an empty array for the
// inserting operators; any other non-array value is left as is.

/// Append to an array field.
#[derive(Debug, Clone)]
pub struct PushOperator(pub Value);

impl UpdateOperator for PushOperator {
    fn name(&self) -> &'static str {
        "push"
    }

    fn apply(&self, current: Option<Value>) -> Option<Value> {
        match current {
            Some(Value::Array(mut items)) => {
                items.push(self.0.clone());
                Some(Value::Array(items))
            }
            None => Some(Value::Array(vec![self.0.clone()])),
            other => other,
        }
    }
}

/// Drop the last element of an array field.
#[derive(Debug, Clone)]
pub struct PopOperator;

impl UpdateOperator for PopOperator {
    fn name(&self) -> &'static str {
        "pop"
    }

    fn apply(&self, current: Option<Value>) -> Option<Value> {
        match current {
            Some(Value::Array(mut items)) => {
                items.pop();
                Some(Value::Array(items))
            }
            other => other,
        }
    }
}

/// Drop the first element of an array field.
#[derive(Debug, Clone)]
pub struct ShiftOperator;

impl UpdateOperator for ShiftOperator {
    fn name(&self) -> &'static str {
        "shift"
    }

    fn apply(&self, current: Option<Value>) -> Option<Value> {
        match current {
            Some(Value::Array(mut items)) => {
                if !items.is_empty() {
                    items.remove(0);
                }
                Some(Value::Array(items))
            }
            other => other,
        }
    }
}

/// Prepend to an array field.
#[derive(Debug, Clone)]
pub struct UnshiftOperator(pub Value);

impl UpdateOperator for UnshiftOperator {
    fn name(&self) -> &'static str {
        "unshift"
    }

    fn apply(&self, current: Option<Value>) -> Option<Value> {
        match current {
            Some(Value::Array(mut items)) => {
                items.insert(0, self.0.clone());
                Some(Value::Array(items))
            }
            None => Some(Value::Array(vec![self.0.clone()])),
            other => other,
        }
    }
}

/// One entry of a [`Patch`]. Plain values convert into `set`.
#[derive(Clone)]
pub struct FieldUpdate(Arc<dyn UpdateOperator>);

impl FieldUpdate {
    pub fn new<O: UpdateOperator + 'static>(op: O) -> Self {
        FieldUpdate(Arc::new(op))
    }

    pub fn name(&self) -> &'static str {
        self.0.name()
    }

    pub fn apply(&self, current: Option<Value>) -> Option<Value> {
        self.0.apply(current)
    }
}

impl fmt::Debug for FieldUpdate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&*self.0, f)
    }
}

impl From<Value> for FieldUpdate {
    fn from(value: Value) -> Self {
        FieldUpdate::new(SetOperator(value))
    }
}

macro_rules! literal_update {
    ($($ty:ty),*) => {
        $(
            impl From<$ty> for FieldUpdate {
                fn from(value: $ty) -> Self {
                    FieldUpdate::new(SetOperator(Value::from(value)))
                }
            }
        )*
    };
}

literal_update!(&str, String, bool, i32, i64, u32, u64, f64);

/// Ordered field → update mapping.
#[derive(Debug, Clone, Default)]
pub struct Patch {
    fields: IndexMap<String, FieldUpdate>,
}

impl Patch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn field(mut self, name: impl Into<String>, update: impl Into<FieldUpdate>) -> Self {
        self.fields.insert(name.into(), update.into());
        self
    }

    /// Plain JSON patch: every field is a literal `set`.
    pub fn from_value(value: &Value) -> Result<Self> {
        let Value::Object(map) = value else {
            return Err(LocalDbError::InvalidPatch);
        };
        Ok(Patch {
            fields: map
                .iter()
                .map(|(k, v)| (k.clone(), FieldUpdate::from(v.clone())))
                .collect(),
        })
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Apply every field update to `doc` in place.
    pub fn apply(&self, doc: &mut Document) {
        for (name, update) in &self.fields {
            let current = doc.get_mut(name).map(Value::take);
            match update.apply(current) {
                Some(value) => {
                    doc.insert(name.clone(), value);
                }
                None => {
                    doc.shift_remove(name);
                }
            }
        }
    }
}
