// src/query/operators.rs
//! Predicate operators behind [`Command`]
//!
//! Each comparison is its own type implementing [`Predicate`], so a command
//! can be inspected (`name()`, `Debug`) and tested in isolation. Combinators
//! hold `Command`s, which share their predicate through an `Arc`: composing
//! never mutates or consumes its inputs.
//!
//! ```text
//! Predicate trait
//!     ↓
//! ┌──────────────────────┬──────────────┬─────────────┐
//! │ Comparison           │ Membership   │ Logical     │
//! │ (eq, neq, lt, ...)   │ (in, nin)    │ (and, or)   │
//! └──────────────────────┴──────────────┴─────────────┘
//! ```

use std::cmp::Ordering;
use std::fmt;
use std::num::NonZeroUsize;
use std::sync::Arc;

use lazy_static::lazy_static;
use lru::LruCache;
use parking_lot::Mutex;
use regex::Regex;
use serde_json::Value;

use crate::error::{LocalDbError, Result};
use crate::value_utils::{loose_eq, relational_compare, strict_eq, to_js_string};

// ============================================================================
// PATTERN CACHE
// ============================================================================

const REGEX_CACHE_CAPACITY: usize = 100;

lazy_static! {
    /// Compiled patterns keyed by source
    static ref REGEX_CACHE: Mutex<LruCache<String, Regex>> = Mutex::new(LruCache::new(
        NonZeroUsize::new(REGEX_CACHE_CAPACITY).unwrap_or(NonZeroUsize::MIN)
    ));
}

/// Get or compile a pattern, reusing earlier compilations.
pub fn compile_pattern(source: &str) -> Result<Regex> {
    if let Some(regex) = REGEX_CACHE.lock().get(source) {
        return Ok(regex.clone());
    }

    let regex = Regex::new(source).map_err(|e| {
        LocalDbError::InvalidQuery(format!("Invalid pattern '{}': {}", source, e))
    })?;
    REGEX_CACHE.lock().put(source.to_string(), regex.clone());
    Ok(regex)
}

/// Match a pattern against a field value.
///
/// Non-string values are matched against their string form; an absent
/// field never matches.
pub fn pattern_matches(regex: &Regex, value: Option<&Value>) -> bool {
    match value {
        None => false,
        Some(Value::String(s)) => regex.is_match(s),
        Some(other) => regex.is_match(&to_js_string(other)),
    }
}

// ============================================================================
// TRAIT DEFINITION
// ============================================================================

/// A single-argument test over one field's value.
///
/// `value` is `None` when the field is absent from the document.
pub trait Predicate: Send + Sync + fmt::Debug {
    /// Operator name (e.g. "eq", "and")
    fn name(&self) -> &'static str;

    fn test(&self, value: Option<&Value>) -> bool;
}

// ============================================================================
// COMPARISON OPERATORS
// ============================================================================

/// Loose equality with the operand.
#[derive(Debug, Clone)]
pub struct EqOperator(pub Value);

impl Predicate for EqOperator {
    fn name(&self) -> &'static str {
        "eq"
    }

    fn test(&self, value: Option<&Value>) -> bool {
        loose_eq(value, Some(&self.0))
    }
}

/// Loose inequality with the operand.
#[derive(Debug, Clone)]
pub struct NeqOperator(pub Value);

impl Predicate for NeqOperator {
    fn name(&self) -> &'static str {
        "neq"
    }

    fn test(&self, value: Option<&Value>) -> bool {
        !loose_eq(value, Some(&self.0))
    }
}

macro_rules! relational_operator {
    ($(#[$doc:meta])* $ty:ident, $name:literal, $accept:pat) => {
        $(#[$doc])*
        #[derive(Debug, Clone)]
        pub struct $ty(pub Value);

        impl Predicate for $ty {
            fn name(&self) -> &'static str {
                $name
            }

            fn test(&self, value: Option<&Value>) -> bool {
                matches!(relational_compare(value, &self.0), Some($accept))
            }
        }
    };
}

relational_operator!(
    /// Value strictly less than the operand.
    LtOperator, "lt", Ordering::Less
);
relational_operator!(
    /// Value less than or equal to the operand.
    LteOperator, "lte", Ordering::Less | Ordering::Equal
);
relational_operator!(
    /// Value strictly greater than the operand.
    GtOperator, "gt", Ordering::Greater
);
relational_operator!(
    /// Value greater than or equal to the operand.
    GteOperator, "gte", Ordering::Greater | Ordering::Equal
);

// ============================================================================
// MEMBERSHIP / ELEMENT OPERATORS
// ============================================================================

/// Value is one of the operands.
#[derive(Debug, Clone)]
pub struct InOperator(pub Vec<Value>);

impl Predicate for InOperator {
    fn name(&self) -> &'static str {
        "in"
    }

    fn test(&self, value: Option<&Value>) -> bool {
        self.0.iter().any(|candidate| strict_eq(value, candidate))
    }
}

/// Value is none of the operands.
#[derive(Debug, Clone)]
pub struct NinOperator(pub Vec<Value>);

impl Predicate for NinOperator {
    fn name(&self) -> &'static str {
        "nin"
    }

    fn test(&self, value: Option<&Value>) -> bool {
        !self.0.iter().any(|candidate| strict_eq(value, candidate))
    }
}

/// Presence check. Absent and `null` both count as "not present".
#[derive(Debug, Clone)]
pub struct ExistsOperator(pub bool);

impl Predicate for ExistsOperator {
    fn name(&self) -> &'static str {
        "exists"
    }

    fn test(&self, value: Option<&Value>) -> bool {
        let present = !matches!(value, None | Some(Value::Null));
        present == self.0
    }
}

// ============================================================================
// LOGICAL OPERATORS
// ============================================================================

#[derive(Debug, Clone)]
pub struct AndOperator(pub Command, pub Command);

impl Predicate for AndOperator {
    fn name(&self) -> &'static str {
        "and"
    }

    fn test(&self, value: Option<&Value>) -> bool {
        self.0.test(value) && self.1.test(value)
    }
}

#[derive(Debug, Clone)]
pub struct OrOperator(pub Command, pub Command);

impl Predicate for OrOperator {
    fn name(&self) -> &'static str {
        "or"
    }

    fn test(&self, value: Option<&Value>) -> bool {
        self.0.test(value) || self.1.test(value)
    }
}

// ============================================================================
// COMMAND
// ============================================================================

/// Composable single-field predicate.
///
/// Cheap to clone; clones share the underlying predicate.
#[derive(Clone)]
pub struct Command(Arc<dyn Predicate>);

impl Command {
    pub fn new<P: Predicate + 'static>(predicate: P) -> Self {
        Command(Arc::new(predicate))
    }

    pub fn name(&self) -> &'static str {
        self.0.name()
    }

    pub fn test(&self, value: Option<&Value>) -> bool {
        self.0.test(value)
    }

    /// Both `self` and `other` must hold. `other` is not evaluated when
    /// `self` fails.
    pub fn and(&self, other: &Command) -> Command {
        Command::new(AndOperator(self.clone(), other.clone()))
    }

    /// Either `self` or `other` must hold. `other` is not evaluated when
    /// `self` holds.
    pub fn or(&self, other: &Command) -> Command {
        Command::new(OrOperator(self.clone(), other.clone()))
    }
}

impl fmt::Debug for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&*self.0, f)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering as AtomicOrdering};

    #[derive(Debug)]
    struct Counting(Arc<AtomicUsize>, bool);

    impl Predicate for Counting {
        fn name(&self) -> &'static str {
            "counting"
        }

        fn test(&self, _value: Option<&Value>) -> bool {
            self.0.fetch_add(1, AtomicOrdering::SeqCst);
            self.1
        }
    }

    #[test]
    fn test_eq_is_loose() {
        let eq = EqOperator(json!(1));
        assert!(eq.test(Some(&json!(1))));
        assert!(eq.test(Some(&json!("1"))));
        assert!(!eq.test(Some(&json!(2))));
        assert!(!eq.test(None));
        assert!(NeqOperator(json!(1)).test(None));
    }

    #[test]
    fn test_relational_operators() {
        assert!(LtOperator(json!(5)).test(Some(&json!(4))));
        assert!(!LtOperator(json!(5)).test(Some(&json!(5))));
        assert!(LteOperator(json!(5)).test(Some(&json!(5))));
        assert!(GtOperator(json!("b")).test(Some(&json!("c"))));
        assert!(GteOperator(json!(2)).test(Some(&json!(2.0))));
        // Undefined comparisons are false for every operator
        assert!(!GteOperator(json!(2)).test(None));
        assert!(!LtOperator(json!(2)).test(Some(&json!("abc"))));
    }

    #[test]
    fn test_membership() {
        let ops = InOperator(vec![json!(1), json!("x")]);
        assert!(ops.test(Some(&json!(1))));
        assert!(ops.test(Some(&json!("x"))));
        assert!(!ops.test(Some(&json!("1"))));
        assert!(!ops.test(None));
        assert!(NinOperator(vec![json!(1)]).test(None));
        assert!(!NinOperator(vec![json!(1)]).test(Some(&json!(1))));
    }

    #[test]
    fn test_exists() {
        assert!(ExistsOperator(true).test(Some(&json!(0))));
        assert!(!ExistsOperator(true).test(Some(&json!(null))));
        assert!(!ExistsOperator(true).test(None));
        assert!(ExistsOperator(false).test(None));
    }

    #[test]
    fn test_and_short_circuits() {
        let calls = Arc::new(AtomicUsize::new(0));
        let failing = Command::new(Counting(calls.clone(), false));
        let tail = Command::new(Counting(calls.clone(), true));

        assert!(!failing.and(&tail).test(Some(&json!(1))));
        assert_eq!(calls.load(AtomicOrdering::SeqCst), 1);
    }

    #[test]
    fn test_or_short_circuits() {
        let calls = Arc::new(AtomicUsize::new(0));
        let passing = Command::new(Counting(calls.clone(), true));
        let tail = Command::new(Counting(calls.clone(), false));

        assert!(passing.or(&tail).test(None));
        assert_eq!(calls.load(AtomicOrdering::SeqCst), 1);
    }

    #[test]
    fn test_composition_leaves_inputs_reusable() {
        let one = Command::new(EqOperator(json!(1)));
        let two = Command::new(EqOperator(json!(2)));
        let either = one.or(&two);
        let both = one.and(&two);

        assert_eq!(either.name(), "or");
        assert_eq!(both.name(), "and");
        assert!(either.test(Some(&json!(2))));
        assert!(!both.test(Some(&json!(1))));
        assert!(one.test(Some(&json!(1))));
        assert!(!one.test(Some(&json!(2))));
    }

    #[test]
    fn test_pattern_matching() {
        let regex = compile_pattern("^ab").unwrap();
        assert!(pattern_matches(&regex, Some(&json!("abc"))));
        assert!(!pattern_matches(&regex, Some(&json!("cab"))));
        assert!(!pattern_matches(&regex, None));

        let digits = compile_pattern(r"^\d+$").unwrap();
        assert!(pattern_matches(&digits, Some(&json!(42))));
    }

    #[test]
    fn test_invalid_pattern() {
        let err = compile_pattern("(unclosed").unwrap_err();
        assert!(matches!(err, LocalDbError::InvalidQuery(_)));
    }
}
