// src/command.rs
//! Factories for query predicates and update operators
//!
//! ```ignore
//! use localdb_core::command;
//!
//! let adults = Filter::new().field("age", command::gte(18));
//! let small = command::lt(10).or(&command::eq(100));
//! let bump = Patch::new().field("visits", command::inc(1));
//! ```

use regex::Regex;
use serde_json::Value;

use crate::error::Result;
use crate::query::operators::{
    compile_pattern, EqOperator, ExistsOperator, GtOperator, GteOperator, InOperator,
    LtOperator, LteOperator, NeqOperator, NinOperator,
};
use crate::query::{Command, Filter};
use crate::update::{
    FieldUpdate, IncOperator, MulOperator, PopOperator, PushOperator, RemoveOperator,
    SetOperator, ShiftOperator, UnshiftOperator,
};

// ============================================================================
// PREDICATES
// ============================================================================

/// Loose equality with `operand`
pub fn eq(operand: impl Into<Value>) -> Command {
    Command::new(EqOperator(operand.into()))
}

/// Loose inequality with `operand`
pub fn neq(operand: impl Into<Value>) -> Command {
    Command::new(NeqOperator(operand.into()))
}

pub fn lt(operand: impl Into<Value>) -> Command {
    Command::new(LtOperator(operand.into()))
}

pub fn lte(operand: impl Into<Value>) -> Command {
    Command::new(LteOperator(operand.into()))
}

pub fn gt(operand: impl Into<Value>) -> Command {
    Command::new(GtOperator(operand.into()))
}

pub fn gte(operand: impl Into<Value>) -> Command {
    Command::new(GteOperator(operand.into()))
}

/// Value is strictly equal to one of `operands`
pub fn in_<I, V>(operands: I) -> Command
where
    I: IntoIterator<Item = V>,
    V: Into<Value>,
{
    Command::new(InOperator(operands.into_iter().map(Into::into).collect()))
}

/// Value is strictly equal to none of `operands`
pub fn nin<I, V>(operands: I) -> Command
where
    I: IntoIterator<Item = V>,
    V: Into<Value>,
{
    Command::new(NinOperator(operands.into_iter().map(Into::into).collect()))
}

/// Field presence (`null` counts as absent) equals `flag`
pub fn exists(flag: bool) -> Command {
    Command::new(ExistsOperator(flag))
}

/// Disjunction of whole filters
pub fn or(alternatives: impl IntoIterator<Item = Filter>) -> Filter {
    Filter::Any(alternatives.into_iter().collect())
}

/// Compile a pattern criterion.
pub fn regex(source: &str) -> Result<Regex> {
    compile_pattern(source)
}

// ============================================================================
// UPDATE OPERATORS
// ============================================================================

/// Replace the field with a copy of `value`
pub fn set(value: impl Into<Value>) -> FieldUpdate {
    FieldUpdate::new(SetOperator(value.into()))
}

/// Delete the field
pub fn remove() -> FieldUpdate {
    FieldUpdate::new(RemoveOperator)
}

/// Add `amount` (string operands concatenate)
pub fn inc(amount: impl Into<Value>) -> FieldUpdate {
    FieldUpdate::new(IncOperator(amount.into()))
}

/// Multiply by `factor`
pub fn mul(factor: impl Into<Value>) -> FieldUpdate {
    FieldUpdate::new(MulOperator(factor.into()))
}

/// Append to an array field
pub fn push(item: impl Into<Value>) -> FieldUpdate {
    FieldUpdate::new(PushOperator(item.into()))
}

/// Drop the last element of an array field
pub fn pop() -> FieldUpdate {
    FieldUpdate::new(PopOperator)
}

/// Drop the first element of an array field
pub fn shift() -> FieldUpdate {
    FieldUpdate::new(ShiftOperator)
}

/// Prepend to an array field
pub fn unshift(item: impl Into<Value>) -> FieldUpdate {
    FieldUpdate::new(UnshiftOperator(item.into()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_factory_names() {
        assert_eq!(eq(1).name(), "eq");
        assert_eq!(nin([1, 2]).name(), "nin");
        assert_eq!(eq(1).or(&eq(2)).name(), "or");
        assert_eq!(set(1).name(), "set");
        assert_eq!(remove().name(), "remove");
    }

    #[test]
    fn test_membership() {
        let one_or_two = in_([1, 2]);
        assert!(one_or_two.test(Some(&json!(2))));
        assert!(!one_or_two.test(Some(&json!("2"))));
        assert!(!one_or_two.test(None));

        let not_listed = nin(["a", "b"]);
        assert!(not_listed.test(Some(&json!("c"))));
        assert!(not_listed.test(None));
        assert!(!not_listed.test(Some(&json!("a"))));
    }

    #[test]
    fn test_eq_or_and_algebra() {
        let either = eq(1).or(&eq(2));
        let both = eq(1).and(&eq(2));
        for v in [json!(1), json!(2), json!(3), json!("x"), json!(null)] {
            let expected = v == json!(1) || v == json!(2);
            assert_eq!(either.test(Some(&v)), expected, "{}", v);
            assert!(!both.test(Some(&v)));
        }
    }

    #[test]
    fn test_bad_regex() {
        assert!(regex("(").is_err());
        assert!(regex("^a+$").unwrap().is_match("aaa"));
    }

    #[test]
    fn test_or_builds_disjunction() {
        let f = or([Filter::new(), Filter::new()]);
        assert!(matches!(f, Filter::Any(ref alts) if alts.len() == 2));
    }
}
