//! Value utility functions shared across modules
//!
//! Query and update semantics follow scripting-language coercion rules:
//! loose equality, numeric coercion for relational operators and
//! arithmetic, and string coercion for pattern matching. `None` stands for
//! an absent field throughout.

use serde_json::Value;
use std::cmp::Ordering;

/// Largest integer an `f64` represents exactly.
const MAX_SAFE_INTEGER: f64 = 9_007_199_254_740_991.0;

/// A value reduced to a primitive, the form coercion rules operate on.
#[derive(Debug, Clone, PartialEq)]
enum Primitive {
    Undefined,
    Null,
    Bool(bool),
    Number(f64),
    Str(String),
}

impl Primitive {
    fn from_value(value: Option<&Value>) -> Primitive {
        match value {
            None => Primitive::Undefined,
            Some(Value::Null) => Primitive::Null,
            Some(Value::Bool(b)) => Primitive::Bool(*b),
            Some(Value::Number(n)) => Primitive::Number(n.as_f64().unwrap_or(f64::NAN)),
            Some(Value::String(s)) => Primitive::Str(s.clone()),
            Some(other) => Primitive::Str(to_js_string(other)),
        }
    }

    fn to_number(&self) -> f64 {
        match self {
            Primitive::Undefined => f64::NAN,
            Primitive::Null => 0.0,
            Primitive::Bool(b) => {
                if *b {
                    1.0
                } else {
                    0.0
                }
            }
            Primitive::Number(n) => *n,
            Primitive::Str(s) => parse_number(s),
        }
    }

    fn is_nullish(&self) -> bool {
        matches!(self, Primitive::Undefined | Primitive::Null)
    }
}

/// Parse a string the way numeric coercion does: surrounding whitespace is
/// ignored, the empty string is zero, anything unparsable is NaN.
fn parse_number(s: &str) -> f64 {
    let t = s.trim();
    if t.is_empty() {
        return 0.0;
    }
    match t {
        "Infinity" | "+Infinity" => return f64::INFINITY,
        "-Infinity" => return f64::NEG_INFINITY,
        _ => {}
    }
    if let Some(hex) = t.strip_prefix("0x").or_else(|| t.strip_prefix("0X")) {
        return u64::from_str_radix(hex, 16)
            .map(|v| v as f64)
            .unwrap_or(f64::NAN);
    }
    // Rust accepts "inf"/"nan" spellings that must stay NaN here
    if t.chars().any(|c| c.is_ascii_alphabetic() && c != 'e' && c != 'E') {
        return f64::NAN;
    }
    t.parse::<f64>().unwrap_or(f64::NAN)
}

/// Numeric coercion of a possibly absent value.
pub fn to_number(value: Option<&Value>) -> f64 {
    Primitive::from_value(value).to_number()
}

/// String coercion of a value.
///
/// Integral numbers print without a fractional part, arrays join their
/// elements with `,` (null elements print empty), objects print as
/// `[object Object]`.
pub fn to_js_string(value: &Value) -> String {
    match value {
        Value::Null => "null".to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                i.to_string()
            } else if let Some(u) = n.as_u64() {
                u.to_string()
            } else {
                format_f64(n.as_f64().unwrap_or(f64::NAN))
            }
        }
        Value::String(s) => s.clone(),
        Value::Array(items) => items
            .iter()
            .map(|item| match item {
                Value::Null => String::new(),
                other => to_js_string(other),
            })
            .collect::<Vec<_>>()
            .join(","),
        Value::Object(_) => "[object Object]".to_string(),
    }
}

fn format_f64(f: f64) -> String {
    if f.is_nan() {
        "NaN".to_string()
    } else if f.is_infinite() {
        let s = if f > 0.0 { "Infinity" } else { "-Infinity" };
        s.to_string()
    } else if f.fract() == 0.0 && f.abs() < 1e21 {
        format!("{:.0}", f)
    } else {
        f.to_string()
    }
}

/// Loose equality (`==`).
///
/// Absent and null equal each other and nothing else. Mixed primitive
/// types are compared numerically. Two arrays or two objects compare
/// structurally; an array or object against a primitive compares its
/// string form.
pub fn loose_eq(a: Option<&Value>, b: Option<&Value>) -> bool {
    match (a, b) {
        (
            Some(x @ (Value::Array(_) | Value::Object(_))),
            Some(y @ (Value::Array(_) | Value::Object(_))),
        ) => x == y,
        _ => primitive_loose_eq(&Primitive::from_value(a), &Primitive::from_value(b)),
    }
}

fn primitive_loose_eq(a: &Primitive, b: &Primitive) -> bool {
    match (a, b) {
        (x, y) if x.is_nullish() && y.is_nullish() => true,
        (x, y) if x.is_nullish() || y.is_nullish() => false,
        (Primitive::Str(x), Primitive::Str(y)) => x == y,
        (Primitive::Bool(x), Primitive::Bool(y)) => x == y,
        // NaN never equals anything, including itself
        _ => a.to_number() == b.to_number(),
    }
}

/// Strict equality used for membership tests.
///
/// Numbers compare by value regardless of integer/float representation;
/// everything else compares structurally. An absent value is never a member.
pub fn strict_eq(a: Option<&Value>, b: &Value) -> bool {
    match (a, b) {
        (None, _) => false,
        (Some(Value::Number(x)), Value::Number(y)) => x.as_f64() == y.as_f64(),
        (Some(x), y) => x == y,
    }
}

/// Relational comparison (`<`, `<=`, `>`, `>=`).
///
/// Two strings compare lexicographically, anything else numerically.
/// Returns `None` when the comparison is undefined (a NaN operand), in which
/// case every relational operator is false.
pub fn relational_compare(a: Option<&Value>, b: &Value) -> Option<Ordering> {
    let pa = Primitive::from_value(a);
    let pb = Primitive::from_value(Some(b));
    match (&pa, &pb) {
        (Primitive::Str(x), Primitive::Str(y)) => Some(x.cmp(y)),
        _ => pa.to_number().partial_cmp(&pb.to_number()),
    }
}

/// Position of a value's kind in the `order_by` ordering.
fn kind_rank(value: Option<&Value>) -> u8 {
    match value {
        None => 0,
        Some(Value::Null) => 1,
        Some(Value::Number(_)) => 2,
        Some(Value::String(_)) => 3,
        Some(Value::Bool(_)) => 4,
        Some(Value::Object(_)) => 5,
        Some(Value::Array(_)) => 6,
    }
}

/// Ordering used by `order_by`.
///
/// Kinds rank absent, null, number, string, bool, object, array. Within a
/// kind, numbers compare numerically, strings by code point and `false`
/// precedes `true`; nulls, objects and arrays tie among themselves, leaving
/// them in iteration order under a stable sort. The result is a total
/// order, as `sort_by` requires.
pub fn sort_compare(a: Option<&Value>, b: Option<&Value>) -> Ordering {
    kind_rank(a).cmp(&kind_rank(b)).then_with(|| match (a, b) {
        (Some(Value::Number(x)), Some(Value::Number(y))) => {
            let x = x.as_f64().unwrap_or(0.0);
            let y = y.as_f64().unwrap_or(0.0);
            x.total_cmp(&y)
        }
        (Some(Value::String(x)), Some(Value::String(y))) => x.cmp(y),
        (Some(Value::Bool(x)), Some(Value::Bool(y))) => x.cmp(y),
        _ => Ordering::Equal,
    })
}

/// Arithmetic performed by the `inc` and `mul` update operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Arith {
    Add,
    Mul,
}

/// Apply `current <op> operand` with coercion.
///
/// Integers stay integers while the result fits in `i64`. Adding where
/// either side is a string concatenates. A non-finite result is stored as
/// `null`, the form NaN and infinities take in a JSON snapshot.
pub fn arith(current: Option<&Value>, operand: &Value, op: Arith) -> Value {
    if let (Some(Value::Number(x)), Value::Number(y)) = (current, operand) {
        if let (Some(x), Some(y)) = (x.as_i64(), y.as_i64()) {
            let exact = match op {
                Arith::Add => x.checked_add(y),
                Arith::Mul => x.checked_mul(y),
            };
            if let Some(v) = exact {
                return Value::from(v);
            }
        }
    }

    let pa = Primitive::from_value(current);
    let pb = Primitive::from_value(Some(operand));

    if op == Arith::Add {
        if let (Primitive::Str(_), _) | (_, Primitive::Str(_)) = (&pa, &pb) {
            return Value::String(format!("{}{}", primitive_string(&pa), primitive_string(&pb)));
        }
    }

    let result = match op {
        Arith::Add => pa.to_number() + pb.to_number(),
        Arith::Mul => pa.to_number() * pb.to_number(),
    };
    number_value(result)
}

fn primitive_string(p: &Primitive) -> String {
    match p {
        Primitive::Undefined => "undefined".to_string(),
        Primitive::Null => "null".to_string(),
        Primitive::Bool(b) => b.to_string(),
        Primitive::Number(n) => format_f64(*n),
        Primitive::Str(s) => s.clone(),
    }
}

/// Convert an `f64` result into a JSON value, folding integral values back
/// into integers.
pub fn number_value(f: f64) -> Value {
    if !f.is_finite() {
        return Value::Null;
    }
    if f.fract() == 0.0 && f.abs() <= MAX_SAFE_INTEGER {
        return Value::from(f as i64);
    }
    serde_json::Number::from_f64(f)
        .map(Value::Number)
        .unwrap_or(Value::Null)
}
