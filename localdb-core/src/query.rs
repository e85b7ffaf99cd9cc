// src/query.rs
//! Query filters for `Collection::filter`
//!
//! A [`Filter`] is either a field map, where every field's [`Criterion`]
//! must hold, or a disjunction of filters, where at least one must hold.
//!
//! ```ignore
//! use localdb_core::{command, Filter};
//!
//! let adults = Filter::new()
//!     .field("age", command::gte(18))
//!     .field("name", command::regex("^A")?);
//! let either = command::or([
//!     Filter::new().field("city", "NYC"),
//!     Filter::new().field("city", "LA"),
//! ]);
//! ```

pub mod operators;

use indexmap::IndexMap;
use regex::Regex;
use serde_json::Value;

use crate::document::{Document, ID_FIELD};
use crate::error::{LocalDbError, Result};
use crate::value_utils::loose_eq;

pub use operators::{Command, Predicate};

/// Test applied to one field of a document.
#[derive(Debug, Clone)]
pub enum Criterion {
    /// Loose equality with a literal
    Literal(Value),
    Command(Command),
    /// Pattern match against the value's string form
    Pattern(Regex),
}

impl Criterion {
    pub fn matches(&self, value: Option<&Value>) -> bool {
        match self {
            Criterion::Literal(expected) => loose_eq(value, Some(expected)),
            Criterion::Command(command) => command.test(value),
            Criterion::Pattern(regex) => operators::pattern_matches(regex, value),
        }
    }
}

impl From<Value> for Criterion {
    fn from(value: Value) -> Self {
        Criterion::Literal(value)
    }
}

impl From<Command> for Criterion {
    fn from(command: Command) -> Self {
        Criterion::Command(command)
    }
}

impl From<Regex> for Criterion {
    fn from(regex: Regex) -> Self {
        Criterion::Pattern(regex)
    }
}

macro_rules! literal_criterion {
    ($($ty:ty),*) => {
        $(
            impl From<$ty> for Criterion {
                fn from(value: $ty) -> Self {
                    Criterion::Literal(Value::from(value))
                }
            }
        )*
    };
}

literal_criterion!(&str, String, bool, i32, i64, u32, u64, f64);

/// Document filter.
#[derive(Debug, Clone)]
pub enum Filter {
    /// Every field criterion must hold. Empty matches everything.
    Fields(IndexMap<String, Criterion>),
    /// At least one alternative must hold. Empty matches nothing.
    Any(Vec<Filter>),
}

impl Filter {
    /// Empty field filter (matches every document)
    pub fn new() -> Self {
        Filter::Fields(IndexMap::new())
    }

    /// Add a field criterion.
    ///
    /// On a disjunction the criterion is added to every alternative, which
    /// is the same as requiring it alongside the whole disjunction.
    pub fn field(self, name: impl Into<String>, criterion: impl Into<Criterion>) -> Self {
        let name = name.into();
        let criterion = criterion.into();
        match self {
            Filter::Fields(mut fields) => {
                fields.insert(name, criterion);
                Filter::Fields(fields)
            }
            Filter::Any(alternatives) => Filter::Any(
                alternatives
                    .into_iter()
                    .map(|alt| alt.field(name.clone(), criterion.clone()))
                    .collect(),
            ),
        }
    }

    /// Build a filter from plain JSON.
    ///
    /// Field values are literal equality criteria. An object of the form
    /// `{"type": "or", "arr": [...]}` is a disjunction of the filters in `arr`.
    pub fn from_value(value: &Value) -> Result<Self> {
        let Value::Object(map) = value else {
            return Err(LocalDbError::InvalidQuery(format!(
                "filter must be a JSON object, got {}",
                value
            )));
        };

        if let (Some(Value::String(kind)), Some(Value::Array(alternatives)), 2) =
            (map.get("type"), map.get("arr"), map.len())
        {
            if kind == "or" {
                return alternatives
                    .iter()
                    .map(Filter::from_value)
                    .collect::<Result<Vec<_>>>()
                    .map(Filter::Any);
            }
        }

        Ok(Filter::Fields(
            map.iter()
                .map(|(k, v)| (k.clone(), Criterion::Literal(v.clone())))
                .collect(),
        ))
    }

    /// Check the document stored under `id`.
    ///
    /// The [`ID_FIELD`] criterion is tested against `id` rather than a
    /// document field. Disjunctions stop at the first matching alternative.
    pub fn matches(&self, id: &str, doc: &Document) -> bool {
        match self {
            Filter::Fields(fields) => {
                let id_value = Value::String(id.to_string());
                fields.iter().all(|(name, criterion)| {
                    let value = if name == ID_FIELD {
                        Some(&id_value)
                    } else {
                        doc.get(name)
                    };
                    criterion.matches(value)
                })
            }
            Filter::Any(alternatives) => alternatives.iter().any(|alt| alt.matches(id, doc)),
        }
    }
}

impl Default for Filter {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// TESTS
// ============================================================================
