// localdb-core/src/find_options.rs
// Query options carried by a collection view: order, skip, limit

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::LocalDbError;
use crate::value_utils::sort_compare;

/// Sort direction for `order_by`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Order {
    #[default]
    Asc,
    Desc,
}

impl FromStr for Order {
    type Err = LocalDbError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "asc" => Ok(Order::Asc),
            "desc" => Ok(Order::Desc),
            _ => Err(LocalDbError::InvalidQuery(format!(
                "order must be 'asc' or 'desc', got '{}'",
                s
            ))),
        }
    }
}

impl fmt::Display for Order {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Order::Asc => "asc",
            Order::Desc => "desc",
        })
    }
}

/// Pending options of a view.
///
/// Views never share a mutable copy: deriving a view clones the options
/// and extends the clone.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FindOptions {
    /// Sort keys, applied in order
    pub order_by: Vec<(String, Order)>,

    /// Maximum number of documents to return. `0` means no limit.
    pub limit: Option<usize>,

    /// Number of leading documents to skip
    pub skip: Option<usize>,
}

impl FindOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn with_skip(mut self, skip: usize) -> Self {
        self.skip = Some(skip);
        self
    }

    pub fn with_order(mut self, field: impl Into<String>, order: Order) -> Self {
        self.order_by.push((field.into(), order));
        self
    }

    pub fn is_ordered(&self) -> bool {
        !self.order_by.is_empty()
    }

    pub fn skip_count(&self) -> usize {
        self.skip.unwrap_or(0)
    }

    /// Effective limit; `Some(0)` counts as unlimited.
    pub fn limit_count(&self) -> Option<usize> {
        self.limit.filter(|&n| n > 0)
    }
}

/// Stable multi-key sort: the first key whose values differ decides,
/// equal keys keep the incoming order.
pub fn apply_sort(docs: &mut [Value], order_by: &[(String, Order)]) {
    if order_by.is_empty() {
        return;
    }

    docs.sort_by(|a, b| {
        for (field, order) in order_by {
            let cmp = sort_compare(a.get(field), b.get(field));
            if cmp != std::cmp::Ordering::Equal {
                return match order {
                    Order::Asc => cmp,
                    Order::Desc => cmp.reverse(),
                };
            }
        }
        std::cmp::Ordering::Equal
    });
}

/// Drop the first `skip` documents, then keep at most `limit`.
pub fn apply_skip_limit(docs: Vec<Value>, options: &FindOptions) -> Vec<Value> {
    let iter = docs.into_iter().skip(options.skip_count());
    match options.limit_count() {
        Some(limit) => iter.take(limit).collect(),
        None => iter.collect(),
    }
}
