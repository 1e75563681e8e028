//! Storage-level filter predicates.
//!
//! # Responsibility
//! - Describe one column condition independently of SQL rendering.
//! - Offer the narrow "append a predicate" capability shared by mutations and
//!   queries.
//!
//! # Invariants
//! - Predicates are only ever appended; existing predicates are never altered
//!   or removed.
//! - Appended predicates combine with AND.

use rusqlite::types::Value;

/// One column condition.
#[derive(Debug, Clone, PartialEq)]
pub enum Predicate {
    Eq { column: String, value: Value },
    Ne { column: String, value: Value },
    Gt { column: String, value: Value },
    Lt { column: String, value: Value },
    In { column: String, values: Vec<Value> },
    IsNull { column: String },
    NotNull { column: String },
}

impl Predicate {
    pub fn eq(column: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::Eq {
            column: column.into(),
            value: value.into(),
        }
    }

    pub fn ne(column: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::Ne {
            column: column.into(),
            value: value.into(),
        }
    }

    pub fn gt(column: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::Gt {
            column: column.into(),
            value: value.into(),
        }
    }

    pub fn lt(column: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::Lt {
            column: column.into(),
            value: value.into(),
        }
    }

    pub fn is_in<V: Into<Value>>(
        column: impl Into<String>,
        values: impl IntoIterator<Item = V>,
    ) -> Self {
        Self::In {
            column: column.into(),
            values: values.into_iter().map(Into::into).collect(),
        }
    }

    pub fn is_null(column: impl Into<String>) -> Self {
        Self::IsNull {
            column: column.into(),
        }
    }

    pub fn not_null(column: impl Into<String>) -> Self {
        Self::NotNull {
            column: column.into(),
        }
    }

    /// Column this predicate constrains.
    pub fn column(&self) -> &str {
        match self {
            Self::Eq { column, .. }
            | Self::Ne { column, .. }
            | Self::Gt { column, .. }
            | Self::Lt { column, .. }
            | Self::In { column, .. }
            | Self::IsNull { column }
            | Self::NotNull { column } => column,
        }
    }
}

/// Capability to attach an extra storage predicate to an in-flight request.
pub trait PredicateSink {
    /// Appends `predicate`, ANDed with every predicate already present.
    fn where_p(&mut self, predicate: Predicate);

    /// Predicates attached so far, in append order.
    fn predicates(&self) -> &[Predicate];
}
