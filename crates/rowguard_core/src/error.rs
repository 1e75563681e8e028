//! Pipeline error taxonomy.
//!
//! # Responsibility
//! - Name every failure a mutation or query can surface to its caller.
//! - Keep storage errors wrapped but untranslated.
//!
//! # Invariants
//! - Policy errors are produced only from terminal outcomes (rows affected),
//!   except wiring errors which fail before delegation.
//! - `is_not_found()` treats a soft-delete no-op the same as a missing row.

use crate::db::DbError;
use crate::mutation::Op;
use crate::schema::SchemaError;
use thiserror::Error;

pub type PipelineResult<T> = Result<T, PipelineError>;

/// Error returned by hooks, interceptors and terminal executors.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// A policy hook ran against an entity that does not declare its field.
    #[error("unexpected mutation type: {op} on `{table}` has no `{missing}` field")]
    UnexpectedMutationType {
        table: String,
        op: Op,
        missing: &'static str,
    },

    /// A policy interceptor ran against an entity that does not declare its field.
    #[error("unexpected query type: `{table}` has no `{missing}` field")]
    UnexpectedQueryType { table: String, missing: &'static str },

    /// Single-row compare-and-increment matched nothing.
    #[error("optimistic lock conflict on `{table}`: expected lock version {expected}")]
    OptimisticLockConflict { table: String, expected: i64 },

    /// A soft delete matched no live row.
    #[error("soft delete on `{table}` matched no live row")]
    SoftDeleteNoop { table: String },

    #[error("no row matched on `{table}`")]
    NotFound { table: String },

    #[error("entity `{0}` is not registered with this client")]
    UnknownEntity(String),

    #[error("invalid mutation: {0}")]
    InvalidMutation(String),

    /// The call context deadline passed before the storage engine ran.
    #[error("call cancelled before execution")]
    Cancelled,

    #[error(transparent)]
    Db(#[from] DbError),
}

impl PipelineError {
    /// Returns true for outcomes callers should treat as "row not found".
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. } | Self::SoftDeleteNoop { .. })
    }

    /// Returns true when re-reading and retrying may succeed.
    pub fn is_conflict(&self) -> bool {
        matches!(self, Self::OptimisticLockConflict { .. })
    }
}

impl From<rusqlite::Error> for PipelineError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

impl From<SchemaError> for PipelineError {
    fn from(value: SchemaError) -> Self {
        Self::Db(DbError::Schema(value))
    }
}
