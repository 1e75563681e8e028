//! Persistence engine boundary.

use crate::context::CallContext;
use crate::error::PipelineResult;
use crate::mutation::{Mutation, MutationOutcome};
use crate::query::{Query, Record};
use crate::schema::EntitySchema;

/// Terminal stage that runs (possibly rewritten) requests against storage.
///
/// Implementations own all locking and transaction handling, and are the
/// only place a call context deadline is honored.
pub trait Executor: Send + Sync {
    /// Creates the entity's table and indexes when missing.
    fn ensure_schema(&self, schema: &EntitySchema) -> PipelineResult<()>;

    /// Runs one mutation and reports rows affected.
    fn execute(&self, ctx: &CallContext, mutation: &Mutation) -> PipelineResult<MutationOutcome>;

    /// Runs one query.
    fn query(&self, ctx: &CallContext, query: &Query) -> PipelineResult<Vec<Record>>;
}
