//! Soft delete via a nullable `delete_time` column.
//!
//! # Responsibility
//! - Rewrite deletes into updates that stamp `delete_time`, and re-submit
//!   them through the client so every other policy sees an update.
//! - Hide stamped rows from reads unless the caller bypasses the policy.
//!
//! # Invariants
//! - Only live rows (`delete_time IS NULL`) are ever stamped; a second delete
//!   of the same row matches nothing.
//! - Visibility is decided solely by the read predicate and the bypass flag.

use crate::context::CallContext;
use crate::error::{PipelineError, PipelineResult};
use crate::mutation::{Mutation, MutationOutcome, Op};
use crate::pipeline::{on, Hook, Interceptor, Next};
use crate::predicate::{Predicate, PredicateSink};
use crate::query::Query;
use crate::schema::{FieldDef, FieldKind, IndexDef, Mixin};
use log::info;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

/// Deletion instant column, optional Unix epoch milliseconds.
pub const DELETE_TIME_FIELD: &str = "delete_time";

/// Mixin adding the `delete_time` field, its index, the delete hook and the
/// read filter.
#[derive(Debug, Clone, Copy)]
pub struct SoftDelete {
    clock: fn() -> i64,
}

impl Default for SoftDelete {
    fn default() -> Self {
        Self {
            clock: now_epoch_ms,
        }
    }
}

impl SoftDelete {
    /// Uses `clock` (epoch milliseconds) to stamp deletions.
    pub fn with_clock(clock: fn() -> i64) -> Self {
        Self { clock }
    }
}

impl Mixin for SoftDelete {
    fn fields(&self) -> Vec<FieldDef> {
        vec![FieldDef::timestamp(DELETE_TIME_FIELD).optional()]
    }

    fn indexes(&self) -> Vec<IndexDef> {
        vec![IndexDef::fields([DELETE_TIME_FIELD])]
    }

    fn hooks(&self) -> Vec<Arc<dyn Hook>> {
        vec![Arc::new(on(
            SoftDeleteHook { clock: self.clock },
            Op::is_delete,
        ))]
    }

    fn interceptors(&self) -> Vec<Arc<dyn Interceptor>> {
        vec![Arc::new(SoftDeleteFilter)]
    }
}

/// Delete-to-update hook. Expects to be gated on delete ops.
///
/// Combined with optimistic locking, deleting an already soft-deleted row with
/// an expected version reports `OptimisticLockConflict`, not `SoftDeleteNoop`:
/// the single guarded statement cannot tell a stale version from a stamped
/// row. Re-read under [`ignore_soft_delete`](crate::context::ignore_soft_delete)
/// to tell the two apart.
#[derive(Debug, Clone, Copy)]
pub struct SoftDeleteHook {
    clock: fn() -> i64,
}

impl SoftDeleteHook {
    pub fn new(clock: fn() -> i64) -> Self {
        Self { clock }
    }
}

impl Default for SoftDeleteHook {
    fn default() -> Self {
        Self::new(now_epoch_ms)
    }
}

impl Hook for SoftDeleteHook {
    fn mutate(
        &self,
        ctx: &CallContext,
        mutation: &mut Mutation,
        next: Next<'_>,
    ) -> PipelineResult<MutationOutcome> {
        if ctx.skips_soft_delete() {
            return next.run(ctx, mutation);
        }

        if !mutation
            .schema()
            .has_field(DELETE_TIME_FIELD, FieldKind::Timestamp)
        {
            return Err(PipelineError::UnexpectedMutationType {
                table: mutation.table().to_string(),
                op: mutation.op(),
                missing: DELETE_TIME_FIELD,
            });
        }

        exclude_deleted(mutation);
        mutation.soften_delete()?;
        mutation.set_delete_time((self.clock)());
        info!(
            "event=soft_delete_rewrite module=policy table={} requested_op={} op={}",
            mutation.table(),
            mutation.requested_op(),
            mutation.op()
        );

        next.client().mutate(ctx, mutation)
    }
}

/// Read filter hiding soft-deleted rows.
#[derive(Debug, Clone, Copy, Default)]
pub struct SoftDeleteFilter;

impl Interceptor for SoftDeleteFilter {
    fn intercept(&self, ctx: &CallContext, query: &mut Query) -> PipelineResult<()> {
        if ctx.skips_soft_delete() {
            return Ok(());
        }
        if !query
            .schema()
            .has_field(DELETE_TIME_FIELD, FieldKind::Timestamp)
        {
            return Err(PipelineError::UnexpectedQueryType {
                table: query.table().to_string(),
                missing: DELETE_TIME_FIELD,
            });
        }
        exclude_deleted(query);
        Ok(())
    }
}

fn exclude_deleted(sink: &mut impl PredicateSink) {
    sink.where_p(Predicate::is_null(DELETE_TIME_FIELD));
}

fn now_epoch_ms() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |elapsed| {
            i64::try_from(elapsed.as_millis()).unwrap_or(i64::MAX)
        })
}
