//! Optimistic locking via a per-row `lock_ver` counter.
//!
//! A single-row update that carries an expected version is rewritten to
//! `SET lock_ver = lock_ver + 1 ... WHERE lock_ver = expected`, so the storage
//! engine's row-level atomicity decides which of two racing writers wins.
//!
//! Bulk updates only drop the expected version: no increment and no per-row
//! check. Deletes pass through.
//!
//! Only this hook writes `lock_ver`. A create or update that assigns it
//! directly is rejected, with or without the bypass flag, so the stored
//! version never moves backwards.

use crate::context::CallContext;
use crate::error::{PipelineError, PipelineResult};
use crate::mutation::{Mutation, MutationOutcome, Op};
use crate::pipeline::{on, Hook, Next};
use crate::predicate::{Predicate, PredicateSink};
use crate::schema::{FieldDef, FieldKind, IndexDef, Mixin};
use log::{debug, warn};
use std::sync::Arc;

/// Version column, optional int64 defaulting to 0.
pub const LOCK_VERSION_FIELD: &str = "lock_ver";

/// Mixin adding the `lock_ver` field, its index and the locking hook.
#[derive(Debug, Clone, Copy, Default)]
pub struct OptimisticLocking;

impl Mixin for OptimisticLocking {
    fn fields(&self) -> Vec<FieldDef> {
        vec![FieldDef::int64(LOCK_VERSION_FIELD)
            .optional()
            .default_sql("0")]
    }

    fn indexes(&self) -> Vec<IndexDef> {
        vec![IndexDef::fields([LOCK_VERSION_FIELD])]
    }

    fn hooks(&self) -> Vec<Arc<dyn Hook>> {
        vec![Arc::new(on(OptimisticLockingHook, writes_row_values))]
    }
}

/// Compare-and-increment hook.
///
/// Install it gated on create and update ops (as [`OptimisticLocking`] does);
/// deletes pass through untouched.
#[derive(Debug, Clone, Copy, Default)]
pub struct OptimisticLockingHook;

impl Hook for OptimisticLockingHook {
    fn mutate(
        &self,
        ctx: &CallContext,
        mutation: &mut Mutation,
        next: Next<'_>,
    ) -> PipelineResult<MutationOutcome> {
        if !writes_row_values(mutation.op()) {
            return next.run(ctx, mutation);
        }

        if mutation
            .assignments()
            .iter()
            .any(|assignment| assignment.column() == LOCK_VERSION_FIELD)
        {
            return Err(PipelineError::InvalidMutation(format!(
                "`{LOCK_VERSION_FIELD}` on `{}` is maintained by optimistic locking",
                mutation.table()
            )));
        }

        if mutation.op().is_create() || ctx.skips_optimistic_locking() {
            return next.run(ctx, mutation);
        }

        if !mutation
            .schema()
            .has_field(LOCK_VERSION_FIELD, FieldKind::Int64)
        {
            return Err(PipelineError::UnexpectedMutationType {
                table: mutation.table().to_string(),
                op: mutation.op(),
                missing: LOCK_VERSION_FIELD,
            });
        }

        if mutation.op() == Op::UpdateMany {
            mutation.reset_lock_version();
            return next.run(ctx, mutation);
        }

        // No expected version: the caller opted out for this call.
        let Some(expected) = mutation.lock_version() else {
            return next.run(ctx, mutation);
        };

        mutation.reset_lock_version();
        mutation.add_lock_version(1);
        mutation.where_p(Predicate::eq(LOCK_VERSION_FIELD, expected));
        debug!(
            "event=optimistic_lock_guard module=policy table={} expected_version={}",
            mutation.table(),
            expected
        );

        let outcome = next.run(ctx, mutation)?;
        if outcome.rows_affected == 0 {
            warn!(
                "event=optimistic_lock_conflict module=policy status=error table={} expected_version={}",
                outcome.table, expected
            );
            return Err(PipelineError::OptimisticLockConflict {
                table: outcome.table,
                expected,
            });
        }
        Ok(outcome)
    }
}

fn writes_row_values(op: Op) -> bool {
    op.is_create() || op.is_update()
}
