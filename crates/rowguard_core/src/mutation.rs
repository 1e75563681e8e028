//! In-flight write requests.
//!
//! # Responsibility
//! - Describe one write: operation kind, field assignments, predicates.
//! - Expose the accessors policy hooks need for the lock version and the
//!   delete time.
//!
//! # Invariants
//! - The operation kind is fixed once built; the only rewrite allowed is a
//!   delete turning into the matching update (`soften_delete`).
//! - Predicates are append-only; assignments may be added or reset by hooks
//!   before the terminal stage runs.
//! - The caller's expected lock version is never written as a column value.

use crate::error::{PipelineError, PipelineResult};
use crate::policy::optlock::LOCK_VERSION_FIELD;
use crate::policy::softdelete::DELETE_TIME_FIELD;
use crate::predicate::{Predicate, PredicateSink};
use crate::schema::EntitySchema;
use rusqlite::types::Value;
use serde::Serialize;
use std::fmt::{Display, Formatter};
use std::sync::Arc;

/// Write operation kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Op {
    Create,
    UpdateOne,
    UpdateMany,
    DeleteOne,
    DeleteMany,
}

impl Op {
    pub fn is_create(self) -> bool {
        matches!(self, Self::Create)
    }

    pub fn is_update(self) -> bool {
        matches!(self, Self::UpdateOne | Self::UpdateMany)
    }

    pub fn is_delete(self) -> bool {
        matches!(self, Self::DeleteOne | Self::DeleteMany)
    }

    /// Returns whether the op targets exactly one row by id.
    pub fn is_single_row(self) -> bool {
        matches!(self, Self::UpdateOne | Self::DeleteOne)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Create => "create",
            Self::UpdateOne => "update_one",
            Self::UpdateMany => "update_many",
            Self::DeleteOne => "delete_one",
            Self::DeleteMany => "delete_many",
        }
    }
}

impl Display for Op {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Pending column write.
#[derive(Debug, Clone, PartialEq)]
pub enum Assignment {
    /// `column = value`
    Set { column: String, value: Value },
    /// `column = column + delta`, NULL treated as 0.
    Add { column: String, delta: i64 },
}

impl Assignment {
    pub fn column(&self) -> &str {
        match self {
            Self::Set { column, .. } | Self::Add { column, .. } => column,
        }
    }
}

/// In-flight write request.
#[derive(Debug, Clone)]
pub struct Mutation {
    schema: Arc<EntitySchema>,
    requested: Op,
    op: Op,
    id: Option<String>,
    assignments: Vec<Assignment>,
    predicates: Vec<Predicate>,
    expected_lock_version: Option<i64>,
}

impl Mutation {
    fn new(schema: &Arc<EntitySchema>, op: Op, id: Option<String>) -> Self {
        let mut mutation = Self {
            schema: Arc::clone(schema),
            requested: op,
            op,
            id: None,
            assignments: Vec::new(),
            predicates: Vec::new(),
            expected_lock_version: None,
        };
        if let Some(id) = id {
            if op.is_single_row() {
                let column = schema.id_column().to_string();
                mutation.where_p(Predicate::eq(column, id.clone()));
            }
            mutation.id = Some(id);
        }
        mutation
    }

    pub fn create(schema: &Arc<EntitySchema>) -> Self {
        Self::new(schema, Op::Create, None)
    }

    pub fn update_one(schema: &Arc<EntitySchema>, id: impl Into<String>) -> Self {
        Self::new(schema, Op::UpdateOne, Some(id.into()))
    }

    pub fn update_many(schema: &Arc<EntitySchema>) -> Self {
        Self::new(schema, Op::UpdateMany, None)
    }

    pub fn delete_one(schema: &Arc<EntitySchema>, id: impl Into<String>) -> Self {
        Self::new(schema, Op::DeleteOne, Some(id.into()))
    }

    pub fn delete_many(schema: &Arc<EntitySchema>) -> Self {
        Self::new(schema, Op::DeleteMany, None)
    }

    /// Assigns a literal column value; replaces an earlier assignment of the
    /// same column.
    pub fn set(mut self, column: impl Into<String>, value: impl Into<Value>) -> Self {
        self.set_field(column, value);
        self
    }

    /// Sets the primary key of a Create.
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    /// Appends a caller predicate.
    pub fn filter(mut self, predicate: Predicate) -> Self {
        self.where_p(predicate);
        self
    }

    /// Supplies the lock version the caller read before this write.
    pub fn expect_version(mut self, version: i64) -> Self {
        self.expected_lock_version = Some(version);
        self
    }

    pub fn schema(&self) -> &Arc<EntitySchema> {
        &self.schema
    }

    pub fn table(&self) -> &str {
        self.schema.table()
    }

    /// Current operation kind.
    pub fn op(&self) -> Op {
        self.op
    }

    /// Operation kind as submitted by the caller.
    pub fn requested_op(&self) -> Op {
        self.requested
    }

    pub fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }

    pub(crate) fn assign_id(&mut self, id: String) {
        self.id = Some(id);
    }

    pub fn assignments(&self) -> &[Assignment] {
        &self.assignments
    }

    /// Literal value pending for `column`, if any.
    pub fn field(&self, column: &str) -> Option<&Value> {
        self.assignments.iter().find_map(|assignment| match assignment {
            Assignment::Set { column: name, value } if name == column => Some(value),
            _ => None,
        })
    }

    pub fn set_field(&mut self, column: impl Into<String>, value: impl Into<Value>) {
        let column = column.into();
        self.clear_field(&column);
        self.assignments.push(Assignment::Set {
            column,
            value: value.into(),
        });
    }

    pub fn add_field(&mut self, column: impl Into<String>, delta: i64) {
        self.assignments.push(Assignment::Add {
            column: column.into(),
            delta,
        });
    }

    /// Drops every pending assignment of `column`.
    pub fn clear_field(&mut self, column: &str) {
        self.assignments
            .retain(|assignment| assignment.column() != column);
    }

    /// Expected lock version supplied by the caller.
    pub fn lock_version(&self) -> Option<i64> {
        self.expected_lock_version
    }

    /// Forgets the expected lock version and any pending lock version write.
    pub fn reset_lock_version(&mut self) {
        self.expected_lock_version = None;
        self.clear_field(LOCK_VERSION_FIELD);
    }

    /// Schedules `lock_ver = lock_ver + delta`.
    pub fn add_lock_version(&mut self, delta: i64) {
        self.add_field(LOCK_VERSION_FIELD, delta);
    }

    /// Schedules the delete time, in Unix epoch milliseconds.
    pub fn set_delete_time(&mut self, epoch_ms: i64) {
        self.set_field(DELETE_TIME_FIELD, epoch_ms);
    }

    /// Turns a delete into the matching update.
    ///
    /// # Errors
    /// - `InvalidMutation` when the current op is not a delete.
    pub fn soften_delete(&mut self) -> PipelineResult<()> {
        self.op = match self.op {
            Op::DeleteOne => Op::UpdateOne,
            Op::DeleteMany => Op::UpdateMany,
            other => {
                return Err(PipelineError::InvalidMutation(format!(
                    "cannot rewrite {other} on `{}` as a soft delete",
                    self.table()
                )))
            }
        };
        Ok(())
    }
}

impl PredicateSink for Mutation {
    fn where_p(&mut self, predicate: Predicate) {
        self.predicates.push(predicate);
    }

    fn predicates(&self) -> &[Predicate] {
        &self.predicates
    }
}

/// Result of one terminal execution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MutationOutcome {
    pub table: String,
    /// Op as submitted by the caller.
    pub requested: Op,
    /// Op the storage engine actually ran.
    pub executed: Op,
    pub rows_affected: usize,
    /// Primary key of a created row.
    pub id: Option<String>,
}

impl MutationOutcome {
    pub fn from_mutation(mutation: &Mutation, rows_affected: usize) -> Self {
        Self {
            table: mutation.table().to_string(),
            requested: mutation.requested_op(),
            executed: mutation.op(),
            rows_affected,
            id: mutation.id().map(str::to_string),
        }
    }

    /// Returns whether the caller's delete was persisted as an update.
    pub fn is_soft_delete(&self) -> bool {
        self.requested.is_delete() && self.executed.is_update()
    }

    /// Fails when no row was affected.
    ///
    /// # Errors
    /// - `SoftDeleteNoop` when a soft delete matched no live row.
    /// - `NotFound` for any other zero-row outcome.
    pub fn require_row(self) -> PipelineResult<Self> {
        if self.rows_affected > 0 {
            return Ok(self);
        }
        if self.is_soft_delete() {
            Err(PipelineError::SoftDeleteNoop { table: self.table })
        } else {
            Err(PipelineError::NotFound { table: self.table })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{Assignment, Mutation, MutationOutcome, Op};
    use crate::error::PipelineError;
    use crate::predicate::{Predicate, PredicateSink};
    use crate::schema::{EntitySchema, FieldDef};
    use rusqlite::types::Value;

    fn schema() -> std::sync::Arc<EntitySchema> {
        EntitySchema::builder("accounts")
            .field(FieldDef::text("owner"))
            .build()
            .expect("schema should build")
    }

    #[test]
    fn single_row_builders_target_id() {
        let mutation = Mutation::update_one(&schema(), "a1");
        assert_eq!(mutation.op(), Op::UpdateOne);
        assert_eq!(mutation.predicates(), &[Predicate::eq("id", "a1".to_string())]);

        let bulk = Mutation::update_many(&schema());
        assert!(bulk.predicates().is_empty());
    }

    #[test]
    fn set_replaces_previous_assignment_of_same_column() {
        let mutation = Mutation::create(&schema())
            .set("owner", "ann".to_string())
            .set("owner", "bob".to_string());
        assert_eq!(mutation.assignments().len(), 1);
        assert_eq!(
            mutation.field("owner"),
            Some(&Value::Text("bob".to_string()))
        );
    }

    #[test]
    fn reset_lock_version_drops_expected_value_and_pending_writes() {
        let mut mutation = Mutation::update_one(&schema(), "a1").expect_version(4);
        mutation.add_lock_version(1);
        mutation.reset_lock_version();

        assert_eq!(mutation.lock_version(), None);
        assert!(mutation
            .assignments()
            .iter()
            .all(|assignment| assignment.column() != "lock_ver"));
    }

    #[test]
    fn soften_delete_only_rewrites_deletes() {
        let mut delete = Mutation::delete_many(&schema());
        delete.soften_delete().expect("delete should soften");
        assert_eq!(delete.op(), Op::UpdateMany);
        assert_eq!(delete.requested_op(), Op::DeleteMany);

        let mut update = Mutation::update_many(&schema());
        let err = update.soften_delete().expect_err("update must not soften");
        assert!(matches!(err, PipelineError::InvalidMutation(_)));
    }

    #[test]
    fn require_row_classifies_zero_rows() {
        let mut delete = Mutation::delete_one(&schema(), "a1");
        delete.soften_delete().expect("delete should soften");
        let soft = MutationOutcome::from_mutation(&delete, 0);
        assert!(matches!(
            soft.require_row(),
            Err(PipelineError::SoftDeleteNoop { .. })
        ));

        let update = MutationOutcome::from_mutation(&Mutation::update_one(&schema(), "a1"), 0);
        assert!(matches!(
            update.require_row(),
            Err(PipelineError::NotFound { .. })
        ));

        let hit = MutationOutcome::from_mutation(&Mutation::update_one(&schema(), "a1"), 1);
        assert_eq!(hit.require_row().expect("one row").rows_affected, 1);
    }

    #[test]
    fn add_assignments_accumulate() {
        let mut mutation = Mutation::update_many(&schema());
        mutation.add_field("counter", 2);
        mutation.add_field("counter", 3);
        assert_eq!(
            mutation.assignments(),
            &[
                Assignment::Add {
                    column: "counter".to_string(),
                    delta: 2
                },
                Assignment::Add {
                    column: "counter".to_string(),
                    delta: 3
                },
            ]
        );
    }
}
