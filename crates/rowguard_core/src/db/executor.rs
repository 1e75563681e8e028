//! SQLite-backed terminal executor.
//!
//! # Invariants
//! - One statement per mutation, run in autocommit mode, so a guarded
//!   `UPDATE ... WHERE lock_ver = ?` is atomic at row level.
//! - A cancelled call context never reaches the connection.

use super::open::{open_db, open_db_in_memory};
use super::sql::{render_create_table, render_mutation, render_query, Statement};
use super::{DbError, DbResult};
use crate::context::CallContext;
use crate::error::{PipelineError, PipelineResult};
use crate::mutation::{Mutation, MutationOutcome};
use crate::pipeline::Executor;
use crate::query::{Query, Record};
use crate::schema::EntitySchema;
use log::{debug, error};
use rusqlite::types::Value;
use rusqlite::{params_from_iter, Connection};
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use std::time::Instant;

/// Executor over one SQLite connection.
///
/// Calls sharing an executor are serialized on its connection; separate
/// executors on the same file race through SQLite's own locking.
pub struct SqliteExecutor {
    conn: Mutex<Connection>,
}

impl SqliteExecutor {
    pub fn new(conn: Connection) -> Self {
        Self {
            conn: Mutex::new(conn),
        }
    }

    /// Opens a file database; see [`open_db`].
    pub fn open(path: impl AsRef<Path>) -> DbResult<Self> {
        Ok(Self::new(open_db(path)?))
    }

    pub fn open_in_memory() -> DbResult<Self> {
        Ok(Self::new(open_db_in_memory()?))
    }

    fn connection(&self) -> DbResult<MutexGuard<'_, Connection>> {
        self.conn.lock().map_err(|_| DbError::ConnectionPoisoned)
    }
}

impl Executor for SqliteExecutor {
    fn ensure_schema(&self, schema: &EntitySchema) -> PipelineResult<()> {
        let statements = render_create_table(schema)?;
        let conn = self.connection()?;
        let tx = conn.unchecked_transaction()?;
        for sql in &statements {
            tx.execute_batch(sql)?;
        }
        tx.commit()?;
        debug!(
            "event=schema_ensure module=db status=ok table={} statements={}",
            schema.table(),
            statements.len()
        );
        Ok(())
    }

    fn execute(&self, ctx: &CallContext, mutation: &Mutation) -> PipelineResult<MutationOutcome> {
        if ctx.is_cancelled() {
            return Err(PipelineError::Cancelled);
        }

        let Statement { sql, params } = render_mutation(mutation)?;
        let started_at = Instant::now();
        let conn = self.connection()?;
        match conn.execute(&sql, params_from_iter(params.iter())) {
            Ok(rows_affected) => Ok(MutationOutcome::from_mutation(mutation, rows_affected)),
            Err(err) => {
                error!(
                    "event=mutation_execute module=db status=error table={} op={} duration_ms={} error={}",
                    mutation.table(),
                    mutation.op(),
                    started_at.elapsed().as_millis(),
                    err
                );
                Err(err.into())
            }
        }
    }

    fn query(&self, ctx: &CallContext, query: &Query) -> PipelineResult<Vec<Record>> {
        if ctx.is_cancelled() {
            return Err(PipelineError::Cancelled);
        }

        let Statement { sql, params } = render_query(query)?;
        let conn = self.connection()?;
        let mut stmt = conn.prepare(&sql)?;
        let columns: Vec<String> = stmt
            .column_names()
            .into_iter()
            .map(str::to_string)
            .collect();

        let mut rows = stmt.query(params_from_iter(params.iter()))?;
        let mut records = Vec::new();
        while let Some(row) = rows.next()? {
            let mut values = BTreeMap::new();
            for (index, column) in columns.iter().enumerate() {
                values.insert(column.clone(), row.get::<_, Value>(index)?);
            }
            records.push(Record::new(values));
        }
        Ok(records)
    }
}
