//! Pipeline coordinator.
//!
//! # Responsibility
//! - Hold the registered entities, client-wide stages and terminal executor.
//! - Provide the re-entrant mutation entry point and the read entry points.
//!
//! # Invariants
//! - The client keeps no per-call state; every mutation and query is
//!   call-local, so one client is safe to share across threads.
//! - Each `mutate` call reaches the executor at most once per pass through the
//!   chain; re-submission by a hook starts a new pass.

use super::executor::Executor;
use super::hook::{Hook, Next};
use super::interceptor::Interceptor;
use crate::context::CallContext;
use crate::error::{PipelineError, PipelineResult};
use crate::mutation::{Mutation, MutationOutcome, Op};
use crate::query::{Query, Record};
use crate::schema::{EntitySchema, SchemaError};
use log::debug;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

/// Entry point for every mutation and query.
pub struct Client {
    executor: Box<dyn Executor>,
    hooks: Vec<Arc<dyn Hook>>,
    interceptors: Vec<Arc<dyn Interceptor>>,
    entities: BTreeMap<String, Arc<EntitySchema>>,
}

impl Client {
    pub fn builder(executor: impl Executor + 'static) -> ClientBuilder {
        ClientBuilder {
            executor: Box::new(executor),
            hooks: Vec::new(),
            interceptors: Vec::new(),
            entities: BTreeMap::new(),
        }
    }

    /// Registered schema for `table`.
    pub fn schema(&self, table: &str) -> Option<&Arc<EntitySchema>> {
        self.entities.get(table)
    }

    /// Creates tables and indexes for every registered entity.
    ///
    /// # Errors
    /// - `DuplicateIndex` when two entities derive the same index name; SQLite
    ///   index names share one namespace per database.
    pub fn migrate(&self) -> PipelineResult<()> {
        let mut index_names = BTreeSet::new();
        for schema in self.entities.values() {
            for index in schema.indexes() {
                let name = index.name(schema.table());
                if !index_names.insert(name.clone()) {
                    return Err(SchemaError::DuplicateIndex(name).into());
                }
            }
        }
        for schema in self.entities.values() {
            self.executor.ensure_schema(schema)?;
        }
        Ok(())
    }

    /// Submits a mutation to the full hook chain.
    ///
    /// Re-entrant: hooks may call this again with a rewritten mutation, which
    /// then passes through every stage, including ones ahead of the caller.
    ///
    /// # Errors
    /// - `SoftDeleteNoop` / `NotFound` when a requested `DeleteOne` affected no
    ///   row. Bulk deletes report zero rows as `Ok`.
    /// - Anything a hook or the executor returns, unchanged.
    pub fn mutate(
        &self,
        ctx: &CallContext,
        mutation: &mut Mutation,
    ) -> PipelineResult<MutationOutcome> {
        let schema = Arc::clone(self.registered(mutation.table())?);
        debug!(
            "event=mutation_dispatch module=pipeline status=start table={} op={} requested_op={}",
            mutation.table(),
            mutation.op(),
            mutation.requested_op()
        );
        let outcome = Next::new(self, &self.hooks, schema.hooks()).run(ctx, mutation)?;
        if outcome.requested == Op::DeleteOne {
            return outcome.require_row();
        }
        Ok(outcome)
    }

    /// Runs interceptors in order, then the terminal query.
    pub fn query(&self, ctx: &CallContext, mut query: Query) -> PipelineResult<Vec<Record>> {
        let schema = Arc::clone(self.registered(query.table())?);
        for interceptor in self.interceptors.iter().chain(schema.interceptors()) {
            interceptor.intercept(ctx, &mut query)?;
        }
        let records = self.executor.query(ctx, &query)?;
        debug!(
            "event=query_execute module=pipeline status=ok table={} rows={}",
            query.table(),
            records.len()
        );
        Ok(records)
    }

    /// First row of `query`, if any.
    pub fn first(&self, ctx: &CallContext, query: Query) -> PipelineResult<Option<Record>> {
        Ok(self.query(ctx, query.limit(1))?.into_iter().next())
    }

    /// Row by primary key, subject to interceptors.
    pub fn get(
        &self,
        ctx: &CallContext,
        schema: &Arc<EntitySchema>,
        id: impl Into<String>,
    ) -> PipelineResult<Option<Record>> {
        self.first(ctx, Query::by_id(schema, id))
    }

    pub(crate) fn execute_terminal(
        &self,
        ctx: &CallContext,
        mutation: &mut Mutation,
    ) -> PipelineResult<MutationOutcome> {
        if mutation.op() == Op::Create && mutation.id().is_none() {
            match mutation.schema().id_strategy().generate() {
                Some(id) => mutation.assign_id(id),
                None => {
                    return Err(PipelineError::InvalidMutation(format!(
                        "create on `{}` requires a caller-provided id",
                        mutation.table()
                    )))
                }
            }
        }

        let outcome = self.executor.execute(ctx, mutation)?;
        debug!(
            "event=mutation_execute module=pipeline status=ok table={} op={} rows_affected={}",
            outcome.table, outcome.executed, outcome.rows_affected
        );
        Ok(outcome)
    }

    fn registered(&self, table: &str) -> PipelineResult<&Arc<EntitySchema>> {
        self.entities
            .get(table)
            .ok_or_else(|| PipelineError::UnknownEntity(table.to_string()))
    }
}

/// Builder for [`Client`].
pub struct ClientBuilder {
    executor: Box<dyn Executor>,
    hooks: Vec<Arc<dyn Hook>>,
    interceptors: Vec<Arc<dyn Interceptor>>,
    entities: BTreeMap<String, Arc<EntitySchema>>,
}

impl ClientBuilder {
    /// Registers an entity together with its mixin hooks and interceptors.
    ///
    /// Registering the same table again replaces the earlier schema.
    pub fn register(mut self, schema: &Arc<EntitySchema>) -> Self {
        self.entities
            .insert(schema.table().to_string(), Arc::clone(schema));
        self
    }

    /// Adds a client-wide hook. Client-wide hooks wrap entity hooks; the first
    /// one added is outermost.
    pub fn use_hook(mut self, hook: impl Hook + 'static) -> Self {
        self.hooks.push(Arc::new(hook));
        self
    }

    /// Adds a client-wide interceptor, run before entity interceptors.
    pub fn intercept(mut self, interceptor: impl Interceptor + 'static) -> Self {
        self.interceptors.push(Arc::new(interceptor));
        self
    }

    pub fn build(self) -> Client {
        Client {
            executor: self.executor,
            hooks: self.hooks,
            interceptors: self.interceptors,
            entities: self.entities,
        }
    }
}
