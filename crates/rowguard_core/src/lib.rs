//! Mutation/query policy pipeline for SQLite-backed entities.
//!
//! Hooks wrap writes, interceptors wrap reads, and two policies ship as schema
//! mixins: optimistic locking (`lock_ver`) and soft delete (`delete_time`).

pub mod context;
pub mod db;
pub mod error;
pub mod logging;
pub mod mutation;
pub mod pipeline;
pub mod policy;
pub mod predicate;
pub mod query;
pub mod schema;

pub use context::{ignore_optimistic_locking, ignore_soft_delete, CallContext};
pub use db::{open_db, open_db_in_memory, DbError, SqliteExecutor};
pub use error::{PipelineError, PipelineResult};
pub use logging::{default_log_level, init_logging, logging_status, LogConfig};
pub use mutation::{Assignment, Mutation, MutationOutcome, Op};
pub use pipeline::{
    hook_fn, iif, intercept_fn, on, Client, ClientBuilder, Executor, Hook, Interceptor, Next,
};
pub use policy::{OptimisticLocking, SoftDelete, DELETE_TIME_FIELD, LOCK_VERSION_FIELD};
pub use predicate::{Predicate, PredicateSink};
pub use query::{Order, Query, Record};
pub use schema::{EntitySchema, FieldDef, FieldKind, IdStrategy, IndexDef, Mixin, SchemaError};

/// Returns the crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
