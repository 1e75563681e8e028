//! SQLite persistence engine: the pipeline's terminal stage.
//!
//! # Responsibility
//! - Open and configure SQLite connections.
//! - Render mutations, queries and schema declarations to SQL.
//! - Execute them and report rows affected.
//!
//! # Invariants
//! - Every identifier reaching SQL text has passed identifier validation.
//! - Every value reaches SQLite as a bound parameter.

use crate::schema::SchemaError;
use thiserror::Error;

mod executor;
mod open;
pub mod sql;

pub use executor::SqliteExecutor;
pub use open::{open_db, open_db_in_memory, BUSY_TIMEOUT};

pub type DbResult<T> = Result<T, DbError>;

/// Storage-level failure, passed through the pipeline untranslated.
#[derive(Debug, Error)]
pub enum DbError {
    #[error(transparent)]
    Sqlite(#[from] rusqlite::Error),
    #[error(transparent)]
    Schema(#[from] SchemaError),
    /// A thread panicked while holding the connection.
    #[error("sqlite connection lock poisoned")]
    ConnectionPoisoned,
}
