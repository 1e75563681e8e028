//! Data-integrity policies installed as schema mixins.
//!
//! # Responsibility
//! - Optimistic locking: version-guarded compare-and-increment for
//!   single-row updates.
//! - Soft delete: deletes persisted as delete-time updates, and default
//!   exclusion of soft-deleted rows from reads.
//!
//! # Invariants
//! - Each policy is a no-op under its context bypass flag.
//! - Policy errors come from terminal outcomes, never from a predicate that
//!   merely matched nothing.

pub mod optlock;
pub mod softdelete;

pub use optlock::{OptimisticLocking, OptimisticLockingHook, LOCK_VERSION_FIELD};
pub use softdelete::{SoftDelete, SoftDeleteFilter, SoftDeleteHook, DELETE_TIME_FIELD};
