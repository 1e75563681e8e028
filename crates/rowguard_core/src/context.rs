//! Per-call policy overrides.
//!
//! # Responsibility
//! - Carry the two bypass signals (optimistic locking, soft delete) through a
//!   call tree without touching unrelated code.
//! - Carry the caller's cancellation deadline down to the terminal executor.
//!
//! # Invariants
//! - A `CallContext` is immutable; overrides derive a child value and leave the
//!   parent untouched.
//! - Default context has every policy active and no deadline.

use std::time::{Duration, Instant};

/// Call-scoped context threaded through every mutation and query.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CallContext {
    ignore_optimistic_locking: bool,
    ignore_soft_delete: bool,
    deadline: Option<Instant>,
}

impl CallContext {
    /// Root context: all policies active, no deadline.
    pub fn background() -> Self {
        Self::default()
    }

    /// Derives a child that bypasses optimistic locking.
    pub fn ignoring_optimistic_locking(&self) -> Self {
        Self {
            ignore_optimistic_locking: true,
            ..*self
        }
    }

    /// Derives a child that bypasses soft-delete rewriting and filtering.
    pub fn ignoring_soft_delete(&self) -> Self {
        Self {
            ignore_soft_delete: true,
            ..*self
        }
    }

    /// Derives a child that is cancelled once `deadline` passes.
    ///
    /// An earlier deadline inherited from the parent wins.
    pub fn with_deadline(&self, deadline: Instant) -> Self {
        let deadline = match self.deadline {
            Some(current) if current < deadline => current,
            _ => deadline,
        };
        Self {
            deadline: Some(deadline),
            ..*self
        }
    }

    /// Derives a child cancelled after `timeout` from now.
    pub fn with_timeout(&self, timeout: Duration) -> Self {
        self.with_deadline(Instant::now() + timeout)
    }

    pub fn skips_optimistic_locking(&self) -> bool {
        self.ignore_optimistic_locking
    }

    pub fn skips_soft_delete(&self) -> bool {
        self.ignore_soft_delete
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Returns whether the deadline, if any, has passed.
    pub fn is_cancelled(&self) -> bool {
        self.deadline
            .is_some_and(|deadline| Instant::now() >= deadline)
    }
}

/// Derives a child context that bypasses optimistic locking.
///
/// Meant for internal or administrative writes.
pub fn ignore_optimistic_locking(parent: &CallContext) -> CallContext {
    parent.ignoring_optimistic_locking()
}

/// Derives a child context that bypasses soft delete: deletes become physical
/// and reads include soft-deleted rows.
pub fn ignore_soft_delete(parent: &CallContext) -> CallContext {
    parent.ignoring_soft_delete()
}
