//! Mutation and query middleware pipeline.
//!
//! # Responsibility
//! - Compose hooks around mutation execution and interceptors around queries.
//! - Route both to a pluggable persistence engine.
//!
//! # Invariants
//! - The pipeline holds no locks and no shared mutable state between calls.
//! - Errors from inner stages propagate to the caller unchanged.

mod client;
mod executor;
mod hook;
mod interceptor;

pub use client::{Client, ClientBuilder};
pub use executor::Executor;
pub use hook::{hook_fn, iif, on, Hook, HookFn, If, Next};
pub use interceptor::{intercept_fn, InterceptFn, Interceptor};
