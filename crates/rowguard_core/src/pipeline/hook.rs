//! Mutation hook chain.
//!
//! # Responsibility
//! - Define the hook contract: observe or rewrite a mutation, then delegate.
//! - Walk the chain outer-to-inner and end in exactly one terminal execution.
//! - Gate hooks on operation kind through a predicate-guarded decorator.
//!
//! # Invariants
//! - A hook either calls `next.run` once, re-submits through `next.client()`,
//!   or short-circuits; it never swallows an inner error.

use super::client::Client;
use crate::context::CallContext;
use crate::error::PipelineResult;
use crate::mutation::{Mutation, MutationOutcome, Op};
use std::sync::Arc;

/// Middleware around mutation execution.
pub trait Hook: Send + Sync {
    fn mutate(
        &self,
        ctx: &CallContext,
        mutation: &mut Mutation,
        next: Next<'_>,
    ) -> PipelineResult<MutationOutcome>;
}

/// Remaining stages of one mutation chain.
///
/// Client-wide hooks run first, then the entity's own hooks, then the
/// terminal executor.
#[derive(Clone, Copy)]
pub struct Next<'a> {
    client: &'a Client,
    global: &'a [Arc<dyn Hook>],
    entity: &'a [Arc<dyn Hook>],
}

impl<'a> Next<'a> {
    pub(crate) fn new(
        client: &'a Client,
        global: &'a [Arc<dyn Hook>],
        entity: &'a [Arc<dyn Hook>],
    ) -> Self {
        Self {
            client,
            global,
            entity,
        }
    }

    /// Hands the mutation to the next stage.
    pub fn run(self, ctx: &CallContext, mutation: &mut Mutation) -> PipelineResult<MutationOutcome> {
        if let Some((hook, rest)) = self.global.split_first() {
            return hook.mutate(ctx, mutation, Next { global: rest, ..self });
        }
        if let Some((hook, rest)) = self.entity.split_first() {
            return hook.mutate(ctx, mutation, Next { entity: rest, ..self });
        }
        self.client.execute_terminal(ctx, mutation)
    }

    /// Coordinator owning this chain.
    ///
    /// `client().mutate(..)` re-enters the full pipeline from the outermost
    /// hook, unlike `run`.
    pub fn client(&self) -> &'a Client {
        self.client
    }
}

/// Hook built from a closure; see [`hook_fn`].
pub struct HookFn<F>(F);

/// Wraps a closure as a [`Hook`].
pub fn hook_fn<F>(f: F) -> HookFn<F>
where
    F: Fn(&CallContext, &mut Mutation, Next<'_>) -> PipelineResult<MutationOutcome>
        + Send
        + Sync,
{
    HookFn(f)
}

impl<F> Hook for HookFn<F>
where
    F: Fn(&CallContext, &mut Mutation, Next<'_>) -> PipelineResult<MutationOutcome>
        + Send
        + Sync,
{
    fn mutate(
        &self,
        ctx: &CallContext,
        mutation: &mut Mutation,
        next: Next<'_>,
    ) -> PipelineResult<MutationOutcome> {
        (self.0)(ctx, mutation, next)
    }
}

/// Runs `hook` only when `condition` holds; otherwise delegates straight to
/// the next stage.
pub struct If<H, C> {
    hook: H,
    condition: C,
}

/// Guards `hook` with an arbitrary condition.
pub fn iif<H, C>(hook: H, condition: C) -> If<H, C>
where
    H: Hook,
    C: Fn(&CallContext, &Mutation) -> bool + Send + Sync,
{
    If { hook, condition }
}

/// Guards `hook` by operation kind, e.g. `on(hook, Op::is_delete)`.
pub fn on<H>(
    hook: H,
    matches: fn(Op) -> bool,
) -> If<H, impl Fn(&CallContext, &Mutation) -> bool + Send + Sync>
where
    H: Hook,
{
    iif(hook, move |_: &CallContext, mutation: &Mutation| {
        matches(mutation.op())
    })
}

impl<H, C> Hook for If<H, C>
where
    H: Hook,
    C: Fn(&CallContext, &Mutation) -> bool + Send + Sync,
{
    fn mutate(
        &self,
        ctx: &CallContext,
        mutation: &mut Mutation,
        next: Next<'_>,
    ) -> PipelineResult<MutationOutcome> {
        if (self.condition)(ctx, mutation) {
            self.hook.mutate(ctx, mutation, next)
        } else {
            next.run(ctx, mutation)
        }
    }
}
