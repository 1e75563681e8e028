//! Query interceptor chain.
//!
//! Interceptors run in registration order before the terminal query. They
//! may append predicates or abort with an error; they never produce rows.

use crate::context::CallContext;
use crate::error::PipelineResult;
use crate::query::Query;

/// Read-path middleware.
pub trait Interceptor: Send + Sync {
    fn intercept(&self, ctx: &CallContext, query: &mut Query) -> PipelineResult<()>;
}

/// Interceptor built from a closure; see [`intercept_fn`].
pub struct InterceptFn<F>(F);

pub fn intercept_fn<F>(f: F) -> InterceptFn<F>
where
    F: Fn(&CallContext, &mut Query) -> PipelineResult<()> + Send + Sync,
{
    InterceptFn(f)
}

impl<F> Interceptor for InterceptFn<F>
where
    F: Fn(&CallContext, &mut Query) -> PipelineResult<()> + Send + Sync,
{
    fn intercept(&self, ctx: &CallContext, query: &mut Query) -> PipelineResult<()> {
        (self.0)(ctx, query)
    }
}
