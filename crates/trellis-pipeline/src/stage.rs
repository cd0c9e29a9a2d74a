//! Core stage trait and chain types.
//!
//! A stage is one composable wrapper in the request-handling chain. Stages
//! receive the per-invocation context, the typed request, and a [`Next`]
//! callback for the chain nested inside them. Returning `Err` without calling
//! `next.run()` short-circuits: nothing below the failing stage executes, and
//! nothing above it can undo the short-circuit.
//!
//! # Invariants
//!
//! - A stage MUST call `next.run()` exactly once unless short-circuiting.
//! - A stage MUST NOT catch and swallow an `Err` from downstream; it either
//!   passes it through unchanged or never sees it.
//!
//! # Example
//!
//! ```ignore
//! use trellis_pipeline::{Next, Stage};
//! use trellis_core::{AppResult, BoxFuture, PipelineContext};
//!
//! struct NoopStage;
//!
//! impl<Req: Send + 'static, Res: Send + 'static> Stage<Req, Res> for NoopStage {
//!     fn name(&self) -> &'static str {
//!         "noop"
//!     }
//!
//!     fn process<'a>(
//!         &'a self,
//!         ctx: &'a mut PipelineContext,
//!         request: Req,
//!         next: Next<'a, Req, Res>,
//!     ) -> BoxFuture<'a, AppResult<Res>> {
//!         Box::pin(async move { next.run(ctx, request).await })
//!     }
//! }
//! ```

use trellis_core::{AppResult, BoxFuture, Handler, PipelineContext};

/// One composable wrapper around the business handler.
///
/// Stages are generic over the operation's request and response types and
/// speak only the `AppResult` channel; there is no side channel for
/// failures.
pub trait Stage<Req, Res>: Send + Sync + 'static {
    /// Returns the unique name of this stage, used for logging and
    /// introspection.
    fn name(&self) -> &'static str;

    /// Processes the request through this stage.
    ///
    /// # Arguments
    ///
    /// * `ctx` - The mutable per-invocation context
    /// * `request` - The typed operation request
    /// * `next` - Callback invoking the chain nested inside this stage
    fn process<'a>(
        &'a self,
        ctx: &'a mut PipelineContext,
        request: Req,
        next: Next<'a, Req, Res>,
    ) -> BoxFuture<'a, AppResult<Res>>;
}

/// Callback to invoke the chain nested inside a stage.
///
/// Consumed by `run`, so it can be invoked at most once; not invoking it
/// short-circuits the chain with whatever the stage returns.
pub struct Next<'a, Req, Res> {
    inner: NextInner<'a, Req, Res>,
}

enum NextInner<'a, Req, Res> {
    /// More stages to process.
    Chain {
        stage: &'a dyn Stage<Req, Res>,
        next: Box<Next<'a, Req, Res>>,
    },
    /// End of chain: the business handler.
    Handler(&'a dyn Handler<Req, Res>),
}

impl<'a, Req, Res> Next<'a, Req, Res>
where
    Req: Send + 'static,
    Res: Send + 'static,
{
    /// Creates a `Next` that will invoke the given stage.
    pub(crate) fn stage(stage: &'a dyn Stage<Req, Res>, next: Next<'a, Req, Res>) -> Self {
        Self {
            inner: NextInner::Chain {
                stage,
                next: Box::new(next),
            },
        }
    }

    /// Creates a terminal `Next` that invokes the business handler.
    pub(crate) fn handler(handler: &'a dyn Handler<Req, Res>) -> Self {
        Self {
            inner: NextInner::Handler(handler),
        }
    }

    /// Invokes the next stage or the handler.
    pub async fn run(self, ctx: &mut PipelineContext, request: Req) -> AppResult<Res> {
        match self.inner {
            NextInner::Chain { stage, next } => stage.process(ctx, request, *next).await,
            NextInner::Handler(handler) => handler.call(ctx, request).await,
        }
    }
}
