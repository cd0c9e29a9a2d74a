//! Logging and timing stage.
//!
//! Records a start event carrying the operation name, request id, identity
//! (if already resolved), and the request's structured snapshot; times the
//! inner chain; and records success or failure with elapsed time and, on
//! failure, the error's kind and code.
//! Purely observational: it never alters the `Result` it receives, so
//! removing it from the chain changes nothing but the emitted events (and
//! the differential test in the integration suite holds it to that).

use crate::stage::{Next, Stage};
use trellis_core::{AppResult, BoxFuture, OperationRequest, PipelineContext};

/// Timing record stashed in the context for inspection by callers/tests.
#[derive(Debug, Clone, PartialEq)]
pub struct OperationTiming {
    /// The operation name.
    pub operation: &'static str,
    /// Elapsed wall time in milliseconds.
    pub elapsed_ms: f64,
    /// Whether the chain returned `Ok`.
    pub succeeded: bool,
}

/// Stage that observes entry, outcome, and duration of every operation.
#[derive(Debug, Clone, Default)]
pub struct LoggingStage;

impl LoggingStage {
    /// Creates the logging stage.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl<Req, Res> Stage<Req, Res> for LoggingStage
where
    Req: OperationRequest,
    Res: Send + 'static,
{
    fn name(&self) -> &'static str {
        "logging"
    }

    fn process<'a>(
        &'a self,
        ctx: &'a mut PipelineContext,
        request: Req,
        next: Next<'a, Req, Res>,
    ) -> BoxFuture<'a, AppResult<Res>> {
        Box::pin(async move {
            let start = std::time::Instant::now();
            let snapshot = request.snapshot();
            tracing::info!(
                operation = Req::NAME,
                request_id = %ctx.request_id(),
                identity = ctx.identity().map(ToString::to_string),
                snapshot = %snapshot,
                "operation started"
            );

            let result = next.run(ctx, request).await;

            let elapsed_ms = start.elapsed().as_secs_f64() * 1000.0;
            match &result {
                Ok(_) => {
                    tracing::info!(
                        operation = Req::NAME,
                        request_id = %ctx.request_id(),
                        elapsed_ms,
                        "operation succeeded"
                    );
                }
                Err(err) => {
                    tracing::warn!(
                        operation = Req::NAME,
                        request_id = %ctx.request_id(),
                        elapsed_ms,
                        kind = ?err.kind(),
                        code = err.code(),
                        "operation failed"
                    );
                }
            }

            ctx.set_extension(OperationTiming {
                operation: Req::NAME,
                elapsed_ms,
                succeeded: result.is_ok(),
            });

            result
        })
    }
}
