//! Request validation stage.
//!
//! Runs every validator registered for the request's type in a single pass,
//! aggregating all field-level findings. Any findings short-circuit the
//! chain with a validation error whose details map field names to their
//! ordered messages. With zero validators the stage is a pass-through.

use crate::stage::{Next, Stage};
use std::sync::Arc;
use trellis_core::{
    AppError, AppResult, BoxFuture, FieldErrors, OperationRequest, PipelineContext,
};

/// A structural or semantic check against an incoming request.
///
/// Validators are independent: each sees the same request and appends zero
/// or more findings. They must not perform I/O; the stage is synchronous by
/// design.
pub trait Validator<Req>: Send + Sync + 'static {
    /// Checks the request, recording findings per field.
    fn validate(&self, request: &Req, findings: &mut FieldErrors);
}

impl<Req, F> Validator<Req> for F
where
    F: Fn(&Req, &mut FieldErrors) + Send + Sync + 'static,
{
    fn validate(&self, request: &Req, findings: &mut FieldErrors) {
        self(request, findings);
    }
}

/// Stage that aggregates validator findings and fails fast on any.
pub struct ValidationStage<Req> {
    validators: Vec<Arc<dyn Validator<Req>>>,
}

impl<Req> ValidationStage<Req> {
    /// Creates the stage over the validators applicable to `Req`.
    #[must_use]
    pub fn new(validators: Vec<Arc<dyn Validator<Req>>>) -> Self {
        Self { validators }
    }

    /// Returns the number of registered validators.
    #[must_use]
    pub fn validator_count(&self) -> usize {
        self.validators.len()
    }
}

impl<Req, Res> Stage<Req, Res> for ValidationStage<Req>
where
    Req: OperationRequest,
    Res: Send + 'static,
{
    fn name(&self) -> &'static str {
        "validation"
    }

    fn process<'a>(
        &'a self,
        ctx: &'a mut PipelineContext,
        request: Req,
        next: Next<'a, Req, Res>,
    ) -> BoxFuture<'a, AppResult<Res>> {
        Box::pin(async move {
            if !self.validators.is_empty() {
                let mut findings = FieldErrors::new();
                for validator in &self.validators {
                    validator.validate(&request, &mut findings);
                }
                if !findings.is_empty() {
                    return Err(AppError::validation_with_fields(
                        format!("{}.validation", Req::NAME),
                        "one or more validation errors occurred",
                        findings,
                    ));
                }
            }
            next.run(ctx, request).await
        })
    }
}
