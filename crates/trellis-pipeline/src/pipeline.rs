//! Fixed-order pipeline composer.
//!
//! The composer nests the stages around an opaque business handler once, at
//! configuration time; each call then flows through the chain. The stage
//! order is fixed and cannot be modified by users:
//!
//! ```text
//! Request → Logging → Identity → Validation → Transaction → Handler
//! ```
//!
//! Each stage short-circuits on `Err`: no stage below a failing stage
//! executes, and no stage above it can undo the short-circuit. The composer
//! is also the outermost failure boundary: panics escaping the chain are
//! caught exactly once here and coerced into `Err(Unexpected)`.

use crate::stage::{Next, Stage};
use crate::stages::{
    IdentityEnrichmentStage, LoggingStage, TransactionStage, ValidationStage, Validator,
};
use crate::store::TransactionalStore;
use futures_util::FutureExt;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use trellis_core::{
    AppError, AppResult, Handler, IdentityProvider, OperationRequest, PipelineContext,
    UserProvisioner,
};

/// A type-erased stage that can be stored in the chain.
pub type BoxedStage<Req, Res> = Arc<dyn Stage<Req, Res>>;

/// Marker for the fixed stage order.
///
/// Used for logs and introspection; the composer itself assembles stages
/// directly in this order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(u8)]
pub enum StageKind {
    /// Stage 1: entry/exit logging and timing.
    Logging = 1,
    /// Stage 2: identity resolution and enrichment.
    Identity = 2,
    /// Stage 3: request validation.
    Validation = 3,
    /// Stage 4: transaction management around the handler.
    Transaction = 4,
}

impl StageKind {
    /// Returns the stage name.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Logging => "logging",
            Self::Identity => "identity",
            Self::Validation => "validation",
            Self::Transaction => "transaction",
        }
    }

    /// Returns all stages in execution order, outermost first.
    #[must_use]
    pub const fn all() -> [StageKind; 4] {
        [
            Self::Logging,
            Self::Identity,
            Self::Validation,
            Self::Transaction,
        ]
    }
}

/// The composed, fixed-order pipeline for one operation.
///
/// Built once per operation at configuration time; `execute` is then called
/// once per request with a fresh [`PipelineContext`].
///
/// # Example
///
/// ```ignore
/// let pipeline = Pipeline::builder(handler, identity_provider)
///     .store(store)
///     .validator(Arc::new(title_not_empty))
///     .build();
///
/// let mut ctx = PipelineContext::new();
/// let response = pipeline.execute(&mut ctx, request).await;
/// ```
pub struct Pipeline<Req, Res> {
    stages: Vec<BoxedStage<Req, Res>>,
    handler: Arc<dyn Handler<Req, Res>>,
    has_transaction_stage: bool,
}

impl<Req, Res> Pipeline<Req, Res>
where
    Req: OperationRequest,
    Res: Send + 'static,
{
    /// Creates a builder around the business handler and identity provider.
    #[must_use]
    pub fn builder<H>(handler: H, provider: Arc<dyn IdentityProvider>) -> PipelineBuilder<Req, Res>
    where
        H: Handler<Req, Res>,
    {
        PipelineBuilder::new(Arc::new(handler), provider)
    }

    /// Executes one request through the chain.
    ///
    /// This is the outermost boundary: cancellation is observed before any
    /// stage runs, and a panic anywhere in the chain is coerced into
    /// `Err(Unexpected)` after the transaction stage has rolled back.
    pub async fn execute(&self, ctx: &mut PipelineContext, request: Req) -> AppResult<Res> {
        if ctx.cancel_token().is_cancelled() {
            return Err(AppError::cancelled());
        }
        if Req::TRANSACTIONAL && !self.has_transaction_stage {
            return Err(AppError::unexpected(
                "pipeline.store_missing",
                "transactional operation configured without a persistence store",
            ));
        }

        let mut next = Next::handler(self.handler.as_ref());
        for stage in self.stages.iter().rev() {
            next = Next::stage(stage.as_ref(), next);
        }

        match AssertUnwindSafe(next.run(ctx, request)).catch_unwind().await {
            Ok(result) => result,
            Err(panic) => Err(AppError::unexpected(
                "operation.panicked",
                panic_message(&panic),
            )),
        }
    }

    /// Returns the names of the composed stages, outermost first.
    #[must_use]
    pub fn stage_names(&self) -> Vec<&'static str> {
        self.stages.iter().map(|stage| stage.name()).collect()
    }

    /// Returns the number of composed stages.
    #[must_use]
    pub fn stage_count(&self) -> usize {
        self.stages.len()
    }
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    panic
        .downcast_ref::<&str>()
        .map(|s| (*s).to_string())
        .or_else(|| panic.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "operation panicked".to_string())
}

/// Builder for constructing a [`Pipeline`].
///
/// The stage order is fixed; the builder only decides which collaborators
/// back each stage and whether the (purely observational) logging stage is
/// composed at all.
pub struct PipelineBuilder<Req, Res> {
    handler: Arc<dyn Handler<Req, Res>>,
    provider: Arc<dyn IdentityProvider>,
    provisioner: Option<Arc<dyn UserProvisioner>>,
    store: Option<Arc<dyn TransactionalStore>>,
    transaction_stage: Option<TransactionStage>,
    validators: Vec<Arc<dyn Validator<Req>>>,
    logging: bool,
}

impl<Req, Res> PipelineBuilder<Req, Res>
where
    Req: OperationRequest,
    Res: Send + 'static,
{
    fn new(handler: Arc<dyn Handler<Req, Res>>, provider: Arc<dyn IdentityProvider>) -> Self {
        Self {
            handler,
            provider,
            provisioner: None,
            store: None,
            transaction_stage: None,
            validators: Vec::new(),
            logging: true,
        }
    }

    /// Enables user provisioning for first-time-seen identities.
    #[must_use]
    pub fn provisioner(mut self, provisioner: Arc<dyn UserProvisioner>) -> Self {
        self.provisioner = Some(provisioner);
        self
    }

    /// Configures the persistence collaborator backing the transaction
    /// stage. Required for transactional request types.
    #[must_use]
    pub fn store(mut self, store: Arc<dyn TransactionalStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Replaces the whole transaction stage (injected audit clock for
    /// tests).
    #[must_use]
    pub fn transaction_stage(mut self, stage: TransactionStage) -> Self {
        self.transaction_stage = Some(stage);
        self
    }

    /// Registers a validator for the request type.
    #[must_use]
    pub fn validator(mut self, validator: Arc<dyn Validator<Req>>) -> Self {
        self.validators.push(validator);
        self
    }

    /// Enables or disables the logging stage.
    ///
    /// The logging stage is purely observational; disabling it must not
    /// change any result (the integration suite verifies this).
    #[must_use]
    pub fn logging(mut self, enabled: bool) -> Self {
        self.logging = enabled;
        self
    }

    /// Builds the pipeline with the fixed stage order.
    #[must_use]
    pub fn build(self) -> Pipeline<Req, Res> {
        let mut stages: Vec<BoxedStage<Req, Res>> = Vec::new();

        if self.logging {
            stages.push(Arc::new(LoggingStage::new()));
        }

        let mut identity = IdentityEnrichmentStage::new(self.provider);
        if let Some(provisioner) = self.provisioner {
            identity = identity.with_provisioner(provisioner);
        }
        stages.push(Arc::new(identity));

        stages.push(Arc::new(ValidationStage::new(self.validators)));

        let transaction_stage = self
            .transaction_stage
            .or_else(|| self.store.map(TransactionStage::new));
        let has_transaction_stage = transaction_stage.is_some();
        if let Some(stage) = transaction_stage {
            stages.push(Arc::new(stage));
        }

        Pipeline {
            stages,
            handler: self.handler,
            has_transaction_stage,
        }
    }
}
