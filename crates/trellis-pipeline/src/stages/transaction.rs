//! Transaction stage.
//!
//! For request types declaring the transactional capability, wraps the inner
//! chain in an atomic unit: begin, run, stamp pending audit metadata, flush,
//! commit on success; roll back on any failure. Either all persistence side
//! effects of the operation become visible, or none do.
//!
//! Requests without the capability pass straight through; no transaction is
//! opened.

use crate::audit::{AuditStamper, SYSTEM_ACTOR};
use crate::stage::{Next, Stage};
use crate::store::TransactionalStore;
use futures_util::FutureExt;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use trellis_core::{AppError, AppResult, BoxFuture, OperationRequest, PipelineContext};

/// Stage enforcing the two-outcome discipline around transactional requests.
///
/// Every opened transaction is committed or rolled back on every exit path,
/// including handler panics and cancellation observed before `begin`.
pub struct TransactionStage {
    store: Arc<dyn TransactionalStore>,
    stamper: AuditStamper,
}

impl TransactionStage {
    /// Creates the stage over a persistence collaborator.
    #[must_use]
    pub fn new(store: Arc<dyn TransactionalStore>) -> Self {
        Self {
            store,
            stamper: AuditStamper::new(),
        }
    }

    /// Replaces the audit stamper (injected clock for tests).
    #[must_use]
    pub fn with_stamper(mut self, stamper: AuditStamper) -> Self {
        self.stamper = stamper;
        self
    }

    async fn rollback_quietly(&self, after: &str) {
        // The rollback itself never masks the original failure.
        if let Err(rollback_err) = self.store.rollback().await {
            tracing::error!(error = %rollback_err, after, "rollback failed");
        }
    }
}

impl<Req, Res> Stage<Req, Res> for TransactionStage
where
    Req: OperationRequest,
    Res: Send + 'static,
{
    fn name(&self) -> &'static str {
        "transaction"
    }

    fn process<'a>(
        &'a self,
        ctx: &'a mut PipelineContext,
        request: Req,
        next: Next<'a, Req, Res>,
    ) -> BoxFuture<'a, AppResult<Res>> {
        Box::pin(async move {
            if !Req::TRANSACTIONAL {
                return next.run(ctx, request).await;
            }

            if ctx.cancel_token().is_cancelled() {
                return Err(AppError::cancelled());
            }

            self.store.begin().await?;

            let outcome = AssertUnwindSafe(next.run(ctx, request)).catch_unwind().await;
            match outcome {
                Ok(Ok(response)) => {
                    let actor = ctx
                        .identity()
                        .map_or_else(|| SYSTEM_ACTOR.to_string(), |i| i.user_id().to_string());
                    self.stamper.stamp_pending(self.store.as_ref(), &actor);

                    if let Err(flush_err) = self.store.flush().await {
                        self.rollback_quietly("flush failure").await;
                        return Err(flush_err);
                    }
                    if let Err(commit_err) = self.store.commit().await {
                        self.rollback_quietly("commit failure").await;
                        return Err(commit_err);
                    }
                    Ok(response)
                }
                Ok(Err(err)) => {
                    self.rollback_quietly("operation failure").await;
                    Err(err)
                }
                Err(panic) => {
                    self.rollback_quietly("panic").await;
                    // The outermost boundary coerces this into Unexpected.
                    std::panic::resume_unwind(panic)
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audit::Auditable;
    use crate::store::EntityState;
    use std::sync::Mutex;
    use trellis_core::{ErrorKind, FnHandler, Handler};

    struct ReadTodos;

    impl OperationRequest for ReadTodos {
        const NAME: &'static str = "todos.list";
    }

    struct CreateTodo;

    impl OperationRequest for CreateTodo {
        const NAME: &'static str = "todos.create";
        const TRANSACTIONAL: bool = true;
    }

    #[derive(Debug, Default)]
    struct Calls {
        begin: usize,
        commit: usize,
        rollback: usize,
        flush: usize,
        fail_flush: bool,
        fail_rollback: bool,
    }

    #[derive(Default)]
    struct SpyStore {
        calls: Mutex<Calls>,
    }

    impl SpyStore {
        fn snapshot(&self) -> (usize, usize, usize, usize) {
            let calls = self.calls.lock().unwrap();
            (calls.begin, calls.commit, calls.rollback, calls.flush)
        }
    }

    impl TransactionalStore for SpyStore {
        fn begin<'a>(&'a self) -> BoxFuture<'a, AppResult<()>> {
            Box::pin(async move {
                self.calls.lock().unwrap().begin += 1;
                Ok(())
            })
        }

        fn commit<'a>(&'a self) -> BoxFuture<'a, AppResult<()>> {
            Box::pin(async move {
                self.calls.lock().unwrap().commit += 1;
                Ok(())
            })
        }

        fn rollback<'a>(&'a self) -> BoxFuture<'a, AppResult<()>> {
            Box::pin(async move {
                let mut calls = self.calls.lock().unwrap();
                calls.rollback += 1;
                if calls.fail_rollback {
                    return Err(AppError::unexpected("store.rollback", "rollback refused"));
                }
                Ok(())
            })
        }

        fn flush<'a>(&'a self) -> BoxFuture<'a, AppResult<()>> {
            Box::pin(async move {
                let mut calls = self.calls.lock().unwrap();
                calls.flush += 1;
                if calls.fail_flush {
                    return Err(AppError::unexpected("store.flush", "disk full"));
                }
                Ok(())
            })
        }

        fn scan_pending(&self, _visit: &mut dyn FnMut(EntityState, &mut dyn Auditable)) {}
    }

    fn ok_handler<Req: OperationRequest>() -> impl Handler<Req, u32> {
        FnHandler::new(|_ctx: &mut PipelineContext, _req: Req| async move { Ok(1) })
    }

    fn err_handler<Req: OperationRequest>() -> impl Handler<Req, u32> {
        FnHandler::new(|_ctx: &mut PipelineContext, _req: Req| async move {
            Err::<u32, _>(AppError::conflict("Todo.Duplicate", "already exists"))
        })
    }

    #[tokio::test]
    async fn non_transactional_request_passes_through() {
        let store = Arc::new(SpyStore::default());
        let stage = TransactionStage::new(store.clone());
        let handler = ok_handler::<ReadTodos>();
        let mut ctx = PipelineContext::new();

        let next = Next::handler(&handler);
        assert!(stage.process(&mut ctx, ReadTodos, next).await.is_ok());
        assert_eq!(store.snapshot(), (0, 0, 0, 0));
    }

    #[tokio::test]
    async fn success_flushes_then_commits() {
        let store = Arc::new(SpyStore::default());
        let stage = TransactionStage::new(store.clone());
        let handler = ok_handler::<CreateTodo>();
        let mut ctx = PipelineContext::new();

        let next = Next::handler(&handler);
        assert!(stage.process(&mut ctx, CreateTodo, next).await.is_ok());
        assert_eq!(store.snapshot(), (1, 1, 0, 1));
    }

    #[tokio::test]
    async fn handler_error_rolls_back_and_propagates_unchanged() {
        let store = Arc::new(SpyStore::default());
        let stage = TransactionStage::new(store.clone());
        let handler = err_handler::<CreateTodo>();
        let mut ctx = PipelineContext::new();

        let next = Next::handler(&handler);
        let err = stage.process(&mut ctx, CreateTodo, next).await.unwrap_err();

        assert_eq!(err.code(), "Todo.Duplicate");
        assert_eq!(store.snapshot(), (1, 0, 1, 0));
    }

    #[tokio::test]
    async fn rollback_failure_never_masks_the_original_error() {
        let store = Arc::new(SpyStore::default());
        store.calls.lock().unwrap().fail_rollback = true;
        let stage = TransactionStage::new(store.clone());
        let handler = err_handler::<CreateTodo>();
        let mut ctx = PipelineContext::new();

        let next = Next::handler(&handler);
        let err = stage.process(&mut ctx, CreateTodo, next).await.unwrap_err();

        assert_eq!(err.code(), "Todo.Duplicate");
        assert_eq!(err.kind(), ErrorKind::Conflict);
    }

    #[tokio::test]
    async fn flush_failure_rolls_back() {
        let store = Arc::new(SpyStore::default());
        store.calls.lock().unwrap().fail_flush = true;
        let stage = TransactionStage::new(store.clone());
        let handler = ok_handler::<CreateTodo>();
        let mut ctx = PipelineContext::new();

        let next = Next::handler(&handler);
        let err = stage.process(&mut ctx, CreateTodo, next).await.unwrap_err();

        assert_eq!(err.code(), "store.flush");
        assert_eq!(store.snapshot(), (1, 0, 1, 1));
    }

    #[tokio::test]
    async fn cancellation_is_observed_before_begin() {
        let store = Arc::new(SpyStore::default());
        let stage = TransactionStage::new(store.clone());
        let handler = ok_handler::<CreateTodo>();

        let mut ctx = PipelineContext::new();
        ctx.cancel_token().cancel();

        let next = Next::handler(&handler);
        let err = stage.process(&mut ctx, CreateTodo, next).await.unwrap_err();

        assert_eq!(err.code(), trellis_core::CANCELLED_CODE);
        assert_eq!(store.snapshot(), (0, 0, 0, 0));
    }
}
