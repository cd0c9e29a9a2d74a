//! Operation requests and business handlers.
//!
//! A business handler is opaque to the pipeline: `(Request) -> AppResult<Response>`.
//! The [`OperationRequest`] capability trait is what the pipeline reads off a
//! request *type*: its stable operation name, whether it is transactional,
//! and how the resolved identity is bound onto it before validation.

use crate::context::PipelineContext;
use crate::error::AppResult;
use crate::identity::Identity;
use std::future::Future;
use std::pin::Pin;

/// A boxed future returned by handlers and stages.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Capabilities a request type declares to the pipeline.
///
/// These are type-level predicates resolved at compile time per concrete
/// request type; there is no runtime attribute lookup.
///
/// # Example
///
/// ```
/// use trellis_core::{Identity, OperationRequest};
///
/// struct CreateTodo {
///     title: String,
///     owner: Option<Identity>,
/// }
///
/// impl OperationRequest for CreateTodo {
///     const NAME: &'static str = "todos.create";
///     const TRANSACTIONAL: bool = true;
///
///     fn bind_identity(&mut self, identity: &Identity) {
///         self.owner = Some(identity.clone());
///     }
/// }
/// ```
pub trait OperationRequest: Send + 'static {
    /// Stable operation name used in logs and validation codes.
    const NAME: &'static str;

    /// Whether execution must be wrapped in a storage transaction.
    ///
    /// Requests without this capability run outside any transaction
    /// boundary (plain reads, no-op-on-failure operations).
    const TRANSACTIONAL: bool = false;

    /// Binds the resolved identity onto the request before validation
    /// inspects it. Default is a no-op for requests with no identity field.
    fn bind_identity(&mut self, _identity: &Identity) {}

    /// Structured snapshot of the request, emitted with the start-of-operation
    /// log event.
    ///
    /// Defaults to `Null`; override to expose the fields that are safe to
    /// log. Credentials and personal data stay out unless the request type
    /// explicitly reveals them here.
    fn snapshot(&self) -> serde_json::Value {
        serde_json::Value::Null
    }
}

/// A business handler: the innermost link of the stage chain.
///
/// Handlers return their outcome exclusively through the `AppResult`
/// channel; panics are reserved for truly unrecoverable faults and are
/// coerced to `Unexpected` at the pipeline's outermost boundary.
pub trait Handler<Req, Res>: Send + Sync + 'static {
    /// Executes the business logic for one request.
    fn call<'a>(&'a self, ctx: &'a mut PipelineContext, request: Req) -> BoxFuture<'a, AppResult<Res>>;
}

/// A function-based handler wrapper.
///
/// Lets async closures act as handlers without a named type. The closure
/// runs synchronously with the context borrowed, then returns an owned
/// future; copy whatever context state the future needs before building it.
///
/// # Example
///
/// ```
/// use trellis_core::{AppResult, FnHandler, Handler, PipelineContext};
///
/// let handler = FnHandler::new(|_ctx: &mut PipelineContext, n: u32| async move {
///     AppResult::Ok(n + 1)
/// });
/// # let _ = handler;
/// ```
pub struct FnHandler<F> {
    func: F,
}

impl<F> FnHandler<F> {
    /// Wraps a closure as a handler.
    pub const fn new(func: F) -> Self {
        Self { func }
    }
}

impl<F, Fut, Req, Res> Handler<Req, Res> for FnHandler<F>
where
    F: Fn(&mut PipelineContext, Req) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = AppResult<Res>> + Send + 'static,
    Req: Send + 'static,
    Res: Send + 'static,
{
    fn call<'a>(&'a self, ctx: &'a mut PipelineContext, request: Req) -> BoxFuture<'a, AppResult<Res>> {
        Box::pin((self.func)(ctx, request))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AppError;

    struct Ping;

    impl OperationRequest for Ping {
        const NAME: &'static str = "ping";
    }

    struct CreateTodo {
        owner: Option<Identity>,
    }

    impl OperationRequest for CreateTodo {
        const NAME: &'static str = "todos.create";
        const TRANSACTIONAL: bool = true;

        fn bind_identity(&mut self, identity: &Identity) {
            self.owner = Some(identity.clone());
        }

        fn snapshot(&self) -> serde_json::Value {
            serde_json::json!({ "has_owner": self.owner.is_some() })
        }
    }

    #[test]
    fn transactional_defaults_to_false() {
        assert!(!Ping::TRANSACTIONAL);
        assert!(CreateTodo::TRANSACTIONAL);
    }

    #[test]
    fn bind_identity_default_is_noop() {
        let mut ping = Ping;
        ping.bind_identity(&Identity::new("u1"));
    }

    #[test]
    fn snapshot_defaults_to_null() {
        assert_eq!(Ping.snapshot(), serde_json::Value::Null);
    }

    #[test]
    fn snapshot_override_reveals_declared_fields() {
        let request = CreateTodo {
            owner: Some(Identity::new("u1")),
        };
        assert_eq!(request.snapshot(), serde_json::json!({ "has_owner": true }));
    }

    #[test]
    fn bind_identity_populates_request_field() {
        let mut request = CreateTodo { owner: None };
        request.bind_identity(&Identity::new("u1"));
        assert_eq!(request.owner.unwrap().user_id(), "u1");
    }

    #[tokio::test]
    async fn fn_handler_invokes_closure() {
        let handler = FnHandler::new(|_ctx: &mut PipelineContext, n: u32| async move {
            if n == 0 {
                return Err(AppError::validation("ping.zero", "zero is not allowed"));
            }
            Ok(n * 2)
        });

        let mut ctx = PipelineContext::new();
        assert_eq!(handler.call(&mut ctx, 21).await.unwrap(), 42);
        assert!(handler.call(&mut ctx, 0).await.is_err());
    }
}
