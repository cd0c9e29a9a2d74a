//! Per-invocation pipeline context.
//!
//! [`PipelineContext`] threads per-request state through the stage chain: the
//! request id, the cached identity once resolved, a cancellation signal, and
//! a typed extension bag for accumulated timing/log metadata. It is owned
//! exclusively by the single in-flight call and never shared across
//! concurrent invocations.

use crate::identity::Identity;
use serde::{Deserialize, Serialize};
use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;
use uuid::Uuid;

/// A unique identifier for each request, using UUID v7.
///
/// UUID v7 is time-ordered, which makes it suitable for request tracking
/// and log correlation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RequestId(Uuid);

impl RequestId {
    /// Creates a new unique request ID.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }

    /// Creates a `RequestId` from an existing UUID.
    #[must_use]
    pub const fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Returns the underlying UUID.
    #[must_use]
    pub const fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for RequestId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for RequestId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Cooperative cancellation signal carried by the context.
///
/// Cloning yields a handle to the same signal; any holder may cancel.
/// Stages check this before starting blocking work and abandon the chain
/// rather than complete a partial transaction.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    /// Creates a token in the not-cancelled state.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Signals cancellation to every holder of this token.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    /// Returns `true` once cancellation has been signalled.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Per-invocation state threaded through the stage chain.
///
/// # Example
///
/// ```
/// use trellis_core::{Identity, PipelineContext};
///
/// let mut ctx = PipelineContext::new();
/// assert!(ctx.identity().is_none());
///
/// ctx.set_identity(Identity::new("u123"));
/// assert_eq!(ctx.identity().unwrap().user_id(), "u123");
/// ```
#[derive(Debug)]
pub struct PipelineContext {
    /// Unique identifier for this invocation.
    request_id: RequestId,

    /// The resolved caller identity, cached on first resolution.
    identity: Option<Identity>,

    /// Cancellation signal for this invocation.
    cancel: CancelToken,

    /// When the invocation started.
    started_at: Instant,

    /// Type-erased extension data.
    ///
    /// Stages can stash arbitrary metadata here using type-safe keys; the
    /// logging stage uses this to expose its timing record.
    extensions: HashMap<TypeId, Box<dyn Any + Send + Sync>>,
}

impl PipelineContext {
    /// Creates a context with a fresh request ID and its own cancel token.
    #[must_use]
    pub fn new() -> Self {
        Self::with_cancel_token(CancelToken::new())
    }

    /// Creates a context wired to an externally held cancellation token.
    #[must_use]
    pub fn with_cancel_token(cancel: CancelToken) -> Self {
        Self {
            request_id: RequestId::new(),
            identity: None,
            cancel,
            started_at: Instant::now(),
            extensions: HashMap::new(),
        }
    }

    /// Returns the request ID.
    #[must_use]
    pub const fn request_id(&self) -> RequestId {
        self.request_id
    }

    /// Returns the cached identity, if resolved.
    #[must_use]
    pub const fn identity(&self) -> Option<&Identity> {
        self.identity.as_ref()
    }

    /// Caches the resolved identity for reuse by later stages.
    ///
    /// This should only be called by the identity enrichment stage; one
    /// resolution per request, not per stage.
    pub fn set_identity(&mut self, identity: Identity) {
        self.identity = Some(identity);
    }

    /// Returns the cancellation token.
    #[must_use]
    pub const fn cancel_token(&self) -> &CancelToken {
        &self.cancel
    }

    /// Returns when the invocation started.
    #[must_use]
    pub const fn started_at(&self) -> Instant {
        self.started_at
    }

    /// Returns the elapsed time since the invocation started.
    #[must_use]
    pub fn elapsed(&self) -> std::time::Duration {
        self.started_at.elapsed()
    }

    /// Stores a typed extension value.
    pub fn set_extension<T: Send + Sync + 'static>(&mut self, value: T) {
        self.extensions.insert(TypeId::of::<T>(), Box::new(value));
    }

    /// Retrieves a typed extension value.
    #[must_use]
    pub fn get_extension<T: Send + Sync + 'static>(&self) -> Option<&T> {
        self.extensions
            .get(&TypeId::of::<T>())
            .and_then(|v| v.downcast_ref())
    }

    /// Removes and returns a typed extension value.
    pub fn remove_extension<T: Send + Sync + 'static>(&mut self) -> Option<T> {
        self.extensions
            .remove(&TypeId::of::<T>())
            .and_then(|v| v.downcast().ok())
            .map(|b| *b)
    }

    /// Checks if an extension of the given type exists.
    #[must_use]
    pub fn has_extension<T: Send + Sync + 'static>(&self) -> bool {
        self.extensions.contains_key(&TypeId::of::<T>())
    }
}

impl Default for PipelineContext {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_context_has_no_identity() {
        let ctx = PipelineContext::new();
        assert!(ctx.identity().is_none());
    }

    #[test]
    fn identity_is_cached_once_set() {
        let mut ctx = PipelineContext::new();
        ctx.set_identity(Identity::new("u123"));
        assert_eq!(ctx.identity().unwrap().user_id(), "u123");
    }

    #[test]
    fn cancel_token_is_shared_between_clones() {
        let token = CancelToken::new();
        let ctx = PipelineContext::with_cancel_token(token.clone());

        assert!(!ctx.cancel_token().is_cancelled());
        token.cancel();
        assert!(ctx.cancel_token().is_cancelled());
    }

    #[test]
    fn request_ids_are_unique() {
        assert_ne!(RequestId::new(), RequestId::new());
    }

    #[test]
    fn extensions_round_trip() {
        #[derive(Debug, PartialEq)]
        struct Marker(u32);

        let mut ctx = PipelineContext::new();
        assert!(!ctx.has_extension::<Marker>());

        ctx.set_extension(Marker(7));
        assert_eq!(ctx.get_extension::<Marker>(), Some(&Marker(7)));

        assert_eq!(ctx.remove_extension::<Marker>(), Some(Marker(7)));
        assert!(!ctx.has_extension::<Marker>());
    }

    #[test]
    fn elapsed_is_monotonic() {
        let ctx = PipelineContext::new();
        std::thread::sleep(std::time::Duration::from_millis(5));
        assert!(ctx.elapsed() >= std::time::Duration::from_millis(5));
    }
}
