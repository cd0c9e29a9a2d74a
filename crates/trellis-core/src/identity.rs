//! Caller identity and its resolution seam.
//!
//! An [`Identity`] does not exist before authentication succeeds: the
//! [`IdentityProvider`] either yields one or fails with `Unauthorized`.
//! Absence is never modelled as an `Option` that propagates downstream.
//!
//! Credential verification itself (tokens, mTLS, sessions) lives in the
//! collaborator that terminates inbound connections; providers here only
//! read the already-verified principal out of that ambient context.

use crate::error::AppResult;
use crate::handler::BoxFuture;
use serde::{Deserialize, Serialize};

/// The authenticated principal for one request.
///
/// Resolved at most once per request and immutable for the request's
/// lifetime. The `user_id` is the external subject identifier (e.g.
/// `"auth0|abc"`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Identity {
    user_id: String,
}

impl Identity {
    /// Creates an identity from a stable subject identifier.
    #[must_use]
    pub fn new(user_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
        }
    }

    /// Returns the subject identifier.
    #[must_use]
    pub fn user_id(&self) -> &str {
        &self.user_id
    }
}

impl std::fmt::Display for Identity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "user:{}", self.user_id)
    }
}

/// Resolves the authenticated principal for the current request.
///
/// # Errors
///
/// Implementations fail with `Unauthorized` when no principal is present or
/// the principal lacks a stable subject identifier.
pub trait IdentityProvider: Send + Sync + 'static {
    /// Resolves the caller identity.
    fn resolve<'a>(&'a self) -> BoxFuture<'a, AppResult<Identity>>;
}

/// Provisions a local user record for a first-time-seen identity.
///
/// The upsert is keyed by the external subject id and must be idempotent:
/// invoking it any number of times for the same identity yields exactly one
/// record. The enrichment stage treats a provisioning failure as fatal for
/// the whole operation.
pub trait UserProvisioner: Send + Sync + 'static {
    /// Ensures a local user record exists for the identity.
    fn ensure_user<'a>(&'a self, identity: &'a Identity) -> BoxFuture<'a, AppResult<()>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identity_exposes_subject() {
        let identity = Identity::new("auth0|abc");
        assert_eq!(identity.user_id(), "auth0|abc");
    }

    #[test]
    fn display_is_log_friendly() {
        let identity = Identity::new("u123");
        assert_eq!(identity.to_string(), "user:u123");
    }

    #[test]
    fn identity_round_trips_through_serde() {
        let identity = Identity::new("auth0|abc");
        let json = serde_json::to_string(&identity).unwrap();
        let parsed: Identity = serde_json::from_str(&json).unwrap();
        assert_eq!(identity, parsed);
    }
}
