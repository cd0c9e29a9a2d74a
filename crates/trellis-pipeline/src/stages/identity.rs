//! Identity enrichment stage.
//!
//! Resolves the authenticated principal once per request, caches it in the
//! context for later stages, optionally provisions a local user record for
//! first-time-seen identities, and binds the identity onto the request
//! before validation inspects it.
//!
//! An unresolvable identity short-circuits with `Unauthorized` before any
//! validation runs, so identity problems are reported before content
//! problems are revealed.

use crate::stage::{Next, Stage};
use std::sync::Arc;
use trellis_core::{
    AppError, AppResult, BoxFuture, IdentityProvider, OperationRequest, PipelineContext,
    UserProvisioner,
};

/// Stage that resolves and caches the caller identity.
pub struct IdentityEnrichmentStage {
    provider: Arc<dyn IdentityProvider>,
    provisioner: Option<Arc<dyn UserProvisioner>>,
}

impl IdentityEnrichmentStage {
    /// Creates the enrichment stage over an identity provider.
    #[must_use]
    pub fn new(provider: Arc<dyn IdentityProvider>) -> Self {
        Self {
            provider,
            provisioner: None,
        }
    }

    /// Enables best-effort user provisioning for first-time-seen identities.
    #[must_use]
    pub fn with_provisioner(mut self, provisioner: Arc<dyn UserProvisioner>) -> Self {
        self.provisioner = Some(provisioner);
        self
    }
}

impl<Req, Res> Stage<Req, Res> for IdentityEnrichmentStage
where
    Req: OperationRequest,
    Res: Send + 'static,
{
    fn name(&self) -> &'static str {
        "identity"
    }

    fn process<'a>(
        &'a self,
        ctx: &'a mut PipelineContext,
        mut request: Req,
        next: Next<'a, Req, Res>,
    ) -> BoxFuture<'a, AppResult<Res>> {
        Box::pin(async move {
            let identity = match ctx.identity() {
                // One resolution per request, not per stage.
                Some(identity) => identity.clone(),
                None => {
                    let identity = self.provider.resolve().await?;
                    if let Some(provisioner) = &self.provisioner {
                        // Provisioning failure must not silently proceed
                        // with a user-less request.
                        provisioner.ensure_user(&identity).await.map_err(|err| {
                            AppError::unexpected_with_source(
                                "identity.provisioning_failed",
                                "failed to provision a user record for the caller",
                                err,
                            )
                        })?;
                    }
                    ctx.set_identity(identity.clone());
                    identity
                }
            };

            request.bind_identity(&identity);
            next.run(ctx, request).await
        })
    }
}
