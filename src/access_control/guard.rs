//! Boolean access guards for call sites
//!
//! The guards never return an error. Any failure while loading or evaluating
//! permissions is logged on the request span and treated as a denial. When
//! access control is disabled the caller's fallback predicate decides instead.

use crate::access_control::evaluator::Evaluator;
use crate::access_control::service::AccessControl;
use crate::access_control::types::{Identity, OrgRole};
use tokio_util::sync::CancellationToken;
use tracing::{Span, error};

/// Per-request state handed to the guards
#[derive(Debug, Clone)]
pub struct RequestContext {
    pub identity: Identity,
    pub cancel: CancellationToken,
    /// Span non-fatal access control errors are logged under
    pub span: Span,
}

impl RequestContext {
    pub fn new(identity: Identity) -> Self {
        Self {
            identity,
            cancel: CancellationToken::new(),
            span: Span::current(),
        }
    }

    pub fn with_cancel(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn with_span(mut self, span: Span) -> Self {
        self.span = span;
        self
    }
}

/// Fallback allowing server administrators only
pub fn req_server_admin(ctx: &RequestContext) -> bool {
    ctx.identity.is_server_admin
}

/// Fallback allowing organization administrators only
pub fn req_org_admin(ctx: &RequestContext) -> bool {
    ctx.identity.org_role == Some(OrgRole::Admin)
}

async fn evaluate_or_deny<A>(
    ac: &A,
    ctx: &RequestContext,
    identity: &Identity,
    evaluator: &Evaluator,
) -> bool
where
    A: AccessControl + ?Sized,
{
    match ac.evaluate(&ctx.cancel, identity, evaluator).await {
        Ok(allowed) => allowed,
        Err(e) => {
            error!(
                parent: &ctx.span,
                error = %e,
                evaluator = %evaluator,
                user_id = identity.user_id,
                org_id = identity.org_id,
                "Error from access control system"
            );
            false
        }
    }
}

/// Check access in the identity's current organization
pub async fn has_access<A, F>(ac: &A, ctx: &RequestContext, fallback: F, evaluator: &Evaluator) -> bool
where
    A: AccessControl + ?Sized,
    F: FnOnce(&RequestContext) -> bool,
{
    if ac.is_disabled() {
        return fallback(ctx);
    }

    evaluate_or_deny(ac, ctx, &ctx.identity, evaluator).await
}

/// Check access using globally assigned permissions only.
///
/// Evaluates against a copy of the identity bound to the global organization;
/// the request's identity is left untouched.
pub async fn has_global_access<A, F>(
    ac: &A,
    ctx: &RequestContext,
    fallback: F,
    evaluator: &Evaluator,
) -> bool
where
    A: AccessControl + ?Sized,
    F: FnOnce(&RequestContext) -> bool,
{
    if ac.is_disabled() {
        return fallback(ctx);
    }

    let global = ctx.identity.with_global_org();
    evaluate_or_deny(ac, ctx, &global, evaluator).await
}
