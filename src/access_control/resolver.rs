//! Attribute scope resolvers
//!
//! A resolver expands an abstract scope such as `datasources:name:prom` into the
//! concrete scopes permissions are granted on, e.g. `datasources:id:7`.
//! Resolvers are registered per scope prefix (see [`scope_prefix`]) while the
//! access control service is being set up, and only read afterwards.

use crate::access_control::scope::scope_prefix;
use crate::error::{EvalResult, EvaluationError, RegistrationError, ResolverError};
// async_trait required for dyn-compatibility with Arc<dyn ScopeResolver>
use async_trait::async_trait;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{info, trace};

/// Expands an abstract scope into concrete scopes.
///
/// Resolvers may perform I/O. They receive the caller's cancellation token and
/// should stop work once it is cancelled.
#[async_trait]
pub trait ScopeResolver: Send + Sync {
    /// Resolve `scope` within organization `org_id`.
    ///
    /// Returning several scopes means any of them satisfies the check.
    async fn resolve(
        &self,
        cancel: &CancellationToken,
        org_id: i64,
        scope: &str,
    ) -> Result<Vec<String>, ResolverError>;
}

/// Shared resolver handle
pub type BoxedScopeResolver = Arc<dyn ScopeResolver>;

/// Resolver backed by a synchronous function, for lookups that need no I/O
pub struct FnResolver<F> {
    func: F,
}

impl<F> FnResolver<F>
where
    F: Fn(i64, &str) -> Result<Vec<String>, ResolverError> + Send + Sync,
{
    pub fn new(func: F) -> Self {
        Self { func }
    }
}

#[async_trait]
impl<F> ScopeResolver for FnResolver<F>
where
    F: Fn(i64, &str) -> Result<Vec<String>, ResolverError> + Send + Sync,
{
    async fn resolve(
        &self,
        _cancel: &CancellationToken,
        org_id: i64,
        scope: &str,
    ) -> Result<Vec<String>, ResolverError> {
        (self.func)(org_id, scope)
    }
}

/// Resolvers keyed by scope prefix
#[derive(Default, Clone)]
pub struct ScopeResolverRegistry {
    resolvers: HashMap<String, BoxedScopeResolver>,
}

impl ScopeResolverRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a resolver for a prefix such as `datasources:name:`.
    ///
    /// Registering a second resolver for the same prefix is an error.
    pub fn register(
        &mut self,
        prefix: impl Into<String>,
        resolver: BoxedScopeResolver,
    ) -> Result<(), RegistrationError> {
        let prefix = prefix.into();
        if prefix.is_empty() || !prefix.ends_with(':') {
            return Err(RegistrationError::InvalidResolverPrefix { prefix });
        }
        if self.resolvers.contains_key(&prefix) {
            return Err(RegistrationError::DuplicateResolver { prefix });
        }

        info!(prefix = %prefix, "Registered attribute scope resolver");
        self.resolvers.insert(prefix, resolver);
        Ok(())
    }

    /// Resolver registered for the prefix of `scope`, if any
    pub fn get(&self, scope: &str) -> Option<&BoxedScopeResolver> {
        self.resolvers.get(&scope_prefix(scope))
    }

    pub fn is_empty(&self) -> bool {
        self.resolvers.is_empty()
    }

    pub fn len(&self) -> usize {
        self.resolvers.len()
    }

    /// Bind the registry to one call's organization and cancellation token
    pub fn resolution<'a>(
        &'a self,
        cancel: &'a CancellationToken,
        org_id: i64,
    ) -> ScopeResolution<'a> {
        ScopeResolution {
            registry: Some(self),
            cancel,
            org_id,
        }
    }
}

impl fmt::Debug for ScopeResolverRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut prefixes: Vec<&String> = self.resolvers.keys().collect();
        prefixes.sort();
        f.debug_struct("ScopeResolverRegistry")
            .field("prefixes", &prefixes)
            .finish()
    }
}

/// Scope resolution bound to a single evaluation
pub struct ScopeResolution<'a> {
    registry: Option<&'a ScopeResolverRegistry>,
    cancel: &'a CancellationToken,
    org_id: i64,
}

impl<'a> ScopeResolution<'a> {
    /// Resolution that passes every scope through unchanged
    pub fn passthrough(cancel: &'a CancellationToken) -> Self {
        Self {
            registry: None,
            cancel,
            org_id: 0,
        }
    }

    /// Concrete alternatives for `scope`.
    ///
    /// Scopes without a registered resolver resolve to themselves.
    pub async fn resolve(&self, scope: &str) -> EvalResult<Vec<String>> {
        if self.cancel.is_cancelled() {
            return Err(EvaluationError::Cancelled);
        }

        let Some(resolver) = self.registry.and_then(|r| r.get(scope)) else {
            return Ok(vec![scope.to_string()]);
        };

        let resolved = tokio::select! {
            biased;
            _ = self.cancel.cancelled() => return Err(EvaluationError::Cancelled),
            result = resolver.resolve(self.cancel, self.org_id, scope) => result,
        };

        let scopes = resolved.map_err(|source| EvaluationError::Resolution {
            scope: scope.to_string(),
            source,
        })?;
        trace!(scope, resolved = ?scopes, "Resolved attribute scope");
        Ok(scopes)
    }
}
