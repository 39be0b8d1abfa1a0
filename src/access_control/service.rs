//! Access control service
//!
//! [`AccessControl`] is the contract call sites depend on. [`AccessControlEngine`]
//! is the implementation: it assembles a user's permissions from declared fixed
//! roles and a [`PermissionsProvider`](crate::provider::PermissionsProvider),
//! resolves attribute scopes, and runs the evaluator.
//!
//! Registration takes `&mut self`. Once the engine is shared behind an `Arc`,
//! the role table and resolver registry can no longer change.

use crate::access_control::evaluator::Evaluator;
use crate::access_control::permission::{Permission, group_scopes_by_action};
use crate::access_control::resolver::{BoxedScopeResolver, ScopeResolverRegistry};
use crate::access_control::roles::{FixedRoles, RoleDto, RoleRegistration};
use crate::access_control::types::{GetUserPermissionsQuery, Identity, Options};
use crate::config::{AccessControlConfig, AppConfig};
use crate::error::{AccessControlError, ProviderError, RegistrationError};
use crate::provider::BoxedPermissionsProvider;
// async_trait required for dyn-compatibility with Arc<dyn AccessControl>
use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// Access decisions for signed-in identities
#[async_trait]
pub trait AccessControl: Send + Sync {
    /// Evaluate `evaluator` against the permissions `identity` holds
    async fn evaluate(
        &self,
        cancel: &CancellationToken,
        identity: &Identity,
        evaluator: &Evaluator,
    ) -> Result<bool, AccessControlError>;

    /// Permissions held by `identity` in its current organization
    async fn get_user_permissions(
        &self,
        cancel: &CancellationToken,
        identity: &Identity,
        options: Options,
    ) -> Result<Vec<Permission>, AccessControlError>;

    /// Fixed roles held by `identity`
    async fn get_user_roles(
        &self,
        cancel: &CancellationToken,
        identity: &Identity,
    ) -> Result<Vec<RoleDto>, AccessControlError>;

    /// Whether access control is administratively disabled
    fn is_disabled(&self) -> bool;

    /// Declare fixed roles and their grants to built-in roles
    fn declare_fixed_roles(
        &mut self,
        registrations: &[RoleRegistration],
    ) -> Result<(), RegistrationError>;

    /// Register a resolver for scopes starting with `prefix` (ex: `datasources:name:`)
    fn register_attribute_scope_resolver(
        &mut self,
        prefix: &str,
        resolver: BoxedScopeResolver,
    ) -> Result<(), RegistrationError>;
}

/// Access control service backed by a permissions provider
pub struct AccessControlEngine {
    disabled: bool,
    provider: BoxedPermissionsProvider,
    fixed_roles: FixedRoles,
    resolvers: ScopeResolverRegistry,
}

impl AccessControlEngine {
    pub fn new(config: &AccessControlConfig, provider: BoxedPermissionsProvider) -> Self {
        Self {
            disabled: !config.enabled,
            provider,
            fixed_roles: FixedRoles::new(),
            resolvers: ScopeResolverRegistry::new(),
        }
    }

    /// Create an engine and declare the fixed roles listed in the configuration
    pub fn from_config(
        config: &AppConfig,
        provider: BoxedPermissionsProvider,
    ) -> Result<Self, AccessControlError> {
        let mut engine = Self::new(&config.access_control, provider);
        let registrations: Vec<RoleRegistration> =
            config.roles.iter().map(|r| r.to_registration()).collect();
        engine.declare_fixed_roles(&registrations)?;

        info!(
            enabled = config.access_control.enabled,
            roles = engine.fixed_roles.len(),
            "Access control engine ready"
        );
        Ok(engine)
    }

    pub fn fixed_roles(&self) -> &FixedRoles {
        &self.fixed_roles
    }

    pub fn resolvers(&self) -> &ScopeResolverRegistry {
        &self.resolvers
    }
}

#[async_trait]
impl AccessControl for AccessControlEngine {
    async fn evaluate(
        &self,
        cancel: &CancellationToken,
        identity: &Identity,
        evaluator: &Evaluator,
    ) -> Result<bool, AccessControlError> {
        debug!(
            user_id = identity.user_id,
            org_id = identity.org_id,
            evaluator = %evaluator,
            "Evaluating access"
        );

        let permissions = self
            .get_user_permissions(cancel, identity, Options::default())
            .await?;
        let held = group_scopes_by_action(&permissions);
        let resolution = self.resolvers.resolution(cancel, identity.org_id);
        let allowed = evaluator.evaluate_with(&held, &resolution).await?;

        debug!(user_id = identity.user_id, allowed, "Access evaluated");
        Ok(allowed)
    }

    async fn get_user_permissions(
        &self,
        cancel: &CancellationToken,
        identity: &Identity,
        options: Options,
    ) -> Result<Vec<Permission>, AccessControlError> {
        if cancel.is_cancelled() {
            return Err(AccessControlError::Cancelled);
        }

        let mut permissions = self.fixed_roles.permissions_for(identity);
        let query = GetUserPermissionsQuery::for_identity(identity, options);
        let managed = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(AccessControlError::Cancelled),
            result = self.provider.get_user_permissions(cancel, &query) => result,
        };
        let managed = managed.map_err(|e| match e {
            ProviderError::Cancelled => AccessControlError::Cancelled,
            e => AccessControlError::Provider(e),
        })?;
        permissions.extend(managed);

        Ok(permissions)
    }

    async fn get_user_roles(
        &self,
        _cancel: &CancellationToken,
        identity: &Identity,
    ) -> Result<Vec<RoleDto>, AccessControlError> {
        Ok(self
            .fixed_roles
            .roles_for(identity)
            .into_iter()
            .cloned()
            .collect())
    }

    fn is_disabled(&self) -> bool {
        self.disabled
    }

    fn declare_fixed_roles(
        &mut self,
        registrations: &[RoleRegistration],
    ) -> Result<(), RegistrationError> {
        self.fixed_roles.declare(registrations)
    }

    fn register_attribute_scope_resolver(
        &mut self,
        prefix: &str,
        resolver: BoxedScopeResolver,
    ) -> Result<(), RegistrationError> {
        self.resolvers.register(prefix, resolver)
    }
}
