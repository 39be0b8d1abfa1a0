//! Permission providers and services
//!
//! The access control service does not store permissions itself. It loads them
//! through a [`PermissionsProvider`], and administrative changes go through a
//! [`PermissionsService`]. Both are traits so that storage-backed
//! implementations and test doubles can be swapped freely.

pub mod static_provider;

pub use static_provider::StaticPermissionsProvider;

use crate::access_control::permission::Permission;
use crate::access_control::types::{
    BuiltInRole, GetUserPermissionsQuery, ResourcePermission, SetResourcePermissionCommand, User,
};
use crate::error::{ProviderError, ServiceError};
// async_trait required for dyn-compatibility with Arc<dyn PermissionsProvider>
use async_trait::async_trait;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Source of the managed permissions held by a user
#[async_trait]
pub trait PermissionsProvider: Send + Sync {
    /// Permissions held by `query.user_id` in `query.org_id`.
    ///
    /// `query.reload_cache` asks implementations that cache to bypass it.
    async fn get_user_permissions(
        &self,
        cancel: &CancellationToken,
        query: &GetUserPermissionsQuery,
    ) -> Result<Vec<Permission>, ProviderError>;
}

/// Shared provider handle
pub type BoxedPermissionsProvider = Arc<dyn PermissionsProvider>;

/// Management of the permissions assigned on one kind of resource
#[async_trait]
pub trait PermissionsService: Send + Sync {
    /// All permissions assigned on `resource_id`
    async fn get_permissions(
        &self,
        cancel: &CancellationToken,
        org_id: i64,
        resource_id: &str,
    ) -> Result<Vec<ResourcePermission>, ServiceError>;

    /// Assign `permission` on `resource_id` to a user.
    ///
    /// An empty `permission` removes the assignment and returns `None`.
    async fn set_user_permission(
        &self,
        cancel: &CancellationToken,
        org_id: i64,
        user: User,
        resource_id: &str,
        permission: &str,
    ) -> Result<Option<ResourcePermission>, ServiceError>;

    /// Assign `permission` on `resource_id` to a team
    async fn set_team_permission(
        &self,
        cancel: &CancellationToken,
        org_id: i64,
        team_id: i64,
        resource_id: &str,
        permission: &str,
    ) -> Result<Option<ResourcePermission>, ServiceError>;

    /// Assign `permission` on `resource_id` to a built-in role
    async fn set_built_in_role_permission(
        &self,
        cancel: &CancellationToken,
        org_id: i64,
        built_in_role: BuiltInRole,
        resource_id: &str,
        permission: &str,
    ) -> Result<Option<ResourcePermission>, ServiceError>;

    /// Apply several assignments on `resource_id` at once
    async fn set_permissions(
        &self,
        cancel: &CancellationToken,
        org_id: i64,
        resource_id: &str,
        commands: &[SetResourcePermissionCommand],
    ) -> Result<Vec<ResourcePermission>, ServiceError>;
}

/// Permission services per resource kind
pub trait PermissionsServices: Send + Sync {
    fn team_service(&self) -> &dyn PermissionsService;

    fn data_source_service(&self) -> &dyn PermissionsService;
}
