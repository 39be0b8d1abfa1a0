//! Configuration-backed permissions provider
//!
//! Serves the `grants` section of the configuration. Useful for small
//! deployments and the CLI, where no permission store is available.

use crate::access_control::permission::Permission;
use crate::access_control::types::GetUserPermissionsQuery;
use crate::config::{AppConfig, GrantConfig};
use crate::error::ProviderError;
use crate::provider::PermissionsProvider;
use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Permissions provider over a fixed list of grants
#[derive(Debug, Clone, Default)]
pub struct StaticPermissionsProvider {
    grants: Vec<GrantConfig>,
}

impl StaticPermissionsProvider {
    pub fn new(grants: Vec<GrantConfig>) -> Self {
        Self { grants }
    }

    pub fn from_config(config: &AppConfig) -> Self {
        Self::new(config.grants.clone())
    }

    fn applies(grant: &GrantConfig, query: &GetUserPermissionsQuery) -> bool {
        if grant.org_id != query.org_id {
            return false;
        }
        grant.user_id == Some(query.user_id)
            || grant
                .built_in_role
                .is_some_and(|role| query.roles.contains(&role))
    }
}

#[async_trait]
impl PermissionsProvider for StaticPermissionsProvider {
    async fn get_user_permissions(
        &self,
        cancel: &CancellationToken,
        query: &GetUserPermissionsQuery,
    ) -> Result<Vec<Permission>, ProviderError> {
        if cancel.is_cancelled() {
            return Err(ProviderError::Cancelled);
        }

        let permissions: Vec<Permission> = self
            .grants
            .iter()
            .filter(|grant| Self::applies(grant, query))
            .map(GrantConfig::permission)
            .collect();

        debug!(
            org_id = query.org_id,
            user_id = query.user_id,
            count = permissions.len(),
            "Loaded static permissions"
        );
        Ok(permissions)
    }
}
