//! Configuration types for scope-acl
//!
//! This module defines the configuration structure that can be loaded from
//! TOML files and/or environment variables.

use crate::access_control::permission::Permission;
use crate::access_control::roles::{RoleDto, RoleRegistration};
use crate::access_control::types::BuiltInRole;
use serde::Deserialize;

/// Root configuration structure
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Access control mode
    pub access_control: AccessControlConfig,

    /// Logging configuration
    pub logging: LoggingConfig,

    /// Fixed role declarations
    pub roles: Vec<FixedRoleConfig>,

    /// Statically managed permissions
    pub grants: Vec<GrantConfig>,
}

/// Access control mode
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AccessControlConfig {
    /// When false, access guards defer to their fallback instead of evaluating
    pub enabled: bool,
}

impl Default for AccessControlConfig {
    fn default() -> Self {
        Self { enabled: true }
    }
}

/// Permission entry in a role or grant
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct PermissionConfig {
    pub action: String,

    #[serde(default)]
    pub scope: String,
}

impl From<&PermissionConfig> for Permission {
    fn from(config: &PermissionConfig) -> Self {
        Permission::new(config.action.clone(), config.scope.clone())
    }
}

/// Fixed role declaration
///
/// ```toml
/// [[roles]]
/// name = "fixed:datasources:reader"
/// grants = ["Viewer"]
/// permissions = [{ action = "datasources:read", scope = "datasources:*" }]
/// ```
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct FixedRoleConfig {
    /// Role name, must start with `fixed:`
    pub name: String,

    pub display_name: Option<String>,

    pub description: Option<String>,

    pub group: Option<String>,

    pub version: i64,

    pub hidden: bool,

    /// Built-in roles this role is granted to
    pub grants: Vec<BuiltInRole>,

    pub permissions: Vec<PermissionConfig>,
}

impl FixedRoleConfig {
    pub fn to_registration(&self) -> RoleRegistration {
        RoleRegistration {
            role: RoleDto {
                version: self.version,
                uid: String::new(),
                name: self.name.clone(),
                display_name: self.display_name.clone().unwrap_or_default(),
                description: self.description.clone().unwrap_or_default(),
                group: self.group.clone().unwrap_or_default(),
                permissions: self.permissions.iter().map(Permission::from).collect(),
                hidden: self.hidden,
            },
            grants: self.grants.clone(),
        }
    }
}

/// Statically managed permission
///
/// Applies to `user_id` or to everyone holding `built_in_role` in `org_id`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct GrantConfig {
    pub org_id: i64,

    #[serde(default)]
    pub user_id: Option<i64>,

    #[serde(default)]
    pub built_in_role: Option<BuiltInRole>,

    pub action: String,

    #[serde(default)]
    pub scope: String,
}

impl GrantConfig {
    pub fn permission(&self) -> Permission {
        Permission::new(self.action.clone(), self.scope.clone())
    }
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,

    /// Output format (pretty, json)
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Pretty,
        }
    }
}

/// Log output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Human-readable output
    #[default]
    Pretty,
    /// JSON structured output
    Json,
}
