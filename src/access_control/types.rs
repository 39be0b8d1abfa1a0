//! Access control types
//!
//! Identities, built-in roles and the records exchanged with permission
//! providers and services.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Organization id used for checks that do not depend on an organization
pub const GLOBAL_ORG_ID: i64 = 0;

/// Role of a user inside an organization
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OrgRole {
    Viewer,
    Editor,
    Admin,
}

impl OrgRole {
    pub const fn as_str(&self) -> &'static str {
        match self {
            OrgRole::Viewer => "Viewer",
            OrgRole::Editor => "Editor",
            OrgRole::Admin => "Admin",
        }
    }

    /// Try to parse an organization role, case-insensitively
    pub fn try_parse(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "viewer" => Some(OrgRole::Viewer),
            "editor" => Some(OrgRole::Editor),
            "admin" => Some(OrgRole::Admin),
            _ => None,
        }
    }

    pub const fn built_in(&self) -> BuiltInRole {
        match self {
            OrgRole::Viewer => BuiltInRole::Viewer,
            OrgRole::Editor => BuiltInRole::Editor,
            OrgRole::Admin => BuiltInRole::Admin,
        }
    }
}

impl fmt::Display for OrgRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Roles fixed roles can be granted to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BuiltInRole {
    Viewer,
    Editor,
    Admin,
    #[serde(rename = "Server Admin")]
    ServerAdmin,
}

impl BuiltInRole {
    pub const fn as_str(&self) -> &'static str {
        match self {
            BuiltInRole::Viewer => "Viewer",
            BuiltInRole::Editor => "Editor",
            BuiltInRole::Admin => "Admin",
            BuiltInRole::ServerAdmin => "Server Admin",
        }
    }

    pub fn try_parse(s: &str) -> Option<Self> {
        match s {
            "Viewer" => Some(BuiltInRole::Viewer),
            "Editor" => Some(BuiltInRole::Editor),
            "Admin" => Some(BuiltInRole::Admin),
            "Server Admin" => Some(BuiltInRole::ServerAdmin),
            _ => None,
        }
    }

    /// Roles that inherit every grant made to this role
    pub const fn parents(&self) -> &'static [BuiltInRole] {
        match self {
            BuiltInRole::Viewer => &[BuiltInRole::Editor, BuiltInRole::Admin],
            BuiltInRole::Editor => &[BuiltInRole::Admin],
            BuiltInRole::Admin | BuiltInRole::ServerAdmin => &[],
        }
    }
}

impl fmt::Display for BuiltInRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// The signed-in identity an access decision is made for
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Identity {
    pub user_id: i64,
    pub login: String,
    pub org_id: i64,
    pub org_name: String,
    pub org_role: Option<OrgRole>,
    pub is_server_admin: bool,
    pub is_external: bool,
}

impl Identity {
    pub fn new(user_id: i64, org_id: i64, org_role: Option<OrgRole>) -> Self {
        Self {
            user_id,
            org_id,
            org_role,
            ..Default::default()
        }
    }

    /// Copy of this identity bound to the global organization.
    ///
    /// Organization role and name are cleared on the copy.
    pub fn with_global_org(&self) -> Self {
        Self {
            org_id: GLOBAL_ORG_ID,
            org_role: None,
            org_name: String::new(),
            ..self.clone()
        }
    }

    /// Built-in roles held by this identity
    pub fn built_in_roles(&self) -> Vec<BuiltInRole> {
        let mut roles = Vec::with_capacity(2);
        if let Some(role) = self.org_role {
            roles.push(role.built_in());
        }
        if self.is_server_admin {
            roles.push(BuiltInRole::ServerAdmin);
        }
        roles
    }

    pub fn user(&self) -> User {
        User {
            id: self.user_id,
            is_external: self.is_external,
        }
    }
}

/// Options for loading a user's permissions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Options {
    /// Ask the provider to bypass any cache it keeps
    pub reload_cache: bool,
}

/// Query sent to a permissions provider
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GetUserPermissionsQuery {
    pub org_id: i64,
    pub user_id: i64,
    pub roles: Vec<BuiltInRole>,
    pub reload_cache: bool,
}

impl GetUserPermissionsQuery {
    pub fn for_identity(identity: &Identity, options: Options) -> Self {
        Self {
            org_id: identity.org_id,
            user_id: identity.user_id,
            roles: identity.built_in_roles(),
            reload_cache: options.reload_cache,
        }
    }
}

/// User reference used by permission management services
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct User {
    pub id: i64,
    pub is_external: bool,
}

/// A permission on a resource as stored by a permission management service
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ResourcePermission {
    pub id: i64,
    pub resource_id: String,
    pub role_name: String,
    pub actions: Vec<String>,
    pub scope: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_id: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_login: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub team_id: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub team: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub built_in_role: Option<BuiltInRole>,
    pub is_managed: bool,
}

impl ResourcePermission {
    /// Whether every one of `actions` is granted by this record
    pub fn contains(&self, actions: &[&str]) -> bool {
        actions
            .iter()
            .all(|wanted| self.actions.iter().any(|a| a == wanted))
    }
}

/// One assignment in a bulk `set_permissions` call.
///
/// Exactly one of `user_id`, `team_id` or `built_in_role` is expected to be set.
/// An empty `permission` removes the assignment.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SetResourcePermissionCommand {
    pub user_id: Option<i64>,
    pub team_id: Option<i64>,
    pub built_in_role: Option<BuiltInRole>,
    pub permission: String,
}
