//! Permissions and permission-set transformations
//!
//! A permission grants one action over one scope. The helpers here are pure
//! transformations over a permission slice.

use crate::access_control::scope::validate_scope;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// Held scopes grouped by action, in the order they were granted
pub type ScopesByAction = HashMap<String, Vec<String>>;

/// A grant of one action over one scope
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Permission {
    /// Action name, e.g. `datasources:read`
    pub action: String,
    /// Scope the action applies to; empty for unqualified actions
    #[serde(default)]
    pub scope: String,
}

impl Permission {
    pub fn new(action: impl Into<String>, scope: impl Into<String>) -> Self {
        Self {
            action: action.into(),
            scope: scope.into(),
        }
    }

    /// Permission for an action that has no resource qualifier
    pub fn unscoped(action: impl Into<String>) -> Self {
        Self::new(action, "")
    }

    /// Whether the scope passes [`validate_scope`]
    pub fn has_valid_scope(&self) -> bool {
        validate_scope(&self.scope)
    }
}

impl fmt::Display for Permission {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.scope.is_empty() {
            write!(f, "{}", self.action)
        } else {
            write!(f, "{} on {}", self.action, self.scope)
        }
    }
}

/// Lookup table of the actions present in a permission set
pub fn build_permissions_map(permissions: &[Permission]) -> HashMap<String, bool> {
    permissions
        .iter()
        .map(|p| (p.action.clone(), true))
        .collect()
}

/// Group scopes by action, keeping duplicates and input order
pub fn group_scopes_by_action(permissions: &[Permission]) -> ScopesByAction {
    let mut grouped: ScopesByAction = HashMap::new();
    for p in permissions {
        grouped
            .entry(p.action.clone())
            .or_default()
            .push(p.scope.clone());
    }
    grouped
}
