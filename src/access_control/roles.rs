//! Fixed roles
//!
//! Fixed roles are declared once at startup and granted to built-in roles.
//! A grant to a built-in role is inherited by its parents, so a role granted to
//! `Viewer` is also held by `Editor` and `Admin`.

use crate::access_control::permission::Permission;
use crate::access_control::scope::validate_scope;
use crate::access_control::types::{BuiltInRole, Identity};
use crate::error::RegistrationError;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::{debug, info};

/// Prefix every fixed role name must carry
pub const FIXED_ROLE_PREFIX: &str = "fixed:";

/// A role definition
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct RoleDto {
    pub version: i64,
    pub uid: String,
    pub name: String,
    pub display_name: String,
    pub description: String,
    pub group: String,
    pub permissions: Vec<Permission>,
    pub hidden: bool,
}

/// A fixed role together with the built-in roles it is granted to
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleRegistration {
    pub role: RoleDto,
    pub grants: Vec<BuiltInRole>,
}

impl RoleRegistration {
    fn validate(&self) -> Result<(), RegistrationError> {
        if !self.role.name.starts_with(FIXED_ROLE_PREFIX) {
            return Err(RegistrationError::InvalidRoleName {
                name: self.role.name.clone(),
            });
        }

        if let Some(bad) = self.role.permissions.iter().find(|p| !validate_scope(&p.scope)) {
            return Err(RegistrationError::InvalidScope {
                role: self.role.name.clone(),
                scope: bad.scope.clone(),
            });
        }

        Ok(())
    }
}

/// Declared fixed roles and their built-in role assignments
#[derive(Debug, Default, Clone)]
pub struct FixedRoles {
    /// Declared roles, in declaration order
    roles: Vec<RoleRegistration>,
    /// Role name to index in `roles`
    by_name: HashMap<String, usize>,
    /// Built-in role to indexes of the roles it holds
    assignments: HashMap<BuiltInRole, Vec<usize>>,
}

impl FixedRoles {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare fixed roles.
    ///
    /// Redeclaring an identical role is a no-op. Declaring a different
    /// definition under an existing name fails, and nothing from the batch
    /// is applied.
    pub fn declare(&mut self, registrations: &[RoleRegistration]) -> Result<(), RegistrationError> {
        let mut pending: HashMap<&str, &RoleRegistration> = HashMap::new();
        for registration in registrations {
            registration.validate()?;

            let name = registration.role.name.as_str();
            let existing = self
                .by_name
                .get(name)
                .map(|&i| &self.roles[i])
                .or_else(|| pending.get(name).copied());
            match existing {
                Some(existing) if existing != registration => {
                    return Err(RegistrationError::ConflictingRole {
                        name: name.to_string(),
                    });
                }
                Some(_) => {}
                None => {
                    pending.insert(name, registration);
                }
            }
        }

        for registration in registrations {
            if self.by_name.contains_key(&registration.role.name) {
                debug!(role = %registration.role.name, "Fixed role already declared");
                continue;
            }
            self.insert(registration.clone());
        }

        Ok(())
    }

    fn insert(&mut self, registration: RoleRegistration) {
        let index = self.roles.len();
        for granted in &registration.grants {
            for role in std::iter::once(granted).chain(granted.parents()) {
                let held = self.assignments.entry(*role).or_default();
                if !held.contains(&index) {
                    held.push(index);
                }
            }
        }

        info!(
            role = %registration.role.name,
            grants = ?registration.grants,
            "Declared fixed role"
        );
        self.by_name.insert(registration.role.name.clone(), index);
        self.roles.push(registration);
    }

    /// Fixed roles held by an identity, in declaration order
    pub fn roles_for(&self, identity: &Identity) -> Vec<&RoleDto> {
        let mut indexes: Vec<usize> = identity
            .built_in_roles()
            .iter()
            .filter_map(|role| self.assignments.get(role))
            .flatten()
            .copied()
            .collect();
        indexes.sort_unstable();
        indexes.dedup();

        indexes.into_iter().map(|i| &self.roles[i].role).collect()
    }

    /// Permissions granted to an identity through its fixed roles
    pub fn permissions_for(&self, identity: &Identity) -> Vec<Permission> {
        self.roles_for(identity)
            .into_iter()
            .flat_map(|role| role.permissions.iter().cloned())
            .collect()
    }

    pub fn get(&self, name: &str) -> Option<&RoleRegistration> {
        self.by_name.get(name).map(|&i| &self.roles[i])
    }

    pub fn len(&self) -> usize {
        self.roles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.roles.is_empty()
    }
}
