//! Role-based access control
//!
//! Roles are named sets of `(resource, action)` permissions; users are
//! assigned role names. Either half of a permission may be the wildcard `*`.

use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::sync::RwLock;

use crate::constants::WILDCARD;
use crate::error::{AuthzError, Result};

/// A `(resource, action)` pair; either side may be `*`
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Permission {
    pub resource: String,
    pub action: String,
}

impl Permission {
    pub fn new(resource: impl Into<String>, action: impl Into<String>) -> Self {
        Self {
            resource: resource.into(),
            action: action.into(),
        }
    }

    /// Check if this permission grants `action` on `resource`
    pub fn grants(&self, resource: &str, action: &str) -> bool {
        (self.resource == WILDCARD || self.resource == resource)
            && (self.action == WILDCARD || self.action == action)
    }
}

/// A named set of permissions
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Role {
    pub name: String,
    pub permissions: HashSet<Permission>,
}

impl Role {
    pub fn has_permission(&self, resource: &str, action: &str) -> bool {
        self.permissions.iter().any(|p| p.grants(resource, action))
    }
}

#[derive(Default)]
struct Registry {
    roles: HashMap<String, Role>,
    /// user id -> assigned role names, in assignment order
    user_roles: HashMap<u64, Vec<String>>,
}

impl Registry {
    fn has_permission(&self, user_id: u64, resource: &str, action: &str) -> bool {
        self.user_roles
            .get(&user_id)
            .map(|names| {
                names
                    .iter()
                    .filter_map(|name| self.roles.get(name))
                    .any(|role| role.has_permission(resource, action))
            })
            .unwrap_or(false)
    }
}

/// Role definitions and user assignments
#[derive(Default)]
pub struct RoleRegistry {
    inner: RwLock<Registry>,
}

impl RoleRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Defines a role, replacing the permissions of an existing one
    pub fn add_role(
        &self,
        name: &str,
        permissions: impl IntoIterator<Item = Permission>,
    ) -> Result<()> {
        let role = Role {
            name: name.to_string(),
            permissions: permissions.into_iter().collect(),
        };

        self.inner.write()?.roles.insert(name.to_string(), role);
        log::debug!("Role defined: {}", name);
        Ok(())
    }

    /// Removes a role definition.
    ///
    /// Users keep the name in their assignment list; re-adding the role
    /// restores their access.
    pub fn delete_role(&self, name: &str) -> Result<()> {
        self.inner.write()?.roles.remove(name);
        Ok(())
    }

    pub fn get_role(&self, name: &str) -> Result<Option<Role>> {
        Ok(self.inner.read()?.roles.get(name).cloned())
    }

    /// All role definitions, sorted by name
    pub fn list_roles(&self) -> Result<Vec<Role>> {
        let mut roles: Vec<Role> = self.inner.read()?.roles.values().cloned().collect();
        roles.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(roles)
    }

    /// Assigns a defined role to a user; assigning twice is a no-op
    pub fn assign_role(&self, user_id: u64, role_name: &str) -> Result<()> {
        let mut registry = self.inner.write()?;
        if !registry.roles.contains_key(role_name) {
            return Err(AuthzError::UnknownRole(role_name.to_string()));
        }

        let assigned = registry.user_roles.entry(user_id).or_default();
        if !assigned.iter().any(|r| r == role_name) {
            assigned.push(role_name.to_string());
            log::debug!("Role {} assigned to user {}", role_name, user_id);
        }
        Ok(())
    }

    pub fn remove_role(&self, user_id: u64, role_name: &str) -> Result<()> {
        let mut registry = self.inner.write()?;
        if let Some(assigned) = registry.user_roles.get_mut(&user_id) {
            assigned.retain(|r| r != role_name);
        }
        Ok(())
    }

    pub fn clear_roles(&self, user_id: u64) -> Result<()> {
        self.inner.write()?.user_roles.remove(&user_id);
        Ok(())
    }

    /// Role names assigned to a user, including names whose role was deleted
    pub fn get_user_roles(&self, user_id: u64) -> Result<Vec<String>> {
        Ok(self
            .inner
            .read()?
            .user_roles
            .get(&user_id)
            .cloned()
            .unwrap_or_default())
    }

    /// Union of permissions across the user's defined roles
    pub fn get_user_permissions(&self, user_id: u64) -> Result<HashSet<Permission>> {
        let registry = self.inner.read()?;
        let permissions = registry
            .user_roles
            .get(&user_id)
            .into_iter()
            .flatten()
            .filter_map(|name| registry.roles.get(name))
            .flat_map(|role| role.permissions.iter().cloned())
            .collect();
        Ok(permissions)
    }

    pub fn has_permission(&self, user_id: u64, resource: &str, action: &str) -> Result<bool> {
        Ok(self.inner.read()?.has_permission(user_id, resource, action))
    }

    /// True if any of the permissions is granted
    pub fn has_any(&self, user_id: u64, permissions: &[Permission]) -> Result<bool> {
        let registry = self.inner.read()?;
        Ok(permissions
            .iter()
            .any(|p| registry.has_permission(user_id, &p.resource, &p.action)))
    }

    /// True if every permission is granted
    pub fn has_all(&self, user_id: u64, permissions: &[Permission]) -> Result<bool> {
        let registry = self.inner.read()?;
        Ok(permissions
            .iter()
            .all(|p| registry.has_permission(user_id, &p.resource, &p.action)))
    }

    pub fn check_permission(&self, user_id: u64, resource: &str, action: &str) -> Result<()> {
        if self.has_permission(user_id, resource, action)? {
            return Ok(());
        }

        log::debug!(
            "RBAC denied user {} action {} on {}",
            user_id,
            action,
            resource
        );
        Err(AuthzError::PermissionDenied {
            user_id,
            resource: resource.to_string(),
            action: action.to_string(),
        })
    }
}
