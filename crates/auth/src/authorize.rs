use serde::Serialize;
use thiserror::Error;

use stockline_core::UserId;

use crate::{Permission, Role, RolePolicy};

/// A fully resolved principal for authorization decisions.
///
/// Construction is decoupled from storage and transport: the API derives it
/// from token claims plus a [`RolePolicy`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Principal {
    pub user_id: UserId,
    pub roles: Vec<Role>,
    pub permissions: Vec<Permission>,
}

impl Principal {
    pub fn from_roles(user_id: UserId, roles: Vec<Role>, policy: &RolePolicy) -> Self {
        let permissions = policy.permissions_for(&roles);
        Self {
            user_id,
            roles,
            permissions,
        }
    }

    pub fn has_role(&self, role: &Role) -> bool {
        self.roles.contains(role)
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AuthzError {
    #[error("forbidden: missing permission '{0}'")]
    Forbidden(String),

    #[error("forbidden: resource belongs to another user")]
    NotOwner,
}

/// Operation-side authorization contract.
///
/// Implement this on request wrappers that require permissions; the API layer
/// enforces the requirements before calling into services.
pub trait RequiredPermissions {
    fn required_permissions(&self) -> &[Permission];
}

/// Authorize a principal for a single permission.
///
/// - No IO
/// - No panics
/// - No business logic (pure policy check)
pub fn authorize(principal: &Principal, required: &Permission) -> Result<(), AuthzError> {
    if principal.permissions.iter().any(|p| p.grants(required)) {
        Ok(())
    } else {
        Err(AuthzError::Forbidden(required.as_str().to_string()))
    }
}

/// Authorize access to a resource owned by `owner`.
///
/// Owners always pass; anyone else needs `elevated`.
pub fn authorize_owner_or(
    principal: &Principal,
    owner: UserId,
    elevated: &Permission,
) -> Result<(), AuthzError> {
    if principal.user_id == owner {
        return Ok(());
    }
    authorize(principal, elevated).map_err(|_| AuthzError::NotOwner)
}
