use std::borrow::Cow;

use serde::{Deserialize, Serialize};

use stockline_core::{DomainError, DomainResult};

/// Role identifier used for RBAC and notification audiences.
///
/// Roles are opaque, case-sensitive names at this layer ("admin", "warehouse").
/// Mapping roles to permissions is done by [`crate::RolePolicy`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Role(Cow<'static, str>);

impl Role {
    pub const ADMIN: Role = Role(Cow::Borrowed("admin"));
    pub const WAREHOUSE: Role = Role(Cow::Borrowed("warehouse"));
    pub const SUPERVISOR: Role = Role(Cow::Borrowed("supervisor"));

    pub fn new(name: impl Into<Cow<'static, str>>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl core::fmt::Display for Role {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.0)
    }
}

/// A role as managed through the roles endpoints: name + human description.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleDefinition {
    pub name: Role,
    pub description: String,
}

impl RoleDefinition {
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> DomainResult<Self> {
        let name = name.into().trim().to_string();
        if name.is_empty() {
            return Err(DomainError::validation("role name cannot be empty"));
        }
        if name.chars().any(char::is_whitespace) {
            return Err(DomainError::validation("role name cannot contain whitespace"));
        }
        Ok(Self {
            name: Role::new(name),
            description: description.into().trim().to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn role_definition_trims_and_validates_name() {
        let def = RoleDefinition::new("  warehouse ", "stock keepers").unwrap();
        assert_eq!(def.name, Role::WAREHOUSE);

        assert!(RoleDefinition::new("   ", "").is_err());
        assert!(RoleDefinition::new("night shift", "").is_err());
    }
}
