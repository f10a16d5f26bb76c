use std::borrow::Cow;
use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::Role;

/// Permission identifier.
///
/// Permissions are opaque dotted strings (e.g. "inventory.items.write").
/// Two wildcard forms are understood by [`Permission::grants`]:
/// - `"*"` grants everything
/// - `"inventory.*"` grants every permission under the `inventory.` prefix
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Permission(Cow<'static, str>);

impl Permission {
    pub const ALL: Permission = Permission(Cow::Borrowed("*"));

    pub const INVENTORY_READ: Permission = Permission(Cow::Borrowed("inventory.read"));
    pub const INVENTORY_WRITE: Permission = Permission(Cow::Borrowed("inventory.write"));
    pub const BATCHES_READ: Permission = Permission(Cow::Borrowed("batches.read"));
    pub const BATCHES_WRITE: Permission = Permission(Cow::Borrowed("batches.write"));
    pub const WORKLOGS_READ_ALL: Permission = Permission(Cow::Borrowed("worklogs.read_all"));
    pub const NOTIFICATIONS_BROADCAST: Permission =
        Permission(Cow::Borrowed("notifications.broadcast"));
    pub const USERS_READ: Permission = Permission(Cow::Borrowed("users.read"));
    pub const USERS_WRITE: Permission = Permission(Cow::Borrowed("users.write"));
    pub const SWEEPS_RUN: Permission = Permission(Cow::Borrowed("sweeps.run"));

    pub fn new(name: impl Into<Cow<'static, str>>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_wildcard(&self) -> bool {
        self.as_str() == "*"
    }

    /// Whether holding `self` satisfies a requirement for `required`.
    pub fn grants(&self, required: &Permission) -> bool {
        if self.is_wildcard() || self == required {
            return true;
        }
        match self.as_str().strip_suffix('*') {
            Some(prefix) if prefix.ends_with('.') => required.as_str().starts_with(prefix),
            _ => false,
        }
    }
}

impl core::fmt::Display for Permission {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Role → permission mapping.
///
/// Unknown roles grant nothing. Every authenticated user can read and manage
/// their own notifications and clock in/out; those checks are ownership
/// checks in the API, not permissions.
#[derive(Debug, Clone)]
pub struct RolePolicy {
    grants: BTreeMap<Role, BTreeSet<Permission>>,
}

impl RolePolicy {
    pub fn empty() -> Self {
        Self {
            grants: BTreeMap::new(),
        }
    }

    pub fn grant(mut self, role: Role, permissions: impl IntoIterator<Item = Permission>) -> Self {
        self.grants.entry(role).or_default().extend(permissions);
        self
    }

    /// Effective permissions for a set of roles (union, deduplicated).
    pub fn permissions_for(&self, roles: &[Role]) -> Vec<Permission> {
        let mut out = BTreeSet::new();
        for role in roles {
            if let Some(perms) = self.grants.get(role) {
                out.extend(perms.iter().cloned());
            }
        }
        out.into_iter().collect()
    }
}

impl Default for RolePolicy {
    fn default() -> Self {
        Self::empty()
            .grant(Role::ADMIN, [Permission::ALL])
            .grant(
                Role::WAREHOUSE,
                [
                    Permission::new("inventory.*"),
                    Permission::new("batches.*"),
                ],
            )
            .grant(
                Role::SUPERVISOR,
                [
                    Permission::INVENTORY_READ,
                    Permission::BATCHES_READ,
                    Permission::WORKLOGS_READ_ALL,
                    Permission::USERS_READ,
                    Permission::SWEEPS_RUN,
                    Permission::NOTIFICATIONS_BROADCAST,
                ],
            )
    }
}
