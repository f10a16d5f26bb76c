//! User accounts and their role assignments.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use stockline_core::{DomainError, DomainResult, Entity, UserId};

use crate::Role;

// ─────────────────────────────────────────────────────────────────────────────
// User Status
// ─────────────────────────────────────────────────────────────────────────────

/// User account status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum UserStatus {
    /// User is active: can authenticate, is swept for attendance, receives role notifications.
    #[default]
    Active,
    /// User is suspended: skipped by sweeps and role-audience resolution.
    Suspended,
}

impl UserStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            UserStatus::Active => "active",
            UserStatus::Suspended => "suspended",
        }
    }

    pub fn parse(s: &str) -> DomainResult<Self> {
        match s {
            "active" => Ok(UserStatus::Active),
            "suspended" => Ok(UserStatus::Suspended),
            other => Err(DomainError::validation(format!("unknown user status '{other}'"))),
        }
    }
}

impl core::fmt::Display for UserStatus {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// User
// ─────────────────────────────────────────────────────────────────────────────

/// A user account.
///
/// # Invariants
/// - Email is trimmed, lowercased and contains `@`.
/// - Roles are unique (no duplicates).
/// - Suspended users cannot be assigned new roles.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub name: String,
    pub email: String,
    pub status: UserStatus,
    pub roles: Vec<Role>,
    pub created_at: DateTime<Utc>,
}

impl User {
    pub fn new(
        id: UserId,
        name: impl Into<String>,
        email: impl Into<String>,
        roles: Vec<Role>,
        created_at: DateTime<Utc>,
    ) -> DomainResult<Self> {
        let name = name.into().trim().to_string();
        let email = email.into().trim().to_lowercase();

        if name.is_empty() {
            return Err(DomainError::validation("name cannot be empty"));
        }
        if email.is_empty() || !email.contains('@') {
            return Err(DomainError::validation("invalid email format"));
        }

        let mut user = Self {
            id,
            name,
            email,
            status: UserStatus::Active,
            roles: Vec::new(),
            created_at,
        };
        user.set_roles(roles)?;
        Ok(user)
    }

    pub fn is_active(&self) -> bool {
        self.status == UserStatus::Active
    }

    pub fn has_any_role(&self, roles: &[Role]) -> bool {
        self.roles.iter().any(|r| roles.contains(r))
    }

    /// Replace the role set. Duplicates are collapsed; order is normalised.
    pub fn set_roles(&mut self, roles: Vec<Role>) -> DomainResult<()> {
        let mut roles = roles;
        roles.sort();
        roles.dedup();

        let grants_new = roles.iter().any(|r| !self.roles.contains(r));
        if grants_new && self.status == UserStatus::Suspended {
            return Err(DomainError::invariant("user is suspended"));
        }

        self.roles = roles;
        Ok(())
    }

    pub fn suspend(&mut self) -> DomainResult<()> {
        if self.status == UserStatus::Suspended {
            return Err(DomainError::conflict("user already suspended"));
        }
        self.status = UserStatus::Suspended;
        Ok(())
    }

    pub fn activate(&mut self) -> DomainResult<()> {
        if self.status == UserStatus::Active {
            return Err(DomainError::conflict("user already active"));
        }
        self.status = UserStatus::Active;
        Ok(())
    }
}

impl Entity for User {
    type Id = UserId;

    fn id(&self) -> Self::Id {
        self.id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user(roles: Vec<Role>) -> User {
        User::new(UserId::new(), " Ada ", " Ada@Example.COM ", roles, Utc::now()).unwrap()
    }

    #[test]
    fn new_normalises_name_email_and_roles() {
        let u = user(vec![Role::WAREHOUSE, Role::ADMIN, Role::WAREHOUSE]);
        assert_eq!(u.name, "Ada");
        assert_eq!(u.email, "ada@example.com");
        assert_eq!(u.roles, vec![Role::ADMIN, Role::WAREHOUSE]);
        assert!(u.is_active());
    }

    #[test]
    fn new_rejects_bad_email() {
        let err = User::new(UserId::new(), "Ada", "nope", vec![], Utc::now()).unwrap_err();
        assert_eq!(err, DomainError::validation("invalid email format"));
    }

    #[test]
    fn suspended_user_cannot_gain_roles_but_can_lose_them() {
        let mut u = user(vec![Role::WAREHOUSE, Role::SUPERVISOR]);
        u.suspend().unwrap();

        assert!(u.set_roles(vec![Role::ADMIN]).is_err());
        u.set_roles(vec![Role::WAREHOUSE]).unwrap();
        assert_eq!(u.roles, vec![Role::WAREHOUSE]);
    }

    #[test]
    fn status_transitions_reject_no_ops() {
        let mut u = user(vec![]);
        assert!(u.activate().is_err());
        u.suspend().unwrap();
        assert!(u.suspend().is_err());
        u.activate().unwrap();
        assert!(u.is_active());
    }
}
