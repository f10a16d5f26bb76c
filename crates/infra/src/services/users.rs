//! User and role administration.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Deserialize;
use tracing::info;

use stockline_auth::{Role, RoleDefinition, User};
use stockline_core::{DomainError, UserId};

use super::error::{ServiceError, ServiceResult};
use crate::error::RepositoryError;
use crate::repository::UserDirectory;

#[derive(Debug, Clone, Deserialize)]
pub struct NewUser {
    pub name: String,
    pub email: String,
    #[serde(default)]
    pub roles: Vec<Role>,
}

/// Roles every deployment starts with.
fn builtin_roles() -> ServiceResult<Vec<RoleDefinition>> {
    Ok(vec![
        RoleDefinition::new(Role::ADMIN.as_str(), "Full access")?,
        RoleDefinition::new(Role::WAREHOUSE.as_str(), "Stock keeping and production")?,
        RoleDefinition::new(Role::SUPERVISOR.as_str(), "Attendance and overtime oversight")?,
    ])
}

pub struct UserService {
    directory: Arc<dyn UserDirectory>,
}

impl UserService {
    pub fn new(directory: Arc<dyn UserDirectory>) -> Self {
        Self { directory }
    }

    /// Insert the built-in role definitions that are missing.
    pub async fn ensure_builtin_roles(&self) -> ServiceResult<()> {
        let existing = self.directory.list_roles().await?;
        for role in builtin_roles()? {
            if existing.iter().any(|r| r.name == role.name) {
                continue;
            }
            match self.directory.insert_role(&role).await {
                // Another instance seeded it first.
                Ok(()) | Err(RepositoryError::Conflict(_)) => {}
                Err(e) => return Err(e.into()),
            }
        }
        Ok(())
    }

    pub async fn create_user(&self, new: NewUser, now: DateTime<Utc>) -> ServiceResult<User> {
        self.ensure_defined(&new.roles).await?;
        let user = User::new(UserId::new(), new.name, new.email, new.roles, now)?;
        self.directory.insert_user(&user).await?;
        info!(user_id = %user.id, roles = ?user.roles, "user created");
        Ok(user)
    }

    pub async fn get_user(&self, id: UserId) -> ServiceResult<User> {
        self.directory
            .get_user(id)
            .await?
            .ok_or_else(|| ServiceError::not_found(format!("user {id}")))
    }

    pub async fn list_users(&self) -> ServiceResult<Vec<User>> {
        Ok(self.directory.list_users().await?)
    }

    pub async fn set_roles(&self, id: UserId, roles: Vec<Role>) -> ServiceResult<User> {
        self.ensure_defined(&roles).await?;
        let mut user = self.get_user(id).await?;
        user.set_roles(roles)?;
        self.directory.update_user(&user).await?;
        info!(user_id = %id, roles = ?user.roles, "roles updated");
        Ok(user)
    }

    pub async fn suspend(&self, id: UserId) -> ServiceResult<User> {
        let mut user = self.get_user(id).await?;
        user.suspend()?;
        self.directory.update_user(&user).await?;
        Ok(user)
    }

    pub async fn activate(&self, id: UserId) -> ServiceResult<User> {
        let mut user = self.get_user(id).await?;
        user.activate()?;
        self.directory.update_user(&user).await?;
        Ok(user)
    }

    pub async fn create_role(&self, name: &str, description: &str) -> ServiceResult<RoleDefinition> {
        let role = RoleDefinition::new(name, description)?;
        self.directory.insert_role(&role).await?;
        Ok(role)
    }

    pub async fn list_roles(&self) -> ServiceResult<Vec<RoleDefinition>> {
        Ok(self.directory.list_roles().await?)
    }

    async fn ensure_defined(&self, roles: &[Role]) -> ServiceResult<()> {
        let defined = self.directory.list_roles().await?;
        match roles.iter().find(|r| !defined.iter().any(|d| &d.name == *r)) {
            Some(unknown) => Err(DomainError::validation(format!("unknown role '{unknown}'")).into()),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::InMemoryUserDirectory;

    async fn service() -> UserService {
        let s = UserService::new(Arc::new(InMemoryUserDirectory::new()));
        s.ensure_builtin_roles().await.unwrap();
        s
    }

    fn new_user(email: &str, roles: Vec<Role>) -> NewUser {
        NewUser {
            name: "Ana".into(),
            email: email.into(),
            roles,
        }
    }

    #[tokio::test]
    async fn builtin_roles_are_seeded_once() {
        let s = service().await;
        s.ensure_builtin_roles().await.unwrap();
        assert_eq!(s.list_roles().await.unwrap().len(), 3);
    }

    #[tokio::test]
    async fn unknown_roles_are_rejected() {
        let s = service().await;
        let err = s
            .create_user(new_user("ana@example.com", vec![Role::new("baker")]), Utc::now())
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::Domain(DomainError::Validation(_))));

        s.create_role("baker", "Runs the ovens").await.unwrap();
        let user = s
            .create_user(new_user("ana@example.com", vec![Role::new("baker")]), Utc::now())
            .await
            .unwrap();
        assert_eq!(user.roles, vec![Role::new("baker")]);
    }

    #[tokio::test]
    async fn duplicate_email_conflicts() {
        let s = service().await;
        s.create_user(new_user("ana@example.com", vec![]), Utc::now()).await.unwrap();
        let err = s
            .create_user(new_user("ANA@example.com", vec![]), Utc::now())
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::Repository(RepositoryError::Conflict(_))));
    }

    #[tokio::test]
    async fn set_roles_replaces_the_role_set() {
        let s = service().await;
        let user = s
            .create_user(new_user("ana@example.com", vec![Role::WAREHOUSE]), Utc::now())
            .await
            .unwrap();
        let updated = s
            .set_roles(user.id, vec![Role::SUPERVISOR, Role::ADMIN])
            .await
            .unwrap();
        assert_eq!(updated.roles, vec![Role::ADMIN, Role::SUPERVISOR]);
        assert_eq!(s.get_user(user.id).await.unwrap().roles, updated.roles);
    }

    #[tokio::test]
    async fn suspended_users_cannot_gain_roles() {
        let s = service().await;
        let user = s.create_user(new_user("ana@example.com", vec![]), Utc::now()).await.unwrap();
        s.suspend(user.id).await.unwrap();
        assert!(s.set_roles(user.id, vec![Role::ADMIN]).await.is_err());
        s.activate(user.id).await.unwrap();
        assert!(s.set_roles(user.id, vec![Role::ADMIN]).await.is_ok());
    }
}
