use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::PgRow;
use sqlx::{FromRow, PgPool, Row};
use tracing::instrument;
use uuid::Uuid;

use stockline_auth::{Role, RoleDefinition, User, UserStatus};
use stockline_core::UserId;

use super::corrupt;
use crate::error::{RepositoryError, RepositoryResult, map_sqlx_error};
use crate::repository::UserDirectory;

/// Users (with their role set) and role definitions.
#[derive(Debug, Clone)]
pub struct PostgresUserDirectory {
    pool: Arc<PgPool>,
}

impl PostgresUserDirectory {
    pub fn new(pool: PgPool) -> Self {
        Self { pool: Arc::new(pool) }
    }
}

const SELECT_USERS: &str = r#"
    SELECT u.id, u.name, u.email, u.status, u.created_at,
           COALESCE(array_agg(ur.role ORDER BY ur.role) FILTER (WHERE ur.role IS NOT NULL), '{}') AS roles
    FROM users u
    LEFT JOIN user_roles ur ON ur.user_id = u.id
"#;

#[async_trait]
impl UserDirectory for PostgresUserDirectory {
    #[instrument(skip(self, user), fields(user_id = %user.id), err)]
    async fn insert_user(&self, user: &User) -> RepositoryResult<()> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| map_sqlx_error("begin_insert_user", e))?;

        sqlx::query(
            r#"
            INSERT INTO users (id, name, email, status, created_at)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(user.id.as_uuid())
        .bind(&user.name)
        .bind(&user.email)
        .bind(user.status.as_str())
        .bind(user.created_at)
        .execute(&mut *tx)
        .await
        .map_err(|e| map_sqlx_error("insert_user", e))?;

        for role in &user.roles {
            sqlx::query("INSERT INTO user_roles (user_id, role) VALUES ($1, $2)")
                .bind(user.id.as_uuid())
                .bind(role.as_str())
                .execute(&mut *tx)
                .await
                .map_err(|e| map_sqlx_error("insert_user_role", e))?;
        }

        tx.commit()
            .await
            .map_err(|e| map_sqlx_error("commit_insert_user", e))?;
        Ok(())
    }

    #[instrument(skip(self), err)]
    async fn get_user(&self, id: UserId) -> RepositoryResult<Option<User>> {
        let row = sqlx::query(&format!("{SELECT_USERS} WHERE u.id = $1 GROUP BY u.id"))
            .bind(id.as_uuid())
            .fetch_optional(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("get_user", e))?;

        row.as_ref().map(decode_user).transpose()
    }

    #[instrument(skip(self), err)]
    async fn list_users(&self) -> RepositoryResult<Vec<User>> {
        let rows = sqlx::query(&format!("{SELECT_USERS} GROUP BY u.id ORDER BY u.name ASC, u.id ASC"))
            .fetch_all(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("list_users", e))?;

        rows.iter().map(decode_user).collect()
    }

    #[instrument(skip(self, user), fields(user_id = %user.id), err)]
    async fn update_user(&self, user: &User) -> RepositoryResult<()> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| map_sqlx_error("begin_update_user", e))?;

        let result = sqlx::query("UPDATE users SET name = $2, status = $3 WHERE id = $1")
            .bind(user.id.as_uuid())
            .bind(&user.name)
            .bind(user.status.as_str())
            .execute(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error("update_user", e))?;
        if result.rows_affected() == 0 {
            return Err(RepositoryError::not_found(format!("user {}", user.id)));
        }

        sqlx::query("DELETE FROM user_roles WHERE user_id = $1")
            .bind(user.id.as_uuid())
            .execute(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error("clear_user_roles", e))?;
        for role in &user.roles {
            sqlx::query("INSERT INTO user_roles (user_id, role) VALUES ($1, $2)")
                .bind(user.id.as_uuid())
                .bind(role.as_str())
                .execute(&mut *tx)
                .await
                .map_err(|e| map_sqlx_error("insert_user_role", e))?;
        }

        tx.commit()
            .await
            .map_err(|e| map_sqlx_error("commit_update_user", e))?;
        Ok(())
    }

    #[instrument(skip(self), err)]
    async fn active_user_ids(&self) -> RepositoryResult<Vec<UserId>> {
        let ids: Vec<Uuid> = sqlx::query_scalar("SELECT id FROM users WHERE status = 'active' ORDER BY id")
            .fetch_all(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("active_user_ids", e))?;
        Ok(ids.into_iter().map(UserId::from_uuid).collect())
    }

    #[instrument(skip(self, roles), fields(role_count = roles.len()), err)]
    async fn active_users_with_roles(&self, roles: &[Role]) -> RepositoryResult<Vec<UserId>> {
        let names: Vec<String> = roles.iter().map(|r| r.as_str().to_string()).collect();
        let ids: Vec<Uuid> = sqlx::query_scalar(
            r#"
            SELECT DISTINCT u.id
            FROM users u
            JOIN user_roles ur ON ur.user_id = u.id
            WHERE u.status = 'active' AND ur.role = ANY($1)
            ORDER BY u.id
            "#,
        )
        .bind(names)
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("active_users_with_roles", e))?;
        Ok(ids.into_iter().map(UserId::from_uuid).collect())
    }

    #[instrument(skip(self, role), fields(role = %role.name), err)]
    async fn insert_role(&self, role: &RoleDefinition) -> RepositoryResult<()> {
        sqlx::query("INSERT INTO roles (name, description) VALUES ($1, $2)")
            .bind(role.name.as_str())
            .bind(&role.description)
            .execute(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("insert_role", e))?;
        Ok(())
    }

    #[instrument(skip(self), err)]
    async fn list_roles(&self) -> RepositoryResult<Vec<RoleDefinition>> {
        let rows = sqlx::query("SELECT name, description FROM roles ORDER BY name")
            .fetch_all(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("list_roles", e))?;

        rows.iter()
            .map(|row| -> RepositoryResult<RoleDefinition> {
                let name: String = row.try_get("name").map_err(|e| corrupt("role", e))?;
                let description: String = row.try_get("description").map_err(|e| corrupt("role", e))?;
                Ok(RoleDefinition {
                    name: Role::new(name),
                    description,
                })
            })
            .collect()
    }
}

struct UserRow {
    id: Uuid,
    name: String,
    email: String,
    status: String,
    roles: Vec<String>,
    created_at: DateTime<Utc>,
}

impl<'r> FromRow<'r, PgRow> for UserRow {
    fn from_row(row: &'r PgRow) -> Result<Self, sqlx::Error> {
        Ok(UserRow {
            id: row.try_get("id")?,
            name: row.try_get("name")?,
            email: row.try_get("email")?,
            status: row.try_get("status")?,
            roles: row.try_get("roles")?,
            created_at: row.try_get("created_at")?,
        })
    }
}

impl TryFrom<UserRow> for User {
    type Error = RepositoryError;

    fn try_from(row: UserRow) -> Result<Self, Self::Error> {
        Ok(User {
            id: UserId::from_uuid(row.id),
            name: row.name,
            email: row.email,
            status: UserStatus::parse(&row.status).map_err(|e| corrupt("user", e))?,
            roles: row.roles.into_iter().map(Role::new).collect(),
            created_at: row.created_at,
        })
    }
}

fn decode_user(row: &PgRow) -> RepositoryResult<User> {
    UserRow::from_row(row).map_err(|e| corrupt("user", e))?.try_into()
}
