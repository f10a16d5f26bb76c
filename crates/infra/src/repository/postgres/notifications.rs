use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::PgRow;
use sqlx::{FromRow, PgPool, Row};
use tracing::instrument;
use uuid::Uuid;

use stockline_core::{NotificationId, UserId};
use stockline_notifications::{Notification, NotificationScope, NotificationType, RelatedEntity};

use super::corrupt;
use crate::error::{RepositoryError, RepositoryResult, map_sqlx_error};
use crate::repository::NotificationRepository;

#[derive(Debug, Clone)]
pub struct PostgresNotificationRepository {
    pool: Arc<PgPool>,
}

impl PostgresNotificationRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool: Arc::new(pool) }
    }
}

#[async_trait]
impl NotificationRepository for PostgresNotificationRepository {
    #[instrument(
        skip(self, notification),
        fields(notification_id = %notification.id, scope = notification.scope.as_str()),
        err
    )]
    async fn insert(&self, notification: &Notification) -> RepositoryResult<()> {
        notification.check_invariant()?;
        let (related_table, related_id) = match &notification.related {
            Some(r) => (Some(r.table.as_str()), Some(r.id.as_str())),
            None => (None, None),
        };

        sqlx::query(
            r#"
            INSERT INTO notifications (
                id, user_id, title, message, type, scope, read,
                related_table, related_id, expires_at, created_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            "#,
        )
        .bind(notification.id.as_uuid())
        .bind(notification.user_id.map(|u| *u.as_uuid()))
        .bind(&notification.title)
        .bind(&notification.message)
        .bind(notification.kind.as_str())
        .bind(notification.scope.as_str())
        .bind(notification.read)
        .bind(related_table)
        .bind(related_id)
        .bind(notification.expires_at)
        .bind(notification.created_at)
        .execute(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("insert_notification", e))?;
        Ok(())
    }

    #[instrument(skip(self), fields(notification_id = %id), err)]
    async fn get(&self, id: NotificationId) -> RepositoryResult<Option<Notification>> {
        let row = sqlx::query(
            r#"
            SELECT id, user_id, title, message, type, scope, read,
                   related_table, related_id, expires_at, created_at
            FROM notifications
            WHERE id = $1
            "#,
        )
        .bind(id.as_uuid())
        .fetch_optional(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("get_notification", e))?;

        row.as_ref().map(decode_notification).transpose()
    }

    #[instrument(skip(self), err)]
    async fn list_for_user(
        &self,
        user_id: UserId,
        unread_only: bool,
        now: DateTime<Utc>,
    ) -> RepositoryResult<Vec<Notification>> {
        let rows = sqlx::query(
            r#"
            SELECT id, user_id, title, message, type, scope, read,
                   related_table, related_id, expires_at, created_at
            FROM notifications
            WHERE (user_id = $1 OR user_id IS NULL)
              AND (expires_at IS NULL OR expires_at > $2)
              AND (NOT $3 OR read = FALSE)
            ORDER BY created_at DESC, id DESC
            "#,
        )
        .bind(user_id.as_uuid())
        .bind(now)
        .bind(unread_only)
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("list_notifications", e))?;

        rows.iter().map(decode_notification).collect()
    }

    #[instrument(skip(self), fields(notification_id = %id), err)]
    async fn mark_read(&self, id: NotificationId) -> RepositoryResult<()> {
        let result = sqlx::query("UPDATE notifications SET read = TRUE WHERE id = $1")
            .bind(id.as_uuid())
            .execute(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("mark_read", e))?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::not_found(format!("notification {id}")));
        }
        Ok(())
    }

    #[instrument(skip(self), fields(notification_id = %id), err)]
    async fn delete(&self, id: NotificationId) -> RepositoryResult<bool> {
        let result = sqlx::query("DELETE FROM notifications WHERE id = $1")
            .bind(id.as_uuid())
            .execute(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("delete_notification", e))?;
        Ok(result.rows_affected() > 0)
    }

    #[instrument(skip(self, related), fields(table = %related.table, related_id = %related.id), err)]
    async fn latest_equivalent(
        &self,
        kind: NotificationType,
        related: &RelatedEntity,
    ) -> RepositoryResult<Option<DateTime<Utc>>> {
        let latest: Option<DateTime<Utc>> = sqlx::query_scalar(
            r#"
            SELECT MAX(created_at)
            FROM notifications
            WHERE type = $1 AND related_table = $2 AND related_id = $3
            "#,
        )
        .bind(kind.as_str())
        .bind(&related.table)
        .bind(&related.id)
        .fetch_one(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("latest_equivalent", e))?;
        Ok(latest)
    }

    #[instrument(skip(self), err)]
    async fn delete_expired(&self, now: DateTime<Utc>) -> RepositoryResult<u64> {
        let result = sqlx::query("DELETE FROM notifications WHERE expires_at IS NOT NULL AND expires_at <= $1")
            .bind(now)
            .execute(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("delete_expired", e))?;
        Ok(result.rows_affected())
    }
}

struct NotificationRow {
    id: Uuid,
    user_id: Option<Uuid>,
    title: String,
    message: String,
    kind: String,
    scope: String,
    read: bool,
    related_table: Option<String>,
    related_id: Option<String>,
    expires_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
}

impl<'r> FromRow<'r, PgRow> for NotificationRow {
    fn from_row(row: &'r PgRow) -> Result<Self, sqlx::Error> {
        Ok(NotificationRow {
            id: row.try_get("id")?,
            user_id: row.try_get("user_id")?,
            title: row.try_get("title")?,
            message: row.try_get("message")?,
            kind: row.try_get("type")?,
            scope: row.try_get("scope")?,
            read: row.try_get("read")?,
            related_table: row.try_get("related_table")?,
            related_id: row.try_get("related_id")?,
            expires_at: row.try_get("expires_at")?,
            created_at: row.try_get("created_at")?,
        })
    }
}

impl TryFrom<NotificationRow> for Notification {
    type Error = RepositoryError;

    fn try_from(row: NotificationRow) -> Result<Self, Self::Error> {
        let related = match (row.related_table, row.related_id) {
            (Some(table), Some(id)) => Some(RelatedEntity { table, id }),
            _ => None,
        };
        let notification = Notification {
            id: NotificationId::from_uuid(row.id),
            user_id: row.user_id.map(UserId::from_uuid),
            title: row.title,
            message: row.message,
            kind: NotificationType::parse(&row.kind).map_err(|e| corrupt("notification", e))?,
            scope: NotificationScope::parse(&row.scope).map_err(|e| corrupt("notification", e))?,
            read: row.read,
            related,
            expires_at: row.expires_at,
            created_at: row.created_at,
        };
        notification.check_invariant().map_err(|e| corrupt("notification", e))?;
        Ok(notification)
    }
}

fn decode_notification(row: &PgRow) -> RepositoryResult<Notification> {
    NotificationRow::from_row(row)
        .map_err(|e| corrupt("notification", e))?
        .try_into()
}
