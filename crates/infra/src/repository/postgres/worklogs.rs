use std::sync::Arc;

use async_trait::async_trait;
use chrono::{NaiveDate, NaiveTime};
use sqlx::postgres::PgRow;
use sqlx::{FromRow, PgPool, Row};
use tracing::instrument;
use uuid::Uuid;

use stockline_core::{BatchId, UserId, WorkLogId};
use stockline_workforce::WorkLog;

use super::corrupt;
use crate::error::{RepositoryError, RepositoryResult, map_sqlx_error};
use crate::repository::WorkLogRepository;

#[derive(Debug, Clone)]
pub struct PostgresWorkLogRepository {
    pool: Arc<PgPool>,
}

impl PostgresWorkLogRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool: Arc::new(pool) }
    }
}

const COLUMNS: &str =
    "id, user_id, date, start_time, end_time, total_hours, overtime_hours, batch_id";

#[async_trait]
impl WorkLogRepository for PostgresWorkLogRepository {
    /// The partial unique index on open logs turns a second clock-in into a conflict.
    #[instrument(skip(self, log), fields(work_log_id = %log.id, user_id = %log.user_id), err)]
    async fn insert(&self, log: &WorkLog) -> RepositoryResult<()> {
        sqlx::query(
            r#"
            INSERT INTO work_logs (id, user_id, date, start_time, end_time, total_hours, overtime_hours, batch_id)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(log.id.as_uuid())
        .bind(log.user_id.as_uuid())
        .bind(log.date)
        .bind(log.start_time)
        .bind(log.end_time)
        .bind(log.total_hours)
        .bind(log.overtime_hours)
        .bind(log.batch_id.map(|b| *b.as_uuid()))
        .execute(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("insert_work_log", e))?;
        Ok(())
    }

    #[instrument(skip(self, log), fields(work_log_id = %log.id), err)]
    async fn update(&self, log: &WorkLog) -> RepositoryResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE work_logs
            SET end_time = $2, total_hours = $3, overtime_hours = $4, batch_id = $5
            WHERE id = $1
            "#,
        )
        .bind(log.id.as_uuid())
        .bind(log.end_time)
        .bind(log.total_hours)
        .bind(log.overtime_hours)
        .bind(log.batch_id.map(|b| *b.as_uuid()))
        .execute(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("update_work_log", e))?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::not_found(format!("work log {}", log.id)));
        }
        Ok(())
    }

    #[instrument(skip(self), fields(work_log_id = %id), err)]
    async fn get(&self, id: WorkLogId) -> RepositoryResult<Option<WorkLog>> {
        let row = sqlx::query(&format!("SELECT {COLUMNS} FROM work_logs WHERE id = $1"))
            .bind(id.as_uuid())
            .fetch_optional(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("get_work_log", e))?;

        row.as_ref().map(decode_work_log).transpose()
    }

    #[instrument(skip(self), err)]
    async fn find_open(&self, user_id: UserId) -> RepositoryResult<Option<WorkLog>> {
        let row = sqlx::query(&format!(
            "SELECT {COLUMNS} FROM work_logs WHERE user_id = $1 AND end_time IS NULL"
        ))
        .bind(user_id.as_uuid())
        .fetch_optional(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("find_open_work_log", e))?;

        row.as_ref().map(decode_work_log).transpose()
    }

    #[instrument(skip(self), err)]
    async fn list_between(
        &self,
        from: NaiveDate,
        to: NaiveDate,
        user_id: Option<UserId>,
    ) -> RepositoryResult<Vec<WorkLog>> {
        let rows = sqlx::query(&format!(
            r#"
            SELECT {COLUMNS}
            FROM work_logs
            WHERE date BETWEEN $1 AND $2
              AND ($3::uuid IS NULL OR user_id = $3)
            ORDER BY date ASC, start_time ASC, id ASC
            "#
        ))
        .bind(from)
        .bind(to)
        .bind(user_id.map(|u| *u.as_uuid()))
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("list_work_logs", e))?;

        rows.iter().map(decode_work_log).collect()
    }
}

struct WorkLogRow {
    id: Uuid,
    user_id: Uuid,
    date: NaiveDate,
    start_time: NaiveTime,
    end_time: Option<NaiveTime>,
    total_hours: Option<f64>,
    overtime_hours: Option<f64>,
    batch_id: Option<Uuid>,
}

impl<'r> FromRow<'r, PgRow> for WorkLogRow {
    fn from_row(row: &'r PgRow) -> Result<Self, sqlx::Error> {
        Ok(WorkLogRow {
            id: row.try_get("id")?,
            user_id: row.try_get("user_id")?,
            date: row.try_get("date")?,
            start_time: row.try_get("start_time")?,
            end_time: row.try_get("end_time")?,
            total_hours: row.try_get("total_hours")?,
            overtime_hours: row.try_get("overtime_hours")?,
            batch_id: row.try_get("batch_id")?,
        })
    }
}

impl From<WorkLogRow> for WorkLog {
    fn from(row: WorkLogRow) -> Self {
        WorkLog {
            id: WorkLogId::from_uuid(row.id),
            user_id: UserId::from_uuid(row.user_id),
            date: row.date,
            start_time: row.start_time,
            end_time: row.end_time,
            total_hours: row.total_hours,
            overtime_hours: row.overtime_hours,
            batch_id: row.batch_id.map(BatchId::from_uuid),
        }
    }
}

fn decode_work_log(row: &PgRow) -> RepositoryResult<WorkLog> {
    Ok(WorkLogRow::from_row(row).map_err(|e| corrupt("work log", e))?.into())
}
