//! Repository ports.
//!
//! Narrow async interfaces over persisted state. Each port has an in-memory
//! adapter (dev/tests) and a Postgres adapter. Multi-row writes that must be
//! atomic (posting movements, completing a batch) are single port calls so the
//! adapter owns the transaction.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};

use stockline_auth::{Role, RoleDefinition, User};
use stockline_core::{BatchId, ItemId, NotificationId, UserId, WorkLogId};
use stockline_inventory::{BatchStatus, InventoryItem, ProductionBatch, StockMovement};
use stockline_notifications::{Notification, NotificationType, RelatedEntity};
use stockline_workforce::WorkLog;

use crate::error::RepositoryResult;

pub mod in_memory;
pub mod postgres;

pub use in_memory::{
    InMemoryInventoryRepository, InMemoryNotificationRepository, InMemoryUserDirectory,
    InMemoryWorkLogRepository,
};
pub use postgres::{
    PostgresInventoryRepository, PostgresNotificationRepository, PostgresUserDirectory,
    PostgresWorkLogRepository,
};

/// Items, their movements and production batches.
#[async_trait]
pub trait InventoryRepository: Send + Sync {
    async fn insert_item(&self, item: &InventoryItem) -> RepositoryResult<()>;

    async fn get_item(&self, id: ItemId) -> RepositoryResult<Option<InventoryItem>>;

    async fn list_items(&self) -> RepositoryResult<Vec<InventoryItem>>;

    /// Persist descriptive fields (name, unit, threshold). Stock is untouched.
    ///
    /// Returns the stored row, including whatever stock it holds at commit.
    async fn update_item(&self, item: &InventoryItem) -> RepositoryResult<InventoryItem>;

    /// Insert `movements` and apply them to stock in one unit of work.
    ///
    /// Either every movement is applied or none is. Returns the committed state
    /// of each touched item, in order of first appearance.
    async fn apply_movements(&self, movements: &[StockMovement]) -> RepositoryResult<Vec<InventoryItem>>;

    /// Movements for one item, oldest first.
    async fn list_movements(&self, item_id: ItemId) -> RepositoryResult<Vec<StockMovement>>;

    async fn insert_batch(&self, batch: &ProductionBatch) -> RepositoryResult<()>;

    async fn get_batch(&self, id: BatchId) -> RepositoryResult<Option<ProductionBatch>>;

    async fn list_batches(&self) -> RepositoryResult<Vec<ProductionBatch>>;

    /// Persist a status change that posts no stock.
    ///
    /// Applied only if the stored status still equals `expected`; otherwise
    /// `Conflict`.
    async fn update_batch(&self, batch: &ProductionBatch, expected: BatchStatus) -> RepositoryResult<()>;

    /// Persist a completed batch together with its movements in one unit of work.
    ///
    /// The stored batch must still be `in_progress`, otherwise nothing is
    /// written and the call fails with `Conflict`.
    async fn complete_batch(
        &self,
        batch: &ProductionBatch,
        movements: &[StockMovement],
    ) -> RepositoryResult<Vec<InventoryItem>>;
}

/// Persisted notifications.
#[async_trait]
pub trait NotificationRepository: Send + Sync {
    async fn insert(&self, notification: &Notification) -> RepositoryResult<()>;

    async fn get(&self, id: NotificationId) -> RepositoryResult<Option<Notification>>;

    /// Rows visible to `user_id` (own + group), unexpired, newest first.
    async fn list_for_user(
        &self,
        user_id: UserId,
        unread_only: bool,
        now: DateTime<Utc>,
    ) -> RepositoryResult<Vec<Notification>>;

    async fn mark_read(&self, id: NotificationId) -> RepositoryResult<()>;

    /// Returns whether a row was deleted.
    async fn delete(&self, id: NotificationId) -> RepositoryResult<bool>;

    /// Creation time of the newest row with the same type and related entity.
    async fn latest_equivalent(
        &self,
        kind: NotificationType,
        related: &RelatedEntity,
    ) -> RepositoryResult<Option<DateTime<Utc>>>;

    /// Remove rows whose expiry has passed. Returns how many were removed.
    async fn delete_expired(&self, now: DateTime<Utc>) -> RepositoryResult<u64>;
}

/// Attendance records.
#[async_trait]
pub trait WorkLogRepository: Send + Sync {
    async fn insert(&self, log: &WorkLog) -> RepositoryResult<()>;

    async fn update(&self, log: &WorkLog) -> RepositoryResult<()>;

    async fn get(&self, id: WorkLogId) -> RepositoryResult<Option<WorkLog>>;

    /// The user's log that has no end time yet, if any.
    async fn find_open(&self, user_id: UserId) -> RepositoryResult<Option<WorkLog>>;

    /// Logs dated within `[from, to]`, optionally for one user, ordered by date then start.
    async fn list_between(
        &self,
        from: NaiveDate,
        to: NaiveDate,
        user_id: Option<UserId>,
    ) -> RepositoryResult<Vec<WorkLog>>;
}

/// Users and roles.
#[async_trait]
pub trait UserDirectory: Send + Sync {
    async fn insert_user(&self, user: &User) -> RepositoryResult<()>;

    async fn get_user(&self, id: UserId) -> RepositoryResult<Option<User>>;

    async fn list_users(&self) -> RepositoryResult<Vec<User>>;

    /// Persist status and role changes.
    async fn update_user(&self, user: &User) -> RepositoryResult<()>;

    async fn active_user_ids(&self) -> RepositoryResult<Vec<UserId>>;

    /// Active users holding at least one of `roles`.
    async fn active_users_with_roles(&self, roles: &[Role]) -> RepositoryResult<Vec<UserId>>;

    async fn insert_role(&self, role: &RoleDefinition) -> RepositoryResult<()>;

    async fn list_roles(&self) -> RepositoryResult<Vec<RoleDefinition>>;
}
