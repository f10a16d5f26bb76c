//! In-memory adapters for tests/dev.

use std::collections::{BTreeMap, HashMap};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};

use stockline_auth::{Role, RoleDefinition, User};
use stockline_core::{BatchId, Entity, ItemId, NotificationId, UserId, WorkLogId};
use stockline_inventory::{BatchStatus, InventoryItem, ProductionBatch, StockMovement};
use stockline_notifications::{Notification, NotificationType, RelatedEntity};
use stockline_workforce::WorkLog;

use super::{InventoryRepository, NotificationRepository, UserDirectory, WorkLogRepository};
use crate::error::{RepositoryError, RepositoryResult};

/// Entity-keyed map behind a lock.
#[derive(Debug)]
pub struct InMemoryStore<V: Entity> {
    inner: RwLock<HashMap<V::Id, V>>,
}

impl<V: Entity> Default for InMemoryStore<V> {
    fn default() -> Self {
        Self {
            inner: RwLock::new(HashMap::new()),
        }
    }
}

impl<V> InMemoryStore<V>
where
    V: Entity + Clone,
{
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> RepositoryResult<RwLockReadGuard<'_, HashMap<V::Id, V>>> {
        self.inner.read().map_err(|_| RepositoryError::storage("store lock poisoned"))
    }

    fn write(&self) -> RepositoryResult<RwLockWriteGuard<'_, HashMap<V::Id, V>>> {
        self.inner.write().map_err(|_| RepositoryError::storage("store lock poisoned"))
    }

    pub fn get(&self, id: V::Id) -> RepositoryResult<Option<V>> {
        Ok(self.read()?.get(&id).cloned())
    }

    pub fn insert(&self, value: V) -> RepositoryResult<()> {
        let mut map = self.write()?;
        let id = value.id();
        if map.contains_key(&id) {
            return Err(RepositoryError::Conflict(format!("{id:?} already exists")));
        }
        map.insert(id, value);
        Ok(())
    }

    pub fn replace(&self, value: V) -> RepositoryResult<()> {
        let mut map = self.write()?;
        let id = value.id();
        match map.get_mut(&id) {
            Some(slot) => {
                *slot = value;
                Ok(())
            }
            None => Err(RepositoryError::not_found(format!("{id:?}"))),
        }
    }

    pub fn remove(&self, id: V::Id) -> RepositoryResult<bool> {
        Ok(self.write()?.remove(&id).is_some())
    }

    pub fn list(&self) -> RepositoryResult<Vec<V>> {
        Ok(self.read()?.values().cloned().collect())
    }

    pub fn retain(&self, keep: impl Fn(&V) -> bool) -> RepositoryResult<u64> {
        let mut map = self.write()?;
        let before = map.len();
        map.retain(|_, v| keep(v));
        Ok((before - map.len()) as u64)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Inventory
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Default)]
pub struct InMemoryInventoryRepository {
    items: InMemoryStore<InventoryItem>,
    batches: InMemoryStore<ProductionBatch>,
    movements: RwLock<Vec<StockMovement>>,
}

impl InMemoryInventoryRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Validate and apply movements while holding the items lock, so the
    /// batch is all-or-nothing.
    fn apply_locked(&self, movements: &[StockMovement]) -> RepositoryResult<Vec<InventoryItem>> {
        let mut items = self.items.write()?;
        let mut log = self
            .movements
            .write()
            .map_err(|_| RepositoryError::storage("movement log lock poisoned"))?;

        let mut touched: Vec<ItemId> = Vec::new();
        let mut staged: HashMap<ItemId, InventoryItem> = HashMap::new();
        for movement in movements {
            let current = match staged.get(&movement.item_id) {
                Some(item) => item.clone(),
                None => items
                    .get(&movement.item_id)
                    .cloned()
                    .ok_or_else(|| RepositoryError::not_found(format!("item {}", movement.item_id)))?,
            };
            let next = current.with_movement(movement)?;
            if !touched.contains(&movement.item_id) {
                touched.push(movement.item_id);
            }
            staged.insert(movement.item_id, next);
        }

        for (id, item) in &staged {
            items.insert(*id, item.clone());
        }
        log.extend_from_slice(movements);

        Ok(touched.into_iter().filter_map(|id| staged.remove(&id)).collect())
    }
}

#[async_trait]
impl InventoryRepository for InMemoryInventoryRepository {
    async fn insert_item(&self, item: &InventoryItem) -> RepositoryResult<()> {
        let duplicate_name = self
            .items
            .read()?
            .values()
            .any(|i| i.name.eq_ignore_ascii_case(&item.name));
        if duplicate_name {
            return Err(RepositoryError::Conflict(format!("item '{}' already exists", item.name)));
        }
        self.items.insert(item.clone())
    }

    async fn get_item(&self, id: ItemId) -> RepositoryResult<Option<InventoryItem>> {
        self.items.get(id)
    }

    async fn list_items(&self) -> RepositoryResult<Vec<InventoryItem>> {
        let mut items = self.items.list()?;
        items.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(items)
    }

    async fn update_item(&self, item: &InventoryItem) -> RepositoryResult<InventoryItem> {
        let mut map = self.items.write()?;
        let slot = map
            .get_mut(&item.id)
            .ok_or_else(|| RepositoryError::not_found(format!("item {}", item.id)))?;
        slot.name = item.name.clone();
        slot.unit = item.unit.clone();
        slot.min_stock = item.min_stock;
        slot.updated_at = item.updated_at;
        Ok(slot.clone())
    }

    async fn apply_movements(&self, movements: &[StockMovement]) -> RepositoryResult<Vec<InventoryItem>> {
        self.apply_locked(movements)
    }

    async fn list_movements(&self, item_id: ItemId) -> RepositoryResult<Vec<StockMovement>> {
        let log = self
            .movements
            .read()
            .map_err(|_| RepositoryError::storage("movement log lock poisoned"))?;
        Ok(log.iter().filter(|m| m.item_id == item_id).cloned().collect())
    }

    async fn insert_batch(&self, batch: &ProductionBatch) -> RepositoryResult<()> {
        let duplicate_code = self.batches.read()?.values().any(|b| b.code == batch.code);
        if duplicate_code {
            return Err(RepositoryError::Conflict(format!("batch '{}' already exists", batch.code)));
        }
        self.batches.insert(batch.clone())
    }

    async fn get_batch(&self, id: BatchId) -> RepositoryResult<Option<ProductionBatch>> {
        self.batches.get(id)
    }

    async fn list_batches(&self) -> RepositoryResult<Vec<ProductionBatch>> {
        let mut batches = self.batches.list()?;
        batches.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(batches)
    }

    async fn update_batch(&self, batch: &ProductionBatch, expected: BatchStatus) -> RepositoryResult<()> {
        let mut batches = self.batches.write()?;
        expect_status(&batches, batch.id, expected)?;
        batches.insert(batch.id, batch.clone());
        Ok(())
    }

    async fn complete_batch(
        &self,
        batch: &ProductionBatch,
        movements: &[StockMovement],
    ) -> RepositoryResult<Vec<InventoryItem>> {
        // Held across the stock write so a second completion sees the new status.
        let mut batches = self.batches.write()?;
        expect_status(&batches, batch.id, BatchStatus::InProgress)?;
        let touched = self.apply_locked(movements)?;
        batches.insert(batch.id, batch.clone());
        Ok(touched)
    }
}

fn expect_status(
    batches: &HashMap<BatchId, ProductionBatch>,
    id: BatchId,
    expected: BatchStatus,
) -> RepositoryResult<()> {
    let stored = batches
        .get(&id)
        .ok_or_else(|| RepositoryError::not_found(format!("batch {id}")))?;
    if stored.status != expected {
        return Err(RepositoryError::Conflict(format!(
            "batch {id} is {}, expected {}",
            stored.status.as_str(),
            expected.as_str()
        )));
    }
    Ok(())
}

// ─────────────────────────────────────────────────────────────────────────────
// Notifications
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Default)]
pub struct InMemoryNotificationRepository {
    rows: InMemoryStore<Notification>,
}

impl InMemoryNotificationRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every stored row (tests/diagnostics).
    pub fn all(&self) -> RepositoryResult<Vec<Notification>> {
        let mut rows = self.rows.list()?;
        rows.sort_by_key(|n| (n.created_at, n.id));
        Ok(rows)
    }
}

#[async_trait]
impl NotificationRepository for InMemoryNotificationRepository {
    async fn insert(&self, notification: &Notification) -> RepositoryResult<()> {
        notification.check_invariant()?;
        self.rows.insert(notification.clone())
    }

    async fn get(&self, id: NotificationId) -> RepositoryResult<Option<Notification>> {
        self.rows.get(id)
    }

    async fn list_for_user(
        &self,
        user_id: UserId,
        unread_only: bool,
        now: DateTime<Utc>,
    ) -> RepositoryResult<Vec<Notification>> {
        let mut rows: Vec<Notification> = self
            .rows
            .list()?
            .into_iter()
            .filter(|n| n.is_visible_to(user_id) && !n.is_expired(now))
            .filter(|n| !unread_only || !n.read)
            .collect();
        rows.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        Ok(rows)
    }

    async fn mark_read(&self, id: NotificationId) -> RepositoryResult<()> {
        let mut map = self.rows.write()?;
        let row = map
            .get_mut(&id)
            .ok_or_else(|| RepositoryError::not_found(format!("notification {id}")))?;
        row.mark_read();
        Ok(())
    }

    async fn delete(&self, id: NotificationId) -> RepositoryResult<bool> {
        self.rows.remove(id)
    }

    async fn latest_equivalent(
        &self,
        kind: NotificationType,
        related: &RelatedEntity,
    ) -> RepositoryResult<Option<DateTime<Utc>>> {
        Ok(self
            .rows
            .read()?
            .values()
            .filter(|n| n.is_equivalent(kind, related))
            .map(|n| n.created_at)
            .max())
    }

    async fn delete_expired(&self, now: DateTime<Utc>) -> RepositoryResult<u64> {
        self.rows.retain(|n| !n.is_expired(now))
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Work logs
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Default)]
pub struct InMemoryWorkLogRepository {
    logs: InMemoryStore<WorkLog>,
}

impl InMemoryWorkLogRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl WorkLogRepository for InMemoryWorkLogRepository {
    async fn insert(&self, log: &WorkLog) -> RepositoryResult<()> {
        let mut map = self.logs.write()?;
        if map.values().any(|l| l.user_id == log.user_id && l.is_open()) {
            return Err(RepositoryError::Conflict(format!(
                "user {} already has an open work log",
                log.user_id
            )));
        }
        map.insert(log.id, log.clone());
        Ok(())
    }

    async fn update(&self, log: &WorkLog) -> RepositoryResult<()> {
        self.logs.replace(log.clone())
    }

    async fn get(&self, id: WorkLogId) -> RepositoryResult<Option<WorkLog>> {
        self.logs.get(id)
    }

    async fn find_open(&self, user_id: UserId) -> RepositoryResult<Option<WorkLog>> {
        Ok(self
            .logs
            .read()?
            .values()
            .find(|l| l.user_id == user_id && l.is_open())
            .cloned())
    }

    async fn list_between(
        &self,
        from: NaiveDate,
        to: NaiveDate,
        user_id: Option<UserId>,
    ) -> RepositoryResult<Vec<WorkLog>> {
        let mut logs: Vec<WorkLog> = self
            .logs
            .list()?
            .into_iter()
            .filter(|l| from <= l.date && l.date <= to)
            .filter(|l| user_id.is_none_or(|u| l.user_id == u))
            .collect();
        logs.sort_by_key(|l| (l.date, l.start_time, l.id));
        Ok(logs)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Users & roles
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Default)]
pub struct InMemoryUserDirectory {
    users: InMemoryStore<User>,
    roles: RwLock<BTreeMap<Role, RoleDefinition>>,
}

impl InMemoryUserDirectory {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl UserDirectory for InMemoryUserDirectory {
    async fn insert_user(&self, user: &User) -> RepositoryResult<()> {
        let mut map = self.users.write()?;
        if map.values().any(|u| u.email == user.email) {
            return Err(RepositoryError::Conflict(format!("email '{}' already registered", user.email)));
        }
        if map.contains_key(&user.id) {
            return Err(RepositoryError::Conflict(format!("user {} already exists", user.id)));
        }
        map.insert(user.id, user.clone());
        Ok(())
    }

    async fn get_user(&self, id: UserId) -> RepositoryResult<Option<User>> {
        self.users.get(id)
    }

    async fn list_users(&self) -> RepositoryResult<Vec<User>> {
        let mut users = self.users.list()?;
        users.sort_by(|a, b| a.name.cmp(&b.name).then(a.id.cmp(&b.id)));
        Ok(users)
    }

    async fn update_user(&self, user: &User) -> RepositoryResult<()> {
        self.users.replace(user.clone())
    }

    async fn active_user_ids(&self) -> RepositoryResult<Vec<UserId>> {
        let mut ids: Vec<UserId> = self
            .users
            .read()?
            .values()
            .filter(|u| u.is_active())
            .map(|u| u.id)
            .collect();
        ids.sort();
        Ok(ids)
    }

    async fn active_users_with_roles(&self, roles: &[Role]) -> RepositoryResult<Vec<UserId>> {
        let mut ids: Vec<UserId> = self
            .users
            .read()?
            .values()
            .filter(|u| u.is_active() && u.has_any_role(roles))
            .map(|u| u.id)
            .collect();
        ids.sort();
        Ok(ids)
    }

    async fn insert_role(&self, role: &RoleDefinition) -> RepositoryResult<()> {
        let mut map = self
            .roles
            .write()
            .map_err(|_| RepositoryError::storage("roles lock poisoned"))?;
        if map.contains_key(&role.name) {
            return Err(RepositoryError::Conflict(format!("role '{}' already exists", role.name)));
        }
        map.insert(role.name.clone(), role.clone());
        Ok(())
    }

    async fn list_roles(&self) -> RepositoryResult<Vec<RoleDefinition>> {
        let map = self
            .roles
            .read()
            .map_err(|_| RepositoryError::storage("roles lock poisoned"))?;
        Ok(map.values().cloned().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use stockline_inventory::ItemKind;
    use stockline_notifications::NotificationPayload;

    fn item(name: &str) -> InventoryItem {
        InventoryItem::new(ItemId::new(), ItemKind::RawMaterial, name, "kg", Some(10), Utc::now()).unwrap()
    }

    #[tokio::test]
    async fn apply_movements_is_all_or_nothing() {
        let repo = InMemoryInventoryRepository::new();
        let flour = item("Flour");
        let sugar = item("Sugar");
        repo.insert_item(&flour).await.unwrap();
        repo.insert_item(&sugar).await.unwrap();

        let now = Utc::now();
        let ok = vec![StockMovement::receive(flour.id, 20, now).unwrap()];
        repo.apply_movements(&ok).await.unwrap();

        // Second line would drive sugar negative: nothing must be applied.
        let bad = vec![
            StockMovement::issue(flour.id, 5, now).unwrap(),
            StockMovement::issue(sugar.id, 1, now).unwrap(),
        ];
        assert!(matches!(
            repo.apply_movements(&bad).await,
            Err(RepositoryError::Domain(_))
        ));

        assert_eq!(repo.get_item(flour.id).await.unwrap().unwrap().stock, 20);
        assert_eq!(repo.list_movements(flour.id).await.unwrap().len(), 1);
        assert!(repo.list_movements(sugar.id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn apply_movements_returns_touched_items_once() {
        let repo = InMemoryInventoryRepository::new();
        let flour = item("Flour");
        repo.insert_item(&flour).await.unwrap();
        let now = Utc::now();

        let touched = repo
            .apply_movements(&[
                StockMovement::receive(flour.id, 20, now).unwrap(),
                StockMovement::issue(flour.id, 15, now).unwrap(),
            ])
            .await
            .unwrap();

        assert_eq!(touched.len(), 1);
        assert_eq!(touched[0].stock, 5);
    }

    #[tokio::test]
    async fn batch_writes_conflict_on_stale_status() {
        let repo = InMemoryInventoryRepository::new();
        let flour = item("Flour");
        let bread = InventoryItem::new(ItemId::new(), ItemKind::Product, "Bread", "loaf", None, Utc::now()).unwrap();
        repo.insert_item(&flour).await.unwrap();
        repo.insert_item(&bread).await.unwrap();
        let now = Utc::now();
        repo.apply_movements(&[StockMovement::receive(flour.id, 100, now).unwrap()])
            .await
            .unwrap();

        let consumption = vec![stockline_inventory::ConsumptionLine {
            item_id: flour.id,
            quantity: 10,
        }];
        let mut batch = ProductionBatch::plan(BatchId::new(), "B-1", bread.id, 10, consumption, now).unwrap();
        repo.insert_batch(&batch).await.unwrap();
        batch.start(now).unwrap();
        repo.update_batch(&batch, BatchStatus::Planned).await.unwrap();

        // Two callers both loaded the in-progress batch.
        let mut first = batch.clone();
        let mut second = batch.clone();
        let first_moves = first.complete(10, now).unwrap();
        let second_moves = second.complete(10, now).unwrap();

        repo.complete_batch(&first, &first_moves).await.unwrap();
        assert!(matches!(
            repo.complete_batch(&second, &second_moves).await,
            Err(RepositoryError::Conflict(_))
        ));
        assert_eq!(repo.get_item(flour.id).await.unwrap().unwrap().stock, 90);
        assert_eq!(repo.get_item(bread.id).await.unwrap().unwrap().stock, 10);

        let mut late_cancel = batch.clone();
        late_cancel.cancel(now).unwrap();
        assert!(matches!(
            repo.update_batch(&late_cancel, BatchStatus::InProgress).await,
            Err(RepositoryError::Conflict(_))
        ));
        assert_eq!(
            repo.get_batch(batch.id).await.unwrap().unwrap().status,
            BatchStatus::Completed
        );
    }

    #[tokio::test]
    async fn duplicate_item_names_conflict() {
        let repo = InMemoryInventoryRepository::new();
        repo.insert_item(&item("Flour")).await.unwrap();
        assert!(matches!(
            repo.insert_item(&item("flour")).await,
            Err(RepositoryError::Conflict(_))
        ));
    }

    #[tokio::test]
    async fn notifications_are_listed_per_user_newest_first() {
        let repo = InMemoryNotificationRepository::new();
        let me = UserId::new();
        let other = UserId::new();
        let now = Utc::now();
        let payload = NotificationPayload::new("t", "m", NotificationType::Info);

        let older = Notification::broadcast(&payload, now - chrono::Duration::minutes(5));
        let mine = Notification::individual(&payload, me, now);
        let theirs = Notification::individual(&payload, other, now);
        let expired = Notification {
            expires_at: Some(now - chrono::Duration::seconds(1)),
            ..Notification::broadcast(&payload, now)
        };
        for n in [&older, &mine, &theirs, &expired] {
            repo.insert(n).await.unwrap();
        }

        let listed = repo.list_for_user(me, false, now).await.unwrap();
        assert_eq!(listed.iter().map(|n| n.id).collect::<Vec<_>>(), vec![mine.id, older.id]);

        repo.mark_read(mine.id).await.unwrap();
        let unread = repo.list_for_user(me, true, now).await.unwrap();
        assert_eq!(unread.len(), 1);

        assert_eq!(repo.delete_expired(now).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn one_open_log_per_user() {
        let repo = InMemoryWorkLogRepository::new();
        let user = UserId::new();
        let at = NaiveDate::from_ymd_opt(2024, 1, 10).unwrap().and_hms_opt(8, 0, 0).unwrap();

        repo.insert(&WorkLog::clock_in(user, at, None)).await.unwrap();
        assert!(matches!(
            repo.insert(&WorkLog::clock_in(user, at, None)).await,
            Err(RepositoryError::Conflict(_))
        ));
        assert!(repo.find_open(user).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn role_resolution_skips_suspended_users() {
        let dir = InMemoryUserDirectory::new();
        let now = Utc::now();
        let active = User::new(UserId::new(), "Ana", "ana@example.com", vec![Role::WAREHOUSE], now).unwrap();
        let mut suspended =
            User::new(UserId::new(), "Bo", "bo@example.com", vec![Role::WAREHOUSE], now).unwrap();
        suspended.suspend().unwrap();
        dir.insert_user(&active).await.unwrap();
        dir.insert_user(&suspended).await.unwrap();

        let ids = dir.active_users_with_roles(&[Role::WAREHOUSE]).await.unwrap();
        assert_eq!(ids, vec![active.id]);
    }
}
