//! Inventory service: item/batch commands plus low-stock detection.
//!
//! Every stock-changing command follows the same unit-of-work shape:
//!
//! 1. load current state and validate the change in memory
//! 2. perform the write through the repository (one transaction)
//! 3. run the [`StockWatcher`] on the rows the repository committed, staging
//!    any signal in an [`AfterCommit`] buffer, then publish it
//!
//! A failed write never produces a low-stock signal, and the watcher never
//! sees a stock level that was not stored.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Deserialize;
use tracing::{debug, info, warn};

use stockline_core::{BatchId, DomainError, ItemId};
use stockline_events::AfterCommit;
use stockline_inventory::{
    ConsumptionLine, InventoryItem, ItemKind, ItemUpdate, ProductionBatch, StockMovement, StockWatcher,
};
use stockline_notifications::{NotificationType, RelatedEntity};

use super::error::{ServiceError, ServiceResult};
use crate::repository::{InventoryRepository, NotificationRepository};
use crate::signals::{Signal, SignalBus};

/// Input for creating an item.
#[derive(Debug, Clone, Deserialize)]
pub struct NewItem {
    pub kind: ItemKind,
    pub name: String,
    pub unit: String,
    #[serde(default)]
    pub min_stock: Option<i64>,
    /// Posted as an `in` movement right after creation.
    #[serde(default)]
    pub opening_stock: i64,
}

/// Input for planning a batch.
#[derive(Debug, Clone, Deserialize)]
pub struct NewBatch {
    pub code: String,
    pub product_id: ItemId,
    pub planned_quantity: i64,
    #[serde(default)]
    pub consumption: Vec<ConsumptionLine>,
}

pub struct InventoryService {
    repo: Arc<dyn InventoryRepository>,
    notifications: Arc<dyn NotificationRepository>,
    watcher: StockWatcher,
    bus: SignalBus,
}

impl InventoryService {
    pub fn new(
        repo: Arc<dyn InventoryRepository>,
        notifications: Arc<dyn NotificationRepository>,
        watcher: StockWatcher,
        bus: SignalBus,
    ) -> Self {
        Self {
            repo,
            notifications,
            watcher,
            bus,
        }
    }

    pub fn watcher(&self) -> &StockWatcher {
        &self.watcher
    }

    // ─────────────────────────────────────────────────────────────────────
    // Items
    // ─────────────────────────────────────────────────────────────────────

    pub async fn create_item(&self, new: NewItem, now: DateTime<Utc>) -> ServiceResult<InventoryItem> {
        let item = InventoryItem::new(ItemId::new(), new.kind, new.name, new.unit, new.min_stock, now)?;
        if new.opening_stock < 0 {
            return Err(DomainError::validation("opening stock cannot be negative").into());
        }
        self.repo.insert_item(&item).await?;
        info!(item_id = %item.id, kind = item.kind.as_str(), "inventory item created");

        if new.opening_stock == 0 {
            // Zero stock with a threshold is already low.
            self.scan_items(std::slice::from_ref(&item), now).await;
            return Ok(item);
        }

        let opening = StockMovement::receive(item.id, new.opening_stock, now)?.with_reason("opening stock");
        self.post_movement(opening).await
    }

    pub async fn get_item(&self, id: ItemId) -> ServiceResult<InventoryItem> {
        self.repo
            .get_item(id)
            .await?
            .ok_or_else(|| ServiceError::not_found(format!("item {id}")))
    }

    pub async fn list_items(&self) -> ServiceResult<Vec<InventoryItem>> {
        Ok(self.repo.list_items().await?)
    }

    /// Items currently at or below their threshold.
    pub async fn low_stock_items(&self) -> ServiceResult<Vec<InventoryItem>> {
        let items = self.repo.list_items().await?;
        Ok(items.into_iter().filter(StockWatcher::is_low).collect())
    }

    /// Update descriptive fields. A threshold change is stock-relevant, so the
    /// watcher runs on the stored row.
    pub async fn update_item(
        &self,
        id: ItemId,
        update: &ItemUpdate,
        now: DateTime<Utc>,
    ) -> ServiceResult<InventoryItem> {
        let current = self.get_item(id).await?;
        let next = current.with_update(update, now)?;

        let stored = self.repo.update_item(&next).await?;
        self.scan_items(std::slice::from_ref(&stored), now).await;
        Ok(stored)
    }

    pub async fn movements(&self, id: ItemId) -> ServiceResult<Vec<StockMovement>> {
        self.get_item(id).await?;
        Ok(self.repo.list_movements(id).await?)
    }

    /// Post one movement and run the watcher on the committed item.
    pub async fn post_movement(&self, movement: StockMovement) -> ServiceResult<InventoryItem> {
        let now = movement.occurred_at;
        // Early rejection with a domain error; the repository re-validates under lock.
        self.get_item(movement.item_id).await?.with_movement(&movement)?;

        match self.repo.apply_movements(std::slice::from_ref(&movement)).await {
            Ok(mut committed) => {
                let published = self.scan_items(&committed, now).await;
                debug!(item_id = %movement.item_id, kind = movement.kind.as_str(), published, "movement posted");
                committed
                    .pop()
                    .ok_or_else(|| ServiceError::not_found(format!("item {}", movement.item_id)))
            }
            Err(e) => {
                warn!(item_id = %movement.item_id, error = %e, "movement rejected");
                Err(e.into())
            }
        }
    }

    // ─────────────────────────────────────────────────────────────────────
    // Batches
    // ─────────────────────────────────────────────────────────────────────

    pub async fn plan_batch(&self, new: NewBatch, now: DateTime<Utc>) -> ServiceResult<ProductionBatch> {
        let product = self.get_item(new.product_id).await?;
        if product.kind != ItemKind::Product {
            return Err(DomainError::validation("batch output must be a product").into());
        }
        for line in &new.consumption {
            let material = self.get_item(line.item_id).await?;
            if material.kind != ItemKind::RawMaterial {
                return Err(DomainError::validation(format!(
                    "'{}' is not a raw material",
                    material.name
                ))
                .into());
            }
        }

        let batch = ProductionBatch::plan(
            BatchId::new(),
            new.code,
            new.product_id,
            new.planned_quantity,
            new.consumption,
            now,
        )?;
        self.repo.insert_batch(&batch).await?;
        info!(batch_id = %batch.id, code = %batch.code, "batch planned");
        Ok(batch)
    }

    pub async fn get_batch(&self, id: BatchId) -> ServiceResult<ProductionBatch> {
        self.repo
            .get_batch(id)
            .await?
            .ok_or_else(|| ServiceError::not_found(format!("batch {id}")))
    }

    pub async fn list_batches(&self) -> ServiceResult<Vec<ProductionBatch>> {
        Ok(self.repo.list_batches().await?)
    }

    pub async fn start_batch(&self, id: BatchId, now: DateTime<Utc>) -> ServiceResult<ProductionBatch> {
        let mut batch = self.get_batch(id).await?;
        let loaded = batch.status;
        batch.start(now)?;
        self.repo.update_batch(&batch, loaded).await?;
        Ok(batch)
    }

    pub async fn cancel_batch(&self, id: BatchId, now: DateTime<Utc>) -> ServiceResult<ProductionBatch> {
        let mut batch = self.get_batch(id).await?;
        let loaded = batch.status;
        batch.cancel(now)?;
        self.repo.update_batch(&batch, loaded).await?;
        Ok(batch)
    }

    /// Complete a batch: all consumption and the product receipt commit together,
    /// then the watcher runs once per touched item.
    pub async fn complete_batch(
        &self,
        id: BatchId,
        produced: i64,
        now: DateTime<Utc>,
    ) -> ServiceResult<(ProductionBatch, Vec<InventoryItem>)> {
        let mut batch = self.get_batch(id).await?;
        let movements = batch.complete(produced, now)?;
        self.project(&movements).await?;

        match self.repo.complete_batch(&batch, &movements).await {
            Ok(committed) => {
                let published = self.scan_items(&committed, now).await;
                info!(batch_id = %batch.id, produced, items = committed.len(), published, "batch completed");
                Ok((batch, committed))
            }
            Err(e) => {
                warn!(batch_id = %batch.id, error = %e, "batch completion rejected");
                Err(e.into())
            }
        }
    }

    // ─────────────────────────────────────────────────────────────────────
    // Watcher plumbing
    // ─────────────────────────────────────────────────────────────────────

    /// Post-write state of every touched item, in order of first appearance.
    /// Used to reject invalid batches before opening a transaction.
    async fn project(&self, movements: &[StockMovement]) -> ServiceResult<Vec<InventoryItem>> {
        let mut order = Vec::new();
        let mut state: HashMap<ItemId, InventoryItem> = HashMap::new();
        for movement in movements {
            let current = match state.remove(&movement.item_id) {
                Some(item) => item,
                None => {
                    order.push(movement.item_id);
                    self.get_item(movement.item_id).await?
                }
            };
            state.insert(movement.item_id, current.with_movement(movement)?);
        }
        Ok(order.into_iter().filter_map(|id| state.remove(&id)).collect())
    }

    /// Run the watcher on `item` and stage a signal if it fires.
    async fn stage_low_stock(&self, staged: &mut AfterCommit<Signal>, item: &InventoryItem, now: DateTime<Utc>) {
        if !StockWatcher::is_low(item) {
            return;
        }

        let related = RelatedEntity::new(InventoryItem::TABLE, item.id);
        let last = match self
            .notifications
            .latest_equivalent(NotificationType::Warning, &related)
            .await
        {
            Ok(last) => last,
            Err(e) => {
                warn!(item_id = %item.id, error = %e, "duplicate lookup failed; evaluating without it");
                None
            }
        };

        match self.watcher.evaluate(item, last, now) {
            Some(signal) => staged.defer(signal.into()),
            None => debug!(item_id = %item.id, "low stock already notified within window"),
        }
    }

    /// Evaluate committed items and publish whatever fires.
    async fn scan_items(&self, items: &[InventoryItem], now: DateTime<Utc>) -> usize {
        let mut staged = AfterCommit::new();
        for item in items {
            self.stage_low_stock(&mut staged, item, now).await;
        }
        staged.commit(&*self.bus)
    }
}

/// Periodic pass over every item with the same watcher and dedup rule.
///
/// Catches items whose threshold was crossed while no notification could be
/// created (e.g. nobody held a low-stock role at the time).
pub struct LowStockScan {
    inventory: Arc<InventoryService>,
}

impl LowStockScan {
    pub fn new(inventory: Arc<InventoryService>) -> Self {
        Self { inventory }
    }

    /// Returns how many low-stock signals were published.
    pub async fn run(&self, now: DateTime<Utc>) -> ServiceResult<usize> {
        let items = self.inventory.repo.list_items().await?;
        let published = self.inventory.scan_items(&items, now).await;
        info!(scanned = items.len(), published, "low-stock scan finished");
        Ok(published)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use async_trait::async_trait;
    use chrono::Duration;

    use stockline_events::{EventBus, InMemoryEventBus, Subscription};
    use stockline_inventory::BatchStatus;
    use stockline_notifications::{Notification, NotificationPayload};

    use crate::error::{RepositoryError, RepositoryResult};
    use crate::repository::{InMemoryInventoryRepository, InMemoryNotificationRepository};

    struct Fixture {
        inventory: Arc<InventoryService>,
        notifications: Arc<InMemoryNotificationRepository>,
        signals: Subscription<Signal>,
    }

    fn fixture_with(repo: Arc<dyn InventoryRepository>) -> Fixture {
        let bus: SignalBus = Arc::new(InMemoryEventBus::new());
        let signals = bus.subscribe();
        let notifications = Arc::new(InMemoryNotificationRepository::new());
        let inventory = Arc::new(InventoryService::new(
            repo,
            notifications.clone(),
            StockWatcher::default(),
            bus,
        ));
        Fixture {
            inventory,
            notifications,
            signals,
        }
    }

    fn fixture() -> Fixture {
        fixture_with(Arc::new(InMemoryInventoryRepository::new()))
    }

    fn sugar(min_stock: Option<i64>, opening_stock: i64) -> NewItem {
        NewItem {
            kind: ItemKind::RawMaterial,
            name: "Sugar".into(),
            unit: "kg".into(),
            min_stock,
            opening_stock,
        }
    }

    fn low_stock_signals(sub: &Subscription<Signal>) -> Vec<stockline_inventory::LowStockDetected> {
        sub.drain()
            .into_iter()
            .filter_map(|s| match s {
                Signal::LowStock(e) => Some(e),
                _ => None,
            })
            .collect()
    }

    #[tokio::test]
    async fn issue_below_threshold_raises_one_signal() {
        let f = fixture();
        let now = Utc::now();
        let item = f.inventory.create_item(sugar(Some(10), 12), now).await.unwrap();
        assert_eq!(item.stock, 12);
        assert!(low_stock_signals(&f.signals).is_empty());

        let issue = StockMovement::issue(item.id, 5, now).unwrap();
        let after = f.inventory.post_movement(issue).await.unwrap();
        assert_eq!(after.stock, 7);

        let signals = low_stock_signals(&f.signals);
        assert_eq!(signals.len(), 1);
        assert_eq!(signals[0].item_id, item.id);
        assert_eq!(signals[0].stock, 7);
        assert_eq!(signals[0].min_stock, 10);
    }

    #[tokio::test]
    async fn stock_equal_to_threshold_is_low() {
        let f = fixture();
        let now = Utc::now();
        let item = f.inventory.create_item(sugar(Some(5), 8), now).await.unwrap();
        f.inventory
            .post_movement(StockMovement::issue(item.id, 3, now).unwrap())
            .await
            .unwrap();
        assert_eq!(low_stock_signals(&f.signals).len(), 1);
    }

    #[tokio::test]
    async fn item_without_threshold_never_signals() {
        let f = fixture();
        let now = Utc::now();
        let item = f.inventory.create_item(sugar(None, 0), now).await.unwrap();
        f.inventory
            .post_movement(StockMovement::receive(item.id, 1, now).unwrap())
            .await
            .unwrap();
        assert!(low_stock_signals(&f.signals).is_empty());
    }

    #[tokio::test]
    async fn recent_equivalent_notification_suppresses_signal() {
        let f = fixture();
        let now = Utc::now();
        let item = f.inventory.create_item(sugar(Some(10), 20), now).await.unwrap();

        let payload = NotificationPayload::new("Low stock", "Sugar is low", NotificationType::Warning)
            .related_to(RelatedEntity::new(InventoryItem::TABLE, item.id));
        let earlier = Notification::individual(&payload, stockline_core::UserId::new(), now - Duration::minutes(30));
        f.notifications.insert(&earlier).await.unwrap();

        f.inventory
            .post_movement(StockMovement::issue(item.id, 15, now).unwrap())
            .await
            .unwrap();
        assert!(low_stock_signals(&f.signals).is_empty());

        // Outside the window the watcher fires again.
        let later = now + Duration::minutes(45);
        f.inventory
            .post_movement(StockMovement::issue(item.id, 1, later).unwrap())
            .await
            .unwrap();
        assert_eq!(low_stock_signals(&f.signals).len(), 1);
    }

    #[tokio::test]
    async fn rejected_movement_leaves_stock_and_raises_nothing() {
        let f = fixture();
        let now = Utc::now();
        let item = f.inventory.create_item(sugar(Some(10), 3), now).await.unwrap();
        low_stock_signals(&f.signals);

        let err = f
            .inventory
            .post_movement(StockMovement::issue(item.id, 4, now).unwrap())
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::Domain(_)));
        assert_eq!(f.inventory.get_item(item.id).await.unwrap().stock, 3);
        assert!(low_stock_signals(&f.signals).is_empty());
    }

    /// Accepts reads, fails every stock write.
    struct FailingWrites {
        inner: InMemoryInventoryRepository,
    }

    #[async_trait]
    impl InventoryRepository for FailingWrites {
        async fn insert_item(&self, item: &InventoryItem) -> RepositoryResult<()> {
            self.inner.insert_item(item).await
        }
        async fn get_item(&self, id: ItemId) -> RepositoryResult<Option<InventoryItem>> {
            self.inner.get_item(id).await
        }
        async fn list_items(&self) -> RepositoryResult<Vec<InventoryItem>> {
            self.inner.list_items().await
        }
        async fn update_item(&self, _item: &InventoryItem) -> RepositoryResult<InventoryItem> {
            Err(RepositoryError::storage("connection reset"))
        }
        async fn apply_movements(&self, _movements: &[StockMovement]) -> RepositoryResult<Vec<InventoryItem>> {
            Err(RepositoryError::storage("connection reset"))
        }
        async fn list_movements(&self, item_id: ItemId) -> RepositoryResult<Vec<StockMovement>> {
            self.inner.list_movements(item_id).await
        }
        async fn insert_batch(&self, batch: &ProductionBatch) -> RepositoryResult<()> {
            self.inner.insert_batch(batch).await
        }
        async fn get_batch(&self, id: BatchId) -> RepositoryResult<Option<ProductionBatch>> {
            self.inner.get_batch(id).await
        }
        async fn list_batches(&self) -> RepositoryResult<Vec<ProductionBatch>> {
            self.inner.list_batches().await
        }
        async fn update_batch(&self, batch: &ProductionBatch, expected: BatchStatus) -> RepositoryResult<()> {
            self.inner.update_batch(batch, expected).await
        }
        async fn complete_batch(
            &self,
            _batch: &ProductionBatch,
            _movements: &[StockMovement],
        ) -> RepositoryResult<Vec<InventoryItem>> {
            Err(RepositoryError::storage("connection reset"))
        }
    }

    #[tokio::test]
    async fn failed_write_discards_staged_signal() {
        let f = fixture_with(Arc::new(FailingWrites {
            inner: InMemoryInventoryRepository::new(),
        }));
        let now = Utc::now();
        // Opening stock goes through apply_movements, so create without it.
        let item = f.inventory.create_item(sugar(None, 0), now).await.unwrap();

        let update = ItemUpdate {
            min_stock: Some(Some(10)),
            ..ItemUpdate::default()
        };
        let err = f.inventory.update_item(item.id, &update, now).await.unwrap_err();
        assert!(matches!(err, ServiceError::Repository(_)));

        let err = f
            .inventory
            .post_movement(StockMovement::receive(item.id, 1, now).unwrap())
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::Repository(_)));
        assert!(low_stock_signals(&f.signals).is_empty());
    }

    /// Hands control back to the runtime before every item read, so concurrent
    /// commands interleave between their read and their write.
    struct YieldingReads {
        inner: InMemoryInventoryRepository,
    }

    #[async_trait]
    impl InventoryRepository for YieldingReads {
        async fn insert_item(&self, item: &InventoryItem) -> RepositoryResult<()> {
            self.inner.insert_item(item).await
        }
        async fn get_item(&self, id: ItemId) -> RepositoryResult<Option<InventoryItem>> {
            let item = self.inner.get_item(id).await;
            tokio::task::yield_now().await;
            item
        }
        async fn list_items(&self) -> RepositoryResult<Vec<InventoryItem>> {
            self.inner.list_items().await
        }
        async fn update_item(&self, item: &InventoryItem) -> RepositoryResult<InventoryItem> {
            self.inner.update_item(item).await
        }
        async fn apply_movements(&self, movements: &[StockMovement]) -> RepositoryResult<Vec<InventoryItem>> {
            self.inner.apply_movements(movements).await
        }
        async fn list_movements(&self, item_id: ItemId) -> RepositoryResult<Vec<StockMovement>> {
            self.inner.list_movements(item_id).await
        }
        async fn insert_batch(&self, batch: &ProductionBatch) -> RepositoryResult<()> {
            self.inner.insert_batch(batch).await
        }
        async fn get_batch(&self, id: BatchId) -> RepositoryResult<Option<ProductionBatch>> {
            let batch = self.inner.get_batch(id).await;
            tokio::task::yield_now().await;
            batch
        }
        async fn list_batches(&self) -> RepositoryResult<Vec<ProductionBatch>> {
            self.inner.list_batches().await
        }
        async fn update_batch(&self, batch: &ProductionBatch, expected: BatchStatus) -> RepositoryResult<()> {
            self.inner.update_batch(batch, expected).await
        }
        async fn complete_batch(
            &self,
            batch: &ProductionBatch,
            movements: &[StockMovement],
        ) -> RepositoryResult<Vec<InventoryItem>> {
            self.inner.complete_batch(batch, movements).await
        }
    }

    fn yielding_fixture() -> Fixture {
        fixture_with(Arc::new(YieldingReads {
            inner: InMemoryInventoryRepository::new(),
        }))
    }

    #[tokio::test]
    async fn concurrent_issues_signal_on_committed_stock() {
        let f = yielding_fixture();
        let now = Utc::now();
        let item = f.inventory.create_item(sugar(Some(10), 12), now).await.unwrap();
        low_stock_signals(&f.signals);

        // Each command alone would leave 11 (not low); together they commit 10.
        let (a, b) = tokio::join!(
            f.inventory.post_movement(StockMovement::issue(item.id, 1, now).unwrap()),
            f.inventory.post_movement(StockMovement::issue(item.id, 1, now).unwrap()),
        );
        a.unwrap();
        b.unwrap();

        let stored = f.inventory.get_item(item.id).await.unwrap();
        assert_eq!(stored.stock, 10);
        let signals = low_stock_signals(&f.signals);
        assert_eq!(signals.len(), 1);
        assert_eq!(signals[0].stock, 10);
    }

    #[tokio::test]
    async fn concurrent_completions_post_stock_once() {
        let f = yielding_fixture();
        let now = Utc::now();
        let flour = f.inventory.create_item(sugar(None, 100), now).await.unwrap();
        let bread = f
            .inventory
            .create_item(
                NewItem {
                    kind: ItemKind::Product,
                    name: "Bread".into(),
                    unit: "loaf".into(),
                    min_stock: None,
                    opening_stock: 0,
                },
                now,
            )
            .await
            .unwrap();
        let batch = f
            .inventory
            .plan_batch(
                NewBatch {
                    code: "B-010".into(),
                    product_id: bread.id,
                    planned_quantity: 10,
                    consumption: vec![ConsumptionLine {
                        item_id: flour.id,
                        quantity: 10,
                    }],
                },
                now,
            )
            .await
            .unwrap();
        f.inventory.start_batch(batch.id, now).await.unwrap();

        let (a, b) = tokio::join!(
            f.inventory.complete_batch(batch.id, 10, now),
            f.inventory.complete_batch(batch.id, 10, now),
        );
        let conflicts = [&a, &b]
            .iter()
            .filter(|r| matches!(r, Err(ServiceError::Repository(RepositoryError::Conflict(_)))))
            .count();
        assert_eq!(conflicts, 1, "a={a:?} b={b:?}");
        assert!(a.is_ok() || b.is_ok());

        assert_eq!(f.inventory.get_item(flour.id).await.unwrap().stock, 90);
        assert_eq!(f.inventory.get_item(bread.id).await.unwrap().stock, 10);
        assert_eq!(f.inventory.movements(flour.id).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn cancel_racing_completion_loses() {
        let f = yielding_fixture();
        let now = Utc::now();
        let bread = f
            .inventory
            .create_item(
                NewItem {
                    kind: ItemKind::Product,
                    name: "Bread".into(),
                    unit: "loaf".into(),
                    min_stock: None,
                    opening_stock: 0,
                },
                now,
            )
            .await
            .unwrap();
        let batch = f
            .inventory
            .plan_batch(
                NewBatch {
                    code: "B-011".into(),
                    product_id: bread.id,
                    planned_quantity: 5,
                    consumption: vec![],
                },
                now,
            )
            .await
            .unwrap();
        f.inventory.start_batch(batch.id, now).await.unwrap();

        let (done, cancelled) = tokio::join!(
            f.inventory.complete_batch(batch.id, 5, now),
            f.inventory.cancel_batch(batch.id, now),
        );
        assert_eq!(done.is_ok(), cancelled.is_err());

        let stored = f.inventory.get_batch(batch.id).await.unwrap();
        let expected_stock = if stored.status == BatchStatus::Completed { 5 } else { 0 };
        assert_eq!(f.inventory.get_item(bread.id).await.unwrap().stock, expected_stock);
    }

    #[tokio::test]
    async fn raising_threshold_above_stock_signals() {
        let f = fixture();
        let now = Utc::now();
        let item = f.inventory.create_item(sugar(Some(2), 5), now).await.unwrap();
        assert!(low_stock_signals(&f.signals).is_empty());

        let update = ItemUpdate {
            min_stock: Some(Some(5)),
            ..ItemUpdate::default()
        };
        let updated = f.inventory.update_item(item.id, &update, now).await.unwrap();
        assert_eq!(updated.min_stock, Some(5));
        assert_eq!(low_stock_signals(&f.signals).len(), 1);
    }

    #[tokio::test]
    async fn completing_a_batch_signals_each_low_material() {
        let f = fixture();
        let now = Utc::now();
        let flour = f.inventory.create_item(sugar(Some(10), 15), now).await.unwrap();
        let yeast = f
            .inventory
            .create_item(
                NewItem {
                    name: "Yeast".into(),
                    ..sugar(Some(1), 50)
                },
                now,
            )
            .await
            .unwrap();
        let bread = f
            .inventory
            .create_item(
                NewItem {
                    kind: ItemKind::Product,
                    name: "Bread".into(),
                    unit: "loaf".into(),
                    min_stock: None,
                    opening_stock: 0,
                },
                now,
            )
            .await
            .unwrap();

        let batch = f
            .inventory
            .plan_batch(
                NewBatch {
                    code: "B-001".into(),
                    product_id: bread.id,
                    planned_quantity: 20,
                    consumption: vec![
                        ConsumptionLine {
                            item_id: flour.id,
                            quantity: 8,
                        },
                        ConsumptionLine {
                            item_id: yeast.id,
                            quantity: 2,
                        },
                    ],
                },
                now,
            )
            .await
            .unwrap();
        f.inventory.start_batch(batch.id, now).await.unwrap();

        let (completed, items) = f.inventory.complete_batch(batch.id, 18, now).await.unwrap();
        assert_eq!(completed.produced_quantity, Some(18));
        assert_eq!(items.len(), 3);

        let signals = low_stock_signals(&f.signals);
        assert_eq!(signals.len(), 1);
        assert_eq!(signals[0].item_id, flour.id);
        assert_eq!(f.inventory.get_item(bread.id).await.unwrap().stock, 18);
    }

    #[tokio::test]
    async fn batch_over_consuming_is_rejected_atomically() {
        let f = fixture();
        let now = Utc::now();
        let flour = f.inventory.create_item(sugar(None, 5), now).await.unwrap();
        let bread = f
            .inventory
            .create_item(
                NewItem {
                    kind: ItemKind::Product,
                    name: "Bread".into(),
                    unit: "loaf".into(),
                    min_stock: None,
                    opening_stock: 0,
                },
                now,
            )
            .await
            .unwrap();
        let batch = f
            .inventory
            .plan_batch(
                NewBatch {
                    code: "B-002".into(),
                    product_id: bread.id,
                    planned_quantity: 10,
                    consumption: vec![ConsumptionLine {
                        item_id: flour.id,
                        quantity: 6,
                    }],
                },
                now,
            )
            .await
            .unwrap();

        f.inventory.start_batch(batch.id, now).await.unwrap();
        let err = f.inventory.complete_batch(batch.id, 10, now).await.unwrap_err();
        assert!(matches!(err, ServiceError::Domain(_)));
        assert_eq!(
            f.inventory.get_batch(batch.id).await.unwrap().status,
            stockline_inventory::BatchStatus::InProgress
        );
        assert_eq!(f.inventory.get_item(flour.id).await.unwrap().stock, 5);
        assert_eq!(f.inventory.get_item(bread.id).await.unwrap().stock, 0);
    }

    #[tokio::test]
    async fn plan_batch_rejects_product_as_material() {
        let f = fixture();
        let now = Utc::now();
        let bread = f
            .inventory
            .create_item(
                NewItem {
                    kind: ItemKind::Product,
                    name: "Bread".into(),
                    unit: "loaf".into(),
                    min_stock: None,
                    opening_stock: 0,
                },
                now,
            )
            .await
            .unwrap();
        let cake = f
            .inventory
            .create_item(
                NewItem {
                    kind: ItemKind::Product,
                    name: "Cake".into(),
                    unit: "pc".into(),
                    min_stock: None,
                    opening_stock: 0,
                },
                now,
            )
            .await
            .unwrap();

        let err = f
            .inventory
            .plan_batch(
                NewBatch {
                    code: "B-003".into(),
                    product_id: bread.id,
                    planned_quantity: 1,
                    consumption: vec![ConsumptionLine {
                        item_id: cake.id,
                        quantity: 1,
                    }],
                },
                now,
            )
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::Domain(DomainError::Validation(_))));
    }

    #[tokio::test]
    async fn scan_picks_up_items_already_low() {
        let f = fixture();
        let now = Utc::now();
        f.inventory.create_item(sugar(Some(10), 3), now).await.unwrap();
        // Creation already signalled once.
        assert_eq!(low_stock_signals(&f.signals).len(), 1);

        let scan = LowStockScan::new(f.inventory.clone());
        // No notification row was written, so nothing suppresses the scan.
        assert_eq!(scan.run(now).await.unwrap(), 1);
        assert_eq!(low_stock_signals(&f.signals).len(), 1);
        assert_eq!(f.inventory.low_stock_items().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn unknown_item_is_not_found() {
        let f = fixture();
        let err = f.inventory.get_item(ItemId::new()).await.unwrap_err();
        assert!(matches!(err, ServiceError::NotFound(_)));
    }
}
