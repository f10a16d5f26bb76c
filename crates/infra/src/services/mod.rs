//! Application services and their wiring.

use std::sync::Arc;

use chrono::Duration;
use sqlx::PgPool;

use stockline_events::InMemoryEventBus;
use stockline_inventory::StockWatcher;

use crate::config::AppConfig;
use crate::realtime::RealtimeHub;
use crate::repository::{
    InMemoryInventoryRepository, InMemoryNotificationRepository, InMemoryUserDirectory, InMemoryWorkLogRepository,
    InventoryRepository, NotificationRepository, PostgresInventoryRepository, PostgresNotificationRepository,
    PostgresUserDirectory, PostgresWorkLogRepository, UserDirectory, WorkLogRepository,
};
use crate::signals::SignalBus;

pub mod dispatcher;
pub mod error;
pub mod stock;
pub mod users;
pub mod workforce;

pub use dispatcher::{DispatchOutcome, NotificationDispatcher};
pub use error::{ServiceError, ServiceResult};
pub use stock::{InventoryService, LowStockScan, NewBatch, NewItem};
pub use users::{NewUser, UserService};
pub use workforce::{AbsenceSweep, OvertimeSweep, WorkforceService};

/// One adapter per repository port.
#[derive(Clone)]
pub struct Repositories {
    pub inventory: Arc<dyn InventoryRepository>,
    pub notifications: Arc<dyn NotificationRepository>,
    pub worklogs: Arc<dyn WorkLogRepository>,
    pub users: Arc<dyn UserDirectory>,
}

impl Repositories {
    pub fn in_memory() -> Self {
        Self {
            inventory: Arc::new(InMemoryInventoryRepository::new()),
            notifications: Arc::new(InMemoryNotificationRepository::new()),
            worklogs: Arc::new(InMemoryWorkLogRepository::new()),
            users: Arc::new(InMemoryUserDirectory::new()),
        }
    }

    pub fn postgres(pool: PgPool) -> Self {
        Self {
            inventory: Arc::new(PostgresInventoryRepository::new(pool.clone())),
            notifications: Arc::new(PostgresNotificationRepository::new(pool.clone())),
            worklogs: Arc::new(PostgresWorkLogRepository::new(pool.clone())),
            users: Arc::new(PostgresUserDirectory::new(pool)),
        }
    }
}

/// Every service, sharing one signal bus and one realtime hub.
#[derive(Clone)]
pub struct Services {
    pub inventory: Arc<InventoryService>,
    pub low_stock_scan: Arc<LowStockScan>,
    pub dispatcher: Arc<NotificationDispatcher>,
    pub workforce: Arc<WorkforceService>,
    pub users: Arc<UserService>,
    pub bus: SignalBus,
    pub realtime: RealtimeHub,
}

impl Services {
    pub fn build(repos: Repositories, cfg: &AppConfig) -> Self {
        let bus: SignalBus = Arc::new(InMemoryEventBus::new());
        let realtime = RealtimeHub::default();
        let watcher = StockWatcher::new(Duration::minutes(cfg.notifications.low_stock_window_minutes));

        let inventory = Arc::new(InventoryService::new(
            repos.inventory,
            repos.notifications.clone(),
            watcher,
            bus.clone(),
        ));
        let dispatcher = Arc::new(NotificationDispatcher::new(
            repos.notifications,
            repos.users.clone(),
            realtime.clone(),
        ));
        let workforce = Arc::new(WorkforceService::new(
            repos.worklogs,
            repos.users.clone(),
            cfg.overtime,
            bus.clone(),
        ));

        Self {
            low_stock_scan: Arc::new(LowStockScan::new(inventory.clone())),
            inventory,
            dispatcher,
            workforce,
            users: Arc::new(UserService::new(repos.users)),
            bus,
            realtime,
        }
    }
}
