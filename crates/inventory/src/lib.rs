//! Inventory domain module.
//!
//! This crate contains business rules for raw materials, products, stock
//! movements, production batches and low-stock detection, implemented purely
//! as deterministic domain logic (no IO, no HTTP, no storage).

pub mod batch;
pub mod item;
pub mod movement;
pub mod watcher;

pub use batch::{BatchStatus, ConsumptionLine, ProductionBatch};
pub use item::{InventoryItem, ItemKind, ItemUpdate};
pub use movement::{MovementKind, StockMovement};
pub use watcher::{DEFAULT_DEDUP_WINDOW_MINUTES, LowStockDetected, StockWatcher};
