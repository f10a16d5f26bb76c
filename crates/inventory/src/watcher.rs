//! Low-stock detection.
//!
//! The watcher is a pure decision: given an item's committed state and the time
//! of the most recent equivalent low-stock notification, should a new signal
//! fire? Looking up that time and publishing the signal are the caller's job.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use stockline_core::ItemId;
use stockline_events::Event;

use crate::item::{InventoryItem, ItemKind};

/// Default duplicate-suppression window.
pub const DEFAULT_DEDUP_WINDOW_MINUTES: i64 = 60;

/// Signal: an item's stock is at or below its configured minimum.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LowStockDetected {
    pub item_id: ItemId,
    pub kind: ItemKind,
    pub name: String,
    pub unit: String,
    pub stock: i64,
    pub min_stock: i64,
    pub occurred_at: DateTime<Utc>,
}

impl Event for LowStockDetected {
    fn event_type(&self) -> &'static str {
        "inventory.low_stock"
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        self.occurred_at
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct StockWatcher {
    window: Duration,
}

impl Default for StockWatcher {
    fn default() -> Self {
        Self::new(Duration::minutes(DEFAULT_DEDUP_WINDOW_MINUTES))
    }
}

impl StockWatcher {
    pub fn new(window: Duration) -> Self {
        Self { window }
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    /// Stock at or below a configured threshold. No threshold is never low.
    pub fn is_low(item: &InventoryItem) -> bool {
        matches!(item.min_stock, Some(min) if item.stock <= min)
    }

    /// Whether an equivalent notification at `last_equivalent_at` still
    /// suppresses a new one at `now`.
    pub fn suppressed(&self, last_equivalent_at: Option<DateTime<Utc>>, now: DateTime<Utc>) -> bool {
        match last_equivalent_at {
            Some(last) => now - last < self.window,
            None => false,
        }
    }

    /// Decide whether `item` (committed state) warrants a low-stock signal.
    pub fn evaluate(
        &self,
        item: &InventoryItem,
        last_equivalent_at: Option<DateTime<Utc>>,
        now: DateTime<Utc>,
    ) -> Option<LowStockDetected> {
        let min_stock = item.min_stock?;
        if item.stock > min_stock {
            return None;
        }
        if self.suppressed(last_equivalent_at, now) {
            return None;
        }

        Some(LowStockDetected {
            item_id: item.id,
            kind: item.kind,
            name: item.name.clone(),
            unit: item.unit.clone(),
            stock: item.stock,
            min_stock,
            occurred_at: now,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(stock: i64, min_stock: Option<i64>) -> InventoryItem {
        let mut item = InventoryItem::new(
            ItemId::new(),
            ItemKind::RawMaterial,
            "Sugar",
            "kg",
            min_stock,
            Utc::now(),
        )
        .unwrap();
        item.stock = stock;
        item
    }

    #[test]
    fn stock_below_threshold_fires() {
        let now = Utc::now();
        let signal = StockWatcher::default().evaluate(&item(5, Some(10)), None, now).unwrap();
        assert_eq!(signal.stock, 5);
        assert_eq!(signal.min_stock, 10);
        assert_eq!(signal.occurred_at, now);
    }

    #[test]
    fn stock_equal_to_threshold_fires() {
        assert!(StockWatcher::default().evaluate(&item(10, Some(10)), None, Utc::now()).is_some());
    }

    #[test]
    fn missing_threshold_never_fires() {
        assert!(StockWatcher::default().evaluate(&item(5, None), None, Utc::now()).is_none());
        assert!(StockWatcher::default().evaluate(&item(0, None), None, Utc::now()).is_none());
    }

    #[test]
    fn equivalent_within_window_suppresses() {
        let now = Utc::now();
        let w = StockWatcher::default();
        let low = item(1, Some(10));

        assert!(w.evaluate(&low, Some(now - Duration::minutes(59)), now).is_none());
        assert!(w.evaluate(&low, Some(now - Duration::minutes(60)), now).is_some());
        assert!(w.evaluate(&low, Some(now - Duration::hours(5)), now).is_some());
    }

    #[cfg(test)]
    mod proptest_tests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            /// Property: without a threshold no stock level ever signals.
            #[test]
            fn no_threshold_never_signals(stock in 0i64..1_000_000, minutes_ago in proptest::option::of(0i64..10_000)) {
                let now = Utc::now();
                let last = minutes_ago.map(|m| now - Duration::minutes(m));
                prop_assert!(StockWatcher::default().evaluate(&item(stock, None), last, now).is_none());
            }

            /// Property: with a threshold and no recent equivalent, signal iff stock <= min.
            #[test]
            fn signals_exactly_when_low(stock in 0i64..1_000, min in 0i64..1_000) {
                let fired = StockWatcher::default().evaluate(&item(stock, Some(min)), None, Utc::now()).is_some();
                prop_assert_eq!(fired, stock <= min);
            }

            /// Property: suppression depends only on the age of the last equivalent signal.
            #[test]
            fn suppression_follows_window(window in 1i64..240, age in 0i64..480) {
                let now = Utc::now();
                let w = StockWatcher::new(Duration::minutes(window));
                let fired = w.evaluate(&item(0, Some(1)), Some(now - Duration::minutes(age)), now).is_some();
                prop_assert_eq!(fired, age >= window);
            }
        }
    }
}
