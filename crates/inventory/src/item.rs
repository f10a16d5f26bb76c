use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use stockline_core::{DomainError, DomainResult, Entity, ItemId};

use crate::movement::StockMovement;

/// What an inventory item is used for.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemKind {
    /// Consumed by production batches.
    RawMaterial,
    /// Produced by production batches and sold.
    Product,
}

impl ItemKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ItemKind::RawMaterial => "raw_material",
            ItemKind::Product => "product",
        }
    }

    pub fn parse(s: &str) -> DomainResult<Self> {
        match s {
            "raw_material" => Ok(ItemKind::RawMaterial),
            "product" => Ok(ItemKind::Product),
            other => Err(DomainError::validation(format!("unknown item kind '{other}'"))),
        }
    }
}

impl core::fmt::Display for ItemKind {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A stocked item: raw material or product.
///
/// # Invariants
/// - `stock` is never negative.
/// - `min_stock`, when set, is never negative.
/// - Stock only changes through [`InventoryItem::with_movement`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InventoryItem {
    pub id: ItemId,
    pub kind: ItemKind,
    pub name: String,
    pub unit: String,
    pub stock: i64,
    pub min_stock: Option<i64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Partial update of an item's descriptive fields.
///
/// `min_stock: Some(None)` clears the threshold; `None` leaves it untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemUpdate {
    pub name: Option<String>,
    pub unit: Option<String>,
    pub min_stock: Option<Option<i64>>,
}

impl InventoryItem {
    /// Table name used when notifications reference an item.
    pub const TABLE: &'static str = "inventory_items";

    /// Create a new item with zero stock. Opening stock is posted as a movement.
    pub fn new(
        id: ItemId,
        kind: ItemKind,
        name: impl Into<String>,
        unit: impl Into<String>,
        min_stock: Option<i64>,
        now: DateTime<Utc>,
    ) -> DomainResult<Self> {
        let name = name.into().trim().to_string();
        if name.is_empty() {
            return Err(DomainError::validation("name cannot be empty"));
        }
        let unit = unit.into().trim().to_string();
        if unit.is_empty() {
            return Err(DomainError::validation("unit cannot be empty"));
        }
        ensure_threshold(min_stock)?;

        Ok(Self {
            id,
            kind,
            name,
            unit,
            stock: 0,
            min_stock,
            created_at: now,
            updated_at: now,
        })
    }

    /// Apply a descriptive update, returning the updated copy.
    pub fn with_update(&self, update: &ItemUpdate, now: DateTime<Utc>) -> DomainResult<Self> {
        let mut next = self.clone();

        if let Some(name) = &update.name {
            let name = name.trim();
            if name.is_empty() {
                return Err(DomainError::validation("name cannot be empty"));
            }
            next.name = name.to_string();
        }
        if let Some(unit) = &update.unit {
            let unit = unit.trim();
            if unit.is_empty() {
                return Err(DomainError::validation("unit cannot be empty"));
            }
            next.unit = unit.to_string();
        }
        if let Some(min_stock) = update.min_stock {
            ensure_threshold(min_stock)?;
            next.min_stock = min_stock;
        }

        next.updated_at = now;
        Ok(next)
    }

    /// Apply a stock movement, returning the updated copy.
    pub fn with_movement(&self, movement: &StockMovement) -> DomainResult<Self> {
        if movement.item_id != self.id {
            return Err(DomainError::invariant("item_id mismatch"));
        }

        let new_stock = self
            .stock
            .checked_add(movement.delta())
            .ok_or_else(|| DomainError::invariant("stock overflow"))?;
        if new_stock < 0 {
            return Err(DomainError::invariant(format!(
                "stock cannot go negative (item {}, stock {}, delta {})",
                self.id,
                self.stock,
                movement.delta()
            )));
        }

        let mut next = self.clone();
        next.stock = new_stock;
        next.updated_at = movement.occurred_at;
        Ok(next)
    }
}

fn ensure_threshold(min_stock: Option<i64>) -> DomainResult<()> {
    match min_stock {
        Some(t) if t < 0 => Err(DomainError::validation("min_stock cannot be negative")),
        _ => Ok(()),
    }
}

impl Entity for InventoryItem {
    type Id = ItemId;

    fn id(&self) -> Self::Id {
        self.id
    }
}
