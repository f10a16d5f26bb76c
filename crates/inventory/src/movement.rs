use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use stockline_core::{BatchId, DomainError, DomainResult, Entity, ItemId, MovementId};

/// Direction of a stock movement.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MovementKind {
    /// Goods received (purchase, production output).
    In,
    /// Goods issued (sale, production consumption).
    Out,
    /// Stock-take correction; `quantity` is a signed delta.
    Adjustment,
}

impl MovementKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            MovementKind::In => "in",
            MovementKind::Out => "out",
            MovementKind::Adjustment => "adjustment",
        }
    }

    pub fn parse(s: &str) -> DomainResult<Self> {
        match s {
            "in" => Ok(MovementKind::In),
            "out" => Ok(MovementKind::Out),
            "adjustment" => Ok(MovementKind::Adjustment),
            other => Err(DomainError::validation(format!("unknown movement kind '{other}'"))),
        }
    }
}

/// A posted change to one item's stock.
///
/// `quantity` is strictly positive for `In`/`Out` and non-zero for `Adjustment`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockMovement {
    pub id: MovementId,
    pub item_id: ItemId,
    pub kind: MovementKind,
    pub quantity: i64,
    pub reason: Option<String>,
    pub batch_id: Option<BatchId>,
    pub occurred_at: DateTime<Utc>,
}

impl StockMovement {
    pub fn new(
        item_id: ItemId,
        kind: MovementKind,
        quantity: i64,
        occurred_at: DateTime<Utc>,
    ) -> DomainResult<Self> {
        match kind {
            MovementKind::In | MovementKind::Out if quantity <= 0 => {
                return Err(DomainError::validation("quantity must be positive"));
            }
            MovementKind::Adjustment if quantity == 0 => {
                return Err(DomainError::validation("adjustment cannot be zero"));
            }
            _ => {}
        }

        Ok(Self {
            id: MovementId::new(),
            item_id,
            kind,
            quantity,
            reason: None,
            batch_id: None,
            occurred_at,
        })
    }

    pub fn receive(item_id: ItemId, quantity: i64, at: DateTime<Utc>) -> DomainResult<Self> {
        Self::new(item_id, MovementKind::In, quantity, at)
    }

    pub fn issue(item_id: ItemId, quantity: i64, at: DateTime<Utc>) -> DomainResult<Self> {
        Self::new(item_id, MovementKind::Out, quantity, at)
    }

    pub fn adjust(item_id: ItemId, delta: i64, at: DateTime<Utc>) -> DomainResult<Self> {
        Self::new(item_id, MovementKind::Adjustment, delta, at)
    }

    pub fn with_reason(mut self, reason: impl Into<String>) -> Self {
        let reason = reason.into();
        self.reason = (!reason.trim().is_empty()).then(|| reason.trim().to_string());
        self
    }

    pub fn with_batch(mut self, batch_id: BatchId) -> Self {
        self.batch_id = Some(batch_id);
        self
    }

    /// Signed effect on stock.
    pub fn delta(&self) -> i64 {
        match self.kind {
            MovementKind::In | MovementKind::Adjustment => self.quantity,
            MovementKind::Out => -self.quantity,
        }
    }
}

impl Entity for StockMovement {
    type Id = MovementId;

    fn id(&self) -> Self::Id {
        self.id
    }
}
