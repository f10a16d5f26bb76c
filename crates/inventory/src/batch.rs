//! Production batches: raw materials in, product out.

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use stockline_core::{BatchId, DomainError, DomainResult, Entity, ItemId};

use crate::movement::StockMovement;

/// Batch lifecycle.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BatchStatus {
    Planned,
    InProgress,
    Completed,
    Cancelled,
}

impl BatchStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            BatchStatus::Planned => "planned",
            BatchStatus::InProgress => "in_progress",
            BatchStatus::Completed => "completed",
            BatchStatus::Cancelled => "cancelled",
        }
    }

    pub fn parse(s: &str) -> DomainResult<Self> {
        match s {
            "planned" => Ok(BatchStatus::Planned),
            "in_progress" => Ok(BatchStatus::InProgress),
            "completed" => Ok(BatchStatus::Completed),
            "cancelled" => Ok(BatchStatus::Cancelled),
            other => Err(DomainError::validation(format!("unknown batch status '{other}'"))),
        }
    }
}

/// Raw material consumed by a batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConsumptionLine {
    pub item_id: ItemId,
    pub quantity: i64,
}

/// A production run.
///
/// # Invariants
/// - `code` is non-blank; quantities are positive.
/// - Each raw material appears at most once and never equals the product.
/// - Transitions: planned → in_progress → completed, planned|in_progress → cancelled.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductionBatch {
    pub id: BatchId,
    pub code: String,
    pub product_id: ItemId,
    pub planned_quantity: i64,
    pub produced_quantity: Option<i64>,
    pub consumption: Vec<ConsumptionLine>,
    pub status: BatchStatus,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl ProductionBatch {
    pub fn plan(
        id: BatchId,
        code: impl Into<String>,
        product_id: ItemId,
        planned_quantity: i64,
        consumption: Vec<ConsumptionLine>,
        now: DateTime<Utc>,
    ) -> DomainResult<Self> {
        let code = code.into().trim().to_string();
        if code.is_empty() {
            return Err(DomainError::validation("batch code cannot be empty"));
        }
        if planned_quantity <= 0 {
            return Err(DomainError::validation("planned quantity must be positive"));
        }

        let mut seen = HashSet::new();
        for line in &consumption {
            if line.quantity <= 0 {
                return Err(DomainError::validation("consumption quantity must be positive"));
            }
            if line.item_id == product_id {
                return Err(DomainError::invariant("a batch cannot consume its own product"));
            }
            if !seen.insert(line.item_id) {
                return Err(DomainError::validation(format!(
                    "raw material {} listed twice",
                    line.item_id
                )));
            }
        }

        Ok(Self {
            id,
            code,
            product_id,
            planned_quantity,
            produced_quantity: None,
            consumption,
            status: BatchStatus::Planned,
            created_at: now,
            started_at: None,
            completed_at: None,
        })
    }

    pub fn start(&mut self, now: DateTime<Utc>) -> DomainResult<()> {
        if self.status != BatchStatus::Planned {
            return Err(DomainError::conflict(format!(
                "cannot start a {} batch",
                self.status.as_str()
            )));
        }
        self.status = BatchStatus::InProgress;
        self.started_at = Some(now);
        Ok(())
    }

    /// Complete the batch and return the movements that realise it:
    /// one `out` per consumption line followed by one `in` for the product.
    pub fn complete(&mut self, produced: i64, now: DateTime<Utc>) -> DomainResult<Vec<StockMovement>> {
        if self.status != BatchStatus::InProgress {
            return Err(DomainError::conflict(format!(
                "cannot complete a {} batch",
                self.status.as_str()
            )));
        }
        if produced <= 0 {
            return Err(DomainError::validation("produced quantity must be positive"));
        }

        let reason = format!("batch {}", self.code);
        let mut movements = Vec::with_capacity(self.consumption.len() + 1);
        for line in &self.consumption {
            movements.push(
                StockMovement::issue(line.item_id, line.quantity, now)?
                    .with_reason(reason.clone())
                    .with_batch(self.id),
            );
        }
        movements.push(
            StockMovement::receive(self.product_id, produced, now)?
                .with_reason(reason)
                .with_batch(self.id),
        );

        self.status = BatchStatus::Completed;
        self.produced_quantity = Some(produced);
        self.completed_at = Some(now);
        Ok(movements)
    }

    pub fn cancel(&mut self, now: DateTime<Utc>) -> DomainResult<()> {
        match self.status {
            BatchStatus::Planned | BatchStatus::InProgress => {
                self.status = BatchStatus::Cancelled;
                self.completed_at = Some(now);
                Ok(())
            }
            other => Err(DomainError::conflict(format!(
                "cannot cancel a {} batch",
                other.as_str()
            ))),
        }
    }
}

impl Entity for ProductionBatch {
    type Id = BatchId;

    fn id(&self) -> Self::Id {
        self.id
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::MovementKind;

    fn batch() -> ProductionBatch {
        ProductionBatch::plan(
            BatchId::new(),
            "B-001",
            ItemId::new(),
            100,
            vec![
                ConsumptionLine { item_id: ItemId::new(), quantity: 40 },
                ConsumptionLine { item_id: ItemId::new(), quantity: 2 },
            ],
            Utc::now(),
        )
        .unwrap()
    }

    #[test]
    fn plan_rejects_duplicate_and_self_consumption() {
        let product = ItemId::new();
        let flour = ItemId::new();
        let now = Utc::now();

        let dup = vec![
            ConsumptionLine { item_id: flour, quantity: 1 },
            ConsumptionLine { item_id: flour, quantity: 2 },
        ];
        assert!(ProductionBatch::plan(BatchId::new(), "B", product, 1, dup, now).is_err());

        let own = vec![ConsumptionLine { item_id: product, quantity: 1 }];
        assert!(ProductionBatch::plan(BatchId::new(), "B", product, 1, own, now).is_err());
    }

    #[test]
    fn complete_requires_start_and_emits_movements() {
        let mut b = batch();
        let now = Utc::now();

        assert!(b.complete(90, now).is_err());
        b.start(now).unwrap();

        let movements = b.complete(90, now).unwrap();
        assert_eq!(movements.len(), 3);
        assert!(movements[..2].iter().all(|m| m.kind == MovementKind::Out));
        assert_eq!(movements[2].kind, MovementKind::In);
        assert_eq!(movements[2].item_id, b.product_id);
        assert_eq!(movements[2].quantity, 90);
        assert!(movements.iter().all(|m| m.batch_id == Some(b.id)));

        assert_eq!(b.status, BatchStatus::Completed);
        assert_eq!(b.produced_quantity, Some(90));
    }

    #[test]
    fn completed_batch_cannot_be_cancelled() {
        let mut b = batch();
        let now = Utc::now();
        b.start(now).unwrap();
        b.complete(1, now).unwrap();
        assert!(b.cancel(now).is_err());
    }
}
