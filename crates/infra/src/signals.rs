//! Signals raised by the watcher and the sweeps, routed to the dispatcher by
//! [`crate::listener`].

use std::sync::Arc;

use chrono::{DateTime, Utc};

use stockline_events::{Event, InMemoryEventBus};
use stockline_inventory::LowStockDetected;
use stockline_workforce::{AbsenceDetected, OvertimeDetected, OvertimeSummary};

#[derive(Debug, Clone, PartialEq)]
pub enum Signal {
    LowStock(LowStockDetected),
    Absence(AbsenceDetected),
    Overtime(OvertimeDetected),
    OvertimeSummary(OvertimeSummary),
}

impl Event for Signal {
    fn event_type(&self) -> &'static str {
        match self {
            Signal::LowStock(e) => e.event_type(),
            Signal::Absence(e) => e.event_type(),
            Signal::Overtime(e) => e.event_type(),
            Signal::OvertimeSummary(e) => e.event_type(),
        }
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            Signal::LowStock(e) => e.occurred_at(),
            Signal::Absence(e) => e.occurred_at(),
            Signal::Overtime(e) => e.occurred_at(),
            Signal::OvertimeSummary(e) => e.occurred_at(),
        }
    }
}

impl From<LowStockDetected> for Signal {
    fn from(e: LowStockDetected) -> Self {
        Signal::LowStock(e)
    }
}

impl From<AbsenceDetected> for Signal {
    fn from(e: AbsenceDetected) -> Self {
        Signal::Absence(e)
    }
}

impl From<OvertimeDetected> for Signal {
    fn from(e: OvertimeDetected) -> Self {
        Signal::Overtime(e)
    }
}

impl From<OvertimeSummary> for Signal {
    fn from(e: OvertimeSummary) -> Self {
        Signal::OvertimeSummary(e)
    }
}

/// In-process signal bus shared by services and the listener.
pub type SignalBus = Arc<InMemoryEventBus<Signal>>;
