//! Signal listener: drains the [`SignalBus`] and turns each signal into a
//! dispatcher call.
//!
//! Runs on a blocking task (the bus subscription is a std channel) and drives
//! the async dispatcher through the runtime handle. A failed dispatch is
//! logged; the loop keeps going.

use std::sync::Arc;
use std::sync::mpsc;
use std::time::Duration as StdDuration;

use chrono::{DateTime, Duration, Utc};
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use stockline_auth::Role;
use stockline_events::{Event, EventBus};
use stockline_inventory::InventoryItem;
use stockline_notifications::{Audience, NotificationPayload, NotificationType, RelatedEntity};

use crate::config::NotificationConfig;
use crate::services::{DispatchOutcome, NotificationDispatcher, ServiceResult};
use crate::signals::{Signal, SignalBus};

/// Table name used when a notification references a user.
pub const USERS_TABLE: &str = "users";

const POLL_INTERVAL: StdDuration = StdDuration::from_millis(200);

/// Who hears about what.
#[derive(Debug, Clone)]
pub struct SignalRouting {
    pub low_stock_roles: Vec<Role>,
    pub workforce_roles: Vec<Role>,
    pub ttl: Option<Duration>,
}

impl Default for SignalRouting {
    fn default() -> Self {
        Self::from_config(&NotificationConfig::default())
    }
}

impl SignalRouting {
    pub fn from_config(cfg: &NotificationConfig) -> Self {
        Self {
            low_stock_roles: cfg.low_stock_roles.iter().cloned().map(Role::new).collect(),
            workforce_roles: cfg.workforce_roles.iter().cloned().map(Role::new).collect(),
            ttl: cfg.default_ttl_hours.map(Duration::hours),
        }
    }

    /// Notification and audience for `signal`.
    pub fn route(&self, signal: &Signal) -> (NotificationPayload, Audience) {
        let (payload, audience) = match signal {
            Signal::LowStock(e) => (
                NotificationPayload::new(
                    "Low stock",
                    format!(
                        "{} is at {} {} (minimum {}).",
                        e.name, e.stock, e.unit, e.min_stock
                    ),
                    NotificationType::Warning,
                )
                .related_to(RelatedEntity::new(InventoryItem::TABLE, e.item_id)),
                Audience::roles(self.low_stock_roles.iter().cloned()),
            ),
            Signal::Absence(e) => (
                NotificationPayload::new(
                    "Absence recorded",
                    format!("No work log was recorded for {}.", e.date.format("%Y-%m-%d")),
                    NotificationType::Warning,
                )
                .related_to(RelatedEntity::new(USERS_TABLE, e.user_id)),
                Audience::users([e.user_id]),
            ),
            Signal::Overtime(e) => (
                NotificationPayload::new(
                    "Overtime",
                    format!(
                        "You logged {:.2} overtime hours between {} and {} (alert above {:.2}).",
                        e.overtime_hours, e.period.from, e.period.to, e.threshold_hours
                    ),
                    NotificationType::Info,
                )
                .related_to(RelatedEntity::new(USERS_TABLE, e.user_id)),
                Audience::users([e.user_id]),
            ),
            Signal::OvertimeSummary(e) => (
                NotificationPayload::new(
                    "Overtime summary",
                    format!(
                        "{} employee(s) exceeded the overtime threshold between {} and {}: {:.2} hours in total.",
                        e.users, e.period.from, e.period.to, e.total_overtime_hours
                    ),
                    NotificationType::Info,
                ),
                Audience::roles(self.workforce_roles.iter().cloned()),
            ),
        };

        match self.ttl {
            Some(ttl) => (payload.expiring_at(signal.occurred_at() + ttl), audience),
            None => (payload, audience),
        }
    }
}

pub struct SignalListener {
    dispatcher: Arc<NotificationDispatcher>,
    routing: SignalRouting,
}

impl SignalListener {
    pub fn new(dispatcher: Arc<NotificationDispatcher>, routing: SignalRouting) -> Self {
        Self { dispatcher, routing }
    }

    /// Route and dispatch one signal.
    pub async fn handle(&self, signal: &Signal, now: DateTime<Utc>) -> ServiceResult<DispatchOutcome> {
        let (payload, audience) = self.routing.route(signal);
        self.dispatcher.notify(payload, audience, now).await
    }

    /// Subscribe to `bus` and process signals until shut down.
    ///
    /// Must be called from within a tokio runtime. The subscription is taken
    /// before this returns, so nothing published afterwards is missed.
    pub fn spawn(self, bus: &SignalBus) -> ListenerHandle {
        let sub = bus.subscribe();
        let runtime = Handle::current();
        let (shutdown_tx, shutdown_rx) = mpsc::channel::<()>();

        let join = tokio::task::spawn_blocking(move || {
            info!("signal listener started");
            loop {
                if shutdown_rx.try_recv().is_ok() {
                    break;
                }
                match sub.recv_timeout(POLL_INTERVAL) {
                    Ok(signal) => {
                        let kind = signal.event_type();
                        match runtime.block_on(self.handle(&signal, Utc::now())) {
                            Ok(outcome) if outcome.is_complete() => {
                                debug!(signal = kind, delivered = outcome.delivered, "signal dispatched");
                            }
                            Ok(outcome) => {
                                warn!(signal = kind, failed = outcome.failed, "signal partially dispatched");
                            }
                            Err(e) => error!(signal = kind, error = %e, "signal dispatch failed"),
                        }
                    }
                    Err(mpsc::RecvTimeoutError::Timeout) => continue,
                    Err(mpsc::RecvTimeoutError::Disconnected) => break,
                }
            }
            info!("signal listener stopped");
        });

        ListenerHandle { shutdown: shutdown_tx, join }
    }
}

/// Running listener.
pub struct ListenerHandle {
    shutdown: mpsc::Sender<()>,
    join: JoinHandle<()>,
}

impl ListenerHandle {
    /// Stop after the signal in flight (if any) and wait for the loop to exit.
    pub async fn shutdown(self) {
        let _ = self.shutdown.send(());
        if let Err(e) = self.join.await {
            error!(error = %e, "signal listener task failed");
        }
    }
}
