//! Attendance commands and the absence/overtime sweeps.

use std::sync::Arc;

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::Serialize;
use tracing::{info, warn};

use stockline_core::{BatchId, DomainError, UserId};
use stockline_events::EventBus;
use stockline_workforce::{
    AbsenceDetected, OvertimeDetected, OvertimePolicy, OvertimeSummary, Period, WorkLog, detect_absences,
    detect_overtime,
};

use super::error::{ServiceError, ServiceResult};
use crate::repository::{UserDirectory, WorkLogRepository};
use crate::signals::{Signal, SignalBus};

/// Result of an absence sweep.
#[derive(Debug, Clone, Serialize)]
pub struct AbsenceSweep {
    pub date: NaiveDate,
    pub checked: usize,
    pub absences: Vec<AbsenceDetected>,
}

/// Result of an overtime sweep.
#[derive(Debug, Clone, Serialize)]
pub struct OvertimeSweep {
    pub period: Period,
    pub flagged: Vec<OvertimeDetected>,
    pub summary: Option<OvertimeSummary>,
}

pub struct WorkforceService {
    logs: Arc<dyn WorkLogRepository>,
    users: Arc<dyn UserDirectory>,
    policy: OvertimePolicy,
    bus: SignalBus,
}

impl WorkforceService {
    pub fn new(
        logs: Arc<dyn WorkLogRepository>,
        users: Arc<dyn UserDirectory>,
        policy: OvertimePolicy,
        bus: SignalBus,
    ) -> Self {
        Self {
            logs,
            users,
            policy,
            bus,
        }
    }

    pub fn policy(&self) -> &OvertimePolicy {
        &self.policy
    }

    /// Open a work log for `user_id`. One open log per user.
    pub async fn clock_in(
        &self,
        user_id: UserId,
        at: NaiveDateTime,
        batch_id: Option<BatchId>,
    ) -> ServiceResult<WorkLog> {
        let user = self
            .users
            .get_user(user_id)
            .await?
            .ok_or_else(|| ServiceError::not_found(format!("user {user_id}")))?;
        if !user.is_active() {
            return Err(DomainError::invariant("user is suspended").into());
        }
        if self.logs.find_open(user_id).await?.is_some() {
            return Err(DomainError::conflict("already clocked in").into());
        }

        let log = WorkLog::clock_in(user_id, at, batch_id);
        self.logs.insert(&log).await?;
        info!(user_id = %user_id, work_log_id = %log.id, date = %log.date, "clocked in");
        Ok(log)
    }

    /// Close the user's open log and compute hours.
    pub async fn clock_out(&self, user_id: UserId, at: NaiveDateTime) -> ServiceResult<WorkLog> {
        let mut log = self
            .logs
            .find_open(user_id)
            .await?
            .ok_or_else(|| ServiceError::not_found(format!("open work log for user {user_id}")))?;

        log.clock_out(at, &self.policy)?;
        self.logs.update(&log).await?;
        info!(
            user_id = %user_id,
            work_log_id = %log.id,
            total_hours = log.total_hours,
            overtime_hours = log.overtime_hours,
            "clocked out"
        );
        Ok(log)
    }

    pub async fn list(&self, from: NaiveDate, to: NaiveDate, user_id: Option<UserId>) -> ServiceResult<Vec<WorkLog>> {
        let period = Period::new(from, to)?;
        Ok(self.logs.list_between(period.from, period.to, user_id).await?)
    }

    /// One absence signal per active user with no log dated `date`.
    ///
    /// Running twice for the same date signals twice.
    pub async fn sweep_absences(&self, date: NaiveDate, now: DateTime<Utc>) -> ServiceResult<AbsenceSweep> {
        let active = self.users.active_user_ids().await?;
        let logs = self.logs.list_between(date, date, None).await?;
        let absences = detect_absences(date, &active, &logs, now);

        self.publish(absences.iter().cloned().map(Signal::from));
        info!(date = %date, checked = active.len(), absent = absences.len(), "absence sweep finished");
        Ok(AbsenceSweep {
            date,
            checked: active.len(),
            absences,
        })
    }

    /// Per-user overtime signals for `period`, plus one summary when anyone was flagged.
    pub async fn sweep_overtime(&self, period: Period, now: DateTime<Utc>) -> ServiceResult<OvertimeSweep> {
        let logs = self.logs.list_between(period.from, period.to, None).await?;
        let (flagged, summary) = detect_overtime(period, &logs, &self.policy, now);

        self.publish(
            flagged
                .iter()
                .cloned()
                .map(Signal::from)
                .chain(summary.clone().map(Signal::from)),
        );
        info!(
            from = %period.from,
            to = %period.to,
            flagged = flagged.len(),
            "overtime sweep finished"
        );
        Ok(OvertimeSweep {
            period,
            flagged,
            summary,
        })
    }

    fn publish(&self, signals: impl Iterator<Item = Signal>) {
        for signal in signals {
            if let Err(e) = self.bus.publish(signal) {
                warn!(error = ?e, "failed to publish workforce signal");
            }
        }
    }
}
