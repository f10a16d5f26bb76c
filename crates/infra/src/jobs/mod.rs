//! Scheduled background jobs.
//!
//! - absence sweep for the previous day
//! - overtime sweep over the previous seven days
//! - low-stock scan
//! - expired-notification purge
//!
//! Schedules come from [`JobsConfig`]. There is no cross-process lock: run one
//! scheduler per deployment.

use chrono::{DateTime, Days, NaiveDate, Utc};

use stockline_core::DomainError;
use stockline_workforce::Period;

use crate::config::JobsConfig;
use crate::services::{ServiceError, ServiceResult, Services};

pub mod scheduler;

pub use scheduler::{JobStats, Scheduler, SchedulerError, SchedulerHandle};

pub const ABSENCE_SWEEP: &str = "absence_sweep";
pub const OVERTIME_SWEEP: &str = "overtime_sweep";
pub const LOW_STOCK_SCAN: &str = "low_stock_scan";
pub const PURGE_EXPIRED: &str = "purge_expired";

/// Days covered by the scheduled overtime sweep.
pub const OVERTIME_SWEEP_DAYS: u32 = 7;

/// The day before `now`.
pub fn previous_day(now: DateTime<Utc>) -> ServiceResult<NaiveDate> {
    now.date_naive()
        .checked_sub_days(Days::new(1))
        .ok_or_else(|| DomainError::validation("date out of range").into())
}

/// The standard job set wired to `services`.
pub fn standard_schedule(cfg: &JobsConfig, services: &Services) -> Result<Scheduler, SchedulerError> {
    let mut scheduler = Scheduler::new();

    let workforce = services.workforce.clone();
    scheduler.add(ABSENCE_SWEEP, &cfg.absence_sweep, move |now| {
        let workforce = workforce.clone();
        async move {
            let date = previous_day(now)?;
            let sweep = workforce.sweep_absences(date, now).await?;
            Ok::<_, ServiceError>(format!("{} absent of {} on {}", sweep.absences.len(), sweep.checked, date))
        }
    })?;

    let workforce = services.workforce.clone();
    scheduler.add(OVERTIME_SWEEP, &cfg.overtime_sweep, move |now| {
        let workforce = workforce.clone();
        async move {
            let period = Period::ending_on(previous_day(now)?, OVERTIME_SWEEP_DAYS)?;
            let sweep = workforce.sweep_overtime(period, now).await?;
            Ok::<_, ServiceError>(format!(
                "{} flagged between {} and {}",
                sweep.flagged.len(),
                period.from,
                period.to
            ))
        }
    })?;

    let scan = services.low_stock_scan.clone();
    scheduler.add(LOW_STOCK_SCAN, &cfg.low_stock_scan, move |now| {
        let scan = scan.clone();
        async move {
            let published = scan.run(now).await?;
            Ok::<_, ServiceError>(format!("{published} low-stock signal(s)"))
        }
    })?;

    let dispatcher = services.dispatcher.clone();
    scheduler.add(PURGE_EXPIRED, &cfg.purge_expired, move |now| {
        let dispatcher = dispatcher.clone();
        async move {
            let removed = dispatcher.purge_expired(now).await?;
            Ok::<_, ServiceError>(format!("{removed} expired notification(s) removed"))
        }
    })?;

    Ok(scheduler)
}

#[cfg(test)]
mod tests {
    use super::*;

    use chrono::TimeZone;

    use crate::config::AppConfig;
    use crate::services::Repositories;

    #[test]
    fn previous_day_crosses_month_boundaries() {
        let now = Utc.with_ymd_and_hms(2025, 3, 1, 0, 5, 0).unwrap();
        assert_eq!(previous_day(now).unwrap(), NaiveDate::from_ymd_opt(2025, 2, 28).unwrap());
    }

    #[tokio::test]
    async fn standard_schedule_registers_all_jobs() {
        let cfg = AppConfig::default();
        let services = Services::build(Repositories::in_memory(), &cfg);
        let scheduler = standard_schedule(&cfg.jobs, &services).unwrap();
        assert_eq!(
            scheduler.job_names(),
            vec![ABSENCE_SWEEP, OVERTIME_SWEEP, LOW_STOCK_SCAN, PURGE_EXPIRED]
        );
    }

    #[tokio::test]
    async fn bad_expression_is_reported_with_job_name() {
        let mut cfg = AppConfig::default();
        cfg.jobs.low_stock_scan = "whenever".into();
        let services = Services::build(Repositories::in_memory(), &cfg);
        match standard_schedule(&cfg.jobs, &services) {
            Err(SchedulerError::InvalidSchedule { job, .. }) => assert_eq!(job, LOW_STOCK_SCAN),
            Err(other) => panic!("unexpected error: {other}"),
            Ok(_) => panic!("expected an invalid schedule"),
        }
    }
}
