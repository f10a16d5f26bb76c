//! Absence and overtime detection.
//!
//! Both detectors are pure: callers load active users and work logs, run the
//! detection, then publish the returned signals. Nothing here deduplicates;
//! sweeping the same date twice yields the same signals twice.

use std::collections::{BTreeMap, HashSet};

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use stockline_core::{DomainError, DomainResult, UserId};
use stockline_events::Event;

use crate::policy::{OvertimePolicy, round2};
use crate::worklog::WorkLog;

/// Inclusive date range covered by an overtime sweep.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Period {
    pub from: NaiveDate,
    pub to: NaiveDate,
}

impl Period {
    pub fn new(from: NaiveDate, to: NaiveDate) -> DomainResult<Self> {
        if to < from {
            return Err(DomainError::validation("period end is before its start"));
        }
        Ok(Self { from, to })
    }

    /// The `days` days ending on (and including) `last`.
    pub fn ending_on(last: NaiveDate, days: u32) -> DomainResult<Self> {
        if days == 0 {
            return Err(DomainError::validation("period must cover at least one day"));
        }
        let from = last
            .checked_sub_days(chrono::Days::new(u64::from(days - 1)))
            .ok_or_else(|| DomainError::validation("period start out of range"))?;
        Self::new(from, last)
    }

    pub fn days(&self) -> i64 {
        (self.to - self.from).num_days() + 1
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        self.from <= date && date <= self.to
    }
}

/// Signal: an active user has no work log for `date`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AbsenceDetected {
    pub user_id: UserId,
    pub date: NaiveDate,
    pub occurred_at: DateTime<Utc>,
}

impl Event for AbsenceDetected {
    fn event_type(&self) -> &'static str {
        "workforce.absence_detected"
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        self.occurred_at
    }
}

/// Signal: a user's overtime over `period` exceeded the alert threshold.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OvertimeDetected {
    pub user_id: UserId,
    pub period: Period,
    pub overtime_hours: f64,
    pub threshold_hours: f64,
    pub occurred_at: DateTime<Utc>,
}

impl Event for OvertimeDetected {
    fn event_type(&self) -> &'static str {
        "workforce.overtime_detected"
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        self.occurred_at
    }
}

/// Aggregate signal for one overtime sweep.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OvertimeSummary {
    pub period: Period,
    pub users: usize,
    pub total_overtime_hours: f64,
    pub occurred_at: DateTime<Utc>,
}

impl Event for OvertimeSummary {
    fn event_type(&self) -> &'static str {
        "workforce.overtime_summary"
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        self.occurred_at
    }
}

/// Every active user without a work log dated `date`.
///
/// Output follows the order of `active_users`.
pub fn detect_absences(
    date: NaiveDate,
    active_users: &[UserId],
    logs: &[WorkLog],
    now: DateTime<Utc>,
) -> Vec<AbsenceDetected> {
    let present: HashSet<UserId> = logs
        .iter()
        .filter(|log| log.date == date)
        .map(|log| log.user_id)
        .collect();

    active_users
        .iter()
        .filter(|user| !present.contains(user))
        .map(|&user_id| AbsenceDetected {
            user_id,
            date,
            occurred_at: now,
        })
        .collect()
}

/// Sum closed-log overtime per user over `period` and flag users above the
/// policy threshold. The summary is `None` when nobody was flagged.
pub fn detect_overtime(
    period: Period,
    logs: &[WorkLog],
    policy: &OvertimePolicy,
    now: DateTime<Utc>,
) -> (Vec<OvertimeDetected>, Option<OvertimeSummary>) {
    let mut per_user: BTreeMap<UserId, f64> = BTreeMap::new();
    for log in logs.iter().filter(|log| period.contains(log.date)) {
        if let Some(hours) = log.overtime_hours {
            *per_user.entry(log.user_id).or_default() += hours;
        }
    }

    let threshold = policy.alert_threshold(period.days());
    let flagged: Vec<OvertimeDetected> = per_user
        .into_iter()
        .map(|(user_id, hours)| (user_id, round2(hours)))
        .filter(|&(_, hours)| hours > threshold)
        .map(|(user_id, overtime_hours)| OvertimeDetected {
            user_id,
            period,
            overtime_hours,
            threshold_hours: threshold,
            occurred_at: now,
        })
        .collect();

    let summary = (!flagged.is_empty()).then(|| OvertimeSummary {
        period,
        users: flagged.len(),
        total_overtime_hours: round2(flagged.iter().map(|s| s.overtime_hours).sum()),
        occurred_at: now,
    });

    (flagged, summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDateTime;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, d).unwrap()
    }

    fn at(d: u32, h: u32) -> NaiveDateTime {
        day(d).and_hms_opt(h, 0, 0).unwrap()
    }

    fn worked(user: UserId, d: u32, from: u32, to: u32) -> WorkLog {
        let mut log = WorkLog::clock_in(user, at(d, from), None);
        log.clock_out(at(d, to), &OvertimePolicy::default()).unwrap();
        log
    }

    #[test]
    fn user_without_log_is_absent_every_time() {
        let a = UserId::new();
        let b = UserId::new();
        let logs = vec![worked(b, 10, 8, 16)];
        let now = Utc::now();

        let first = detect_absences(day(10), &[a, b], &logs, now);
        let second = detect_absences(day(10), &[a, b], &logs, now);

        assert_eq!(first.len(), 1);
        assert_eq!(first[0].user_id, a);
        assert_eq!(first[0].date, day(10));
        assert_eq!(first, second);
    }

    #[test]
    fn open_log_counts_as_present() {
        let a = UserId::new();
        let logs = vec![WorkLog::clock_in(a, at(10, 8), None)];
        assert!(detect_absences(day(10), &[a], &logs, Utc::now()).is_empty());
    }

    #[test]
    fn log_on_another_day_does_not_count() {
        let a = UserId::new();
        let logs = vec![worked(a, 9, 8, 16)];
        assert_eq!(detect_absences(day(10), &[a], &logs, Utc::now()).len(), 1);
    }

    #[test]
    fn overtime_flags_users_above_scaled_threshold() {
        let heavy = UserId::new();
        let light = UserId::new();
        let logs = vec![
            // 3 days of 12h shifts: 12h overtime against a 6h threshold.
            worked(heavy, 8, 6, 18),
            worked(heavy, 9, 6, 18),
            worked(heavy, 10, 6, 18),
            worked(light, 9, 8, 17),
            // Outside the period.
            worked(light, 1, 0, 23),
        ];
        let period = Period::new(day(8), day(10)).unwrap();

        let (signals, summary) = detect_overtime(period, &logs, &OvertimePolicy::default(), Utc::now());

        assert_eq!(signals.len(), 1);
        assert_eq!(signals[0].user_id, heavy);
        assert_eq!(signals[0].overtime_hours, 12.0);
        assert_eq!(signals[0].threshold_hours, 6.0);

        let summary = summary.unwrap();
        assert_eq!(summary.users, 1);
        assert_eq!(summary.total_overtime_hours, 12.0);
    }

    #[test]
    fn no_summary_when_nobody_exceeds() {
        let logs = vec![worked(UserId::new(), 10, 8, 16)];
        let period = Period::new(day(10), day(10)).unwrap();
        let (signals, summary) = detect_overtime(period, &logs, &OvertimePolicy::default(), Utc::now());
        assert!(signals.is_empty());
        assert!(summary.is_none());
    }

    #[test]
    fn period_helpers() {
        let p = Period::ending_on(day(10), 7).unwrap();
        assert_eq!(p.from, day(4));
        assert_eq!(p.days(), 7);
        assert!(p.contains(day(4)) && p.contains(day(10)));
        assert!(!p.contains(day(11)));
        assert!(Period::new(day(10), day(9)).is_err());
        assert!(Period::ending_on(day(10), 0).is_err());
    }

    #[cfg(test)]
    mod proptest_tests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            /// Property: absences plus present users account for every active user.
            #[test]
            fn absences_partition_active_users(present_mask in proptest::collection::vec(any::<bool>(), 0..20)) {
                let users: Vec<UserId> = present_mask.iter().map(|_| UserId::new()).collect();
                let logs: Vec<WorkLog> = users
                    .iter()
                    .zip(&present_mask)
                    .filter(|(_, present)| **present)
                    .map(|(u, _)| WorkLog::clock_in(*u, at(10, 8), None))
                    .collect();

                let absent = detect_absences(day(10), &users, &logs, Utc::now());
                prop_assert_eq!(absent.len() + logs.len(), users.len());
            }
        }
    }
}
