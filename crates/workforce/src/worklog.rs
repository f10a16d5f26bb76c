use chrono::{Duration, NaiveDate, NaiveDateTime, NaiveTime};
use serde::{Deserialize, Serialize};

use stockline_core::{BatchId, DomainError, DomainResult, Entity, UserId, WorkLogId};

use crate::policy::{OvertimePolicy, round2};

/// Longest shift a single work log may cover.
const MAX_SHIFT_HOURS: i64 = 24;

/// An attendance record: created at clock-in, completed at clock-out.
///
/// Times are local business time. A log whose end time is earlier than its
/// start time crossed midnight.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkLog {
    pub id: WorkLogId,
    pub user_id: UserId,
    pub date: NaiveDate,
    pub start_time: NaiveTime,
    pub end_time: Option<NaiveTime>,
    pub total_hours: Option<f64>,
    pub overtime_hours: Option<f64>,
    pub batch_id: Option<BatchId>,
}

impl WorkLog {
    pub fn clock_in(user_id: UserId, at: NaiveDateTime, batch_id: Option<BatchId>) -> Self {
        Self {
            id: WorkLogId::new(),
            user_id,
            date: at.date(),
            start_time: at.time(),
            end_time: None,
            total_hours: None,
            overtime_hours: None,
            batch_id,
        }
    }

    pub fn is_open(&self) -> bool {
        self.end_time.is_none()
    }

    pub fn started_at(&self) -> NaiveDateTime {
        self.date.and_time(self.start_time)
    }

    /// Close the log and compute total and overtime hours.
    pub fn clock_out(&mut self, at: NaiveDateTime, policy: &OvertimePolicy) -> DomainResult<()> {
        if !self.is_open() {
            return Err(DomainError::conflict("work log already closed"));
        }

        let worked = at - self.started_at();
        if worked <= Duration::zero() {
            return Err(DomainError::validation("clock-out must be after clock-in"));
        }
        if worked > Duration::hours(MAX_SHIFT_HOURS) {
            return Err(DomainError::validation("a shift cannot exceed 24 hours"));
        }

        let total = round2(worked.num_seconds() as f64 / 3600.0);
        self.end_time = Some(at.time());
        self.total_hours = Some(total);
        self.overtime_hours = Some(policy.overtime_for(total));
        Ok(())
    }
}

impl Entity for WorkLog {
    type Id = WorkLogId;

    fn id(&self) -> Self::Id {
        self.id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(day: u32, h: u32, m: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 1, day)
            .unwrap()
            .and_hms_opt(h, m, 0)
            .unwrap()
    }

    #[test]
    fn ten_hour_shift_has_two_hours_overtime() {
        let mut log = WorkLog::clock_in(UserId::new(), at(10, 7, 0), None);
        log.clock_out(at(10, 17, 0), &OvertimePolicy::default()).unwrap();

        assert_eq!(log.total_hours, Some(10.0));
        assert_eq!(log.overtime_hours, Some(2.0));
        assert_eq!(log.end_time, NaiveTime::from_hms_opt(17, 0, 0));
    }

    #[test]
    fn overnight_shift_rolls_past_midnight() {
        let mut log = WorkLog::clock_in(UserId::new(), at(10, 22, 0), None);
        log.clock_out(at(11, 6, 30), &OvertimePolicy::default()).unwrap();

        assert_eq!(log.date, at(10, 0, 0).date());
        assert_eq!(log.total_hours, Some(8.5));
        assert_eq!(log.overtime_hours, Some(0.5));
    }

    #[test]
    fn clock_out_rejects_bad_times_and_double_close() {
        let policy = OvertimePolicy::default();
        let mut log = WorkLog::clock_in(UserId::new(), at(10, 8, 0), None);

        assert!(log.clock_out(at(10, 7, 0), &policy).is_err());
        assert!(log.clock_out(at(12, 9, 0), &policy).is_err());

        log.clock_out(at(10, 12, 0), &policy).unwrap();
        assert!(matches!(
            log.clock_out(at(10, 13, 0), &policy),
            Err(DomainError::Conflict(_))
        ));
    }

    #[cfg(test)]
    mod proptest_tests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            /// Property: overtime never exceeds total and is never negative.
            #[test]
            fn overtime_bounded_by_total(start_min in 0i64..1440, worked_min in 1i64..1440) {
                let start = at(10, 0, 0) + Duration::minutes(start_min);
                let mut log = WorkLog::clock_in(UserId::new(), start, None);
                log.clock_out(start + Duration::minutes(worked_min), &OvertimePolicy::default()).unwrap();

                let total = log.total_hours.unwrap();
                let overtime = log.overtime_hours.unwrap();
                prop_assert!(overtime >= 0.0);
                prop_assert!(overtime <= total);
            }
        }
    }
}
