use serde::{Deserialize, Serialize};

/// Overtime rules.
///
/// - A day's overtime is whatever exceeds `standard_shift_hours`.
/// - A sweep over a period alerts on users whose summed overtime exceeds
///   `alert_hours_per_day` times the number of days in the period.
#[derive(Debug, Copy, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OvertimePolicy {
    pub standard_shift_hours: f64,
    pub alert_hours_per_day: f64,
}

impl Default for OvertimePolicy {
    fn default() -> Self {
        Self {
            standard_shift_hours: 8.0,
            alert_hours_per_day: 2.0,
        }
    }
}

impl OvertimePolicy {
    pub fn overtime_for(&self, worked_hours: f64) -> f64 {
        round2((worked_hours - self.standard_shift_hours).max(0.0))
    }

    pub fn alert_threshold(&self, days: i64) -> f64 {
        round2(self.alert_hours_per_day * days.max(1) as f64)
    }
}

/// Round to two decimals (hours are reported to the hundredth).
pub(crate) fn round2(hours: f64) -> f64 {
    (hours * 100.0).round() / 100.0
}
