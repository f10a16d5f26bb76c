//! Workforce domain module: attendance (work logs), overtime policy, and the
//! absence/overtime detection used by the scheduled sweeps.
//!
//! Pure domain logic (no IO, no HTTP, no storage).

pub mod detector;
pub mod policy;
pub mod worklog;

pub use detector::{
    AbsenceDetected, OvertimeDetected, OvertimeSummary, Period, detect_absences, detect_overtime,
};
pub use policy::OvertimePolicy;
pub use worklog::WorkLog;
