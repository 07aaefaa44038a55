use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Attendance figures for one employee and month as supplied by the
/// attendance system. Absent days are never supplied; they are derived.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttendanceRecord {
    pub employee_id: i64,
    pub month: u32,
    pub year: i32,
    pub total_working_days: u32,
    pub present_days: u32,
    pub leave_days: u32,
}

/// Attendance embedded in a payroll.
///
/// `absent_days` is the residual `total - present - leave`, floored at zero,
/// so the three counts can exceed the total when rest days were worked.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttendanceSummary {
    pub total_working_days: u32,
    pub present_days: u32,
    pub absent_days: u32,
    pub leave_days: u32,
    pub daily_rate: Decimal,
}
