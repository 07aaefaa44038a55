//! Attendance-based salary deductions.
//!
//! The daily rate is the gross salary spread over the month's working days.
//! Every absent or leave day is deducted at that rate, and the total is
//! rounded to a whole currency unit. Absent days are whatever the present
//! and leave days leave of the month, never less than zero.

use chrono::{Datelike, NaiveDate, Weekday};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::calculations::common::{round_half_up, round_whole};
use crate::{AttendanceRecord, AttendanceSummary, PayrollPolicy};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum AttendanceError {
    #[error("total working days must be greater than zero")]
    InvalidWorkingDays,

    #[error("invalid month {month} for year {year}")]
    InvalidMonth { year: i32, month: u32 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttendanceDeduction {
    /// Unrounded `gross / total_working_days`.
    pub daily_rate: Decimal,
    pub deduction: Decimal,
}

/// Computes working days and attendance deductions for one weekly rest day.
#[derive(Debug, Clone, Copy)]
pub struct AttendanceCalculator {
    weekly_rest_day: Weekday,
}

impl AttendanceCalculator {
    pub fn new(policy: &PayrollPolicy) -> Self {
        Self {
            weekly_rest_day: policy.weekly_rest_day,
        }
    }

    /// Calendar days in the month that are not the weekly rest day.
    pub fn working_days_in_month(
        &self,
        year: i32,
        month: u32,
    ) -> Result<u32, AttendanceError> {
        let first = NaiveDate::from_ymd_opt(year, month, 1)
            .ok_or(AttendanceError::InvalidMonth { year, month })?;

        let days = first
            .iter_days()
            .take_while(|day| day.month() == month)
            .filter(|day| day.weekday() != self.weekly_rest_day)
            .count();

        Ok(days as u32)
    }

    /// Deduction for absent and leave days against a gross salary.
    ///
    /// # Errors
    ///
    /// [`AttendanceError::InvalidWorkingDays`] when `total_working_days` is 0.
    pub fn compute_deduction(
        &self,
        gross_salary: Decimal,
        total_working_days: u32,
        absent_days: u32,
        leave_days: u32,
    ) -> Result<AttendanceDeduction, AttendanceError> {
        if total_working_days == 0 {
            return Err(AttendanceError::InvalidWorkingDays);
        }

        let daily_rate = gross_salary / Decimal::from(total_working_days);
        let deducted_days = Decimal::from(absent_days + leave_days);

        Ok(AttendanceDeduction {
            daily_rate,
            deduction: round_whole(deducted_days * daily_rate),
        })
    }

    /// Builds the payroll attendance summary, deriving absent days.
    pub fn summarize(
        &self,
        record: &AttendanceRecord,
        gross_salary: Decimal,
    ) -> Result<(AttendanceSummary, Decimal), AttendanceError> {
        self.summary_from_counts(
            gross_salary,
            record.total_working_days,
            record.present_days,
            record.leave_days,
        )
    }

    /// Full attendance over the calendar working days of the month.
    pub fn full_attendance(
        &self,
        year: i32,
        month: u32,
        gross_salary: Decimal,
    ) -> Result<(AttendanceSummary, Decimal), AttendanceError> {
        let total_working_days = self.working_days_in_month(year, month)?;
        self.summary_from_counts(gross_salary, total_working_days, total_working_days, 0)
    }

    /// Summary and deduction from raw day counts.
    pub fn summary_from_counts(
        &self,
        gross_salary: Decimal,
        total_working_days: u32,
        present_days: u32,
        leave_days: u32,
    ) -> Result<(AttendanceSummary, Decimal), AttendanceError> {
        // Days worked on the rest day can push present + leave past the total.
        let absent_days =
            total_working_days.saturating_sub(present_days.saturating_add(leave_days));

        let result =
            self.compute_deduction(gross_salary, total_working_days, absent_days, leave_days)?;

        let summary = AttendanceSummary {
            total_working_days,
            present_days,
            absent_days,
            leave_days,
            daily_rate: round_half_up(result.daily_rate),
        };

        Ok((summary, result.deduction))
    }
}
