//! Pure payroll calculations.
//!
//! Nothing in this module touches storage; callers load the inputs, run a
//! calculation and persist the result.

pub mod amortization;
pub mod attendance;
pub mod common;
pub mod payroll;
pub mod settlement;
pub mod tax_slabs;

pub use amortization::{
    AmortizationSchedule, LoanError, PaymentOutcome, apply_payment, compute_schedule, mark_overdue,
};
pub use attendance::{AttendanceCalculator, AttendanceDeduction, AttendanceError};
pub use payroll::{PayrollCalculator, PayrollError};
pub use settlement::{SettlementLine, SettlementReport, SettlementSkip, allocate};
pub use tax_slabs::{TaxComputation, TaxError, TaxSlabResolver, validate_slabs};
