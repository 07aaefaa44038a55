//! Orchestration over the repository: loads inputs, runs the calculations
//! and persists the results.

mod loans;
mod locks;
mod payroll;
mod tax_tables;

use std::sync::Arc;

use thiserror::Error;

use crate::calculations::{AttendanceError, LoanError, PayrollError, TaxError};
use crate::db::{PayrollRepository, RepositoryError};
use crate::models::PayrollPolicy;

pub use loans::{LoanStatistics, LoanStatusCount, LoanSummary, LoanSummaryLine};
pub use locks::EmployeeLocks;
pub use payroll::{
    AllowanceComparison, AllowanceComparisonLine, BatchFailure, BatchReport, BatchTotals,
    GeneratedPayroll, MonthlyTaxSummary, PaidPayroll, SkippedEmployee, StatusCount,
};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ServiceError {
    #[error(transparent)]
    Tax(#[from] TaxError),

    #[error(transparent)]
    Attendance(#[from] AttendanceError),

    #[error(transparent)]
    Loan(#[from] LoanError),

    #[error(transparent)]
    Payroll(PayrollError),

    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

impl From<PayrollError> for ServiceError {
    fn from(err: PayrollError) -> Self {
        match err {
            PayrollError::Tax(err) => Self::Tax(err),
            PayrollError::Attendance(err) => Self::Attendance(err),
            other => Self::Payroll(other),
        }
    }
}

/// Payroll and loan operations over one repository and policy.
pub struct PayrollService {
    repo: Arc<dyn PayrollRepository>,
    policy: PayrollPolicy,
    locks: EmployeeLocks,
}

impl PayrollService {
    pub fn new(
        repo: Arc<dyn PayrollRepository>,
        policy: PayrollPolicy,
    ) -> Self {
        Self {
            repo,
            policy,
            locks: EmployeeLocks::new(),
        }
    }

    pub fn policy(&self) -> &PayrollPolicy {
        &self.policy
    }

    pub fn repository(&self) -> &Arc<dyn PayrollRepository> {
        &self.repo
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn payroll_errors_unwrap_calculation_causes() {
        let tax: ServiceError = PayrollError::Tax(TaxError::EmptyTable).into();
        let attendance: ServiceError = PayrollError::Attendance(AttendanceError::InvalidWorkingDays).into();
        let payroll: ServiceError = PayrollError::InactiveEmployee(3).into();

        assert_eq!(tax, ServiceError::Tax(TaxError::EmptyTable));
        assert_eq!(attendance, ServiceError::Attendance(AttendanceError::InvalidWorkingDays));
        assert_eq!(payroll, ServiceError::Payroll(PayrollError::InactiveEmployee(3)));
    }
}
