use chrono::{NaiveDate, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use super::{PayrollService, ServiceError};
use crate::calculations::{LoanError, PaymentOutcome, apply_payment, compute_schedule, mark_overdue};
use crate::models::{Loan, LoanStatus, LoanType, NewLoan};

const MIN_PRINCIPAL: Decimal = dec!(1000);
const MAX_PRINCIPAL: Decimal = dec!(10000000);
const MAX_INTEREST_RATE: Decimal = dec!(100);
const MAX_TERM_MONTHS: u32 = 120;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoanSummaryLine {
    pub loan_id: i64,
    pub loan_type: LoanType,
    pub status: LoanStatus,
    pub principal: Decimal,
    pub monthly_installment: Decimal,
    pub outstanding_balance: Decimal,
    pub total_paid: Decimal,
    pub progress_percentage: Decimal,
    pub remaining_installments: usize,
    pub next_due_date: Option<NaiveDate>,
    pub overdue_amount: Decimal,
}

impl From<&Loan> for LoanSummaryLine {
    fn from(loan: &Loan) -> Self {
        Self {
            loan_id: loan.id,
            loan_type: loan.loan_type,
            status: loan.status,
            principal: loan.principal,
            monthly_installment: loan.monthly_installment,
            outstanding_balance: loan.outstanding_balance,
            total_paid: loan.total_paid,
            progress_percentage: loan.progress_percentage(),
            remaining_installments: loan.remaining_installments(),
            next_due_date: loan.next_due_date(),
            overdue_amount: loan.overdue_amount(),
        }
    }
}

/// An employee's loans at a glance.
///
/// Outstanding and monthly totals only count loans that are still payable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoanSummary {
    pub employee_id: i64,
    pub total_loans: usize,
    pub active_loans: usize,
    pub total_outstanding: Decimal,
    pub total_monthly_deduction: Decimal,
    pub total_paid: Decimal,
    pub lines: Vec<LoanSummaryLine>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoanStatusCount {
    pub status: LoanStatus,
    pub count: usize,
    pub total_principal: Decimal,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoanStatistics {
    pub total_loans: usize,
    pub total_principal: Decimal,
    pub total_outstanding: Decimal,
    pub total_paid: Decimal,
    pub needs_review: usize,
    pub by_status: Vec<LoanStatusCount>,
}

impl PayrollService {
    /// Validates an application and stores it as a Pending loan.
    ///
    /// The schedule is computed from the application date.
    pub async fn apply_for_loan(
        &self,
        application: NewLoan,
    ) -> Result<Loan, ServiceError> {
        validate_application(&application)?;

        let employee = self.repo.get_employee(application.employee_id).await?;
        if !employee.is_active {
            return Err(LoanError::InvalidApplication(format!(
                "employee {} is not active",
                employee.id
            ))
            .into());
        }

        let schedule = compute_schedule(
            application.principal,
            application.annual_interest_rate_percent,
            application.term_months,
            application.application_date,
        )?;

        let loan = self.repo.create_loan(application, schedule).await?;
        info!(
            loan_id = loan.id,
            employee_id = loan.employee_id,
            principal = %loan.principal,
            monthly_installment = %loan.monthly_installment,
            "loan application stored"
        );
        Ok(loan)
    }

    /// Replaces the terms of a Pending loan and recomputes its schedule.
    ///
    /// The loan stays with its employee; `revised.employee_id` must match.
    pub async fn update_loan(
        &self,
        loan_id: i64,
        revised: NewLoan,
    ) -> Result<Loan, ServiceError> {
        validate_application(&revised)?;

        let mut loan = self.pending_loan(loan_id).await?;
        if revised.employee_id != loan.employee_id {
            return Err(LoanError::InvalidApplication(format!(
                "loan {loan_id} belongs to employee {}",
                loan.employee_id
            ))
            .into());
        }

        let schedule = compute_schedule(
            revised.principal,
            revised.annual_interest_rate_percent,
            revised.term_months,
            revised.application_date,
        )?;

        loan.loan_type = revised.loan_type;
        loan.purpose = revised.purpose;
        loan.principal = revised.principal;
        loan.annual_interest_rate_percent = revised.annual_interest_rate_percent;
        loan.term_months = revised.term_months;
        loan.application_date = revised.application_date;
        loan.monthly_installment = schedule.monthly_installment;
        loan.total_payable = schedule.total_payable;
        loan.outstanding_balance = schedule.total_payable;
        loan.schedule = schedule.installments;
        loan.updated_at = Utc::now();
        loan.version = self.repo.save_loan(&loan).await?;

        info!(
            loan_id,
            principal = %loan.principal,
            monthly_installment = %loan.monthly_installment,
            "loan terms revised"
        );
        Ok(loan)
    }

    /// Deletes a Pending loan with its schedule.
    pub async fn delete_loan(
        &self,
        loan_id: i64,
    ) -> Result<(), ServiceError> {
        self.pending_loan(loan_id).await?;
        self.repo.delete_loan(loan_id).await?;
        info!(loan_id, "loan deleted");
        Ok(())
    }

    async fn pending_loan(
        &self,
        loan_id: i64,
    ) -> Result<Loan, ServiceError> {
        let loan = self.repo.get_loan(loan_id).await?;
        if loan.status != LoanStatus::Pending {
            return Err(LoanError::NotPending {
                loan_id,
                status: loan.status,
            }
            .into());
        }
        Ok(loan)
    }

    pub async fn approve_loan(
        &self,
        loan_id: i64,
        approved_on: NaiveDate,
    ) -> Result<Loan, ServiceError> {
        self.transition_loan(loan_id, LoanStatus::Pending, LoanStatus::Approved, |loan| {
            loan.approval_date = Some(approved_on);
        })
        .await
    }

    pub async fn reject_loan(
        &self,
        loan_id: i64,
        reason: &str,
    ) -> Result<Loan, ServiceError> {
        self.transition_loan(loan_id, LoanStatus::Pending, LoanStatus::Rejected, |loan| {
            loan.rejection_reason = Some(reason.to_string());
        })
        .await
    }

    pub async fn disburse_loan(
        &self,
        loan_id: i64,
        disbursed_on: NaiveDate,
    ) -> Result<Loan, ServiceError> {
        self.transition_loan(loan_id, LoanStatus::Approved, LoanStatus::Disbursed, |loan| {
            loan.disbursement_date = Some(disbursed_on);
        })
        .await
    }

    async fn transition_loan(
        &self,
        loan_id: i64,
        from: LoanStatus,
        to: LoanStatus,
        update: impl FnOnce(&mut Loan),
    ) -> Result<Loan, ServiceError> {
        let mut loan = self.repo.get_loan(loan_id).await?;
        if loan.status != from {
            return Err(LoanError::InvalidTransition {
                loan_id,
                from: loan.status,
                to,
            }
            .into());
        }

        loan.status = to;
        update(&mut loan);
        loan.updated_at = Utc::now();
        loan.version = self.repo.save_loan(&loan).await?;

        info!(loan_id, from = from.as_str(), to = to.as_str(), "loan status changed");
        Ok(loan)
    }

    /// Applies a direct payment outside payroll.
    ///
    /// Serialized with payroll settlement for the same employee.
    pub async fn record_loan_payment(
        &self,
        loan_id: i64,
        amount: Decimal,
        paid_on: NaiveDate,
    ) -> Result<PaymentOutcome, ServiceError> {
        let employee_id = self.repo.get_loan(loan_id).await?.employee_id;
        let _guard = self.locks.lock(employee_id).await;

        let mut loan = self.repo.get_loan(loan_id).await?;
        let outcome = apply_payment(&mut loan, amount, paid_on)?;
        loan.updated_at = Utc::now();
        self.repo.save_loan(&loan).await?;

        if outcome.needs_review {
            warn!(loan_id, "loan flagged for review after payment");
        }
        info!(
            loan_id,
            applied = %outcome.applied,
            outstanding = %outcome.outstanding_balance,
            status = outcome.status.as_str(),
            "loan payment recorded"
        );
        Ok(outcome)
    }

    /// Flags open installments due before `as_of` as overdue.
    ///
    /// Returns the number of installments changed across all loans.
    pub async fn mark_overdue_loans(
        &self,
        as_of: NaiveDate,
    ) -> Result<usize, ServiceError> {
        let mut changed = 0;

        for listed in self.repo.list_loans(None).await? {
            if !listed.status.is_payable() {
                continue;
            }
            let _guard = self.locks.lock(listed.employee_id).await;
            let mut loan = self.repo.get_loan(listed.id).await?;
            let count = mark_overdue(&mut loan, as_of);
            if count > 0 {
                loan.updated_at = Utc::now();
                self.repo.save_loan(&loan).await?;
                changed += count;
            }
        }

        info!(%as_of, changed, "marked overdue installments");
        Ok(changed)
    }

    pub async fn loan_summary(
        &self,
        employee_id: i64,
    ) -> Result<LoanSummary, ServiceError> {
        let loans = self.repo.list_employee_loans(employee_id).await?;
        let payable: Vec<&Loan> = loans.iter().filter(|l| l.status.is_payable()).collect();

        Ok(LoanSummary {
            employee_id,
            total_loans: loans.len(),
            active_loans: payable.len(),
            total_outstanding: payable.iter().map(|l| l.outstanding_balance).sum(),
            total_monthly_deduction: payable.iter().map(|l| l.monthly_installment).sum(),
            total_paid: loans.iter().map(|l| l.total_paid).sum(),
            lines: loans.iter().map(LoanSummaryLine::from).collect(),
        })
    }

    pub async fn loan_statistics(&self) -> Result<LoanStatistics, ServiceError> {
        let loans = self.repo.list_loans(None).await?;

        let by_status = LoanStatus::ALL
            .iter()
            .map(|&status| {
                let matching = loans.iter().filter(|l| l.status == status);
                LoanStatusCount {
                    status,
                    count: matching.clone().count(),
                    total_principal: matching.map(|l| l.principal).sum(),
                }
            })
            .collect();

        Ok(LoanStatistics {
            total_loans: loans.len(),
            total_principal: loans.iter().map(|l| l.principal).sum(),
            total_outstanding: loans
                .iter()
                .filter(|l| l.status.is_payable())
                .map(|l| l.outstanding_balance)
                .sum(),
            total_paid: loans.iter().map(|l| l.total_paid).sum(),
            needs_review: loans.iter().filter(|l| l.needs_review).count(),
            by_status,
        })
    }
}

fn validate_application(application: &NewLoan) -> Result<(), LoanError> {
    if application.principal < MIN_PRINCIPAL || application.principal > MAX_PRINCIPAL {
        return Err(LoanError::InvalidApplication(format!(
            "principal {} outside {MIN_PRINCIPAL} - {MAX_PRINCIPAL}",
            application.principal
        )));
    }
    let rate = application.annual_interest_rate_percent;
    if rate < Decimal::ZERO || rate > MAX_INTEREST_RATE {
        return Err(LoanError::InvalidApplication(format!(
            "interest rate {rate}% outside 0 - {MAX_INTEREST_RATE}%"
        )));
    }
    if application.term_months == 0 || application.term_months > MAX_TERM_MONTHS {
        return Err(LoanError::InvalidApplication(format!(
            "term {} months outside 1 - {MAX_TERM_MONTHS}",
            application.term_months
        )));
    }
    if application.purpose.trim().is_empty() {
        return Err(LoanError::InvalidApplication("purpose is required".to_string()));
    }
    Ok(())
}
