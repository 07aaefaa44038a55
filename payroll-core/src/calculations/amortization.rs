//! Loan amortization schedules and payment application.
//!
//! Installments are computed with the annuity formula
//!
//! ```text
//! installment = principal * r * (1 + r)^n / ((1 + r)^n - 1),  r = rate / 100 / 12
//! ```
//!
//! or `principal / n` for interest-free loans, rounded to the cent. Interest
//! is rounded per period and the final period takes whatever principal is
//! left plus its interest, so the principal portions always sum to the
//! principal and no portion is negative.
//!
//! Payments walk the schedule strictly in installment order. After every
//! application the loan's balances are cross-checked against its schedule;
//! a mismatch is logged and flags the loan for review, it is never corrected
//! automatically.

use chrono::{Months, NaiveDate};
use rust_decimal::{Decimal, MathematicalOps};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::error;

use crate::calculations::common::{MONTHS_PER_YEAR, max, round_half_up};
use crate::{InstallmentStatus, Loan, LoanInstallment, LoanStatus};

/// Largest tolerated difference between a loan's totals and its schedule.
pub const CONSISTENCY_TOLERANCE: Decimal = Decimal::from_parts(1, 0, 0, false, 2);

#[derive(Debug, Error, PartialEq, Eq)]
pub enum LoanError {
    #[error("loan principal must be positive, got {0}")]
    NonPositivePrincipal(Decimal),

    #[error("loan term must be at least one month, got {0}")]
    InvalidTerm(u32),

    #[error("interest rate must not be negative, got {0}")]
    InvalidInterestRate(Decimal),

    #[error("payment amount must be positive, got {0}")]
    NonPositivePayment(Decimal),

    #[error("loan {loan_id} does not accept payments in status {status:?}")]
    LoanNotPayable { loan_id: i64, status: LoanStatus },

    #[error("loan {loan_id} cannot move from {from:?} to {to:?}")]
    InvalidTransition {
        loan_id: i64,
        from: LoanStatus,
        to: LoanStatus,
    },

    #[error("loan {loan_id} is {status:?}; only Pending loans can be edited or deleted")]
    NotPending { loan_id: i64, status: LoanStatus },

    #[error("invalid loan application: {0}")]
    InvalidApplication(String),

    #[error("due date for installment {0} is out of range")]
    DueDateOutOfRange(u32),

    #[error("installment for {annual_rate_percent}% over {term_months} months is out of range")]
    InstallmentOverflow {
        annual_rate_percent: Decimal,
        term_months: u32,
    },
}

/// The repayment terms and schedule computed for a new loan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AmortizationSchedule {
    pub monthly_installment: Decimal,
    /// Sum of all installment amounts.
    pub total_payable: Decimal,
    pub installments: Vec<LoanInstallment>,
}

/// What a single payment did to a loan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentOutcome {
    pub applied: Decimal,
    /// Part of the payment beyond the outstanding balance.
    pub unapplied: Decimal,
    pub outstanding_balance: Decimal,
    pub status: LoanStatus,
    pub needs_review: bool,
}

/// Builds the amortization schedule for a loan starting on `start_date`.
///
/// Installment `k` falls due `k` months after `start_date`. All
/// installments start out `Pending`.
///
/// # Errors
///
/// Returns [`LoanError`] for a non-positive principal, a zero term, a
/// negative interest rate, or terms whose installment does not fit a
/// [`Decimal`].
pub fn compute_schedule(
    principal: Decimal,
    annual_rate_percent: Decimal,
    term_months: u32,
    start_date: NaiveDate,
) -> Result<AmortizationSchedule, LoanError> {
    if principal <= Decimal::ZERO {
        return Err(LoanError::NonPositivePrincipal(principal));
    }
    if term_months == 0 {
        return Err(LoanError::InvalidTerm(term_months));
    }
    if annual_rate_percent < Decimal::ZERO {
        return Err(LoanError::InvalidInterestRate(annual_rate_percent));
    }

    let monthly_rate = annual_rate_percent / Decimal::ONE_HUNDRED / MONTHS_PER_YEAR;
    let monthly_installment = installment_amount(principal, monthly_rate, term_months).ok_or(
        LoanError::InstallmentOverflow {
            annual_rate_percent,
            term_months,
        },
    )?;

    let mut installments = Vec::with_capacity(term_months as usize);
    let mut balance = principal;

    for number in 1..=term_months {
        let due_date = start_date
            .checked_add_months(Months::new(number))
            .ok_or(LoanError::DueDateOutOfRange(number))?;

        let interest = round_half_up(balance * monthly_rate);
        let (amount, principal_portion, interest_portion) = if number == term_months {
            (balance + interest, balance, interest)
        } else {
            (monthly_installment, monthly_installment - interest, interest)
        };
        balance = max(balance - principal_portion, Decimal::ZERO);

        installments.push(LoanInstallment {
            installment_number: number,
            due_date,
            amount,
            principal_portion,
            interest_portion,
            running_balance: balance,
            status: InstallmentStatus::Pending,
            paid_amount: Decimal::ZERO,
            payment_date: None,
        });
    }

    let total_payable = installments.iter().map(|i| i.amount).sum();

    Ok(AmortizationSchedule {
        monthly_installment,
        total_payable,
        installments,
    })
}

fn installment_amount(
    principal: Decimal,
    monthly_rate: Decimal,
    term_months: u32,
) -> Option<Decimal> {
    if monthly_rate.is_zero() {
        return Some(round_half_up(principal / Decimal::from(term_months)));
    }

    let growth = (Decimal::ONE + monthly_rate).checked_powu(u64::from(term_months))?;
    let numerator = principal.checked_mul(monthly_rate)?.checked_mul(growth)?;
    let installment = numerator.checked_div(growth.checked_sub(Decimal::ONE)?)?;
    Some(round_half_up(installment))
}

/// Applies a payment to a loan, walking its schedule in order.
///
/// # Errors
///
/// [`LoanError::NonPositivePayment`] for `amount <= 0` and
/// [`LoanError::LoanNotPayable`] when the loan is not Active, Disbursed or
/// Approved. A rejected payment leaves the loan untouched.
pub fn apply_payment(
    loan: &mut Loan,
    amount: Decimal,
    paid_on: NaiveDate,
) -> Result<PaymentOutcome, LoanError> {
    if amount <= Decimal::ZERO {
        return Err(LoanError::NonPositivePayment(amount));
    }
    if !loan.status.is_payable() {
        return Err(LoanError::LoanNotPayable {
            loan_id: loan.id,
            status: loan.status,
        });
    }

    let payable = max(loan.total_payable - loan.total_paid, Decimal::ZERO);
    let mut remaining = amount.min(payable);

    for installment in loan.schedule.iter_mut().filter(|i| i.is_open()) {
        if remaining <= Decimal::ZERO {
            break;
        }
        let portion = remaining.min(installment.remaining_due());
        installment.paid_amount += portion;
        installment.payment_date = Some(paid_on);
        installment.status = if installment.paid_amount >= installment.amount {
            InstallmentStatus::Paid
        } else {
            InstallmentStatus::Partial
        };
        remaining -= portion;
    }

    if remaining > Decimal::ZERO && loan.schedule.iter().all(|i| !i.is_open()) {
        append_remainder_installment(loan, remaining, paid_on);
        remaining = Decimal::ZERO;
    }

    let applied = amount.min(payable) - remaining;
    loan.total_paid += applied;
    loan.outstanding_balance = loan.total_payable - loan.total_paid;

    if loan.status == LoanStatus::Disbursed && applied > Decimal::ZERO {
        loan.status = LoanStatus::Active;
    }
    if loan.outstanding_balance <= Decimal::ZERO {
        loan.status = LoanStatus::Completed;
        loan.completion_date = Some(paid_on);
    }

    if !is_consistent(loan) {
        loan.needs_review = true;
    }

    Ok(PaymentOutcome {
        applied,
        unapplied: amount - applied,
        outstanding_balance: loan.outstanding_balance,
        status: loan.status,
        needs_review: loan.needs_review,
    })
}

/// Appends a paid, interest-free installment for a balance the schedule no
/// longer covers.
fn append_remainder_installment(
    loan: &mut Loan,
    amount: Decimal,
    paid_on: NaiveDate,
) {
    let installment_number = loan
        .schedule
        .last()
        .map_or(1, |last| last.installment_number + 1);

    loan.schedule.push(LoanInstallment {
        installment_number,
        due_date: paid_on,
        amount,
        principal_portion: amount,
        interest_portion: Decimal::ZERO,
        running_balance: Decimal::ZERO,
        status: InstallmentStatus::Paid,
        paid_amount: amount,
        payment_date: Some(paid_on),
    });
}

/// Checks `sum(paid_amount) == total_paid` and
/// `total_payable - total_paid == outstanding_balance`, logging any mismatch.
pub fn is_consistent(loan: &Loan) -> bool {
    let scheduled_paid = loan.scheduled_paid_total();
    let expected_outstanding = loan.total_payable - loan.total_paid;

    let paid_drift = (scheduled_paid - loan.total_paid).abs();
    let balance_drift = (expected_outstanding - loan.outstanding_balance).abs();

    if paid_drift > CONSISTENCY_TOLERANCE || balance_drift > CONSISTENCY_TOLERANCE {
        error!(
            loan_id = loan.id,
            employee_id = loan.employee_id,
            %scheduled_paid,
            total_paid = %loan.total_paid,
            outstanding_balance = %loan.outstanding_balance,
            %expected_outstanding,
            "loan balances disagree with schedule"
        );
        return false;
    }

    true
}

/// Marks open installments due before `as_of` as overdue.
///
/// Returns the number of installments that changed.
pub fn mark_overdue(
    loan: &mut Loan,
    as_of: NaiveDate,
) -> usize {
    if !loan.status.is_payable() {
        return 0;
    }

    let mut changed = 0;
    for installment in loan.schedule.iter_mut() {
        let open = matches!(
            installment.status,
            InstallmentStatus::Pending | InstallmentStatus::Partial
        );
        if open && installment.due_date < as_of {
            installment.status = InstallmentStatus::Overdue;
            changed += 1;
        }
    }
    changed
}
