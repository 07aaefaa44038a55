//! Splits a payroll's loan deduction across an employee's loans.
//!
//! Each payable loan receives a share proportional to its monthly
//! installment. Shares are taken as differences of rounded cumulative
//! targets, so none is negative and together they add up to exactly the
//! deduction; the last participating loan's target is the deduction itself.
//! Shares are then
//! applied through [`apply_payment`]; a loan that refuses its share is
//! reported and does not stop the others.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::calculations::amortization::apply_payment;
use crate::calculations::common::round_half_up;
use crate::{Loan, LoanStatus};

/// Why a settlement allocated nothing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SettlementSkip {
    NothingToAllocate,
    NoPayableLoans,
    /// Payable loans exist but their installments sum to zero.
    NoInstallmentBase,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SettlementLine {
    pub loan_id: i64,
    pub requested: Decimal,
    pub applied: Decimal,
    pub unapplied: Decimal,
    pub outstanding_balance: Decimal,
    pub status: LoanStatus,
    pub failure: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SettlementReport {
    pub total_deduction: Decimal,
    pub total_applied: Decimal,
    pub lines: Vec<SettlementLine>,
    pub skipped: Option<SettlementSkip>,
}

impl SettlementReport {
    fn skipped(
        total_deduction: Decimal,
        reason: SettlementSkip,
    ) -> Self {
        Self {
            total_deduction,
            total_applied: Decimal::ZERO,
            lines: Vec::new(),
            skipped: Some(reason),
        }
    }

    pub fn total_unapplied(&self) -> Decimal {
        self.total_deduction - self.total_applied
    }
}

/// Allocates `total_deduction` across the payable loans and applies it.
pub fn allocate(
    loans: &mut [Loan],
    total_deduction: Decimal,
    paid_on: NaiveDate,
) -> SettlementReport {
    if total_deduction <= Decimal::ZERO {
        return SettlementReport::skipped(total_deduction, SettlementSkip::NothingToAllocate);
    }

    let participants: Vec<usize> = loans
        .iter()
        .enumerate()
        .filter(|(_, loan)| loan.status.is_payable())
        .map(|(index, _)| index)
        .collect();

    if participants.is_empty() {
        return SettlementReport::skipped(total_deduction, SettlementSkip::NoPayableLoans);
    }

    let installment_base: Decimal = participants
        .iter()
        .map(|&index| loans[index].monthly_installment)
        .sum();

    if installment_base <= Decimal::ZERO {
        warn!(%total_deduction, "payable loans have no installment base, nothing allocated");
        return SettlementReport::skipped(total_deduction, SettlementSkip::NoInstallmentBase);
    }

    let mut cumulative_installments = Decimal::ZERO;
    let mut allocated = Decimal::ZERO;
    let mut total_applied = Decimal::ZERO;
    let mut lines = Vec::with_capacity(participants.len());
    let last = participants.len() - 1;

    for (position, &index) in participants.iter().enumerate() {
        let loan = &mut loans[index];
        cumulative_installments += loan.monthly_installment;
        let target = if position == last {
            total_deduction
        } else {
            round_half_up(total_deduction * cumulative_installments / installment_base)
        };
        let share = target - allocated;
        allocated = target;

        let line = settle_loan(loan, share, paid_on);
        debug!(
            loan_id = line.loan_id,
            requested = %line.requested,
            applied = %line.applied,
            outstanding = %line.outstanding_balance,
            "allocated loan share"
        );
        total_applied += line.applied;
        lines.push(line);
    }

    SettlementReport {
        total_deduction,
        total_applied,
        lines,
        skipped: None,
    }
}

fn settle_loan(
    loan: &mut Loan,
    share: Decimal,
    paid_on: NaiveDate,
) -> SettlementLine {
    let mut line = SettlementLine {
        loan_id: loan.id,
        requested: share,
        applied: Decimal::ZERO,
        unapplied: share,
        outstanding_balance: loan.outstanding_balance,
        status: loan.status,
        failure: None,
    };

    if share <= Decimal::ZERO {
        return line;
    }

    match apply_payment(loan, share, paid_on) {
        Ok(outcome) => {
            line.applied = outcome.applied;
            line.unapplied = outcome.unapplied;
            line.outstanding_balance = outcome.outstanding_balance;
            line.status = outcome.status;
        }
        Err(err) => {
            warn!(loan_id = loan.id, error = %err, "loan share not applied");
            line.failure = Some(err.to_string());
        }
    }

    line
}
