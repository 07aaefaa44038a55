use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LoanType {
    Personal,
    Housing,
    Vehicle,
    Education,
    Medical,
    Emergency,
    Other,
}

impl LoanType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Personal => "Personal",
            Self::Housing => "Housing",
            Self::Vehicle => "Vehicle",
            Self::Education => "Education",
            Self::Medical => "Medical",
            Self::Emergency => "Emergency",
            Self::Other => "Other",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "Personal" => Some(Self::Personal),
            "Housing" => Some(Self::Housing),
            "Vehicle" => Some(Self::Vehicle),
            "Education" => Some(Self::Education),
            "Medical" => Some(Self::Medical),
            "Emergency" => Some(Self::Emergency),
            "Other" => Some(Self::Other),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LoanStatus {
    Pending,
    Approved,
    Rejected,
    Disbursed,
    Active,
    Completed,
    Defaulted,
}

impl LoanStatus {
    pub const ALL: [LoanStatus; 7] = [
        LoanStatus::Pending,
        LoanStatus::Approved,
        LoanStatus::Rejected,
        LoanStatus::Disbursed,
        LoanStatus::Active,
        LoanStatus::Completed,
        LoanStatus::Defaulted,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "Pending",
            Self::Approved => "Approved",
            Self::Rejected => "Rejected",
            Self::Disbursed => "Disbursed",
            Self::Active => "Active",
            Self::Completed => "Completed",
            Self::Defaulted => "Defaulted",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "Pending" => Some(Self::Pending),
            "Approved" => Some(Self::Approved),
            "Rejected" => Some(Self::Rejected),
            "Disbursed" => Some(Self::Disbursed),
            "Active" => Some(Self::Active),
            "Completed" => Some(Self::Completed),
            "Defaulted" => Some(Self::Defaulted),
            _ => None,
        }
    }

    /// Statuses that accept payments and take part in payroll settlement.
    pub fn is_payable(&self) -> bool {
        matches!(self, Self::Active | Self::Disbursed | Self::Approved)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum InstallmentStatus {
    Pending,
    Partial,
    Paid,
    Overdue,
}

impl InstallmentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "Pending",
            Self::Partial => "Partial",
            Self::Paid => "Paid",
            Self::Overdue => "Overdue",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "Pending" => Some(Self::Pending),
            "Partial" => Some(Self::Partial),
            "Paid" => Some(Self::Paid),
            "Overdue" => Some(Self::Overdue),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoanInstallment {
    pub installment_number: u32,
    pub due_date: NaiveDate,
    pub amount: Decimal,
    pub principal_portion: Decimal,
    pub interest_portion: Decimal,
    pub running_balance: Decimal,
    pub status: InstallmentStatus,
    pub paid_amount: Decimal,
    pub payment_date: Option<NaiveDate>,
}

impl LoanInstallment {
    /// What is still owed on this installment.
    pub fn remaining_due(&self) -> Decimal {
        (self.amount - self.paid_amount).max(Decimal::ZERO)
    }

    pub fn is_open(&self) -> bool {
        self.status != InstallmentStatus::Paid
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Loan {
    pub id: i64,
    pub employee_id: i64,
    pub loan_type: LoanType,
    pub purpose: String,
    pub principal: Decimal,
    pub annual_interest_rate_percent: Decimal,
    pub term_months: u32,
    pub monthly_installment: Decimal,
    pub total_payable: Decimal,
    pub outstanding_balance: Decimal,
    pub total_paid: Decimal,
    pub status: LoanStatus,
    pub application_date: NaiveDate,
    pub approval_date: Option<NaiveDate>,
    pub disbursement_date: Option<NaiveDate>,
    pub completion_date: Option<NaiveDate>,
    pub rejection_reason: Option<String>,
    /// Set when a payment left the balances inconsistent; cleared by hand.
    pub needs_review: bool,
    /// Optimistic concurrency token, bumped by every persisted mutation.
    pub version: i64,
    pub schedule: Vec<LoanInstallment>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Loan {
    /// Percentage of the total payable already repaid, rounded to a whole percent.
    pub fn progress_percentage(&self) -> Decimal {
        if self.total_payable.is_zero() {
            return Decimal::ZERO;
        }
        (self.total_paid / self.total_payable * Decimal::ONE_HUNDRED).round()
    }

    pub fn remaining_installments(&self) -> usize {
        self.schedule.iter().filter(|i| i.is_open()).count()
    }

    pub fn next_due_date(&self) -> Option<NaiveDate> {
        self.schedule
            .iter()
            .find(|i| i.is_open())
            .map(|i| i.due_date)
    }

    /// Sum still owed on installments marked overdue.
    pub fn overdue_amount(&self) -> Decimal {
        self.schedule
            .iter()
            .filter(|i| i.status == InstallmentStatus::Overdue)
            .map(LoanInstallment::remaining_due)
            .sum()
    }

    pub fn scheduled_paid_total(&self) -> Decimal {
        self.schedule.iter().map(|i| i.paid_amount).sum()
    }
}

/// A loan application as submitted, before terms are computed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewLoan {
    pub employee_id: i64,
    pub loan_type: LoanType,
    pub purpose: String,
    pub principal: Decimal,
    pub annual_interest_rate_percent: Decimal,
    pub term_months: u32,
    pub application_date: NaiveDate,
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use rust_decimal_macros::dec;

    use super::*;

    fn installment(
        number: u32,
        status: InstallmentStatus,
        paid: Decimal,
    ) -> LoanInstallment {
        LoanInstallment {
            installment_number: number,
            due_date: NaiveDate::from_ymd_opt(2025, number, 1).unwrap(),
            amount: dec!(1000),
            principal_portion: dec!(900),
            interest_portion: dec!(100),
            running_balance: dec!(0),
            status,
            paid_amount: paid,
            payment_date: None,
        }
    }

    fn loan_with(schedule: Vec<LoanInstallment>) -> Loan {
        Loan {
            id: 1,
            employee_id: 7,
            loan_type: LoanType::Personal,
            purpose: "test".to_string(),
            principal: dec!(2700),
            annual_interest_rate_percent: dec!(10),
            term_months: 3,
            monthly_installment: dec!(1000),
            total_payable: dec!(3000),
            outstanding_balance: dec!(1500),
            total_paid: dec!(1500),
            status: LoanStatus::Active,
            application_date: NaiveDate::from_ymd_opt(2024, 12, 1).unwrap(),
            approval_date: None,
            disbursement_date: None,
            completion_date: None,
            rejection_reason: None,
            needs_review: false,
            version: 0,
            schedule,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn status_round_trips_through_str() {
        for status in LoanStatus::ALL {
            assert_eq!(LoanStatus::parse(status.as_str()), Some(status));
        }
        assert_eq!(LoanStatus::parse("Bogus"), None);
    }

    #[test]
    fn only_active_disbursed_and_approved_are_payable() {
        let payable: Vec<_> = LoanStatus::ALL
            .into_iter()
            .filter(LoanStatus::is_payable)
            .collect();

        assert_eq!(
            payable,
            vec![LoanStatus::Approved, LoanStatus::Disbursed, LoanStatus::Active]
        );
    }

    #[test]
    fn progress_and_remaining_installments() {
        let loan = loan_with(vec![
            installment(1, InstallmentStatus::Paid, dec!(1000)),
            installment(2, InstallmentStatus::Partial, dec!(500)),
            installment(3, InstallmentStatus::Pending, dec!(0)),
        ]);

        assert_eq!(loan.progress_percentage(), dec!(50));
        assert_eq!(loan.remaining_installments(), 2);
        assert_eq!(loan.next_due_date(), NaiveDate::from_ymd_opt(2025, 2, 1));
        assert_eq!(loan.scheduled_paid_total(), dec!(1500));
    }

    #[test]
    fn overdue_amount_counts_only_unpaid_part_of_overdue_rows() {
        let loan = loan_with(vec![
            installment(1, InstallmentStatus::Overdue, dec!(250)),
            installment(2, InstallmentStatus::Overdue, dec!(0)),
            installment(3, InstallmentStatus::Pending, dec!(0)),
        ]);

        assert_eq!(loan.overdue_amount(), dec!(1750));
    }

    #[test]
    fn progress_is_zero_without_payable_total() {
        let mut loan = loan_with(Vec::new());
        loan.total_payable = Decimal::ZERO;

        assert_eq!(loan.progress_percentage(), Decimal::ZERO);
    }
}
