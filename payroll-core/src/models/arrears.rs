use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ArrearsKind {
    SalaryAdjustment,
    BonusPayment,
    OvertimePayment,
    AllowanceAdjustment,
    DeductionReversal,
    Other,
}

impl ArrearsKind {
    pub const ALL: [ArrearsKind; 6] = [
        ArrearsKind::SalaryAdjustment,
        ArrearsKind::BonusPayment,
        ArrearsKind::OvertimePayment,
        ArrearsKind::AllowanceAdjustment,
        ArrearsKind::DeductionReversal,
        ArrearsKind::Other,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::SalaryAdjustment => "SalaryAdjustment",
            Self::BonusPayment => "BonusPayment",
            Self::OvertimePayment => "OvertimePayment",
            Self::AllowanceAdjustment => "AllowanceAdjustment",
            Self::DeductionReversal => "DeductionReversal",
            Self::Other => "Other",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "SalaryAdjustment" => Some(Self::SalaryAdjustment),
            "BonusPayment" => Some(Self::BonusPayment),
            "OvertimePayment" => Some(Self::OvertimePayment),
            "AllowanceAdjustment" => Some(Self::AllowanceAdjustment),
            "DeductionReversal" => Some(Self::DeductionReversal),
            "Other" => Some(Self::Other),
            _ => None,
        }
    }

    /// Payslip label, e.g. `Arrears - Salary Adjustment`.
    pub fn label(&self) -> &'static str {
        match self {
            Self::SalaryAdjustment => "Arrears - Salary Adjustment",
            Self::BonusPayment => "Arrears - Bonus Payment",
            Self::OvertimePayment => "Arrears - Overtime Payment",
            Self::AllowanceAdjustment => "Arrears - Allowance Adjustment",
            Self::DeductionReversal => "Arrears - Deduction Reversal",
            Self::Other => "Arrears - Other",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ArrearsStatus {
    Pending,
    Approved,
    Paid,
    Cancelled,
}

impl ArrearsStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "Pending",
            Self::Approved => "Approved",
            Self::Paid => "Paid",
            Self::Cancelled => "Cancelled",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "Pending" => Some(Self::Pending),
            "Approved" => Some(Self::Approved),
            "Paid" => Some(Self::Paid),
            "Cancelled" => Some(Self::Cancelled),
            _ => None,
        }
    }
}

/// A back payment owed to an employee, paid out with the payroll of
/// `month`/`year`. At most one per kind and period.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Arrears {
    pub kind: ArrearsKind,
    pub month: u32,
    pub year: i32,
    pub amount: Decimal,
    pub description: Option<String>,
    pub status: ArrearsStatus,
    pub is_active: bool,
    pub paid_date: Option<NaiveDate>,
}

impl Arrears {
    pub fn pending(
        kind: ArrearsKind,
        month: u32,
        year: i32,
        amount: Decimal,
    ) -> Self {
        Self {
            kind,
            month,
            year,
            amount,
            description: None,
            status: ArrearsStatus::Pending,
            is_active: true,
            paid_date: None,
        }
    }

    /// Whether the payroll of `month`/`year` carries this amount.
    ///
    /// Paid arrears still count for their own period, so regenerating a paid
    /// payroll keeps them.
    pub fn is_due(
        &self,
        month: u32,
        year: i32,
    ) -> bool {
        self.is_active
            && self.month == month
            && self.year == year
            && self.status != ArrearsStatus::Cancelled
    }
}

/// Total of the arrears due in `month`/`year`.
pub fn due_arrears_total(
    arrears: &[Arrears],
    month: u32,
    year: i32,
) -> Decimal {
    arrears
        .iter()
        .filter(|a| a.is_due(month, year))
        .map(|a| a.amount)
        .sum()
}
