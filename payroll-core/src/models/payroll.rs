use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::{AllowanceSet, AttendanceSummary};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PayrollStatus {
    Draft,
    Approved,
    Paid,
}

impl PayrollStatus {
    pub const ALL: [PayrollStatus; 3] = [
        PayrollStatus::Draft,
        PayrollStatus::Approved,
        PayrollStatus::Paid,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Draft => "Draft",
            Self::Approved => "Approved",
            Self::Paid => "Paid",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "Draft" => Some(Self::Draft),
            "Approved" => Some(Self::Approved),
            "Paid" => Some(Self::Paid),
            _ => None,
        }
    }
}

/// Earnings and deduction components of a payroll.
///
/// These are the stored source of truth; totals are always derived from
/// them with [`PayrollBreakdown::compute_totals`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PayrollBreakdown {
    pub gross_salary: Decimal,

    // Earnings
    pub basic_salary: Decimal,
    pub house_rent_allowance: Decimal,
    pub medical_allowance: Decimal,
    pub additional_allowances: Decimal,
    pub overtime_amount: Decimal,
    pub performance_bonus: Decimal,
    pub other_bonus: Decimal,
    /// Back payments due this month, taxed apart from the regular salary.
    pub arrears: Decimal,

    // Deductions
    pub income_tax: Decimal,
    /// The part of `income_tax` owed on `arrears`.
    pub arrears_tax: Decimal,
    pub eobi: Decimal,
    pub provident_fund: Decimal,
    /// When false the provident fund is shown but not deducted.
    pub provident_fund_included: bool,
    pub health_insurance: Decimal,
    pub attendance_deduction: Decimal,
    pub loan_deductions: Decimal,
    pub other_deductions: Decimal,
}

impl PayrollBreakdown {
    pub fn bonuses(&self) -> Decimal {
        self.performance_bonus + self.other_bonus
    }

    /// Earnings other than arrears.
    pub fn regular_earnings(&self) -> Decimal {
        self.gross_salary + self.additional_allowances + self.overtime_amount + self.bonuses()
    }

    /// Gross salary plus everything earned on top of it. The basic, house
    /// rent and medical split is already part of the gross.
    pub fn total_earnings(&self) -> Decimal {
        self.regular_earnings() + self.arrears
    }

    /// Payslip earnings rows. The salary split is always listed; the other
    /// rows only when non-zero. The rows sum to [`Self::total_earnings`].
    pub fn earnings_lines(&self) -> Vec<PayslipLine> {
        let mut lines = vec![
            PayslipLine::new("Basic Salary", self.basic_salary),
            PayslipLine::new("House Rent Allowance", self.house_rent_allowance),
            PayslipLine::new("Medical Allowance", self.medical_allowance),
        ];
        let optional = [
            ("Additional Allowances", self.additional_allowances),
            ("Overtime", self.overtime_amount),
            ("Performance Bonus", self.performance_bonus),
            ("Other Bonus", self.other_bonus),
            ("Arrears", self.arrears),
        ];
        lines.extend(
            optional
                .into_iter()
                .filter(|(_, amount)| !amount.is_zero())
                .map(|(label, amount)| PayslipLine::new(label, amount)),
        );
        lines
    }

    pub fn total_deductions(&self) -> Decimal {
        let provident_fund = if self.provident_fund_included {
            self.provident_fund
        } else {
            Decimal::ZERO
        };

        self.income_tax
            + self.eobi
            + provident_fund
            + self.health_insurance
            + self.attendance_deduction
            + self.loan_deductions
            + self.other_deductions
    }

    pub fn compute_totals(&self) -> PayrollTotals {
        let total_earnings = self.total_earnings();
        let total_deductions = self.total_deductions();

        PayrollTotals {
            total_earnings,
            total_deductions,
            net_salary: total_earnings - total_deductions,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PayslipLine {
    pub label: &'static str,
    pub amount: Decimal,
}

impl PayslipLine {
    fn new(
        label: &'static str,
        amount: Decimal,
    ) -> Self {
        Self { label, amount }
    }
}

/// The three derived totals of a payroll. Always computed together.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PayrollTotals {
    pub total_earnings: Decimal,
    pub total_deductions: Decimal,
    pub net_salary: Decimal,
}

/// A monthly payroll record for one employee, unique per
/// `(employee_id, month, year)`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Payroll {
    pub id: i64,
    pub employee_id: i64,
    pub month: u32,
    pub year: i32,
    pub breakdown: PayrollBreakdown,
    /// Monthly allowance values; may differ from the employee master.
    pub allowances: AllowanceSet,
    pub attendance: AttendanceSummary,
    pub taxable_income: Decimal,
    pub totals: PayrollTotals,
    pub status: PayrollStatus,
    pub payment_method: Option<String>,
    pub payment_date: Option<NaiveDate>,
    /// Loan installments for this payroll have been settled.
    pub settlement_applied: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Payroll {
    /// Recomputes all three totals from the stored components.
    pub fn recompute_totals(&mut self) {
        self.totals = self.breakdown.compute_totals();
    }

    pub fn is_editable(&self) -> bool {
        self.status == PayrollStatus::Draft
    }
}

/// A closed set of edits a Draft payroll accepts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum PayrollUpdate {
    /// Monthly allowance overrides; the employee master is left untouched.
    Allowances(AllowanceSet),
    Overtime(Decimal),
    Arrears(Decimal),
    Bonuses {
        performance: Decimal,
        other: Decimal,
    },
    Deductions {
        health_insurance: Decimal,
        loan_deductions: Decimal,
        other_deductions: Decimal,
    },
    Attendance {
        total_working_days: u32,
        present_days: u32,
        leave_days: u32,
    },
}

/// Caller-supplied extras for payroll generation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PayrollInputs {
    pub overtime_amount: Decimal,
    pub performance_bonus: Decimal,
    pub other_bonus: Decimal,
    pub health_insurance: Decimal,
    pub other_deductions: Decimal,
    /// Overrides the loan deduction derived from the employee's loans.
    pub loan_deductions: Option<Decimal>,
    /// Overrides the employee master allowances for this month.
    pub allowances: Option<AllowanceSet>,
}

/// For creating new payrolls (no id, status or timestamps)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewPayroll {
    pub employee_id: i64,
    pub month: u32,
    pub year: i32,
    pub breakdown: PayrollBreakdown,
    pub allowances: AllowanceSet,
    pub attendance: AttendanceSummary,
    pub taxable_income: Decimal,
    pub totals: PayrollTotals,
    pub settlement_applied: bool,
}

impl NewPayroll {
    /// Attaches storage identity, producing a Draft payroll.
    pub fn into_payroll(
        self,
        id: i64,
        now: DateTime<Utc>,
    ) -> Payroll {
        Payroll {
            id,
            employee_id: self.employee_id,
            month: self.month,
            year: self.year,
            breakdown: self.breakdown,
            allowances: self.allowances,
            attendance: self.attendance,
            taxable_income: self.taxable_income,
            totals: self.totals,
            status: PayrollStatus::Draft,
            payment_method: None,
            payment_date: None,
            settlement_applied: self.settlement_applied,
            created_at: now,
            updated_at: now,
        }
    }
}
