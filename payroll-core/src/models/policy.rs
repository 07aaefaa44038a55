use chrono::Weekday;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

/// Statutory and company constants the payroll calculations depend on.
///
/// The defaults are the FBR 2025-26 values. Rates are fractions
/// (`0.6666` is 66.66%) except `provident_fund_rate_percent` and
/// `surcharge_rate_percent`, which are percentages.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PayrollPolicy {
    pub basic_salary_rate: Decimal,
    pub medical_allowance_rate: Decimal,
    /// Share of total earnings exempt from tax as medical allowance.
    pub tax_exempt_medical_rate: Decimal,
    pub eobi_amount: Decimal,
    pub provident_fund_rate_percent: Decimal,
    pub include_provident_fund: bool,
    pub surcharge_rate_percent: Decimal,
    pub surcharge_threshold: Decimal,
    pub weekly_rest_day: Weekday,
    /// Default the loan deduction to the employee's payable installments.
    pub deduct_loan_installments: bool,
}

impl Default for PayrollPolicy {
    fn default() -> Self {
        Self {
            basic_salary_rate: dec!(0.6666),
            medical_allowance_rate: dec!(0.10),
            tax_exempt_medical_rate: dec!(0.10),
            eobi_amount: dec!(370),
            provident_fund_rate_percent: dec!(8.34),
            include_provident_fund: false,
            surcharge_rate_percent: dec!(9),
            surcharge_threshold: dec!(10000000),
            weekly_rest_day: Weekday::Sun,
            deduct_loan_installments: true,
        }
    }
}
