//! Monthly payroll aggregation.
//!
//! | Step | Component |
//! |------|-----------|
//! | 1    | Basic, medical and house rent split of the gross salary |
//! | 2    | Additional allowances (active monthly allowances) |
//! | 3    | Total earnings (gross + additional + overtime + bonuses + arrears) |
//! | 4    | Taxable income (regular earnings less the tax-exempt medical share, plus arrears) |
//! | 5    | Monthly income tax from the active slab table, arrears taxed separately |
//! | 6    | EOBI and provident fund |
//! | 7    | Attendance deduction |
//! | 8    | Loan deductions |
//! | 9    | Totals and net salary |

use rust_decimal::Decimal;
use thiserror::Error;

use crate::calculations::attendance::{AttendanceCalculator, AttendanceError};
use crate::calculations::common::{MONTHS_PER_YEAR, max, round_whole};
use crate::calculations::tax_slabs::{TaxError, TaxSlabResolver};
use crate::{
    AttendanceRecord, Employee, Loan, NewPayroll, Payroll, PayrollBreakdown,
    PayrollInputs, PayrollPolicy, PayrollStatus, PayrollUpdate, TaxSlab,
};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum PayrollError {
    #[error(
        "payroll {existing_payroll_id} already exists for employee {employee_id} in {month}/{year}"
    )]
    PayrollAlreadyExists {
        employee_id: i64,
        month: u32,
        year: i32,
        existing_payroll_id: i64,
    },

    #[error("payroll {payroll_id} is {status:?} and can no longer be edited")]
    NotEditable {
        payroll_id: i64,
        status: PayrollStatus,
    },

    #[error("payroll {payroll_id} cannot move from {from:?} to {to:?}")]
    InvalidTransition {
        payroll_id: i64,
        from: PayrollStatus,
        to: PayrollStatus,
    },

    #[error("employee {0} is inactive")]
    InactiveEmployee(i64),

    #[error("invalid payroll period {month}/{year}")]
    InvalidPeriod { month: u32, year: i32 },

    #[error("{field} must not be negative, got {value}")]
    NegativeAmount { field: &'static str, value: Decimal },

    #[error(transparent)]
    Tax(#[from] TaxError),

    #[error(transparent)]
    Attendance(#[from] AttendanceError),
}

/// Calculator for monthly payrolls under one policy and tax table.
#[derive(Debug, Clone)]
pub struct PayrollCalculator<'a> {
    policy: &'a PayrollPolicy,
    tax: TaxSlabResolver<'a>,
    attendance: AttendanceCalculator,
}

impl<'a> PayrollCalculator<'a> {
    /// Creates a calculator, validating the tax slabs.
    pub fn new(
        policy: &'a PayrollPolicy,
        slabs: &'a [TaxSlab],
    ) -> Result<Self, TaxError> {
        Ok(Self {
            policy,
            tax: TaxSlabResolver::new(slabs, policy)?,
            attendance: AttendanceCalculator::new(policy),
        })
    }

    pub fn attendance(&self) -> &AttendanceCalculator {
        &self.attendance
    }

    /// Builds a Draft payroll for an employee and period.
    ///
    /// `attendance` is the collaborator's record for the period; without
    /// one the employee is taken to have attended every working day.
    ///
    /// # Errors
    ///
    /// Returns [`PayrollError`] for an inactive employee, an invalid period,
    /// negative inputs, zero working days or a tax resolution failure.
    pub fn generate(
        &self,
        employee: &Employee,
        month: u32,
        year: i32,
        attendance: Option<&AttendanceRecord>,
        loans: &[Loan],
        inputs: &PayrollInputs,
    ) -> Result<NewPayroll, PayrollError> {
        if !employee.is_active {
            return Err(PayrollError::InactiveEmployee(employee.id));
        }
        if !(1..=12).contains(&month) {
            return Err(PayrollError::InvalidPeriod { month, year });
        }
        self.check_inputs(inputs)?;

        let gross_salary = employee.gross_salary;
        let (basic_salary, house_rent_allowance, medical_allowance) =
            self.salary_split(gross_salary);

        let allowances = inputs.allowances.unwrap_or(employee.allowances);

        let (attendance, attendance_deduction) = match attendance {
            Some(record) => self.attendance.summarize(record, gross_salary)?,
            None => self
                .attendance
                .full_attendance(year, month, gross_salary)?,
        };

        let loan_deductions = match inputs.loan_deductions {
            Some(amount) => amount,
            None if self.policy.deduct_loan_installments => self.loan_deduction(loans),
            None => Decimal::ZERO,
        };

        let mut breakdown = PayrollBreakdown {
            gross_salary,
            basic_salary,
            house_rent_allowance,
            medical_allowance,
            additional_allowances: allowances.active_total(),
            overtime_amount: inputs.overtime_amount,
            performance_bonus: inputs.performance_bonus,
            other_bonus: inputs.other_bonus,
            arrears: employee.arrears_due(month, year),
            income_tax: Decimal::ZERO,
            arrears_tax: Decimal::ZERO,
            eobi: self.policy.eobi_amount,
            provident_fund: self.provident_fund(basic_salary),
            provident_fund_included: self.policy.include_provident_fund,
            health_insurance: inputs.health_insurance,
            attendance_deduction,
            loan_deductions,
            other_deductions: inputs.other_deductions,
        };

        let tax = self.income_tax(&breakdown)?;
        breakdown.income_tax = tax.income_tax;
        breakdown.arrears_tax = tax.arrears_tax;

        Ok(NewPayroll {
            employee_id: employee.id,
            month,
            year,
            totals: breakdown.compute_totals(),
            breakdown,
            allowances,
            attendance,
            taxable_income: tax.taxable_income,
            settlement_applied: false,
        })
    }

    /// Applies an edit to a Draft payroll and recalculates it.
    pub fn apply_update(
        &self,
        payroll: &mut Payroll,
        update: PayrollUpdate,
    ) -> Result<(), PayrollError> {
        if !payroll.is_editable() {
            return Err(PayrollError::NotEditable {
                payroll_id: payroll.id,
                status: payroll.status,
            });
        }

        match update {
            PayrollUpdate::Allowances(allowances) => payroll.allowances = allowances,
            PayrollUpdate::Overtime(amount) => {
                non_negative("overtime_amount", amount)?;
                payroll.breakdown.overtime_amount = amount;
            }
            PayrollUpdate::Arrears(amount) => {
                non_negative("arrears", amount)?;
                payroll.breakdown.arrears = amount;
            }
            PayrollUpdate::Bonuses { performance, other } => {
                non_negative("performance_bonus", performance)?;
                non_negative("other_bonus", other)?;
                payroll.breakdown.performance_bonus = performance;
                payroll.breakdown.other_bonus = other;
            }
            PayrollUpdate::Deductions {
                health_insurance,
                loan_deductions,
                other_deductions,
            } => {
                non_negative("health_insurance", health_insurance)?;
                non_negative("loan_deductions", loan_deductions)?;
                non_negative("other_deductions", other_deductions)?;
                payroll.breakdown.health_insurance = health_insurance;
                payroll.breakdown.loan_deductions = loan_deductions;
                payroll.breakdown.other_deductions = other_deductions;
            }
            PayrollUpdate::Attendance {
                total_working_days,
                present_days,
                leave_days,
            } => {
                let (summary, deduction) = self.attendance.summary_from_counts(
                    payroll.breakdown.gross_salary,
                    total_working_days,
                    present_days,
                    leave_days,
                )?;
                payroll.attendance = summary;
                payroll.breakdown.attendance_deduction = deduction;
            }
        }

        self.recalculate(payroll)
    }

    /// Re-derives additional allowances, tax and totals from the stored
    /// components.
    pub fn recalculate(
        &self,
        payroll: &mut Payroll,
    ) -> Result<(), PayrollError> {
        payroll.breakdown.additional_allowances = payroll.allowances.active_total();

        let tax = self.income_tax(&payroll.breakdown)?;
        payroll.taxable_income = tax.taxable_income;
        payroll.breakdown.income_tax = tax.income_tax;
        payroll.breakdown.arrears_tax = tax.arrears_tax;

        payroll.recompute_totals();
        Ok(())
    }

    /// Sum of the payable loans' installments, each capped at the loan's
    /// outstanding balance.
    pub fn loan_deduction(
        &self,
        loans: &[Loan],
    ) -> Decimal {
        loans
            .iter()
            .filter(|loan| loan.status.is_payable())
            .map(|loan| {
                loan.monthly_installment
                    .min(max(loan.outstanding_balance, Decimal::ZERO))
            })
            .sum()
    }

    /// Splits the gross into basic, house rent and medical. House rent is
    /// the residual so the three always sum to the gross.
    fn salary_split(
        &self,
        gross_salary: Decimal,
    ) -> (Decimal, Decimal, Decimal) {
        let basic = round_whole(gross_salary * self.policy.basic_salary_rate);
        let medical = round_whole(gross_salary * self.policy.medical_allowance_rate);
        (basic, gross_salary - basic - medical, medical)
    }

    /// Taxable monthly income and the tax on it.
    ///
    /// Regular earnings are annualized after the medical exemption. Arrears
    /// get no exemption and are taxed once, as the extra annual tax they add
    /// on top of the annualized regular income.
    fn income_tax(
        &self,
        breakdown: &PayrollBreakdown,
    ) -> Result<IncomeTax, TaxError> {
        let regular = breakdown.regular_earnings();
        let exempt_medical = round_whole(regular * self.policy.tax_exempt_medical_rate);
        let regular_taxable = regular - exempt_medical;
        let annual_income = regular_taxable * MONTHS_PER_YEAR;
        let regular_tax = self.tax.monthly_tax(annual_income)?;

        let arrears_tax = if breakdown.arrears.is_zero() {
            Decimal::ZERO
        } else {
            let with_arrears = self.tax.resolve_tax(annual_income + breakdown.arrears)?;
            round_whole(with_arrears - self.tax.resolve_tax(annual_income)?)
        };

        Ok(IncomeTax {
            taxable_income: regular_taxable + breakdown.arrears,
            income_tax: regular_tax + arrears_tax,
            arrears_tax,
        })
    }

    fn provident_fund(
        &self,
        basic_salary: Decimal,
    ) -> Decimal {
        round_whole(basic_salary * self.policy.provident_fund_rate_percent / Decimal::ONE_HUNDRED)
    }

    fn check_inputs(
        &self,
        inputs: &PayrollInputs,
    ) -> Result<(), PayrollError> {
        non_negative("overtime_amount", inputs.overtime_amount)?;
        non_negative("performance_bonus", inputs.performance_bonus)?;
        non_negative("other_bonus", inputs.other_bonus)?;
        non_negative("health_insurance", inputs.health_insurance)?;
        non_negative("other_deductions", inputs.other_deductions)?;
        if let Some(amount) = inputs.loan_deductions {
            non_negative("loan_deductions", amount)?;
        }
        Ok(())
    }
}

struct IncomeTax {
    taxable_income: Decimal,
    income_tax: Decimal,
    arrears_tax: Decimal,
}

fn non_negative(
    field: &'static str,
    value: Decimal,
) -> Result<(), PayrollError> {
    if value < Decimal::ZERO {
        return Err(PayrollError::NegativeAmount { field, value });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use chrono::{NaiveDate, Utc};
    use pretty_assertions::assert_eq;
    use rust_decimal_macros::dec;

    use super::*;
    use crate::calculations::amortization::compute_schedule;
    use crate::{Allowance, AllowanceSet, Arrears, ArrearsKind, ArrearsStatus, LoanStatus, LoanType};

    fn fbr_slabs() -> Vec<TaxSlab> {
        let slab = |min: Decimal, max: Option<Decimal>, rate: Decimal, fixed: Decimal| TaxSlab {
            min_amount: min,
            max_amount: max,
            rate,
            fixed_tax: fixed,
        };
        vec![
            slab(dec!(0), Some(dec!(600000)), dec!(0), dec!(0)),
            slab(dec!(600001), Some(dec!(1200000)), dec!(1), dec!(0)),
            slab(dec!(1200001), Some(dec!(2200000)), dec!(11), dec!(6000)),
            slab(dec!(2200001), Some(dec!(3200000)), dec!(23), dec!(116000)),
            slab(dec!(3200001), Some(dec!(4100000)), dec!(30), dec!(346000)),
            slab(dec!(4100001), None, dec!(35), dec!(616000)),
        ]
    }

    fn employee(gross_salary: Decimal) -> Employee {
        Employee {
            id: 42,
            employee_code: "EMP-042".to_string(),
            first_name: "Ayesha".to_string(),
            last_name: "Khan".to_string(),
            gross_salary,
            is_active: true,
            allowances: AllowanceSet::default(),
            arrears: Vec::new(),
        }
    }

    fn active_loan(
        principal: Decimal,
        term_months: u32,
    ) -> Loan {
        let start = NaiveDate::from_ymd_opt(2025, 1, 1).unwrap();
        let schedule = compute_schedule(principal, dec!(0), term_months, start).unwrap();
        Loan {
            id: 1,
            employee_id: 42,
            loan_type: LoanType::Vehicle,
            purpose: String::new(),
            principal,
            annual_interest_rate_percent: dec!(0),
            term_months,
            monthly_installment: schedule.monthly_installment,
            total_payable: schedule.total_payable,
            outstanding_balance: schedule.total_payable,
            total_paid: Decimal::ZERO,
            status: LoanStatus::Active,
            application_date: start,
            approval_date: None,
            disbursement_date: None,
            completion_date: None,
            rejection_reason: None,
            needs_review: false,
            version: 0,
            schedule: schedule.installments,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn generate(
        employee: &Employee,
        attendance: Option<&AttendanceRecord>,
        loans: &[Loan],
        inputs: &PayrollInputs,
    ) -> Result<NewPayroll, PayrollError> {
        let policy = PayrollPolicy::default();
        let slabs = fbr_slabs();
        let calculator = PayrollCalculator::new(&policy, &slabs).unwrap();
        calculator.generate(employee, 3, 2025, attendance, loans, inputs)
    }

    // =========================================================================
    // generate tests
    // =========================================================================

    #[test]
    fn generate_below_taxable_threshold() {
        let payroll = generate(&employee(dec!(50000)), None, &[], &PayrollInputs::default()).unwrap();
        let breakdown = &payroll.breakdown;

        assert_eq!(breakdown.basic_salary, dec!(33330));
        assert_eq!(breakdown.medical_allowance, dec!(5000));
        assert_eq!(breakdown.house_rent_allowance, dec!(11670));
        assert_eq!(breakdown.provident_fund, dec!(2780));
        assert_eq!(breakdown.income_tax, dec!(0));
        assert_eq!(breakdown.eobi, dec!(370));
        assert_eq!(payroll.taxable_income, dec!(45000));
        assert_eq!(payroll.totals.total_earnings, dec!(50000));
        assert_eq!(payroll.totals.total_deductions, dec!(370));
        assert_eq!(payroll.totals.net_salary, dec!(49630));
    }

    #[test]
    fn generate_in_eleven_percent_slab() {
        let payroll = generate(&employee(dec!(150000)), None, &[], &PayrollInputs::default()).unwrap();

        assert_eq!(payroll.taxable_income, dec!(135000));
        assert_eq!(payroll.breakdown.income_tax, dec!(4350));
        assert_eq!(payroll.totals.total_deductions, dec!(4720));
        assert_eq!(payroll.totals.net_salary, dec!(145280));
    }

    #[test]
    fn generate_split_always_sums_to_gross() {
        for gross in [dec!(33333), dec!(77777.77), dec!(123457), dec!(1)] {
            let payroll = generate(&employee(gross), None, &[], &PayrollInputs::default()).unwrap();
            let b = &payroll.breakdown;

            assert_eq!(b.basic_salary + b.house_rent_allowance + b.medical_allowance, gross);
        }
    }

    #[test]
    fn generate_defaults_to_full_attendance() {
        let payroll = generate(&employee(dec!(52000)), None, &[], &PayrollInputs::default()).unwrap();

        assert_eq!(payroll.attendance.total_working_days, 26);
        assert_eq!(payroll.attendance.present_days, 26);
        assert_eq!(payroll.attendance.absent_days, 0);
        assert_eq!(payroll.breakdown.attendance_deduction, dec!(0));
    }

    #[test]
    fn generate_deducts_absent_and_leave_days() {
        let record = AttendanceRecord {
            employee_id: 42,
            month: 3,
            year: 2025,
            total_working_days: 26,
            present_days: 22,
            leave_days: 1,
        };

        let payroll =
            generate(&employee(dec!(50000)), Some(&record), &[], &PayrollInputs::default()).unwrap();

        assert_eq!(payroll.attendance.absent_days, 3);
        assert_eq!(payroll.attendance.daily_rate, dec!(1923.08));
        assert_eq!(payroll.breakdown.attendance_deduction, dec!(7692));
        assert_eq!(payroll.totals.net_salary, dec!(50000) - dec!(370) - dec!(7692));
    }

    #[test]
    fn generate_includes_active_allowances_and_extras() {
        let mut employee = employee(dec!(100000));
        employee.allowances.conveyance = Allowance::active(dec!(5000));
        employee.allowances.food = Allowance {
            is_active: false,
            amount: dec!(3000),
        };
        let inputs = PayrollInputs {
            overtime_amount: dec!(2000),
            performance_bonus: dec!(1000),
            other_bonus: dec!(500),
            ..PayrollInputs::default()
        };

        let payroll = generate(&employee, None, &[], &inputs).unwrap();

        assert_eq!(payroll.breakdown.additional_allowances, dec!(5000));
        assert_eq!(payroll.totals.total_earnings, dec!(108500));
        // 108500 - 10850 exempt medical = 97650 a month, 1171800 a year
        assert_eq!(payroll.taxable_income, dec!(97650));
        assert_eq!(payroll.breakdown.income_tax, dec!(477));
    }

    #[test]
    fn generate_monthly_allowances_override_master() {
        let mut employee = employee(dec!(100000));
        employee.allowances.conveyance = Allowance::active(dec!(5000));
        let monthly = AllowanceSet {
            special: Allowance::active(dec!(1234)),
            ..AllowanceSet::default()
        };
        let inputs = PayrollInputs {
            allowances: Some(monthly),
            ..PayrollInputs::default()
        };

        let payroll = generate(&employee, None, &[], &inputs).unwrap();

        assert_eq!(payroll.allowances, monthly);
        assert_eq!(payroll.breakdown.additional_allowances, dec!(1234));
    }

    #[test]
    fn generate_caps_loan_deductions_at_outstanding_balance() {
        let mut nearly_done = active_loan(dec!(12000), 12);
        nearly_done.total_paid = dec!(11500);
        nearly_done.outstanding_balance = dec!(500);
        let mut closed = active_loan(dec!(6000), 6);
        closed.status = LoanStatus::Completed;
        let loans = vec![active_loan(dec!(60000), 12), nearly_done, closed];

        let payroll = generate(&employee(dec!(80000)), None, &loans, &PayrollInputs::default()).unwrap();

        assert_eq!(payroll.breakdown.loan_deductions, dec!(5500));
    }

    #[test]
    fn generate_uses_explicit_loan_deduction() {
        let loans = vec![active_loan(dec!(60000), 12)];
        let inputs = PayrollInputs {
            loan_deductions: Some(dec!(2500)),
            ..PayrollInputs::default()
        };

        let payroll = generate(&employee(dec!(80000)), None, &loans, &inputs).unwrap();

        assert_eq!(payroll.breakdown.loan_deductions, dec!(2500));
    }

    #[test]
    fn generate_counts_provident_fund_when_policy_includes_it() {
        let policy = PayrollPolicy {
            include_provident_fund: true,
            ..PayrollPolicy::default()
        };
        let slabs = fbr_slabs();
        let calculator = PayrollCalculator::new(&policy, &slabs).unwrap();

        let payroll = calculator
            .generate(&employee(dec!(50000)), 3, 2025, None, &[], &PayrollInputs::default())
            .unwrap();

        assert_eq!(payroll.totals.total_deductions, dec!(3150));
    }

    #[test]
    fn generate_taxes_arrears_separately() {
        let mut employee = employee(dec!(150000));
        let mut cancelled = Arrears::pending(ArrearsKind::BonusPayment, 3, 2025, dec!(40000));
        cancelled.status = ArrearsStatus::Cancelled;
        employee.arrears = vec![
            Arrears::pending(ArrearsKind::SalaryAdjustment, 3, 2025, dec!(100000)),
            Arrears::pending(ArrearsKind::OvertimePayment, 4, 2025, dec!(25000)),
            cancelled,
        ];

        let payroll = generate(&employee, None, &[], &PayrollInputs::default()).unwrap();
        let breakdown = &payroll.breakdown;

        assert_eq!(breakdown.arrears, dec!(100000));
        // 1620000 a year pays 52200, 1720000 pays 63200
        assert_eq!(breakdown.arrears_tax, dec!(11000));
        assert_eq!(breakdown.income_tax, dec!(15350));
        assert_eq!(payroll.taxable_income, dec!(235000));
        assert_eq!(payroll.totals.total_earnings, dec!(250000));
        assert_eq!(payroll.totals.total_deductions, dec!(15720));
        assert_eq!(payroll.totals.net_salary, dec!(234280));
    }

    #[test]
    fn generate_rejects_inactive_employee() {
        let mut employee = employee(dec!(50000));
        employee.is_active = false;

        assert_eq!(
            generate(&employee, None, &[], &PayrollInputs::default()),
            Err(PayrollError::InactiveEmployee(42))
        );
    }

    #[test]
    fn generate_rejects_negative_inputs() {
        let inputs = PayrollInputs {
            overtime_amount: dec!(-1),
            ..PayrollInputs::default()
        };

        assert_eq!(
            generate(&employee(dec!(50000)), None, &[], &inputs),
            Err(PayrollError::NegativeAmount {
                field: "overtime_amount",
                value: dec!(-1),
            })
        );
    }

    #[test]
    fn generate_rejects_invalid_month() {
        let policy = PayrollPolicy::default();
        let slabs = fbr_slabs();
        let calculator = PayrollCalculator::new(&policy, &slabs).unwrap();

        let result = calculator.generate(&employee(dec!(1)), 0, 2025, None, &[], &PayrollInputs::default());

        assert_eq!(result, Err(PayrollError::InvalidPeriod { month: 0, year: 2025 }));
    }

    // =========================================================================
    // apply_update tests
    // =========================================================================

    fn stored(gross: Decimal) -> Payroll {
        generate(&employee(gross), None, &[], &PayrollInputs::default())
            .unwrap()
            .into_payroll(7, Utc::now())
    }

    #[test]
    fn apply_update_allowances_recalculates_tax_and_totals() {
        let policy = PayrollPolicy::default();
        let slabs = fbr_slabs();
        let calculator = PayrollCalculator::new(&policy, &slabs).unwrap();
        let mut payroll = stored(dec!(100000));
        let allowances = AllowanceSet {
            conveyance: Allowance::active(dec!(8500)),
            ..AllowanceSet::default()
        };

        calculator
            .apply_update(&mut payroll, PayrollUpdate::Allowances(allowances))
            .unwrap();

        assert_eq!(payroll.breakdown.additional_allowances, dec!(8500));
        assert_eq!(payroll.totals.total_earnings, dec!(108500));
        assert_eq!(payroll.breakdown.income_tax, dec!(477));
        assert_eq!(payroll.totals, payroll.breakdown.compute_totals());
    }

    #[test]
    fn apply_update_attendance_recomputes_deduction() {
        let policy = PayrollPolicy::default();
        let slabs = fbr_slabs();
        let calculator = PayrollCalculator::new(&policy, &slabs).unwrap();
        let mut payroll = stored(dec!(52000));

        calculator
            .apply_update(
                &mut payroll,
                PayrollUpdate::Attendance {
                    total_working_days: 26,
                    present_days: 24,
                    leave_days: 1,
                },
            )
            .unwrap();

        assert_eq!(payroll.attendance.absent_days, 1);
        assert_eq!(payroll.breakdown.attendance_deduction, dec!(4000));
        assert_eq!(payroll.totals.total_deductions, dec!(4370));
    }

    #[test]
    fn apply_update_arrears_retaxes_only_the_arrears() {
        let policy = PayrollPolicy::default();
        let slabs = fbr_slabs();
        let calculator = PayrollCalculator::new(&policy, &slabs).unwrap();
        let mut payroll = stored(dec!(150000));
        assert_eq!(payroll.breakdown.income_tax, dec!(4350));

        calculator
            .apply_update(&mut payroll, PayrollUpdate::Arrears(dec!(100000)))
            .unwrap();

        assert_eq!(payroll.breakdown.arrears_tax, dec!(11000));
        assert_eq!(payroll.breakdown.income_tax, dec!(15350));
        assert_eq!(payroll.totals, payroll.breakdown.compute_totals());

        assert_eq!(
            calculator.apply_update(&mut payroll, PayrollUpdate::Arrears(dec!(-5))),
            Err(PayrollError::NegativeAmount {
                field: "arrears",
                value: dec!(-5),
            })
        );
    }

    #[test]
    fn apply_update_refuses_non_draft() {
        let policy = PayrollPolicy::default();
        let slabs = fbr_slabs();
        let calculator = PayrollCalculator::new(&policy, &slabs).unwrap();
        let mut payroll = stored(dec!(52000));
        payroll.status = PayrollStatus::Approved;

        assert_eq!(
            calculator.apply_update(&mut payroll, PayrollUpdate::Overtime(dec!(100))),
            Err(PayrollError::NotEditable {
                payroll_id: 7,
                status: PayrollStatus::Approved,
            })
        );
    }
}
