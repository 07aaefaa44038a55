use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use super::{PayrollService, ServiceError};
use crate::calculations::{PayrollCalculator, PayrollError, SettlementReport, allocate};
use crate::models::{
    Allowance, AllowanceKind, Arrears, Employee, Payroll, PayrollInputs, PayrollStatus, PayrollUpdate,
    TaxSlabTable,
};

/// A generated payroll and whether it replaced an earlier record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GeneratedPayroll {
    pub payroll: Payroll,
    pub replaced: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkippedEmployee {
    pub employee_id: i64,
    pub existing_payroll_id: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchFailure {
    pub employee_id: i64,
    pub error: String,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchTotals {
    pub total_earnings: Decimal,
    pub total_income_tax: Decimal,
    pub total_net_salary: Decimal,
}

/// Outcome of generating payrolls for every active employee.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchReport {
    pub month: u32,
    pub year: i32,
    pub created: Vec<Payroll>,
    pub skipped: Vec<SkippedEmployee>,
    pub failures: Vec<BatchFailure>,
    pub totals: BatchTotals,
}

/// A payroll marked paid, with the settlement it triggered (if any).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaidPayroll {
    pub payroll: Payroll,
    pub settlement: Option<SettlementReport>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AllowanceComparisonLine {
    pub kind: AllowanceKind,
    pub master: Allowance,
    pub monthly: Allowance,
    pub is_overridden: bool,
}

/// Employee master allowances against the values used in one payroll.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AllowanceComparison {
    pub payroll_id: i64,
    pub employee_id: i64,
    pub lines: Vec<AllowanceComparisonLine>,
    pub master_total: Decimal,
    pub monthly_total: Decimal,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusCount {
    pub status: PayrollStatus,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MonthlyTaxSummary {
    pub month: u32,
    pub year: i32,
    pub employee_count: usize,
    pub total_earnings: Decimal,
    pub total_taxable_income: Decimal,
    pub total_income_tax: Decimal,
    pub total_net_salary: Decimal,
    pub by_status: Vec<StatusCount>,
}

impl PayrollService {
    /// Generates and stores the payroll for one employee and period.
    ///
    /// # Errors
    ///
    /// [`PayrollError::PayrollAlreadyExists`] when a payroll exists for the
    /// period and `force_regenerate` is false, plus any calculation or
    /// storage error.
    pub async fn generate_payroll(
        &self,
        employee_id: i64,
        month: u32,
        year: i32,
        inputs: &PayrollInputs,
        force_regenerate: bool,
    ) -> Result<GeneratedPayroll, ServiceError> {
        let table = self.active_tax_table().await?;
        let calculator = PayrollCalculator::new(&self.policy, &table.slabs)?;
        let employee = self.repo.get_employee(employee_id).await?;

        self.generate_for(&calculator, &employee, month, year, inputs, force_regenerate)
            .await
    }

    /// Generates payrolls for every active employee.
    ///
    /// Existing payrolls are skipped unless `force_regenerate` is set.
    /// Per-employee failures are collected; the batch always runs to the
    /// end. A missing tax table fails the whole batch up front.
    pub async fn generate_monthly_payrolls(
        &self,
        month: u32,
        year: i32,
        force_regenerate: bool,
    ) -> Result<BatchReport, ServiceError> {
        let table = self.active_tax_table().await?;
        let calculator = PayrollCalculator::new(&self.policy, &table.slabs)?;
        let employees = self.repo.list_active_employees().await?;
        let inputs = PayrollInputs::default();

        let mut report = BatchReport {
            month,
            year,
            created: Vec::new(),
            skipped: Vec::new(),
            failures: Vec::new(),
            totals: BatchTotals::default(),
        };

        for employee in &employees {
            let result = self
                .generate_for(&calculator, employee, month, year, &inputs, force_regenerate)
                .await;

            match result {
                Ok(generated) => {
                    let payroll = generated.payroll;
                    report.totals.total_earnings += payroll.totals.total_earnings;
                    report.totals.total_income_tax += payroll.breakdown.income_tax;
                    report.totals.total_net_salary += payroll.totals.net_salary;
                    report.created.push(payroll);
                }
                Err(ServiceError::Payroll(PayrollError::PayrollAlreadyExists {
                    existing_payroll_id,
                    ..
                })) => {
                    report.skipped.push(SkippedEmployee {
                        employee_id: employee.id,
                        existing_payroll_id,
                    });
                }
                Err(err) => {
                    warn!(employee_id = employee.id, error = %err, "payroll generation failed");
                    report.failures.push(BatchFailure {
                        employee_id: employee.id,
                        error: err.to_string(),
                    });
                }
            }
        }

        info!(
            month,
            year,
            created = report.created.len(),
            skipped = report.skipped.len(),
            failed = report.failures.len(),
            "monthly payroll batch finished"
        );

        Ok(report)
    }

    async fn generate_for(
        &self,
        calculator: &PayrollCalculator<'_>,
        employee: &Employee,
        month: u32,
        year: i32,
        inputs: &PayrollInputs,
        force_regenerate: bool,
    ) -> Result<GeneratedPayroll, ServiceError> {
        let _guard = self.locks.lock(employee.id).await;

        let existing = self.repo.find_payroll(employee.id, month, year).await?;
        if let Some(existing) = &existing
            && !force_regenerate
        {
            return Err(PayrollError::PayrollAlreadyExists {
                employee_id: employee.id,
                month,
                year,
                existing_payroll_id: existing.id,
            }
            .into());
        }

        let attendance = self.repo.get_attendance(employee.id, month, year).await?;
        let loans = self.repo.list_employee_loans(employee.id).await?;
        let mut new_payroll =
            calculator.generate(employee, month, year, attendance.as_ref(), &loans, inputs)?;

        let replaced = existing.is_some();
        let payroll = match existing {
            Some(existing) => {
                if existing.settlement_applied {
                    warn!(
                        employee_id = employee.id,
                        month,
                        year,
                        "regenerating a settled payroll; loan payments are not reversed"
                    );
                    new_payroll.settlement_applied = true;
                }
                self.repo.replace_payroll(existing.id, new_payroll).await?
            }
            None => self.repo.create_payroll(new_payroll).await?,
        };

        info!(
            employee_id = employee.id,
            payroll_id = payroll.id,
            month,
            year,
            net_salary = %payroll.totals.net_salary,
            "generated payroll"
        );

        Ok(GeneratedPayroll { payroll, replaced })
    }

    /// Applies an edit to a Draft payroll and recalculates it.
    pub async fn update_payroll(
        &self,
        payroll_id: i64,
        update: PayrollUpdate,
    ) -> Result<Payroll, ServiceError> {
        let table = self.active_tax_table().await?;
        let mut payroll = self.repo.get_payroll(payroll_id).await?;
        self.apply_update(&table, &mut payroll, update).await?;
        Ok(payroll)
    }

    /// Restores the employee master allowances on a Draft payroll.
    pub async fn reset_allowances(
        &self,
        payroll_id: i64,
    ) -> Result<Payroll, ServiceError> {
        let table = self.active_tax_table().await?;
        let mut payroll = self.repo.get_payroll(payroll_id).await?;
        let employee = self.repo.get_employee(payroll.employee_id).await?;

        self.apply_update(&table, &mut payroll, PayrollUpdate::Allowances(employee.allowances))
            .await?;
        Ok(payroll)
    }

    async fn apply_update(
        &self,
        table: &TaxSlabTable,
        payroll: &mut Payroll,
        update: PayrollUpdate,
    ) -> Result<(), ServiceError> {
        let calculator = PayrollCalculator::new(&self.policy, &table.slabs)?;
        calculator.apply_update(payroll, update)?;
        payroll.updated_at = chrono::Utc::now();
        self.repo.update_payroll(payroll).await?;
        Ok(())
    }

    pub async fn allowance_comparison(
        &self,
        payroll_id: i64,
    ) -> Result<AllowanceComparison, ServiceError> {
        let payroll = self.repo.get_payroll(payroll_id).await?;
        let employee = self.repo.get_employee(payroll.employee_id).await?;

        let lines = AllowanceKind::ALL
            .iter()
            .map(|&kind| {
                let master = employee.allowances.get(kind);
                let monthly = payroll.allowances.get(kind);
                AllowanceComparisonLine {
                    kind,
                    master,
                    monthly,
                    is_overridden: master != monthly,
                }
            })
            .collect();

        Ok(AllowanceComparison {
            payroll_id,
            employee_id: employee.id,
            lines,
            master_total: employee.allowances.active_total(),
            monthly_total: payroll.allowances.active_total(),
        })
    }

    /// Draft -> Approved.
    pub async fn approve_payroll(
        &self,
        payroll_id: i64,
    ) -> Result<Payroll, ServiceError> {
        let mut payroll = self.repo.get_payroll(payroll_id).await?;
        transition(&mut payroll, PayrollStatus::Draft, PayrollStatus::Approved)?;
        self.repo.update_payroll(&payroll).await?;
        info!(payroll_id, "approved payroll");
        Ok(payroll)
    }

    /// Records an arrears entry for an employee. An entry with the same kind
    /// and period is replaced.
    pub async fn record_arrears(
        &self,
        employee_id: i64,
        arrears: &Arrears,
    ) -> Result<(), ServiceError> {
        if !(1..=12).contains(&arrears.month) {
            return Err(PayrollError::InvalidPeriod {
                month: arrears.month,
                year: arrears.year,
            }
            .into());
        }
        if arrears.amount < Decimal::ZERO {
            return Err(PayrollError::NegativeAmount {
                field: "arrears",
                value: arrears.amount,
            }
            .into());
        }

        self.repo.get_employee(employee_id).await?;
        self.repo.upsert_arrears(employee_id, arrears).await?;
        info!(
            employee_id,
            kind = arrears.kind.as_str(),
            month = arrears.month,
            year = arrears.year,
            amount = %arrears.amount,
            "arrears recorded"
        );
        Ok(())
    }

    /// Approved -> Paid, settling the payroll's loan deduction against the
    /// employee's loans the first time only. The period's arrears are marked
    /// paid with it.
    pub async fn mark_payroll_paid(
        &self,
        payroll_id: i64,
        payment_method: &str,
        paid_on: NaiveDate,
    ) -> Result<PaidPayroll, ServiceError> {
        let employee_id = self.repo.get_payroll(payroll_id).await?.employee_id;
        let _guard = self.locks.lock(employee_id).await;

        let mut payroll = self.repo.get_payroll(payroll_id).await?;
        transition(&mut payroll, PayrollStatus::Approved, PayrollStatus::Paid)?;
        payroll.payment_method = Some(payment_method.to_string());
        payroll.payment_date = Some(paid_on);

        if payroll.settlement_applied {
            warn!(payroll_id, "payroll already settled; loan payments not applied again");
            self.repo.update_payroll(&payroll).await?;
            self.settle_arrears(&payroll, paid_on).await?;
            return Ok(PaidPayroll {
                payroll,
                settlement: None,
            });
        }

        let mut loans = self.repo.list_employee_loans(employee_id).await?;
        let report = allocate(&mut loans, payroll.breakdown.loan_deductions, paid_on);
        let touched: Vec<_> = loans
            .into_iter()
            .filter(|loan| report.lines.iter().any(|line| line.loan_id == loan.id))
            .collect();

        payroll.settlement_applied = true;
        self.repo.commit_settlement(&payroll, &touched).await?;
        self.settle_arrears(&payroll, paid_on).await?;

        info!(
            payroll_id,
            employee_id,
            applied = %report.total_applied,
            unapplied = %report.total_unapplied(),
            "payroll paid and loans settled"
        );

        Ok(PaidPayroll {
            payroll,
            settlement: Some(report),
        })
    }

    async fn settle_arrears(
        &self,
        payroll: &Payroll,
        paid_on: NaiveDate,
    ) -> Result<(), ServiceError> {
        if payroll.breakdown.arrears.is_zero() {
            return Ok(());
        }
        let count = self
            .repo
            .mark_arrears_paid(payroll.employee_id, payroll.month, payroll.year, paid_on)
            .await?;
        info!(payroll_id = payroll.id, count, "arrears marked paid");
        Ok(())
    }

    /// Paid -> Draft. Loan payments already settled stay applied.
    pub async fn mark_payroll_unpaid(
        &self,
        payroll_id: i64,
    ) -> Result<Payroll, ServiceError> {
        let mut payroll = self.repo.get_payroll(payroll_id).await?;
        transition(&mut payroll, PayrollStatus::Paid, PayrollStatus::Draft)?;
        payroll.payment_method = None;
        payroll.payment_date = None;

        if payroll.settlement_applied {
            warn!(payroll_id, "payroll marked unpaid; settled loan payments are kept");
        }

        self.repo.update_payroll(&payroll).await?;
        Ok(payroll)
    }

    /// Deletes a Draft payroll.
    pub async fn delete_payroll(
        &self,
        payroll_id: i64,
    ) -> Result<(), ServiceError> {
        let payroll = self.repo.get_payroll(payroll_id).await?;
        if !payroll.is_editable() {
            return Err(PayrollError::NotEditable {
                payroll_id,
                status: payroll.status,
            }
            .into());
        }
        self.repo.delete_payroll(payroll_id).await?;
        Ok(())
    }

    pub async fn monthly_tax_summary(
        &self,
        month: u32,
        year: i32,
    ) -> Result<MonthlyTaxSummary, ServiceError> {
        let payrolls = self.repo.list_payrolls(month, year).await?;

        let by_status = PayrollStatus::ALL
            .iter()
            .map(|&status| StatusCount {
                status,
                count: payrolls.iter().filter(|p| p.status == status).count(),
            })
            .collect();

        Ok(MonthlyTaxSummary {
            month,
            year,
            employee_count: payrolls.len(),
            total_earnings: payrolls.iter().map(|p| p.totals.total_earnings).sum(),
            total_taxable_income: payrolls.iter().map(|p| p.taxable_income).sum(),
            total_income_tax: payrolls.iter().map(|p| p.breakdown.income_tax).sum(),
            total_net_salary: payrolls.iter().map(|p| p.totals.net_salary).sum(),
            by_status,
        })
    }
}

fn transition(
    payroll: &mut Payroll,
    from: PayrollStatus,
    to: PayrollStatus,
) -> Result<(), PayrollError> {
    if payroll.status != from {
        return Err(PayrollError::InvalidTransition {
            payroll_id: payroll.id,
            from: payroll.status,
            to,
        });
    }
    payroll.status = to;
    payroll.updated_at = chrono::Utc::now();
    Ok(())
}
