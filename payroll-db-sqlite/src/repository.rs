use std::path::Path;
use std::str::FromStr;

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use payroll_core::calculations::AmortizationSchedule;
use payroll_core::{
    AllowanceKind, AllowanceSet, Arrears, ArrearsKind, ArrearsStatus, AttendanceRecord, AttendanceSummary, Employee,
    InstallmentStatus, Loan, LoanInstallment, LoanStatus, LoanType, NewEmployee, NewLoan,
    NewPayroll, NewTaxSlabTable, Payroll, PayrollBreakdown, PayrollRepository, PayrollStatus,
    PayrollTotals, RepositoryError, TaxSlab, TaxSlabTable,
};
use sqlx::query::Query;
use sqlx::sqlite::{
    Sqlite, SqliteArguments, SqliteConnectOptions, SqliteConnection, SqlitePool,
    SqlitePoolOptions, SqliteRow,
};
use sqlx::{Decode, Row, Type};
use tracing::debug;

use crate::decimal::{decimal_to_text, get_decimal, get_optional_decimal};

type SqliteQuery<'q> = Query<'q, Sqlite, SqliteArguments<'q>>;

/// Allowance columns shared by `employee` and `payroll`, in
/// [`AllowanceKind::ALL`] order.
const ALLOWANCE_COLUMNS: &str = "conveyance_active, conveyance_amount, food_active, food_amount, \
     vehicle_fuel_active, vehicle_fuel_amount, special_active, special_amount, \
     other_active, other_amount";

const EMPLOYEE_COLUMNS: &str =
    "id, employee_code, first_name, last_name, gross_salary, is_active";

const LOAN_COLUMNS: &str = "id, employee_id, loan_type, purpose, principal, \
     annual_interest_rate_percent, term_months, monthly_installment, total_payable, \
     outstanding_balance, total_paid, status, application_date, approval_date, \
     disbursement_date, completion_date, rejection_reason, needs_review, version, \
     created_at, updated_at";

const PAYROLL_COLUMNS: &str = "id, employee_id, month, year, gross_salary, basic_salary, \
     house_rent_allowance, medical_allowance, additional_allowances, overtime_amount, \
     performance_bonus, other_bonus, arrears, income_tax, arrears_tax, eobi, provident_fund, \
     provident_fund_included, health_insurance, attendance_deduction, loan_deductions, \
     other_deductions, total_working_days, present_days, absent_days, leave_days, \
     daily_rate, taxable_income, total_earnings, total_deductions, net_salary, status, \
     payment_method, payment_date, settlement_applied, created_at, updated_at";

pub struct SqliteRepository {
    pool: SqlitePool,
}

impl SqliteRepository {
    /// Opens (creating if missing) the database at `database_url`.
    ///
    /// In-memory databases get a single long-lived connection so every
    /// query sees the same data.
    pub async fn new(database_url: &str) -> Result<Self> {
        let options = SqliteConnectOptions::from_str(database_url)
            .with_context(|| format!("Invalid database url: {}", database_url))?
            .create_if_missing(true);

        let pool_options = if database_url.contains(":memory:") {
            SqlitePoolOptions::new()
                .max_connections(1)
                .min_connections(1)
                .idle_timeout(None)
                .max_lifetime(None)
        } else {
            SqlitePoolOptions::new()
        };

        let pool = pool_options
            .connect_with(options)
            .await
            .with_context(|| format!("Failed to connect to database: {}", database_url))?;
        Ok(Self { pool })
    }

    pub async fn new_with_pool(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn run_migrations(&self) -> Result<()> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .context("Failed to run database migrations")?;
        Ok(())
    }

    /// Load and execute all SQL seed files from the specified directory.
    /// Files are executed in alphabetical order by filename.
    pub async fn run_seeds(
        &self,
        seeds_dir: &Path,
    ) -> Result<()> {
        let mut entries: Vec<_> = std::fs::read_dir(seeds_dir)
            .with_context(|| format!("Failed to read seeds directory '{}'", seeds_dir.display()))?
            .filter_map(|entry| entry.ok())
            .filter(|entry| entry.path().extension().is_some_and(|ext| ext == "sql"))
            .collect();

        entries.sort_by_key(|entry| entry.file_name());

        for entry in entries {
            let path = entry.path();
            let sql = std::fs::read_to_string(&path)
                .with_context(|| format!("Failed to read seed file '{}'", path.display()))?;

            sqlx::raw_sql(&sql)
                .execute(&self.pool)
                .await
                .with_context(|| format!("Failed to execute seed file '{}'", path.display()))?;
            debug!(seed = %path.display(), "applied seed file");
        }

        Ok(())
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

fn db_err(e: sqlx::Error) -> RepositoryError {
    match e.as_database_error() {
        Some(db) if db.is_unique_violation() => RepositoryError::Conflict(db.message().to_string()),
        _ => RepositoryError::Database(e.to_string()),
    }
}

fn column<'r, T>(
    row: &'r SqliteRow,
    name: &str,
) -> Result<T, RepositoryError>
where
    T: Decode<'r, Sqlite> + Type<Sqlite>,
{
    row.try_get(name)
        .map_err(|e| RepositoryError::Database(format!("Failed to get {}: {}", name, e)))
}

fn parse_column<T>(
    row: &SqliteRow,
    name: &str,
    parse: impl Fn(&str) -> Option<T>,
) -> Result<T, RepositoryError> {
    let raw: String = column(row, name)?;
    parse(&raw).ok_or_else(|| RepositoryError::Database(format!("Invalid {}: {}", name, raw)))
}

fn bind_allowances<'q>(
    mut query: SqliteQuery<'q>,
    allowances: &AllowanceSet,
) -> SqliteQuery<'q> {
    for kind in AllowanceKind::ALL {
        let allowance = allowances.get(kind);
        query = query
            .bind(allowance.is_active)
            .bind(decimal_to_text(allowance.amount));
    }
    query
}

fn read_allowances(row: &SqliteRow) -> Result<AllowanceSet, RepositoryError> {
    let mut allowances = AllowanceSet::default();
    for kind in AllowanceKind::ALL {
        let allowance = allowances.get_mut(kind);
        allowance.is_active = column(row, &format!("{}_active", kind.as_str()))?;
        allowance.amount = get_decimal(row, &format!("{}_amount", kind.as_str()))?;
    }
    Ok(allowances)
}

// ── Tax slab tables ─────────────────────────────────────────────────────────

fn row_to_tax_table(
    row: &SqliteRow,
    slabs: Vec<TaxSlab>,
) -> Result<TaxSlabTable, RepositoryError> {
    Ok(TaxSlabTable {
        id: column(row, "id")?,
        fiscal_year: column(row, "fiscal_year")?,
        description: column(row, "description")?,
        is_active: column(row, "is_active")?,
        slabs,
        created_at: column::<DateTime<Utc>>(row, "created_at")?,
        updated_at: column::<DateTime<Utc>>(row, "updated_at")?,
    })
}

async fn load_slabs(
    conn: &mut SqliteConnection,
    table_id: i64,
) -> Result<Vec<TaxSlab>, RepositoryError> {
    let rows = sqlx::query(
        "SELECT min_amount, max_amount, rate, fixed_tax
         FROM tax_slab WHERE table_id = ? ORDER BY position",
    )
    .bind(table_id)
    .fetch_all(&mut *conn)
    .await
    .map_err(db_err)?;

    rows.iter()
        .map(|row| -> Result<TaxSlab, RepositoryError> {
            Ok(TaxSlab {
                min_amount: get_decimal(row, "min_amount")?,
                max_amount: get_optional_decimal(row, "max_amount")?,
                rate: get_decimal(row, "rate")?,
                fixed_tax: get_decimal(row, "fixed_tax")?,
            })
        })
        .collect()
}

// ── Loans ───────────────────────────────────────────────────────────────────

fn row_to_installment(row: &SqliteRow) -> Result<LoanInstallment, RepositoryError> {
    Ok(LoanInstallment {
        installment_number: column(row, "installment_number")?,
        due_date: column(row, "due_date")?,
        amount: get_decimal(row, "amount")?,
        principal_portion: get_decimal(row, "principal_portion")?,
        interest_portion: get_decimal(row, "interest_portion")?,
        running_balance: get_decimal(row, "running_balance")?,
        status: parse_column(row, "status", InstallmentStatus::parse)?,
        paid_amount: get_decimal(row, "paid_amount")?,
        payment_date: column(row, "payment_date")?,
    })
}

fn row_to_loan(
    row: &SqliteRow,
    schedule: Vec<LoanInstallment>,
) -> Result<Loan, RepositoryError> {
    Ok(Loan {
        id: column(row, "id")?,
        employee_id: column(row, "employee_id")?,
        loan_type: parse_column(row, "loan_type", LoanType::parse)?,
        purpose: column(row, "purpose")?,
        principal: get_decimal(row, "principal")?,
        annual_interest_rate_percent: get_decimal(row, "annual_interest_rate_percent")?,
        term_months: column(row, "term_months")?,
        monthly_installment: get_decimal(row, "monthly_installment")?,
        total_payable: get_decimal(row, "total_payable")?,
        outstanding_balance: get_decimal(row, "outstanding_balance")?,
        total_paid: get_decimal(row, "total_paid")?,
        status: parse_column(row, "status", LoanStatus::parse)?,
        application_date: column(row, "application_date")?,
        approval_date: column(row, "approval_date")?,
        disbursement_date: column(row, "disbursement_date")?,
        completion_date: column(row, "completion_date")?,
        rejection_reason: column(row, "rejection_reason")?,
        needs_review: column(row, "needs_review")?,
        version: column(row, "version")?,
        schedule,
        created_at: column::<DateTime<Utc>>(row, "created_at")?,
        updated_at: column::<DateTime<Utc>>(row, "updated_at")?,
    })
}

async fn load_schedule(
    conn: &mut SqliteConnection,
    loan_id: i64,
) -> Result<Vec<LoanInstallment>, RepositoryError> {
    let rows = sqlx::query(
        "SELECT installment_number, due_date, amount, principal_portion, interest_portion,
                running_balance, status, paid_amount, payment_date
         FROM loan_installment WHERE loan_id = ? ORDER BY installment_number",
    )
    .bind(loan_id)
    .fetch_all(&mut *conn)
    .await
    .map_err(db_err)?;

    rows.iter().map(row_to_installment).collect()
}

async fn load_loans(
    conn: &mut SqliteConnection,
    rows: Vec<SqliteRow>,
) -> Result<Vec<Loan>, RepositoryError> {
    let mut loans = Vec::with_capacity(rows.len());
    for row in rows {
        let id: i64 = column(&row, "id")?;
        let schedule = load_schedule(conn, id).await?;
        loans.push(row_to_loan(&row, schedule)?);
    }
    Ok(loans)
}

async fn insert_schedule(
    conn: &mut SqliteConnection,
    loan_id: i64,
    schedule: &[LoanInstallment],
) -> Result<(), RepositoryError> {
    for installment in schedule {
        sqlx::query(
            "INSERT INTO loan_installment (
                loan_id, installment_number, due_date, amount, principal_portion,
                interest_portion, running_balance, status, paid_amount, payment_date
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(loan_id)
        .bind(installment.installment_number)
        .bind(installment.due_date)
        .bind(decimal_to_text(installment.amount))
        .bind(decimal_to_text(installment.principal_portion))
        .bind(decimal_to_text(installment.interest_portion))
        .bind(decimal_to_text(installment.running_balance))
        .bind(installment.status.as_str())
        .bind(decimal_to_text(installment.paid_amount))
        .bind(installment.payment_date)
        .execute(&mut *conn)
        .await
        .map_err(db_err)?;
    }
    Ok(())
}

/// Writes a loan if its version is current and returns the new version.
async fn save_loan_in(
    conn: &mut SqliteConnection,
    loan: &Loan,
) -> Result<i64, RepositoryError> {
    let result = sqlx::query(
        "UPDATE loan SET
            loan_type = ?, purpose = ?, principal = ?, annual_interest_rate_percent = ?,
            term_months = ?, application_date = ?,
            monthly_installment = ?, total_payable = ?, outstanding_balance = ?,
            total_paid = ?, status = ?, approval_date = ?, disbursement_date = ?,
            completion_date = ?, rejection_reason = ?, needs_review = ?,
            version = version + 1, updated_at = ?
         WHERE id = ? AND version = ?",
    )
    .bind(loan.loan_type.as_str())
    .bind(&loan.purpose)
    .bind(decimal_to_text(loan.principal))
    .bind(decimal_to_text(loan.annual_interest_rate_percent))
    .bind(loan.term_months)
    .bind(loan.application_date)
    .bind(decimal_to_text(loan.monthly_installment))
    .bind(decimal_to_text(loan.total_payable))
    .bind(decimal_to_text(loan.outstanding_balance))
    .bind(decimal_to_text(loan.total_paid))
    .bind(loan.status.as_str())
    .bind(loan.approval_date)
    .bind(loan.disbursement_date)
    .bind(loan.completion_date)
    .bind(loan.rejection_reason.as_deref())
    .bind(loan.needs_review)
    .bind(loan.updated_at)
    .bind(loan.id)
    .bind(loan.version)
    .execute(&mut *conn)
    .await
    .map_err(db_err)?;

    if result.rows_affected() == 0 {
        let current: Option<i64> = sqlx::query_scalar("SELECT version FROM loan WHERE id = ?")
            .bind(loan.id)
            .fetch_optional(&mut *conn)
            .await
            .map_err(db_err)?;
        return Err(match current {
            None => RepositoryError::NotFound,
            Some(version) => RepositoryError::Conflict(format!(
                "loan {} is at version {}, expected {}",
                loan.id, version, loan.version
            )),
        });
    }

    sqlx::query("DELETE FROM loan_installment WHERE loan_id = ?")
        .bind(loan.id)
        .execute(&mut *conn)
        .await
        .map_err(db_err)?;
    insert_schedule(conn, loan.id, &loan.schedule).await?;

    Ok(loan.version + 1)
}

// ── Employees and arrears ───────────────────────────────────────────────────

fn row_to_employee(
    row: &SqliteRow,
    arrears: Vec<Arrears>,
) -> Result<Employee, RepositoryError> {
    Ok(Employee {
        id: column(row, "id")?,
        employee_code: column(row, "employee_code")?,
        first_name: column(row, "first_name")?,
        last_name: column(row, "last_name")?,
        gross_salary: get_decimal(row, "gross_salary")?,
        is_active: column(row, "is_active")?,
        allowances: read_allowances(row)?,
        arrears,
    })
}

fn row_to_arrears(row: &SqliteRow) -> Result<Arrears, RepositoryError> {
    Ok(Arrears {
        kind: parse_column(row, "kind", ArrearsKind::parse)?,
        month: column(row, "month")?,
        year: column(row, "year")?,
        amount: get_decimal(row, "amount")?,
        description: column(row, "description")?,
        status: parse_column(row, "status", ArrearsStatus::parse)?,
        is_active: column(row, "is_active")?,
        paid_date: column(row, "paid_date")?,
    })
}

async fn load_arrears(
    conn: &mut SqliteConnection,
    employee_id: i64,
) -> Result<Vec<Arrears>, RepositoryError> {
    let rows = sqlx::query(
        "SELECT kind, month, year, amount, description, status, is_active, paid_date
         FROM employee_arrears WHERE employee_id = ? ORDER BY year, month, kind",
    )
    .bind(employee_id)
    .fetch_all(&mut *conn)
    .await
    .map_err(db_err)?;

    rows.iter().map(row_to_arrears).collect()
}

async fn upsert_arrears_in(
    conn: &mut SqliteConnection,
    employee_id: i64,
    arrears: &Arrears,
) -> Result<(), RepositoryError> {
    sqlx::query(
        "INSERT INTO employee_arrears (
            employee_id, kind, month, year, amount, description, status, is_active, paid_date
        ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
         ON CONFLICT (employee_id, kind, month, year) DO UPDATE SET
            amount = excluded.amount,
            description = excluded.description,
            status = excluded.status,
            is_active = excluded.is_active,
            paid_date = excluded.paid_date",
    )
    .bind(employee_id)
    .bind(arrears.kind.as_str())
    .bind(arrears.month)
    .bind(arrears.year)
    .bind(decimal_to_text(arrears.amount))
    .bind(arrears.description.as_deref())
    .bind(arrears.status.as_str())
    .bind(arrears.is_active)
    .bind(arrears.paid_date)
    .execute(&mut *conn)
    .await
    .map_err(db_err)?;
    Ok(())
}

async fn load_employees(
    conn: &mut SqliteConnection,
    rows: Vec<SqliteRow>,
) -> Result<Vec<Employee>, RepositoryError> {
    let mut employees = Vec::with_capacity(rows.len());
    for row in rows {
        let id: i64 = column(&row, "id")?;
        let arrears = load_arrears(conn, id).await?;
        employees.push(row_to_employee(&row, arrears)?);
    }
    Ok(employees)
}

// ── Payrolls ────────────────────────────────────────────────────────────────

fn row_to_payroll(row: &SqliteRow) -> Result<Payroll, RepositoryError> {
    let breakdown = PayrollBreakdown {
        gross_salary: get_decimal(row, "gross_salary")?,
        basic_salary: get_decimal(row, "basic_salary")?,
        house_rent_allowance: get_decimal(row, "house_rent_allowance")?,
        medical_allowance: get_decimal(row, "medical_allowance")?,
        additional_allowances: get_decimal(row, "additional_allowances")?,
        overtime_amount: get_decimal(row, "overtime_amount")?,
        performance_bonus: get_decimal(row, "performance_bonus")?,
        other_bonus: get_decimal(row, "other_bonus")?,
        arrears: get_decimal(row, "arrears")?,
        income_tax: get_decimal(row, "income_tax")?,
        arrears_tax: get_decimal(row, "arrears_tax")?,
        eobi: get_decimal(row, "eobi")?,
        provident_fund: get_decimal(row, "provident_fund")?,
        provident_fund_included: column(row, "provident_fund_included")?,
        health_insurance: get_decimal(row, "health_insurance")?,
        attendance_deduction: get_decimal(row, "attendance_deduction")?,
        loan_deductions: get_decimal(row, "loan_deductions")?,
        other_deductions: get_decimal(row, "other_deductions")?,
    };

    Ok(Payroll {
        id: column(row, "id")?,
        employee_id: column(row, "employee_id")?,
        month: column(row, "month")?,
        year: column(row, "year")?,
        breakdown,
        allowances: read_allowances(row)?,
        attendance: AttendanceSummary {
            total_working_days: column(row, "total_working_days")?,
            present_days: column(row, "present_days")?,
            absent_days: column(row, "absent_days")?,
            leave_days: column(row, "leave_days")?,
            daily_rate: get_decimal(row, "daily_rate")?,
        },
        taxable_income: get_decimal(row, "taxable_income")?,
        totals: PayrollTotals {
            total_earnings: get_decimal(row, "total_earnings")?,
            total_deductions: get_decimal(row, "total_deductions")?,
            net_salary: get_decimal(row, "net_salary")?,
        },
        status: parse_column(row, "status", PayrollStatus::parse)?,
        payment_method: column(row, "payment_method")?,
        payment_date: column(row, "payment_date")?,
        settlement_applied: column(row, "settlement_applied")?,
        created_at: column::<DateTime<Utc>>(row, "created_at")?,
        updated_at: column::<DateTime<Utc>>(row, "updated_at")?,
    })
}

/// Binds the computed columns shared by insert and update, in the order
/// `gross_salary .. other_deductions`, allowances, attendance, taxable income
/// and totals.
fn bind_payroll_figures<'q>(
    query: SqliteQuery<'q>,
    breakdown: &PayrollBreakdown,
    allowances: &AllowanceSet,
    attendance: &AttendanceSummary,
    taxable_income: Decimal,
    totals: &PayrollTotals,
) -> SqliteQuery<'q> {
    let query = query
        .bind(decimal_to_text(breakdown.gross_salary))
        .bind(decimal_to_text(breakdown.basic_salary))
        .bind(decimal_to_text(breakdown.house_rent_allowance))
        .bind(decimal_to_text(breakdown.medical_allowance))
        .bind(decimal_to_text(breakdown.additional_allowances))
        .bind(decimal_to_text(breakdown.overtime_amount))
        .bind(decimal_to_text(breakdown.performance_bonus))
        .bind(decimal_to_text(breakdown.other_bonus))
        .bind(decimal_to_text(breakdown.arrears))
        .bind(decimal_to_text(breakdown.income_tax))
        .bind(decimal_to_text(breakdown.arrears_tax))
        .bind(decimal_to_text(breakdown.eobi))
        .bind(decimal_to_text(breakdown.provident_fund))
        .bind(breakdown.provident_fund_included)
        .bind(decimal_to_text(breakdown.health_insurance))
        .bind(decimal_to_text(breakdown.attendance_deduction))
        .bind(decimal_to_text(breakdown.loan_deductions))
        .bind(decimal_to_text(breakdown.other_deductions));

    bind_allowances(query, allowances)
        .bind(attendance.total_working_days)
        .bind(attendance.present_days)
        .bind(attendance.absent_days)
        .bind(attendance.leave_days)
        .bind(decimal_to_text(attendance.daily_rate))
        .bind(decimal_to_text(taxable_income))
        .bind(decimal_to_text(totals.total_earnings))
        .bind(decimal_to_text(totals.total_deductions))
        .bind(decimal_to_text(totals.net_salary))
}

const PAYROLL_FIGURE_COLUMNS: &str = "gross_salary, basic_salary, house_rent_allowance, \
     medical_allowance, additional_allowances, overtime_amount, performance_bonus, \
     other_bonus, arrears, income_tax, arrears_tax, eobi, provident_fund, provident_fund_included, \
     health_insurance, attendance_deduction, loan_deductions, other_deductions";

const PAYROLL_TAIL_COLUMNS: &str = "total_working_days, present_days, absent_days, leave_days, \
     daily_rate, taxable_income, total_earnings, total_deductions, net_salary";

async fn insert_payroll(
    conn: &mut SqliteConnection,
    payroll: &NewPayroll,
) -> Result<i64, RepositoryError> {
    let now = Utc::now();
    // 3 key columns, 18 figures, 10 allowance columns, 9 tail columns,
    // status, settlement flag and two timestamps.
    let placeholders = vec!["?"; 44].join(", ");
    let sql = format!(
        "INSERT INTO payroll (employee_id, month, year, {PAYROLL_FIGURE_COLUMNS}, \
         {ALLOWANCE_COLUMNS}, {PAYROLL_TAIL_COLUMNS}, status, settlement_applied, \
         created_at, updated_at) VALUES ({placeholders})"
    );

    let query = sqlx::query(&sql)
        .bind(payroll.employee_id)
        .bind(payroll.month)
        .bind(payroll.year);

    let result = bind_payroll_figures(
        query,
        &payroll.breakdown,
        &payroll.allowances,
        &payroll.attendance,
        payroll.taxable_income,
        &payroll.totals,
    )
    .bind(PayrollStatus::Draft.as_str())
    .bind(payroll.settlement_applied)
    .bind(now)
    .bind(now)
    .execute(&mut *conn)
    .await
    .map_err(db_err)?;

    Ok(result.last_insert_rowid())
}

async fn update_payroll_in(
    conn: &mut SqliteConnection,
    payroll: &Payroll,
) -> Result<(), RepositoryError> {
    let assignments: Vec<String> = PAYROLL_FIGURE_COLUMNS
        .split(',')
        .chain(ALLOWANCE_COLUMNS.split(','))
        .chain(PAYROLL_TAIL_COLUMNS.split(','))
        .map(|name| format!("{} = ?", name.trim()))
        .collect();
    let sql = format!(
        "UPDATE payroll SET {}, status = ?, payment_method = ?, payment_date = ?, \
         settlement_applied = ?, updated_at = ? WHERE id = ?",
        assignments.join(", ")
    );

    let result = bind_payroll_figures(
        sqlx::query(&sql),
        &payroll.breakdown,
        &payroll.allowances,
        &payroll.attendance,
        payroll.taxable_income,
        &payroll.totals,
    )
    .bind(payroll.status.as_str())
    .bind(payroll.payment_method.as_deref())
    .bind(payroll.payment_date)
    .bind(payroll.settlement_applied)
    .bind(payroll.updated_at)
    .bind(payroll.id)
    .execute(&mut *conn)
    .await
    .map_err(db_err)?;

    if result.rows_affected() == 0 {
        return Err(RepositoryError::NotFound);
    }
    Ok(())
}

async fn fetch_payroll(
    conn: &mut SqliteConnection,
    id: i64,
) -> Result<Payroll, RepositoryError> {
    let sql = format!("SELECT {PAYROLL_COLUMNS}, {ALLOWANCE_COLUMNS} FROM payroll WHERE id = ?");
    let row = sqlx::query(&sql)
        .bind(id)
        .fetch_optional(&mut *conn)
        .await
        .map_err(db_err)?
        .ok_or(RepositoryError::NotFound)?;
    row_to_payroll(&row)
}

#[async_trait]
impl PayrollRepository for SqliteRepository {
    async fn create_tax_table(
        &self,
        table: NewTaxSlabTable,
    ) -> Result<TaxSlabTable, RepositoryError> {
        let now = Utc::now();
        let mut tx = self.pool.begin().await.map_err(db_err)?;

        if table.is_active {
            sqlx::query("UPDATE tax_slab_table SET is_active = 0 WHERE is_active = 1")
                .execute(&mut *tx)
                .await
                .map_err(db_err)?;
        }

        let id = sqlx::query(
            "INSERT INTO tax_slab_table (fiscal_year, description, is_active, created_at, updated_at)
             VALUES (?, ?, ?, ?, ?)",
        )
        .bind(&table.fiscal_year)
        .bind(table.description.as_deref())
        .bind(table.is_active)
        .bind(now)
        .bind(now)
        .execute(&mut *tx)
        .await
        .map_err(db_err)?
        .last_insert_rowid();

        for (position, slab) in table.slabs.iter().enumerate() {
            sqlx::query(
                "INSERT INTO tax_slab (table_id, position, min_amount, max_amount, rate, fixed_tax)
                 VALUES (?, ?, ?, ?, ?, ?)",
            )
            .bind(id)
            .bind(position as i64)
            .bind(decimal_to_text(slab.min_amount))
            .bind(slab.max_amount.map(decimal_to_text))
            .bind(decimal_to_text(slab.rate))
            .bind(decimal_to_text(slab.fixed_tax))
            .execute(&mut *tx)
            .await
            .map_err(db_err)?;
        }

        tx.commit().await.map_err(db_err)?;
        self.get_tax_table(id).await
    }

    async fn get_tax_table(&self, id: i64) -> Result<TaxSlabTable, RepositoryError> {
        let mut conn = self.pool.acquire().await.map_err(db_err)?;
        let row = sqlx::query(
            "SELECT id, fiscal_year, description, is_active, created_at, updated_at
             FROM tax_slab_table WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(&mut *conn)
        .await
        .map_err(db_err)?
        .ok_or(RepositoryError::NotFound)?;

        let slabs = load_slabs(&mut conn, id).await?;
        row_to_tax_table(&row, slabs)
    }

    async fn get_tax_table_by_year(
        &self,
        fiscal_year: &str,
    ) -> Result<TaxSlabTable, RepositoryError> {
        let id: i64 = sqlx::query_scalar("SELECT id FROM tax_slab_table WHERE fiscal_year = ?")
            .bind(fiscal_year)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_err)?
            .ok_or(RepositoryError::NotFound)?;
        self.get_tax_table(id).await
    }

    async fn get_active_tax_table(&self) -> Result<Option<TaxSlabTable>, RepositoryError> {
        let id: Option<i64> =
            sqlx::query_scalar("SELECT id FROM tax_slab_table WHERE is_active = 1")
                .fetch_optional(&self.pool)
                .await
                .map_err(db_err)?;

        match id {
            Some(id) => self.get_tax_table(id).await.map(Some),
            None => Ok(None),
        }
    }

    async fn list_tax_tables(&self) -> Result<Vec<TaxSlabTable>, RepositoryError> {
        let ids: Vec<i64> =
            sqlx::query_scalar("SELECT id FROM tax_slab_table ORDER BY fiscal_year DESC")
                .fetch_all(&self.pool)
                .await
                .map_err(db_err)?;

        let mut tables = Vec::with_capacity(ids.len());
        for id in ids {
            tables.push(self.get_tax_table(id).await?);
        }
        Ok(tables)
    }

    async fn activate_tax_table(&self, id: i64) -> Result<(), RepositoryError> {
        let mut tx = self.pool.begin().await.map_err(db_err)?;

        let exists: Option<i64> = sqlx::query_scalar("SELECT id FROM tax_slab_table WHERE id = ?")
            .bind(id)
            .fetch_optional(&mut *tx)
            .await
            .map_err(db_err)?;
        if exists.is_none() {
            return Err(RepositoryError::NotFound);
        }

        sqlx::query("UPDATE tax_slab_table SET is_active = 0, updated_at = ? WHERE is_active = 1")
            .bind(Utc::now())
            .execute(&mut *tx)
            .await
            .map_err(db_err)?;
        sqlx::query("UPDATE tax_slab_table SET is_active = 1, updated_at = ? WHERE id = ?")
            .bind(Utc::now())
            .bind(id)
            .execute(&mut *tx)
            .await
            .map_err(db_err)?;

        tx.commit().await.map_err(db_err)
    }

    async fn delete_tax_table(&self, id: i64) -> Result<(), RepositoryError> {
        let mut tx = self.pool.begin().await.map_err(db_err)?;

        sqlx::query("DELETE FROM tax_slab WHERE table_id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await
            .map_err(db_err)?;
        let result = sqlx::query("DELETE FROM tax_slab_table WHERE id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await
            .map_err(db_err)?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        tx.commit().await.map_err(db_err)
    }

    async fn create_employee(&self, employee: NewEmployee) -> Result<Employee, RepositoryError> {
        let sql = format!(
            "INSERT INTO employee (employee_code, first_name, last_name, gross_salary, is_active, \
             {ALLOWANCE_COLUMNS}) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)"
        );
        let mut tx = self.pool.begin().await.map_err(db_err)?;
        let query = sqlx::query(&sql)
            .bind(&employee.employee_code)
            .bind(&employee.first_name)
            .bind(&employee.last_name)
            .bind(decimal_to_text(employee.gross_salary))
            .bind(employee.is_active);

        let id = bind_allowances(query, &employee.allowances)
            .execute(&mut *tx)
            .await
            .map_err(db_err)?
            .last_insert_rowid();

        for arrears in &employee.arrears {
            upsert_arrears_in(&mut tx, id, arrears).await?;
        }
        tx.commit().await.map_err(db_err)?;

        self.get_employee(id).await
    }

    async fn get_employee(&self, id: i64) -> Result<Employee, RepositoryError> {
        let mut conn = self.pool.acquire().await.map_err(db_err)?;
        let sql =
            format!("SELECT {EMPLOYEE_COLUMNS}, {ALLOWANCE_COLUMNS} FROM employee WHERE id = ?");
        let row = sqlx::query(&sql)
            .bind(id)
            .fetch_optional(&mut *conn)
            .await
            .map_err(db_err)?
            .ok_or(RepositoryError::NotFound)?;

        let arrears = load_arrears(&mut conn, id).await?;
        row_to_employee(&row, arrears)
    }

    async fn list_active_employees(&self) -> Result<Vec<Employee>, RepositoryError> {
        let sql = format!(
            "SELECT {EMPLOYEE_COLUMNS}, {ALLOWANCE_COLUMNS} FROM employee \
             WHERE is_active = 1 ORDER BY id"
        );
        let mut conn = self.pool.acquire().await.map_err(db_err)?;
        let rows = sqlx::query(&sql)
            .fetch_all(&mut *conn)
            .await
            .map_err(db_err)?;
        load_employees(&mut conn, rows).await
    }

    async fn upsert_arrears(
        &self,
        employee_id: i64,
        arrears: &Arrears,
    ) -> Result<(), RepositoryError> {
        let mut conn = self.pool.acquire().await.map_err(db_err)?;
        upsert_arrears_in(&mut conn, employee_id, arrears).await
    }

    async fn mark_arrears_paid(
        &self,
        employee_id: i64,
        month: u32,
        year: i32,
        paid_on: NaiveDate,
    ) -> Result<u64, RepositoryError> {
        let result = sqlx::query(
            "UPDATE employee_arrears SET status = ?, paid_date = ?
             WHERE employee_id = ? AND month = ? AND year = ? AND is_active = 1
               AND status NOT IN (?, ?)",
        )
        .bind(ArrearsStatus::Paid.as_str())
        .bind(paid_on)
        .bind(employee_id)
        .bind(month)
        .bind(year)
        .bind(ArrearsStatus::Paid.as_str())
        .bind(ArrearsStatus::Cancelled.as_str())
        .execute(&self.pool)
        .await
        .map_err(db_err)?;
        Ok(result.rows_affected())
    }

    async fn upsert_attendance(&self, record: &AttendanceRecord) -> Result<(), RepositoryError> {
        sqlx::query(
            "INSERT INTO attendance (employee_id, month, year, total_working_days, present_days, leave_days)
             VALUES (?, ?, ?, ?, ?, ?)
             ON CONFLICT (employee_id, month, year) DO UPDATE SET
                total_working_days = excluded.total_working_days,
                present_days = excluded.present_days,
                leave_days = excluded.leave_days",
        )
        .bind(record.employee_id)
        .bind(record.month)
        .bind(record.year)
        .bind(record.total_working_days)
        .bind(record.present_days)
        .bind(record.leave_days)
        .execute(&self.pool)
        .await
        .map_err(db_err)?;
        Ok(())
    }

    async fn get_attendance(
        &self,
        employee_id: i64,
        month: u32,
        year: i32,
    ) -> Result<Option<AttendanceRecord>, RepositoryError> {
        let row = sqlx::query(
            "SELECT employee_id, month, year, total_working_days, present_days, leave_days
             FROM attendance WHERE employee_id = ? AND month = ? AND year = ?",
        )
        .bind(employee_id)
        .bind(month)
        .bind(year)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_err)?;

        row.map(|row| -> Result<AttendanceRecord, RepositoryError> {
            Ok(AttendanceRecord {
                employee_id: column(&row, "employee_id")?,
                month: column(&row, "month")?,
                year: column(&row, "year")?,
                total_working_days: column(&row, "total_working_days")?,
                present_days: column(&row, "present_days")?,
                leave_days: column(&row, "leave_days")?,
            })
        })
        .transpose()
    }

    async fn create_loan(
        &self,
        application: NewLoan,
        schedule: AmortizationSchedule,
    ) -> Result<Loan, RepositoryError> {
        let now = Utc::now();
        let mut tx = self.pool.begin().await.map_err(db_err)?;

        let id = sqlx::query(
            "INSERT INTO loan (
                employee_id, loan_type, purpose, principal, annual_interest_rate_percent,
                term_months, monthly_installment, total_payable, outstanding_balance,
                total_paid, status, application_date, needs_review, version,
                created_at, updated_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, '0', ?, ?, 0, 1, ?, ?)",
        )
        .bind(application.employee_id)
        .bind(application.loan_type.as_str())
        .bind(&application.purpose)
        .bind(decimal_to_text(application.principal))
        .bind(decimal_to_text(application.annual_interest_rate_percent))
        .bind(application.term_months)
        .bind(decimal_to_text(schedule.monthly_installment))
        .bind(decimal_to_text(schedule.total_payable))
        .bind(decimal_to_text(schedule.total_payable))
        .bind(LoanStatus::Pending.as_str())
        .bind(application.application_date)
        .bind(now)
        .bind(now)
        .execute(&mut *tx)
        .await
        .map_err(db_err)?
        .last_insert_rowid();

        insert_schedule(&mut tx, id, &schedule.installments).await?;
        tx.commit().await.map_err(db_err)?;

        self.get_loan(id).await
    }

    async fn get_loan(&self, id: i64) -> Result<Loan, RepositoryError> {
        let mut conn = self.pool.acquire().await.map_err(db_err)?;
        let sql = format!("SELECT {LOAN_COLUMNS} FROM loan WHERE id = ?");
        let row = sqlx::query(&sql)
            .bind(id)
            .fetch_optional(&mut *conn)
            .await
            .map_err(db_err)?
            .ok_or(RepositoryError::NotFound)?;

        let schedule = load_schedule(&mut conn, id).await?;
        row_to_loan(&row, schedule)
    }

    async fn list_employee_loans(&self, employee_id: i64) -> Result<Vec<Loan>, RepositoryError> {
        let mut conn = self.pool.acquire().await.map_err(db_err)?;
        let sql = format!("SELECT {LOAN_COLUMNS} FROM loan WHERE employee_id = ? ORDER BY id");
        let rows = sqlx::query(&sql)
            .bind(employee_id)
            .fetch_all(&mut *conn)
            .await
            .map_err(db_err)?;
        load_loans(&mut conn, rows).await
    }

    async fn list_loans(&self, status: Option<LoanStatus>) -> Result<Vec<Loan>, RepositoryError> {
        let mut conn = self.pool.acquire().await.map_err(db_err)?;
        let rows = match status {
            Some(status) => {
                let sql = format!("SELECT {LOAN_COLUMNS} FROM loan WHERE status = ? ORDER BY id");
                sqlx::query(&sql)
                    .bind(status.as_str())
                    .fetch_all(&mut *conn)
                    .await
            }
            None => {
                let sql = format!("SELECT {LOAN_COLUMNS} FROM loan ORDER BY id");
                sqlx::query(&sql).fetch_all(&mut *conn).await
            }
        }
        .map_err(db_err)?;
        load_loans(&mut conn, rows).await
    }

    async fn save_loan(&self, loan: &Loan) -> Result<i64, RepositoryError> {
        let mut tx = self.pool.begin().await.map_err(db_err)?;
        let version = save_loan_in(&mut tx, loan).await?;
        tx.commit().await.map_err(db_err)?;
        Ok(version)
    }

    async fn delete_loan(&self, id: i64) -> Result<(), RepositoryError> {
        let result = sqlx::query("DELETE FROM loan WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(db_err)?;
        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }

    async fn create_payroll(&self, payroll: NewPayroll) -> Result<Payroll, RepositoryError> {
        let mut conn = self.pool.acquire().await.map_err(db_err)?;
        let id = insert_payroll(&mut conn, &payroll).await?;
        fetch_payroll(&mut conn, id).await
    }

    async fn replace_payroll(
        &self,
        existing_id: i64,
        payroll: NewPayroll,
    ) -> Result<Payroll, RepositoryError> {
        let mut tx = self.pool.begin().await.map_err(db_err)?;

        let result = sqlx::query("DELETE FROM payroll WHERE id = ?")
            .bind(existing_id)
            .execute(&mut *tx)
            .await
            .map_err(db_err)?;
        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }

        let id = insert_payroll(&mut tx, &payroll).await?;
        let created = fetch_payroll(&mut tx, id).await?;
        tx.commit().await.map_err(db_err)?;
        Ok(created)
    }

    async fn get_payroll(&self, id: i64) -> Result<Payroll, RepositoryError> {
        let mut conn = self.pool.acquire().await.map_err(db_err)?;
        fetch_payroll(&mut conn, id).await
    }

    async fn find_payroll(
        &self,
        employee_id: i64,
        month: u32,
        year: i32,
    ) -> Result<Option<Payroll>, RepositoryError> {
        let sql = format!(
            "SELECT {PAYROLL_COLUMNS}, {ALLOWANCE_COLUMNS} FROM payroll \
             WHERE employee_id = ? AND month = ? AND year = ?"
        );
        let row = sqlx::query(&sql)
            .bind(employee_id)
            .bind(month)
            .bind(year)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_err)?;
        row.as_ref().map(row_to_payroll).transpose()
    }

    async fn list_payrolls(&self, month: u32, year: i32) -> Result<Vec<Payroll>, RepositoryError> {
        let sql = format!(
            "SELECT {PAYROLL_COLUMNS}, {ALLOWANCE_COLUMNS} FROM payroll \
             WHERE month = ? AND year = ? ORDER BY employee_id"
        );
        let rows = sqlx::query(&sql)
            .bind(month)
            .bind(year)
            .fetch_all(&self.pool)
            .await
            .map_err(db_err)?;
        rows.iter().map(row_to_payroll).collect()
    }

    async fn update_payroll(&self, payroll: &Payroll) -> Result<(), RepositoryError> {
        let mut conn = self.pool.acquire().await.map_err(db_err)?;
        update_payroll_in(&mut conn, payroll).await
    }

    async fn delete_payroll(&self, id: i64) -> Result<(), RepositoryError> {
        let result = sqlx::query("DELETE FROM payroll WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(db_err)?;
        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }

    async fn commit_settlement(
        &self,
        payroll: &Payroll,
        loans: &[Loan],
    ) -> Result<(), RepositoryError> {
        let mut tx = self.pool.begin().await.map_err(db_err)?;

        update_payroll_in(&mut tx, payroll).await?;
        for loan in loans {
            save_loan_in(&mut tx, loan).await?;
        }

        tx.commit().await.map_err(db_err)
    }
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;
    use payroll_core::calculations::{apply_payment, compute_schedule};
    use payroll_core::Allowance;
    use pretty_assertions::assert_eq;
    use rust_decimal_macros::dec;

    use super::*;

    async fn setup_test_db() -> SqliteRepository {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .expect("Failed to create in-memory database");

        let repo = SqliteRepository::new_with_pool(pool).await;
        repo.run_migrations()
            .await
            .expect("Failed to run migrations");
        repo
    }

    fn date(
        year: i32,
        month: u32,
        day: u32,
    ) -> NaiveDate {
        NaiveDate::from_ymd_opt(year, month, day).unwrap()
    }

    fn slabs() -> Vec<TaxSlab> {
        vec![
            TaxSlab {
                min_amount: dec!(0),
                max_amount: Some(dec!(600000)),
                rate: dec!(0),
                fixed_tax: dec!(0),
            },
            TaxSlab {
                min_amount: dec!(600001),
                max_amount: None,
                rate: dec!(5),
                fixed_tax: dec!(0),
            },
        ]
    }

    fn new_table(
        fiscal_year: &str,
        is_active: bool,
    ) -> NewTaxSlabTable {
        NewTaxSlabTable {
            fiscal_year: fiscal_year.to_string(),
            description: Some(format!("Test {}", fiscal_year)),
            is_active,
            slabs: slabs(),
        }
    }

    async fn insert_employee(repo: &SqliteRepository) -> Employee {
        let mut allowances = AllowanceSet::default();
        allowances.conveyance = Allowance::active(dec!(5000));
        allowances.food = Allowance {
            is_active: false,
            amount: dec!(2500.50),
        };

        repo.create_employee(NewEmployee {
            employee_code: "EMP-001".to_string(),
            first_name: "Ayesha".to_string(),
            last_name: "Khan".to_string(),
            gross_salary: dec!(150000),
            is_active: true,
            allowances,
            arrears: Vec::new(),
        })
        .await
        .expect("Failed to create employee")
    }

    async fn insert_loan(
        repo: &SqliteRepository,
        employee_id: i64,
    ) -> Loan {
        let application = NewLoan {
            employee_id,
            loan_type: LoanType::Personal,
            purpose: "Car repair".to_string(),
            principal: dec!(120000),
            annual_interest_rate_percent: dec!(12),
            term_months: 12,
            application_date: date(2025, 1, 10),
        };
        let schedule = compute_schedule(
            application.principal,
            application.annual_interest_rate_percent,
            application.term_months,
            application.application_date,
        )
        .unwrap();

        repo.create_loan(application, schedule)
            .await
            .expect("Failed to create loan")
    }

    fn new_payroll(employee_id: i64) -> NewPayroll {
        let breakdown = PayrollBreakdown {
            gross_salary: dec!(50000),
            basic_salary: dec!(33330),
            house_rent_allowance: dec!(11670),
            medical_allowance: dec!(5000),
            additional_allowances: dec!(0),
            overtime_amount: dec!(0),
            performance_bonus: dec!(0),
            other_bonus: dec!(0),
            arrears: dec!(0),
            income_tax: dec!(0),
            arrears_tax: dec!(0),
            eobi: dec!(370),
            provident_fund: dec!(2780),
            provident_fund_included: false,
            health_insurance: dec!(0),
            attendance_deduction: dec!(0),
            loan_deductions: dec!(0),
            other_deductions: dec!(0),
        };
        let totals = breakdown.compute_totals();

        NewPayroll {
            employee_id,
            month: 3,
            year: 2025,
            breakdown,
            allowances: AllowanceSet::default(),
            attendance: AttendanceSummary {
                total_working_days: 26,
                present_days: 26,
                absent_days: 0,
                leave_days: 0,
                daily_rate: dec!(1923.08),
            },
            taxable_income: dec!(45000),
            totals,
            settlement_applied: false,
        }
    }

    // ── Tax slab tables ──────────────────────────────────────────────────────

    #[tokio::test]
    async fn create_and_get_tax_table_keeps_slab_order() {
        let repo = setup_test_db().await;

        let created = repo.create_tax_table(new_table("2030-2031", false)).await.unwrap();
        let fetched = repo.get_tax_table_by_year("2030-2031").await.unwrap();

        assert_eq!(fetched, created);
        assert_eq!(fetched.slabs, slabs());
        assert!(!fetched.is_active);
    }

    #[tokio::test]
    async fn activating_a_table_deactivates_the_previous_one() {
        let repo = setup_test_db().await;
        let first = repo.create_tax_table(new_table("2030-2031", true)).await.unwrap();
        let second = repo.create_tax_table(new_table("2031-2032", false)).await.unwrap();

        repo.activate_tax_table(second.id).await.unwrap();

        let active = repo.get_active_tax_table().await.unwrap().unwrap();
        assert_eq!(active.id, second.id);
        assert!(!repo.get_tax_table(first.id).await.unwrap().is_active);
    }

    #[tokio::test]
    async fn activating_missing_table_is_not_found() {
        let repo = setup_test_db().await;

        assert_eq!(repo.activate_tax_table(999).await, Err(RepositoryError::NotFound));
    }

    #[tokio::test]
    async fn no_active_table_is_none() {
        let repo = setup_test_db().await;
        repo.create_tax_table(new_table("2030-2031", false)).await.unwrap();

        assert_eq!(repo.get_active_tax_table().await, Ok(None));
    }

    #[tokio::test]
    async fn duplicate_fiscal_year_is_a_conflict() {
        let repo = setup_test_db().await;
        repo.create_tax_table(new_table("2030-2031", false)).await.unwrap();

        let result = repo.create_tax_table(new_table("2030-2031", false)).await;

        assert!(matches!(result, Err(RepositoryError::Conflict(_))));
    }

    #[tokio::test]
    async fn delete_tax_table_removes_it() {
        let repo = setup_test_db().await;
        let table = repo.create_tax_table(new_table("2030-2031", false)).await.unwrap();

        repo.delete_tax_table(table.id).await.unwrap();

        assert_eq!(repo.get_tax_table(table.id).await, Err(RepositoryError::NotFound));
        assert_eq!(repo.delete_tax_table(table.id).await, Err(RepositoryError::NotFound));
    }

    #[tokio::test]
    async fn seeds_install_active_fbr_table_once() {
        let repo = setup_test_db().await;
        let seeds = Path::new(env!("CARGO_MANIFEST_DIR")).join("seeds");

        repo.run_seeds(&seeds).await.unwrap();
        repo.run_seeds(&seeds).await.unwrap();

        let active = repo.get_active_tax_table().await.unwrap().unwrap();
        assert_eq!(active.fiscal_year, "2025-2026");
        assert_eq!(active.slabs.len(), 6);
        assert_eq!(active.slabs[5].max_amount, None);
        assert_eq!(active.slabs[5].fixed_tax, dec!(616000));
        assert_eq!(repo.list_tax_tables().await.unwrap().len(), 1);
    }

    // ── Employees and attendance ─────────────────────────────────────────────

    #[tokio::test]
    async fn employee_round_trips_allowances() {
        let repo = setup_test_db().await;
        let employee = insert_employee(&repo).await;

        let fetched = repo.get_employee(employee.id).await.unwrap();

        assert_eq!(fetched.allowances.conveyance, Allowance::active(dec!(5000)));
        assert!(!fetched.allowances.food.is_active);
        assert_eq!(fetched.allowances.food.amount, dec!(2500.50));
        assert_eq!(fetched.allowances.active_total(), dec!(5000));
    }

    #[tokio::test]
    async fn list_active_employees_skips_inactive() {
        let repo = setup_test_db().await;
        let active = insert_employee(&repo).await;
        repo.create_employee(NewEmployee {
            employee_code: "EMP-002".to_string(),
            first_name: "Bilal".to_string(),
            last_name: "Ahmed".to_string(),
            gross_salary: dec!(80000),
            is_active: false,
            allowances: AllowanceSet::default(),
            arrears: Vec::new(),
        })
        .await
        .unwrap();

        let employees = repo.list_active_employees().await.unwrap();

        assert_eq!(employees.len(), 1);
        assert_eq!(employees[0].id, active.id);
    }

    #[tokio::test]
    async fn arrears_upsert_replaces_the_entry_for_its_kind_and_period() {
        let repo = setup_test_db().await;
        let employee = insert_employee(&repo).await;
        let mut salary = Arrears::pending(ArrearsKind::SalaryAdjustment, 3, 2025, dec!(10000));
        let bonus = Arrears::pending(ArrearsKind::BonusPayment, 3, 2025, dec!(2500.50));

        repo.upsert_arrears(employee.id, &salary).await.unwrap();
        repo.upsert_arrears(employee.id, &bonus).await.unwrap();
        salary.amount = dec!(12000);
        salary.description = Some("March increment".to_string());
        repo.upsert_arrears(employee.id, &salary).await.unwrap();

        let fetched = repo.get_employee(employee.id).await.unwrap();
        assert_eq!(fetched.arrears.len(), 2);
        assert!(fetched.arrears.contains(&salary));
        assert!(fetched.arrears.contains(&bonus));
        assert_eq!(fetched.arrears_due(3, 2025), dec!(14500.50));
    }

    #[tokio::test]
    async fn mark_arrears_paid_skips_cancelled_and_other_periods() {
        let repo = setup_test_db().await;
        let employee = insert_employee(&repo).await;
        let mut cancelled = Arrears::pending(ArrearsKind::Other, 3, 2025, dec!(700));
        cancelled.status = ArrearsStatus::Cancelled;
        for arrears in [
            Arrears::pending(ArrearsKind::SalaryAdjustment, 3, 2025, dec!(10000)),
            Arrears::pending(ArrearsKind::SalaryAdjustment, 4, 2025, dec!(10000)),
            cancelled,
        ] {
            repo.upsert_arrears(employee.id, &arrears).await.unwrap();
        }

        let changed = repo
            .mark_arrears_paid(employee.id, 3, 2025, date(2025, 3, 31))
            .await
            .unwrap();

        assert_eq!(changed, 1);
        let fetched = repo.get_employee(employee.id).await.unwrap();
        let statuses: Vec<(u32, ArrearsStatus, Option<NaiveDate>)> = fetched
            .arrears
            .iter()
            .map(|arrears| (arrears.month, arrears.status, arrears.paid_date))
            .collect();
        assert_eq!(
            statuses,
            vec![
                (3, ArrearsStatus::Cancelled, None),
                (3, ArrearsStatus::Paid, Some(date(2025, 3, 31))),
                (4, ArrearsStatus::Pending, None),
            ]
        );
    }

    #[tokio::test]
    async fn upsert_attendance_replaces_the_month() {
        let repo = setup_test_db().await;
        let employee = insert_employee(&repo).await;
        let mut record = AttendanceRecord {
            employee_id: employee.id,
            month: 3,
            year: 2025,
            total_working_days: 26,
            present_days: 22,
            leave_days: 1,
        };

        repo.upsert_attendance(&record).await.unwrap();
        record.present_days = 24;
        repo.upsert_attendance(&record).await.unwrap();

        assert_eq!(repo.get_attendance(employee.id, 3, 2025).await, Ok(Some(record)));
        assert_eq!(repo.get_attendance(employee.id, 4, 2025).await, Ok(None));
    }

    // ── Loans ────────────────────────────────────────────────────────────────

    #[tokio::test]
    async fn create_loan_stores_pending_loan_with_schedule() {
        let repo = setup_test_db().await;
        let employee = insert_employee(&repo).await;

        let loan = insert_loan(&repo, employee.id).await;

        assert_eq!(loan.status, LoanStatus::Pending);
        assert_eq!(loan.version, 1);
        assert_eq!(loan.monthly_installment, dec!(10661.85));
        assert_eq!(loan.outstanding_balance, loan.total_payable);
        assert_eq!(loan.total_paid, Decimal::ZERO);
        assert_eq!(loan.schedule.len(), 12);
        assert_eq!(loan.schedule[0].interest_portion, dec!(1200));
        assert_eq!(loan.schedule[0].due_date, date(2025, 2, 10));
    }

    #[tokio::test]
    async fn save_loan_bumps_version_and_persists_schedule() {
        let repo = setup_test_db().await;
        let employee = insert_employee(&repo).await;
        let mut loan = insert_loan(&repo, employee.id).await;
        loan.status = LoanStatus::Active;
        apply_payment(&mut loan, dec!(15000), date(2025, 2, 10)).unwrap();

        let version = repo.save_loan(&loan).await.unwrap();

        let fetched = repo.get_loan(loan.id).await.unwrap();
        assert_eq!(version, 2);
        assert_eq!(fetched.version, 2);
        assert_eq!(fetched.total_paid, dec!(15000));
        assert_eq!(fetched.schedule[0].status, InstallmentStatus::Paid);
        assert_eq!(fetched.schedule[1].status, InstallmentStatus::Partial);
        assert_eq!(fetched.schedule[1].payment_date, Some(date(2025, 2, 10)));
    }

    #[tokio::test]
    async fn stale_loan_save_is_a_conflict() {
        let repo = setup_test_db().await;
        let employee = insert_employee(&repo).await;
        let loan = insert_loan(&repo, employee.id).await;
        let stale = loan.clone();

        repo.save_loan(&loan).await.unwrap();
        let result = repo.save_loan(&stale).await;

        assert!(matches!(result, Err(RepositoryError::Conflict(_))));
    }

    #[tokio::test]
    async fn list_loans_filters_by_status() {
        let repo = setup_test_db().await;
        let employee = insert_employee(&repo).await;
        let mut first = insert_loan(&repo, employee.id).await;
        insert_loan(&repo, employee.id).await;
        first.status = LoanStatus::Approved;
        repo.save_loan(&first).await.unwrap();

        let approved = repo.list_loans(Some(LoanStatus::Approved)).await.unwrap();
        let all = repo.list_employee_loans(employee.id).await.unwrap();

        assert_eq!(approved.len(), 1);
        assert_eq!(approved[0].id, first.id);
        assert_eq!(all.len(), 2);
    }

    #[tokio::test]
    async fn save_loan_persists_revised_terms() {
        let repo = setup_test_db().await;
        let employee = insert_employee(&repo).await;
        let mut loan = insert_loan(&repo, employee.id).await;
        let schedule = compute_schedule(dec!(60000), dec!(0), 6, loan.application_date).unwrap();
        loan.principal = dec!(60000);
        loan.annual_interest_rate_percent = dec!(0);
        loan.term_months = 6;
        loan.purpose = "Laptop".to_string();
        loan.monthly_installment = schedule.monthly_installment;
        loan.total_payable = schedule.total_payable;
        loan.outstanding_balance = schedule.total_payable;
        loan.schedule = schedule.installments;

        repo.save_loan(&loan).await.unwrap();

        let fetched = repo.get_loan(loan.id).await.unwrap();
        assert_eq!(fetched.principal, dec!(60000));
        assert_eq!(fetched.term_months, 6);
        assert_eq!(fetched.purpose, "Laptop");
        assert_eq!(fetched.monthly_installment, dec!(10000));
        assert_eq!(fetched.schedule.len(), 6);
    }

    #[tokio::test]
    async fn delete_loan_removes_loan_and_schedule() {
        let repo = setup_test_db().await;
        let employee = insert_employee(&repo).await;
        let loan = insert_loan(&repo, employee.id).await;

        repo.delete_loan(loan.id).await.unwrap();

        assert_eq!(repo.get_loan(loan.id).await, Err(RepositoryError::NotFound));
        assert_eq!(repo.delete_loan(loan.id).await, Err(RepositoryError::NotFound));
        let orphans: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM loan_installment WHERE loan_id = ?")
                .bind(loan.id)
                .fetch_one(repo.pool())
                .await
                .unwrap();
        assert_eq!(orphans, 0);
    }

    // ── Payrolls ─────────────────────────────────────────────────────────────

    #[tokio::test]
    async fn create_and_find_payroll() {
        let repo = setup_test_db().await;
        let employee = insert_employee(&repo).await;

        let created = repo.create_payroll(new_payroll(employee.id)).await.unwrap();
        let found = repo.find_payroll(employee.id, 3, 2025).await.unwrap().unwrap();

        assert_eq!(found, created);
        assert_eq!(found.status, PayrollStatus::Draft);
        assert_eq!(found.totals.net_salary, dec!(49630));
        assert_eq!(found.attendance.daily_rate, dec!(1923.08));
    }

    #[tokio::test]
    async fn duplicate_period_is_a_conflict() {
        let repo = setup_test_db().await;
        let employee = insert_employee(&repo).await;
        repo.create_payroll(new_payroll(employee.id)).await.unwrap();

        let result = repo.create_payroll(new_payroll(employee.id)).await;

        assert!(matches!(result, Err(RepositoryError::Conflict(_))));
    }

    #[tokio::test]
    async fn replace_payroll_swaps_the_record() {
        let repo = setup_test_db().await;
        let employee = insert_employee(&repo).await;
        let original = repo.create_payroll(new_payroll(employee.id)).await.unwrap();
        let mut replacement = new_payroll(employee.id);
        replacement.breakdown.overtime_amount = dec!(4000);
        replacement.totals = replacement.breakdown.compute_totals();

        let replaced = repo.replace_payroll(original.id, replacement).await.unwrap();

        assert_ne!(replaced.id, original.id);
        assert_eq!(repo.get_payroll(original.id).await, Err(RepositoryError::NotFound));
        assert_eq!(repo.list_payrolls(3, 2025).await.unwrap().len(), 1);
        assert_eq!(replaced.totals.total_earnings, dec!(54000));
    }

    #[tokio::test]
    async fn update_payroll_persists_status_and_payment() {
        let repo = setup_test_db().await;
        let employee = insert_employee(&repo).await;
        let mut payroll = repo.create_payroll(new_payroll(employee.id)).await.unwrap();
        payroll.status = PayrollStatus::Paid;
        payroll.payment_method = Some("Bank Transfer".to_string());
        payroll.payment_date = Some(date(2025, 3, 31));
        payroll.settlement_applied = true;

        repo.update_payroll(&payroll).await.unwrap();

        assert_eq!(repo.get_payroll(payroll.id).await.unwrap(), payroll);
    }

    #[tokio::test]
    async fn failed_settlement_rolls_back_the_payroll() {
        let repo = setup_test_db().await;
        let employee = insert_employee(&repo).await;
        let loan = insert_loan(&repo, employee.id).await;
        let mut payroll = repo.create_payroll(new_payroll(employee.id)).await.unwrap();
        let stale = loan.clone();
        repo.save_loan(&loan).await.unwrap();

        payroll.settlement_applied = true;
        let result = repo.commit_settlement(&payroll, &[stale]).await;

        assert!(matches!(result, Err(RepositoryError::Conflict(_))));
        assert!(!repo.get_payroll(payroll.id).await.unwrap().settlement_applied);
    }
}
