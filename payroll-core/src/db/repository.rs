use async_trait::async_trait;
use chrono::NaiveDate;
use thiserror::Error;

use crate::calculations::AmortizationSchedule;
use crate::models::{
    Arrears, AttendanceRecord, Employee, Loan, LoanStatus, NewEmployee, NewLoan, NewPayroll,
    NewTaxSlabTable, Payroll, TaxSlabTable,
};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RepositoryError {
    #[error("Record not found")]
    NotFound,

    #[error("Database error: {0}")]
    Database(String),

    #[error("Connection error: {0}")]
    Connection(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    /// A concurrent writer changed the record first.
    #[error("Conflict: {0}")]
    Conflict(String),
}

#[async_trait]
pub trait PayrollRepository: Send + Sync {
    // Tax slab tables
    async fn create_tax_table(
        &self,
        table: NewTaxSlabTable,
    ) -> Result<TaxSlabTable, RepositoryError>;
    async fn get_tax_table(&self, id: i64) -> Result<TaxSlabTable, RepositoryError>;
    async fn get_tax_table_by_year(
        &self,
        fiscal_year: &str,
    ) -> Result<TaxSlabTable, RepositoryError>;
    async fn get_active_tax_table(&self) -> Result<Option<TaxSlabTable>, RepositoryError>;
    async fn list_tax_tables(&self) -> Result<Vec<TaxSlabTable>, RepositoryError>;
    /// Activates one table and deactivates every other, atomically.
    async fn activate_tax_table(&self, id: i64) -> Result<(), RepositoryError>;
    async fn delete_tax_table(&self, id: i64) -> Result<(), RepositoryError>;

    // Employees
    async fn create_employee(&self, employee: NewEmployee) -> Result<Employee, RepositoryError>;
    async fn get_employee(&self, id: i64) -> Result<Employee, RepositoryError>;
    async fn list_active_employees(&self) -> Result<Vec<Employee>, RepositoryError>;

    // Arrears
    /// Inserts or replaces the arrears entry keyed by employee, kind and period.
    async fn upsert_arrears(
        &self,
        employee_id: i64,
        arrears: &Arrears,
    ) -> Result<(), RepositoryError>;
    /// Marks an employee's outstanding arrears for the period Paid and
    /// returns how many changed.
    async fn mark_arrears_paid(
        &self,
        employee_id: i64,
        month: u32,
        year: i32,
        paid_on: NaiveDate,
    ) -> Result<u64, RepositoryError>;

    // Attendance
    async fn upsert_attendance(&self, record: &AttendanceRecord) -> Result<(), RepositoryError>;
    async fn get_attendance(
        &self,
        employee_id: i64,
        month: u32,
        year: i32,
    ) -> Result<Option<AttendanceRecord>, RepositoryError>;

    // Loans
    /// Stores a Pending loan with its computed schedule.
    async fn create_loan(
        &self,
        application: NewLoan,
        schedule: AmortizationSchedule,
    ) -> Result<Loan, RepositoryError>;
    async fn get_loan(&self, id: i64) -> Result<Loan, RepositoryError>;
    async fn list_employee_loans(&self, employee_id: i64) -> Result<Vec<Loan>, RepositoryError>;
    async fn list_loans(&self, status: Option<LoanStatus>) -> Result<Vec<Loan>, RepositoryError>;
    /// Persists a loan and its schedule if `loan.version` is still current.
    ///
    /// Returns the new version, or [`RepositoryError::Conflict`] when another
    /// writer saved the loan first.
    async fn save_loan(&self, loan: &Loan) -> Result<i64, RepositoryError>;
    async fn delete_loan(&self, id: i64) -> Result<(), RepositoryError>;

    // Payrolls
    async fn create_payroll(&self, payroll: NewPayroll) -> Result<Payroll, RepositoryError>;
    /// Deletes payroll `existing_id` and stores `payroll` in one transaction.
    async fn replace_payroll(
        &self,
        existing_id: i64,
        payroll: NewPayroll,
    ) -> Result<Payroll, RepositoryError>;
    async fn get_payroll(&self, id: i64) -> Result<Payroll, RepositoryError>;
    async fn find_payroll(
        &self,
        employee_id: i64,
        month: u32,
        year: i32,
    ) -> Result<Option<Payroll>, RepositoryError>;
    async fn list_payrolls(&self, month: u32, year: i32) -> Result<Vec<Payroll>, RepositoryError>;
    async fn update_payroll(&self, payroll: &Payroll) -> Result<(), RepositoryError>;
    async fn delete_payroll(&self, id: i64) -> Result<(), RepositoryError>;
    /// Stores a paid payroll together with the loans its settlement touched,
    /// in one transaction. Any loan version conflict rolls everything back.
    async fn commit_settlement(
        &self,
        payroll: &Payroll,
        loans: &[Loan],
    ) -> Result<(), RepositoryError>;
}
