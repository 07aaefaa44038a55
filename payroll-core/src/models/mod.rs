mod arrears;
mod attendance;
mod employee;
mod loan;
mod payroll;
mod policy;
mod tax_slab;

pub use arrears::{Arrears, ArrearsKind, ArrearsStatus, due_arrears_total};
pub use attendance::{AttendanceRecord, AttendanceSummary};
pub use employee::{Allowance, AllowanceKind, AllowanceSet, Employee, NewEmployee};
pub use loan::{InstallmentStatus, Loan, LoanInstallment, LoanStatus, LoanType, NewLoan};
pub use payroll::{
    NewPayroll, Payroll, PayrollBreakdown, PayrollInputs, PayrollStatus, PayrollTotals,
    PayrollUpdate, PayslipLine,
};
pub use policy::PayrollPolicy;
pub use tax_slab::{NewTaxSlabTable, TaxSlab, TaxSlabTable};
