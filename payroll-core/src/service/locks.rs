use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{Mutex, OwnedMutexGuard};

/// One async mutex per employee.
///
/// Holding an employee's guard serializes payroll settlement and direct loan
/// payments for that employee within this process. Cross-process safety
/// comes from the loan `version` check in the repository.
#[derive(Debug, Default)]
pub struct EmployeeLocks {
    locks: Mutex<HashMap<i64, Arc<Mutex<()>>>>,
}

impl EmployeeLocks {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn lock(
        &self,
        employee_id: i64,
    ) -> OwnedMutexGuard<()> {
        let lock = {
            let mut locks = self.locks.lock().await;
            locks.entry(employee_id).or_default().clone()
        };
        lock.lock_owned().await
    }
}
