use rust_decimal::Decimal;
use tracing::info;

use super::{PayrollService, ServiceError};
use crate::calculations::{TaxComputation, TaxError, TaxSlabResolver, validate_slabs};
use crate::models::{NewTaxSlabTable, TaxSlabTable};

impl PayrollService {
    /// Validates and stores a slab table, activating it when requested.
    pub async fn create_tax_table(
        &self,
        mut table: NewTaxSlabTable,
    ) -> Result<TaxSlabTable, ServiceError> {
        validate_slabs(&table.slabs)?;

        let activate = table.is_active;
        table.is_active = false;
        let created = self.repo.create_tax_table(table).await?;

        if activate {
            self.repo.activate_tax_table(created.id).await?;
            info!(fiscal_year = %created.fiscal_year, "activated tax slab table");
            return Ok(self.repo.get_tax_table(created.id).await?);
        }

        Ok(created)
    }

    pub async fn activate_tax_table(
        &self,
        id: i64,
    ) -> Result<(), ServiceError> {
        self.repo.activate_tax_table(id).await?;
        info!(table_id = id, "activated tax slab table");
        Ok(())
    }

    /// The active table, or [`TaxError::NoActiveTaxTable`].
    pub async fn active_tax_table(&self) -> Result<TaxSlabTable, ServiceError> {
        self.repo
            .get_active_tax_table()
            .await?
            .ok_or(ServiceError::Tax(TaxError::NoActiveTaxTable))
    }

    /// Resolves annual tax for an income against the active table.
    pub async fn compute_annual_tax(
        &self,
        annual_income: Decimal,
    ) -> Result<TaxComputation, ServiceError> {
        let table = self.active_tax_table().await?;
        let resolver = TaxSlabResolver::new(&table.slabs, &self.policy)?;
        Ok(resolver.compute(annual_income)?)
    }
}
