use std::collections::BTreeMap;
use std::io::Read;

use payroll_core::calculations::{TaxError, validate_slabs};
use payroll_core::{NewTaxSlabTable, PayrollRepository, RepositoryError, TaxSlab};
use rust_decimal::Decimal;
use serde::Deserialize;
use thiserror::Error;
use tracing::info;

/// Errors that can occur when loading tax slab data.
#[derive(Debug, Error)]
pub enum TaxSlabLoaderError {
    #[error("CSV parse error: {0}")]
    CsvParse(String),

    #[error("Invalid slab table for {fiscal_year}: {source}")]
    InvalidTable {
        fiscal_year: String,
        #[source]
        source: TaxError,
    },

    #[error("Fiscal year '{0}' is not in the loaded data")]
    UnknownFiscalYear(String),

    #[error("Repository error: {0}")]
    Repository(#[from] RepositoryError),
}

impl From<csv::Error> for TaxSlabLoaderError {
    fn from(err: csv::Error) -> Self {
        TaxSlabLoaderError::CsvParse(err.to_string())
    }
}

/// A single row of the slab CSV.
///
/// - `fiscal_year`: e.g. `2025-2026`
/// - `min_amount`, `max_amount`: annual income bounds; an empty `max_amount`
///   marks the open-ended top slab
/// - `rate`: marginal rate as a percentage (`11` for 11%)
/// - `fixed_tax`: tax owed at the start of the slab
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct TaxSlabRecord {
    pub fiscal_year: String,
    pub min_amount: Decimal,
    #[serde(deserialize_with = "deserialize_optional_decimal")]
    pub max_amount: Option<Decimal>,
    pub rate: Decimal,
    pub fixed_tax: Decimal,
}

fn deserialize_optional_decimal<'de, D>(deserializer: D) -> Result<Option<Decimal>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let s: Option<String> = Option::deserialize(deserializer)?;
    match s {
        Some(s) if s.trim().is_empty() => Ok(None),
        Some(s) => s
            .trim()
            .parse::<Decimal>()
            .map(Some)
            .map_err(serde::de::Error::custom),
        None => Ok(None),
    }
}

/// Loader for tax slab tables from CSV files, through any
/// [`PayrollRepository`] backend.
pub struct TaxSlabLoader;

impl TaxSlabLoader {
    pub fn parse<R: Read>(reader: R) -> Result<Vec<TaxSlabRecord>, TaxSlabLoaderError> {
        let mut csv_reader = csv::Reader::from_reader(reader);
        let mut records = Vec::new();

        for result in csv_reader.deserialize() {
            let record: TaxSlabRecord = result?;
            records.push(record);
        }

        Ok(records)
    }

    /// Groups records by fiscal year and stores one table per year.
    ///
    /// Every table is validated before anything is written. A year that is
    /// already stored is replaced, keeping its active flag; `activate` names
    /// a year to make the active table. Returns the number of slabs stored.
    pub async fn load<R: PayrollRepository + ?Sized>(
        repo: &R,
        records: &[TaxSlabRecord],
        activate: Option<&str>,
    ) -> Result<usize, TaxSlabLoaderError> {
        let mut groups: BTreeMap<&str, Vec<TaxSlab>> = BTreeMap::new();
        for record in records {
            groups
                .entry(record.fiscal_year.as_str())
                .or_default()
                .push(TaxSlab {
                    min_amount: record.min_amount,
                    max_amount: record.max_amount,
                    rate: record.rate,
                    fixed_tax: record.fixed_tax,
                });
        }

        if let Some(year) = activate
            && !groups.contains_key(year)
        {
            return Err(TaxSlabLoaderError::UnknownFiscalYear(year.to_string()));
        }

        for (fiscal_year, slabs) in groups.iter_mut() {
            slabs.sort_by(|a, b| a.min_amount.cmp(&b.min_amount));
            validate_slabs(slabs).map_err(|source| TaxSlabLoaderError::InvalidTable {
                fiscal_year: fiscal_year.to_string(),
                source,
            })?;
        }

        let mut inserted = 0;
        for (fiscal_year, slabs) in groups {
            let was_active = match repo.get_tax_table_by_year(fiscal_year).await {
                Ok(existing) => {
                    repo.delete_tax_table(existing.id).await?;
                    existing.is_active
                }
                Err(RepositoryError::NotFound) => false,
                Err(e) => return Err(e.into()),
            };

            let count = slabs.len();
            repo.create_tax_table(NewTaxSlabTable {
                fiscal_year: fiscal_year.to_string(),
                description: None,
                is_active: was_active || activate == Some(fiscal_year),
                slabs,
            })
            .await?;

            info!(fiscal_year, slabs = count, "loaded tax slab table");
            inserted += count;
        }

        Ok(inserted)
    }
}
