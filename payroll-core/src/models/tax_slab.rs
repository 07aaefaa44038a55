use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// One bracket of a progressive income-tax table.
///
/// `rate` is a percentage (`11` means 11%). `max_amount` of `None` marks the
/// open-ended top slab.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaxSlab {
    pub min_amount: Decimal,
    pub max_amount: Option<Decimal>,
    pub rate: Decimal,
    pub fixed_tax: Decimal,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaxSlabTable {
    pub id: i64,
    pub fiscal_year: String,
    pub description: Option<String>,
    pub is_active: bool,
    pub slabs: Vec<TaxSlab>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// For creating new tables (no id or timestamps)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewTaxSlabTable {
    pub fiscal_year: String,
    pub description: Option<String>,
    pub is_active: bool,
    pub slabs: Vec<TaxSlab>,
}
