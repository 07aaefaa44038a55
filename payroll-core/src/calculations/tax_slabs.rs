//! Progressive income tax resolution against a slab table.
//!
//! A slab table is an ordered list of [`TaxSlab`]s covering `[0, inf)`.
//! Tax for an income in slab `i` is
//!
//! ```text
//! fixed_tax(i) + (income - lower_threshold(i)) * rate(i) / 100
//! ```
//!
//! where `lower_threshold(i)` is the previous slab's `max_amount` (the first
//! slab uses its own `min_amount`). Tables written in whole-unit style
//! (`600,001 - 1,200,000`) therefore resolve continuously at every boundary.
//! On an exact shared boundary the upper slab wins.
//!
//! A surcharge of `surcharge_rate_percent` of the computed tax applies when
//! the annual income exceeds the surcharge threshold.
//!
//! # Example
//!
//! ```
//! use rust_decimal_macros::dec;
//! use payroll_core::calculations::TaxSlabResolver;
//! use payroll_core::{PayrollPolicy, TaxSlab};
//!
//! let slabs = vec![
//!     TaxSlab { min_amount: dec!(0), max_amount: Some(dec!(600000)), rate: dec!(0), fixed_tax: dec!(0) },
//!     TaxSlab { min_amount: dec!(600001), max_amount: Some(dec!(1200000)), rate: dec!(1), fixed_tax: dec!(0) },
//!     TaxSlab { min_amount: dec!(1200001), max_amount: None, rate: dec!(11), fixed_tax: dec!(6000) },
//! ];
//!
//! let resolver = TaxSlabResolver::new(&slabs, &PayrollPolicy::default()).unwrap();
//!
//! assert_eq!(resolver.resolve_tax(dec!(1500000)).unwrap(), dec!(39000));
//! assert_eq!(resolver.monthly_tax(dec!(1500000)).unwrap(), dec!(3250));
//! ```

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::calculations::common::{MONTHS_PER_YEAR, max, round_half_up, round_whole};
use crate::{PayrollPolicy, TaxSlab};

/// Errors raised by tax table validation and tax resolution.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TaxError {
    #[error("no active tax slab table")]
    NoActiveTaxTable,

    #[error("no tax slab covers annual income {0}")]
    NoMatchingSlab(Decimal),

    #[error("tax slab table has no slabs")]
    EmptyTable,

    #[error("first tax slab starts at {0}, expected 0")]
    FirstSlabNotAtZero(Decimal),

    #[error("tax slab {index} ends at {max_amount}, not above its start {min_amount}")]
    InvertedSlab {
        index: usize,
        min_amount: Decimal,
        max_amount: Decimal,
    },

    #[error("gap before tax slab {index}: previous slab ends at {previous_max}, slab starts at {min_amount}")]
    Gap {
        index: usize,
        previous_max: Decimal,
        min_amount: Decimal,
    },

    #[error("tax slab {index} starts at {min_amount}, inside the previous slab ending at {previous_max}")]
    Overlap {
        index: usize,
        previous_max: Decimal,
        min_amount: Decimal,
    },

    #[error("open-ended tax slab {0} is not the last slab")]
    OpenEndedNotLast(usize),

    #[error("last tax slab must be open-ended")]
    MissingOpenEndedSlab,

    #[error("tax slab {index} has rate {rate}, expected 0 to 100")]
    InvalidRate { index: usize, rate: Decimal },

    #[error("tax slab {index} has negative fixed tax {fixed_tax}")]
    NegativeFixedTax { index: usize, fixed_tax: Decimal },
}

/// Breakdown of a single tax resolution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaxComputation {
    pub annual_income: Decimal,
    pub slab_index: usize,
    pub base_tax: Decimal,
    pub surcharge: Decimal,
    pub annual_tax: Decimal,
    pub monthly_tax: Decimal,
}

/// Checks that slabs are ordered, contiguous and cover `[0, inf)`.
///
/// A slab may start at the previous slab's `max_amount` or up to one whole
/// currency unit above it.
pub fn validate_slabs(slabs: &[TaxSlab]) -> Result<(), TaxError> {
    let first = slabs.first().ok_or(TaxError::EmptyTable)?;
    if !first.min_amount.is_zero() {
        return Err(TaxError::FirstSlabNotAtZero(first.min_amount));
    }

    let last_index = slabs.len() - 1;
    let mut previous_max: Option<Decimal> = None;

    for (index, slab) in slabs.iter().enumerate() {
        if slab.rate < Decimal::ZERO || slab.rate > Decimal::ONE_HUNDRED {
            return Err(TaxError::InvalidRate {
                index,
                rate: slab.rate,
            });
        }
        if slab.fixed_tax < Decimal::ZERO {
            return Err(TaxError::NegativeFixedTax {
                index,
                fixed_tax: slab.fixed_tax,
            });
        }

        if let Some(previous_max) = previous_max {
            if slab.min_amount < previous_max {
                return Err(TaxError::Overlap {
                    index,
                    previous_max,
                    min_amount: slab.min_amount,
                });
            }
            if slab.min_amount > previous_max + Decimal::ONE {
                return Err(TaxError::Gap {
                    index,
                    previous_max,
                    min_amount: slab.min_amount,
                });
            }
        }

        match slab.max_amount {
            Some(max_amount) => {
                if max_amount <= slab.min_amount {
                    return Err(TaxError::InvertedSlab {
                        index,
                        min_amount: slab.min_amount,
                        max_amount,
                    });
                }
                previous_max = Some(max_amount);
            }
            None if index != last_index => return Err(TaxError::OpenEndedNotLast(index)),
            None => {}
        }
    }

    if slabs[last_index].max_amount.is_some() {
        return Err(TaxError::MissingOpenEndedSlab);
    }

    Ok(())
}

/// Resolves income tax from a validated slab table.
#[derive(Debug, Clone)]
pub struct TaxSlabResolver<'a> {
    slabs: &'a [TaxSlab],
    surcharge_rate_percent: Decimal,
    surcharge_threshold: Decimal,
}

impl<'a> TaxSlabResolver<'a> {
    /// Validates the slabs and builds a resolver using the policy's surcharge.
    ///
    /// # Errors
    ///
    /// Returns the first [`TaxError`] validation failure found in `slabs`.
    pub fn new(
        slabs: &'a [TaxSlab],
        policy: &PayrollPolicy,
    ) -> Result<Self, TaxError> {
        validate_slabs(slabs)?;
        Ok(Self {
            slabs,
            surcharge_rate_percent: policy.surcharge_rate_percent,
            surcharge_threshold: policy.surcharge_threshold,
        })
    }

    /// Annual tax for an annual taxable income, surcharge included.
    pub fn resolve_tax(
        &self,
        annual_income: Decimal,
    ) -> Result<Decimal, TaxError> {
        Ok(self.compute(annual_income)?.annual_tax)
    }

    /// Annual tax divided over twelve months, rounded to a whole unit.
    pub fn monthly_tax(
        &self,
        annual_income: Decimal,
    ) -> Result<Decimal, TaxError> {
        Ok(self.compute(annual_income)?.monthly_tax)
    }

    pub fn compute(
        &self,
        annual_income: Decimal,
    ) -> Result<TaxComputation, TaxError> {
        let income = max(annual_income, Decimal::ZERO);
        let (slab_index, slab) = self.find_slab(income)?;

        let base_tax = if slab.rate.is_zero() {
            slab.fixed_tax
        } else {
            let excess = income - self.lower_threshold(slab_index);
            round_half_up(slab.fixed_tax + excess * slab.rate / Decimal::ONE_HUNDRED)
        };
        let surcharge = self.surcharge(income, base_tax);
        let annual_tax = base_tax + surcharge;

        Ok(TaxComputation {
            annual_income: income,
            slab_index,
            base_tax,
            surcharge,
            annual_tax,
            monthly_tax: round_whole(annual_tax / MONTHS_PER_YEAR),
        })
    }

    /// The slab an income falls in. The upper slab wins on a shared boundary.
    pub fn find_slab(
        &self,
        income: Decimal,
    ) -> Result<(usize, &'a TaxSlab), TaxError> {
        let slabs: &'a [TaxSlab] = self.slabs;
        slabs
            .iter()
            .enumerate()
            .rev()
            .find(|(index, _)| income >= self.lower_threshold(*index))
            .filter(|(_, slab)| slab.max_amount.is_none_or(|max_amount| income <= max_amount))
            .ok_or(TaxError::NoMatchingSlab(income))
    }

    fn lower_threshold(
        &self,
        index: usize,
    ) -> Decimal {
        match index.checked_sub(1).and_then(|previous| self.slabs.get(previous)) {
            Some(previous) => previous.max_amount.unwrap_or(self.slabs[index].min_amount),
            None => self.slabs[index].min_amount,
        }
    }

    fn surcharge(
        &self,
        income: Decimal,
        tax: Decimal,
    ) -> Decimal {
        if income > self.surcharge_threshold {
            round_half_up(tax * self.surcharge_rate_percent / Decimal::ONE_HUNDRED)
        } else {
            Decimal::ZERO
        }
    }
}
