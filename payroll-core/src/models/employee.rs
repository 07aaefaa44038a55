use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::arrears::{Arrears, due_arrears_total};

/// A single optional allowance. Inactive allowances contribute nothing,
/// whatever their stored amount.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Allowance {
    pub is_active: bool,
    pub amount: Decimal,
}

impl Allowance {
    pub fn active(amount: Decimal) -> Self {
        Self {
            is_active: true,
            amount,
        }
    }

    /// The amount this allowance adds to earnings.
    pub fn effective_amount(&self) -> Decimal {
        if self.is_active {
            self.amount
        } else {
            Decimal::ZERO
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AllowanceKind {
    Conveyance,
    Food,
    VehicleFuel,
    Special,
    Other,
}

impl AllowanceKind {
    pub const ALL: [AllowanceKind; 5] = [
        AllowanceKind::Conveyance,
        AllowanceKind::Food,
        AllowanceKind::VehicleFuel,
        AllowanceKind::Special,
        AllowanceKind::Other,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Conveyance => "conveyance",
            Self::Food => "food",
            Self::VehicleFuel => "vehicle_fuel",
            Self::Special => "special",
            Self::Other => "other",
        }
    }
}

/// The allowances an employee (master record) or a monthly payroll carries.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AllowanceSet {
    pub conveyance: Allowance,
    pub food: Allowance,
    pub vehicle_fuel: Allowance,
    pub special: Allowance,
    pub other: Allowance,
}

impl AllowanceSet {
    pub fn get(
        &self,
        kind: AllowanceKind,
    ) -> Allowance {
        match kind {
            AllowanceKind::Conveyance => self.conveyance,
            AllowanceKind::Food => self.food,
            AllowanceKind::VehicleFuel => self.vehicle_fuel,
            AllowanceKind::Special => self.special,
            AllowanceKind::Other => self.other,
        }
    }

    pub fn get_mut(
        &mut self,
        kind: AllowanceKind,
    ) -> &mut Allowance {
        match kind {
            AllowanceKind::Conveyance => &mut self.conveyance,
            AllowanceKind::Food => &mut self.food,
            AllowanceKind::VehicleFuel => &mut self.vehicle_fuel,
            AllowanceKind::Special => &mut self.special,
            AllowanceKind::Other => &mut self.other,
        }
    }

    /// Sum of every active allowance.
    pub fn active_total(&self) -> Decimal {
        AllowanceKind::ALL
            .iter()
            .map(|kind| self.get(*kind).effective_amount())
            .sum()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Employee {
    pub id: i64,
    pub employee_code: String,
    pub first_name: String,
    pub last_name: String,
    pub gross_salary: Decimal,
    pub is_active: bool,
    pub allowances: AllowanceSet,
    #[serde(default)]
    pub arrears: Vec<Arrears>,
}

impl Employee {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }

    pub fn arrears_due(
        &self,
        month: u32,
        year: i32,
    ) -> Decimal {
        due_arrears_total(&self.arrears, month, year)
    }
}

/// For creating new employees (no id)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewEmployee {
    pub employee_code: String,
    pub first_name: String,
    pub last_name: String,
    pub gross_salary: Decimal,
    pub is_active: bool,
    pub allowances: AllowanceSet,
    #[serde(default)]
    pub arrears: Vec<Arrears>,
}
