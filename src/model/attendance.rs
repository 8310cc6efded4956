use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Day counts a payroll is computed from.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct PeriodFacts {
    #[schema(example = 22.0)]
    pub working_days: f64,
    #[schema(example = 20.0)]
    pub payable_days: f64,
}

impl PeriodFacts {
    pub fn new(working_days: f64, payable_days: f64) -> Self {
        Self {
            working_days,
            payable_days,
        }
    }

    pub fn from_lop(working_days: f64, lop_days: f64) -> Self {
        Self::new(working_days, working_days - lop_days)
    }

    pub fn lop_days(&self) -> f64 {
        self.working_days - self.payable_days
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, sqlx::FromRow)]
pub struct Holiday {
    pub date: NaiveDate,
    pub name: String,
}
