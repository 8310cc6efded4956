use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Fixed monthly salary components. Earnings are pro-rated, deductions are not.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize, ToSchema, sqlx::FromRow)]
pub struct SalaryComponents {
    #[schema(example = 50000.0)]
    pub basic: f64,
    #[schema(example = 10000.0)]
    pub hra: f64,
    #[schema(example = 5000.0)]
    pub special_allowance: f64,
    #[schema(example = 0.0)]
    pub bonus: f64,
    #[schema(example = 0.0)]
    pub other_allowance: f64,

    #[schema(example = 2000.0)]
    pub pf: f64,
    #[schema(example = 1000.0)]
    pub tax: f64,
    #[schema(example = 0.0)]
    pub other_deduction: f64,
}

impl SalaryComponents {
    pub fn earnings(&self) -> [(&'static str, f64); 5] {
        [
            ("basic", self.basic),
            ("hra", self.hra),
            ("special_allowance", self.special_allowance),
            ("bonus", self.bonus),
            ("other_allowance", self.other_allowance),
        ]
    }

    pub fn deductions(&self) -> [(&'static str, f64); 3] {
        [
            ("pf", self.pf),
            ("tax", self.tax),
            ("other_deduction", self.other_deduction),
        ]
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema, sqlx::FromRow)]
pub struct PayrollStructure {
    pub id: u64,
    pub user_id: u64,
    #[sqlx(flatten)]
    pub components: SalaryComponents,
    #[schema(value_type = String, format = "date")]
    pub effective_from: NaiveDate,
    pub updated_by: u64,
    #[schema(value_type = String, format = "date-time")]
    pub updated_at: DateTime<Utc>,
}

/// Immutable snapshot written for every structure revision.
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct PayrollStructureHistory {
    pub user_id: u64,
    pub changed_by: u64,
    pub reason: Option<String>,
    pub before: Option<SalaryComponents>,
    pub after: SalaryComponents,
    #[schema(value_type = String, format = "date")]
    pub effective_from: NaiveDate,
    #[schema(value_type = String, format = "date-time")]
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, sqlx::FromRow)]
pub struct PayrollStructureHistoryRow {
    pub user_id: u64,
    pub changed_by: u64,
    pub reason: Option<String>,
    pub before_json: Option<String>,
    pub after_json: String,
    pub effective_from: NaiveDate,
    pub created_at: DateTime<Utc>,
}

impl TryFrom<PayrollStructureHistoryRow> for PayrollStructureHistory {
    type Error = serde_json::Error;

    fn try_from(row: PayrollStructureHistoryRow) -> Result<Self, Self::Error> {
        let before = row
            .before_json
            .as_deref()
            .map(serde_json::from_str)
            .transpose()?;

        Ok(PayrollStructureHistory {
            user_id: row.user_id,
            changed_by: row.changed_by,
            reason: row.reason,
            before,
            after: serde_json::from_str(&row.after_json)?,
            effective_from: row.effective_from,
            created_at: row.created_at,
        })
    }
}
