use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumIter, EnumString};
use utoipa::ToSchema;

/// Stored payroll state.
#[derive(
    Debug,
    Copy,
    Clone,
    Eq,
    PartialEq,
    Serialize,
    Deserialize,
    ToSchema,
    Display,
    EnumString,
    AsRefStr,
    EnumIter,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum PayrollStatus {
    Draft,
    Processed,
    Paid,
    Failed,
}

impl PayrollStatus {
    /// Label used by the frontend. The vocabulary is a compatibility
    /// contract and must not change.
    pub fn ui_label(self) -> &'static str {
        match self {
            PayrollStatus::Draft => "generated",
            PayrollStatus::Processed => "approved",
            PayrollStatus::Paid => "paid",
            PayrollStatus::Failed => "failed",
        }
    }

    pub fn from_ui_label(label: &str) -> Option<Self> {
        match label {
            "generated" => Some(PayrollStatus::Draft),
            "approved" => Some(PayrollStatus::Processed),
            "paid" => Some(PayrollStatus::Paid),
            "failed" => Some(PayrollStatus::Failed),
            _ => None,
        }
    }

    /// Processed and paid rows can no longer be regenerated.
    pub fn is_finalized(self) -> bool {
        matches!(self, PayrollStatus::Processed | PayrollStatus::Paid)
    }
}

pub fn db_status_to_ui_status(status: &str) -> Option<&'static str> {
    status.parse::<PayrollStatus>().ok().map(PayrollStatus::ui_label)
}

pub fn ui_status_to_db_status(label: &str) -> Option<&'static str> {
    PayrollStatus::from_ui_label(label).map(|s| match s {
        PayrollStatus::Draft => "draft",
        PayrollStatus::Processed => "processed",
        PayrollStatus::Paid => "paid",
        PayrollStatus::Failed => "failed",
    })
}

#[derive(
    Debug, Copy, Clone, Eq, PartialEq, Serialize, Deserialize, ToSchema, Display, EnumString, AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum PaymentMethod {
    BankTransfer,
    Cash,
    Cheque,
    Other,
}

/// One payroll row per (user, month).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Payroll {
    pub id: Option<u64>,
    pub user_id: u64,
    /// First day of the payroll month.
    pub month: NaiveDate,
    pub financial_year: String,

    pub working_days: f64,
    pub payable_days: f64,
    pub lop_days: f64,

    pub basic: f64,
    pub hra: f64,
    pub special_allowance: f64,
    pub bonus: f64,
    pub other_allowance: f64,
    pub gross_earnings: f64,

    pub pf: f64,
    pub tax: f64,
    pub other_deduction: f64,
    pub total_deductions: f64,

    pub net_pay: f64,

    pub status: PayrollStatus,
    pub notes: Option<String>,

    pub generated_by: u64,
    pub generated_at: DateTime<Utc>,
    pub approved_by: Option<u64>,
    pub approved_at: Option<DateTime<Utc>>,
    pub paid_by: Option<u64>,
    pub paid_at: Option<DateTime<Utc>>,
    pub payment_method: Option<PaymentMethod>,
    pub payment_reference: Option<String>,
}

#[derive(Debug, sqlx::FromRow)]
pub struct PayrollRow {
    pub id: u64,
    pub user_id: u64,
    pub month: NaiveDate,
    pub financial_year: String,
    pub working_days: f64,
    pub payable_days: f64,
    pub lop_days: f64,
    pub basic: f64,
    pub hra: f64,
    pub special_allowance: f64,
    pub bonus: f64,
    pub other_allowance: f64,
    pub gross_earnings: f64,
    pub pf: f64,
    pub tax: f64,
    pub other_deduction: f64,
    pub total_deductions: f64,
    pub net_pay: f64,
    pub status: String,
    pub notes: Option<String>,
    pub generated_by: u64,
    pub generated_at: DateTime<Utc>,
    pub approved_by: Option<u64>,
    pub approved_at: Option<DateTime<Utc>>,
    pub paid_by: Option<u64>,
    pub paid_at: Option<DateTime<Utc>>,
    pub payment_method: Option<String>,
    pub payment_reference: Option<String>,
}

pub const PAYROLL_COLUMNS: &str = "id, user_id, month, financial_year, working_days, payable_days, \
    lop_days, basic, hra, special_allowance, bonus, other_allowance, gross_earnings, pf, tax, \
    other_deduction, total_deductions, net_pay, status, notes, generated_by, generated_at, \
    approved_by, approved_at, paid_by, paid_at, payment_method, payment_reference";

impl TryFrom<PayrollRow> for Payroll {
    type Error = strum::ParseError;

    fn try_from(row: PayrollRow) -> Result<Self, Self::Error> {
        let payment_method = row
            .payment_method
            .as_deref()
            .map(str::parse::<PaymentMethod>)
            .transpose()?;

        Ok(Payroll {
            id: Some(row.id),
            user_id: row.user_id,
            month: row.month,
            financial_year: row.financial_year,
            working_days: row.working_days,
            payable_days: row.payable_days,
            lop_days: row.lop_days,
            basic: row.basic,
            hra: row.hra,
            special_allowance: row.special_allowance,
            bonus: row.bonus,
            other_allowance: row.other_allowance,
            gross_earnings: row.gross_earnings,
            pf: row.pf,
            tax: row.tax,
            other_deduction: row.other_deduction,
            total_deductions: row.total_deductions,
            net_pay: row.net_pay,
            status: row.status.parse()?,
            notes: row.notes,
            generated_by: row.generated_by,
            generated_at: row.generated_at,
            approved_by: row.approved_by,
            approved_at: row.approved_at,
            paid_by: row.paid_by,
            paid_at: row.paid_at,
            payment_method,
            payment_reference: row.payment_reference,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use strum::IntoEnumIterator;

    #[test]
    fn ui_mapping_is_a_bijection() {
        for status in PayrollStatus::iter() {
            let ui = db_status_to_ui_status(status.as_ref()).unwrap();
            assert_eq!(ui_status_to_db_status(ui), Some(status.as_ref()));
        }
    }

    #[test]
    fn ui_labels_match_frontend_contract() {
        assert_eq!(db_status_to_ui_status("draft"), Some("generated"));
        assert_eq!(db_status_to_ui_status("processed"), Some("approved"));
        assert_eq!(db_status_to_ui_status("paid"), Some("paid"));
        assert_eq!(db_status_to_ui_status("failed"), Some("failed"));
        assert_eq!(ui_status_to_db_status("draft"), None);
        assert_eq!(db_status_to_ui_status("generated"), None);
    }

    #[test]
    fn only_processed_and_paid_are_final() {
        assert!(!PayrollStatus::Draft.is_finalized());
        assert!(!PayrollStatus::Failed.is_finalized());
        assert!(PayrollStatus::Processed.is_finalized());
        assert!(PayrollStatus::Paid.is_finalized());
    }

    #[test]
    fn payment_method_uses_snake_case() {
        assert_eq!(PaymentMethod::BankTransfer.as_ref(), "bank_transfer");
        assert_eq!(
            "cheque".parse::<PaymentMethod>().ok(),
            Some(PaymentMethod::Cheque)
        );
    }
}
