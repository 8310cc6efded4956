use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};
use utoipa::ToSchema;

/// Closing record for a payroll month.
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema, sqlx::FromRow)]
pub struct PayrollMonthLock {
    #[schema(value_type = String, format = "date")]
    pub month: NaiveDate,
    pub is_locked: bool,
    pub locked_by: u64,
    #[schema(value_type = String, format = "date-time")]
    pub locked_at: DateTime<Utc>,
    pub lock_reason: Option<String>,
    pub unlocked_by: Option<u64>,
    #[schema(value_type = Option<String>, format = "date-time")]
    pub unlocked_at: Option<DateTime<Utc>>,
    pub unlock_reason: Option<String>,
}

#[derive(
    Debug, Copy, Clone, Eq, PartialEq, Serialize, Deserialize, ToSchema, Display, EnumString, AsRefStr,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum LockAction {
    Lock,
    Unlock,
}

/// Append-only audit entry for lock and unlock actions.
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct PayrollMonthLockEvent {
    #[schema(value_type = String, format = "date")]
    pub month: NaiveDate,
    pub action: LockAction,
    pub actor_id: u64,
    pub reason: Option<String>,
    #[schema(value_type = String, format = "date-time")]
    pub created_at: DateTime<Utc>,
}
