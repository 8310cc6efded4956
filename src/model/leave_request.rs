use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, EnumString};

#[derive(Debug, Copy, Clone, Eq, PartialEq, Serialize, Deserialize, EnumString, AsRefStr)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum LeaveType {
    Annual,
    Sick,
    Unpaid,
}

impl LeaveType {
    pub fn is_paid(self) -> bool {
        !matches!(self, LeaveType::Unpaid)
    }
}

/// Approved leave as seen by payroll.
#[derive(Debug, Clone, PartialEq)]
pub struct ApprovedLeave {
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub leave_type: LeaveType,
}

impl ApprovedLeave {
    pub fn covers(&self, day: NaiveDate) -> bool {
        self.start_date <= day && day <= self.end_date
    }
}

#[derive(Debug, sqlx::FromRow)]
pub struct LeaveRequestRow {
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub leave_type: String,
}
