use std::collections::HashSet;

use chrono::{Datelike, Months, NaiveDate};

use crate::config::PayrollSettings;
use crate::model::attendance::PeriodFacts;
use crate::model::leave_request::ApprovedLeave;

/// Normalizes any date to the first day of its month.
pub fn month_start(date: NaiveDate) -> NaiveDate {
    date.with_day(1).unwrap_or(date)
}

pub fn month_end(month: NaiveDate) -> NaiveDate {
    let start = month_start(month);
    start
        .checked_add_months(Months::new(1))
        .and_then(|next| next.pred_opt())
        .unwrap_or(start)
}

/// Parses `YYYY-MM` or a full `YYYY-MM-DD` date into a month start.
pub fn parse_month(raw: &str) -> Option<NaiveDate> {
    let raw = raw.trim();
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .or_else(|_| NaiveDate::parse_from_str(&format!("{raw}-01"), "%Y-%m-%d"))
        .ok()
        .map(month_start)
}

fn days_of(month: NaiveDate) -> impl Iterator<Item = NaiveDate> {
    let end = month_end(month);
    month_start(month)
        .iter_days()
        .take_while(move |day| *day <= end)
}

/// Days of the month that are neither weekly offs nor holidays.
pub fn working_days(
    month: NaiveDate,
    settings: &PayrollSettings,
    holidays: &HashSet<NaiveDate>,
) -> Vec<NaiveDate> {
    days_of(month)
        .filter(|day| !settings.weekly_off_days.contains(&day.weekday()))
        .filter(|day| !holidays.contains(day))
        .collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct AttendanceSummary {
    pub working_days: u32,
    pub attended_days: u32,
    pub paid_leave_days: u32,
    pub unpaid_leave_days: u32,
    pub absent_days: u32,
    pub before_joining_days: u32,
    pub absence_is_lop: bool,
}

impl AttendanceSummary {
    pub fn build(
        month: NaiveDate,
        settings: &PayrollSettings,
        holidays: &HashSet<NaiveDate>,
        attended: &HashSet<NaiveDate>,
        leaves: &[ApprovedLeave],
        joined_on: Option<NaiveDate>,
    ) -> Self {
        let mut summary = AttendanceSummary {
            absence_is_lop: settings.count_absence_as_lop,
            ..Default::default()
        };

        for day in working_days(month, settings, holidays) {
            summary.working_days += 1;

            if joined_on.is_some_and(|joined| day < joined) {
                summary.before_joining_days += 1;
            } else if attended.contains(&day) {
                summary.attended_days += 1;
            } else if let Some(leave) = leaves.iter().find(|l| l.covers(day)) {
                if leave.leave_type.is_paid() {
                    summary.paid_leave_days += 1;
                } else {
                    summary.unpaid_leave_days += 1;
                }
            } else {
                summary.absent_days += 1;
            }
        }

        summary
    }

    pub fn lop_days(&self) -> u32 {
        let absent = if self.absence_is_lop { self.absent_days } else { 0 };
        self.unpaid_leave_days + absent + self.before_joining_days
    }

    pub fn facts(&self) -> PeriodFacts {
        PeriodFacts::from_lop(f64::from(self.working_days), f64::from(self.lop_days()))
    }
}
