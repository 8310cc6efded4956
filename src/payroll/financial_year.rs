use chrono::{Datelike, NaiveDate};
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct FinancialYear {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl FinancialYear {
    /// Financial year containing `date` for a year starting on the first of
    /// `start_month`. Out of range months fall back to January.
    pub fn containing(date: NaiveDate, start_month: u32) -> Self {
        let start_month = if (1..=12).contains(&start_month) {
            start_month
        } else {
            1
        };
        let start_year = if date.month() >= start_month {
            date.year()
        } else {
            date.year() - 1
        };

        let start = NaiveDate::from_ymd_opt(start_year, start_month, 1).unwrap_or(date);
        let end = NaiveDate::from_ymd_opt(start_year + 1, start_month, 1)
            .and_then(|next| next.pred_opt())
            .unwrap_or(date);

        Self { start, end }
    }

    /// `2025-26` style label, or just `2026` for calendar years.
    pub fn label(&self) -> String {
        if self.start.year() == self.end.year() {
            self.start.year().to_string()
        } else {
            format!("{}-{:02}", self.start.year(), self.end.year().rem_euclid(100))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[rstest]
    #[case(date(2026, 4, 1), 4, "2026-27")]
    #[case(date(2026, 3, 31), 4, "2025-26")]
    #[case(date(2099, 12, 15), 4, "2099-00")]
    #[case(date(2026, 6, 30), 7, "2025-26")]
    #[case(date(2026, 6, 30), 1, "2026")]
    #[case(date(2026, 6, 30), 0, "2026")]
    fn labels(#[case] day: NaiveDate, #[case] start_month: u32, #[case] expected: &str) {
        assert_eq!(FinancialYear::containing(day, start_month).label(), expected);
    }

    #[test]
    fn bounds_cover_twelve_months() {
        let fy = FinancialYear::containing(date(2026, 1, 10), 4);
        assert_eq!(fy.start, date(2025, 4, 1));
        assert_eq!(fy.end, date(2026, 3, 31));
    }
}
