pub mod calculator;
pub mod calendar;
pub mod financial_year;
pub mod month_lock;
pub mod structure;
pub mod workflow;
