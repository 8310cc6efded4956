pub mod attendance;
pub mod leave_request;
pub mod month_lock;
pub mod payroll;
pub mod payroll_structure;
pub mod role;
pub mod user;
