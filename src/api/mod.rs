pub mod month_lock;
pub mod payroll;
pub mod payroll_structure;
pub mod two_factor;

/// SQL OFFSET for a 1-based page.
pub(crate) fn page_offset(page: u32, per_page: u32) -> i64 {
    i64::from(page.saturating_sub(1)) * i64::from(per_page)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn page_offset_handles_the_full_page_range() {
        assert_eq!(page_offset(1, 10), 0);
        assert_eq!(page_offset(3, 25), 50);
        assert_eq!(page_offset(u32::MAX, 100), i64::from(u32::MAX - 1) * 100);
    }
}
