use anyhow::Result;
use chrono::NaiveDate;
use futures_util::StreamExt;
use moka::future::Cache;
use sqlx::MySqlPool;
use std::time::Duration;

use crate::model::month_lock::PayrollMonthLock;

/// month => locked?
///
/// Hint for months that are probably closed. A cached `true` is confirmed
/// against the lock row before anything is rejected, and transactions always
/// re-read the row, so a stale entry never blocks an unlocked month.
#[derive(Clone)]
pub struct LockedMonthCache {
    months: Cache<NaiveDate, bool>,
}

impl Default for LockedMonthCache {
    fn default() -> Self {
        Self::new()
    }
}

impl LockedMonthCache {
    pub fn new() -> Self {
        Self {
            months: Cache::builder()
                .max_capacity(10_000)
                .time_to_live(Duration::from_secs(3600))
                .build(),
        }
    }

    pub async fn set(&self, month: NaiveDate, locked: bool) {
        self.months.insert(month, locked).await;
    }

    /// `None` when the month is not cached.
    pub async fn is_locked(&self, month: NaiveDate) -> Option<bool> {
        self.months.get(&month).await
    }

    /// Stores the state read from the lock row and returns it.
    pub async fn reconcile(&self, month: NaiveDate, row: Option<&PayrollMonthLock>) -> bool {
        let locked = row.is_some_and(|l| l.is_locked);
        self.set(month, locked).await;
        locked
    }

    async fn batch_mark(&self, months: &[NaiveDate]) {
        let futures: Vec<_> = months
            .iter()
            .map(|m| self.months.insert(*m, true))
            .collect();

        futures::future::join_all(futures).await;
    }

    /// Load currently locked months (batched).
    pub async fn warmup(&self, pool: &MySqlPool, batch_size: usize) -> Result<()> {
        let mut stream = sqlx::query_as::<_, (NaiveDate,)>(
            r#"
            SELECT month
            FROM payroll_month_locks
            WHERE is_locked = TRUE
            ORDER BY month DESC
            "#,
        )
        .fetch(pool);

        let mut batch = Vec::with_capacity(batch_size);
        let mut total_count = 0usize;

        while let Some(row) = stream.next().await {
            let (month,) = row?;
            batch.push(month);
            total_count += 1;

            if batch.len() >= batch_size {
                self.batch_mark(&batch).await;
                batch.clear();
            }
        }

        if !batch.is_empty() {
            self.batch_mark(&batch).await;
        }

        tracing::info!(locked_months = total_count, "Locked month cache warmup complete");

        Ok(())
    }

    #[cfg(test)]
    pub async fn mark_all(&self, months: &[NaiveDate]) {
        self.batch_mark(months).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[actix_web::test]
    async fn tracks_lock_state_per_month() {
        let cache = LockedMonthCache::new();
        let jan = NaiveDate::from_ymd_opt(2026, 1, 1).unwrap();
        let feb = NaiveDate::from_ymd_opt(2026, 2, 1).unwrap();

        assert_eq!(cache.is_locked(jan).await, None);
        cache.mark_all(&[jan, feb]).await;
        assert_eq!(cache.is_locked(feb).await, Some(true));
        cache.set(jan, false).await;
        assert_eq!(cache.is_locked(jan).await, Some(false));
    }

    #[actix_web::test]
    async fn reconcile_replaces_a_stale_locked_entry() {
        use chrono::{TimeZone, Utc};

        let cache = LockedMonthCache::new();
        let june = NaiveDate::from_ymd_opt(2026, 6, 1).unwrap();
        cache.set(june, true).await;

        let unlocked = PayrollMonthLock {
            month: june,
            is_locked: false,
            locked_by: 1,
            locked_at: Utc.with_ymd_and_hms(2026, 7, 1, 9, 0, 0).unwrap(),
            lock_reason: None,
            unlocked_by: Some(1),
            unlocked_at: Some(Utc.with_ymd_and_hms(2026, 7, 2, 9, 0, 0).unwrap()),
            unlock_reason: Some("late correction".to_string()),
        };

        assert!(!cache.reconcile(june, Some(&unlocked)).await);
        assert_eq!(cache.is_locked(june).await, Some(false));

        assert!(!cache.reconcile(june, None).await);
        assert!(cache.reconcile(june, Some(&PayrollMonthLock { is_locked: true, ..unlocked })).await);
        assert_eq!(cache.is_locked(june).await, Some(true));
    }
}
