use moka::future::Cache;
use std::time::Duration;

use crate::auth::two_factor::PERIOD;

/// Remembers (user, time step) pairs that already completed a login so the
/// same one-time code cannot be used twice while it is still inside the window.
#[derive(Clone)]
pub struct TotpReplayGuard {
    used: Cache<(u64, u64), ()>,
}

impl TotpReplayGuard {
    pub fn new(window: u32) -> Self {
        let steps = 2 * u64::from(window) + 1;
        Self {
            used: Cache::builder()
                .max_capacity(100_000)
                .time_to_live(Duration::from_secs(steps * PERIOD))
                .build(),
        }
    }

    /// Records the step and returns `true` when it had not been used yet.
    pub async fn claim(&self, user_id: u64, step: u64) -> bool {
        let entry = self.used.entry((user_id, step)).or_insert(()).await;
        entry.is_fresh()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[actix_web::test]
    async fn second_claim_of_a_step_is_rejected() {
        let guard = TotpReplayGuard::new(1);
        assert!(guard.claim(7, 100).await);
        assert!(!guard.claim(7, 100).await);
        assert!(guard.claim(7, 101).await);
        assert!(guard.claim(8, 100).await);
    }
}
