use chrono::{DateTime, NaiveDate, Utc};

use crate::model::month_lock::{LockAction, PayrollMonthLock, PayrollMonthLockEvent};
use crate::model::role::Role;
use crate::payroll::workflow::{Actor, WorkflowError, require};

fn clean_reason(reason: Option<&str>) -> Option<String> {
    reason
        .map(str::trim)
        .filter(|r| !r.is_empty())
        .map(str::to_string)
}

/// Closes a month. A previously unlocked month can be locked again; its
/// unlock fields are kept until the next unlock overwrites them.
pub fn lock_month(
    existing: Option<&PayrollMonthLock>,
    month: NaiveDate,
    actor: &Actor,
    reason: Option<&str>,
    now: DateTime<Utc>,
) -> Result<(PayrollMonthLock, PayrollMonthLockEvent), WorkflowError> {
    require(actor, Role::can_lock_month, "lock a payroll month")?;

    if existing.is_some_and(|l| l.is_locked) {
        return Err(WorkflowError::AlreadyLocked(month));
    }

    let reason = clean_reason(reason);
    let lock = PayrollMonthLock {
        month,
        is_locked: true,
        locked_by: actor.user_id,
        locked_at: now,
        lock_reason: reason.clone(),
        unlocked_by: existing.and_then(|l| l.unlocked_by),
        unlocked_at: existing.and_then(|l| l.unlocked_at),
        unlock_reason: existing.and_then(|l| l.unlock_reason.clone()),
    };
    let event = PayrollMonthLockEvent {
        month,
        action: LockAction::Lock,
        actor_id: actor.user_id,
        reason,
        created_at: now,
    };
    Ok((lock, event))
}

/// Reopens a month. Super admins only, and only with a reason.
pub fn unlock_month(
    existing: Option<&PayrollMonthLock>,
    month: NaiveDate,
    actor: &Actor,
    reason: Option<&str>,
    now: DateTime<Utc>,
) -> Result<(PayrollMonthLock, PayrollMonthLockEvent), WorkflowError> {
    require(actor, Role::can_unlock_month, "unlock a payroll month")?;

    let current = match existing {
        Some(l) if l.is_locked => l,
        _ => return Err(WorkflowError::NotLocked(month)),
    };
    let reason = clean_reason(reason).ok_or(WorkflowError::ReasonRequired)?;

    let lock = PayrollMonthLock {
        is_locked: false,
        unlocked_by: Some(actor.user_id),
        unlocked_at: Some(now),
        unlock_reason: Some(reason.clone()),
        ..current.clone()
    };
    let event = PayrollMonthLockEvent {
        month,
        action: LockAction::Unlock,
        actor_id: actor.user_id,
        reason: Some(reason),
        created_at: now,
    };
    Ok((lock, event))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 7, 5, 12, 0, 0).unwrap()
    }

    fn june() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 6, 1).unwrap()
    }

    fn admin() -> Actor {
        Actor { user_id: 2, role: Role::Admin }
    }

    fn root() -> Actor {
        Actor { user_id: 1, role: Role::SuperAdmin }
    }

    #[test]
    fn lock_records_actor_and_event() {
        let (lock, event) = lock_month(None, june(), &admin(), Some(" closing "), now()).unwrap();
        assert!(lock.is_locked);
        assert_eq!(lock.locked_by, 2);
        assert_eq!(lock.lock_reason.as_deref(), Some("closing"));
        assert_eq!(event.action, LockAction::Lock);
        assert_eq!(event.actor_id, 2);
    }

    #[test]
    fn cannot_lock_twice() {
        let (lock, _) = lock_month(None, june(), &admin(), None, now()).unwrap();
        assert_eq!(
            lock_month(Some(&lock), june(), &admin(), None, now()).unwrap_err(),
            WorkflowError::AlreadyLocked(june())
        );
    }

    #[test]
    fn hr_cannot_lock() {
        let hr = Actor { user_id: 3, role: Role::Hr };
        assert!(matches!(
            lock_month(None, june(), &hr, None, now()),
            Err(WorkflowError::Forbidden { .. })
        ));
    }

    #[test]
    fn only_super_admin_can_unlock() {
        let (lock, _) = lock_month(None, june(), &admin(), None, now()).unwrap();
        assert!(matches!(
            unlock_month(Some(&lock), june(), &admin(), Some("fix"), now()),
            Err(WorkflowError::Forbidden { role: Role::Admin, .. })
        ));
    }

    #[test]
    fn unlock_requires_reason() {
        let (lock, _) = lock_month(None, june(), &admin(), None, now()).unwrap();
        for reason in [None, Some(""), Some("  ")] {
            assert_eq!(
                unlock_month(Some(&lock), june(), &root(), reason, now()).unwrap_err(),
                WorkflowError::ReasonRequired
            );
        }
    }

    #[test]
    fn unlock_keeps_lock_history_and_stamps_actor() {
        let (lock, _) = lock_month(None, june(), &admin(), Some("closing"), now()).unwrap();
        let (unlocked, event) =
            unlock_month(Some(&lock), june(), &root(), Some("late attendance fix"), now()).unwrap();

        assert!(!unlocked.is_locked);
        assert_eq!(unlocked.locked_by, 2);
        assert_eq!(unlocked.lock_reason.as_deref(), Some("closing"));
        assert_eq!(unlocked.unlocked_by, Some(1));
        assert_eq!(unlocked.unlock_reason.as_deref(), Some("late attendance fix"));
        assert_eq!(event.action, LockAction::Unlock);
        assert_eq!(event.reason.as_deref(), Some("late attendance fix"));
    }

    #[test]
    fn unlocking_an_open_month_fails() {
        assert_eq!(
            unlock_month(None, june(), &root(), Some("why"), now()).unwrap_err(),
            WorkflowError::NotLocked(june())
        );
    }

    #[test]
    fn month_can_be_relocked_after_unlock() {
        let (lock, _) = lock_month(None, june(), &admin(), None, now()).unwrap();
        let (unlocked, _) = unlock_month(Some(&lock), june(), &root(), Some("fix"), now()).unwrap();
        let (relocked, _) = lock_month(Some(&unlocked), june(), &admin(), None, now()).unwrap();
        assert!(relocked.is_locked);
        assert_eq!(relocked.unlocked_by, Some(1));
    }
}
