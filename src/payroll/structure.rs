use chrono::{DateTime, NaiveDate, Utc};

use crate::model::payroll_structure::{PayrollStructureHistory, SalaryComponents};
use crate::model::role::Role;
use crate::payroll::workflow::{Actor, WorkflowError, require};

/// Validates a salary revision and builds its history snapshot.
pub fn revise(
    before: Option<SalaryComponents>,
    user_id: u64,
    after: SalaryComponents,
    effective_from: NaiveDate,
    actor: &Actor,
    reason: Option<&str>,
    now: DateTime<Utc>,
) -> Result<PayrollStructureHistory, WorkflowError> {
    require(actor, Role::can_manage_structures, "revise salary structures")?;

    if let Some((name, _)) = after
        .earnings()
        .into_iter()
        .chain(after.deductions())
        .find(|(_, amount)| !amount.is_finite() || *amount < 0.0)
    {
        return Err(WorkflowError::InvalidAmount(name));
    }

    Ok(PayrollStructureHistory {
        user_id,
        changed_by: actor.user_id,
        reason: reason
            .map(str::trim)
            .filter(|r| !r.is_empty())
            .map(str::to_string),
        before,
        after,
        effective_from,
        created_at: now,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 4, 1, 8, 0, 0).unwrap()
    }

    fn april() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 4, 1).unwrap()
    }

    #[test]
    fn snapshots_before_and_after() {
        let old = SalaryComponents {
            basic: 40_000.0,
            ..Default::default()
        };
        let new = SalaryComponents {
            basic: 45_000.0,
            ..old
        };
        let hr = Actor { user_id: 4, role: Role::Hr };

        let history = revise(Some(old), 7, new, april(), &hr, Some("annual raise"), now()).unwrap();
        assert_eq!(history.before, Some(old));
        assert_eq!(history.after.basic, 45_000.0);
        assert_eq!(history.changed_by, 4);
        assert_eq!(history.reason.as_deref(), Some("annual raise"));
    }

    #[test]
    fn rejects_negative_amounts() {
        let bad = SalaryComponents {
            pf: -5.0,
            ..Default::default()
        };
        let admin = Actor { user_id: 1, role: Role::Admin };
        assert_eq!(
            revise(None, 7, bad, april(), &admin, None, now()),
            Err(WorkflowError::InvalidAmount("pf"))
        );
    }

    #[test]
    fn finance_cannot_revise() {
        let finance = Actor { user_id: 5, role: Role::Finance };
        assert!(matches!(
            revise(None, 7, SalaryComponents::default(), april(), &finance, None, now()),
            Err(WorkflowError::Forbidden { .. })
        ));
    }
}
