//! generate → approve → pay, per employee-month.

use chrono::{DateTime, NaiveDate, Utc};
use serde::Deserialize;
use thiserror::Error;
use utoipa::ToSchema;

use crate::model::attendance::PeriodFacts;
use crate::model::month_lock::PayrollMonthLock;
use crate::model::payroll::{PaymentMethod, Payroll, PayrollStatus};
use crate::model::payroll_structure::SalaryComponents;
use crate::model::role::Role;
use crate::payroll::calculator::{PayBreakdown, calculate};

/// Who is performing a workflow action.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Actor {
    pub user_id: u64,
    pub role: Role,
}

#[derive(Debug, Error, PartialEq)]
pub enum WorkflowError {
    #[error("role `{role}` may not {action}")]
    Forbidden { role: Role, action: &'static str },
    #[error("payroll month {0} is locked")]
    MonthLocked(NaiveDate),
    #[error("payroll is already {0} and cannot be regenerated")]
    AlreadyFinalized(PayrollStatus),
    #[error("cannot move payroll from {from} to {to}")]
    InvalidTransition {
        from: PayrollStatus,
        to: PayrollStatus,
    },
    #[error("payment reference is required")]
    PaymentReferenceRequired,
    #[error("payroll month {0} is already locked")]
    AlreadyLocked(NaiveDate),
    #[error("payroll month {0} is not locked")]
    NotLocked(NaiveDate),
    #[error("a reason is required to unlock a payroll month")]
    ReasonRequired,
    #[error("{0} must be a non-negative amount")]
    InvalidAmount(&'static str),
}

pub(crate) fn require(
    actor: &Actor,
    allowed: fn(Role) -> bool,
    action: &'static str,
) -> Result<(), WorkflowError> {
    if allowed(actor.role) {
        Ok(())
    } else {
        Err(WorkflowError::Forbidden {
            role: actor.role,
            action,
        })
    }
}

fn ensure_open(lock: Option<&PayrollMonthLock>, month: NaiveDate) -> Result<(), WorkflowError> {
    match lock {
        Some(l) if l.is_locked => Err(WorkflowError::MonthLocked(month)),
        _ => Ok(()),
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct GenerationInput {
    pub user_id: u64,
    pub month: NaiveDate,
    pub financial_year: String,
    pub structure: SalaryComponents,
    pub facts: PeriodFacts,
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct PaymentDetails {
    pub method: PaymentMethod,
    #[schema(example = "TRX-2026-06-0042")]
    pub reference: String,
}

fn apply_breakdown(payroll: &mut Payroll, pay: &PayBreakdown) {
    payroll.basic = pay.basic;
    payroll.hra = pay.hra;
    payroll.special_allowance = pay.special_allowance;
    payroll.bonus = pay.bonus;
    payroll.other_allowance = pay.other_allowance;
    payroll.gross_earnings = pay.gross_earnings;
    payroll.pf = pay.pf;
    payroll.tax = pay.tax;
    payroll.other_deduction = pay.other_deduction;
    payroll.total_deductions = pay.total_deductions;
    payroll.net_pay = pay.net_pay;
}

/// Builds (or rebuilds) the payroll row for one employee-month.
///
/// A calculation problem does not fail the call: the row comes back as
/// `failed` with the reason in `notes` so it can be corrected and regenerated.
pub fn generate(
    existing: Option<&Payroll>,
    lock: Option<&PayrollMonthLock>,
    actor: &Actor,
    input: GenerationInput,
    now: DateTime<Utc>,
) -> Result<Payroll, WorkflowError> {
    require(actor, Role::can_generate_payroll, "generate payroll")?;
    ensure_open(lock, input.month)?;

    if let Some(current) = existing {
        if current.status.is_finalized() {
            return Err(WorkflowError::AlreadyFinalized(current.status));
        }
    }

    let mut payroll = Payroll {
        id: existing.and_then(|p| p.id),
        user_id: input.user_id,
        month: input.month,
        financial_year: input.financial_year,
        working_days: input.facts.working_days,
        payable_days: input.facts.payable_days,
        lop_days: input.facts.lop_days(),
        basic: 0.0,
        hra: 0.0,
        special_allowance: 0.0,
        bonus: 0.0,
        other_allowance: 0.0,
        gross_earnings: 0.0,
        pf: 0.0,
        tax: 0.0,
        other_deduction: 0.0,
        total_deductions: 0.0,
        net_pay: 0.0,
        status: PayrollStatus::Draft,
        notes: None,
        generated_by: actor.user_id,
        generated_at: now,
        approved_by: None,
        approved_at: None,
        paid_by: None,
        paid_at: None,
        payment_method: None,
        payment_reference: None,
    };

    match calculate(&input.structure, &input.facts) {
        Ok(pay) => apply_breakdown(&mut payroll, &pay),
        Err(e) => {
            tracing::warn!(
                user_id = payroll.user_id,
                month = %payroll.month,
                error = %e,
                "Payroll calculation failed"
            );
            payroll.status = PayrollStatus::Failed;
            payroll.notes = Some(format!("Calculation failed: {e}"));
        }
    }

    Ok(payroll)
}

pub fn approve(
    payroll: &mut Payroll,
    lock: Option<&PayrollMonthLock>,
    actor: &Actor,
    now: DateTime<Utc>,
) -> Result<(), WorkflowError> {
    require(actor, Role::can_approve_payroll, "approve payroll")?;
    ensure_open(lock, payroll.month)?;

    if payroll.status != PayrollStatus::Draft {
        return Err(WorkflowError::InvalidTransition {
            from: payroll.status,
            to: PayrollStatus::Processed,
        });
    }

    payroll.status = PayrollStatus::Processed;
    payroll.approved_by = Some(actor.user_id);
    payroll.approved_at = Some(now);
    Ok(())
}

pub fn mark_paid(
    payroll: &mut Payroll,
    lock: Option<&PayrollMonthLock>,
    actor: &Actor,
    payment: PaymentDetails,
    now: DateTime<Utc>,
) -> Result<(), WorkflowError> {
    require(actor, Role::can_mark_paid, "mark payroll as paid")?;
    ensure_open(lock, payroll.month)?;

    if payroll.status != PayrollStatus::Processed {
        return Err(WorkflowError::InvalidTransition {
            from: payroll.status,
            to: PayrollStatus::Paid,
        });
    }

    let reference = payment.reference.trim();
    if reference.is_empty() {
        return Err(WorkflowError::PaymentReferenceRequired);
    }

    payroll.status = PayrollStatus::Paid;
    payroll.paid_by = Some(actor.user_id);
    payroll.paid_at = Some(now);
    payroll.payment_method = Some(payment.method);
    payroll.payment_reference = Some(reference.to_string());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use rstest::rstest;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 7, 1, 9, 0, 0).unwrap()
    }

    fn june() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 6, 1).unwrap()
    }

    fn actor(role: Role) -> Actor {
        Actor { user_id: 99, role }
    }

    fn input(facts: PeriodFacts) -> GenerationInput {
        GenerationInput {
            user_id: 7,
            month: june(),
            financial_year: "2026-27".to_string(),
            structure: SalaryComponents {
                basic: 50_000.0,
                hra: 10_000.0,
                special_allowance: 5_000.0,
                pf: 2_000.0,
                tax: 1_000.0,
                ..Default::default()
            },
            facts,
        }
    }

    fn locked() -> PayrollMonthLock {
        PayrollMonthLock {
            month: june(),
            is_locked: true,
            locked_by: 1,
            locked_at: now(),
            lock_reason: None,
            unlocked_by: None,
            unlocked_at: None,
            unlock_reason: None,
        }
    }

    fn draft() -> Payroll {
        generate(None, None, &actor(Role::Hr), input(PeriodFacts::new(22.0, 20.0)), now()).unwrap()
    }

    fn payment() -> PaymentDetails {
        PaymentDetails {
            method: PaymentMethod::BankTransfer,
            reference: " TRX-1 ".to_string(),
        }
    }

    #[test]
    fn generate_produces_a_draft_with_totals() {
        let p = draft();
        assert_eq!(p.status, PayrollStatus::Draft);
        assert_eq!(p.status.ui_label(), "generated");
        assert_eq!(p.gross_earnings, 59_090.91);
        assert_eq!(p.net_pay, 56_090.91);
        assert_eq!(p.lop_days, 2.0);
        assert_eq!(p.generated_by, 99);
        assert_eq!(p.approved_by, None);
    }

    #[test]
    fn calculation_errors_become_failed_rows() {
        let p = generate(
            None,
            None,
            &actor(Role::Admin),
            input(PeriodFacts::new(20.0, 25.0)),
            now(),
        )
        .unwrap();
        assert_eq!(p.status, PayrollStatus::Failed);
        assert_eq!(p.net_pay, 0.0);
        assert!(p.notes.unwrap().contains("exceed working days"));
    }

    #[test]
    fn failed_and_draft_rows_are_regenerated_in_place() {
        let mut failed = draft();
        failed.id = Some(12);
        failed.status = PayrollStatus::Failed;

        let p = generate(
            Some(&failed),
            None,
            &actor(Role::SuperAdmin),
            input(PeriodFacts::new(22.0, 22.0)),
            now(),
        )
        .unwrap();
        assert_eq!(p.id, Some(12));
        assert_eq!(p.status, PayrollStatus::Draft);
        assert_eq!(p.gross_earnings, 65_000.0);
        assert_eq!(p.notes, None);
    }

    #[rstest]
    #[case(PayrollStatus::Processed)]
    #[case(PayrollStatus::Paid)]
    fn finalized_rows_cannot_be_regenerated(#[case] status: PayrollStatus) {
        let mut existing = draft();
        existing.status = status;
        let err = generate(
            Some(&existing),
            None,
            &actor(Role::Admin),
            input(PeriodFacts::new(22.0, 22.0)),
            now(),
        )
        .unwrap_err();
        assert_eq!(err, WorkflowError::AlreadyFinalized(status));
    }

    #[test]
    fn locked_month_blocks_generation() {
        let err = generate(
            None,
            Some(&locked()),
            &actor(Role::Admin),
            input(PeriodFacts::new(22.0, 22.0)),
            now(),
        )
        .unwrap_err();
        assert_eq!(err, WorkflowError::MonthLocked(june()));
    }

    #[test]
    fn unlocked_lock_row_does_not_block() {
        let mut lock = locked();
        lock.is_locked = false;
        assert!(
            generate(
                None,
                Some(&lock),
                &actor(Role::Admin),
                input(PeriodFacts::new(22.0, 22.0)),
                now()
            )
            .is_ok()
        );
    }

    #[rstest]
    #[case(Role::Finance)]
    #[case(Role::Employee)]
    fn generation_is_role_gated(#[case] role: Role) {
        let err = generate(None, None, &actor(role), input(PeriodFacts::new(1.0, 1.0)), now())
            .unwrap_err();
        assert!(matches!(err, WorkflowError::Forbidden { .. }));
    }

    #[test]
    fn full_happy_path_stamps_actors() {
        let mut p = draft();

        approve(&mut p, None, &Actor { user_id: 2, role: Role::Admin }, now()).unwrap();
        assert_eq!(p.status, PayrollStatus::Processed);
        assert_eq!(p.status.ui_label(), "approved");
        assert_eq!(p.approved_by, Some(2));
        assert_eq!(p.approved_at, Some(now()));

        mark_paid(&mut p, None, &Actor { user_id: 3, role: Role::Finance }, payment(), now())
            .unwrap();
        assert_eq!(p.status, PayrollStatus::Paid);
        assert_eq!(p.paid_by, Some(3));
        assert_eq!(p.payment_method, Some(PaymentMethod::BankTransfer));
        assert_eq!(p.payment_reference.as_deref(), Some("TRX-1"));
    }

    #[test]
    fn approval_requires_privileged_role() {
        let mut p = draft();
        let err = approve(&mut p, None, &actor(Role::Hr), now()).unwrap_err();
        assert!(matches!(err, WorkflowError::Forbidden { role: Role::Hr, .. }));
        assert_eq!(p.status, PayrollStatus::Draft);
    }

    #[rstest]
    #[case(PayrollStatus::Processed)]
    #[case(PayrollStatus::Paid)]
    #[case(PayrollStatus::Failed)]
    fn only_drafts_can_be_approved(#[case] from: PayrollStatus) {
        let mut p = draft();
        p.status = from;
        assert_eq!(
            approve(&mut p, None, &actor(Role::Admin), now()),
            Err(WorkflowError::InvalidTransition {
                from,
                to: PayrollStatus::Processed
            })
        );
    }

    #[rstest]
    #[case(PayrollStatus::Draft)]
    #[case(PayrollStatus::Paid)]
    #[case(PayrollStatus::Failed)]
    fn only_processed_rows_can_be_paid(#[case] from: PayrollStatus) {
        let mut p = draft();
        p.status = from;
        assert_eq!(
            mark_paid(&mut p, None, &actor(Role::Admin), payment(), now()),
            Err(WorkflowError::InvalidTransition {
                from,
                to: PayrollStatus::Paid
            })
        );
    }

    #[test]
    fn payment_needs_a_reference() {
        let mut p = draft();
        approve(&mut p, None, &actor(Role::Admin), now()).unwrap();
        let blank = PaymentDetails {
            method: PaymentMethod::Cash,
            reference: "   ".to_string(),
        };
        assert_eq!(
            mark_paid(&mut p, None, &actor(Role::Admin), blank, now()),
            Err(WorkflowError::PaymentReferenceRequired)
        );
        assert_eq!(p.status, PayrollStatus::Processed);
    }

    #[test]
    fn hr_cannot_mark_paid() {
        let mut p = draft();
        approve(&mut p, None, &actor(Role::Admin), now()).unwrap();
        assert!(matches!(
            mark_paid(&mut p, None, &actor(Role::Hr), payment(), now()),
            Err(WorkflowError::Forbidden { .. })
        ));
    }

    #[test]
    fn locked_month_blocks_approval_and_payment() {
        let mut p = draft();
        assert_eq!(
            approve(&mut p, Some(&locked()), &actor(Role::Admin), now()),
            Err(WorkflowError::MonthLocked(june()))
        );
        p.status = PayrollStatus::Processed;
        assert_eq!(
            mark_paid(&mut p, Some(&locked()), &actor(Role::Admin), payment(), now()),
            Err(WorkflowError::MonthLocked(june()))
        );
    }
}
