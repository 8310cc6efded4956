//! Pro-rated pay from a salary structure and the month's day counts.
//!
//! Each earning is scaled by `payable / working` and rounded to cents on its
//! own before the gross is summed. Deductions are taken at full value. Totals
//! must reproduce figures already issued on payslips, so that order matters.

use serde::Serialize;
use thiserror::Error;
use utoipa::ToSchema;

use crate::model::attendance::PeriodFacts;
use crate::model::payroll_structure::SalaryComponents;

#[derive(Debug, Error, PartialEq)]
pub enum CalculationError {
    #[error("{0} must be a non-negative amount")]
    InvalidComponent(&'static str),
    #[error("{0} must be a non-negative number of days")]
    InvalidDays(&'static str),
    #[error("payable days ({payable}) exceed working days ({working})")]
    PayableExceedsWorking { payable: f64, working: f64 },
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, ToSchema)]
pub struct PayBreakdown {
    pub ratio: f64,
    pub basic: f64,
    pub hra: f64,
    pub special_allowance: f64,
    pub bonus: f64,
    pub other_allowance: f64,
    pub gross_earnings: f64,
    pub pf: f64,
    pub tax: f64,
    pub other_deduction: f64,
    pub total_deductions: f64,
    pub net_pay: f64,
}

pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// `payable / working`, or 1 when there are no working days.
pub fn proration_ratio(facts: &PeriodFacts) -> f64 {
    if facts.working_days > 0.0 {
        facts.payable_days / facts.working_days
    } else {
        1.0
    }
}

fn validate(structure: &SalaryComponents, facts: &PeriodFacts) -> Result<(), CalculationError> {
    for (name, amount) in structure.earnings().into_iter().chain(structure.deductions()) {
        if !amount.is_finite() || amount < 0.0 {
            return Err(CalculationError::InvalidComponent(name));
        }
    }
    for (name, days) in [
        ("working_days", facts.working_days),
        ("payable_days", facts.payable_days),
    ] {
        if !days.is_finite() || days < 0.0 {
            return Err(CalculationError::InvalidDays(name));
        }
    }
    if facts.working_days > 0.0 && facts.payable_days > facts.working_days {
        return Err(CalculationError::PayableExceedsWorking {
            payable: facts.payable_days,
            working: facts.working_days,
        });
    }
    Ok(())
}

pub fn calculate(
    structure: &SalaryComponents,
    facts: &PeriodFacts,
) -> Result<PayBreakdown, CalculationError> {
    validate(structure, facts)?;

    let ratio = proration_ratio(facts);
    let prorate = |amount: f64| round2(amount * ratio);

    let basic = prorate(structure.basic);
    let hra = prorate(structure.hra);
    let special_allowance = prorate(structure.special_allowance);
    let bonus = prorate(structure.bonus);
    let other_allowance = prorate(structure.other_allowance);
    let gross_earnings = round2(basic + hra + special_allowance + bonus + other_allowance);

    let pf = round2(structure.pf);
    let tax = round2(structure.tax);
    let other_deduction = round2(structure.other_deduction);
    let total_deductions = round2(pf + tax + other_deduction);

    let net_pay = round2((gross_earnings - total_deductions).max(0.0));

    Ok(PayBreakdown {
        ratio,
        basic,
        hra,
        special_allowance,
        bonus,
        other_allowance,
        gross_earnings,
        pf,
        tax,
        other_deduction,
        total_deductions,
        net_pay,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn structure() -> SalaryComponents {
        SalaryComponents {
            basic: 50_000.0,
            hra: 10_000.0,
            special_allowance: 5_000.0,
            bonus: 0.0,
            other_allowance: 0.0,
            pf: 2_000.0,
            tax: 1_000.0,
            other_deduction: 0.0,
        }
    }

    #[test]
    fn prorates_each_earning_before_summing() {
        let pay = calculate(&structure(), &PeriodFacts::new(22.0, 20.0)).unwrap();

        assert_eq!(pay.basic, 45_454.55);
        assert_eq!(pay.hra, 9_090.91);
        assert_eq!(pay.special_allowance, 4_545.45);
        assert_eq!(pay.gross_earnings, 59_090.91);
        assert_eq!(pay.total_deductions, 3_000.0);
        assert_eq!(pay.net_pay, 56_090.91);
        assert!((pay.ratio - 20.0 / 22.0).abs() < 1e-12);
    }

    #[test]
    fn per_component_rounding_differs_from_rounding_the_total() {
        let s = SalaryComponents {
            basic: 100.0,
            hra: 100.0,
            special_allowance: 100.0,
            ..Default::default()
        };
        // 100 * 2/3 = 66.666.. -> 66.67 three times
        let pay = calculate(&s, &PeriodFacts::new(3.0, 2.0)).unwrap();
        assert_eq!(pay.gross_earnings, 200.01);
    }

    #[test]
    fn deductions_are_not_prorated() {
        let pay = calculate(&structure(), &PeriodFacts::new(20.0, 10.0)).unwrap();
        assert_eq!(pay.gross_earnings, 32_500.0);
        assert_eq!(pay.pf, 2_000.0);
        assert_eq!(pay.tax, 1_000.0);
        assert_eq!(pay.net_pay, 29_500.0);
    }

    #[test]
    fn zero_working_days_pays_in_full() {
        let pay = calculate(&structure(), &PeriodFacts::new(0.0, 0.0)).unwrap();
        assert_eq!(pay.ratio, 1.0);
        assert_eq!(pay.gross_earnings, 65_000.0);
        assert_eq!(pay.net_pay, 62_000.0);
    }

    #[test]
    fn net_is_clamped_at_zero() {
        let s = SalaryComponents {
            basic: 1_000.0,
            tax: 5_000.0,
            ..Default::default()
        };
        let pay = calculate(&s, &PeriodFacts::new(30.0, 30.0)).unwrap();
        assert_eq!(pay.gross_earnings, 1_000.0);
        assert_eq!(pay.total_deductions, 5_000.0);
        assert_eq!(pay.net_pay, 0.0);
    }

    #[test]
    fn deductions_are_rounded_to_cents() {
        let s = SalaryComponents {
            basic: 1_000.0,
            pf: 120.004,
            tax: 10.006,
            ..Default::default()
        };
        let pay = calculate(&s, &PeriodFacts::new(1.0, 1.0)).unwrap();
        assert_eq!(pay.pf, 120.0);
        assert_eq!(pay.tax, 10.01);
        assert_eq!(pay.total_deductions, 130.01);
    }

    #[test]
    fn gross_matches_sum_of_rounded_components() {
        let s = SalaryComponents {
            basic: 37_123.45,
            hra: 8_765.43,
            special_allowance: 2_222.22,
            bonus: 999.99,
            other_allowance: 123.45,
            ..Default::default()
        };
        for working in 1..=31 {
            for payable in 0..=working {
                let facts = PeriodFacts::new(f64::from(working), f64::from(payable));
                let ratio = f64::from(payable) / f64::from(working);
                let expected = round2(
                    s.earnings()
                        .iter()
                        .map(|(_, amount)| round2(amount * ratio))
                        .sum::<f64>(),
                );
                let pay = calculate(&s, &facts).unwrap();
                assert_eq!(pay.gross_earnings, expected);
                assert!(pay.net_pay >= 0.0);
            }
        }
    }

    #[rstest]
    #[case(SalaryComponents { basic: -1.0, ..Default::default() }, PeriodFacts::new(22.0, 22.0), CalculationError::InvalidComponent("basic"))]
    #[case(SalaryComponents { tax: f64::NAN, ..Default::default() }, PeriodFacts::new(22.0, 22.0), CalculationError::InvalidComponent("tax"))]
    #[case(SalaryComponents::default(), PeriodFacts::new(-1.0, 0.0), CalculationError::InvalidDays("working_days"))]
    #[case(SalaryComponents::default(), PeriodFacts::new(22.0, -2.0), CalculationError::InvalidDays("payable_days"))]
    #[case(SalaryComponents::default(), PeriodFacts::new(20.0, 21.0), CalculationError::PayableExceedsWorking { payable: 21.0, working: 20.0 })]
    fn rejects_invalid_inputs(
        #[case] s: SalaryComponents,
        #[case] facts: PeriodFacts,
        #[case] expected: CalculationError,
    ) {
        assert_eq!(calculate(&s, &facts), Err(expected));
    }
}
