//! Splits a monthly total into dated milestone payments.

use crate::engine::due_date;
use crate::model::{MilestoneKind, MilestoneStep, Period};
use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::Serialize;

/// The label used when a version has no payment structure.
pub const FULL_PAYMENT: &str = "Full Payment";

/// One dated partial payment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Milestone {
    pub name: String,
    pub amount: Decimal,
    pub due_date: NaiveDate,
}

/// Apportions `total` over `steps` for the month `period`.
///
/// Fixed and percent steps are emitted in the order given, each subtracting from a running
/// remainder. A remainder step, if any, is emitted last with whatever is left, regardless of where
/// it appears in `steps`. Only the first remainder step is honoured. An empty structure yields a
/// single full payment on the first of the month.
///
/// No rounding is applied: percentages may leave fractional amounts, and fixed steps larger than
/// the total leave a negative remainder.
pub fn apportion(total: Decimal, steps: &[MilestoneStep], period: Period) -> Vec<Milestone> {
    if steps.is_empty() {
        return vec![Milestone {
            name: String::from(FULL_PAYMENT),
            amount: total,
            due_date: period.first_day(),
        }];
    }

    let mut remaining = total;
    let mut out = Vec::with_capacity(steps.len());
    for step in steps {
        let amount = match step.kind {
            MilestoneKind::Fixed => step.value_or_zero(),
            MilestoneKind::Percent => total * step.value_or_zero() / Decimal::ONE_HUNDRED,
            MilestoneKind::Remainder => continue,
        };
        remaining -= amount;
        out.push(Milestone {
            name: step.name.clone(),
            amount,
            due_date: due_date::resolve_offset(period, step.day_offset),
        });
    }

    if let Some(step) = steps.iter().find(|s| s.kind == MilestoneKind::Remainder) {
        out.push(Milestone {
            name: step.name.clone(),
            amount: remaining,
            due_date: due_date::resolve_offset(period, step.day_offset),
        });
    }
    out
}
