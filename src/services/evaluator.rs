// src/services/evaluator.rs
use chrono::NaiveDateTime;
use log::info;

use crate::config::Thresholds;
use crate::models::{AccountFields, VerdictStatus};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RechargeAssessment {
    pub recharge_amount_numeric: Option<f64>,
    pub recently_recharged: bool,
}

/// A reading taken earlier on the same calendar day as the recharge.
pub fn is_same_day_recharge_after_reading(
    reading: Option<NaiveDateTime>,
    recharge: Option<NaiveDateTime>,
) -> bool {
    match (reading, recharge) {
        (Some(reading), Some(recharge)) => {
            let same_day = reading.date() == recharge.date();
            let after = recharge > reading;
            info!(
                "Balance time: {}, Recharge time: {}, same day: {}, recharge after reading: {}",
                reading, recharge, same_day, after
            );
            same_day && after
        }
        _ => false,
    }
}

/// Same-day-recharge heuristic: a low balance read before a same-day top-up
/// is not treated as low.
pub fn evaluate(fields: &AccountFields, thresholds: &Thresholds) -> RechargeAssessment {
    let balance_low = fields
        .balance_numeric
        .map_or(false, |balance| balance < thresholds.low_balance);
    let recharge_plausible = fields
        .recharge_amount_numeric
        .map_or(false, |amount| amount >= thresholds.recharge_floor);

    let recently_recharged = balance_low
        && recharge_plausible
        && is_same_day_recharge_after_reading(fields.reading_timestamp, fields.recharge_timestamp);

    RechargeAssessment {
        recharge_amount_numeric: fields.recharge_amount_numeric,
        recently_recharged,
    }
}

/// Recharge wins over the balance check; unknown balance is never a warning.
pub fn classify(
    fields: &AccountFields,
    assessment: &RechargeAssessment,
    thresholds: &Thresholds,
) -> VerdictStatus {
    if assessment.recently_recharged {
        VerdictStatus::RecentlyRecharged
    } else if fields
        .balance_numeric
        .map_or(false, |balance| balance < thresholds.low_balance)
    {
        VerdictStatus::Warning
    } else {
        VerdictStatus::Sufficient
    }
}
