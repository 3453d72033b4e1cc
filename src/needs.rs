// src/needs.rs
//
// Turns raw request detail lines into per-date hour demand. Pure; nothing
// here touches the ledger.

use chrono::NaiveDate;
use rust_decimal::{Decimal, RoundingStrategy};
use rust_decimal_macros::dec;
use std::collections::BTreeMap;
use tracing::debug;

use crate::error::{LedgerError, ValidationFault};
use crate::model::{MinUnit, RequestDetail};

pub type DemandMap = BTreeMap<NaiveDate, Decimal>;

/// Aggregates detail lines into a `date -> hours` demand map.
///
/// Each line is converted to hours via its unit, rounded to the nearest
/// whole hour (half-up) when the policy's minimum unit is one hour, and
/// attributed to the calendar date of `start_at`. Lines crossing midnight
/// are not split; they belong to the start date.
pub fn aggregate(
    details: &[RequestDetail],
    hours_per_day: Decimal,
    min_unit: MinUnit,
) -> Result<DemandMap, LedgerError> {
    if hours_per_day <= dec!(0) {
        return Err(LedgerError::Validation(
            ValidationFault::NonPositiveHoursPerDay,
        ));
    }

    let mut demand: DemandMap = BTreeMap::new();

    for detail in details {
        if detail.start_at >= detail.end_at {
            return Err(LedgerError::Validation(ValidationFault::InvalidRange));
        }
        if detail.quantity <= dec!(0) {
            return Err(LedgerError::Validation(ValidationFault::NonPositiveQuantity));
        }

        let mut hours = detail.unit.hours(detail.quantity, hours_per_day);
        if min_unit == MinUnit::OneHour {
            // Half-up on ties: 1.5 -> 2, 1.4 -> 1.
            hours = hours.round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero);
        }

        let date = detail.start_at.date();
        debug!(%date, %hours, unit = ?detail.unit, "aggregated detail line");
        *demand.entry(date).or_insert_with(|| dec!(0)) += hours;
    }

    // A 1h-unit line under an hour can round away entirely; drop empty dates
    // so no zero-quantity consumption row can ever be created from them.
    demand.retain(|_, hours| *hours > dec!(0));

    if demand.is_empty() {
        return Err(LedgerError::Validation(ValidationFault::EmptyDemand));
    }

    Ok(demand)
}
