// src/allocation.rs
//
// Draws per-date hour demand from eligible grants in priority order,
// creating consumption rows. Runs inside a `LedgerRepo` transaction, so a
// failure anywhere rolls back every row created by the call.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::collections::BTreeMap;
use tracing::{debug, info, warn};

use crate::error::{ConflictKind, LedgerError};
use crate::model::{
    AllocationMode, ConsumptionId, ConsumptionState, GrantId, LeaveConsumption, LeavePolicy,
    LeaveTypeId, RequestId, UserId,
};
use crate::needs::DemandMap;
use crate::store::LedgerState;

/// Allocates `demand` for one request within an open transaction.
///
/// Existing HOLD rows for the request are released first, so resubmitting an
/// edited draft replaces its reservation idempotently. A request that is
/// already confirmed cannot be re-allocated.
///
/// `manual_grant_ids` is an exhaustive, exact-order override: only the
/// listed grants are drawn from, in the given order. Without it the order is
/// ascending `granted_on`, ties broken by grant id.
#[allow(clippy::too_many_arguments)]
pub fn allocate_in_tx(
    state: &mut LedgerState,
    user_id: &UserId,
    leave_type_id: &LeaveTypeId,
    request_id: &RequestId,
    demand: &DemandMap,
    mode: AllocationMode,
    manual_grant_ids: Option<&[GrantId]>,
    policy: &LeavePolicy,
    now: DateTime<Utc>,
) -> Result<Vec<LeaveConsumption>, LedgerError> {
    // Guard against re-allocating an approved request, then fold any draft
    // holds back into the balances before drawing afresh.
    let prior_states: Vec<ConsumptionState> = state
        .rows_for_request(request_id)
        .iter()
        .map(|c| c.state)
        .collect();
    if prior_states.contains(&ConsumptionState::Confirmed) {
        return Err(LedgerError::conflict(
            request_id,
            ConflictKind::AlreadyConfirmed,
        ));
    }
    let mut replaced = 0usize;
    for row in state.rows_for_request_mut(request_id) {
        if row.state == ConsumptionState::Hold {
            row.state = ConsumptionState::Released;
            row.updated_at = now;
            replaced += 1;
        }
    }
    if replaced > 0 {
        info!(%request_id, replaced, "released prior holds before re-allocation");
    }

    let order = priority_order(state, user_id, leave_type_id, manual_grant_ids)?;

    // Balance snapshot the greedy loop deducts from; recomputing per draw
    // would double-count rows created earlier in this same call.
    let mut available: BTreeMap<GrantId, Decimal> = BTreeMap::new();
    for grant_id in &order {
        let grant = state
            .grant(grant_id)
            .ok_or_else(|| LedgerError::not_found(format!("grant {grant_id}")))?;
        available.insert(grant_id.clone(), state.remaining_including_holds(grant));
    }

    let mut created: Vec<ConsumptionId> = Vec::new();
    for (&date, &needed) in demand {
        let mut remaining = needed;
        let mut last_used: Option<GrantId> = None;

        for grant_id in &order {
            if remaining <= dec!(0) {
                break;
            }
            let grant = state
                .grant(grant_id)
                .ok_or_else(|| LedgerError::not_found(format!("grant {grant_id}")))?;
            if !grant.covers(date) {
                debug!(%grant_id, %date, "grant expired for date, skipping");
                continue;
            }
            let draw = remaining.min(available[grant_id]);
            if draw <= dec!(0) {
                continue;
            }
            let grant_id = grant_id.clone();
            let id = state.append_consumption(
                grant_id.clone(),
                request_id.clone(),
                date,
                draw,
                mode.initial_state(),
                now,
            );
            created.push(id);
            *available.get_mut(&grant_id).unwrap() -= draw;
            remaining -= draw;
            last_used = Some(grant_id);
        }

        if remaining > dec!(0) {
            if policy.allow_negative {
                let overdraw_target = overdraw_grant(state, &order, last_used, date)
                    .ok_or(LedgerError::InsufficientBalance {
                        date,
                        shortfall: remaining,
                    })?;
                warn!(
                    %request_id, %date, shortfall = %remaining, grant_id = %overdraw_target,
                    "allowing negative balance"
                );
                let id = state.append_consumption(
                    overdraw_target.clone(),
                    request_id.clone(),
                    date,
                    remaining,
                    mode.initial_state(),
                    now,
                );
                created.push(id);
                *available.get_mut(&overdraw_target).unwrap() -= remaining;
            } else {
                // Transaction rollback discards every row created above,
                // including the released prior holds.
                return Err(LedgerError::InsufficientBalance {
                    date,
                    shortfall: remaining,
                });
            }
        }
    }

    let rows: Vec<LeaveConsumption> = state
        .all_consumptions()
        .filter(|c| created.contains(&c.id))
        .cloned()
        .collect();
    info!(
        %request_id, %user_id, rows = rows.len(), mode = ?mode,
        "allocation complete"
    );
    Ok(rows)
}

/// Resolves the grant draw order for this call.
fn priority_order(
    state: &LedgerState,
    user_id: &UserId,
    leave_type_id: &LeaveTypeId,
    manual_grant_ids: Option<&[GrantId]>,
) -> Result<Vec<GrantId>, LedgerError> {
    match manual_grant_ids {
        Some(ids) => {
            if ids.is_empty() {
                return Err(LedgerError::not_found(
                    "manual grant list is empty".to_string(),
                ));
            }
            for id in ids {
                let grant = state
                    .grant(id)
                    .ok_or_else(|| LedgerError::not_found(format!("grant {id}")))?;
                if grant.user_id != *user_id || grant.leave_type_id != *leave_type_id {
                    return Err(LedgerError::not_found(format!(
                        "grant {id} does not belong to user {user_id} / leave type {leave_type_id}"
                    )));
                }
            }
            Ok(ids.to_vec())
        }
        None => {
            let grants = state.grants_for(user_id, Some(leave_type_id.as_str()));
            if grants.is_empty() {
                return Err(LedgerError::not_found(format!(
                    "no grants for user {user_id} and leave type {leave_type_id}"
                )));
            }
            Ok(grants.into_iter().map(|g| g.id.clone()).collect())
        }
    }
}

/// Picks the grant an overdraw row is booked against: the last grant used
/// for this date, else the last grant in priority order still covering the
/// date. With no coverable grant at all there is no legal source row
/// (consumed_on must stay within expiry), so the shortfall stands.
fn overdraw_grant(
    state: &LedgerState,
    order: &[GrantId],
    last_used: Option<GrantId>,
    date: NaiveDate,
) -> Option<GrantId> {
    if last_used.is_some() {
        return last_used;
    }
    order
        .iter()
        .rev()
        .find(|id| state.grant(id).map_or(false, |g| g.covers(date)))
        .cloned()
}
