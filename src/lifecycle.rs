// src/lifecycle.rs
//
// State machine over a request's consumption rows:
// HOLD -> CONFIRMED (confirm), HOLD -> RELEASED (release),
// CONFIRMED -> REVERSED (reverse, with reason). RELEASED and REVERSED are
// terminal. Every transition moves all of the request's rows together.

use chrono::{DateTime, Utc};
use tracing::info;

use crate::error::{ConflictKind, LedgerError};
use crate::model::{ConsumptionState, RequestId};
use crate::store::LedgerState;

/// Finalizes a request's reservation on approval. Guards double-approval.
pub fn confirm_in_tx(
    state: &mut LedgerState,
    request_id: &RequestId,
    now: DateTime<Utc>,
) -> Result<usize, LedgerError> {
    let states = row_states(state, request_id)?;
    if !states.contains(&ConsumptionState::Hold) {
        let kind = if states.contains(&ConsumptionState::Confirmed) {
            ConflictKind::AlreadyConfirmed
        } else {
            ConflictKind::RequestClosed
        };
        return Err(LedgerError::conflict(request_id, kind));
    }

    let confirmed = transition(state, request_id, ConsumptionState::Hold, |row| {
        row.state = ConsumptionState::Confirmed;
        row.updated_at = now;
    });
    info!(%request_id, rows = confirmed, "request confirmed");
    Ok(confirmed)
}

/// Cancels a reservation before approval. A request with confirmed rows must
/// be reversed instead.
pub fn release_in_tx(
    state: &mut LedgerState,
    request_id: &RequestId,
    now: DateTime<Utc>,
) -> Result<usize, LedgerError> {
    let states = row_states(state, request_id)?;
    if states.contains(&ConsumptionState::Confirmed) {
        return Err(LedgerError::conflict(
            request_id,
            ConflictKind::ConfirmedRowsPresent,
        ));
    }
    if !states.contains(&ConsumptionState::Hold) {
        return Err(LedgerError::conflict(request_id, ConflictKind::RequestClosed));
    }

    let released = transition(state, request_id, ConsumptionState::Hold, |row| {
        row.state = ConsumptionState::Released;
        row.updated_at = now;
    });
    info!(%request_id, rows = released, "request released");
    Ok(released)
}

/// Undoes an approved request, storing the mandatory reason on every
/// reversed row. Returns the number of rows reversed.
pub fn reverse_in_tx(
    state: &mut LedgerState,
    request_id: &RequestId,
    reason: &str,
    now: DateTime<Utc>,
) -> Result<usize, LedgerError> {
    let states = row_states(state, request_id)?;
    if !states.contains(&ConsumptionState::Confirmed) {
        return Err(LedgerError::conflict(
            request_id,
            ConflictKind::NothingToReverse,
        ));
    }

    let reversed = transition(state, request_id, ConsumptionState::Confirmed, |row| {
        row.state = ConsumptionState::Reversed;
        row.reason = Some(reason.to_string());
        row.updated_at = now;
    });
    info!(%request_id, rows = reversed, reason, "request reversed");
    Ok(reversed)
}

fn row_states(
    state: &LedgerState,
    request_id: &RequestId,
) -> Result<Vec<ConsumptionState>, LedgerError> {
    let states: Vec<ConsumptionState> = state
        .rows_for_request(request_id)
        .iter()
        .map(|c| c.state)
        .collect();
    if states.is_empty() {
        return Err(LedgerError::not_found(format!(
            "no consumption rows for request {request_id}"
        )));
    }
    Ok(states)
}

fn transition(
    state: &mut LedgerState,
    request_id: &RequestId,
    from: ConsumptionState,
    apply: impl Fn(&mut crate::model::LeaveConsumption),
) -> usize {
    let mut count = 0;
    for row in state.rows_for_request_mut(request_id) {
        if row.state == from {
            apply(row);
            count += 1;
        }
    }
    count
}
