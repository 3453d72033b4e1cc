// src/model.rs

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

// --- Identifier aliases ---

pub type GrantId = String;
pub type UserId = String;
pub type LeaveTypeId = String;
pub type RequestId = String;
pub type CompanyId = String;
/// Assigned by the store from a monotonic counter; never reused.
pub type ConsumptionId = u64;

// --- Grants ---

/// A batch of leave entitlement hours. Created by the external accrual
/// process; the ledger only ever draws from it. Balances are derived from
/// consumption rows, never stored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LeaveGrant {
    pub id: GrantId,
    pub user_id: UserId,
    pub leave_type_id: LeaveTypeId,
    /// Entitlement in hours.
    pub quantity: Decimal,
    pub granted_on: NaiveDate,
    pub expires_on: Option<NaiveDate>,
}

impl LeaveGrant {
    /// A grant is an eligible source for hours consumed on `date` only while
    /// unexpired as of that date.
    pub fn covers(&self, date: NaiveDate) -> bool {
        match self.expires_on {
            Some(expiry) => date <= expiry,
            None => true,
        }
    }
}

// --- Consumption rows ---

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ConsumptionState {
    #[serde(rename = "HOLD")]
    Hold,
    #[serde(rename = "CONFIRMED")]
    Confirmed,
    #[serde(rename = "RELEASED")]
    Released,
    #[serde(rename = "REVERSED")]
    Reversed,
}

impl ConsumptionState {
    /// RELEASED and REVERSED rows never transition again; their hours are
    /// available for future allocation against the same grant.
    pub fn is_terminal(self) -> bool {
        matches!(self, ConsumptionState::Released | ConsumptionState::Reversed)
    }

    /// Active rows count against the grant's balance.
    pub fn counts_against_balance(self) -> bool {
        matches!(self, ConsumptionState::Hold | ConsumptionState::Confirmed)
    }
}

impl fmt::Display for ConsumptionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ConsumptionState::Hold => "HOLD",
            ConsumptionState::Confirmed => "CONFIRMED",
            ConsumptionState::Released => "RELEASED",
            ConsumptionState::Reversed => "REVERSED",
        };
        f.write_str(s)
    }
}

/// One ledger row: hours drawn from a single grant for a single request and
/// calendar date. Rows are append-only; only `state`, `updated_at` and
/// `reason` change after creation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LeaveConsumption {
    pub id: ConsumptionId,
    pub grant_id: GrantId,
    pub request_id: RequestId,
    pub consumed_on: NaiveDate,
    /// Hours, always > 0. Overdraw rows (allow_negative) are positive too;
    /// the grant balance simply goes below zero.
    pub quantity: Decimal,
    pub state: ConsumptionState,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// Set when the row is REVERSED.
    pub reason: Option<String>,
}

// --- Policy ---

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LeavePolicy {
    pub business_day_only: bool,
    pub blackout_dates: BTreeSet<NaiveDate>,
    pub allow_negative: bool,
}

// --- Request input ---

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LeaveUnit {
    Day,
    Half,
    Hour,
}

impl LeaveUnit {
    /// Hours represented by `quantity` of this unit under the given
    /// working-day length.
    pub fn hours(self, quantity: Decimal, hours_per_day: Decimal) -> Decimal {
        match self {
            LeaveUnit::Hour => quantity,
            LeaveUnit::Half => hours_per_day / Decimal::TWO * quantity,
            LeaveUnit::Day => hours_per_day * quantity,
        }
    }
}

/// Smallest booking granularity a policy accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MinUnit {
    #[serde(rename = "1h")]
    OneHour,
    #[serde(rename = "0.5d")]
    HalfDay,
    #[serde(rename = "1d")]
    FullDay,
}

impl std::str::FromStr for MinUnit {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "1h" => Ok(MinUnit::OneHour),
            "0.5d" => Ok(MinUnit::HalfDay),
            "1d" => Ok(MinUnit::FullDay),
            other => Err(format!(
                "unknown minimum unit '{}' (expected 1h, 0.5d or 1d)",
                other
            )),
        }
    }
}

/// One raw detail line of a leave request. A line is assumed to fall within
/// one calendar date; lines crossing midnight are attributed to `start_at`'s
/// date without splitting.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequestDetail {
    pub start_at: NaiveDateTime,
    pub end_at: NaiveDateTime,
    pub unit: LeaveUnit,
    pub quantity: Decimal,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AllocationMode {
    /// Provisional reservation at submission time.
    Hold,
    /// Immediately final (e.g. retroactive entry by an administrator).
    Confirm,
}

impl AllocationMode {
    pub fn initial_state(self) -> ConsumptionState {
        match self {
            AllocationMode::Hold => ConsumptionState::Hold,
            AllocationMode::Confirm => ConsumptionState::Confirmed,
        }
    }
}

// --- Read models ---

/// Per-grant balance view returned by `list_grants`, in default priority
/// order, for manual-override UIs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GrantBalance {
    pub id: GrantId,
    pub quantity: Decimal,
    pub granted_on: NaiveDate,
    pub expires_on: Option<NaiveDate>,
    pub remaining_confirmed: Decimal,
    pub remaining_including_holds: Decimal,
}
