// src/error.rs

use chrono::NaiveDate;
use rust_decimal::Decimal;
use thiserror::Error;

use crate::model::RequestId;

/// Reasons an allocation request is malformed before the ledger is even
/// consulted.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationFault {
    #[error("detail line range is empty or inverted (start_at >= end_at)")]
    InvalidRange,
    #[error("detail line quantity must be > 0")]
    NonPositiveQuantity,
    #[error("hours_per_day must be > 0")]
    NonPositiveHoursPerDay,
    #[error("request carries no hour demand after aggregation")]
    EmptyDemand,
}

/// Conflicting lifecycle transitions (double-delivery of UI actions, or the
/// wrong verb for the request's current state).
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConflictKind {
    #[error("request is already confirmed")]
    AlreadyConfirmed,
    #[error("request has confirmed rows; use reverse instead of release")]
    ConfirmedRowsPresent,
    #[error("request has no confirmed rows to reverse")]
    NothingToReverse,
    #[error("request is already closed (all rows released or reversed)")]
    RequestClosed,
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum LedgerError {
    #[error("validation failed: {0}")]
    Validation(ValidationFault),

    #[error("{date} is not a business day")]
    ClosedDay { date: NaiveDate },

    #[error("{date} is a blackout date")]
    BlackoutDate { date: NaiveDate },

    #[error("insufficient balance on {date}: short {shortfall} hours")]
    InsufficientBalance { date: NaiveDate, shortfall: Decimal },

    #[error("not found: {0}")]
    NotFound(String),

    #[error("conflict on request {request_id}: {kind}")]
    Conflict { request_id: RequestId, kind: ConflictKind },

    // Lock/timeout contention. The call left no partial state, so retrying
    // is safe.
    #[error("transient ledger failure (retryable): {0}")]
    Transient(String),

    #[error("policy lookup failed: {0}")]
    Policy(String),
}

impl LedgerError {
    pub fn is_retryable(&self) -> bool {
        matches!(self, LedgerError::Transient(_))
    }

    pub(crate) fn not_found(what: impl Into<String>) -> Self {
        LedgerError::NotFound(what.into())
    }

    pub(crate) fn conflict(request_id: &str, kind: ConflictKind) -> Self {
        LedgerError::Conflict {
            request_id: request_id.to_string(),
            kind,
        }
    }
}
