// src/policy.rs

use chrono::{Datelike, NaiveDate, Weekday};
use tracing::debug;

use crate::error::LedgerError;
use crate::model::{CompanyId, LeavePolicy, LeaveTypeId};
use crate::needs::DemandMap;

// --- External collaborators ---

/// Business-day determination is owned by the attendance calendar, not this
/// crate.
pub trait CalendarService: Send + Sync {
    fn is_business_day(&self, company_id: &str, date: NaiveDate) -> bool;
}

pub trait PolicyStore: Send + Sync {
    fn get_policy(
        &self,
        company_id: &str,
        leave_type_id: &LeaveTypeId,
    ) -> Result<LeavePolicy, LedgerError>;
}

/// Weekday-only calendar. Good enough for the CLI and tests; production
/// wires the company calendar here instead.
#[derive(Debug, Clone, Default)]
pub struct WeekdayCalendar;

impl CalendarService for WeekdayCalendar {
    fn is_business_day(&self, _company_id: &str, date: NaiveDate) -> bool {
        !matches!(date.weekday(), Weekday::Sat | Weekday::Sun)
    }
}

/// One policy for every leave type. Tests and the CLI configure this
/// directly.
#[derive(Debug, Clone, Default)]
pub struct StaticPolicyStore {
    pub policy: LeavePolicy,
}

impl StaticPolicyStore {
    pub fn new(policy: LeavePolicy) -> Self {
        Self { policy }
    }
}

impl PolicyStore for StaticPolicyStore {
    fn get_policy(
        &self,
        _company_id: &str,
        _leave_type_id: &LeaveTypeId,
    ) -> Result<LeavePolicy, LedgerError> {
        Ok(self.policy.clone())
    }
}

// --- The gate ---

/// Validates every demand date against the leave policy, ascending,
/// failing fast on the first offender. Runs strictly before any ledger
/// write.
pub fn check_demand(
    demand: &DemandMap,
    policy: &LeavePolicy,
    calendar: &dyn CalendarService,
    company_id: &CompanyId,
) -> Result<(), LedgerError> {
    for date in demand.keys() {
        if policy.business_day_only && !calendar.is_business_day(company_id, *date) {
            debug!(%date, "policy gate: closed day");
            return Err(LedgerError::ClosedDay { date: *date });
        }
        if policy.blackout_dates.contains(date) {
            debug!(%date, "policy gate: blackout date");
            return Err(LedgerError::BlackoutDate { date: *date });
        }
    }
    Ok(())
}
