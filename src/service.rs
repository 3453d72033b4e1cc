// src/service.rs
//
// `LeaveLedger` wires the pipeline together: detail lines -> needs
// aggregation -> policy gate -> allocation engine, plus the lifecycle
// operations. One instance serves one company.

use rust_decimal::Decimal;
use std::sync::Arc;
use tracing::{info, warn};

use crate::allocation;
use crate::audit::{AuditEvent, AuditSink};
use crate::clock::Clock;
use crate::error::LedgerError;
use crate::lifecycle;
use crate::model::{
    AllocationMode, CompanyId, GrantBalance, GrantId, LeaveConsumption, LeaveGrant, LeaveTypeId,
    MinUnit, RequestDetail, RequestId, UserId,
};
use crate::needs;
use crate::policy::{self, CalendarService, PolicyStore};
use crate::store::{self, LedgerRepo};

pub struct LeaveLedger<R: LedgerRepo> {
    repo: R,
    calendar: Arc<dyn CalendarService>,
    policies: Arc<dyn PolicyStore>,
    audit: Arc<dyn AuditSink>,
    clock: Arc<dyn Clock>,
    company_id: CompanyId,
}

/// Everything `allocate` needs beyond the detail lines themselves.
#[derive(Debug, Clone)]
pub struct AllocationRequest {
    pub user_id: UserId,
    pub leave_type_id: LeaveTypeId,
    pub request_id: RequestId,
    pub hours_per_day: Decimal,
    pub min_unit: MinUnit,
    pub details: Vec<RequestDetail>,
    pub mode: AllocationMode,
    /// Exhaustive, exact-order override of the default FIFO grant order.
    pub manual_grant_ids: Option<Vec<GrantId>>,
}

impl<R: LedgerRepo> LeaveLedger<R> {
    pub fn new(
        repo: R,
        calendar: Arc<dyn CalendarService>,
        policies: Arc<dyn PolicyStore>,
        audit: Arc<dyn AuditSink>,
        clock: Arc<dyn Clock>,
        company_id: impl Into<CompanyId>,
    ) -> Self {
        Self {
            repo,
            calendar,
            policies,
            audit,
            clock,
            company_id: company_id.into(),
        }
    }

    /// Seeds a grant; the entry point for the external accrual process.
    pub fn add_grant(&self, grant: LeaveGrant) -> Result<(), LedgerError> {
        store::add_grant(&self.repo, grant)
    }

    /// Reserves (mode hold) or directly books (mode confirm) the hours a
    /// request demands, atomically across all its dates. Existing holds for
    /// the same request are replaced.
    pub fn allocate(
        &self,
        request: AllocationRequest,
    ) -> Result<Vec<LeaveConsumption>, LedgerError> {
        info!(
            request_id = %request.request_id, user_id = %request.user_id,
            leave_type = %request.leave_type_id, mode = ?request.mode,
            details = request.details.len(),
            "allocation requested"
        );

        let demand = needs::aggregate(&request.details, request.hours_per_day, request.min_unit)?;
        let policy = self
            .policies
            .get_policy(&self.company_id, &request.leave_type_id)?;
        policy::check_demand(&demand, &policy, self.calendar.as_ref(), &self.company_id)?;

        let now = self.clock.now_utc();
        let rows = self.repo.transaction(|state| {
            allocation::allocate_in_tx(
                state,
                &request.user_id,
                &request.leave_type_id,
                &request.request_id,
                &demand,
                request.mode,
                request.manual_grant_ids.as_deref(),
                &policy,
                now,
            )
        })?;

        let total_hours = rows.iter().map(|r| r.quantity).sum();
        let first_date = rows
            .iter()
            .map(|r| r.consumed_on)
            .min()
            .unwrap_or_else(|| now.date_naive());
        self.record_audit(AuditEvent::Allocated {
            request_id: request.request_id.clone(),
            user_id: request.user_id.clone(),
            mode: request.mode,
            rows: rows.len(),
            total_hours,
            first_date,
        });
        Ok(rows)
    }

    /// HOLD -> CONFIRMED for every row of the request.
    pub fn confirm(&self, request_id: &RequestId) -> Result<(), LedgerError> {
        let now = self.clock.now_utc();
        let rows = self
            .repo
            .transaction(|state| lifecycle::confirm_in_tx(state, request_id, now))?;
        self.record_audit(AuditEvent::Confirmed {
            request_id: request_id.clone(),
            rows,
        });
        Ok(())
    }

    /// HOLD -> RELEASED for every row of the request.
    pub fn release(&self, request_id: &RequestId) -> Result<(), LedgerError> {
        let now = self.clock.now_utc();
        let rows = self
            .repo
            .transaction(|state| lifecycle::release_in_tx(state, request_id, now))?;
        self.record_audit(AuditEvent::Released {
            request_id: request_id.clone(),
            rows,
        });
        Ok(())
    }

    /// CONFIRMED -> REVERSED with the given reason; returns the count.
    pub fn reverse(&self, request_id: &RequestId, reason: &str) -> Result<usize, LedgerError> {
        let now = self.clock.now_utc();
        let rows = self
            .repo
            .transaction(|state| lifecycle::reverse_in_tx(state, request_id, reason, now))?;
        self.record_audit(AuditEvent::Reversed {
            request_id: request_id.clone(),
            rows,
            reason: reason.to_string(),
        });
        Ok(rows)
    }

    /// Balances in default priority order, for manual-override UIs.
    pub fn list_grants(
        &self,
        user_id: &UserId,
        leave_type_id: Option<&LeaveTypeId>,
    ) -> Result<Vec<GrantBalance>, LedgerError> {
        store::list_grants(&self.repo, user_id, leave_type_id)
    }

    pub fn consumptions_for_request(
        &self,
        request_id: &RequestId,
    ) -> Result<Vec<LeaveConsumption>, LedgerError> {
        self.repo.read(|state| {
            let mut rows: Vec<LeaveConsumption> = state
                .rows_for_request(request_id)
                .into_iter()
                .cloned()
                .collect();
            rows.sort_by_key(|r| r.id);
            Ok(rows)
        })
    }

    // Audit is best-effort: a sink failure is logged and swallowed, never
    // surfaced to the caller.
    fn record_audit(&self, event: AuditEvent) {
        if let Err(e) = self.audit.record(event) {
            warn!(error = %e, "audit sink failed; continuing");
        }
    }
}
