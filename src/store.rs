// src/store.rs
//
// Repository abstraction over the grant store and consumption ledger. The
// transactional contract is the whole interface: a transaction either
// commits every mutation or leaves no trace.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::{debug, info};

use crate::error::LedgerError;
use crate::model::{
    ConsumptionId, ConsumptionState, GrantBalance, GrantId, LeaveConsumption, LeaveGrant,
    LeaveTypeId, RequestId, UserId,
};

/// Complete ledger state: all grants plus the append-only consumption rows.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LedgerState {
    grants: BTreeMap<GrantId, LeaveGrant>,
    consumptions: BTreeMap<ConsumptionId, LeaveConsumption>,
    next_consumption_id: ConsumptionId,
}

impl LedgerState {
    pub fn grant(&self, id: &str) -> Option<&LeaveGrant> {
        self.grants.get(id)
    }

    pub fn upsert_grant(&mut self, grant: LeaveGrant) {
        info!(grant_id = %grant.id, user_id = %grant.user_id, quantity = %grant.quantity, "storing grant");
        self.grants.insert(grant.id.clone(), grant);
    }

    /// Grants of one user (optionally one leave type) in default priority
    /// order: ascending granted_on, ties broken by grant id.
    pub fn grants_for(&self, user_id: &str, leave_type_id: Option<&str>) -> Vec<&LeaveGrant> {
        let mut grants: Vec<&LeaveGrant> = self
            .grants
            .values()
            .filter(|g| g.user_id == user_id)
            .filter(|g| leave_type_id.map_or(true, |lt| g.leave_type_id == lt))
            .collect();
        grants.sort_by(|a, b| {
            a.granted_on
                .cmp(&b.granted_on)
                .then_with(|| a.id.cmp(&b.id))
        });
        grants
    }

    pub fn rows_for_request(&self, request_id: &str) -> Vec<&LeaveConsumption> {
        self.consumptions
            .values()
            .filter(|c| c.request_id == request_id)
            .collect()
    }

    pub fn rows_for_request_mut<'a>(
        &'a mut self,
        request_id: &'a str,
    ) -> impl Iterator<Item = &'a mut LeaveConsumption> + 'a {
        self.consumptions
            .values_mut()
            .filter(move |c| c.request_id == request_id)
    }

    fn consumed(&self, grant_id: &str, filter: impl Fn(ConsumptionState) -> bool) -> Decimal {
        self.consumptions
            .values()
            .filter(|c| c.grant_id == grant_id && filter(c.state))
            .map(|c| c.quantity)
            .sum()
    }

    /// quantity − Σ(CONFIRMED).
    pub fn remaining_confirmed(&self, grant: &LeaveGrant) -> Decimal {
        grant.quantity - self.consumed(&grant.id, |s| s == ConsumptionState::Confirmed)
    }

    /// quantity − Σ(CONFIRMED + HOLD). The figure new allocation draws
    /// against.
    pub fn remaining_including_holds(&self, grant: &LeaveGrant) -> Decimal {
        grant.quantity - self.consumed(&grant.id, |s| s.counts_against_balance())
    }

    pub fn balance_of(&self, grant: &LeaveGrant) -> GrantBalance {
        GrantBalance {
            id: grant.id.clone(),
            quantity: grant.quantity,
            granted_on: grant.granted_on,
            expires_on: grant.expires_on,
            remaining_confirmed: self.remaining_confirmed(grant),
            remaining_including_holds: self.remaining_including_holds(grant),
        }
    }

    /// Appends one consumption row, assigning its id. Rows are never
    /// deleted afterwards.
    pub fn append_consumption(
        &mut self,
        grant_id: GrantId,
        request_id: RequestId,
        consumed_on: NaiveDate,
        quantity: Decimal,
        state: ConsumptionState,
        now: DateTime<Utc>,
    ) -> ConsumptionId {
        debug_assert!(quantity > dec!(0));
        self.next_consumption_id += 1;
        let id = self.next_consumption_id;
        debug!(
            consumption_id = id,
            %grant_id, %request_id, %consumed_on, %quantity, %state,
            "appending consumption row"
        );
        self.consumptions.insert(
            id,
            LeaveConsumption {
                id,
                grant_id,
                request_id,
                consumed_on,
                quantity,
                state,
                created_at: now,
                updated_at: now,
                reason: None,
            },
        );
        id
    }

    pub fn all_consumptions(&self) -> impl Iterator<Item = &LeaveConsumption> + '_ {
        self.consumptions.values()
    }
}

/// Transactional access to the ledger. `transaction` is all-or-nothing:
/// when the closure errors, no mutation survives. Implementations must also
/// serialize transactions against each other, which covers both the
/// per-request serialization and the per-grant check-and-deduct atomicity
/// the ledger relies on.
pub trait LedgerRepo: Send + Sync {
    fn read<T>(&self, f: impl FnOnce(&LedgerState) -> Result<T, LedgerError>)
        -> Result<T, LedgerError>;

    fn transaction<T>(
        &self,
        f: impl FnOnce(&mut LedgerState) -> Result<T, LedgerError>,
    ) -> Result<T, LedgerError>;
}

// Lets callers keep a handle on the store they hand to the service.
impl<R: LedgerRepo> LedgerRepo for std::sync::Arc<R> {
    fn read<T>(
        &self,
        f: impl FnOnce(&LedgerState) -> Result<T, LedgerError>,
    ) -> Result<T, LedgerError> {
        (**self).read(f)
    }

    fn transaction<T>(
        &self,
        f: impl FnOnce(&mut LedgerState) -> Result<T, LedgerError>,
    ) -> Result<T, LedgerError> {
        (**self).transaction(f)
    }
}

/// In-memory store behind a single mutex. Transactions mutate a cloned
/// snapshot and commit it on success, so a failed call rolls back by simply
/// dropping the clone. Serializable isolation falls out of the single lock.
#[derive(Debug, Default)]
pub struct MemoryLedger {
    state: Mutex<LedgerState>,
}

impl MemoryLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_state(state: LedgerState) -> Self {
        Self {
            state: Mutex::new(state),
        }
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, LedgerState>, LedgerError> {
        // A poisoned lock means a panic mid-transaction on the snapshot; the
        // committed state is still consistent, but surface it as retryable
        // rather than guessing.
        self.state
            .lock()
            .map_err(|_| LedgerError::Transient("ledger lock poisoned".to_string()))
    }
}

impl LedgerRepo for MemoryLedger {
    fn read<T>(
        &self,
        f: impl FnOnce(&LedgerState) -> Result<T, LedgerError>,
    ) -> Result<T, LedgerError> {
        let guard = self.lock()?;
        f(&guard)
    }

    fn transaction<T>(
        &self,
        f: impl FnOnce(&mut LedgerState) -> Result<T, LedgerError>,
    ) -> Result<T, LedgerError> {
        let mut guard = self.lock()?;
        let mut working = guard.clone();
        let out = f(&mut working)?;
        *guard = working;
        Ok(out)
    }
}

/// JSON-file-backed store used by the CLI: the whole state is loaded per
/// call and written back on commit. A mutex still serializes callers within
/// the process.
pub struct FileLedger {
    path: PathBuf,
    io_lock: Mutex<()>,
}

impl FileLedger {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            io_lock: Mutex::new(()),
        }
    }

    fn load(&self) -> Result<LedgerState, LedgerError> {
        if !self.path.exists() {
            return Ok(LedgerState::default());
        }
        let raw = std::fs::read_to_string(&self.path)
            .map_err(|e| LedgerError::Transient(format!("reading ledger state file: {e}")))?;
        serde_json::from_str(&raw)
            .map_err(|e| LedgerError::Transient(format!("parsing ledger state file: {e}")))
    }

    fn persist(&self, state: &LedgerState) -> Result<(), LedgerError> {
        let json = serde_json::to_string_pretty(state)
            .map_err(|e| LedgerError::Transient(format!("serializing ledger state: {e}")))?;
        std::fs::write(&self.path, json)
            .map_err(|e| LedgerError::Transient(format!("writing ledger state file: {e}")))?;
        debug!(path = %self.path.display(), "persisted ledger state");
        Ok(())
    }
}

impl LedgerRepo for FileLedger {
    fn read<T>(
        &self,
        f: impl FnOnce(&LedgerState) -> Result<T, LedgerError>,
    ) -> Result<T, LedgerError> {
        let _guard = self
            .io_lock
            .lock()
            .map_err(|_| LedgerError::Transient("ledger file lock poisoned".to_string()))?;
        let state = self.load()?;
        f(&state)
    }

    fn transaction<T>(
        &self,
        f: impl FnOnce(&mut LedgerState) -> Result<T, LedgerError>,
    ) -> Result<T, LedgerError> {
        let _guard = self
            .io_lock
            .lock()
            .map_err(|_| LedgerError::Transient("ledger file lock poisoned".to_string()))?;
        let mut state = self.load()?;
        let out = f(&mut state)?;
        self.persist(&state)?;
        Ok(out)
    }
}

/// Seeds one grant outside any allocation flow; the entry point the external
/// accrual process would call.
pub fn add_grant<R: LedgerRepo>(repo: &R, grant: LeaveGrant) -> Result<(), LedgerError> {
    repo.transaction(|state| {
        state.upsert_grant(grant);
        Ok(())
    })
}

/// Read-only balance listing in default priority order.
pub fn list_grants<R: LedgerRepo>(
    repo: &R,
    user_id: &UserId,
    leave_type_id: Option<&LeaveTypeId>,
) -> Result<Vec<GrantBalance>, LedgerError> {
    repo.read(|state| {
        Ok(state
            .grants_for(user_id, leave_type_id.map(|s| s.as_str()))
            .into_iter()
            .map(|g| state.balance_of(g))
            .collect())
    })
}
