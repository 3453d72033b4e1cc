// src/lib.rs
//
// Leave balance allocation and consumption ledger.
//
// Entitlement lives in time-bounded grants; every reservation, approval,
// rejection and cancellation is a state change on append-only consumption
// rows. The `LeaveLedger` facade runs the pipeline: detail lines ->
// per-date hour demand -> policy gate -> allocation across grants in
// deterministic priority order, with the HOLD/CONFIRMED/RELEASED/REVERSED
// lifecycle applied afterwards.

pub mod allocation;
pub mod audit;
pub mod clock;
pub mod error;
pub mod lifecycle;
pub mod model;
pub mod needs;
pub mod policy;
pub mod service;
pub mod store;


pub use audit::{AuditEvent, AuditSink, RecordingAuditSink, TracingAuditSink};
pub use clock::{Clock, SystemClock, TestClock};
pub use error::{ConflictKind, LedgerError, ValidationFault};
pub use model::{
    AllocationMode, ConsumptionState, GrantBalance, LeaveConsumption, LeaveGrant, LeavePolicy,
    LeaveUnit, MinUnit, RequestDetail,
};
pub use policy::{CalendarService, PolicyStore, StaticPolicyStore, WeekdayCalendar};
pub use service::{AllocationRequest, LeaveLedger};
pub use store::{FileLedger, LedgerRepo, LedgerState, MemoryLedger};
