//! Bulk repair of historical attribution and rollover chains.

pub mod orchestrator;
pub mod store;
pub mod types;


pub use orchestrator::{BookFailure, FleetReport, RepairOrchestrator, resolve_budget, resolve_transaction};
pub use store::RepairStore;
pub use types::{
    Attribution, AttributionChange, BudgetAttributionRecord, BudgetFix, FixMethod, MethodCounts,
    RecordKind, RepairCursor, RepairOptions, RepairPhase, RepairReport, RollbackReport,
    TransactionAttributionRecord, TransactionFix, UnresolvedRecord,
};
