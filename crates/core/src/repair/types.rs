//! Repair run types.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use carryover_shared::config::RepairConfig;
use carryover_shared::types::{AccountBookId, BudgetPeriodId, FamilyId, FamilyMemberId, TransactionId, UserId};

use crate::engine::ScopeFailure;
use crate::scope::{OwnerKind, Scope};

/// Knobs of a repair run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepairOptions {
    /// Compute and report without writing anything.
    pub dry_run: bool,
    /// Records (or scopes) per batch.
    pub batch_size: u64,
    /// Pause after each full batch of an executing run.
    pub pause: Duration,
    /// Scopes reconciled concurrently.
    pub scope_concurrency: usize,
    /// Continue after the stored cursor.
    pub resume: bool,
}

impl Default for RepairOptions {
    fn default() -> Self {
        Self {
            dry_run: true,
            batch_size: 500,
            pause: Duration::from_secs(2),
            scope_concurrency: 4,
            resume: true,
        }
    }
}

impl RepairOptions {
    /// Options from configuration.
    #[must_use]
    pub fn from_config(config: &RepairConfig, dry_run: bool) -> Self {
        Self {
            dry_run,
            batch_size: config.batch_size.max(1),
            pause: Duration::from_millis(config.pause_ms),
            scope_concurrency: config.scope_concurrency.max(1),
            resume: true,
        }
    }
}

/// Phases of a run, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RepairPhase {
    /// Budgets missing family attribution.
    BudgetAttribution,
    /// Transactions missing family-member attribution.
    TransactionAttribution,
    /// Chain reconciliation of every scope.
    Chains,
}

impl RepairPhase {
    /// All phases in order.
    pub const ALL: [Self; 3] = [
        Self::BudgetAttribution,
        Self::TransactionAttribution,
        Self::Chains,
    ];

    /// Stable name used for persistence.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::BudgetAttribution => "BUDGET_ATTRIBUTION",
            Self::TransactionAttribution => "TRANSACTION_ATTRIBUTION",
            Self::Chains => "CHAINS",
        }
    }
}

impl std::fmt::Display for RepairPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for RepairPhase {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|phase| phase.as_str() == s)
            .ok_or_else(|| format!("Unknown repair phase: {s}"))
    }
}

/// Resumption point of an interrupted run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepairCursor {
    /// Account book being repaired.
    pub account_book_id: AccountBookId,
    /// Phase in progress.
    pub phase: RepairPhase,
    /// Last processed id of the phase; scope owner id for `Chains`.
    pub last_id: Option<Uuid>,
    /// Owner kind of the last reconciled scope; `Chains` only.
    pub last_kind: Option<OwnerKind>,
}

impl RepairCursor {
    /// Cursor after a record of an attribution phase.
    #[must_use]
    pub const fn at_record(account_book_id: AccountBookId, phase: RepairPhase, last_id: Option<Uuid>) -> Self {
        Self {
            account_book_id,
            phase,
            last_id,
            last_kind: None,
        }
    }

    /// Cursor after a reconciled scope.
    #[must_use]
    pub const fn at_scope(account_book_id: AccountBookId, last: Option<Scope>) -> Self {
        let (last_id, last_kind) = match last {
            Some(scope) => (Some(scope.owner_id), Some(scope.kind)),
            None => (None, None),
        };
        Self {
            account_book_id,
            phase: RepairPhase::Chains,
            last_id,
            last_kind,
        }
    }

    /// Last reconciled scope of a `Chains` cursor.
    #[must_use]
    pub const fn last_scope(&self) -> Option<Scope> {
        match (self.phase, self.last_kind, self.last_id) {
            (RepairPhase::Chains, Some(kind), Some(owner_id)) => Some(Scope { kind, owner_id }),
            _ => None,
        }
    }
}

/// Budget whose family attribution is incomplete.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BudgetAttributionRecord {
    /// Budget period.
    pub id: BudgetPeriodId,
    /// Account book.
    pub account_book_id: AccountBookId,
    /// Stored owner scope.
    pub scope: Scope,
    /// Creator/owner user.
    pub user_id: Option<UserId>,
    /// Stored family.
    pub family_id: Option<FamilyId>,
    /// Stored family member.
    pub family_member_id: Option<FamilyMemberId>,
}

impl BudgetAttributionRecord {
    /// Ownership columns as stored.
    #[must_use]
    pub const fn attribution(&self) -> Attribution {
        Attribution {
            family_id: self.family_id,
            family_member_id: self.family_member_id,
            scope: Some(self.scope),
        }
    }
}

/// Attribution to write onto a budget.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BudgetFix {
    /// Budget period.
    pub id: BudgetPeriodId,
    /// Family of the account book.
    pub family_id: FamilyId,
    /// Resolved member.
    pub family_member_id: FamilyMemberId,
    /// Canonical scope of the member.
    pub scope: Scope,
    /// How the member was found.
    pub method: FixMethod,
    /// Ownership columns being replaced.
    pub before: Attribution,
}

impl BudgetFix {
    /// Audit entry of this fix within a run.
    #[must_use]
    pub const fn change(&self, run_id: Uuid, account_book_id: AccountBookId) -> AttributionChange {
        AttributionChange {
            run_id,
            account_book_id,
            kind: RecordKind::Budget,
            record_id: self.id.0,
            method: self.method,
            before: self.before,
            after: Attribution {
                family_id: Some(self.family_id),
                family_member_id: Some(self.family_member_id),
                scope: Some(self.scope),
            },
            rolled_back: false,
        }
    }
}

/// Transaction missing its family-member attribution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransactionAttributionRecord {
    /// Transaction.
    pub id: TransactionId,
    /// Account book.
    pub account_book_id: AccountBookId,
    /// Recording user.
    pub user_id: Option<UserId>,
    /// Stored family.
    pub family_id: Option<FamilyId>,
    /// Budget it was booked against.
    pub budget_id: Option<BudgetPeriodId>,
}

/// Attribution to write onto a transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransactionFix {
    /// Transaction.
    pub id: TransactionId,
    /// Family of the account book.
    pub family_id: FamilyId,
    /// Resolved member.
    pub family_member_id: FamilyMemberId,
    /// How the member was found.
    pub method: FixMethod,
    /// Ownership columns being replaced.
    pub before: Attribution,
}

impl TransactionFix {
    /// Audit entry of this fix within a run.
    #[must_use]
    pub const fn change(&self, run_id: Uuid, account_book_id: AccountBookId) -> AttributionChange {
        AttributionChange {
            run_id,
            account_book_id,
            kind: RecordKind::Transaction,
            record_id: self.id.0,
            method: self.method,
            before: self.before,
            after: Attribution {
                family_id: Some(self.family_id),
                family_member_id: Some(self.family_member_id),
                scope: None,
            },
            rolled_back: false,
        }
    }
}

/// Ownership columns of a budget or transaction.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attribution {
    /// Family column.
    pub family_id: Option<FamilyId>,
    /// Family member column.
    pub family_member_id: Option<FamilyMemberId>,
    /// Owner scope; budgets only.
    pub scope: Option<Scope>,
}

/// One attribution written by an executing run, with the values it
/// replaced, so the run can be rolled back.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttributionChange {
    /// Run that wrote it.
    pub run_id: Uuid,
    /// Account book.
    pub account_book_id: AccountBookId,
    /// Record kind.
    pub kind: RecordKind,
    /// Record id.
    pub record_id: Uuid,
    /// How the record was attributed.
    pub method: FixMethod,
    /// Columns before the run.
    pub before: Attribution,
    /// Columns the run wrote.
    pub after: Attribution,
    /// Already restored by a rollback.
    pub rolled_back: bool,
}

/// How a record was attributed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FixMethod {
    /// The record already named its member.
    ViaMember,
    /// Followed the transaction's budget to its scope.
    ViaBudget,
    /// Matched the record's user against the family members.
    ViaUser,
    /// No match; left untouched.
    Skipped,
}

/// Per-method counts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MethodCounts {
    /// Fixed from the record's own member reference.
    pub via_member: u64,
    /// Fixed through the budget.
    pub via_budget: u64,
    /// Fixed through the user.
    pub via_user: u64,
    /// Left untouched.
    pub skipped: u64,
}

impl MethodCounts {
    /// Counts one record.
    pub fn record(&mut self, method: FixMethod) {
        match method {
            FixMethod::ViaMember => self.via_member += 1,
            FixMethod::ViaBudget => self.via_budget += 1,
            FixMethod::ViaUser => self.via_user += 1,
            FixMethod::Skipped => self.skipped += 1,
        }
    }

    /// Records that were (or would be) fixed.
    #[must_use]
    pub const fn fixed(&self) -> u64 {
        self.via_member + self.via_budget + self.via_user
    }
}

/// Kind of record left for manual review.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordKind {
    /// Budget period.
    Budget,
    /// Transaction.
    Transaction,
}

/// A record the run could not attribute.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnresolvedRecord {
    /// Record kind.
    pub kind: RecordKind,
    /// Record id.
    pub id: Uuid,
    /// Why it was skipped.
    pub reason: String,
}

/// Structured outcome of a repair run over one account book.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RepairReport {
    /// Run id; attribution changes of an executing run are recorded under it.
    pub run_id: Uuid,
    /// Account book.
    pub account_book_id: AccountBookId,
    /// Whether writes were suppressed.
    pub dry_run: bool,
    /// Cursor the run resumed from.
    pub resumed_from: Option<RepairCursor>,
    /// Budget attribution counts.
    pub budgets: MethodCounts,
    /// Transaction attribution counts.
    pub transactions: MethodCounts,
    /// Attribution written (or, in a dry run, to be written) per record.
    pub changes: Vec<AttributionChange>,
    /// Records left for manual review.
    pub unresolved: Vec<UnresolvedRecord>,
    /// Scopes whose chain was reconciled.
    pub scopes_reconciled: usize,
    /// Scopes with at least one correction.
    pub drifted_scopes: Vec<Scope>,
    /// Rollover drift corrections.
    pub drift_corrections: usize,
    /// Synthesized gap-filling periods.
    pub gap_fills: usize,
    /// Scopes that failed.
    pub failed_scopes: Vec<ScopeFailure>,
    /// Batches processed.
    pub batches: usize,
    /// The run stopped on cancellation.
    pub interrupted: bool,
}

impl RepairReport {
    /// Empty report of a new run.
    #[must_use]
    pub fn new(account_book_id: AccountBookId, dry_run: bool) -> Self {
        Self {
            run_id: Uuid::now_v7(),
            account_book_id,
            dry_run,
            resumed_from: None,
            budgets: MethodCounts {
                via_member: 0,
                via_budget: 0,
                via_user: 0,
                skipped: 0,
            },
            transactions: MethodCounts {
                via_member: 0,
                via_budget: 0,
                via_user: 0,
                skipped: 0,
            },
            changes: Vec::new(),
            unresolved: Vec::new(),
            scopes_reconciled: 0,
            drifted_scopes: Vec::new(),
            drift_corrections: 0,
            gap_fills: 0,
            failed_scopes: Vec::new(),
            batches: 0,
            interrupted: false,
        }
    }

    /// Returns true if nothing needed (or needs) fixing.
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.budgets.fixed() == 0
            && self.transactions.fixed() == 0
            && self.unresolved.is_empty()
            && self.drifted_scopes.is_empty()
            && self.failed_scopes.is_empty()
    }
}

/// Outcome of rolling back the attribution changes of a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RollbackReport {
    /// Run being rolled back.
    pub run_id: Uuid,
    /// Whether writes were suppressed.
    pub dry_run: bool,
    /// Budgets restored (or to be restored).
    pub budgets_restored: u64,
    /// Transactions restored (or to be restored).
    pub transactions_restored: u64,
    /// Changes restored by an earlier rollback.
    pub already_rolled_back: u64,
    /// Records changed since the run; left as they are.
    pub skipped: Vec<UnresolvedRecord>,
    /// The rollback stopped on cancellation.
    pub interrupted: bool,
}

impl RollbackReport {
    /// Empty report.
    #[must_use]
    pub const fn new(run_id: Uuid, dry_run: bool) -> Self {
        Self {
            run_id,
            dry_run,
            budgets_restored: 0,
            transactions_restored: 0,
            already_rolled_back: 0,
            skipped: Vec::new(),
            interrupted: false,
        }
    }
}
