//! In-memory storage for engine and repair tests.

use std::collections::{BTreeSet, HashMap};
use std::sync::Mutex;

use chrono::NaiveDate;
use rust_decimal::Decimal;
use uuid::Uuid;

use carryover_shared::types::{
    AccountBookId, BudgetPeriodId, Currency, FamilyId, FamilyMemberId, TransactionId, UserId,
};

use crate::engine::{ChainRepair, Directory, EngineError, PeriodStore, SpendSource};
use crate::period::{AccountBookConfig, BudgetPeriod, DateRange, PeriodSchedule};
use crate::repair::{
    Attribution, AttributionChange, BudgetAttributionRecord, BudgetFix, RecordKind, RepairCursor,
    RepairStore, TransactionAttributionRecord, TransactionFix,
};
use crate::rollover::{Correction, CorrectionKind, RolloverRecord};
use crate::scope::{FamilyContext, Scope};
use crate::spend::{SpendAggregator, SpendFilter, TransactionKind, TransactionRecord};

pub fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

/// A budget row with its ownership columns.
#[derive(Debug, Clone)]
pub struct StoredBudget {
    pub period: BudgetPeriod,
    pub user_id: Option<UserId>,
    pub family_id: Option<FamilyId>,
    pub family_member_id: Option<FamilyMemberId>,
}

#[derive(Default)]
struct State {
    books: HashMap<AccountBookId, AccountBookConfig>,
    families: HashMap<FamilyId, FamilyContext>,
    budgets: Vec<StoredBudget>,
    transactions: Vec<TransactionRecord>,
    tx_families: HashMap<TransactionId, FamilyId>,
    changes: Vec<AttributionChange>,
    overrides: Vec<(Scope, AccountBookId, NaiveDate, Decimal)>,
    history: Vec<RolloverRecord>,
    audit: Vec<Correction>,
    cursors: HashMap<AccountBookId, RepairCursor>,
    saved_cursors: Vec<RepairCursor>,
    racing_inserts: usize,
    fail_repairs: usize,
}

impl State {
    fn key_taken(&self, scope: Scope, book: AccountBookId, start: NaiveDate, except: Option<BudgetPeriodId>) -> bool {
        self.budgets.iter().any(|b| {
            b.period.scope == scope
                && b.period.account_book_id == book
                && b.period.start_date == start
                && Some(b.period.id) != except
        })
    }

    fn budget_columns(&self, id: Uuid) -> Option<Attribution> {
        self.budgets.iter().find(|b| b.period.id.0 == id).map(|b| Attribution {
            family_id: b.family_id,
            family_member_id: b.family_member_id,
            scope: Some(b.period.scope),
        })
    }

    fn transaction_columns(&self, id: Uuid) -> Option<Attribution> {
        self.transactions.iter().find(|t| t.id.0 == id).map(|t| Attribution {
            family_id: self.tx_families.get(&t.id).copied(),
            family_member_id: t.family_member_id,
            scope: None,
        })
    }

    fn attribution(&self, budget: &StoredBudget) -> BudgetAttributionRecord {
        BudgetAttributionRecord {
            id: budget.period.id,
            account_book_id: budget.period.account_book_id,
            scope: budget.period.scope,
            user_id: budget.user_id,
            family_id: budget.family_id,
            family_member_id: budget.family_member_id,
        }
    }
}

/// Mock storage implementing every storage trait over one mutex.
#[derive(Default)]
pub struct MemoryStore {
    state: Mutex<State>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_family(&self, family: FamilyContext) {
        self.state.lock().unwrap().families.insert(family.family_id, family);
    }

    pub fn add_book(&self, family_id: Option<FamilyId>, schedule: PeriodSchedule) -> AccountBookId {
        let id = AccountBookId::new();
        self.state.lock().unwrap().books.insert(
            id,
            AccountBookConfig {
                id,
                family_id,
                schedule,
                currency: Currency::Cny,
            },
        );
        id
    }

    /// Stores a period with ownership columns derived from its scope.
    pub fn add_period(&self, period: BudgetPeriod) {
        let mut state = self.state.lock().unwrap();
        let family_id = state
            .books
            .get(&period.account_book_id)
            .and_then(|book| book.family_id);
        let budget = StoredBudget {
            user_id: period.scope.user_id(),
            family_id: period.scope.member_id().and(family_id),
            family_member_id: period.scope.member_id(),
            period,
        };
        state.budgets.push(budget);
    }

    pub fn add_budget(&self, budget: StoredBudget) {
        self.state.lock().unwrap().budgets.push(budget);
    }

    pub fn add_transaction(&self, tx: TransactionRecord) {
        self.state.lock().unwrap().transactions.push(tx);
    }

    pub fn add_expense(
        &self,
        book: AccountBookId,
        user_id: Option<UserId>,
        family_member_id: Option<FamilyMemberId>,
        amount: Decimal,
        day: NaiveDate,
    ) -> TransactionId {
        let id = TransactionId::new();
        self.add_transaction(TransactionRecord {
            id,
            account_book_id: book,
            user_id,
            family_member_id,
            budget_id: None,
            kind: TransactionKind::Expense,
            amount,
            date: day,
        });
        id
    }

    pub fn add_override(&self, scope: Scope, book: AccountBookId, effective_from: NaiveDate, amount: Decimal) {
        self.state
            .lock()
            .unwrap()
            .overrides
            .push((scope, book, effective_from, amount));
    }

    /// Makes the next `n` inserts lose a race: an identical period is
    /// stored as if by another writer and the insert reports a conflict.
    pub fn race_next_inserts(&self, n: usize) {
        self.state.lock().unwrap().racing_inserts = n;
    }

    /// Makes the next `n` chain repairs fail with a key conflict.
    pub fn fail_next_repairs(&self, n: usize) {
        self.state.lock().unwrap().fail_repairs = n;
    }

    pub fn set_rollover(&self, id: BudgetPeriodId, amount: Decimal) {
        let mut state = self.state.lock().unwrap();
        if let Some(b) = state.budgets.iter_mut().find(|b| b.period.id == id) {
            b.period.rollover_amount = amount;
        }
    }

    pub fn periods(&self, scope: Scope, book: AccountBookId) -> Vec<BudgetPeriod> {
        let state = self.state.lock().unwrap();
        let mut periods: Vec<_> = state
            .budgets
            .iter()
            .filter(|b| b.period.scope == scope && b.period.account_book_id == book)
            .map(|b| b.period.clone())
            .collect();
        periods.sort_by_key(|p| p.start_date);
        periods
    }

    pub fn budget(&self, id: BudgetPeriodId) -> StoredBudget {
        let state = self.state.lock().unwrap();
        state.budgets.iter().find(|b| b.period.id == id).cloned().unwrap()
    }

    pub fn transaction(&self, id: TransactionId) -> TransactionRecord {
        let state = self.state.lock().unwrap();
        state.transactions.iter().find(|t| t.id == id).cloned().unwrap()
    }

    /// Reassigns a budget to another member, as a later edit would.
    pub fn set_budget_member(&self, id: BudgetPeriodId, family_member_id: Option<FamilyMemberId>) {
        let mut state = self.state.lock().unwrap();
        if let Some(b) = state.budgets.iter_mut().find(|b| b.period.id == id) {
            b.family_member_id = family_member_id;
        }
    }

    pub fn transaction_family(&self, id: TransactionId) -> Option<FamilyId> {
        self.state.lock().unwrap().tx_families.get(&id).copied()
    }

    pub fn changes(&self) -> Vec<AttributionChange> {
        self.state.lock().unwrap().changes.clone()
    }

    pub fn history(&self) -> Vec<RolloverRecord> {
        self.state.lock().unwrap().history.clone()
    }

    pub fn audit(&self) -> Vec<Correction> {
        self.state.lock().unwrap().audit.clone()
    }

    pub fn cursor(&self, book: AccountBookId) -> Option<RepairCursor> {
        self.state.lock().unwrap().cursors.get(&book).copied()
    }

    pub fn put_cursor(&self, cursor: RepairCursor) {
        self.state
            .lock()
            .unwrap()
            .cursors
            .insert(cursor.account_book_id, cursor);
    }

    pub fn saved_cursors(&self) -> Vec<RepairCursor> {
        self.state.lock().unwrap().saved_cursors.clone()
    }
}

impl PeriodStore for MemoryStore {
    async fn list(&self, scope: Scope, account_book_id: AccountBookId) -> Result<Vec<BudgetPeriod>, EngineError> {
        Ok(self.periods(scope, account_book_id))
    }

    async fn latest(
        &self,
        scope: Scope,
        account_book_id: AccountBookId,
    ) -> Result<Option<BudgetPeriod>, EngineError> {
        Ok(self.periods(scope, account_book_id).pop())
    }

    async fn find_by_start(
        &self,
        scope: Scope,
        account_book_id: AccountBookId,
        start_date: NaiveDate,
    ) -> Result<Option<BudgetPeriod>, EngineError> {
        Ok(self
            .periods(scope, account_book_id)
            .into_iter()
            .find(|p| p.start_date == start_date))
    }

    async fn find_containing(
        &self,
        scope: Scope,
        account_book_id: AccountBookId,
        date: NaiveDate,
    ) -> Result<Option<BudgetPeriod>, EngineError> {
        Ok(self
            .periods(scope, account_book_id)
            .into_iter()
            .find(|p| p.contains(date)))
    }

    async fn list_scopes(&self, account_book_id: AccountBookId) -> Result<Vec<Scope>, EngineError> {
        let state = self.state.lock().unwrap();
        let scopes: BTreeSet<Scope> = state
            .budgets
            .iter()
            .filter(|b| b.period.account_book_id == account_book_id)
            .map(|b| b.period.scope)
            .collect();
        Ok(scopes.into_iter().collect())
    }

    async fn amount_override(
        &self,
        scope: Scope,
        account_book_id: AccountBookId,
        start_date: NaiveDate,
    ) -> Result<Option<Decimal>, EngineError> {
        let state = self.state.lock().unwrap();
        Ok(state
            .overrides
            .iter()
            .filter(|(s, b, from, _)| s.same_owner(&scope) && *b == account_book_id && *from <= start_date)
            .max_by_key(|(_, _, from, _)| *from)
            .map(|(_, _, _, amount)| *amount))
    }

    async fn rollover_history(
        &self,
        scope: Scope,
        account_book_id: AccountBookId,
    ) -> Result<Vec<RolloverRecord>, EngineError> {
        let state = self.state.lock().unwrap();
        let mut records: Vec<_> = state
            .history
            .iter()
            .filter(|r| r.scope.same_owner(&scope) && r.account_book_id == account_book_id)
            .cloned()
            .collect();
        records.sort_by_key(|r| r.range.start);
        Ok(records)
    }

    async fn insert(&self, period: &BudgetPeriod, closed: Option<&RolloverRecord>) -> Result<(), EngineError> {
        let mut state = self.state.lock().unwrap();
        let conflict = EngineError::ConcurrentCreationConflict {
            scope: period.scope,
            start_date: period.start_date,
        };

        if state.racing_inserts > 0 {
            state.racing_inserts -= 1;
            let mut rival = period.clone();
            rival.id = BudgetPeriodId::new();
            state.budgets.push(StoredBudget {
                user_id: rival.scope.user_id(),
                family_id: None,
                family_member_id: rival.scope.member_id(),
                period: rival,
            });
            if let Some(closed) = closed {
                state.history.push(closed.clone());
            }
            return Err(conflict);
        }

        if state.key_taken(period.scope, period.account_book_id, period.start_date, None) {
            return Err(conflict);
        }
        state.budgets.push(StoredBudget {
            user_id: period.scope.user_id(),
            family_id: None,
            family_member_id: period.scope.member_id(),
            period: period.clone(),
        });
        if let Some(closed) = closed {
            state.history.push(closed.clone());
        }
        Ok(())
    }

    async fn apply_repair(
        &self,
        _scope: Scope,
        _account_book_id: AccountBookId,
        repair: &ChainRepair,
    ) -> Result<(), EngineError> {
        let mut state = self.state.lock().unwrap();

        if state.fail_repairs > 0 {
            state.fail_repairs -= 1;
            let first = repair.corrections.first().ok_or_else(|| EngineError::repository("empty repair"))?;
            return Err(EngineError::ConcurrentCreationConflict {
                scope: first.scope,
                start_date: first.start_date,
            });
        }

        if let Some(taken) = repair
            .inserts
            .iter()
            .find(|p| state.key_taken(p.scope, p.account_book_id, p.start_date, None))
        {
            return Err(EngineError::ConcurrentCreationConflict {
                scope: taken.scope,
                start_date: taken.start_date,
            });
        }

        for period in &repair.inserts {
            state.budgets.push(StoredBudget {
                user_id: period.scope.user_id(),
                family_id: None,
                family_member_id: period.scope.member_id(),
                period: period.clone(),
            });
        }
        for correction in &repair.corrections {
            if correction.kind == CorrectionKind::RolloverDrift {
                if let Some(b) = state.budgets.iter_mut().find(|b| b.period.id == correction.period_id) {
                    b.period.rollover_amount = correction.new_amount;
                }
            }
            state.audit.push(correction.clone());
        }
        Ok(())
    }
}

impl SpendSource for MemoryStore {
    async fn expense_total(
        &self,
        filter: &SpendFilter,
        account_book_id: AccountBookId,
        range: DateRange,
    ) -> Result<Decimal, EngineError> {
        let state = self.state.lock().unwrap();
        Ok(SpendAggregator::sum(&state.transactions, filter, account_book_id, range))
    }
}

impl Directory for MemoryStore {
    async fn account_book(&self, id: AccountBookId) -> Result<Option<AccountBookConfig>, EngineError> {
        Ok(self.state.lock().unwrap().books.get(&id).cloned())
    }

    async fn family(&self, id: FamilyId) -> Result<Option<FamilyContext>, EngineError> {
        Ok(self.state.lock().unwrap().families.get(&id).cloned())
    }

    async fn account_books(&self) -> Result<Vec<AccountBookId>, EngineError> {
        let mut ids: Vec<_> = self.state.lock().unwrap().books.keys().copied().collect();
        ids.sort();
        Ok(ids)
    }
}

impl RepairStore for MemoryStore {
    async fn budgets_missing_attribution(
        &self,
        account_book_id: AccountBookId,
        stale: &[Scope],
        after: Option<Uuid>,
        limit: u64,
    ) -> Result<Vec<BudgetAttributionRecord>, EngineError> {
        let state = self.state.lock().unwrap();
        let has_family = state
            .books
            .get(&account_book_id)
            .is_some_and(|b| b.family_id.is_some());
        if !has_family {
            return Ok(Vec::new());
        }
        let mut records: Vec<_> = state
            .budgets
            .iter()
            .filter(|b| b.period.account_book_id == account_book_id)
            .filter(|b| b.family_id.is_none() || b.family_member_id.is_none() || stale.contains(&b.period.scope))
            .filter(|b| after.is_none_or(|after| b.period.id.0 > after))
            .map(|b| state.attribution(b))
            .collect();
        records.sort_by_key(|r| r.id);
        records.truncate(usize::try_from(limit).unwrap());
        Ok(records)
    }

    async fn transactions_missing_attribution(
        &self,
        account_book_id: AccountBookId,
        after: Option<Uuid>,
        limit: u64,
    ) -> Result<Vec<TransactionAttributionRecord>, EngineError> {
        let state = self.state.lock().unwrap();
        let has_family = state
            .books
            .get(&account_book_id)
            .is_some_and(|b| b.family_id.is_some());
        if !has_family {
            return Ok(Vec::new());
        }
        let mut records: Vec<_> = state
            .transactions
            .iter()
            .filter(|t| t.account_book_id == account_book_id && t.family_member_id.is_none())
            .filter(|t| after.is_none_or(|after| t.id.0 > after))
            .map(|t| TransactionAttributionRecord {
                id: t.id,
                account_book_id: t.account_book_id,
                user_id: t.user_id,
                family_id: state.tx_families.get(&t.id).copied(),
                budget_id: t.budget_id,
            })
            .collect();
        records.sort_by_key(|r| r.id);
        records.truncate(usize::try_from(limit).unwrap());
        Ok(records)
    }

    async fn budgets_by_ids(&self, ids: &[BudgetPeriodId]) -> Result<Vec<BudgetAttributionRecord>, EngineError> {
        let state = self.state.lock().unwrap();
        Ok(state
            .budgets
            .iter()
            .filter(|b| ids.contains(&b.period.id))
            .map(|b| state.attribution(b))
            .collect())
    }

    async fn apply_budget_fix(&self, run_id: Uuid, fix: &BudgetFix) -> Result<(), EngineError> {
        let mut state = self.state.lock().unwrap();
        let (book, start) = state
            .budgets
            .iter()
            .find(|b| b.period.id == fix.id)
            .map(|b| (b.period.account_book_id, b.period.start_date))
            .ok_or_else(|| EngineError::repository("budget not found"))?;

        if state.key_taken(fix.scope, book, start, Some(fix.id)) {
            return Err(EngineError::ConcurrentCreationConflict {
                scope: fix.scope,
                start_date: start,
            });
        }
        if let Some(b) = state.budgets.iter_mut().find(|b| b.period.id == fix.id) {
            b.family_id = Some(fix.family_id);
            b.family_member_id = Some(fix.family_member_id);
            b.period.scope = fix.scope;
        }
        state.changes.push(fix.change(run_id, book));
        Ok(())
    }

    async fn apply_transaction_fixes(&self, run_id: Uuid, fixes: &[TransactionFix]) -> Result<(), EngineError> {
        let mut state = self.state.lock().unwrap();
        for fix in fixes {
            let Some(t) = state.transactions.iter_mut().find(|t| t.id == fix.id) else {
                continue;
            };
            t.family_member_id = Some(fix.family_member_id);
            let book = t.account_book_id;
            state.tx_families.insert(fix.id, fix.family_id);
            state.changes.push(fix.change(run_id, book));
        }
        Ok(())
    }

    async fn run_changes(&self, run_id: Uuid) -> Result<Vec<AttributionChange>, EngineError> {
        let state = self.state.lock().unwrap();
        let mut changes: Vec<_> = state.changes.iter().filter(|c| c.run_id == run_id).cloned().collect();
        changes.sort_by_key(|c| c.record_id);
        Ok(changes)
    }

    async fn revert_change(&self, change: &AttributionChange) -> Result<bool, EngineError> {
        let mut state = self.state.lock().unwrap();
        let current = match change.kind {
            RecordKind::Budget => state.budget_columns(change.record_id),
            RecordKind::Transaction => state.transaction_columns(change.record_id),
        };
        if current != Some(change.after) {
            return Ok(false);
        }

        match change.kind {
            RecordKind::Budget => {
                let id = BudgetPeriodId(change.record_id);
                let scope = change.before.scope.ok_or_else(|| EngineError::repository("budget change without scope"))?;
                let (book, start) = state
                    .budgets
                    .iter()
                    .find(|b| b.period.id == id)
                    .map(|b| (b.period.account_book_id, b.period.start_date))
                    .ok_or_else(|| EngineError::repository("budget not found"))?;
                if state.key_taken(scope, book, start, Some(id)) {
                    return Err(EngineError::ConcurrentCreationConflict { scope, start_date: start });
                }
                if let Some(b) = state.budgets.iter_mut().find(|b| b.period.id == id) {
                    b.family_id = change.before.family_id;
                    b.family_member_id = change.before.family_member_id;
                    b.period.scope = scope;
                }
            }
            RecordKind::Transaction => {
                let id = TransactionId(change.record_id);
                if let Some(t) = state.transactions.iter_mut().find(|t| t.id == id) {
                    t.family_member_id = change.before.family_member_id;
                }
                match change.before.family_id {
                    Some(family_id) => state.tx_families.insert(id, family_id),
                    None => state.tx_families.remove(&id),
                };
            }
        }

        if let Some(c) = state
            .changes
            .iter_mut()
            .find(|c| c.run_id == change.run_id && c.record_id == change.record_id)
        {
            c.rolled_back = true;
        }
        Ok(true)
    }

    async fn load_cursor(&self, account_book_id: AccountBookId) -> Result<Option<RepairCursor>, EngineError> {
        Ok(self.cursor(account_book_id))
    }

    async fn save_cursor(&self, cursor: &RepairCursor) -> Result<(), EngineError> {
        let mut state = self.state.lock().unwrap();
        state.cursors.insert(cursor.account_book_id, *cursor);
        state.saved_cursors.push(*cursor);
        Ok(())
    }

    async fn clear_cursor(&self, account_book_id: AccountBookId) -> Result<(), EngineError> {
        self.state.lock().unwrap().cursors.remove(&account_book_id);
        Ok(())
    }
}
