//! Bulk repair of historical data, one account book at a time.
//!
//! A run walks three phases in order (budget attribution, transaction
//! attribution, chain reconciliation), each in bounded batches. Executing
//! runs persist a cursor after every batch so an interrupted run resumes
//! where it stopped; dry runs compute the same report without touching
//! storage or cursors.
//!
//! Every attribution an executing run writes is recorded with the values
//! it replaced, under the run id of its report, so the run can be rolled
//! back later with [`RepairOrchestrator::rollback_run`].

use std::collections::HashMap;
use std::sync::Arc;

use futures::StreamExt;
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use carryover_shared::types::{AccountBookId, FamilyMemberId};

use super::store::RepairStore;
use super::types::{
    Attribution, BudgetAttributionRecord, BudgetFix, FixMethod, RecordKind, RepairCursor,
    RepairOptions, RepairPhase, RepairReport, RollbackReport, TransactionAttributionRecord,
    TransactionFix, UnresolvedRecord,
};
use crate::engine::{BookContext, BudgetEngine, Directory, EngineError, PeriodStore, ScopeFailure, SpendSource};
use crate::rollover::CorrectionKind;
use crate::scope::{
    FamilyContext, FamilyMember, OwnerRef, Resolution, Scope, ScopeResolver, UnresolvedReason,
};

/// A book that could not be processed at all.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BookFailure {
    /// Account book.
    pub account_book_id: AccountBookId,
    /// Error message.
    pub error: String,
}

/// Outcome of repairing every account book.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct FleetReport {
    /// Per-book reports.
    pub reports: Vec<RepairReport>,
    /// Books that failed before producing a report.
    pub failed_books: Vec<BookFailure>,
    /// The run stopped on cancellation.
    pub interrupted: bool,
}

/// Drives repair runs.
pub struct RepairOrchestrator<P, S, D, R> {
    engine: BudgetEngine<P, S, D>,
    store: Arc<R>,
    options: RepairOptions,
}

impl<P, S, D, R> RepairOrchestrator<P, S, D, R>
where
    P: PeriodStore,
    S: SpendSource,
    D: Directory,
    R: RepairStore,
{
    /// Creates a new orchestrator.
    #[must_use]
    pub const fn new(engine: BudgetEngine<P, S, D>, store: Arc<R>, options: RepairOptions) -> Self {
        Self {
            engine,
            store,
            options,
        }
    }

    /// Options of this orchestrator.
    #[must_use]
    pub const fn options(&self) -> &RepairOptions {
        &self.options
    }

    /// Repairs one account book.
    ///
    /// # Errors
    ///
    /// Returns an error if the book cannot be loaded or storage fails.
    /// Per-record and per-scope problems are reported, not returned.
    pub async fn reconcile_account_book(
        &self,
        account_book_id: AccountBookId,
        cancel: &CancellationToken,
    ) -> Result<RepairReport, EngineError> {
        let ctx = self.engine.book_context(account_book_id).await?;
        let mut report = RepairReport::new(account_book_id, self.options.dry_run);

        let cursor = if !self.options.dry_run && self.options.resume {
            self.store.load_cursor(account_book_id).await?
        } else {
            None
        };
        if let Some(cursor) = cursor {
            info!(
                %account_book_id,
                phase = %cursor.phase,
                last_id = ?cursor.last_id,
                last_kind = ?cursor.last_kind,
                "Resuming repair"
            );
        }
        report.resumed_from = cursor;
        info!(%account_book_id, run_id = %report.run_id, dry_run = self.options.dry_run, "Repair started");

        for phase in RepairPhase::ALL {
            let resume = match cursor {
                Some(c) if c.phase > phase => continue,
                Some(c) if c.phase == phase => Some(c),
                _ => None,
            };

            let completed = match phase {
                RepairPhase::BudgetAttribution => {
                    let after = resume.and_then(|c| c.last_id);
                    self.repair_budgets(&ctx, after, cancel, &mut report).await?
                }
                RepairPhase::TransactionAttribution => {
                    let after = resume.and_then(|c| c.last_id);
                    self.repair_transactions(&ctx, after, cancel, &mut report).await?
                }
                RepairPhase::Chains => {
                    let after = resume.and_then(|c| c.last_scope());
                    self.repair_chains(&ctx, after, cancel, &mut report).await?
                }
            };

            if !completed {
                warn!(%account_book_id, %phase, batches = report.batches, "Repair interrupted");
                report.interrupted = true;
                return Ok(report);
            }
        }

        if !self.options.dry_run {
            self.store.clear_cursor(account_book_id).await?;
        }

        info!(
            %account_book_id,
            run_id = %report.run_id,
            dry_run = self.options.dry_run,
            budgets_fixed = report.budgets.fixed(),
            transactions_fixed = report.transactions.fixed(),
            unresolved = report.unresolved.len(),
            drifted_scopes = report.drifted_scopes.len(),
            failed_scopes = report.failed_scopes.len(),
            "Repair finished"
        );
        Ok(report)
    }

    /// Diagnostic dry run of one account book, regardless of options.
    ///
    /// # Errors
    ///
    /// See [`reconcile_account_book`](Self::reconcile_account_book).
    pub async fn diagnose(
        &self,
        account_book_id: AccountBookId,
        cancel: &CancellationToken,
    ) -> Result<RepairReport, EngineError> {
        let dry = RepairOrchestrator {
            engine: self.engine.clone(),
            store: Arc::clone(&self.store),
            options: RepairOptions {
                dry_run: true,
                ..self.options.clone()
            },
        };
        dry.reconcile_account_book(account_book_id, cancel).await
    }

    /// Repairs every account book in turn.
    ///
    /// # Errors
    ///
    /// Returns an error only if the account books cannot be listed or a
    /// storage failure makes continuing pointless.
    pub async fn reconcile_all(&self, cancel: &CancellationToken) -> Result<FleetReport, EngineError> {
        let mut fleet = FleetReport::default();

        for account_book_id in self.engine.account_books().await? {
            if cancel.is_cancelled() {
                fleet.interrupted = true;
                break;
            }
            match self.reconcile_account_book(account_book_id, cancel).await {
                Ok(report) => {
                    let interrupted = report.interrupted;
                    fleet.reports.push(report);
                    if interrupted {
                        fleet.interrupted = true;
                        break;
                    }
                }
                Err(e) if e.is_scope_local() => {
                    error!(%account_book_id, error = %e, "Account book skipped");
                    fleet.failed_books.push(BookFailure {
                        account_book_id,
                        error: e.to_string(),
                    });
                }
                Err(e) => return Err(e),
            }
        }

        Ok(fleet)
    }

    async fn repair_budgets(
        &self,
        ctx: &BookContext,
        mut after: Option<Uuid>,
        cancel: &CancellationToken,
        report: &mut RepairReport,
    ) -> Result<bool, EngineError> {
        let Some(family) = ctx.family.as_ref() else {
            return Ok(true);
        };
        let account_book_id = ctx.config.id;
        let stale = family.superseded_scopes();

        loop {
            if cancel.is_cancelled() {
                return Ok(false);
            }
            let batch = self
                .store
                .budgets_missing_attribution(account_book_id, &stale, after, self.options.batch_size)
                .await?;
            if batch.is_empty() {
                return Ok(true);
            }

            for record in &batch {
                let fix = match resolve_budget(record, family) {
                    Ok(resolved) => resolved,
                    Err(reason) => {
                        report.budgets.record(FixMethod::Skipped);
                        report.unresolved.push(UnresolvedRecord {
                            kind: RecordKind::Budget,
                            id: record.id.0,
                            reason: reason.to_string(),
                        });
                        continue;
                    }
                };

                if !self.options.dry_run {
                    match self.store.apply_budget_fix(report.run_id, &fix).await {
                        Ok(()) => {}
                        Err(EngineError::ConcurrentCreationConflict { scope, start_date }) => {
                            report.budgets.record(FixMethod::Skipped);
                            report.unresolved.push(UnresolvedRecord {
                                kind: RecordKind::Budget,
                                id: record.id.0,
                                reason: format!("{scope} already owns a period starting {start_date}"),
                            });
                            continue;
                        }
                        Err(e) => return Err(e),
                    }
                }
                report.budgets.record(fix.method);
                report.changes.push(fix.change(report.run_id, account_book_id));
            }

            after = batch.last().map(|record| record.id.0);
            let full = self.is_full(batch.len());
            let cursor = RepairCursor::at_record(account_book_id, RepairPhase::BudgetAttribution, after);
            self.finish_batch(cursor, full, cancel, report).await?;
            if !full {
                return Ok(true);
            }
        }
    }

    async fn repair_transactions(
        &self,
        ctx: &BookContext,
        mut after: Option<Uuid>,
        cancel: &CancellationToken,
        report: &mut RepairReport,
    ) -> Result<bool, EngineError> {
        let Some(family) = ctx.family.as_ref() else {
            return Ok(true);
        };
        let account_book_id = ctx.config.id;

        loop {
            if cancel.is_cancelled() {
                return Ok(false);
            }
            let batch = self
                .store
                .transactions_missing_attribution(account_book_id, after, self.options.batch_size)
                .await?;
            if batch.is_empty() {
                return Ok(true);
            }

            let mut budget_ids: Vec<_> = batch.iter().filter_map(|tx| tx.budget_id).collect();
            budget_ids.sort_unstable();
            budget_ids.dedup();
            let budgets: HashMap<_, _> = self
                .store
                .budgets_by_ids(&budget_ids)
                .await?
                .into_iter()
                .map(|budget| (budget.id, budget))
                .collect();

            let mut fixes = Vec::with_capacity(batch.len());
            for record in &batch {
                let budget = record.budget_id.and_then(|id| budgets.get(&id));
                match resolve_transaction(record, budget, family) {
                    Ok((family_member_id, method)) => {
                        fixes.push(TransactionFix {
                            id: record.id,
                            family_id: family.family_id,
                            family_member_id,
                            method,
                            before: Attribution {
                                family_id: record.family_id,
                                family_member_id: None,
                                scope: None,
                            },
                        });
                    }
                    Err(reason) => {
                        report.transactions.record(FixMethod::Skipped);
                        report.unresolved.push(UnresolvedRecord {
                            kind: RecordKind::Transaction,
                            id: record.id.0,
                            reason: reason.to_string(),
                        });
                    }
                }
            }

            if !self.options.dry_run && !fixes.is_empty() {
                self.store.apply_transaction_fixes(report.run_id, &fixes).await?;
            }
            for fix in &fixes {
                report.transactions.record(fix.method);
                report.changes.push(fix.change(report.run_id, account_book_id));
            }

            after = batch.last().map(|record| record.id.0);
            let full = self.is_full(batch.len());
            let cursor = RepairCursor::at_record(account_book_id, RepairPhase::TransactionAttribution, after);
            self.finish_batch(cursor, full, cancel, report).await?;
            if !full {
                return Ok(true);
            }
        }
    }

    async fn repair_chains(
        &self,
        ctx: &BookContext,
        after: Option<Scope>,
        cancel: &CancellationToken,
        report: &mut RepairReport,
    ) -> Result<bool, EngineError> {
        let account_book_id = ctx.config.id;
        let mut scopes = self.engine.scopes(account_book_id).await?;
        scopes.sort_unstable();
        if let Some(after) = after {
            scopes.retain(|scope| *scope > after);
        }

        let chunk_size = usize::try_from(self.options.batch_size).unwrap_or(usize::MAX).max(1);
        let dry_run = self.options.dry_run;

        for chunk in scopes.chunks(chunk_size) {
            if cancel.is_cancelled() {
                return Ok(false);
            }

            let results: Vec<_> = futures::stream::iter(chunk.iter().copied())
                .map(|scope| async move { (scope, self.engine.reconcile_with(ctx, scope, dry_run).await) })
                .buffer_unordered(self.options.scope_concurrency.max(1))
                .collect()
                .await;

            for (scope, result) in results {
                report.scopes_reconciled += 1;
                match result {
                    Ok(corrections) if corrections.is_empty() => {}
                    Ok(corrections) => {
                        for correction in &corrections {
                            match correction.kind {
                                CorrectionKind::RolloverDrift => report.drift_corrections += 1,
                                CorrectionKind::GapFilled => report.gap_fills += 1,
                            }
                        }
                        report.drifted_scopes.push(scope);
                    }
                    Err(e) if e.is_scope_local() => {
                        warn!(%scope, error = %e, "Scope left for manual review");
                        report.failed_scopes.push(ScopeFailure {
                            scope,
                            error: e.to_string(),
                        });
                    }
                    Err(e) => return Err(e),
                }
            }

            let full = chunk.len() == chunk_size;
            let cursor = RepairCursor::at_scope(account_book_id, chunk.last().copied());
            self.finish_batch(cursor, full, cancel, report).await?;
        }

        report.drifted_scopes.sort();
        report.failed_scopes.sort_by_key(|failure| failure.scope);
        Ok(true)
    }

    fn is_full(&self, len: usize) -> bool {
        u64::try_from(len).is_ok_and(|len| len >= self.options.batch_size)
    }

    async fn finish_batch(
        &self,
        cursor: RepairCursor,
        full: bool,
        cancel: &CancellationToken,
        report: &mut RepairReport,
    ) -> Result<(), EngineError> {
        report.batches += 1;
        debug!(
            account_book_id = %cursor.account_book_id,
            phase = %cursor.phase,
            batch = report.batches,
            "Batch done"
        );

        if self.options.dry_run {
            return Ok(());
        }

        self.store.save_cursor(&cursor).await?;
        if full {
            self.pause(cancel).await;
        }
        Ok(())
    }

    async fn pause(&self, cancel: &CancellationToken) {
        if self.options.pause.is_zero() {
            return;
        }
        tokio::select! {
            () = cancel.cancelled() => {}
            () = tokio::time::sleep(self.options.pause) => {}
        }
    }

    /// Restores the attribution columns an executing run overwrote.
    ///
    /// Changes are restored in batches; a record that no longer holds the
    /// values the run wrote is left alone and reported as skipped. Changes
    /// already restored by an earlier rollback are counted, not repeated,
    /// so an interrupted rollback can simply be rerun. A dry run reports
    /// every outstanding change as restorable without reading the records.
    ///
    /// # Errors
    ///
    /// Returns `EngineError::RunNotFound` if the run recorded no changes,
    /// or a storage error.
    pub async fn rollback_run(&self, run_id: Uuid, cancel: &CancellationToken) -> Result<RollbackReport, EngineError> {
        let changes = self.store.run_changes(run_id).await?;
        if changes.is_empty() {
            return Err(EngineError::RunNotFound(run_id));
        }

        let dry_run = self.options.dry_run;
        let mut report = RollbackReport::new(run_id, dry_run);
        info!(%run_id, dry_run, changes = changes.len(), "Rollback started");

        let chunk_size = usize::try_from(self.options.batch_size).unwrap_or(usize::MAX).max(1);
        for chunk in changes.chunks(chunk_size) {
            if cancel.is_cancelled() {
                warn!(%run_id, "Rollback interrupted");
                report.interrupted = true;
                return Ok(report);
            }

            for change in chunk {
                if change.rolled_back {
                    report.already_rolled_back += 1;
                    continue;
                }
                let restored = if dry_run {
                    Ok(true)
                } else {
                    self.store.revert_change(change).await
                };
                let reason = match restored {
                    Ok(true) => {
                        match change.kind {
                            RecordKind::Budget => report.budgets_restored += 1,
                            RecordKind::Transaction => report.transactions_restored += 1,
                        }
                        continue;
                    }
                    Ok(false) => format!("changed since run {run_id}"),
                    Err(EngineError::ConcurrentCreationConflict { scope, start_date }) => {
                        format!("{scope} already owns a period starting {start_date}")
                    }
                    Err(e) => return Err(e),
                };
                warn!(%run_id, record_id = %change.record_id, %reason, "Change left in place");
                report.skipped.push(UnresolvedRecord {
                    kind: change.kind,
                    id: change.record_id,
                    reason,
                });
            }

            debug!(%run_id, restored = report.budgets_restored + report.transactions_restored, "Rollback batch done");
            if !dry_run && chunk.len() == chunk_size {
                self.pause(cancel).await;
            }
        }

        info!(
            %run_id,
            dry_run,
            budgets_restored = report.budgets_restored,
            transactions_restored = report.transactions_restored,
            already_rolled_back = report.already_rolled_back,
            skipped = report.skipped.len(),
            "Rollback finished"
        );
        Ok(report)
    }
}

fn budget_owner(record: &BudgetAttributionRecord) -> OwnerRef {
    OwnerRef {
        user_id: record.user_id.or_else(|| record.scope.user_id()),
        family_member_id: record.family_member_id.or_else(|| record.scope.member_id()),
    }
}

fn member_of(resolution: Resolution) -> Result<FamilyMemberId, UnresolvedReason> {
    match resolution {
        Resolution::Resolved(scope) => scope.member_id().ok_or(UnresolvedReason::NoOwnerReference),
        Resolution::Unresolved(reason) => Err(reason),
    }
}

/// Attribution for a budget, or why there is none.
///
/// A member reference on the budget (column or scope) wins; otherwise the
/// budget's user is matched against the family. The fix always carries the
/// member's canonical scope, so a chain stored under the other member kind
/// is moved onto it.
///
/// # Errors
///
/// Returns the unresolved reason when no member matches.
pub fn resolve_budget(
    record: &BudgetAttributionRecord,
    family: &FamilyContext,
) -> Result<BudgetFix, UnresolvedReason> {
    let owner = budget_owner(record);
    let method = if owner.family_member_id.is_some() {
        FixMethod::ViaMember
    } else {
        FixMethod::ViaUser
    };

    let family_member_id = member_of(ScopeResolver::resolve(&owner, Some(family)))?;
    let scope = family
        .member(family_member_id)
        .map(FamilyMember::scope)
        .ok_or(UnresolvedReason::MemberNotInFamily(family_member_id))?;

    Ok(BudgetFix {
        id: record.id,
        family_id: family.family_id,
        family_member_id,
        scope,
        method,
        before: record.attribution(),
    })
}

/// Member a transaction belongs to, or why there is none.
///
/// The transaction's budget is followed first; when it has no budget, or
/// the budget itself cannot be resolved, the transaction's user is matched
/// against the family.
///
/// # Errors
///
/// Returns the unresolved reason when neither path matches.
pub fn resolve_transaction(
    record: &TransactionAttributionRecord,
    budget: Option<&BudgetAttributionRecord>,
    family: &FamilyContext,
) -> Result<(FamilyMemberId, FixMethod), UnresolvedReason> {
    if let Some(budget) = budget {
        if let Ok(member) = member_of(ScopeResolver::resolve(&budget_owner(budget), Some(family))) {
            return Ok((member, FixMethod::ViaBudget));
        }
    }

    let owner = OwnerRef {
        user_id: record.user_id,
        family_member_id: None,
    };
    member_of(ScopeResolver::resolve(&owner, Some(family))).map(|member| (member, FixMethod::ViaUser))
}
