//! Budget engine: period generation, status, and chain reconciliation.

use std::sync::Arc;

use chrono::NaiveDate;
use futures::StreamExt;
use rust_decimal::Decimal;
use tracing::{debug, info, warn};

use carryover_shared::types::{AccountBookId, BudgetPeriodId};

use super::error::EngineError;
use super::status::{BudgetStatus, ScopeFailure, StatusFigure, SweepReport};
use super::store::{ChainRepair, Directory, PeriodStore, SpendSource};
use crate::period::{AccountBookConfig, BudgetPeriod, DateRange, PeriodState};
use crate::rollover::{
    ChainLink, Correction, LinkOrigin, RolloverAnomaly, RolloverCalculator, RolloverRecord,
    gap_ranges, order_chain, walk,
};
use crate::scope::{FamilyContext, OwnerRef, Resolution, Scope, ScopeResolver};
use crate::spend::SpendFilter;

/// An account book with its family, loaded once per operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BookContext {
    /// Book configuration.
    pub config: AccountBookConfig,
    /// Family of the book, if any.
    pub family: Option<FamilyContext>,
}

impl BookContext {
    /// Spend filter for a scope of this book.
    ///
    /// # Errors
    ///
    /// Returns `EngineError::ScopeUnresolved` for member scopes outside the family.
    pub fn filter_for(&self, scope: Scope) -> Result<SpendFilter, EngineError> {
        SpendFilter::for_scope(scope, self.family.as_ref()).map_err(EngineError::ScopeUnresolved)
    }
}

/// Budget engine over pluggable storage.
pub struct BudgetEngine<P, S, D> {
    periods: Arc<P>,
    spend: Arc<S>,
    directory: Arc<D>,
}

impl<P, S, D> Clone for BudgetEngine<P, S, D> {
    fn clone(&self) -> Self {
        Self {
            periods: Arc::clone(&self.periods),
            spend: Arc::clone(&self.spend),
            directory: Arc::clone(&self.directory),
        }
    }
}

impl<P: PeriodStore, S: SpendSource, D: Directory> BudgetEngine<P, S, D> {
    /// Creates a new engine.
    #[must_use]
    pub const fn new(periods: Arc<P>, spend: Arc<S>, directory: Arc<D>) -> Self {
        Self {
            periods,
            spend,
            directory,
        }
    }

    /// Loads an account book and its family.
    ///
    /// # Errors
    ///
    /// Returns `EngineError::DataIntegrity` if the book, or the family it
    /// points at, does not exist.
    pub async fn book_context(&self, account_book_id: AccountBookId) -> Result<BookContext, EngineError> {
        let config = self
            .directory
            .account_book(account_book_id)
            .await?
            .ok_or_else(|| EngineError::integrity(format!("account book {account_book_id} not found")))?;

        let family = match config.family_id {
            Some(family_id) => Some(
                self.directory
                    .family(family_id)
                    .await?
                    .ok_or_else(|| EngineError::integrity(format!("family {family_id} not found")))?,
            ),
            None => None,
        };

        Ok(BookContext { config, family })
    }

    /// Expense total of a scope over a range.
    ///
    /// # Errors
    ///
    /// Returns `EngineError::ScopeUnresolved` if the scope is not part of the book.
    pub async fn spend(
        &self,
        ctx: &BookContext,
        scope: Scope,
        range: DateRange,
    ) -> Result<Decimal, EngineError> {
        let filter = ctx.filter_for(scope)?;
        self.spend.expense_total(&filter, ctx.config.id, range).await
    }

    /// Starts a scope's chain with a period enclosing `as_of`.
    ///
    /// Returns the existing period instead if the scope already has a chain.
    ///
    /// # Errors
    ///
    /// Returns an error if the book cannot be loaded, the scope does not
    /// belong to it, or storage fails.
    pub async fn open_budget(
        &self,
        scope: Scope,
        account_book_id: AccountBookId,
        as_of: NaiveDate,
        base_amount: Decimal,
        rollover_enabled: bool,
    ) -> Result<BudgetPeriod, EngineError> {
        let ctx = self.book_context(account_book_id).await?;
        ctx.filter_for(scope)?;

        if let Some(existing) = self.periods.latest(scope, account_book_id).await? {
            return Ok(existing);
        }

        let range = ctx.config.schedule.bounds_containing(as_of)?;
        let period = BudgetPeriod {
            id: BudgetPeriodId::new(),
            scope,
            account_book_id,
            start_date: range.start,
            end_date: range.end,
            base_amount,
            rollover_enabled,
            rollover_amount: Decimal::ZERO,
        };

        match self.periods.insert(&period, None).await {
            Ok(()) => {
                info!(%scope, %account_book_id, period = %range, "Opened budget chain");
                Ok(period)
            }
            Err(EngineError::ConcurrentCreationConflict { .. }) => self
                .periods
                .find_by_start(scope, account_book_id, range.start)
                .await?
                .ok_or_else(|| EngineError::integrity(format!("period of {scope} at {} vanished", range.start))),
            Err(e) => Err(e),
        }
    }

    /// Extends a scope's chain until it covers `as_of`.
    ///
    /// Returns the periods this call created; an up-to-date chain yields an
    /// empty list.
    ///
    /// # Errors
    ///
    /// `MissingBasePeriod` when the scope has no chain, `ScopeUnresolved` when
    /// the scope is not part of the book, or a storage error.
    pub async fn ensure_periods_up_to_date(
        &self,
        scope: Scope,
        account_book_id: AccountBookId,
        as_of: NaiveDate,
    ) -> Result<Vec<BudgetPeriod>, EngineError> {
        let ctx = self.book_context(account_book_id).await?;
        self.ensure_with(&ctx, scope, as_of).await
    }

    async fn ensure_with(
        &self,
        ctx: &BookContext,
        scope: Scope,
        as_of: NaiveDate,
    ) -> Result<Vec<BudgetPeriod>, EngineError> {
        let account_book_id = ctx.config.id;
        let mut latest = self
            .periods
            .latest(scope, account_book_id)
            .await?
            .ok_or(EngineError::MissingBasePeriod {
                scope,
                account_book_id,
            })?;
        let mut created = Vec::new();

        while latest.state(as_of) == PeriodState::Closed {
            let (next, closed) = self.next_period(ctx, &latest).await?;

            match self.periods.insert(&next, Some(&closed)).await {
                Ok(()) => {
                    debug!(%scope, period = %next.range(), rollover = %next.rollover_amount, "Created period");
                    created.push(next.clone());
                    latest = next;
                }
                Err(EngineError::ConcurrentCreationConflict { .. }) => {
                    debug!(%scope, start = %next.start_date, "Period created concurrently, re-reading");
                    latest = self
                        .periods
                        .find_by_start(scope, account_book_id, next.start_date)
                        .await?
                        .ok_or_else(|| {
                            EngineError::integrity(format!(
                                "period of {scope} at {} conflicted but cannot be read",
                                next.start_date
                            ))
                        })?;
                }
                Err(e) => return Err(e),
            }
        }

        if !created.is_empty() {
            info!(%scope, %account_book_id, count = created.len(), "Extended budget chain");
        }
        Ok(created)
    }

    async fn next_period(
        &self,
        ctx: &BookContext,
        latest: &BudgetPeriod,
    ) -> Result<(BudgetPeriod, RolloverRecord), EngineError> {
        let spent = self.spend(ctx, latest.scope, latest.range()).await?;
        let computed = RolloverCalculator::next_rollover(latest, spent);

        let start_date = latest
            .end_date
            .succ_opt()
            .ok_or_else(|| EngineError::integrity(format!("period {} ends at the calendar limit", latest.id)))?;
        let end_date = ctx.config.schedule.end_for(start_date)?;
        let base_amount = self
            .periods
            .amount_override(latest.scope, ctx.config.id, start_date)
            .await?
            .unwrap_or(latest.base_amount);

        let next = BudgetPeriod {
            id: BudgetPeriodId::new(),
            scope: latest.scope,
            account_book_id: ctx.config.id,
            start_date,
            end_date,
            base_amount,
            rollover_enabled: latest.rollover_enabled,
            rollover_amount: RolloverCalculator::carry_into(latest.rollover_enabled, computed),
        };

        if next.rollover_enabled {
            log_anomaly(latest, computed);
        }
        let closed = RolloverCalculator::record(latest, spent, next.rollover_amount);
        Ok((next, closed))
    }

    /// Figures for the period containing `as_of`, extending the chain first.
    ///
    /// # Errors
    ///
    /// Returns an error if the chain cannot be extended, `BeforeChainStart`
    /// when `as_of` precedes the first period, or a data integrity error
    /// when a gap in the chain leaves `as_of` uncovered.
    pub async fn budget_status(
        &self,
        scope: Scope,
        account_book_id: AccountBookId,
        as_of: NaiveDate,
    ) -> Result<BudgetStatus, EngineError> {
        let ctx = self.book_context(account_book_id).await?;
        self.ensure_with(&ctx, scope, as_of).await?;

        let Some(period) = self.periods.find_containing(scope, account_book_id, as_of).await? else {
            return Err(self.uncovered(scope, account_book_id, as_of).await);
        };
        let spent = self.spend(&ctx, scope, period.range()).await?;

        Ok(BudgetStatus::new(&period, spent, as_of, ctx.config.currency))
    }

    /// Explains why no period of an extended chain contains `as_of`.
    async fn uncovered(&self, scope: Scope, account_book_id: AccountBookId, as_of: NaiveDate) -> EngineError {
        let chain_start = match self.periods.list(scope, account_book_id).await {
            Ok(periods) => periods.iter().map(|p| p.start_date).min(),
            Err(e) => return e,
        };
        match chain_start {
            Some(chain_start) if as_of < chain_start => EngineError::BeforeChainStart {
                scope,
                as_of,
                chain_start,
            },
            Some(_) => EngineError::integrity(format!(
                "no period of {scope} contains {as_of}; reconcile the chain to fill the gap"
            )),
            None => EngineError::MissingBasePeriod {
                scope,
                account_book_id,
            },
        }
    }

    /// Resolves the owner first; an unresolved owner yields
    /// [`StatusFigure::Unavailable`] rather than a figure.
    ///
    /// # Errors
    ///
    /// Returns any error other than an unresolved scope.
    pub async fn status_for_owner(
        &self,
        owner: OwnerRef,
        account_book_id: AccountBookId,
        as_of: NaiveDate,
    ) -> Result<StatusFigure, EngineError> {
        let ctx = self.book_context(account_book_id).await?;

        let scope = match ScopeResolver::resolve(&owner, ctx.family.as_ref()) {
            Resolution::Resolved(scope) => scope,
            Resolution::Unresolved(reason) => {
                warn!(%account_book_id, %reason, "Budget status unavailable");
                return Ok(StatusFigure::Unavailable { reason });
            }
        };

        match self.budget_status(scope, account_book_id, as_of).await {
            Ok(status) => Ok(StatusFigure::Available(status)),
            Err(EngineError::ScopeUnresolved(reason)) => {
                warn!(%scope, %reason, "Budget status unavailable");
                Ok(StatusFigure::Unavailable { reason })
            }
            Err(e) => Err(e),
        }
    }

    /// Rollover history of the owner's scope, oldest period first.
    ///
    /// # Errors
    ///
    /// `ScopeUnresolved` when the owner does not resolve in the book, or a
    /// storage error.
    pub async fn rollover_history(
        &self,
        owner: OwnerRef,
        account_book_id: AccountBookId,
    ) -> Result<(Scope, Vec<RolloverRecord>), EngineError> {
        let ctx = self.book_context(account_book_id).await?;
        let scope = match ScopeResolver::resolve(&owner, ctx.family.as_ref()) {
            Resolution::Resolved(scope) => scope,
            Resolution::Unresolved(reason) => return Err(EngineError::ScopeUnresolved(reason)),
        };
        let history = self.periods.rollover_history(scope, account_book_id).await?;
        debug!(%scope, entries = history.len(), "Loaded rollover history");
        Ok((scope, history))
    }

    /// Recomputes a scope's chain and applies every correction.
    ///
    /// # Errors
    ///
    /// Returns an error if the chain overlaps, the scope is unresolved, or
    /// storage fails.
    pub async fn reconcile_scope(
        &self,
        scope: Scope,
        account_book_id: AccountBookId,
    ) -> Result<Vec<Correction>, EngineError> {
        self.reconcile_scope_with(scope, account_book_id, false).await
    }

    /// Like [`reconcile_scope`](Self::reconcile_scope); with `dry_run` the
    /// corrections are computed but nothing is written.
    ///
    /// # Errors
    ///
    /// See [`reconcile_scope`](Self::reconcile_scope).
    pub async fn reconcile_scope_with(
        &self,
        scope: Scope,
        account_book_id: AccountBookId,
        dry_run: bool,
    ) -> Result<Vec<Correction>, EngineError> {
        let ctx = self.book_context(account_book_id).await?;
        self.reconcile_with(&ctx, scope, dry_run).await
    }

    /// Reconciles a scope of an already loaded book.
    ///
    /// A key conflict while applying triggers exactly one re-read and re-plan.
    ///
    /// # Errors
    ///
    /// See [`reconcile_scope`](Self::reconcile_scope).
    pub async fn reconcile_with(
        &self,
        ctx: &BookContext,
        scope: Scope,
        dry_run: bool,
    ) -> Result<Vec<Correction>, EngineError> {
        match self.reconcile_once(ctx, scope, dry_run).await {
            Err(EngineError::ConcurrentCreationConflict { start_date, .. }) => {
                warn!(%scope, %start_date, "Chain changed while reconciling, retrying once");
                self.reconcile_once(ctx, scope, dry_run).await
            }
            other => other,
        }
    }

    async fn reconcile_once(
        &self,
        ctx: &BookContext,
        scope: Scope,
        dry_run: bool,
    ) -> Result<Vec<Correction>, EngineError> {
        let account_book_id = ctx.config.id;
        ctx.filter_for(scope)?;
        let stored = self.periods.list(scope, account_book_id).await?;
        let ordered = order_chain(scope, stored)?;

        let mut links = self.fill_gaps(ctx, ordered).await?;
        let mut spent = Vec::with_capacity(links.len());
        for link in links.iter().take(links.len().saturating_sub(1)) {
            spent.push(self.spend(ctx, scope, link.period.range()).await?);
        }

        let corrections = walk(&mut links, &spent);
        if corrections.is_empty() {
            debug!(%scope, "Chain consistent");
            return Ok(corrections);
        }

        let repair = ChainRepair {
            inserts: links
                .into_iter()
                .filter(|link| link.origin == LinkOrigin::GapFill)
                .map(|link| link.period)
                .collect(),
            corrections,
        };

        if dry_run {
            info!(%scope, corrections = repair.corrections.len(), "Dry run: chain needs corrections");
        } else {
            self.periods.apply_repair(scope, account_book_id, &repair).await?;
            info!(
                %scope,
                corrections = repair.corrections.len(),
                gap_fills = repair.inserts.len(),
                "Reconciled chain"
            );
        }

        Ok(repair.corrections)
    }

    async fn fill_gaps(
        &self,
        ctx: &BookContext,
        ordered: Vec<BudgetPeriod>,
    ) -> Result<Vec<ChainLink>, EngineError> {
        let mut links: Vec<ChainLink> = Vec::with_capacity(ordered.len());

        for period in ordered {
            if let Some(prev) = links.last().map(|link| link.period.clone()) {
                let mut template = prev;
                for range in gap_ranges(&ctx.config.schedule, template.end_date, period.start_date)? {
                    let base_amount = self
                        .periods
                        .amount_override(period.scope, ctx.config.id, range.start)
                        .await?
                        .unwrap_or(template.base_amount);
                    let fill = BudgetPeriod {
                        id: BudgetPeriodId::new(),
                        scope: period.scope,
                        account_book_id: ctx.config.id,
                        start_date: range.start,
                        end_date: range.end,
                        base_amount,
                        rollover_enabled: template.rollover_enabled,
                        rollover_amount: Decimal::ZERO,
                    };
                    template = fill.clone();
                    links.push(ChainLink::gap_fill(fill));
                }
            }
            links.push(ChainLink::stored(period));
        }

        Ok(links)
    }

    /// Extends and reconciles every scope of an account book.
    ///
    /// Failures are isolated per scope and collected in the report.
    ///
    /// # Errors
    ///
    /// Returns an error only if the account book cannot be loaded or its
    /// scopes cannot be listed.
    pub async fn sweep_account_book(
        &self,
        account_book_id: AccountBookId,
        as_of: NaiveDate,
        concurrency: usize,
    ) -> Result<SweepReport, EngineError> {
        let ctx = self.book_context(account_book_id).await?;
        let scopes = self.periods.list_scopes(account_book_id).await?;
        let mut report = SweepReport {
            scopes: scopes.len(),
            ..SweepReport::default()
        };

        let results: Vec<_> = futures::stream::iter(scopes)
            .map(|scope| {
                let ctx = &ctx;
                async move {
                    let outcome = async {
                        let created = self.ensure_with(ctx, scope, as_of).await?;
                        let corrections = self.reconcile_with(ctx, scope, false).await?;
                        Ok::<_, EngineError>((created.len(), corrections))
                    }
                    .await;
                    (scope, outcome)
                }
            })
            .buffer_unordered(concurrency.max(1))
            .collect()
            .await;

        for (scope, outcome) in results {
            match outcome {
                Ok((created, corrections)) => {
                    report.periods_created += created;
                    report.corrections.extend(corrections);
                }
                Err(e) if e.is_scope_local() => {
                    warn!(%scope, error = %e, "Sweep skipped scope");
                    report.failures.push(ScopeFailure {
                        scope,
                        error: e.to_string(),
                    });
                }
                Err(e) => return Err(e),
            }
        }

        info!(
            %account_book_id,
            scopes = report.scopes,
            created = report.periods_created,
            corrections = report.corrections.len(),
            failures = report.failures.len(),
            "Swept account book"
        );
        Ok(report)
    }

    /// IDs of every account book.
    ///
    /// # Errors
    ///
    /// Returns a storage error.
    pub async fn account_books(&self) -> Result<Vec<AccountBookId>, EngineError> {
        self.directory.account_books().await
    }

    /// Distinct scopes of an account book.
    ///
    /// # Errors
    ///
    /// Returns a storage error.
    pub async fn scopes(&self, account_book_id: AccountBookId) -> Result<Vec<Scope>, EngineError> {
        self.periods.list_scopes(account_book_id).await
    }
}

fn log_anomaly(prev: &BudgetPeriod, carried: Decimal) {
    match RolloverCalculator::assess(prev.base_amount, carried) {
        Some(RolloverAnomaly::Oversized) => warn!(
            scope = %prev.scope,
            period = %prev.range(),
            base = %prev.base_amount,
            %carried,
            "Carry-over exceeds five times the base amount"
        ),
        Some(RolloverAnomaly::HeavyDeficit) => warn!(
            scope = %prev.scope,
            period = %prev.range(),
            base = %prev.base_amount,
            %carried,
            "Deficit exceeds twice the base amount"
        ),
        None => {}
    }
}
