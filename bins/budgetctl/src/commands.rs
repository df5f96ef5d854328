//! Command handlers.

use std::process::ExitCode;
use std::time::Duration;

use sea_orm::DatabaseConnection;
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use carryover_core::engine::{EngineError, StatusFigure};
use carryover_core::repair::RepairOptions;
use carryover_core::scope::OwnerRef;
use carryover_db::PgBudgetEngine;
use carryover_shared::types::AccountBookId;
use carryover_shared::{AppConfig, AppError};

use crate::cli::{BudgetStatusArgs, HistoryArgs, RepairArgs, RollbackArgs};

/// Exit code of a run stopped by Ctrl-C.
const INTERRUPTED: u8 = 130;

/// Shared state of one invocation.
pub struct Context {
    /// Loaded configuration.
    pub config: AppConfig,
    /// Connection pool.
    pub db: DatabaseConnection,
    /// Engine over `db`.
    pub engine: PgBudgetEngine,
    /// Cancelled on Ctrl-C.
    pub cancel: CancellationToken,
}

fn print_json<T: Serialize>(value: &T) -> Result<(), AppError> {
    let text = serde_json::to_string_pretty(value).map_err(|e| AppError::Internal(e.to_string()))?;
    println!("{text}");
    Ok(())
}

pub async fn repair(ctx: &Context, args: RepairArgs) -> Result<ExitCode, AppError> {
    let mut options = RepairOptions::from_config(&ctx.config.repair, !args.execute);
    if let Some(batch_size) = args.batch_size {
        options.batch_size = batch_size;
    }
    options.resume = !args.no_resume;

    if options.dry_run {
        info!("Dry run: nothing will be written, pass --execute to apply");
    }
    let runner = carryover_db::repair_orchestrator(&ctx.db, options);

    let interrupted = match args.account_book {
        Some(account_book_id) => {
            let report = runner.reconcile_account_book(account_book_id, &ctx.cancel).await?;
            print_json(&report)?;
            report.interrupted
        }
        None => {
            let fleet = runner.reconcile_all(&ctx.cancel).await?;
            print_json(&fleet)?;
            if !fleet.failed_books.is_empty() {
                warn!(failed = fleet.failed_books.len(), "Some account books could not be repaired");
            }
            fleet.interrupted
        }
    };

    Ok(if interrupted {
        ExitCode::from(INTERRUPTED)
    } else {
        ExitCode::SUCCESS
    })
}

pub async fn status(ctx: &Context, account_book_id: AccountBookId) -> Result<ExitCode, AppError> {
    let runner = carryover_db::repair_orchestrator(&ctx.db, RepairOptions::from_config(&ctx.config.repair, true));
    let report = runner.diagnose(account_book_id, &ctx.cancel).await?;
    print_json(&report)?;

    Ok(if report.interrupted {
        ExitCode::from(INTERRUPTED)
    } else if report.is_clean() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

pub async fn budget_status(ctx: &Context, args: BudgetStatusArgs) -> Result<ExitCode, AppError> {
    let owner = OwnerRef {
        user_id: args.user,
        family_member_id: args.member,
    };
    let as_of = match args.as_of {
        Some(date) => date,
        None => ctx.config.engine.today()?,
    };

    let figure = ctx
        .engine
        .status_for_owner(owner, args.account_book, as_of)
        .await?;
    if let StatusFigure::Available(status) = &figure {
        info!(
            scope = %status.scope,
            period = %status.period,
            available = %status.money(status.available),
            spent = %status.money(status.spent),
            remaining = %status.money(status.remaining),
            "Budget status"
        );
        if status.is_overspent() {
            warn!(scope = %status.scope, remaining = %status.money(status.remaining), "Budget overspent");
        }
    }
    print_json(&figure)?;

    Ok(match figure {
        StatusFigure::Available(_) => ExitCode::SUCCESS,
        StatusFigure::Unavailable { reason } => {
            ExitCode::from(AppError::Unresolved(reason.to_string()).exit_code())
        }
    })
}

pub async fn history(ctx: &Context, args: HistoryArgs) -> Result<ExitCode, AppError> {
    let owner = OwnerRef {
        user_id: args.user,
        family_member_id: args.member,
    };

    let (scope, history) = ctx.engine.rollover_history(owner, args.account_book).await?;
    info!(%scope, entries = history.len(), "Rollover history loaded");
    print_json(&serde_json::json!({
        "account_book_id": args.account_book,
        "scope": scope,
        "history": history,
    }))?;
    Ok(ExitCode::SUCCESS)
}

pub async fn rollback(ctx: &Context, args: RollbackArgs) -> Result<ExitCode, AppError> {
    let mut options = RepairOptions::from_config(&ctx.config.repair, !args.execute);
    if let Some(batch_size) = args.batch_size {
        options.batch_size = batch_size;
    }

    if options.dry_run {
        info!("Dry run: nothing will be written, pass --execute to apply");
    }
    let runner = carryover_db::repair_orchestrator(&ctx.db, options);
    let report = runner.rollback_run(args.run_id, &ctx.cancel).await?;
    print_json(&report)?;

    Ok(if report.interrupted {
        ExitCode::from(INTERRUPTED)
    } else if report.skipped.is_empty() {
        ExitCode::SUCCESS
    } else {
        warn!(skipped = report.skipped.len(), "Some changes were left in place");
        ExitCode::FAILURE
    })
}

async fn sweep_pass(ctx: &Context) -> Result<(), AppError> {
    let as_of = ctx.config.engine.today()?;
    let concurrency = ctx.config.repair.scope_concurrency;

    for account_book_id in ctx.engine.account_books().await? {
        if ctx.cancel.is_cancelled() {
            break;
        }
        match ctx.engine.sweep_account_book(account_book_id, as_of, concurrency).await {
            Ok(report) => print_json(&serde_json::json!({
                "account_book_id": account_book_id,
                "as_of": as_of,
                "report": report,
            }))?,
            Err(e @ EngineError::Repository(_)) => return Err(e.into()),
            Err(e) => error!(%account_book_id, error = %e, "Sweep failed for account book"),
        }
    }
    Ok(())
}

pub async fn sweep(ctx: &Context, once: bool) -> Result<ExitCode, AppError> {
    if once {
        sweep_pass(ctx).await?;
        return Ok(ExitCode::SUCCESS);
    }

    let period = Duration::from_secs(ctx.config.sweep.interval_secs.max(1));
    let mut interval = tokio::time::interval(period);
    interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    info!(interval_secs = period.as_secs(), "Sweep scheduler started");

    loop {
        tokio::select! {
            () = ctx.cancel.cancelled() => {
                info!("Sweep scheduler stopped");
                return Ok(ExitCode::SUCCESS);
            }
            _ = interval.tick() => {
                if let Err(e) = sweep_pass(ctx).await {
                    error!(error = %e, "Sweep pass failed");
                }
            }
        }
    }
}
