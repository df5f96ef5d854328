//! Carryover admin CLI.
//!
//! Repairs historical attribution and rollover chains (and rolls a repair
//! run back), prints diagnostics, budget figures and rollover history, and
//! runs the scheduled sweep.

mod cli;
mod commands;

use std::process::ExitCode;

use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use carryover_shared::{AppConfig, AppError};

use cli::{Cli, Command};
use commands::Context;

fn init_tracing(json: bool) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "carryover=info,budgetctl=info,sqlx=warn".into());

    // Logs go to stderr so stdout carries only JSON reports
    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry
            .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        registry
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init();
    }
}

async fn run(cli: Cli) -> anyhow::Result<ExitCode> {
    let config = AppConfig::load().map_err(AppError::from)?;
    let db = carryover_db::connect_with(&config.database)
        .await
        .map_err(|e| AppError::Database(e.to_string()))?;
    info!("Connected to database");

    let cancel = CancellationToken::new();
    let on_signal = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupt received, finishing current batch");
            on_signal.cancel();
        }
    });

    let ctx = Context {
        engine: carryover_db::engine(&db),
        config,
        db,
        cancel,
    };

    let code = match cli.command {
        Command::Repair(args) => commands::repair(&ctx, args).await?,
        Command::Status { account_book } => commands::status(&ctx, account_book).await?,
        Command::BudgetStatus(args) => commands::budget_status(&ctx, args).await?,
        Command::History(args) => commands::history(&ctx, args).await?,
        Command::Rollback(args) => commands::rollback(&ctx, args).await?,
        Command::Sweep { once } => commands::sweep(&ctx, once).await?,
    };
    Ok(code)
}

#[tokio::main]
async fn main() -> ExitCode {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    init_tracing(cli.json);

    match run(cli).await {
        Ok(code) => code,
        Err(err) => {
            let (code, kind) = err
                .downcast_ref::<AppError>()
                .map_or((70, "INTERNAL_ERROR"), |e| (e.exit_code(), e.error_code()));
            error!(error = %err, code = kind, "budgetctl failed");
            ExitCode::from(code)
        }
    }
}
