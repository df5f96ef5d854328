//! Database layer with `SeaORM` entities and repositories.
//!
//! This crate provides:
//! - `SeaORM` entity definitions
//! - Repositories implementing the core storage traits
//! - Database migrations

pub mod entities;
pub mod migration;
pub mod repositories;

pub use repositories::{
    AccountBookRepository, BudgetPeriodRepository, RepairRepository, StoreError,
    TransactionRepository,
};

use std::sync::Arc;
use std::time::Duration;

use sea_orm::{ConnectOptions, Database, DatabaseConnection, DbErr};

use carryover_core::engine::BudgetEngine;
use carryover_core::repair::{RepairOptions, RepairOrchestrator};
use carryover_shared::config::DatabaseConfig;

/// Engine wired to the PostgreSQL repositories.
pub type PgBudgetEngine = BudgetEngine<BudgetPeriodRepository, TransactionRepository, AccountBookRepository>;

/// Repair orchestrator wired to the PostgreSQL repositories.
pub type PgRepairOrchestrator = RepairOrchestrator<
    BudgetPeriodRepository,
    TransactionRepository,
    AccountBookRepository,
    RepairRepository,
>;

/// Establishes a connection to the database.
///
/// # Errors
///
/// Returns an error if the connection cannot be established.
pub async fn connect(database_url: &str) -> Result<DatabaseConnection, DbErr> {
    Database::connect(database_url).await
}

/// Establishes a pooled connection from configuration.
///
/// # Errors
///
/// Returns an error if the connection cannot be established.
pub async fn connect_with(config: &DatabaseConfig) -> Result<DatabaseConnection, DbErr> {
    let mut options = ConnectOptions::new(config.url.clone());
    options
        .max_connections(config.max_connections)
        .min_connections(config.min_connections)
        .connect_timeout(Duration::from_secs(10))
        .sqlx_logging(false);
    Database::connect(options).await
}

/// Builds the budget engine over one connection pool.
#[must_use]
pub fn engine(db: &DatabaseConnection) -> PgBudgetEngine {
    BudgetEngine::new(
        Arc::new(BudgetPeriodRepository::new(db.clone())),
        Arc::new(TransactionRepository::new(db.clone())),
        Arc::new(AccountBookRepository::new(db.clone())),
    )
}

/// Builds a repair orchestrator over one connection pool.
#[must_use]
pub fn repair_orchestrator(db: &DatabaseConnection, options: RepairOptions) -> PgRepairOrchestrator {
    RepairOrchestrator::new(engine(db), Arc::new(RepairRepository::new(db.clone())), options)
}
