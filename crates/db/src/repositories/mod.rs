//! Repository abstractions for data access.
//!
//! Repositories implement the core storage traits, hiding the `SeaORM`
//! implementation details from the engine.

pub mod account_book;
pub mod error;
mod mapping;
pub mod period;
pub mod repair;
pub mod transaction;

pub use account_book::AccountBookRepository;
pub use error::StoreError;
pub use period::BudgetPeriodRepository;
pub use repair::RepairRepository;
pub use transaction::TransactionRepository;
