//! Budget engine over pluggable storage.
//!
//! - Period generation (`ensure_periods_up_to_date`)
//! - Budget status with owner resolution
//! - Chain reconciliation with gap filling and drift correction
//! - Account book sweeps

pub mod error;
pub mod service;
pub mod status;
pub mod store;


pub use error::EngineError;
pub use service::{BookContext, BudgetEngine};
pub use status::{BudgetStatus, ScopeFailure, StatusFigure, SweepReport};
pub use store::{ChainRepair, Directory, PeriodStore, SpendSource};
