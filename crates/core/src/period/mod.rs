//! Budget periods and their schedule.

pub mod schedule;
pub mod types;

pub use schedule::{PeriodLength, PeriodSchedule, ScheduleError};
pub use types::{AccountBookConfig, BudgetPeriod, DateRange, PeriodState};
